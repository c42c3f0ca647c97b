//! Static knowledge base of known package issues and high-training-weight
//! package lists.
//!
//! The knowledge base is an immutable, versionless snapshot injected into
//! the pipeline at construction. It ships with a curated built-in table and
//! can be replaced or extended from TOML, so tests and deployments can swap
//! tables without touching the analysis code. There is deliberately no
//! freshness or update mechanism.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::risk::{FactorKind, FactorSeverity, RiskFactor};

/// The canonical known problem for one package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownIssue {
    pub kind: FactorKind,
    pub severity: FactorSeverity,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_alternative: Option<String>,
}

impl KnownIssue {
    /// Materialize this issue as a risk factor.
    pub fn to_factor(&self) -> RiskFactor {
        RiskFactor {
            kind: self.kind,
            severity: self.severity,
            detail: self.detail.clone(),
            source: self.source.clone(),
            suggested_alternative: self.suggested_alternative.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// TOML overlay format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    package: Vec<PackageEntry>,
    #[serde(default)]
    training_weight: HashMap<String, Vec<String>>,
    #[serde(default)]
    directive_aliases: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PackageEntry {
    name: String,
    #[serde(flatten)]
    issue: KnownIssue,
}

// ---------------------------------------------------------------------------
// Knowledge base
// ---------------------------------------------------------------------------

/// Known package issues plus per-ecosystem high-training-weight lists.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    /// Package name (exact match) to its canonical known issue.
    issues: HashMap<String, KnownIssue>,
    /// Ecosystem (`"npm"`, `"pip"`, ...) to packages so ubiquitous in
    /// training corpora that installing them carries no inferential
    /// evidence of deliberate choice.
    training_weight: HashMap<String, Vec<String>>,
    /// Package name to the technology terms a human directive would use for
    /// it ("pg" is asked for as "PostgreSQL"). Terms are stored lowercase.
    directive_aliases: HashMap<String, Vec<String>>,
}

impl KnowledgeBase {
    /// An empty knowledge base. Classification still works; risk scoring
    /// finds nothing and no package counts as high training weight.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The curated built-in snapshot.
    pub fn builtin() -> Self {
        let mut kb = Self::default();
        for (name, issue) in builtin_issues() {
            kb.issues.insert(name.to_string(), issue);
        }
        for (ecosystem, names) in builtin_training_weight() {
            kb.training_weight.insert(
                ecosystem.to_string(),
                names.iter().map(|s| s.to_string()).collect(),
            );
        }
        for (package, terms) in builtin_directive_aliases() {
            kb.directive_aliases.insert(
                package.to_string(),
                terms.iter().map(|s| s.to_string()).collect(),
            );
        }
        kb
    }

    /// Parse a knowledge base from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: KnowledgeFile = toml::from_str(text)?;
        let mut kb = Self::default();
        for entry in file.package {
            kb.issues.insert(entry.name, entry.issue);
        }
        kb.training_weight = file.training_weight;
        kb.directive_aliases = file
            .directive_aliases
            .into_iter()
            .map(|(package, terms)| {
                (
                    package,
                    terms.iter().map(|t| t.to_lowercase()).collect(),
                )
            })
            .collect();
        Ok(kb)
    }

    /// Load a knowledge base from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Overlay another knowledge base onto this one. Issues from `other`
    /// replace same-named entries; training-weight lists are unioned.
    pub fn merge(&mut self, other: KnowledgeBase) {
        self.issues.extend(other.issues);
        for (ecosystem, names) in other.training_weight {
            let list = self.training_weight.entry(ecosystem).or_default();
            for name in names {
                if !list.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    list.push(name);
                }
            }
        }
        for (package, terms) in other.directive_aliases {
            let list = self.directive_aliases.entry(package).or_default();
            for term in terms {
                if !list.iter().any(|t| t.eq_ignore_ascii_case(&term)) {
                    list.push(term);
                }
            }
        }
    }

    /// Look up the canonical known issue for a package, exact name match.
    pub fn known_issue(&self, package_name: &str) -> Option<&KnownIssue> {
        self.issues.get(package_name)
    }

    /// Whether a package is on the high-training-weight list for its
    /// ecosystem.
    pub fn is_high_training_weight(&self, ecosystem: &str, package_name: &str) -> bool {
        self.training_weight
            .get(ecosystem)
            .is_some_and(|names| names.iter().any(|n| n.eq_ignore_ascii_case(package_name)))
    }

    /// Technology terms a human directive would use for this package,
    /// lowercase. Empty for packages without aliases.
    pub fn directive_aliases(&self, package_name: &str) -> &[String] {
        self.directive_aliases
            .get(package_name)
            .map_or(&[], Vec::as_slice)
    }

    /// Number of packages with a known issue.
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }
}

// ---------------------------------------------------------------------------
// Built-in snapshot
// ---------------------------------------------------------------------------

fn issue(
    kind: FactorKind,
    severity: FactorSeverity,
    detail: &str,
    source: Option<&str>,
    alternative: Option<&str>,
) -> KnownIssue {
    KnownIssue {
        kind,
        severity,
        detail: detail.to_string(),
        source: source.map(str::to_string),
        suggested_alternative: alternative.map(str::to_string),
    }
}

fn builtin_issues() -> Vec<(&'static str, KnownIssue)> {
    vec![
        (
            "jsonwebtoken",
            issue(
                FactorKind::Vulnerability,
                FactorSeverity::Error,
                "Known algorithm-confusion weakness allows signature bypass in common configurations.",
                Some("CVE-2024-33663"),
                Some("jose"),
            ),
        ),
        (
            "request",
            issue(
                FactorKind::Deprecated,
                FactorSeverity::Warning,
                "Fully deprecated by its maintainers in 2020; receives no fixes.",
                None,
                Some("node-fetch"),
            ),
        ),
        (
            "moment",
            issue(
                FactorKind::Bloat,
                FactorSeverity::Warning,
                "Large, locale-heavy bundle; the project is in maintenance mode and recommends alternatives.",
                None,
                Some("dayjs"),
            ),
        ),
        (
            "node-sass",
            issue(
                FactorKind::Deprecated,
                FactorSeverity::Warning,
                "Superseded by Dart Sass; fails to build against current Node releases.",
                None,
                Some("sass"),
            ),
        ),
        (
            "event-stream",
            issue(
                FactorKind::Vulnerability,
                FactorSeverity::Critical,
                "A compromised release shipped a credential-stealing payload via flatmap-stream.",
                Some("flatmap-stream incident, 2018"),
                None,
            ),
        ),
        (
            "pycrypto",
            issue(
                FactorKind::Vulnerability,
                FactorSeverity::Error,
                "Unmaintained since 2013 with a known heap-overflow vulnerability.",
                Some("CVE-2013-7459"),
                Some("pycryptodome"),
            ),
        ),
        (
            "nose",
            issue(
                FactorKind::Deprecated,
                FactorSeverity::Warning,
                "Unmaintained test runner; incompatible with modern Python.",
                None,
                Some("pytest"),
            ),
        ),
        (
            "failure",
            issue(
                FactorKind::Deprecated,
                FactorSeverity::Warning,
                "Deprecated error-handling crate; the ecosystem moved on.",
                None,
                Some("thiserror"),
            ),
        ),
        (
            "paperclip",
            issue(
                FactorKind::Deprecated,
                FactorSeverity::Warning,
                "Deprecated file-attachment gem; removed from active maintenance.",
                None,
                Some("active_storage"),
            ),
        ),
    ]
}

fn builtin_directive_aliases() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        ("pg", &["postgres", "postgresql"][..]),
        ("psycopg2", &["postgres", "postgresql"][..]),
        ("mysql2", &["mysql"][..]),
        ("mongoose", &["mongo", "mongodb"][..]),
        ("mongodb", &["mongo"][..]),
        ("ioredis", &["redis"][..]),
        ("sqlite3", &["sqlite"][..]),
        ("better-sqlite3", &["sqlite"][..]),
    ]
}

fn builtin_training_weight() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        (
            "npm",
            &[
                "express",
                "react",
                "lodash",
                "axios",
                "chalk",
                "commander",
                "typescript",
                "jest",
                "webpack",
                "eslint",
                "prettier",
                "jsonwebtoken",
            ][..],
        ),
        (
            "pip",
            &[
                "requests",
                "numpy",
                "pandas",
                "flask",
                "django",
                "pytest",
                "setuptools",
                "matplotlib",
            ][..],
        ),
        (
            "cargo",
            &[
                "serde", "tokio", "clap", "anyhow", "rand", "regex", "chrono", "log",
            ][..],
        ),
        (
            "go",
            &[
                "github.com/gin-gonic/gin",
                "github.com/gorilla/mux",
                "github.com/spf13/cobra",
                "github.com/stretchr/testify",
            ][..],
        ),
        (
            "gem",
            &["rails", "rake", "rspec", "puma", "nokogiri"][..],
        ),
    ]
}
