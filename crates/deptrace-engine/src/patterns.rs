//! Install-command and search-query pattern matching.
//!
//! Pure, table-driven recognition: a fixed, ordered set of per-manager
//! regular expressions extracts `{name, version, manager}` triples from
//! free-text shell commands, and a fixed set of comparison/superlative
//! patterns recognizes deliberate "what should I use" search queries.

use deptrace_core::PackageManager;
use regex::Regex;

/// One package extracted from an install command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPackage {
    pub name: String,
    pub version: Option<String>,
    pub manager: PackageManager,
}

impl ParsedPackage {
    /// Re-serialize as an npm-style spec (`name` or `name@version`).
    pub fn spec(&self) -> String {
        match &self.version {
            Some(v) => format!("{}@{}", self.name, v),
            None => self.name.clone(),
        }
    }
}

/// How a manager's package tokens encode versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecStyle {
    /// `name@version`, with npm scopes (`@scope/name@version`) splitting on
    /// the last `@`.
    AtSuffix,
    /// PEP 508-style constraints: split on the first of `=`, `<`, `>`, `!`.
    Constraint,
    /// Bare names only; versions are passed via flags and discarded.
    Plain,
}

struct InstallPattern {
    manager: PackageManager,
    style: SpecStyle,
    regex: Regex,
}

/// Recognizes install commands and proactive search queries.
///
/// All tables are compiled once at construction; every method is pure and
/// deterministic, safe to call per-event with no shared state.
pub struct InstallMatcher {
    install: Vec<InstallPattern>,
    proactive: Vec<Regex>,
}

impl InstallMatcher {
    pub fn new() -> Self {
        let table: &[(PackageManager, SpecStyle, &str)] = &[
            (
                PackageManager::Npm,
                SpecStyle::AtSuffix,
                r"\bnpm\s+(?:install|i|add)\s+([^&|;]+)",
            ),
            (
                PackageManager::Yarn,
                SpecStyle::AtSuffix,
                r"\byarn\s+(?:global\s+add|add)\s+([^&|;]+)",
            ),
            (
                PackageManager::Pnpm,
                SpecStyle::AtSuffix,
                r"\bpnpm\s+(?:install|add|i)\s+([^&|;]+)",
            ),
            (
                PackageManager::Bun,
                SpecStyle::AtSuffix,
                r"\bbun\s+(?:install|add|i)\s+([^&|;]+)",
            ),
            (
                PackageManager::Pip,
                SpecStyle::Constraint,
                r"\bpip3?\s+install\s+([^&|;]+)",
            ),
            (
                PackageManager::Uv,
                SpecStyle::Constraint,
                r"\buv\s+(?:pip\s+install|add)\s+([^&|;]+)",
            ),
            (
                PackageManager::Poetry,
                SpecStyle::Constraint,
                r"\bpoetry\s+add\s+([^&|;]+)",
            ),
            (
                PackageManager::Pipx,
                SpecStyle::Constraint,
                r"\bpipx\s+install\s+([^&|;]+)",
            ),
            (
                PackageManager::Cargo,
                SpecStyle::AtSuffix,
                r"\bcargo\s+(?:add|install)\s+([^&|;]+)",
            ),
            (
                PackageManager::Go,
                SpecStyle::AtSuffix,
                r"\bgo\s+(?:get|install)\s+([^&|;]+)",
            ),
            (
                PackageManager::Gem,
                SpecStyle::Plain,
                r"\bgem\s+install\s+([^&|;]+)",
            ),
            (
                PackageManager::Bundler,
                SpecStyle::Plain,
                r"\bbundle\s+add\s+([^&|;]+)",
            ),
        ];

        let install = table
            .iter()
            .map(|(manager, style, pattern)| InstallPattern {
                manager: *manager,
                style: *style,
                regex: Regex::new(pattern).expect("install pattern table is valid"),
            })
            .collect();

        let proactive = [
            r"(?i)\bbest\b.*\b(?:library|libraries|package|packages|framework|frameworks|crate|crates|gem|gems|module|modules|tool|tools)\b",
            r"(?i)\balternatives?\s+to\b",
            r"(?i)\bvs\.?(?:\s|$)",
            r"(?i)\bcompar(?:e|ison|ing)\b",
            r"(?i)\blightweight\b",
            r"(?i)\btop\s+\d+\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("proactive pattern table is valid"))
        .collect();

        Self { install, proactive }
    }

    /// Whether the command matches any install pattern at all, regardless
    /// of whether a package could be extracted from it.
    pub fn is_install_command(&self, command: &str) -> bool {
        self.install.iter().any(|p| p.regex.is_match(command))
    }

    /// Extract every package the command installs.
    ///
    /// Each matching pattern's captured argument substring is tokenized on
    /// whitespace; flag tokens (leading `-`) are discarded, and the rest are
    /// parsed per the manager's version style. Matches across managers are
    /// concatenated in table order.
    pub fn parse_install_command(&self, command: &str) -> Vec<ParsedPackage> {
        let mut packages = Vec::new();
        for pattern in &self.install {
            let Some(captures) = pattern.regex.captures(command) else {
                continue;
            };
            let Some(args) = captures.get(1) else {
                continue;
            };
            for token in args.as_str().split_whitespace() {
                if token.starts_with('-') {
                    continue;
                }
                let (name, version) = match pattern.style {
                    SpecStyle::AtSuffix => split_at_suffix(token),
                    SpecStyle::Constraint => split_constraint(token),
                    SpecStyle::Plain => (token.to_string(), None),
                };
                if name.is_empty() {
                    continue;
                }
                packages.push(ParsedPackage {
                    name,
                    version,
                    manager: pattern.manager,
                });
            }
        }
        packages
    }

    /// Whether a query reads as a deliberate comparison/alternatives search.
    pub fn is_proactive_search_query(&self, text: &str) -> bool {
        self.proactive.iter().any(|p| p.is_match(text))
    }
}

impl Default for InstallMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `name@version`, honoring npm scopes: the version separator is the
/// last `@` that is not the leading scope marker.
fn split_at_suffix(token: &str) -> (String, Option<String>) {
    // Skip the first character so a leading scope `@` is never the split
    // point (and slicing stays on a char boundary for any input).
    let skip = token.chars().next().map_or(0, char::len_utf8);
    match token[skip..].rfind('@') {
        Some(i) => {
            let at = i + skip;
            let version = &token[at + 1..];
            if version.is_empty() {
                (token.to_string(), None)
            } else {
                (token[..at].to_string(), Some(version.to_string()))
            }
        }
        None => (token.to_string(), None),
    }
}

/// Split a PEP-style spec on the first constraint character.
fn split_constraint(token: &str) -> (String, Option<String>) {
    match token.find(['=', '<', '>', '!']) {
        Some(i) if i > 0 => {
            let version: String = token[i..]
                .trim_start_matches(['=', '<', '>', '!', '~'])
                .to_string();
            (
                token[..i].to_string(),
                (!version.is_empty()).then_some(version),
            )
        }
        _ => (token.to_string(), None),
    }
}
