//! Risk findings for installed packages.
//!
//! A [`RiskAssessment`] carries one or more [`RiskFactor`]s for a single
//! installed package; its [`RiskLevel`] is a pure function of the maximum
//! factor severity, so adding factors can only hold or raise the level.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of problem a risk factor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// A known security vulnerability.
    Vulnerability,
    /// The package is officially deprecated.
    Deprecated,
    /// No maintenance activity for an extended period.
    Unmaintained,
    /// Disproportionately heavy for what it does.
    Bloat,
    /// Restrictive or unclear licensing.
    License,
    /// Installed purely from training-data recall, with no visible
    /// consideration of alternatives.
    TrainingBias,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorKind::Vulnerability => write!(f, "vulnerability"),
            FactorKind::Deprecated => write!(f, "deprecated"),
            FactorKind::Unmaintained => write!(f, "unmaintained"),
            FactorKind::Bloat => write!(f, "bloat"),
            FactorKind::License => write!(f, "license"),
            FactorKind::TrainingBias => write!(f, "training bias"),
        }
    }
}

/// Severity of a single risk factor. Ordered: `Info < Warning < Error <
/// Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for FactorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorSeverity::Info => write!(f, "INFO"),
            FactorSeverity::Warning => write!(f, "WARNING"),
            FactorSeverity::Error => write!(f, "ERROR"),
            FactorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One risk finding for an installed package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    /// What kind of problem this is.
    pub kind: FactorKind,
    /// How severe the problem is.
    pub severity: FactorSeverity,
    /// Human-readable description.
    pub detail: String,
    /// Optional citation (advisory id, CVE, registry notice).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// A package the installer could have used instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_alternative: Option<String>,
}

/// Overall risk level of an assessment, derived from factor severities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Derive the risk level from the maximum severity among an
    /// assessment's factors.
    pub fn from_max_severity(severity: FactorSeverity) -> Self {
        match severity {
            FactorSeverity::Critical => RiskLevel::Critical,
            FactorSeverity::Error => RiskLevel::High,
            FactorSeverity::Warning => RiskLevel::Medium,
            FactorSeverity::Info => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Risk findings for one installed package.
///
/// An assessment always carries at least one factor; a package with no
/// findings simply produces no assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// The installed package.
    pub package_name: String,
    /// The installed version spec, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    /// Derived overall level; see [`RiskLevel::from_max_severity`].
    pub risk_level: RiskLevel,
    /// The individual findings. Never empty.
    pub factors: Vec<RiskFactor>,
}

impl RiskAssessment {
    /// Build an assessment from collected factors. Returns `None` when the
    /// factor list is empty, enforcing the no-empty-assessment invariant.
    pub fn new(
        package_name: impl Into<String>,
        package_version: Option<String>,
        factors: Vec<RiskFactor>,
    ) -> Option<Self> {
        let max = factors.iter().map(|f| f.severity).max()?;
        Some(Self {
            package_name: package_name.into(),
            package_version,
            risk_level: RiskLevel::from_max_severity(max),
            factors,
        })
    }

    /// Whether any factor is of the given kind.
    pub fn has_factor(&self, kind: FactorKind) -> bool {
        self.factors.iter().any(|f| f.kind == kind)
    }
}

/// Aggregate statistics over a set of risk assessments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskStats {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Assessments with at least one vulnerability factor.
    pub vulnerable: usize,
    /// Assessments with at least one deprecation factor.
    pub deprecated: usize,
    /// Assessments with at least one bloat factor.
    pub bloated: usize,
}

impl RiskStats {
    /// Compute aggregate counts from an assessment list.
    pub fn from_assessments(assessments: &[RiskAssessment]) -> Self {
        let mut stats = Self::default();
        for assessment in assessments {
            match assessment.risk_level {
                RiskLevel::Critical => stats.critical += 1,
                RiskLevel::High => stats.high += 1,
                RiskLevel::Medium => stats.medium += 1,
                RiskLevel::Low => stats.low += 1,
            }
            if assessment.has_factor(FactorKind::Vulnerability) {
                stats.vulnerable += 1;
            }
            if assessment.has_factor(FactorKind::Deprecated) {
                stats.deprecated += 1;
            }
            if assessment.has_factor(FactorKind::Bloat) {
                stats.bloated += 1;
            }
        }
        stats
    }
}
