//! Risk scoring for installed packages.
//!
//! Flags every non-abandoned install against the static knowledge base and
//! against classifier-derived training-bias signals. A package with no
//! findings produces no assessment: silence means clean.

use tracing::debug;

use deptrace_core::{
    ClassifiedEvent, DiscoveryType, FactorKind, FactorSeverity, KnowledgeBase, RiskAssessment,
    RiskFactor, RiskStats,
};

/// Confidence at or above which a training-recall install is flagged for
/// training bias.
const TRAINING_BIAS_CONFIDENCE: u8 = 80;

/// Scores classified installs against a knowledge base snapshot.
pub struct RiskScorer {
    knowledge: KnowledgeBase,
}

impl RiskScorer {
    pub fn new(knowledge: KnowledgeBase) -> Self {
        Self { knowledge }
    }

    /// Assess every non-abandoned install that has a package name.
    pub fn assess(&self, events: &[ClassifiedEvent]) -> Vec<RiskAssessment> {
        let mut assessments = Vec::new();
        for classified in events {
            if !classified.is_install || classified.abandoned {
                continue;
            }
            let Some(name) = &classified.package_name else {
                continue;
            };

            let mut factors: Vec<RiskFactor> = Vec::new();

            if let Some(issue) = self.knowledge.known_issue(name) {
                factors.push(issue.to_factor());
            }

            if classified.classification == DiscoveryType::TrainingRecall
                && classified.confidence >= TRAINING_BIAS_CONFIDENCE
            {
                factors.push(RiskFactor {
                    kind: FactorKind::TrainingBias,
                    severity: FactorSeverity::Info,
                    detail: format!(
                        "{name} was installed from training-data recall with no alternatives considered"
                    ),
                    source: None,
                    suggested_alternative: None,
                });
            }

            if let Some(assessment) =
                RiskAssessment::new(name.clone(), classified.package_version.clone(), factors)
            {
                debug!(
                    package = %assessment.package_name,
                    risk_level = %assessment.risk_level,
                    factors = assessment.factors.len(),
                    "flagged install"
                );
                assessments.push(assessment);
            }
        }
        assessments
    }

    /// Aggregate statistics for an assessment list.
    pub fn stats(&self, assessments: &[RiskAssessment]) -> RiskStats {
        RiskStats::from_assessments(assessments)
    }
}
