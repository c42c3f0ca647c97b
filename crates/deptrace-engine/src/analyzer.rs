//! Pipeline wiring: classify, chain, score, assemble.
//!
//! [`Analyzer`] owns the static tables and configuration; each
//! `analyze_session` call is independent, synchronous, and deterministic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use deptrace_core::{KnowledgeBase, RawEvent};

use crate::chains::ChainBuilder;
use crate::classifier::Classifier;
use crate::report::{DiscoveryBreakdown, SessionAnalysis};
use crate::risk::RiskScorer;

/// Window and threshold constants for the pipeline.
///
/// The defaults are what the analysis heuristics were calibrated against;
/// change them only together with the fixtures that encode them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Events inspected before an install for failures, searches, and
    /// manifest reads.
    #[serde(default = "default_lookback_events")]
    pub lookback_events: usize,
    /// Events inspected after a chain root for searches and follow-on
    /// installs.
    #[serde(default = "default_lookahead_events")]
    pub lookahead_events: usize,
    /// A follow-on install under this many seconds after the root joins the
    /// root's chain.
    #[serde(default = "default_rapid_follow_on_secs")]
    pub rapid_follow_on_secs: i64,
    /// A search within this many seconds after a bash failure reads as
    /// reactive.
    #[serde(default = "default_reactive_search_secs")]
    pub reactive_search_secs: i64,
}

fn default_lookback_events() -> usize {
    10
}

fn default_lookahead_events() -> usize {
    10
}

fn default_rapid_follow_on_secs() -> i64 {
    30
}

fn default_reactive_search_secs() -> i64 {
    60
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lookback_events: default_lookback_events(),
            lookahead_events: default_lookahead_events(),
            rapid_follow_on_secs: default_rapid_follow_on_secs(),
            reactive_search_secs: default_reactive_search_secs(),
        }
    }
}

/// The top-level entry point to the pipeline.
pub struct Analyzer {
    classifier: Classifier,
    chain_builder: ChainBuilder,
    scorer: RiskScorer,
}

impl Analyzer {
    /// Build an analyzer with explicit configuration and knowledge tables.
    pub fn new(config: AnalyzerConfig, knowledge: KnowledgeBase) -> Self {
        Self {
            classifier: Classifier::new(config.clone(), knowledge.clone()),
            chain_builder: ChainBuilder::new(config),
            scorer: RiskScorer::new(knowledge),
        }
    }

    /// Analyze one session's ordered event list.
    ///
    /// Total over any well-formed list, including an empty one; output
    /// classified events preserve input order exactly.
    pub fn analyze_session(&self, events: &[RawEvent]) -> SessionAnalysis {
        let session_id = events
            .first()
            .map(|e| e.session_id.clone())
            .unwrap_or_default();

        let classified = self.classifier.classify_session(events);
        let chains = self.chain_builder.build_chains(&classified);
        let chain_stats = self.chain_builder.stats(&chains);
        let assessments = self.scorer.assess(&classified);
        let risk_stats = self.scorer.stats(&assessments);
        let discovery = DiscoveryBreakdown::from_events(&classified);

        debug!(
            session = %session_id,
            events = events.len(),
            chains = chains.len(),
            findings = assessments.len(),
            "session analyzed"
        );

        SessionAnalysis {
            session_id,
            event_count: events.len(),
            classified_events: classified,
            chains,
            chain_stats,
            assessments,
            risk_stats,
            discovery,
        }
    }

    /// Group a mixed event list by session id (first-seen order) and
    /// analyze each session independently.
    pub fn analyze(&self, events: &[RawEvent]) -> Vec<SessionAnalysis> {
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<RawEvent>> = HashMap::new();
        for event in events {
            if !grouped.contains_key(&event.session_id) {
                order.push(event.session_id.clone());
            }
            grouped
                .entry(event.session_id.clone())
                .or_default()
                .push(event.clone());
        }
        order
            .iter()
            .map(|session_id| self.analyze_session(&grouped[session_id]))
            .collect()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default(), KnowledgeBase::builtin())
    }
}
