//! Decision chains: reconstructed install episodes.
//!
//! A chain links one root install attempt with the searches, abandoned
//! attempts, and rapid follow-on installs that belong to the same episode,
//! and names the install that represents its outcome.

use serde::{Deserialize, Serialize};

use crate::event::ClassifiedEvent;

/// One coherent episode ending in a chosen (or attempted) dependency.
///
/// Every event referenced by a chain is claimed by at most one chain in a
/// session; plain file reads and other non-signal events never appear in
/// any chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionChain {
    /// Deterministic chain id, `"{session_id}-chain-{n}"`.
    pub id: String,
    /// Session the chain was reconstructed from.
    pub session_id: String,
    /// The triggering install attempt. May itself be abandoned when the
    /// episode never resolved to a working install.
    pub root_event: ClassifiedEvent,
    /// Closely-following install events folded into this episode.
    pub sub_decisions: Vec<ClassifiedEvent>,
    /// Search/fetch events temporally adjacent to the root.
    pub search_events: Vec<ClassifiedEvent>,
    /// Earlier failed install attempts folded into this chain.
    pub abandoned_choices: Vec<ClassifiedEvent>,
    /// The install representing the outcome of the chain. Equals the root
    /// unless the root was abandoned and a replacement succeeded.
    pub final_selection: ClassifiedEvent,
    /// 1-based position among the session's chains, by root occurrence.
    pub chain_order: usize,
}

impl DecisionChain {
    /// Ids of every event this chain claims (root, sub-decisions, searches,
    /// abandoned choices).
    pub fn claimed_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.root_event.id())
            .chain(self.sub_decisions.iter().map(|e| e.id()))
            .chain(self.search_events.iter().map(|e| e.id()))
            .chain(self.abandoned_choices.iter().map(|e| e.id()))
    }

    /// Whether any search/fetch event was folded into this chain.
    pub fn has_search(&self) -> bool {
        !self.search_events.is_empty()
    }

    /// Whether any abandoned earlier attempt was folded into this chain.
    pub fn has_abandoned(&self) -> bool {
        !self.abandoned_choices.is_empty()
    }
}

/// Aggregate statistics over a session's decision chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainStats {
    /// Total number of chains.
    pub total_chains: usize,
    /// Chains with at least one search event.
    pub chains_with_search: usize,
    /// Chains with at least one abandoned choice.
    pub chains_with_abandoned: usize,
    /// Average sub-decision count per chain, rounded to 1 decimal.
    pub avg_sub_decisions: f64,
    /// Percentage of chains with zero search events, rounded to the
    /// nearest integer. The headline metric: how often installs happened
    /// with no visible alternative consideration.
    pub no_deliberation_rate: u32,
}

impl ChainStats {
    /// Compute aggregate statistics from a chain list. An empty list
    /// yields all-zero stats.
    pub fn from_chains(chains: &[DecisionChain]) -> Self {
        if chains.is_empty() {
            return Self::default();
        }
        let total = chains.len();
        let with_search = chains.iter().filter(|c| c.has_search()).count();
        let with_abandoned = chains.iter().filter(|c| c.has_abandoned()).count();
        let sub_total: usize = chains.iter().map(|c| c.sub_decisions.len()).sum();
        let avg = sub_total as f64 / total as f64;
        let no_deliberation = total - with_search;
        Self {
            total_chains: total,
            chains_with_search: with_search,
            chains_with_abandoned: with_abandoned,
            avg_sub_decisions: (avg * 10.0).round() / 10.0,
            no_deliberation_rate: ((no_deliberation as f64 / total as f64) * 100.0).round()
                as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ActionKind, AgentKind, ClassifiedEvent, DiscoveryType, RawEvent};
    use chrono::{TimeZone, Utc};

    fn classified(id: &str) -> ClassifiedEvent {
        ClassifiedEvent {
            event: RawEvent {
                id: id.into(),
                session_id: "s".into(),
                timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
                agent: AgentKind::ClaudeCode,
                action: ActionKind::Bash,
                raw: "npm install left-pad".into(),
                result: None,
                exit_code: Some(0),
                cwd: None,
            },
            classification: DiscoveryType::TrainingRecall,
            confidence: 70,
            package_name: Some("left-pad".into()),
            package_version: None,
            package_manager: None,
            is_install: true,
            is_search: false,
            abandoned: false,
            alternatives: Vec::new(),
        }
    }

    fn chain(order: usize, subs: usize, searches: usize, abandoned: usize) -> DecisionChain {
        let root = classified(&format!("root-{order}"));
        DecisionChain {
            id: format!("s-chain-{order}"),
            session_id: "s".into(),
            final_selection: root.clone(),
            root_event: root,
            sub_decisions: (0..subs)
                .map(|i| classified(&format!("sub-{order}-{i}")))
                .collect(),
            search_events: (0..searches)
                .map(|i| classified(&format!("search-{order}-{i}")))
                .collect(),
            abandoned_choices: (0..abandoned)
                .map(|i| classified(&format!("ab-{order}-{i}")))
                .collect(),
            chain_order: order,
        }
    }

    #[test]
    fn claimed_ids_cover_all_sections() {
        let c = chain(1, 2, 1, 1);
        let ids: Vec<&str> = c.claimed_ids().collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.contains(&"root-1"));
        assert!(ids.contains(&"sub-1-0"));
        assert!(ids.contains(&"search-1-0"));
        assert!(ids.contains(&"ab-1-0"));
    }

    #[test]
    fn stats_empty_list() {
        assert_eq!(ChainStats::from_chains(&[]), ChainStats::default());
    }

    #[test]
    fn stats_rounding() {
        // 1 + 2 = 3 sub-decisions over 2 chains = 1.5
        let chains = vec![chain(1, 1, 1, 0), chain(2, 2, 0, 1)];
        let stats = ChainStats::from_chains(&chains);
        assert_eq!(stats.total_chains, 2);
        assert_eq!(stats.chains_with_search, 1);
        assert_eq!(stats.chains_with_abandoned, 1);
        assert!((stats.avg_sub_decisions - 1.5).abs() < f64::EPSILON);
        assert_eq!(stats.no_deliberation_rate, 50);
    }

    #[test]
    fn no_deliberation_rate_all_undeliberated() {
        let chains = vec![chain(1, 0, 0, 0), chain(2, 0, 0, 0), chain(3, 0, 0, 0)];
        let stats = ChainStats::from_chains(&chains);
        assert_eq!(stats.no_deliberation_rate, 100);
    }

    #[test]
    fn no_deliberation_rate_rounds_to_nearest() {
        // 1 of 3 chains without search = 33.33 -> 33
        let chains = vec![chain(1, 0, 1, 0), chain(2, 0, 1, 0), chain(3, 0, 0, 0)];
        let stats = ChainStats::from_chains(&chains);
        assert_eq!(stats.no_deliberation_rate, 33);
    }
}
