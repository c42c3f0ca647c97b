//! Decision-chain reconstruction.
//!
//! Partitions a session's install events and their surrounding context into
//! non-overlapping chains: each chain claims one root install, the searches
//! temporally adjacent to it, any earlier abandoned attempts, and rapid
//! follow-on installs. An event id is claimed by at most one chain.

use std::collections::HashSet;

use chrono::Duration;
use tracing::debug;

use deptrace_core::{ChainStats, ClassifiedEvent, DecisionChain};

use crate::analyzer::AnalyzerConfig;

/// Groups classified events into decision chains.
pub struct ChainBuilder {
    config: AnalyzerConfig,
}

impl ChainBuilder {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Build the session's chains, in root-occurrence order.
    ///
    /// Idempotent: running this twice over the same (unmodified) classified
    /// list yields identical chains.
    pub fn build_chains(&self, events: &[ClassifiedEvent]) -> Vec<DecisionChain> {
        let mut used: HashSet<String> = HashSet::new();
        let mut chains = Vec::new();

        for (idx, root) in events.iter().enumerate() {
            if !root.is_install || used.contains(root.id()) {
                continue;
            }
            // An abandoned install with a viable replacement coming up is
            // not a root; the replacement's chain folds it in as an
            // abandoned choice.
            if root.abandoned && self.has_upcoming_replacement(idx, events, &used) {
                continue;
            }

            used.insert(root.id().to_string());
            let chain_order = chains.len() + 1;

            let mut search_events = Vec::new();
            let mut abandoned_choices = Vec::new();
            let mut sub_decisions = Vec::new();

            // Backward: claim adjacent searches and earlier failed attempts.
            let start = idx.saturating_sub(self.config.lookback_events);
            for prior in &events[start..idx] {
                if used.contains(prior.id()) {
                    continue;
                }
                if prior.is_search {
                    used.insert(prior.id().to_string());
                    search_events.push(prior.clone());
                } else if prior.is_install && prior.abandoned {
                    used.insert(prior.id().to_string());
                    abandoned_choices.push(prior.clone());
                }
            }

            // Forward: claim adjacent searches, plus follow-on installs when
            // the root failed (candidate replacements) or the follow-on came
            // fast enough to be part of the same episode.
            let end = (idx + 1 + self.config.lookahead_events).min(events.len());
            for later in &events[idx + 1..end] {
                if used.contains(later.id()) {
                    continue;
                }
                if later.is_search {
                    used.insert(later.id().to_string());
                    search_events.push(later.clone());
                } else if later.is_install {
                    let delta = later.timestamp() - root.timestamp();
                    if root.abandoned
                        || delta < Duration::seconds(self.config.rapid_follow_on_secs)
                    {
                        used.insert(later.id().to_string());
                        sub_decisions.push(later.clone());
                    }
                }
            }

            let final_selection = if root.abandoned {
                sub_decisions
                    .iter()
                    .find(|d| !d.abandoned)
                    .cloned()
                    .unwrap_or_else(|| root.clone())
            } else {
                root.clone()
            };

            debug!(
                chain_order,
                searches = search_events.len(),
                abandoned = abandoned_choices.len(),
                sub_decisions = sub_decisions.len(),
                "built decision chain"
            );

            chains.push(DecisionChain {
                id: format!("{}-chain-{}", root.event.session_id, chain_order),
                session_id: root.event.session_id.clone(),
                root_event: root.clone(),
                sub_decisions,
                search_events,
                abandoned_choices,
                final_selection,
                chain_order,
            });
        }

        chains
    }

    /// Aggregate statistics for a chain list.
    pub fn stats(&self, chains: &[DecisionChain]) -> ChainStats {
        ChainStats::from_chains(chains)
    }

    /// Whether an unclaimed, non-abandoned install follows within the
    /// look-ahead window of the install at `idx`.
    fn has_upcoming_replacement(
        &self,
        idx: usize,
        events: &[ClassifiedEvent],
        used: &HashSet<String>,
    ) -> bool {
        let end = (idx + 1 + self.config.lookahead_events).min(events.len());
        events[idx + 1..end]
            .iter()
            .any(|e| e.is_install && !e.abandoned && !used.contains(e.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use deptrace_core::{
        ActionKind, AgentKind, ClassifiedEvent, DiscoveryType, RawEvent,
    };

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn raw(id: &str, offset: i64, action: ActionKind, raw: &str, exit_code: Option<i32>) -> RawEvent {
        RawEvent {
            id: id.into(),
            session_id: "sess".into(),
            timestamp: base_time() + Duration::seconds(offset),
            agent: AgentKind::ClaudeCode,
            action,
            raw: raw.into(),
            result: None,
            exit_code,
            cwd: None,
        }
    }

    fn install(id: &str, offset: i64, package: &str, abandoned: bool) -> ClassifiedEvent {
        ClassifiedEvent {
            event: raw(
                id,
                offset,
                ActionKind::Bash,
                &format!("npm install {package}"),
                Some(if abandoned { 1 } else { 0 }),
            ),
            classification: DiscoveryType::TrainingRecall,
            confidence: 70,
            package_name: Some(package.into()),
            package_version: None,
            package_manager: None,
            is_install: true,
            is_search: false,
            abandoned,
            alternatives: Vec::new(),
        }
    }

    fn search(id: &str, offset: i64, query: &str) -> ClassifiedEvent {
        ClassifiedEvent {
            event: raw(id, offset, ActionKind::WebSearch, query, None),
            classification: DiscoveryType::ReactiveSearch,
            confidence: 80,
            package_name: None,
            package_version: None,
            package_manager: None,
            is_install: false,
            is_search: true,
            abandoned: false,
            alternatives: Vec::new(),
        }
    }

    fn noise(id: &str, offset: i64) -> ClassifiedEvent {
        ClassifiedEvent {
            event: raw(id, offset, ActionKind::FileRead, "src/main.rs", None),
            classification: DiscoveryType::Unknown,
            confidence: 20,
            package_name: None,
            package_version: None,
            package_manager: None,
            is_install: false,
            is_search: false,
            abandoned: false,
            alternatives: Vec::new(),
        }
    }

    fn builder() -> ChainBuilder {
        ChainBuilder::new(AnalyzerConfig::default())
    }

    #[test]
    fn no_installs_no_chains() {
        let events = vec![noise("n1", 0), search("s1", 5, "rust errors")];
        assert!(builder().build_chains(&events).is_empty());
    }

    #[test]
    fn single_install_single_chain() {
        let events = vec![install("i1", 0, "express", false)];
        let chains = builder().build_chains(&events);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].chain_order, 1);
        assert_eq!(chains[0].root_event.id(), "i1");
        assert_eq!(chains[0].final_selection.id(), "i1");
        assert_eq!(chains[0].id, "sess-chain-1");
        assert!(chains[0].search_events.is_empty());
    }

    #[test]
    fn abandoned_then_search_then_replacement_folds_into_one_chain() {
        // Scenario B: failed puppeteer, search, successful pdfkit.
        let events = vec![
            install("puppeteer", 0, "puppeteer", true),
            search("s1", 10, "lightweight pdf nodejs"),
            install("pdfkit", 20, "pdfkit", false),
        ];
        let chains = builder().build_chains(&events);
        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        assert_eq!(
            chain.abandoned_choices.iter().map(|e| e.id()).collect::<Vec<_>>(),
            vec!["puppeteer"]
        );
        assert_eq!(
            chain.search_events.iter().map(|e| e.id()).collect::<Vec<_>>(),
            vec!["s1"]
        );
        assert_eq!(chain.final_selection.id(), "pdfkit");
        assert!(!chain.final_selection.abandoned);
    }

    #[test]
    fn abandoned_install_with_no_replacement_roots_its_own_chain() {
        let events = vec![
            install("i1", 0, "puppeteer", true),
            search("s1", 10, "puppeteer install failed"),
        ];
        let chains = builder().build_chains(&events);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].root_event.id(), "i1");
        assert!(chains[0].root_event.abandoned);
        // The episode never resolved: the root is its own final selection.
        assert_eq!(chains[0].final_selection.id(), "i1");
        assert_eq!(chains[0].search_events.len(), 1);
    }

    #[test]
    fn all_abandoned_episode_claims_later_failures_as_sub_decisions() {
        let events = vec![
            install("i1", 0, "puppeteer", true),
            install("i2", 50, "playwright", true),
        ];
        let chains = builder().build_chains(&events);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].root_event.id(), "i1");
        assert_eq!(chains[0].sub_decisions.len(), 1);
        assert_eq!(chains[0].final_selection.id(), "i1");
    }

    #[test]
    fn rapid_follow_on_installs_group_into_one_chain() {
        let events = vec![
            install("i1", 0, "express", false),
            install("i2", 10, "cors", false),
            install("i3", 25, "helmet", false),
        ];
        let chains = builder().build_chains(&events);
        assert_eq!(chains.len(), 1);
        let subs: Vec<&str> = chains[0].sub_decisions.iter().map(|e| e.id()).collect();
        assert_eq!(subs, vec!["i2", "i3"]);
        assert_eq!(chains[0].final_selection.id(), "i1");
    }

    #[test]
    fn slow_follow_on_installs_become_separate_chains() {
        let events = vec![
            install("i1", 0, "express", false),
            install("i2", 30, "mongoose", false),
        ];
        let chains = builder().build_chains(&events);
        // 30s is not under the 30s rapid-follow-on threshold.
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].chain_order, 1);
        assert_eq!(chains[1].chain_order, 2);
        assert_eq!(chains[1].root_event.id(), "i2");
    }

    #[test]
    fn no_event_is_claimed_twice_across_chains() {
        let events = vec![
            install("i1", 0, "a", true),
            search("s1", 5, "why did a fail"),
            install("i2", 10, "b", false),
            install("i3", 45, "c", false),
            search("s2", 50, "docs for c"),
            install("i4", 100, "d", false),
        ];
        let chains = builder().build_chains(&events);
        let mut seen = HashSet::new();
        for chain in &chains {
            for id in chain.claimed_ids() {
                assert!(seen.insert(id.to_string()), "{id} claimed twice");
            }
        }
    }

    #[test]
    fn build_chains_is_idempotent() {
        let events = vec![
            install("i1", 0, "a", true),
            search("s1", 5, "alternatives to a"),
            install("i2", 10, "b", false),
            install("i3", 90, "c", false),
        ];
        let first = builder().build_chains(&events);
        let second = builder().build_chains(&events);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.chain_order, b.chain_order);
            assert_eq!(
                a.claimed_ids().collect::<Vec<_>>(),
                b.claimed_ids().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn plain_file_reads_never_join_chains() {
        let events = vec![
            noise("n1", 0),
            install("i1", 5, "express", false),
            noise("n2", 10),
        ];
        let chains = builder().build_chains(&events);
        let claimed: Vec<&str> = chains[0].claimed_ids().collect();
        assert_eq!(claimed, vec!["i1"]);
    }

    #[test]
    fn backward_search_claim_respects_window() {
        // A search 11 positions before the install is out of reach.
        let mut events = vec![search("far", 0, "ancient query")];
        for i in 0..10 {
            events.push(noise(&format!("n{i}"), 1 + i));
        }
        events.push(install("i1", 20, "express", false));
        let chains = builder().build_chains(&events);
        assert!(chains[0].search_events.is_empty());
    }

    #[test]
    fn stats_scenario_no_deliberation() {
        // Scenario E: several chains, zero searches anywhere.
        let events = vec![
            install("i1", 0, "a", false),
            install("i2", 60, "b", false),
            install("i3", 120, "c", false),
        ];
        let b = builder();
        let chains = b.build_chains(&events);
        assert_eq!(chains.len(), 3);
        let stats = b.stats(&chains);
        assert_eq!(stats.total_chains, 3);
        assert_eq!(stats.no_deliberation_rate, 100);
        assert_eq!(stats.chains_with_search, 0);
    }
}
