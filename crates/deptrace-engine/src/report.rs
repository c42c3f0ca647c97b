//! Per-session analysis assembly and rendering.
//!
//! The pipeline's output types plus plain-text and JSON renderers. Richer
//! surfaces (HTTP payloads, dashboards) are external collaborators that
//! consume these same types.

use serde::{Deserialize, Serialize};

use deptrace_core::{
    ChainStats, ClassifiedEvent, DecisionChain, DiscoveryType, RiskAssessment, RiskLevel,
    RiskStats,
};

/// Counts of install events per discovery type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryBreakdown {
    pub training_recall: usize,
    pub context_inheritance: usize,
    pub reactive_search: usize,
    pub proactive_search: usize,
    pub user_directed: usize,
    pub unknown: usize,
}

impl DiscoveryBreakdown {
    /// Count install events (abandoned included) by discovery type.
    pub fn from_events(events: &[ClassifiedEvent]) -> Self {
        let mut breakdown = Self::default();
        for classified in events.iter().filter(|e| e.is_install) {
            match classified.classification {
                DiscoveryType::TrainingRecall => breakdown.training_recall += 1,
                DiscoveryType::ContextInheritance => breakdown.context_inheritance += 1,
                DiscoveryType::ReactiveSearch => breakdown.reactive_search += 1,
                DiscoveryType::ProactiveSearch => breakdown.proactive_search += 1,
                DiscoveryType::UserDirected => breakdown.user_directed += 1,
                DiscoveryType::Unknown => breakdown.unknown += 1,
            }
        }
        breakdown
    }

    /// Total install events counted.
    pub fn total(&self) -> usize {
        self.training_recall
            + self.context_inheritance
            + self.reactive_search
            + self.proactive_search
            + self.user_directed
            + self.unknown
    }
}

/// The complete analysis of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub session_id: String,
    /// Number of raw events analyzed.
    pub event_count: usize,
    /// One entry per input event, input order preserved.
    pub classified_events: Vec<ClassifiedEvent>,
    pub chains: Vec<DecisionChain>,
    pub chain_stats: ChainStats,
    pub assessments: Vec<RiskAssessment>,
    pub risk_stats: RiskStats,
    pub discovery: DiscoveryBreakdown,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn risk_level_color(level: &RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "\x1b[1;31m", // bold red
        RiskLevel::High => "\x1b[33m",       // yellow
        RiskLevel::Medium => "\x1b[35m",     // magenta
        RiskLevel::Low => "\x1b[36m",        // cyan
    }
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Render a plain-text terminal report.
pub fn render_terminal(analysis: &SessionAnalysis) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}DepTrace Dependency Provenance Report{}\n",
        BOLD, RESET
    ));
    out.push_str(&format!("Session: {}\n", analysis.session_id));
    out.push_str(&format!("Events:  {}\n", analysis.event_count));
    out.push_str(&"=".repeat(60));
    out.push('\n');

    // Discovery breakdown
    out.push_str(&format!("\n{}How dependencies were chosen{}\n", BOLD, RESET));
    out.push_str(&format!(
        "  training recall:     {}\n",
        analysis.discovery.training_recall
    ));
    out.push_str(&format!(
        "  context inheritance: {}\n",
        analysis.discovery.context_inheritance
    ));
    out.push_str(&format!(
        "  reactive search:     {}\n",
        analysis.discovery.reactive_search
    ));
    out.push_str(&format!(
        "  proactive search:    {}\n",
        analysis.discovery.proactive_search
    ));
    out.push_str(&format!(
        "  user directed:       {}\n",
        analysis.discovery.user_directed
    ));
    out.push_str(&format!(
        "  unknown:             {}\n",
        analysis.discovery.unknown
    ));

    // Chain summary
    out.push_str(&format!("\n{}Decision chains{}\n", BOLD, RESET));
    out.push_str(&format!(
        "  chains: {}  with searches: {}  with abandoned attempts: {}\n",
        analysis.chain_stats.total_chains,
        analysis.chain_stats.chains_with_search,
        analysis.chain_stats.chains_with_abandoned,
    ));
    out.push_str(&format!(
        "  avg sub-decisions: {:.1}\n",
        analysis.chain_stats.avg_sub_decisions
    ));
    out.push_str(&format!(
        "  no-deliberation rate: {}%\n",
        analysis.chain_stats.no_deliberation_rate
    ));

    // Risk findings
    if analysis.assessments.is_empty() {
        out.push_str("\nNo risk findings.\n");
    } else {
        out.push_str(&format!("\n{}Risk findings{}\n", BOLD, RESET));
        out.push_str(&"-".repeat(60));
        out.push('\n');
        for assessment in &analysis.assessments {
            let color = risk_level_color(&assessment.risk_level);
            out.push_str(&format!(
                "\n{}[{}]{} {}",
                color, assessment.risk_level, RESET, assessment.package_name
            ));
            if let Some(version) = &assessment.package_version {
                out.push_str(&format!("@{version}"));
            }
            out.push('\n');
            for factor in &assessment.factors {
                out.push_str(&format!("  {} ({}): {}\n", factor.kind, factor.severity, factor.detail));
                if let Some(source) = &factor.source {
                    out.push_str(&format!("    source: {source}\n"));
                }
                if let Some(alternative) = &factor.suggested_alternative {
                    out.push_str(&format!("    consider: {alternative}\n"));
                }
            }
        }
    }

    out.push('\n');
    out
}

/// Render the analysis as pretty-printed JSON.
pub fn render_json(analysis: &SessionAnalysis) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(analysis)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use deptrace_core::{ActionKind, AgentKind, RawEvent};

    fn install(package: &str, classification: DiscoveryType) -> ClassifiedEvent {
        ClassifiedEvent {
            event: RawEvent {
                id: format!("i-{package}"),
                session_id: "sess".into(),
                timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
                agent: AgentKind::Cursor,
                action: ActionKind::Bash,
                raw: format!("npm install {package}"),
                result: None,
                exit_code: Some(0),
                cwd: None,
            },
            classification,
            confidence: 70,
            package_name: Some(package.into()),
            package_version: None,
            package_manager: None,
            is_install: true,
            is_search: false,
            abandoned: false,
            alternatives: Vec::new(),
        }
    }

    fn analysis() -> SessionAnalysis {
        let events = vec![
            install("express", DiscoveryType::TrainingRecall),
            install("pdfkit", DiscoveryType::ReactiveSearch),
        ];
        SessionAnalysis {
            session_id: "sess".into(),
            event_count: events.len(),
            discovery: DiscoveryBreakdown::from_events(&events),
            classified_events: events,
            chains: Vec::new(),
            chain_stats: ChainStats::default(),
            assessments: Vec::new(),
            risk_stats: RiskStats::default(),
        }
    }

    #[test]
    fn breakdown_counts_installs_only() {
        let mut events = vec![
            install("express", DiscoveryType::TrainingRecall),
            install("pg", DiscoveryType::UserDirected),
        ];
        events[1].event.id = "i-pg".into();
        let mut not_install = install("x", DiscoveryType::Unknown);
        not_install.is_install = false;
        events.push(not_install);

        let breakdown = DiscoveryBreakdown::from_events(&events);
        assert_eq!(breakdown.training_recall, 1);
        assert_eq!(breakdown.user_directed, 1);
        assert_eq!(breakdown.unknown, 0);
        assert_eq!(breakdown.total(), 2);
    }

    #[test]
    fn terminal_render_mentions_headline_metric() {
        let rendered = render_terminal(&analysis());
        assert!(rendered.contains("no-deliberation rate"));
        assert!(rendered.contains("DepTrace"));
        assert!(rendered.contains("No risk findings."));
    }

    #[test]
    fn json_render_round_trips() {
        let json = render_json(&analysis()).unwrap();
        let back: SessionAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, "sess");
        assert_eq!(back.classified_events.len(), 2);
        assert_eq!(back.discovery.training_recall, 1);
    }
}
