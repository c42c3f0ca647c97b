//! Event classification: a single forward pass over a session's ordered
//! event list, followed by a backward abandonment-marking pass.
//!
//! The scan threads an explicit [`ScanState`] through the fold: accumulated
//! instruction-file and manifest-file content, the most recent bash
//! failure, and the indices of recent searches. Install events are then
//! classified against a fixed-size look-back window of preceding events.

use chrono::{DateTime, Utc};
use tracing::debug;

use deptrace_core::{
    ActionKind, ClassifiedEvent, DiscoveryType, KnowledgeBase, RawEvent,
};

use crate::analyzer::AnalyzerConfig;
use crate::patterns::{InstallMatcher, ParsedPackage};

/// Agent-instruction files whose contents carry explicit human directives.
const INSTRUCTION_FILES: &[&str] = &[
    "CLAUDE.md",
    ".cursorrules",
    ".windsurfrules",
    "copilot-instructions.md",
    "AGENTS.md",
];

/// Dependency-manifest files whose contents establish pre-existing context.
const MANIFEST_FILES: &[&str] = &[
    "package.json",
    "requirements.txt",
    "Pipfile",
    "pyproject.toml",
    "Cargo.toml",
    "go.mod",
    "Gemfile",
];

/// Cap applied when accumulating result text into scan state. Collectors
/// already truncate results at this length; the cap holds even if one does
/// not.
const RESULT_TEXT_CAP: usize = 2000;

/// Maximum candidate alternatives attached to an install event.
const MAX_ALTERNATIVES: usize = 10;

/// Words excluded by the plausible-package-identifier heuristic.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "your", "you", "are", "was", "can",
    "has", "have", "not", "but", "all", "any", "how", "what", "when", "where", "which", "will",
    "more", "most", "into", "about", "also", "use", "using", "best", "top", "library",
    "libraries", "package", "packages", "module", "framework", "lightweight", "alternative",
    "alternatives",
];

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_instruction_file(path: &str) -> bool {
    INSTRUCTION_FILES.contains(&file_name(path))
}

fn is_manifest_file(path: &str) -> bool {
    MANIFEST_FILES.contains(&file_name(path))
}

// ---------------------------------------------------------------------------
// Scan state
// ---------------------------------------------------------------------------

/// Mutable state threaded through one session scan. Reset per session,
/// never shared across sessions.
#[derive(Debug, Default)]
pub struct ScanState {
    /// Lowercased content of every instruction file read so far. Content
    /// persists for the remainder of the session once seen.
    instruction_content: String,
    /// Lowercased content of every manifest file read so far.
    manifest_content: String,
    /// Timestamp of the most recent failed bash command.
    last_failure_at: Option<DateTime<Utc>>,
    /// Indices (into the session event list) of search/fetch events seen
    /// so far.
    recent_searches: Vec<usize>,
}

impl ScanState {
    /// Append instruction-file content to the accumulator.
    pub fn absorb_instruction(&mut self, text: &str) {
        append_capped(&mut self.instruction_content, text);
    }

    /// Append manifest-file content to the accumulator.
    pub fn absorb_manifest(&mut self, text: &str) {
        append_capped(&mut self.manifest_content, text);
    }

    /// Record a failed bash command.
    pub fn note_failure(&mut self, at: DateTime<Utc>) {
        self.last_failure_at = Some(at);
    }

    /// Record a search/fetch event by its session index.
    pub fn note_search(&mut self, index: usize) {
        self.recent_searches.push(index);
    }

    /// Whether the accumulated instruction content mentions the package,
    /// case-insensitive substring.
    pub fn instruction_mentions(&self, package_name: &str) -> bool {
        self.instruction_content
            .contains(&package_name.to_lowercase())
    }

    /// Whether the accumulated manifest content mentions the package,
    /// case-insensitive substring.
    pub fn manifest_mentions(&self, package_name: &str) -> bool {
        self.manifest_content.contains(&package_name.to_lowercase())
    }

    /// Whether a bash failure occurred within `window_secs` before `at`.
    pub fn failure_within(&self, at: DateTime<Utc>, window_secs: i64) -> bool {
        self.last_failure_at.is_some_and(|failed_at| {
            let elapsed = (at - failed_at).num_seconds();
            (0..=window_secs).contains(&elapsed)
        })
    }
}

fn append_capped(accumulator: &mut String, text: &str) {
    let capped: String = text.chars().take(RESULT_TEXT_CAP).collect();
    accumulator.push('\n');
    accumulator.push_str(&capped.to_lowercase());
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classifies a session's events, one [`ClassifiedEvent`] per input event.
///
/// Total over any well-formed event list: malformed or unparseable raw
/// text yields `Unknown` classifications, never an error.
pub struct Classifier {
    matcher: InstallMatcher,
    knowledge: KnowledgeBase,
    config: AnalyzerConfig,
}

impl Classifier {
    pub fn new(config: AnalyzerConfig, knowledge: KnowledgeBase) -> Self {
        Self {
            matcher: InstallMatcher::new(),
            knowledge,
            config,
        }
    }

    /// Classify every event of one session, in order. Output length always
    /// equals input length and `output[i]` annotates `events[i]`.
    pub fn classify_session(&self, events: &[RawEvent]) -> Vec<ClassifiedEvent> {
        let mut state = ScanState::default();
        let mut classified = Vec::with_capacity(events.len());

        for (idx, event) in events.iter().enumerate() {
            classified.push(self.classify_event(idx, event, events, &state));

            // State updates happen after classification so an event never
            // witnesses itself as prior context.
            match event.action {
                ActionKind::FileRead => {
                    if let Some(result) = &event.result {
                        if is_instruction_file(&event.raw) {
                            state.absorb_instruction(result);
                        } else if is_manifest_file(&event.raw) {
                            state.absorb_manifest(result);
                        }
                    }
                }
                ActionKind::Bash if event.is_failed_bash() => {
                    state.note_failure(event.timestamp);
                }
                action if action.is_search_like() => {
                    state.note_search(idx);
                }
                _ => {}
            }
        }

        mark_abandoned(&mut classified);
        classified
    }

    fn classify_event(
        &self,
        idx: usize,
        event: &RawEvent,
        events: &[RawEvent],
        state: &ScanState,
    ) -> ClassifiedEvent {
        match event.action {
            ActionKind::WebSearch | ActionKind::WebFetch => self.classify_search(event, state),
            ActionKind::Bash => self.classify_bash(idx, event, events, state),
            ActionKind::FileRead => {
                if is_instruction_file(&event.raw) {
                    annotate(event, DiscoveryType::UserDirected, 60)
                } else {
                    annotate(event, DiscoveryType::Unknown, 20)
                }
            }
            ActionKind::FileWrite => annotate(event, DiscoveryType::Unknown, 20),
        }
    }

    fn classify_search(&self, event: &RawEvent, state: &ScanState) -> ClassifiedEvent {
        let (classification, confidence) =
            if state.failure_within(event.timestamp, self.config.reactive_search_secs) {
                (DiscoveryType::ReactiveSearch, 80)
            } else if self.matcher.is_proactive_search_query(&event.raw) {
                (DiscoveryType::ProactiveSearch, 75)
            } else {
                (DiscoveryType::Unknown, 40)
            };
        let mut classified = annotate(event, classification, confidence);
        classified.is_search = true;
        classified
    }

    fn classify_bash(
        &self,
        idx: usize,
        event: &RawEvent,
        events: &[RawEvent],
        state: &ScanState,
    ) -> ClassifiedEvent {
        let packages = self.matcher.parse_install_command(&event.raw);
        if let Some(primary) = packages.first() {
            let (classification, confidence) =
                self.decide_install(idx, events, state, primary);
            debug!(
                package = %primary.name,
                %classification,
                confidence,
                "classified install"
            );
            let mut classified = annotate(event, classification, confidence);
            classified.is_install = true;
            classified.package_name = Some(primary.name.clone());
            classified.package_version = primary.version.clone();
            classified.package_manager = Some(primary.manager);
            classified.alternatives = self.collect_alternatives(idx, events, state);
            return classified;
        }

        if self.matcher.is_install_command(&event.raw) {
            // Install-shaped command with no parseable package.
            let mut classified = annotate(event, DiscoveryType::Unknown, 30);
            classified.is_install = true;
            return classified;
        }

        // Routine shell noise.
        let mut classified = annotate(event, DiscoveryType::Unknown, 10);
        classified.abandoned = event.is_failed_bash();
        classified
    }

    /// The install decision procedure. Rules are evaluated top to bottom
    /// and the first match wins -- the ordering encodes a priority among
    /// discovery explanations: an explicit directive beats inherited
    /// context, which beats search evidence, which beats pure recall.
    fn decide_install(
        &self,
        idx: usize,
        events: &[RawEvent],
        state: &ScanState,
        primary: &ParsedPackage,
    ) -> (DiscoveryType, u8) {
        // 1. The package is named in an instruction file -- directly, or by
        //    the technology term a human would use for it ("pg" is asked
        //    for as "PostgreSQL").
        if state.instruction_mentions(&primary.name)
            || self
                .knowledge
                .directive_aliases(&primary.name)
                .iter()
                .any(|alias| state.instruction_mentions(alias))
        {
            return (DiscoveryType::UserDirected, 90);
        }

        let window = &events[idx.saturating_sub(self.config.lookback_events)..idx];

        // 2. A manifest was read nearby and already lists the package.
        let manifest_read_nearby = window
            .iter()
            .any(|e| e.action == ActionKind::FileRead && is_manifest_file(&e.raw));
        if manifest_read_nearby && state.manifest_mentions(&primary.name) {
            return (DiscoveryType::ContextInheritance, 85);
        }

        let has_failure = window.iter().any(RawEvent::is_failed_bash);
        let searches: Vec<&RawEvent> = window
            .iter()
            .filter(|e| e.action.is_search_like())
            .collect();

        // 3. A failure and a search both happened nearby.
        if has_failure && !searches.is_empty() {
            return (DiscoveryType::ReactiveSearch, 80);
        }

        // 4. A search happened with no failure: deliberate comparison if it
        //    was phrased as one, otherwise weak reactive evidence.
        if !searches.is_empty() {
            if searches
                .iter()
                .any(|e| self.matcher.is_proactive_search_query(&e.raw))
            {
                return (DiscoveryType::ProactiveSearch, 75);
            }
            return (DiscoveryType::ReactiveSearch, 65);
        }

        // 5. Ubiquitous package: strong recall with no deliberation signal.
        if self
            .knowledge
            .is_high_training_weight(primary.manager.ecosystem(), &primary.name)
        {
            return (DiscoveryType::TrainingRecall, 90);
        }

        // 6. Default: recall with no contextual evidence at all.
        (DiscoveryType::TrainingRecall, 70)
    }

    /// Candidate package names surfaced by search results in the look-back
    /// window: plausible identifiers, deduplicated, insertion order, at
    /// most [`MAX_ALTERNATIVES`].
    fn collect_alternatives(
        &self,
        idx: usize,
        events: &[RawEvent],
        state: &ScanState,
    ) -> Vec<String> {
        let mut alternatives: Vec<String> = Vec::new();
        for &search_idx in &state.recent_searches {
            if search_idx + self.config.lookback_events < idx {
                continue;
            }
            let Some(result) = &events[search_idx].result else {
                continue;
            };
            for token in candidate_tokens(result) {
                if alternatives.len() >= MAX_ALTERNATIVES {
                    return alternatives;
                }
                if !alternatives.contains(&token) {
                    alternatives.push(token);
                }
            }
        }
        alternatives
    }
}

/// Second pass: mark every install whose command exited non-zero as
/// abandoned. Deliberately local -- whether a later install actually
/// superseded it is the chain builder's concern, not the classifier's.
fn mark_abandoned(events: &mut [ClassifiedEvent]) {
    for classified in events.iter_mut() {
        if classified.is_install && classified.event.exit_code.is_some_and(|c| c != 0) {
            classified.abandoned = true;
        }
    }
}

fn annotate(event: &RawEvent, classification: DiscoveryType, confidence: u8) -> ClassifiedEvent {
    ClassifiedEvent {
        event: event.clone(),
        classification,
        confidence,
        package_name: None,
        package_version: None,
        package_manager: None,
        is_install: false,
        is_search: false,
        abandoned: false,
        alternatives: Vec::new(),
    }
}

/// Plausible-package-identifier heuristic: alphanumeric/hyphen runs of at
/// least 3 chars containing a letter, lowercased, stop words excluded.
fn candidate_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .filter(|run| run.len() >= 3)
        .filter(|run| run.chars().any(|c| c.is_ascii_alphabetic()))
        .map(str::to_ascii_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}
