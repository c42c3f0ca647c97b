//! Event types for DepTrace.
//!
//! Events are the fundamental data unit flowing through the pipeline. A
//! collector turns an agent's session log into an ordered [`RawEvent`] list;
//! the classifier annotates each one into a [`ClassifiedEvent`] without ever
//! touching the underlying observation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The coding agent a session originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    ClaudeCode,
    Cursor,
    Windsurf,
    Copilot,
    Aider,
    /// Any agent the collector could not identify.
    #[serde(other)]
    Other,
}

/// The kind of tool call an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A shell command execution.
    Bash,
    /// A web search query.
    WebSearch,
    /// A URL fetch.
    WebFetch,
    /// A file read.
    FileRead,
    /// A file write or edit.
    FileWrite,
}

impl ActionKind {
    /// Whether this action is a search or fetch -- the two action kinds the
    /// classifier treats as deliberation signals.
    pub fn is_search_like(&self) -> bool {
        matches!(self, ActionKind::WebSearch | ActionKind::WebFetch)
    }
}

/// One observed agent action, as normalized by a collector.
///
/// Immutable once created. Timestamps are expected to be monotonically
/// non-decreasing within a session; the collector is responsible for
/// normalization and session segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Unique event id (assigned by the collector).
    pub id: String,
    /// Session this event belongs to.
    pub session_id: String,
    /// When the action was observed.
    pub timestamp: DateTime<Utc>,
    /// The agent that produced the action.
    pub agent: AgentKind,
    /// What kind of tool call this is.
    pub action: ActionKind,
    /// Free text: command string, URL, file path, or search query.
    pub raw: String,
    /// Truncated output of the command/tool, when captured (<= 2000 chars).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Process exit code; only meaningful for [`ActionKind::Bash`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Working directory of the action, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl RawEvent {
    /// Whether this is a bash command that exited with a non-zero status.
    pub fn is_failed_bash(&self) -> bool {
        self.action == ActionKind::Bash && self.exit_code.is_some_and(|c| c != 0)
    }
}

/// The inferred reason a dependency was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryType {
    /// Recalled from the model's training data with no visible evidence of
    /// deliberation.
    TrainingRecall,
    /// Inherited from pre-existing project context (manifests read earlier
    /// in the session).
    ContextInheritance,
    /// Chosen after a search triggered by a nearby failure.
    ReactiveSearch,
    /// Chosen after a deliberate comparison/alternatives search.
    ProactiveSearch,
    /// Explicitly requested by a human instruction file.
    UserDirected,
    /// No classification evidence available.
    Unknown,
}

impl fmt::Display for DiscoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryType::TrainingRecall => write!(f, "training recall"),
            DiscoveryType::ContextInheritance => write!(f, "context inheritance"),
            DiscoveryType::ReactiveSearch => write!(f, "reactive search"),
            DiscoveryType::ProactiveSearch => write!(f, "proactive search"),
            DiscoveryType::UserDirected => write!(f, "user directed"),
            DiscoveryType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Package manager ecosystems recognized by the install pattern matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
    Pip,
    Uv,
    Poetry,
    Pipx,
    Cargo,
    Go,
    Gem,
    Bundler,
}

impl PackageManager {
    /// The ecosystem this manager installs from. Several managers share one
    /// registry (npm/yarn/pnpm/bun all install npm packages), and the
    /// high-training-weight lists are keyed per ecosystem.
    pub fn ecosystem(&self) -> &'static str {
        match self {
            PackageManager::Npm
            | PackageManager::Yarn
            | PackageManager::Pnpm
            | PackageManager::Bun => "npm",
            PackageManager::Pip
            | PackageManager::Uv
            | PackageManager::Poetry
            | PackageManager::Pipx => "pip",
            PackageManager::Cargo => "cargo",
            PackageManager::Go => "go",
            PackageManager::Gem | PackageManager::Bundler => "gem",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManager::Npm => write!(f, "npm"),
            PackageManager::Yarn => write!(f, "yarn"),
            PackageManager::Pnpm => write!(f, "pnpm"),
            PackageManager::Bun => write!(f, "bun"),
            PackageManager::Pip => write!(f, "pip"),
            PackageManager::Uv => write!(f, "uv"),
            PackageManager::Poetry => write!(f, "poetry"),
            PackageManager::Pipx => write!(f, "pipx"),
            PackageManager::Cargo => write!(f, "cargo"),
            PackageManager::Go => write!(f, "go"),
            PackageManager::Gem => write!(f, "gem"),
            PackageManager::Bundler => write!(f, "bundler"),
        }
    }
}

/// A [`RawEvent`] annotated with its classification.
///
/// Never mutated after construction except for the `abandoned` flag, which
/// the classifier sets in a second pass over the full classified list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    /// The underlying observation, unchanged.
    pub event: RawEvent,
    /// The inferred discovery type.
    pub classification: DiscoveryType,
    /// Confidence in the classification, 0-100.
    pub confidence: u8,
    /// Primary package name, set only when this is an install and a
    /// primary package was parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    /// Primary package version spec, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    /// The package manager the install command used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<PackageManager>,
    /// Whether this event is a dependency install command.
    pub is_install: bool,
    /// Whether this event is a search/fetch action.
    pub is_search: bool,
    /// True for an install attempt whose command exited non-zero.
    pub abandoned: bool,
    /// Candidate package names surfaced by preceding searches, insertion
    /// order, deduplicated, at most 10 entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

impl ClassifiedEvent {
    /// The underlying event id.
    pub fn id(&self) -> &str {
        &self.event.id
    }

    /// The underlying event timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.event.timestamp
    }
}
