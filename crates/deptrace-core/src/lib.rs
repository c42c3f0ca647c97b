//! # deptrace-core
//!
//! Core type system for DepTrace -- dependency provenance analysis for AI
//! coding agents.
//!
//! This crate defines the shared vocabulary used across the DepTrace
//! pipeline: raw and classified tool-call events, decision chains, risk
//! factors and assessments, and the static knowledge base of known package
//! issues and high-training-weight package lists.

pub mod chain;
pub mod error;
pub mod event;
pub mod knowledge;
pub mod risk;

pub use chain::{ChainStats, DecisionChain};
pub use error::{KnowledgeError, Result};
pub use event::{
    ActionKind, AgentKind, ClassifiedEvent, DiscoveryType, PackageManager, RawEvent,
};
pub use knowledge::{KnowledgeBase, KnownIssue};
pub use risk::{FactorKind, FactorSeverity, RiskAssessment, RiskFactor, RiskLevel, RiskStats};
