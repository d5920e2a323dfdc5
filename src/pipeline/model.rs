//! Request/response records exchanged with the guard pipeline.
//!
//! These mirror the upstream reference implementation's Pydantic
//! `core/schemas.py` models. Every type here is a plain value record —
//! construction validation (e.g. confidence clamped to `[0, 1]`) is the
//! caller's responsibility at the boundaries that build these records
//! ([`crate::pipeline::router`], [`crate::pipeline::risk`],
//! [`crate::pipeline::orchestrator`]); the types themselves do not enforce
//! invariants beyond what the type system gives for free.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Decision, JailbreakType, SafetyCategory, Severity};

/// Where a [`GuardRequest`]'s text originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Text supplied by the end user.
    User,
    /// Text produced by the model.
    Output,
    /// A shell command the agent wishes to execute.
    Command,
    /// Content fetched from an external, untrusted source.
    External,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::Output => "output",
            Self::Command => "command",
            Self::External => "external",
        };
        write!(f, "{s}")
    }
}

/// An auditable `(rule_id, reason, matched_text?)` triple attached to a
/// decision. Appended in discovery order across stages and never
/// re-sorted — see `spec.md` §9's evidence-ordering note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Stable identifier suitable for alerting (`rule_id`).
    pub rule_id: String,
    /// One-line human-readable reason.
    pub reason: String,
    /// The specific substring that triggered the match, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
}

impl EvidenceItem {
    /// Builds an evidence entry with no captured match text.
    #[must_use]
    pub fn new(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { rule_id: rule_id.into(), reason: reason.into(), matched_text: None }
    }

    /// Builds an evidence entry that also records the matched substring.
    #[must_use]
    pub fn with_matched_text(
        rule_id: impl Into<String>,
        reason: impl Into<String>,
        matched_text: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            reason: reason.into(),
            matched_text: Some(matched_text.into()),
        }
    }
}

/// A single Rule Engine, synthesized-rule, or safety-classifier finding.
/// A `RuleMatch` always carries a severity and a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Stable rule identifier (e.g. `destructive_command`, `jailbreak.dan_mode`).
    pub rule_id: String,
    /// The rule's configured decision, before routing.
    pub decision: Decision,
    /// The rule's configured severity.
    pub severity: Severity,
    /// Short machine-oriented label used in risk reporting.
    pub risk_label: String,
    /// One-line human-readable description of what matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The specific substring that triggered the match, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// Replacement text carried by the rule, for `Decision::Modify`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
}

/// A Jailbreak Detector finding. Always carries a [`JailbreakType`] and a
/// confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailbreakMatch {
    /// Which of the nine jailbreak classes matched.
    pub jailbreak_type: JailbreakType,
    /// Stable pattern name (e.g. `base64_harmful`, `rot13_harmful`).
    pub pattern_name: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
    /// Free-form detector metadata (e.g. decoded preview, hidden type).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// The Safety Classifier's verdict for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyScore {
    /// `true` iff no category scored above the configured threshold.
    pub is_safe: bool,
    /// The highest-scoring category (`Safe` when `is_safe`).
    pub category: SafetyCategory,
    /// Confidence in `[0, 1]` — `1 - max_score` when safe, `max_score` otherwise.
    pub confidence: f32,
    /// Which scoring backend produced this verdict. Always `"rule_based"`
    /// in this crate — see `spec.md` §1's model-based-classification
    /// Non-goal.
    pub backend_tag: String,
}

/// A request to the guard pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRequest {
    /// The text to evaluate.
    pub text: String,
    /// Where the text originated.
    pub source: Source,
    /// Optional scenario tag restricting which rules apply (see `Rule::scenario`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Optional session identifier, consulted by the Rate Limiter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Optional caller-supplied metadata, passed through unexamined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl GuardRequest {
    /// Builds a request with only the required fields set.
    #[must_use]
    pub fn new(text: impl Into<String>, source: Source) -> Self {
        Self { text: text.into(), source, scenario: None, session_id: None, metadata: None }
    }

    /// Sets the scenario tag.
    #[must_use]
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    /// Sets the session identifier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Risk summary attached to a [`GuardResponse`] when at least one match was
/// scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskInfo {
    /// Final confidence, `[0, 1]`, rounded to two decimals.
    pub confidence: f32,
    /// Severity of the primary (highest-ranked) match, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Risk label of the primary match, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_label: Option<String>,
    /// One-line description of the primary match, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One row of the pipeline's per-stage execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    /// Stage name (`"rule_engine"`, `"jailbreak_detector"`, `"safety_classifier"`).
    pub name: String,
    /// Measured wall-clock latency, in milliseconds.
    pub latency_ms: f64,
    /// `true` when the stage produced no findings.
    pub passed: bool,
    /// One-line detail string.
    pub detail: String,
}

/// The guard pipeline's verdict for one [`GuardRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardResponse {
    /// A fresh, universally unique identifier minted for this response.
    pub request_id: Uuid,
    /// The final decision.
    pub decision: Decision,
    /// Final confidence, `[0, 1]`.
    pub confidence: f32,
    /// Risk summary, present whenever at least one match was scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_info: Option<RiskInfo>,
    /// Evidence in stage discovery order.
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    /// Replacement text, present only for `Decision::Modify`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
    /// One-line human-readable message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Per-stage execution log.
    #[serde(default)]
    pub stages: Vec<PipelineStage>,
    /// Total wall-clock latency of `evaluate`, in milliseconds.
    pub total_latency_ms: f64,
    /// When this response was produced.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
