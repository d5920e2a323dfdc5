//! Closed enumerations shared across the guard pipeline.
//!
//! These mirror the upstream reference implementation's `core/types.py`
//! one-to-one. The cross-enum lookup tables (`SafetyCategory` →
//! `ContentCategory` → `(Decision, Severity)`) are implemented as plain
//! `match` expressions rather than runtime maps — the cardinality is fixed
//! and small, so a match compiles to a jump table with no allocation.

use serde::{Deserialize, Serialize};

/// Final judgment a [`GuardResponse`](super::model::GuardResponse) carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Content may proceed unchanged.
    Approve,
    /// Content must not proceed.
    Block,
    /// Content may proceed in rewritten form.
    Modify,
    /// Content requires human review before proceeding.
    Escalate,
    /// The caller should ask the user for clarification.
    Reask,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Approve => "Approve",
            Self::Block => "Block",
            Self::Modify => "Modify",
            Self::Escalate => "Escalate",
            Self::Reask => "Reask",
        };
        write!(f, "{s}")
    }
}

/// Risk severity level. Ordering is used only for sorting matches —
/// `Critical` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Immediate block and incident trigger.
    Critical,
    /// Should block in most policies.
    High,
    /// Warrants investigation.
    Medium,
    /// May warrant logging only.
    Low,
}

impl Severity {
    /// Sort rank — lower sorts first (`Critical` = 0).
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// The nine disjoint jailbreak-attempt classes the Jailbreak Detector
/// recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JailbreakType {
    /// "DAN" / "do anything now" style persona override.
    DanMode,
    /// Request to roleplay as an unrestricted persona.
    RolePlay,
    /// Attempt to discard prior instructions or safety guidelines.
    InstructionOverride,
    /// Claimed developer/admin/debug mode.
    DeveloperMode,
    /// Hypothetical/fictional framing used to evade refusal.
    Hypothetical,
    /// Explicit request to bypass content filters.
    FilterBypass,
    /// Request for elevated/admin privileges.
    PrivilegeEscalation,
    /// Attempt to extract the system prompt or initial instructions.
    PromptExtraction,
    /// Base64/ROT13/homoglyph/structural obfuscation.
    EncodingAttack,
}

impl JailbreakType {
    /// The `snake_case` identifier used in rule IDs (`jailbreak.<value>`)
    /// and risk labels (`jailbreak_<value>`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DanMode => "dan_mode",
            Self::RolePlay => "role_play",
            Self::InstructionOverride => "instruction_override",
            Self::DeveloperMode => "developer_mode",
            Self::Hypothetical => "hypothetical",
            Self::FilterBypass => "filter_bypass",
            Self::PrivilegeEscalation => "privilege_escalation",
            Self::PromptExtraction => "prompt_extraction",
            Self::EncodingAttack => "encoding_attack",
        }
    }
}

impl std::fmt::Display for JailbreakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Safety Classifier output category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    /// No category triggered above threshold.
    Safe,
    /// Violence, self-harm, weapons, poisons.
    Dangerous,
    /// Threats, bullying, stalking.
    Harassment,
    /// Slurs and discriminatory language.
    HateSpeech,
    /// Explicit sexual content.
    Sexual,
    /// Profanity and generic toxicity.
    Toxic,
}

impl SafetyCategory {
    /// The `snake_case` identifier used in rule IDs (`safety.<value>`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Dangerous => "dangerous",
            Self::Harassment => "harassment",
            Self::HateSpeech => "hate_speech",
            Self::Sexual => "sexual",
            Self::Toxic => "toxic",
        }
    }

    /// Projects a Safety Classifier category onto a [`ContentCategory`],
    /// per `spec.md` §4.5's pipeline-orchestrator mapping table.
    #[must_use]
    pub fn to_content_category(self) -> ContentCategory {
        match self {
            Self::Safe => ContentCategory::Safe,
            Self::Dangerous | Self::Harassment | Self::HateSpeech => ContentCategory::Harmful,
            Self::Sexual | Self::Toxic => ContentCategory::Sensitive,
        }
    }
}

impl std::fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse content classification used to drive the severity/decision tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    /// No violation found.
    Safe,
    /// Clearly harmful (violence, hate speech, dangerous instructions).
    Harmful,
    /// Sensitive but not outright harmful (sexual, toxic).
    Sensitive,
    /// Jailbreak attempt.
    Jailbreak,
    /// Prompt injection attempt.
    PromptInjection,
    /// Could not be confidently classified.
    Unknown,
}

impl ContentCategory {
    /// The process-wide `ContentCategory → Decision` table from `spec.md`
    /// §4.5.
    #[must_use]
    pub fn to_decision(self) -> Decision {
        match self {
            Self::Safe => Decision::Approve,
            Self::Harmful | Self::Jailbreak | Self::PromptInjection => Decision::Block,
            Self::Sensitive => Decision::Modify,
            Self::Unknown => Decision::Escalate,
        }
    }

    /// The process-wide `ContentCategory → Severity` table from `spec.md`
    /// §4.5.
    #[must_use]
    pub fn to_severity(self) -> Severity {
        match self {
            Self::Safe => Severity::Low,
            Self::Harmful | Self::Jailbreak | Self::PromptInjection => Severity::Critical,
            Self::Sensitive => Severity::High,
            Self::Unknown => Severity::Medium,
        }
    }
}

/// The Decision Router's `Severity → Decision` table from `spec.md` §4.7,
/// used when a rule's own decision is the default `Block` (see the routing
/// logic's Open Question in `DESIGN.md`).
#[must_use]
pub fn severity_to_decision(severity: Severity) -> Decision {
    match severity {
        Severity::Critical => Decision::Block,
        Severity::High => Decision::Modify,
        Severity::Medium => Decision::Escalate,
        Severity::Low => Decision::Approve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rank_orders_critical_first() {
        let mut v = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        v.sort_by_key(|s| s.rank());
        assert_eq!(v, vec![Severity::Critical, Severity::High, Severity::Medium, Severity::Low]);
    }

    #[test]
    fn safety_category_projects_to_content_category() {
        assert_eq!(SafetyCategory::Dangerous.to_content_category(), ContentCategory::Harmful);
        assert_eq!(SafetyCategory::Sexual.to_content_category(), ContentCategory::Sensitive);
        assert_eq!(SafetyCategory::Safe.to_content_category(), ContentCategory::Safe);
    }

    #[test]
    fn content_category_decision_table() {
        assert_eq!(ContentCategory::Harmful.to_decision(), Decision::Block);
        assert_eq!(ContentCategory::Sensitive.to_decision(), Decision::Modify);
        assert_eq!(ContentCategory::Unknown.to_decision(), Decision::Escalate);
        assert_eq!(ContentCategory::Safe.to_decision(), Decision::Approve);
    }

    #[test]
    fn severity_to_decision_table() {
        assert_eq!(severity_to_decision(Severity::Critical), Decision::Block);
        assert_eq!(severity_to_decision(Severity::High), Decision::Modify);
        assert_eq!(severity_to_decision(Severity::Medium), Decision::Escalate);
        assert_eq!(severity_to_decision(Severity::Low), Decision::Approve);
    }

    #[test]
    fn decision_and_severity_roundtrip_json() {
        let json = serde_json::to_string(&Decision::Modify).unwrap();
        assert_eq!(json, r#""modify""#);
        let parsed: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Decision::Modify);
    }
}
