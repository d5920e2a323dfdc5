//! Maps a sorted list of [`RuleMatch`]es onto a final [`Decision`].
//!
//! Ported from the reference implementation's `decision_router.py`,
//! including its one quirk flagged for future review in `DESIGN.md`:
//! `RuleMatch::decision == Decision::Block` is always treated as "apply the
//! severity mapping", which conflates a rule author's *explicit* `BLOCK`
//! with the loader's *default* `BLOCK`. This crate preserves that behavior
//! rather than correcting it, per `spec.md` §9's explicit instruction to
//! follow observed behavior.

use crate::config::AegisClawConfig;
use crate::pipeline::model::RuleMatch;
use crate::pipeline::types::{severity_to_decision, Decision};

/// Output of [`DecisionRouter::route`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingResult {
    /// The routed decision.
    pub decision: Decision,
    /// Confidence associated with that decision (pre-risk-scorer).
    pub confidence: f32,
    /// Replacement text, present only when `decision == Decision::Modify`.
    pub rewrite: Option<String>,
    /// One-line human-readable message, if any.
    pub message: Option<String>,
    /// The match that drove this routing, if any.
    pub primary_match: Option<RuleMatch>,
}

/// Routes a severity-sorted list of matches to a final decision.
///
/// `matches` MUST already be sorted by severity ascending rank (CRITICAL
/// first) — [`crate::pipeline::orchestrator::GuardPipeline`] guarantees
/// this before calling `route`.
#[derive(Debug, Clone)]
pub struct DecisionRouter<'a> {
    config: &'a AegisClawConfig,
}

impl<'a> DecisionRouter<'a> {
    /// Builds a router reading its confidence table from `config`.
    #[must_use]
    pub fn new(config: &'a AegisClawConfig) -> Self {
        Self { config }
    }

    /// Routes `sorted_matches` to a [`RoutingResult`].
    #[must_use]
    pub fn route(&self, sorted_matches: &[RuleMatch]) -> RoutingResult {
        let Some(primary) = sorted_matches.first() else {
            return RoutingResult {
                decision: Decision::Approve,
                confidence: self.config.approve_confidence,
                rewrite: None,
                message: None,
                primary_match: None,
            };
        };

        let severity_mapped = severity_to_decision(primary.severity);

        if primary.decision == Decision::Reask {
            return RoutingResult {
                decision: Decision::Reask,
                confidence: self.config.reask_confidence,
                rewrite: None,
                message: Some(format!("Clarification needed: {}", primary.risk_label)),
                primary_match: Some(primary.clone()),
            };
        }

        // NOTE: per spec.md §9 Open Question 1, `Decision::Block` is treated
        // as "the loader's default", so it always defers to the severity
        // map — even when a rule author set BLOCK explicitly. Preserved as
        // specified rather than disambiguated.
        let chosen = if primary.decision == Decision::Block { severity_mapped } else { primary.decision };

        if chosen == Decision::Modify {
            if let Some(rewrite) = primary.rewrite.clone() {
                return RoutingResult {
                    decision: Decision::Modify,
                    confidence: self.config.modify_confidence,
                    rewrite: Some(rewrite),
                    message: None,
                    primary_match: Some(primary.clone()),
                };
            }
            return RoutingResult {
                decision: Decision::Block,
                confidence: (self.config.block_confidence - 0.10).max(0.0),
                rewrite: None,
                message: Some(format!("{chosen}: {} (no rewrite available)", primary.risk_label)),
                primary_match: Some(primary.clone()),
            };
        }

        let confidence = match chosen {
            Decision::Block => self.config.block_confidence,
            Decision::Escalate => self.config.escalate_confidence,
            Decision::Approve => self.config.approve_confidence,
            Decision::Reask => self.config.reask_confidence,
            Decision::Modify => unreachable!("handled above"),
        };

        RoutingResult {
            decision: chosen,
            confidence,
            rewrite: None,
            message: Some(format!("{chosen}: {}", primary.risk_label)),
            primary_match: Some(primary.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Severity;

    fn make_match(decision: Decision, severity: Severity, rewrite: Option<&str>) -> RuleMatch {
        RuleMatch {
            rule_id: "test.rule".into(),
            decision,
            severity,
            risk_label: "test_label".into(),
            description: None,
            matched_text: None,
            rewrite: rewrite.map(str::to_string),
        }
    }

    #[test]
    fn empty_matches_route_to_approve() {
        let config = AegisClawConfig::default();
        let router = DecisionRouter::new(&config);
        let result = router.route(&[]);
        assert_eq!(result.decision, Decision::Approve);
        assert_eq!(result.confidence, config.approve_confidence);
        assert!(result.primary_match.is_none());
    }

    #[test]
    fn critical_block_maps_through_severity() {
        let config = AegisClawConfig::default();
        let router = DecisionRouter::new(&config);
        let m = make_match(Decision::Block, Severity::Critical, None);
        let result = router.route(&[m]);
        assert_eq!(result.decision, Decision::Block);
        assert_eq!(result.confidence, config.block_confidence);
    }

    #[test]
    fn modify_without_rewrite_downgrades_to_block() {
        let config = AegisClawConfig::default();
        let router = DecisionRouter::new(&config);
        let m = make_match(Decision::Modify, Severity::High, None);
        let result = router.route(&[m]);
        assert_eq!(result.decision, Decision::Block);
        assert!((result.confidence - (config.block_confidence - 0.10)).abs() < 1e-6);
    }

    #[test]
    fn modify_with_rewrite_honored() {
        let config = AegisClawConfig::default();
        let router = DecisionRouter::new(&config);
        let m = make_match(Decision::Modify, Severity::High, Some("safer text"));
        let result = router.route(&[m]);
        assert_eq!(result.decision, Decision::Modify);
        assert_eq!(result.rewrite.as_deref(), Some("safer text"));
        assert_eq!(result.confidence, config.modify_confidence);
    }

    #[test]
    fn reask_short_circuits_severity_mapping() {
        let config = AegisClawConfig::default();
        let router = DecisionRouter::new(&config);
        let m = make_match(Decision::Reask, Severity::Critical, None);
        let result = router.route(&[m]);
        assert_eq!(result.decision, Decision::Reask);
        assert_eq!(result.confidence, config.reask_confidence);
    }

    #[test]
    fn explicit_non_block_decision_is_honored() {
        let config = AegisClawConfig::default();
        let router = DecisionRouter::new(&config);
        let m = make_match(Decision::Escalate, Severity::Low, None);
        let result = router.route(&[m]);
        assert_eq!(result.decision, Decision::Escalate);
        assert_eq!(result.confidence, config.escalate_confidence);
    }
}
