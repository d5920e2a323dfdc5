//! Confidence scoring with a multi-match bonus.
//!
//! Ported from the reference implementation's `risk_scorer.py`.

use crate::config::AegisClawConfig;
use crate::pipeline::model::RuleMatch;
use crate::pipeline::types::Severity;

/// Output of [`RiskScorer::calculate`].
#[derive(Debug, Clone, PartialEq)]
pub struct RiskScore {
    /// Final confidence, rounded to two decimals.
    pub confidence: f32,
    /// Severity of the primary match, if any.
    pub severity: Option<Severity>,
    /// Risk label of the primary match, if any.
    pub risk_label: Option<String>,
    /// Description of the primary match, if any.
    pub description: Option<String>,
}

/// Computes a [`RiskScore`] from a severity-sorted match list.
#[derive(Debug, Clone)]
pub struct RiskScorer<'a> {
    config: &'a AegisClawConfig,
}

impl<'a> RiskScorer<'a> {
    /// Builds a scorer reading its base-confidence table from `config`.
    #[must_use]
    pub fn new(config: &'a AegisClawConfig) -> Self {
        Self { config }
    }

    /// Computes the final confidence for `sorted_matches`.
    #[must_use]
    pub fn calculate(&self, sorted_matches: &[RuleMatch]) -> RiskScore {
        let Some(primary) = sorted_matches.first() else {
            return RiskScore {
                confidence: self.config.approve_confidence,
                severity: None,
                risk_label: None,
                description: None,
            };
        };

        let base = match primary.severity {
            Severity::Critical => self.config.confidence_critical,
            Severity::High => self.config.confidence_high,
            Severity::Medium => self.config.confidence_medium,
            Severity::Low => self.config.confidence_low,
        };

        #[allow(clippy::cast_precision_loss)]
        let extra_matches = (sorted_matches.len() - 1) as f32;
        let bonus = (extra_matches * self.config.multi_match_bonus).min(self.config.multi_match_max_bonus);
        let confidence = (base + bonus).min(0.99);
        let rounded = (confidence * 100.0).round() / 100.0;

        RiskScore {
            confidence: rounded,
            severity: Some(primary.severity),
            risk_label: Some(primary.risk_label.clone()),
            description: primary.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Decision;

    fn make_match(severity: Severity) -> RuleMatch {
        RuleMatch {
            rule_id: "test.rule".into(),
            decision: Decision::Block,
            severity,
            risk_label: "test_label".into(),
            description: Some("test description".into()),
            matched_text: None,
            rewrite: None,
        }
    }

    #[test]
    fn empty_matches_score_as_approve_confidence() {
        let config = AegisClawConfig::default();
        let scorer = RiskScorer::new(&config);
        let score = scorer.calculate(&[]);
        assert_eq!(score.confidence, config.approve_confidence);
        assert!(score.severity.is_none());
    }

    #[test]
    fn single_critical_match_uses_base_confidence() {
        let config = AegisClawConfig::default();
        let scorer = RiskScorer::new(&config);
        let score = scorer.calculate(&[make_match(Severity::Critical)]);
        assert_eq!(score.confidence, config.confidence_critical);
        assert_eq!(score.severity, Some(Severity::Critical));
    }

    #[test]
    fn multi_match_bonus_accumulates_and_caps() {
        let config = AegisClawConfig::default();
        let scorer = RiskScorer::new(&config);
        let matches = vec![
            make_match(Severity::High),
            make_match(Severity::Medium),
            make_match(Severity::Low),
        ];
        let score = scorer.calculate(&matches);
        // base 0.85 + bonus min(0.10, 2*0.02=0.04) = 0.89
        assert!((score.confidence - 0.89).abs() < 1e-6);
    }

    #[test]
    fn bonus_never_exceeds_max_bonus() {
        let config = AegisClawConfig::default();
        let scorer = RiskScorer::new(&config);
        let matches: Vec<RuleMatch> = (0..20).map(|_| make_match(Severity::Low)).collect();
        let score = scorer.calculate(&matches);
        // base 0.50 + max bonus 0.10 = 0.60
        assert!((score.confidence - 0.60).abs() < 1e-6);
    }

    #[test]
    fn confidence_never_exceeds_point_nine_nine() {
        let config = AegisClawConfig::default();
        let scorer = RiskScorer::new(&config);
        let matches: Vec<RuleMatch> = (0..20).map(|_| make_match(Severity::Critical)).collect();
        let score = scorer.calculate(&matches);
        assert!(score.confidence <= 0.99);
    }
}
