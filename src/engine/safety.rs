//! Category-tagged weighted regex scoring.
//!
//! Ported from the reference implementation's `safety_classifier.py`.

use regex::Regex;

use crate::config::AegisClawConfig;
use crate::pipeline::model::SafetyScore;
use crate::pipeline::types::SafetyCategory;

struct WeightedPattern {
    regex: Regex,
    weight: f32,
}

fn safety_corpus() -> Vec<(SafetyCategory, Vec<(&'static str, f32)>)> {
    vec![
        (
            SafetyCategory::Dangerous,
            vec![
                (r"(?i)\bhow (do|can) i (make|build)\b.{0,20}\b(bomb|explosive|weapon)\b", 0.95),
                (r"(?i)\b(poison|lethal dose)\b.{0,20}\b(recipe|how to)\b", 0.90),
                (r"(?i)\bself[- ]harm\b", 0.85),
                (r"폭탄\s*(제조|만드는)\s*방법", 0.95),
            ],
        ),
        (
            SafetyCategory::Harassment,
            vec![
                (r"(?i)\bi will (find|kill|hurt) you\b", 0.90),
                (r"(?i)\bstalk(ing)?\b.{0,20}\b(you|her|him|them)\b", 0.75),
                (r"(?i)\byou should (die|kill yourself)\b", 0.95),
                (r"죽여\s*버리겠다", 0.90),
            ],
        ),
        (
            SafetyCategory::HateSpeech,
            vec![
                (r"(?i)\b(all|those) (immigrants|jews|muslims|christians|women|men)\b.{0,20}\b(inferior|subhuman|vermin)\b", 0.95),
                (r"(?i)\bracial slur\b", 0.60),
                (r"혐오\s*발언", 0.70),
            ],
        ),
        (
            SafetyCategory::Sexual,
            vec![
                (r"(?i)\bexplicit sexual (content|description)\b", 0.80),
                (r"(?i)\bnsfw\b.{0,20}\bdetailed\b", 0.65),
                (r"음란물", 0.80),
            ],
        ),
        (
            SafetyCategory::Toxic,
            vec![
                (r"(?i)\byou('re| are) (an? )?(idiot|moron|worthless)\b", 0.65),
                (r"(?i)\bshut up\b.{0,10}\b(loser|trash)\b", 0.60),
                (r"병신", 0.65),
            ],
        ),
    ]
}

/// Compiled category → weighted-pattern table.
pub struct SafetyClassifier {
    compiled: Vec<(SafetyCategory, Vec<WeightedPattern>)>,
    safety_threshold: f32,
}

impl SafetyClassifier {
    /// Builds a classifier, compiling every built-in pattern.
    ///
    /// # Panics
    ///
    /// Panics if a built-in pattern fails to compile (packaging defect).
    #[must_use]
    pub fn new(config: &AegisClawConfig) -> Self {
        let compiled = safety_corpus()
            .into_iter()
            .map(|(category, patterns)| {
                let patterns = patterns
                    .into_iter()
                    .map(|(src, weight)| WeightedPattern {
                        regex: Regex::new(src).expect("built-in safety pattern must compile"),
                        weight,
                    })
                    .collect();
                (category, patterns)
            })
            .collect();

        Self { compiled, safety_threshold: config.safety_threshold }
    }

    /// Classifies `text`, returning the argmax category and its weight,
    /// or `SAFE` if nothing cleared `safety_threshold`.
    #[must_use]
    pub fn classify(&self, text: &str) -> SafetyScore {
        let mut max_category = SafetyCategory::Safe;
        let mut max_score = 0.0f32;

        for (category, patterns) in &self.compiled {
            let category_max = patterns
                .iter()
                .filter(|p| p.regex.is_match(text))
                .map(|p| p.weight)
                .fold(0.0f32, f32::max);

            if category_max > max_score {
                max_score = category_max;
                max_category = *category;
            }
        }

        if max_score < self.safety_threshold {
            SafetyScore {
                is_safe: true,
                category: SafetyCategory::Safe,
                confidence: 1.0 - max_score,
                backend_tag: "rule_based".to_string(),
            }
        } else {
            tracing::warn!(category = %max_category, score = max_score, "unsafe content classified");
            SafetyScore {
                is_safe: false,
                category: max_category,
                confidence: max_score,
                backend_tag: "rule_based".to_string(),
            }
        }
    }
}
