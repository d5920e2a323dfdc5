//! YAML-defined phrase/regex/exception rules.
//!
//! Ported from the reference implementation's `rule_engine.py`. Rules are
//! loaded once at construction and treated as read-only — see `spec.md`
//! §3's lifecycle note and §9's "regex compilation" design note.

use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::pipeline::model::RuleMatch;
use crate::pipeline::types::{Decision, Severity};

/// The bundled default rule corpus, shipped with the crate.
///
/// The reference implementation's `RuleEngine.default()` loads a bundled
/// `rules/openclaw_rules.yaml` that was not included in this system's
/// distillation; this crate ships an equivalent corpus covering the
/// named categories from the Content Sanitizer's pattern list that have a
/// natural Rule Engine analogue, plus a scenario rule for the `rm -rf`
/// case. Operators are expected to override this file in production.
const DEFAULT_RULES_YAML: &str = include_str!("../../rules/default.yaml");

/// Errors returned while loading a rule document.
#[derive(Debug, Error)]
pub enum RuleLoadError {
    /// The document did not parse as valid YAML at all.
    #[error("failed to parse rules document: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// The document parsed but contained no usable `rules` key.
    #[error("rules document has no top-level `rules` list")]
    MissingRulesKey,
    /// The file could not be read from disk.
    #[error("failed to read rules file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Raw `when:` clause as it appears in YAML, before compilation.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawWhen {
    #[serde(default)]
    scenario: Option<String>,
    #[serde(default)]
    contains_any: Option<RawPhrases>,
    #[serde(default)]
    contains_all: Option<RawPhrases>,
    #[serde(default)]
    matches_pattern: Option<String>,
    #[serde(default)]
    not_contains: Option<RawPhrases>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawPhrases {
    #[serde(default)]
    phrases: Vec<String>,
}

/// Raw `then:` clause as it appears in YAML.
#[derive(Debug, Clone, Deserialize)]
struct RawThen {
    decision: Decision,
    severity: Severity,
    risk_label: String,
    #[serde(default)]
    rewrite: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    when: RawWhen,
    then: RawThen,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDocument {
    #[serde(default)]
    rules: Vec<RawRule>,
}

/// A single compiled rule.
///
/// Immutable after construction, per `spec.md` §3. If `matches_pattern`'s
/// source regex failed to compile, `pattern` is `None` and that condition
/// is treated as absent — the rule itself is never dropped for this
/// reason.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Stable rule identifier.
    pub id: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Restricts this rule to requests whose scenario equals this tag.
    pub scenario: Option<String>,
    /// Lowercased phrases; rule matches if at least one appears in the text.
    pub contains_any: Vec<String>,
    /// Lowercased phrases; rule matches only if every one appears.
    pub contains_all: Vec<String>,
    /// Compiled, case-insensitive pattern. `None` if the source failed to compile.
    pub pattern: Option<Regex>,
    /// Lowercased phrases; rule matches only if none of these appear (veto).
    pub not_contains: Vec<String>,
    /// Decision to apply when this rule matches.
    pub decision: Decision,
    /// Severity to apply when this rule matches.
    pub severity: Severity,
    /// Short machine-oriented risk label.
    pub risk_label: String,
    /// Replacement text, used when `decision == Decision::Modify`.
    pub rewrite: Option<String>,
}

impl Rule {
    fn from_raw(raw: RawRule) -> Self {
        let pattern = raw.when.matches_pattern.as_deref().and_then(|src| {
            match Regex::new(&format!("(?i){src}")) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::error!(rule_id = %raw.id, pattern = %src, error = %err, "rule pattern failed to compile; disabling that condition");
                    None
                }
            }
        });

        Self {
            id: raw.id,
            description: raw.description,
            scenario: raw.when.scenario,
            contains_any: lower_all(raw.when.contains_any.map(|p| p.phrases).unwrap_or_default()),
            contains_all: lower_all(raw.when.contains_all.map(|p| p.phrases).unwrap_or_default()),
            pattern,
            not_contains: lower_all(raw.when.not_contains.map(|p| p.phrases).unwrap_or_default()),
            decision: raw.then.decision,
            severity: raw.then.severity,
            risk_label: raw.then.risk_label,
            rewrite: raw.then.rewrite,
        }
    }

    /// Evaluates this rule against already-lowercased `text_lower` and the
    /// original-case `text`. Returns the matched substring, if any
    /// condition supplied one — `matches_pattern` wins over `contains_any`
    /// when both are present, per `spec.md` §4.2.
    fn evaluate(&self, text: &str, text_lower: &str, scenario: Option<&str>) -> Option<Option<String>> {
        if let Some(rule_scenario) = &self.scenario {
            if scenario != Some(rule_scenario.as_str()) {
                return None;
            }
        }

        let mut matched_text: Option<String> = None;

        if !self.contains_any.is_empty() {
            let hit = self.contains_any.iter().find(|phrase| text_lower.contains(phrase.as_str()))?;
            matched_text = Some(hit.clone());
        }

        if !self.contains_all.is_empty() && !self.contains_all.iter().all(|phrase| text_lower.contains(phrase.as_str())) {
            return None;
        }

        if let Some(pattern) = &self.pattern {
            let found = pattern.find(text)?;
            matched_text = Some(found.as_str().to_string());
        }

        if self.not_contains.iter().any(|phrase| text_lower.contains(phrase.as_str())) {
            return None;
        }

        Some(matched_text)
    }
}

fn lower_all(phrases: Vec<String>) -> Vec<String> {
    phrases.into_iter().map(|p| p.to_lowercase()).collect()
}

/// Sort key used to order [`RuleMatch`]es: lower rank sorts first
/// (`Critical` = 0).
fn severity_rank(severity: Severity) -> u8 {
    severity.rank()
}

/// Loaded, ready-to-evaluate rule set.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Arc<Vec<Rule>>,
}

impl RuleEngine {
    /// Parses `yaml` as a rules document. Structurally invalid rules
    /// (missing `id`, missing `then`) are skipped with an error log and
    /// counted; a whole-document parse failure returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleLoadError::Parse`] if `yaml` is not valid YAML, or
    /// [`RuleLoadError::MissingRulesKey`] if it parses but has no `rules`
    /// list at all (distinguishing "empty corpus" from "malformed
    /// document").
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RuleLoadError> {
        let doc: RawDocument = serde_yaml::from_str(yaml)?;
        if doc.rules.is_empty() && !yaml.contains("rules:") {
            return Err(RuleLoadError::MissingRulesKey);
        }

        let mut skipped = 0usize;
        let rules: Vec<Rule> = doc
            .rules
            .into_iter()
            .filter_map(|raw| {
                if raw.id.trim().is_empty() {
                    skipped += 1;
                    tracing::error!("skipping rule with empty id");
                    return None;
                }
                Some(Rule::from_raw(raw))
            })
            .collect();

        if skipped > 0 {
            tracing::warn!(skipped, "some rules were skipped while loading");
        }

        Ok(Self { rules: Arc::new(rules) })
    }

    /// Loads and parses a rules document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RuleLoadError::Io`] if the file cannot be read, or the
    /// errors documented on [`RuleEngine::from_yaml_str`].
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, RuleLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// The bundled default rule corpus.
    ///
    /// # Panics
    ///
    /// Panics if the bundled `rules/default.yaml` fails to parse — this
    /// would indicate a packaging defect in this crate, not a caller
    /// error.
    #[must_use]
    pub fn default_rules() -> Self {
        Self::from_yaml_str(DEFAULT_RULES_YAML).expect("bundled rules/default.yaml must parse")
    }

    /// Number of loaded rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates `text` against every loaded rule, returning matches
    /// sorted by severity ascending rank (CRITICAL first); ties are
    /// broken by load order, since [`Vec::sort_by_key`] is stable.
    #[must_use]
    pub fn evaluate(&self, text: &str, scenario: Option<&str>) -> Vec<RuleMatch> {
        let text_lower = text.to_lowercase();

        let mut matches: Vec<RuleMatch> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let matched_text = rule.evaluate(text, &text_lower, scenario)?;
                Some(RuleMatch {
                    rule_id: rule.id.clone(),
                    decision: rule.decision,
                    severity: rule.severity,
                    risk_label: rule.risk_label.clone(),
                    description: rule.description.clone(),
                    matched_text,
                    rewrite: rule.rewrite.clone(),
                })
            })
            .collect();

        matches.sort_by_key(|m| severity_rank(m.severity));
        matches
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
rules:
  - id: destructive_command
    description: Destructive shell command
    when:
      contains_any:
        phrases: ["rm -rf"]
    then:
      decision: block
      severity: critical
      risk_label: destructive_command
  - id: low_priority_notice
    when:
      contains_any:
        phrases: ["notice"]
    then:
      decision: modify
      severity: low
      risk_label: low_priority_notice
      rewrite: "[redacted notice]"
"#;

    #[test]
    fn loads_and_evaluates_contains_any() {
        let engine = RuleEngine::from_yaml_str(SAMPLE_YAML).unwrap();
        assert_eq!(engine.len(), 2);
        let matches = engine.evaluate("please run rm -rf / now", None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "destructive_command");
        assert_eq!(matches[0].severity, Severity::Critical);
    }

    #[test]
    fn sorts_matches_by_severity_critical_first() {
        let engine = RuleEngine::from_yaml_str(SAMPLE_YAML).unwrap();
        let matches = engine.evaluate("rm -rf / and also this notice", None);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].severity, Severity::Critical);
        assert_eq!(matches[1].severity, Severity::Low);
    }

    #[test]
    fn scenario_restricted_rule_only_fires_for_matching_scenario() {
        const YAML: &str = r#"
rules:
  - id: shell_only
    when:
      scenario: shell
      contains_any:
        phrases: ["danger"]
    then:
      decision: block
      severity: high
      risk_label: shell_only
"#;
        let engine = RuleEngine::from_yaml_str(YAML).unwrap();
        assert!(engine.evaluate("danger zone", None).is_empty());
        assert_eq!(engine.evaluate("danger zone", Some("shell")).len(), 1);
    }

    #[test]
    fn not_contains_vetoes_a_match() {
        const YAML: &str = r#"
rules:
  - id: vetoable
    when:
      contains_any:
        phrases: ["delete"]
      not_contains:
        phrases: ["trash can"]
    then:
      decision: block
      severity: medium
      risk_label: vetoable
"#;
        let engine = RuleEngine::from_yaml_str(YAML).unwrap();
        assert!(engine.evaluate("please delete the trash can item", None).is_empty());
        assert_eq!(engine.evaluate("please delete the file", None).len(), 1);
    }

    #[test]
    fn invalid_regex_disables_condition_but_keeps_rule() {
        const YAML: &str = r#"
rules:
  - id: broken_pattern
    when:
      matches_pattern: "("
      contains_any:
        phrases: ["fallback"]
    then:
      decision: block
      severity: high
      risk_label: broken_pattern
"#;
        let engine = RuleEngine::from_yaml_str(YAML).unwrap();
        assert_eq!(engine.len(), 1);
        assert!(engine.evaluate("fallback text", None).len() == 1);
    }

    #[test]
    fn skips_rule_with_empty_id() {
        const YAML: &str = r#"
rules:
  - id: ""
    when:
      contains_any:
        phrases: ["x"]
    then:
      decision: block
      severity: high
      risk_label: nope
"#;
        let engine = RuleEngine::from_yaml_str(YAML).unwrap();
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn default_rules_load_successfully() {
        let engine = RuleEngine::default_rules();
        assert!(!engine.is_empty());
    }
}
