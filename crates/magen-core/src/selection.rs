//! Rank metadata templates against what a caller needs.
//!
//! Platform is a hard filter. The remaining score is a weighted sum of
//! capability coverage, complexity distance and tag overlap, each in `0..=1`.
//! A criterion the caller leaves empty contributes nothing.

use crate::error::{MagenError, Result};
use crate::metadata::TemplateMetadata;
use crate::types::Platform;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Advanced,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Advanced => "advanced",
        }
    }

    fn level(self) -> i32 {
        match self {
            Complexity::Simple => 0,
            Complexity::Moderate => 1,
            Complexity::Advanced => 2,
        }
    }

    /// A template's complexity lives in its free-form `requirements` map.
    pub fn of(template: &TemplateMetadata) -> Option<Complexity> {
        template
            .requirements
            .get("complexity")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = MagenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Complexity::Simple),
            "moderate" => Ok(Complexity::Moderate),
            "advanced" => Ok(Complexity::Advanced),
            other => Err(MagenError::InvalidComplexity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateRequirements {
    pub platform: Platform,
    pub required_capabilities: Vec<String>,
    pub complexity: Option<Complexity>,
    pub tags: Vec<String>,
}

impl TemplateRequirements {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            required_capabilities: Vec::new(),
            complexity: None,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ScoreWeights {
    capability_coverage: f64,
    complexity_match: f64,
    tag_relevance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            capability_coverage: 0.4,
            complexity_match: 0.3,
            tag_relevance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedTemplate<'a> {
    pub template: &'a TemplateMetadata,
    pub score: f64,
    pub matched_capabilities: Vec<String>,
    pub missing_capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMatch<'a> {
    pub template: &'a TemplateMetadata,
    pub score: f64,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSelector {
    weights: ScoreWeights,
}

impl TemplateSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Templates on the required platform, best score first. Ties keep
    /// catalog order.
    pub fn rank<'a>(
        &self,
        templates: &[&'a TemplateMetadata],
        requirements: &TemplateRequirements,
    ) -> Vec<RankedTemplate<'a>> {
        let mut ranked: Vec<RankedTemplate<'a>> = templates
            .iter()
            .filter(|t| t.platform.platform_type == requirements.platform)
            .map(|&t| {
                let (matched, missing): (Vec<String>, Vec<String>) = requirements
                    .required_capabilities
                    .iter()
                    .cloned()
                    .partition(|cap| t.capabilities.contains(cap));
                RankedTemplate {
                    template: t,
                    score: self.score(t, requirements),
                    matched_capabilities: matched,
                    missing_capabilities: missing,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// The best template, with the reasons it was picked.
    pub fn select<'a>(
        &self,
        templates: &[&'a TemplateMetadata],
        requirements: &TemplateRequirements,
    ) -> Result<TemplateMatch<'a>> {
        let best = self
            .rank(templates, requirements)
            .into_iter()
            .next()
            .ok_or(MagenError::NoTemplateMatch)?;
        let reasoning = reasoning(&best, requirements);
        Ok(TemplateMatch {
            template: best.template,
            score: best.score,
            reasoning,
        })
    }

    fn score(&self, template: &TemplateMetadata, requirements: &TemplateRequirements) -> f64 {
        let mut score = 0.0;
        if !requirements.required_capabilities.is_empty() {
            score += overlap(&requirements.required_capabilities, &template.capabilities)
                * self.weights.capability_coverage;
        }
        if let Some(wanted) = requirements.complexity {
            score += complexity_score(wanted, Complexity::of(template)) * self.weights.complexity_match;
        }
        if !requirements.tags.is_empty() {
            score += overlap(&requirements.tags, &template.tags) * self.weights.tag_relevance;
        }
        score
    }
}

/// Share of `wanted` present in `have`.
fn overlap(wanted: &[String], have: &[String]) -> f64 {
    let hits = wanted.iter().filter(|w| have.contains(w)).count();
    hits as f64 / wanted.len() as f64
}

/// 1.0 for an exact match, 0.5 one level off, 0.0 two levels off or unknown.
fn complexity_score(wanted: Complexity, actual: Option<Complexity>) -> f64 {
    match actual {
        Some(actual) => {
            let distance = (wanted.level() - actual.level()).abs() as f64;
            (1.0 - distance * 0.5).max(0.0)
        }
        None => 0.0,
    }
}

fn reasoning(ranked: &RankedTemplate<'_>, requirements: &TemplateRequirements) -> Vec<String> {
    let template = ranked.template;
    let mut reasons = vec![format!(
        "Platform match: {} (required: {})",
        template.platform.platform_type, requirements.platform
    )];

    let wanted = requirements.required_capabilities.len();
    if wanted > 0 {
        let matched = ranked.matched_capabilities.len();
        let coverage = matched as f64 / wanted as f64 * 100.0;
        reasons.push(format!(
            "Capability coverage: {coverage:.0}% ({matched}/{wanted})"
        ));
        if matched > 0 {
            reasons.push(format!(
                "Matched capabilities: {}",
                ranked.matched_capabilities.join(", ")
            ));
        }
        if !ranked.missing_capabilities.is_empty() {
            reasons.push(format!(
                "Missing capabilities: {} (can be added via extension points)",
                ranked.missing_capabilities.join(", ")
            ));
        }
    }

    let actual = Complexity::of(template).map_or("unspecified", Complexity::as_str);
    reasons.push(match requirements.complexity {
        Some(wanted) => format!("Complexity: {actual} (requested: {wanted})"),
        None => format!("Complexity: {actual}"),
    });
    reasons.push(format!("Use case: {}", template.use_case.primary));
    reasons
}

/// Human-readable summary of a selection.
pub fn explain_selection(selected: &TemplateMatch<'_>) -> String {
    let mut lines = vec![
        format!("Selected Template: {}", selected.template.display_name),
        format!("Score: {:.2}", selected.score),
        String::new(),
        "Reasoning:".to_string(),
    ];
    lines.extend(selected.reasoning.iter().map(|r| format!("  - {r}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fixtures::metadata;
    use serde_json::json;

    fn template(
        id: &str,
        platform: Platform,
        capabilities: &[&str],
        complexity: &str,
        tags: &[&str],
    ) -> TemplateMetadata {
        let mut t = metadata(id, None);
        t.platform.platform_type = platform;
        t.capabilities = capabilities.iter().map(|s| s.to_string()).collect();
        t.tags = tags.iter().map(|s| s.to_string()).collect();
        t.requirements.insert("complexity".into(), json!(complexity));
        t
    }

    fn catalog() -> Vec<TemplateMetadata> {
        vec![
            template("ios-basic", Platform::Ios, &["navigation"], "simple", &["swiftui"]),
            template(
                "ios-field-service",
                Platform::Ios,
                &["navigation", "offline-sync", "maps"],
                "advanced",
                &["swiftui", "salesforce"],
            ),
            template("android-basic", Platform::Android, &["navigation"], "simple", &[]),
        ]
    }

    fn refs(templates: &[TemplateMetadata]) -> Vec<&TemplateMetadata> {
        templates.iter().collect()
    }

    #[test]
    fn platform_filters_before_scoring() {
        let templates = catalog();
        let ranked = TemplateSelector::new().rank(&refs(&templates), &TemplateRequirements::new(Platform::Android));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].template.id, "android-basic");
        assert_eq!(ranked[0].score, 0.0);
    }

    #[test]
    fn capabilities_drive_ranking() {
        let templates = catalog();
        let mut req = TemplateRequirements::new(Platform::Ios);
        req.required_capabilities = vec!["offline-sync".into(), "maps".into()];

        let ranked = TemplateSelector::new().rank(&refs(&templates), &req);
        assert_eq!(ranked[0].template.id, "ios-field-service");
        assert!((ranked[0].score - 0.4).abs() < 1e-9);
        assert_eq!(ranked[1].missing_capabilities, vec!["offline-sync", "maps"]);
    }

    #[test]
    fn complexity_distance_is_scored() {
        assert_eq!(complexity_score(Complexity::Simple, Some(Complexity::Simple)), 1.0);
        assert_eq!(complexity_score(Complexity::Simple, Some(Complexity::Moderate)), 0.5);
        assert_eq!(complexity_score(Complexity::Simple, Some(Complexity::Advanced)), 0.0);
        assert_eq!(complexity_score(Complexity::Simple, None), 0.0);

        let templates = catalog();
        let mut req = TemplateRequirements::new(Platform::Ios);
        req.complexity = Some(Complexity::Simple);
        let best = TemplateSelector::new().select(&refs(&templates), &req).unwrap();
        assert_eq!(best.template.id, "ios-basic");
    }

    #[test]
    fn select_explains_choice() {
        let templates = catalog();
        let mut req = TemplateRequirements::new(Platform::Ios);
        req.required_capabilities = vec!["maps".into(), "push".into()];
        req.tags = vec!["salesforce".into()];

        let best = TemplateSelector::new().select(&refs(&templates), &req).unwrap();
        assert_eq!(best.template.id, "ios-field-service");
        assert!(best.reasoning.contains(&"Capability coverage: 50% (1/2)".to_string()));
        assert!(best.reasoning.contains(&"Matched capabilities: maps".to_string()));
        assert!(best
            .reasoning
            .iter()
            .any(|r| r.starts_with("Missing capabilities: push")));
        assert!(best.reasoning.contains(&"Complexity: advanced".to_string()));

        let text = explain_selection(&best);
        assert!(text.starts_with("Selected Template: IOS-FIELD-SERVICE\nScore: 0.30"));
    }

    #[test]
    fn no_platform_match_is_an_error() {
        let templates = catalog();
        let err = TemplateSelector::new()
            .select(&refs(&templates), &TemplateRequirements::new(Platform::CrossPlatform))
            .unwrap_err();
        assert!(matches!(err, MagenError::NoTemplateMatch));
    }

    #[test]
    fn complexity_parses() {
        assert_eq!("moderate".parse::<Complexity>().unwrap(), Complexity::Moderate);
        assert!(matches!(
            "extreme".parse::<Complexity>(),
            Err(MagenError::InvalidComplexity(_))
        ));
    }
}
