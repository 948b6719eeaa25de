//! Analysis session
//!
//! `analyze` is a pure function from the form (domain, issue, per-category
//! cause text, per-cause ratings) to the view (fishbone graph + ranked FMEA
//! table). `Session` holds the form for one user and recomputes the view after
//! every edit.

use crate::collector::{parse_cause_list, prefill_from_suggestions, CategoryCauses};
use crate::error::{FishboneError, Result};
use crate::fishbone::FishboneGraph;
use crate::fmea::{rank, CauseRecord, FmeaSummary, Ratings};
use crate::render;
use crate::suggest::SuggestionOutcome;
use crate::templates::{DomainTemplate, TemplateRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// What the user typed for one category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryInput {
    pub category: String,
    /// Comma-separated causes.
    #[serde(default)]
    pub causes: String,
    /// Ratings by cause text, matched after trimming. Causes without an entry
    /// get the default ratings.
    #[serde(default)]
    pub ratings: BTreeMap<String, Ratings>,
}

impl CategoryInput {
    pub fn rating_for(&self, cause: &str) -> Option<Ratings> {
        let cause = cause.trim();
        self.ratings
            .get(cause)
            .or_else(|| {
                self.ratings
                    .iter()
                    .find(|(key, _)| key.trim() == cause)
                    .map(|(_, ratings)| ratings)
            })
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub domain: String,
    pub issue: String,
    #[serde(default)]
    pub categories: Vec<CategoryInput>,
}

impl FormState {
    /// Empty form with one entry per template category.
    pub fn blank(template: &DomainTemplate, issue: impl Into<String>) -> Self {
        Self {
            domain: template.name.clone(),
            issue: issue.into(),
            categories: template
                .categories
                .iter()
                .map(|c| CategoryInput {
                    category: c.clone(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn input_mut(&mut self, category: &str) -> &mut CategoryInput {
        if let Some(pos) = self.categories.iter().position(|c| c.category == category) {
            return &mut self.categories[pos];
        }
        self.categories.push(CategoryInput {
            category: category.to_string(),
            ..Default::default()
        });
        let last = self.categories.len() - 1;
        &mut self.categories[last]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisView {
    pub domain: String,
    pub issue: String,
    pub graph: FishboneGraph,
    /// Highest RPN first.
    pub records: Vec<CauseRecord>,
    pub summary: FmeaSummary,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisView {
    pub fn dot(&self) -> String {
        render::to_dot(&self.graph)
    }

    pub fn high_risk(&self) -> impl Iterator<Item = &CauseRecord> {
        self.records.iter().filter(|r| r.is_high_risk())
    }
}

/// Recompute graph and table from the form.
///
/// Categories come from the template, in template order. A form entry naming
/// a category the template does not have is rejected.
pub fn analyze(registry: &TemplateRegistry, form: &FormState) -> Result<AnalysisView> {
    let template = registry.get(&form.domain)?;

    let mut by_category: BTreeMap<&str, Vec<&CategoryInput>> = BTreeMap::new();
    for input in &form.categories {
        if !template.has_category(&input.category) {
            return Err(FishboneError::UnknownCategory {
                domain: template.name.clone(),
                category: input.category.clone(),
            });
        }
        by_category.entry(input.category.as_str()).or_default().push(input);
    }

    let mut branches = Vec::with_capacity(template.categories.len());
    let mut records = Vec::new();

    for category in &template.categories {
        let inputs = by_category.get(category.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let raw = inputs.iter().map(|i| i.causes.as_str()).collect::<Vec<_>>().join(",");
        let causes = parse_cause_list(&raw);

        for cause in &causes {
            let ratings = inputs
                .iter()
                .rev()
                .find_map(|i| i.rating_for(cause))
                .unwrap_or_default();
            records.push(CauseRecord::new(category.clone(), cause.clone(), ratings));
        }

        branches.push(CategoryCauses {
            category: category.clone(),
            causes,
        });
    }

    let graph = FishboneGraph::build(&form.issue, &branches);
    rank(&mut records);
    let summary = FmeaSummary::from_records(&records);

    debug!(
        domain = %template.name,
        nodes = graph.node_count(),
        causes = records.len(),
        high_risk = summary.high_risk,
        "Recomputed analysis"
    );

    Ok(AnalysisView {
        domain: template.name.clone(),
        issue: form.issue.clone(),
        graph,
        records,
        summary,
        generated_at: Utc::now(),
    })
}

/// One user's form plus the view derived from it.
pub struct Session<'a> {
    registry: &'a TemplateRegistry,
    form: FormState,
    view: AnalysisView,
}

impl<'a> Session<'a> {
    pub fn new(registry: &'a TemplateRegistry, domain: &str, issue: &str) -> Result<Self> {
        let form = FormState::blank(registry.get(domain)?, issue);
        Self::from_form(registry, form)
    }

    pub fn from_form(registry: &'a TemplateRegistry, form: FormState) -> Result<Self> {
        let view = analyze(registry, &form)?;
        Ok(Self { registry, form, view })
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn view(&self) -> &AnalysisView {
        &self.view
    }

    fn refresh(&mut self) -> Result<()> {
        self.view = analyze(self.registry, &self.form)?;
        Ok(())
    }

    /// Switching domain resets every cause and rating.
    pub fn set_domain(&mut self, domain: &str) -> Result<()> {
        let template = self.registry.get(domain)?;
        self.form = FormState::blank(template, self.form.issue.clone());
        self.refresh()
    }

    pub fn set_issue(&mut self, issue: &str) -> Result<()> {
        self.form.issue = issue.to_string();
        self.refresh()
    }

    pub fn set_causes(&mut self, category: &str, causes: &str) -> Result<()> {
        self.check_category(category)?;
        self.form.input_mut(category).causes = causes.to_string();
        self.refresh()
    }

    pub fn set_ratings(&mut self, category: &str, cause: &str, ratings: Ratings) -> Result<()> {
        self.check_category(category)?;
        self.form
            .input_mut(category)
            .ratings
            .insert(cause.trim().to_string(), ratings);
        self.refresh()
    }

    /// Fill empty categories from suggestions that mention them. Failed or
    /// unavailable suggestions leave the form untouched.
    pub fn apply_suggestions(&mut self, outcome: &SuggestionOutcome) -> Result<()> {
        let template = self.registry.get(&self.form.domain)?;
        for (category, text) in prefill_from_suggestions(&template.categories, outcome.causes()) {
            if text.is_empty() {
                continue;
            }
            let input = self.form.input_mut(&category);
            if input.causes.trim().is_empty() {
                input.causes = text;
            }
        }
        self.refresh()
    }

    fn check_category(&self, category: &str) -> Result<()> {
        let template = self.registry.get(&self.form.domain)?;
        if template.has_category(category) {
            Ok(())
        } else {
            Err(FishboneError::UnknownCategory {
                domain: template.name.clone(),
                category: category.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fmea::Rating;

    fn ratings(s: u8, o: u8, d: u8) -> Ratings {
        Ratings::new(Rating::new(s).unwrap(), Rating::new(o).unwrap(), Rating::new(d).unwrap())
    }

    #[test]
    fn test_blank_form_has_template_categories() {
        let registry = TemplateRegistry::builtin();
        let form = FormState::blank(registry.get("Retail").unwrap(), "Duplicate SKUs");
        let names: Vec<&str> = form.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["People", "Inventory", "Point of Sale", "ETL", "Vendor Data"]);
    }

    #[test]
    fn test_analyze_defaults_unrated_causes_to_five() {
        let registry = TemplateRegistry::builtin();
        let mut form = FormState::blank(registry.get("Finance").unwrap(), "Missing Customer IDs");
        form.categories[0].causes = "Untrained staff".to_string();

        let view = analyze(&registry, &form).unwrap();
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].rpn(), 125);
    }

    #[test]
    fn test_analyze_rejects_foreign_category() {
        let registry = TemplateRegistry::builtin();
        let mut form = FormState::blank(registry.get("Finance").unwrap(), "x");
        form.categories.push(CategoryInput {
            category: "Inventory".to_string(),
            causes: "stock".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            analyze(&registry, &form),
            Err(FishboneError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_analyze_follows_template_order_for_missing_entries() {
        let registry = TemplateRegistry::builtin();
        let form = FormState {
            domain: "Healthcare".to_string(),
            issue: "Invalid codes".to_string(),
            categories: vec![CategoryInput {
                category: "Regulations".to_string(),
                causes: "New ICD version".to_string(),
                ..Default::default()
            }],
        };
        let view = analyze(&registry, &form).unwrap();
        let categories: Vec<&str> = view.graph.categories().map(|n| n.label.as_str()).collect();
        assert_eq!(
            categories,
            vec!["People", "Process", "Technology", "Regulations", "Data Standards"]
        );
        assert_eq!(view.graph.node_count(), 1 + 5 + 1);
    }

    #[test]
    fn test_rating_keys_match_after_trimming() {
        let registry = TemplateRegistry::builtin();
        let mut form = FormState::blank(registry.get("Finance").unwrap(), "Missing Customer IDs");
        form.categories[0].causes = " Untrained staff ,Manual entry".to_string();
        form.categories[0]
            .ratings
            .insert("Untrained staff ".to_string(), ratings(8, 6, 4));
        form.categories[0]
            .ratings
            .insert("  Manual entry".to_string(), ratings(2, 2, 2));

        let view = analyze(&registry, &form).unwrap();
        let rpns: Vec<u16> = view.records.iter().map(|r| r.rpn()).collect();
        assert_eq!(rpns, vec![192, 8]);

        let mut session = Session::from_form(&registry, form).unwrap();
        session.set_ratings("People", " Manual entry ", ratings(3, 3, 3)).unwrap();
        assert!(session.form().categories[0].ratings.contains_key("Manual entry"));
        assert_eq!(session.view().records[1].rpn(), 27);
    }

    #[test]
    fn test_session_edits_recompute() {
        let registry = TemplateRegistry::builtin();
        let mut session = Session::new(&registry, "Finance", "Missing Customer IDs").unwrap();
        assert!(session.view().records.is_empty());

        session.set_causes("People", "Untrained staff, Manual entry").unwrap();
        session.set_ratings("People", "Untrained staff", ratings(8, 6, 4)).unwrap();
        let view = session.view();
        assert_eq!(view.records[0].cause(), "Untrained staff");
        assert_eq!(view.records[0].rpn(), 192);
        assert_eq!(view.summary.high_risk, 2);

        session.set_issue("Duplicate Customer IDs").unwrap();
        assert_eq!(session.view().graph.issue().unwrap().label, "Duplicate Customer IDs");
        assert_eq!(session.view().records.len(), 2);

        assert!(session.set_causes("Inventory", "x").is_err());

        session.set_domain("Retail").unwrap();
        assert!(session.view().records.is_empty());
        assert_eq!(session.form().domain, "Retail");
    }

    #[test]
    fn test_suggestions_fill_only_empty_categories() {
        let registry = TemplateRegistry::builtin();
        let mut session = Session::new(&registry, "Finance", "Missing Customer IDs").unwrap();
        session.set_causes("Process", "Existing cause").unwrap();

        let outcome = SuggestionOutcome::Suggested(vec![
            "People skip mandatory fields".to_string(),
            "Process lacks review".to_string(),
        ]);
        session.apply_suggestions(&outcome).unwrap();

        let form = session.form();
        assert_eq!(form.categories[0].causes, "People skip mandatory fields");
        assert_eq!(form.categories[1].causes, "Existing cause");
    }

    #[test]
    fn test_failed_suggestions_leave_form_usable() {
        let registry = TemplateRegistry::builtin();
        let mut session = Session::new(&registry, "Finance", "Missing Customer IDs").unwrap();
        session
            .apply_suggestions(&SuggestionOutcome::Failed("network down".to_string()))
            .unwrap();
        assert!(session.view().records.is_empty());

        session.set_causes("Technology", "Schema drift").unwrap();
        session.set_ratings("Technology", "Schema drift", ratings(2, 3, 4)).unwrap();
        assert_eq!(session.view().records[0].rpn(), 24);
    }
}
