//! Domain templates
//!
//! A template names the fishbone categories ("bones") that make sense for a
//! business domain. The registry is built once and handed to whoever needs it.

use crate::error::{FishboneError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTemplate {
    pub name: String,
    pub categories: Vec<String>,
}

impl DomainTemplate {
    pub fn new(name: impl Into<String>, categories: &[&str]) -> Self {
        Self {
            name: name.into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FishboneError::InvalidTemplate("template name is empty".to_string()));
        }
        if self.categories.is_empty() {
            return Err(FishboneError::InvalidTemplate(format!(
                "template '{}' has no categories",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.trim().is_empty() {
                return Err(FishboneError::InvalidTemplate(format!(
                    "template '{}' has an empty category",
                    self.name
                )));
            }
            if !seen.insert(category.as_str()) {
                return Err(FishboneError::InvalidTemplate(format!(
                    "template '{}' lists category '{}' twice",
                    self.name, category
                )));
            }
        }
        Ok(())
    }
}

/// Ordered set of templates, keyed by name.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<DomainTemplate>,
}

impl TemplateRegistry {
    pub fn new(templates: Vec<DomainTemplate>) -> Result<Self> {
        let mut registry = Self { templates: Vec::new() };
        for template in templates {
            registry.insert(template)?;
        }
        Ok(registry)
    }

    /// The three domains shipped with the tool.
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                DomainTemplate::new(
                    "Finance",
                    &["People", "Process", "Technology", "Source Systems", "Measurement"],
                ),
                DomainTemplate::new(
                    "Healthcare",
                    &["People", "Process", "Technology", "Regulations", "Data Standards"],
                ),
                DomainTemplate::new(
                    "Retail",
                    &["People", "Inventory", "Point of Sale", "ETL", "Vendor Data"],
                ),
            ],
        }
    }

    /// Load templates from a JSON array of `{"name": .., "categories": [..]}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let templates: Vec<DomainTemplate> = serde_json::from_str(&content)?;
        info!("Loaded {} templates from {}", templates.len(), path.display());
        Self::new(templates)
    }

    /// Built-in templates plus the ones in `path`; same-named entries replace the built-in.
    pub fn builtin_with_file(path: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        for template in Self::from_json_file(path)?.templates {
            registry.insert(template)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, template: DomainTemplate) -> Result<()> {
        template.validate()?;
        match self.templates.iter_mut().find(|t| t.name == template.name) {
            Some(existing) => {
                debug!(domain = %template.name, "Replacing template");
                *existing = template;
            }
            None => self.templates.push(template),
        }
        Ok(())
    }

    /// Exact name match first, then case-insensitive.
    pub fn get(&self, name: &str) -> Result<&DomainTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.templates.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
            .ok_or_else(|| FishboneError::UnknownDomain(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn templates(&self) -> &[DomainTemplate] {
        &self.templates
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
