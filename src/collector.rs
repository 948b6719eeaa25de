//! Cause collection: free-text, comma-separated cause lists per category.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Causes entered for one category, in entry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCauses {
    pub category: String,
    pub causes: Vec<String>,
}

/// Split a comma-separated cause list.
///
/// Entries are trimmed, blanks are dropped, and a cause repeated within the
/// same list is kept once (first spelling wins).
pub fn parse_cause_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Default cause text per category from a list of suggestions.
///
/// A suggestion goes to every category whose name it mentions
/// (case-insensitive). Categories without a match get an empty string.
pub fn prefill_from_suggestions(categories: &[String], suggestions: &[String]) -> Vec<(String, String)> {
    categories
        .iter()
        .map(|category| {
            let needle = category.to_lowercase();
            let text = suggestions
                .iter()
                .filter(|s| s.to_lowercase().contains(&needle))
                .join(", ");
            (category.clone(), text)
        })
        .collect()
}
