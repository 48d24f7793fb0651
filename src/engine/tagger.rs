// Pawbird Engine — Smart Content Tagger
//
// Appends relevant account references (@handles) to generated text:
//   1. keyword → category matching (case-insensitive substring)
//   2. event keywords win outright with their fixed reference list
//   3. one weighted-random reference per matched category, no duplicates
//   4. general fallback for topically relevant text with no category
//   5. optional type-hint reference
//   6. length-aware composition: drop references until the text fits
//
// Guarantee: the result fits `length_budget`, or it is the input unchanged.
// User content is never truncated here.

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::char_len;
use log::{debug, info};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ── Catalog ────────────────────────────────────────────────────────────────

/// Root of a `tags.toml` catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct TagCatalog {
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_weight")]
    pub default_weight: u32,
    /// Fallback references for relevant text that matched no category.
    #[serde(default)]
    pub general: Vec<String>,
    /// Broad keywords that make text "topically relevant" for the fallback.
    #[serde(default)]
    pub relevance_keywords: Vec<String>,
    /// category → ordered reference list
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
    /// keyword → category name
    #[serde(default)]
    pub keywords: BTreeMap<String, String>,
    /// event keyword → fixed reference list
    #[serde(default)]
    pub events: BTreeMap<String, Vec<String>>,
    /// reference → selection weight
    #[serde(default)]
    pub weights: BTreeMap<String, u32>,
    /// type hint → reference list
    #[serde(default)]
    pub hints: BTreeMap<String, Vec<String>>,
}

fn default_max_tags() -> usize { 2 }
fn default_separator() -> String { "\n\n".into() }
fn default_weight() -> u32 { 1 }

impl TagCatalog {
    pub fn parse(content: &str) -> EngineResult<Self> {
        let mut catalog: TagCatalog = toml::from_str(content)?;
        catalog.normalize();
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::catalog(format!("Cannot read tag catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::parse(&content)?;
        info!(
            "[tagger] Loaded {} categories, {} keywords, {} events from {}",
            catalog.categories.len(),
            catalog.keywords.len(),
            catalog.events.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Keywords are matched against lowercased text.
    fn normalize(&mut self) {
        self.keywords = std::mem::take(&mut self.keywords)
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        self.events = std::mem::take(&mut self.events)
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        self.relevance_keywords = self
            .relevance_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .collect();
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_tags == 0 {
            return Err(EngineError::catalog("max_tags must be at least 1"));
        }
        if self.default_weight == 0 {
            return Err(EngineError::catalog("default_weight must be positive"));
        }
        for (name, refs) in &self.categories {
            if refs.is_empty() {
                return Err(EngineError::catalog(format!("Category '{}' has no references", name)));
            }
        }
        for (keyword, category) in &self.keywords {
            if keyword.is_empty() {
                return Err(EngineError::catalog("Empty keyword in [keywords]"));
            }
            if !self.categories.contains_key(category) {
                return Err(EngineError::catalog(format!(
                    "Keyword '{}' points to unknown category '{}'",
                    keyword, category
                )));
            }
        }
        for (keyword, refs) in &self.events {
            if keyword.is_empty() || refs.is_empty() {
                return Err(EngineError::catalog(format!("Event '{}' needs a keyword and references", keyword)));
            }
        }
        for (reference, weight) in &self.weights {
            if *weight == 0 {
                return Err(EngineError::catalog(format!("Weight for '{}' must be positive", reference)));
            }
        }
        let all_refs = self
            .categories
            .values()
            .chain(self.events.values())
            .chain(self.hints.values())
            .flatten()
            .chain(self.general.iter());
        for r in all_refs {
            if r.trim().is_empty() {
                return Err(EngineError::catalog("Empty reference in tag catalog"));
            }
        }
        Ok(())
    }
}

// ── Tagger ─────────────────────────────────────────────────────────────────

pub struct ContentTagger {
    catalog: TagCatalog,
}

impl ContentTagger {
    pub fn new(catalog: TagCatalog) -> Self {
        ContentTagger { catalog }
    }

    pub fn catalog(&self) -> &TagCatalog {
        &self.catalog
    }

    pub fn annotate(&self, content: &str, length_budget: usize, type_hint: Option<&str>) -> String {
        self.annotate_with(content, length_budget, type_hint, &mut rand::thread_rng())
    }

    pub fn annotate_with<R: Rng + ?Sized>(
        &self,
        content: &str,
        length_budget: usize,
        type_hint: Option<&str>,
        rng: &mut R,
    ) -> String {
        let refs = self.select_references(content, type_hint, rng);
        let composed = self.compose(content, &refs, length_budget);
        if composed != content {
            debug!("[tagger] Tagged with {}", &composed[content.len()..].trim());
        }
        composed
    }

    /// Categories whose keyword appears in the text, in name order.
    pub fn matched_categories(&self, content: &str) -> Vec<String> {
        let text = content.to_lowercase();
        let set: BTreeSet<&String> = self
            .catalog
            .keywords
            .iter()
            .filter(|(k, _)| text.contains(k.as_str()))
            .map(|(_, cat)| cat)
            .collect();
        set.into_iter().cloned().collect()
    }

    fn matched_event(&self, text_lower: &str) -> Option<&Vec<String>> {
        self.catalog
            .events
            .iter()
            .find(|(k, _)| text_lower.contains(k.as_str()))
            .map(|(_, refs)| refs)
    }

    fn is_relevant(&self, text_lower: &str) -> bool {
        self.catalog
            .relevance_keywords
            .iter()
            .any(|k| !k.is_empty() && text_lower.contains(k.as_str()))
    }

    fn weight_of(&self, reference: &str) -> u32 {
        self.catalog
            .weights
            .get(reference)
            .copied()
            .unwrap_or(self.catalog.default_weight)
    }

    fn weighted_pick<R: Rng + ?Sized>(&self, pool: &[String], taken: &[String], rng: &mut R) -> Option<String> {
        let candidates: Vec<&String> = pool.iter().filter(|r| !taken.contains(r)).collect();
        if candidates.is_empty() {
            return None;
        }
        let weights: Vec<u32> = candidates.iter().map(|r| self.weight_of(r)).collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        Some(candidates[dist.sample(rng)].clone())
    }

    fn select_references<R: Rng + ?Sized>(&self, content: &str, type_hint: Option<&str>, rng: &mut R) -> Vec<String> {
        let text = content.to_lowercase();
        let max_tags = self.catalog.max_tags;

        if let Some(event_refs) = self.matched_event(&text) {
            let mut refs: Vec<String> = Vec::new();
            for r in event_refs {
                if !refs.contains(r) {
                    refs.push(r.clone());
                }
            }
            return refs;
        }

        let mut refs: Vec<String> = Vec::new();
        let mut categories = self.matched_categories(content);
        categories.shuffle(rng);
        for category in &categories {
            if refs.len() >= max_tags {
                break;
            }
            if let Some(pool) = self.catalog.categories.get(category) {
                if let Some(pick) = self.weighted_pick(pool, &refs, rng) {
                    refs.push(pick);
                }
            }
        }

        if categories.is_empty() && self.is_relevant(&text) {
            if let Some(pick) = self.catalog.general.choose(rng) {
                refs.push(pick.clone());
            }
        }

        if let Some(hint) = type_hint {
            if refs.len() < max_tags {
                if let Some(pool) = self.catalog.hints.get(hint) {
                    let candidates: Vec<&String> = pool.iter().filter(|r| !refs.contains(r)).collect();
                    if let Some(pick) = candidates.choose(rng) {
                        refs.push((*pick).clone());
                    }
                }
            }
        }

        refs
    }

    /// `content + separator + refs`, dropping trailing references until it fits.
    fn compose(&self, content: &str, refs: &[String], length_budget: usize) -> String {
        let content_len = char_len(content);
        let sep_len = char_len(&self.catalog.separator);
        for n in (1..=refs.len()).rev() {
            let tail = refs[..n].join(" ");
            if content_len + sep_len + char_len(&tail) <= length_budget {
                return format!("{}{}{}", content, self.catalog.separator, tail);
            }
        }
        content.to_string()
    }
}
