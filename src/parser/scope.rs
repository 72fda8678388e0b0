use std::collections::BTreeMap;

use serde::Serialize;

use super::classify::{Classification, DrawingType};
use super::page::PageTextUnit;
use crate::error::Diagnostic;
use crate::registry::ScopeDefinition;

/// Hits needed for a full base score.
const FULL_SCORE_HITS: usize = 5;
const MAX_REPORTED_KEYWORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeMatch {
    pub scope_id: String,
    pub scope_name: String,
    pub page_number: u32,
    pub sheet_number: Option<String>,
    pub drawing_type: DrawingType,
    pub matched_keywords: Vec<String>,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalSheet {
    pub page_number: u32,
    pub sheet_number: Option<String>,
    pub drawing_type: DrawingType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShopDrawingEstimate {
    pub details_est: u32,
    pub plan_sheets: u32,
    pub detail_sheets: u32,
    pub total_estimate: u32,
}

impl ShopDrawingEstimate {
    /// Fixed takeoff policy; the integer arithmetic is reproduced as is.
    pub fn from_counts(plan_count: u32, detail_count: u32, section_count: u32) -> Self {
        // floor(1.5*d + 2*s + 0.5*p) == (3d + 4s + p) / 2 for non-negative ints
        let details_est = (3 * detail_count + 4 * section_count + plan_count) / 2;
        let plan_sheets = (plan_count / 2).max(1);
        let detail_sheets = (details_est / 10).max(1);
        let total_estimate = (plan_sheets + detail_sheets + section_count / 3).max(2);
        ShopDrawingEstimate {
            details_est,
            plan_sheets,
            detail_sheets,
            total_estimate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeAnalysis {
    pub scope_id: String,
    pub scope_name: String,
    pub pages_matched: usize,
    pub matches: Vec<ScopeMatch>,
    /// Drawing-type histogram over matched pages only.
    pub sheet_types: BTreeMap<DrawingType, usize>,
    pub critical_sheets: Vec<CriticalSheet>,
    pub manufacturers_found: Vec<String>,
    pub shop_drawings: ShopDrawingEstimate,
    pub requirements: BTreeMap<String, String>,
    pub escalate: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ScopeAnalysis {
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.matches
            .iter()
            .map(|m| m.relevance_score)
            .fold(None, |best, s| Some(best.map_or(s, |b: f64| b.max(s))))
    }
}

/// Case-insensitive substring matcher for one scope against one page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeKeywordMatcher;

impl ScopeKeywordMatcher {
    pub fn new() -> Self {
        ScopeKeywordMatcher
    }

    pub fn match_page(
        &self,
        page: &PageTextUnit,
        classification: &Classification,
        scope: &ScopeDefinition,
    ) -> Option<ScopeMatch> {
        self.match_lowered(
            page,
            &page.text.to_lowercase(),
            classification,
            &scope.search_terms(),
            scope,
        )
    }

    /// `lowered` is the page text already lower-cased; `terms` are the scope
    /// search terms in declared order.
    fn match_lowered(
        &self,
        page: &PageTextUnit,
        lowered: &str,
        classification: &Classification,
        terms: &[String],
        scope: &ScopeDefinition,
    ) -> Option<ScopeMatch> {
        let hits: Vec<&String> = terms.iter().filter(|t| lowered.contains(t.as_str())).collect();
        if hits.is_empty() {
            return None;
        }
        let base = (hits.len() as f64 / FULL_SCORE_HITS as f64).min(1.0);
        let score = (base + classification.tier.bonus()).min(1.0);
        Some(ScopeMatch {
            scope_id: scope.id.clone(),
            scope_name: scope.name.clone(),
            page_number: page.page_number,
            sheet_number: page.sheet_number.clone(),
            drawing_type: classification.drawing_type,
            matched_keywords: hits
                .into_iter()
                .take(MAX_REPORTED_KEYWORDS)
                .cloned()
                .collect(),
            relevance_score: score,
        })
    }
}

/// Runs the matcher over every page of a drawing set for one scope.
pub fn aggregate(
    pages: &[PageTextUnit],
    classifications: &[Classification],
    scope: &ScopeDefinition,
) -> ScopeAnalysis {
    let lowered: Vec<String> = pages.iter().map(|p| p.text.to_lowercase()).collect();
    aggregate_lowered(pages, &lowered, classifications, scope)
}

pub(crate) fn aggregate_lowered(
    pages: &[PageTextUnit],
    lowered: &[String],
    classifications: &[Classification],
    scope: &ScopeDefinition,
) -> ScopeAnalysis {
    let matcher = ScopeKeywordMatcher::new();
    let terms = scope.search_terms();
    let manufacturer_terms: Vec<(String, &String)> = scope
        .manufacturers
        .iter()
        .map(|m| (m.trim().to_lowercase(), m))
        .filter(|(lower, _)| !lower.is_empty())
        .collect();
    let mut diagnostics = Vec::new();
    if classifications.len() != pages.len() {
        tracing::debug!(
            scope = %scope.id,
            pages = pages.len(),
            classifications = classifications.len(),
            "classification count differs from page count"
        );
    }

    let mut matches = Vec::new();
    let mut manufacturers_found: Vec<String> = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        if page.is_blank() {
            diagnostics.push(Diagnostic::empty_input(page.label()));
            continue;
        }
        let fallback;
        let classification = match classifications.get(i) {
            Some(c) => c,
            None => {
                fallback = Classification::other(page);
                &fallback
            }
        };
        if let Some(m) = matcher.match_lowered(page, &lowered[i], classification, &terms, scope) {
            for (lower, name) in &manufacturer_terms {
                if lowered[i].contains(lower.as_str()) && !manufacturers_found.contains(*name) {
                    manufacturers_found.push((*name).clone());
                }
            }
            matches.push(m);
        }
    }

    let mut sheet_types: BTreeMap<DrawingType, usize> = BTreeMap::new();
    for m in &matches {
        *sheet_types.entry(m.drawing_type).or_default() += 1;
    }
    let critical_sheets: Vec<CriticalSheet> = matches
        .iter()
        .filter(|m| m.drawing_type.is_critical_sheet())
        .map(|m| CriticalSheet {
            page_number: m.page_number,
            sheet_number: m.sheet_number.clone(),
            drawing_type: m.drawing_type,
        })
        .collect();

    let count = |t: DrawingType| sheet_types.get(&t).copied().unwrap_or(0) as u32;
    let shop_drawings = ShopDrawingEstimate::from_counts(
        count(DrawingType::RoofPlan),
        count(DrawingType::Detail),
        count(DrawingType::WallSection) + count(DrawingType::BuildingSection),
    );

    if matches.is_empty() {
        diagnostics.push(Diagnostic::no_match(format!("scope {}", scope.id)));
    }
    tracing::debug!(scope = %scope.id, pages_matched = matches.len(), "scope aggregated");

    ScopeAnalysis {
        scope_id: scope.id.clone(),
        scope_name: scope.name.clone(),
        pages_matched: matches.len(),
        matches,
        sheet_types,
        critical_sheets,
        manufacturers_found,
        shop_drawings,
        requirements: scope.requirements.clone(),
        escalate: false,
        diagnostics,
    }
}

// ── Tests ──
