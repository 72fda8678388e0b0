pub mod classify;
pub mod extract;
pub mod page;
pub mod relevance;
pub mod scope;
pub mod sections;
pub mod spec;

use rayon::prelude::*;
use serde::Serialize;

use crate::error::Diagnostic;
use crate::escalation::Escalation;
use crate::registry::ScopeRegistry;
use crate::settings::Settings;
use classify::{Classification, DrawingTypeClassifier};
use extract::AssemblyRecord;
use page::{Discipline, PageTextUnit};
use relevance::RoofRelevance;
use scope::ScopeAnalysis;
use sections::AssemblySectionSplitter;
use spec::SpecSummary;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    pub page_number: u32,
    /// Title-block sheet number, or a `PAGE-n` placeholder.
    pub sheet_number: String,
    pub sheet_title: Option<String>,
    pub discipline: Discipline,
    pub classification: Classification,
    pub relevance: RoofRelevance,
    pub roof_related: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawingSetStats {
    pub pages_analyzed: usize,
    pub roof_related_pages: usize,
    /// Percentage of pages screened out as not roof related.
    pub filter_efficiency: f64,
}

impl DrawingSetStats {
    fn new(pages_analyzed: usize, roof_related_pages: usize) -> Self {
        let kept = roof_related_pages as f64 / pages_analyzed.max(1) as f64 * 100.0;
        DrawingSetStats {
            pages_analyzed,
            roof_related_pages,
            filter_efficiency: ((100.0 - kept) * 10.0).round() / 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawingSetReport {
    pub document: String,
    pub pages: Vec<PageReport>,
    pub scopes: Vec<ScopeAnalysis>,
    pub stats: DrawingSetStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl DrawingSetReport {
    pub fn escalated(&self) -> impl Iterator<Item = &ScopeAnalysis> {
        self.scopes.iter().filter(|s| s.escalate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyReport {
    pub document: String,
    /// No roof-area heading was accepted; the whole letter is one assembly.
    pub implicit: bool,
    pub assemblies: Vec<AssemblyRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Ties the classifier, registry, splitter and escalation policy together.
/// Holds no per-document state, so one engine serves any number of inputs.
pub struct Engine {
    settings: Settings,
    classifier: DrawingTypeClassifier,
    registry: ScopeRegistry,
    splitter: AssemblySectionSplitter,
    escalation: Box<dyn Escalation>,
}

impl Engine {
    pub fn new(settings: Settings, registry: ScopeRegistry, escalation: Box<dyn Escalation>) -> Self {
        let splitter = AssemblySectionSplitter::new(settings.section_lookahead);
        Engine {
            settings,
            classifier: DrawingTypeClassifier::new(),
            registry,
            splitter,
            escalation,
        }
    }

    /// Registry and escalation policy as the settings describe them.
    pub fn from_settings(settings: Settings) -> crate::error::Result<Self> {
        let registry = settings.registry()?;
        let escalation = settings.escalation.policy();
        Ok(Self::new(settings, registry, escalation))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn analyze_drawings(&self, name: &str, pages: Vec<PageTextUnit>) -> DrawingSetReport {
        let mut pages: Vec<PageTextUnit> = pages
            .into_par_iter()
            .map(|p| self.prepare_page(p).normalized())
            .collect();
        pages.sort_by_key(|p| p.page_number);

        let mut diagnostics = Vec::new();
        if pages.is_empty() || pages.iter().all(PageTextUnit::is_blank) {
            diagnostics.push(Diagnostic::empty_input(format!("drawing set {}", name)));
        }

        let min_relevance = self.settings.min_roof_relevance;
        let page_reports: Vec<PageReport> = pages
            .par_iter()
            .map(|p| {
                let discipline = p
                    .sheet_number
                    .as_deref()
                    .map_or(Discipline::Unknown, Discipline::from_sheet_number);
                let relevance = relevance::roof_relevance(p, discipline);
                PageReport {
                    page_number: p.page_number,
                    sheet_number: p
                        .sheet_number
                        .clone()
                        .unwrap_or_else(|| page::placeholder_sheet_number(p.page_number)),
                    sheet_title: p.sheet_title.clone(),
                    discipline,
                    classification: self.classifier.classify_page(p),
                    roof_related: relevance.is_roof_related(min_relevance),
                    relevance,
                }
            })
            .collect();

        let classifications: Vec<Classification> =
            page_reports.iter().map(|r| r.classification.clone()).collect();
        let lowered: Vec<String> = pages.par_iter().map(|p| p.text.to_lowercase()).collect();

        let scopes: Vec<ScopeAnalysis> = self
            .registry
            .scopes()
            .par_iter()
            .map(|def| {
                let mut analysis = scope::aggregate_lowered(&pages, &lowered, &classifications, def);
                analysis.escalate = self.escalation.escalate(&analysis);
                analysis
            })
            .filter(|a| self.settings.include_empty_scopes || a.has_matches())
            .collect();

        let roof_related = page_reports.iter().filter(|r| r.roof_related).count();
        let stats = DrawingSetStats::new(page_reports.len(), roof_related);
        tracing::info!(
            document = name,
            pages = stats.pages_analyzed,
            roof_related = stats.roof_related_pages,
            scopes = scopes.len(),
            escalated = scopes.iter().filter(|s| s.escalate).count(),
            "analyzed drawing set"
        );

        DrawingSetReport {
            document: name.to_string(),
            pages: page_reports,
            scopes,
            stats,
            diagnostics,
        }
    }

    /// Fill in a missing sheet number and title from the raw page text,
    /// before line breaks are collapsed. A page whose number cannot be found
    /// keeps `None`; the placeholder only appears in the report.
    fn prepare_page(&self, mut page: PageTextUnit) -> PageTextUnit {
        if !self.settings.infer_sheet_info {
            return page;
        }
        if page.sheet_number.is_none() {
            let inferred = page::infer_sheet_number(&page.text, page.page_number);
            if !page::is_placeholder_sheet_number(&inferred) {
                page.sheet_number = Some(inferred);
            }
        }
        if page.sheet_title.is_none() {
            page.sheet_title = page::infer_sheet_title(&page.text);
        }
        page
    }

    pub fn extract_assemblies(&self, name: &str, text: &str) -> AssemblyReport {
        let split = self.splitter.split(text);
        let assemblies: Vec<AssemblyRecord> = split.sections.iter().map(extract::extract_section).collect();
        tracing::info!(
            document = name,
            assemblies = assemblies.len(),
            implicit = split.implicit,
            "extracted assemblies"
        );
        AssemblyReport {
            document: name.to_string(),
            implicit: split.implicit,
            assemblies,
            diagnostics: split.diagnostics,
        }
    }

    pub fn parse_spec(&self, name: &str, text: &str) -> SpecSummary {
        SpecSummary {
            document: name.to_string(),
            ..spec::parse_spec(text)
        }
    }
}

// ── Tests ──
