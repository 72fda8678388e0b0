//! Weighted roof-relevance scoring used to filter large drawing sets down to
//! the sheets worth a takeoff pass.

use std::sync::LazyLock;

use regex::RegexSet;
use serde::Serialize;

use super::page::{Discipline, PageTextUnit};

static ROOF_SHEET_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^A-?5\d{2}",
        r"(?i)^A5\.\d+",
        r"(?i)ROOF\s*PLAN",
        r"(?i)ROOF\s*DETAIL",
        r"(?i)ROOF\s*SECTION",
        r"(?i)ROOFING",
        r"(?i)^R-\d+",
        r"(?i)^RF-?\d+",
        r"(?i)^A-?[89]\d{2}",
        r"(?i)^A[89]\.\d+",
    ])
    .unwrap()
});

static EXCLUDED_SHEET_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^A-?1\d{2}",
        r"(?i)^A1\.\d+",
        r"(?i)^A-?2\d{2}",
        r"(?i)^A-?3\d{2}",
        r"(?i)^E-?\d+",
        r"(?i)^P-?\d+",
        r"(?i)^M-?\d+",
        r"(?i)^G-?\d+",
        r"(?i)^L-?\d+",
        r"(?i)^C-?\d+",
    ])
    .unwrap()
});

const ROOF_KEYWORDS: &[(&str, f64)] = &[
    ("roof plan", 1.0),
    ("roof detail", 1.0),
    ("roof section", 1.0),
    ("roofing", 1.0),
    ("roof drain", 1.0),
    ("roof hatch", 1.0),
    ("parapet", 0.9),
    ("coping", 0.9),
    ("flashing", 0.9),
    ("membrane", 0.8),
    ("tpo", 0.9),
    ("epdm", 0.9),
    ("pvc roofing", 0.9),
    ("built-up roof", 0.9),
    ("bur", 0.7),
    ("modified bitumen", 0.9),
    ("standing seam", 0.9),
    ("scupper", 0.7),
    ("overflow", 0.6),
    ("crickets", 0.7),
    ("saddle", 0.6),
    ("tapered insulation", 0.8),
    ("polyiso", 0.7),
    ("cover board", 0.7),
    ("vapor barrier", 0.6),
    ("air barrier", 0.5),
    ("rtu", 0.6),
    ("curb", 0.5),
    ("penetration", 0.5),
    ("pitch pocket", 0.7),
    ("cant strip", 0.7),
    ("edge metal", 0.7),
    ("gravel stop", 0.7),
    ("fascia", 0.5),
    ("soffit", 0.4),
    ("waterproof", 0.4),
    ("drainage", 0.4),
    ("slope", 0.3),
    ("deck", 0.3),
    ("insulation", 0.3),
    ("expansion joint", 0.5),
    ("control joint", 0.4),
];

const KEYWORD_SCALE: f64 = 0.1;
const KEYWORD_CAP: f64 = 0.4;
const SHEET_PATTERN_BONUS: f64 = 0.5;
const EXCLUDED_PENALTY: f64 = 0.2;
const TITLE_BONUS: f64 = 0.4;
const DISCIPLINE_BONUS: f64 = 0.1;
const REASON_KEYWORDS: usize = 5;

pub const DEFAULT_MIN_RELEVANCE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoofRelevance {
    pub score: f64,
    pub reasons: Vec<String>,
}

impl RoofRelevance {
    pub fn is_roof_related(&self, min_score: f64) -> bool {
        self.score >= min_score
    }
}

pub fn roof_relevance(page: &PageTextUnit, discipline: Discipline) -> RoofRelevance {
    let sheet_number = page.sheet_number.as_deref().unwrap_or("");
    let title = page.sheet_title.as_deref().unwrap_or("").to_lowercase();
    let text = page.text.to_lowercase();
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if ROOF_SHEET_PATTERNS.is_match(sheet_number) {
        score += SHEET_PATTERN_BONUS;
        reasons.push(format!("Sheet number matches roof pattern: {}", sheet_number));
    }
    if EXCLUDED_SHEET_PATTERNS.is_match(sheet_number) {
        score -= EXCLUDED_PENALTY;
    }
    if title.contains("roof") {
        score += TITLE_BONUS;
        reasons.push(format!(
            "Title contains roof reference: {}",
            page.sheet_title.as_deref().unwrap_or("")
        ));
    }

    let matched: Vec<&str> = ROOF_KEYWORDS
        .iter()
        .filter(|(kw, _)| text.contains(kw))
        .map(|(kw, _)| *kw)
        .collect();
    let keyword_score: f64 = ROOF_KEYWORDS
        .iter()
        .filter(|(kw, _)| text.contains(kw))
        .map(|(_, weight)| weight * KEYWORD_SCALE)
        .sum();
    if keyword_score > 0.0 {
        score += keyword_score.min(KEYWORD_CAP);
        reasons.push(format!(
            "Keywords found: {}",
            matched[..matched.len().min(REASON_KEYWORDS)].join(", ")
        ));
    }

    if matches!(discipline, Discipline::Architectural | Discipline::Structural) {
        score += DISCIPLINE_BONUS;
    }

    RoofRelevance {
        score: round2(score.clamp(0.0, 1.0)),
        reasons,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Tests ──
