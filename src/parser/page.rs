use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SHEET_NUMBER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b([A-Z]-?\d{3}(?:\.\d+)?)\b",
        r"(?i)\bSheet\s*(?:No\.?|#)?\s*:?\s*([A-Z]{0,3}-?\d[A-Z0-9.-]*)",
        r"(?i)\b([A-Z]{1,2}\d{1,2}\.\d{1,2})\b",
        r"(?im)^([A-Z]-?\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SHEET_TITLE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(?:ROOF\s+PLAN|ROOFING\s+PLAN)[^\n]*",
        r"(?i)(?:ROOF\s+DETAIL|ROOFING\s+DETAIL)S?[^\n]*",
        r"(?i)ROOF\s+SECTIONS?[^\n]*",
        r"(?i)ENLARGED\s+ROOF[^\n]*",
        r"(?i)\bLEVEL\s+\d+\s+ROOF[^\n]*",
        r"(?i)\b(?:HIGH|LOW|MAIN)\s+ROOF[^\n]*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const MAX_TITLE_CHARS: usize = 100;

/// One page of extracted text as handed over by the PDF collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTextUnit {
    pub page_number: u32,
    #[serde(default)]
    pub sheet_number: Option<String>,
    #[serde(default)]
    pub sheet_title: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl PageTextUnit {
    pub fn new(
        page_number: u32,
        sheet_number: Option<&str>,
        sheet_title: Option<&str>,
        text: &str,
    ) -> Self {
        PageTextUnit {
            page_number,
            sheet_number: non_blank(sheet_number),
            sheet_title: non_blank(sheet_title),
            text: normalize_text(text),
        }
    }

    /// Re-applies normalization to a unit that came straight from serde.
    pub fn normalized(self) -> Self {
        PageTextUnit::new(
            self.page_number,
            self.sheet_number.as_deref(),
            self.sheet_title.as_deref(),
            &self.text,
        )
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Title and body together, which is what the classifier sees.
    pub fn searchable_text(&self) -> String {
        match &self.sheet_title {
            Some(title) => format!("{} {}", title, self.text),
            None => self.text.clone(),
        }
    }

    pub fn label(&self) -> String {
        match &self.sheet_number {
            Some(sheet) => format!("page {} ({})", self.page_number, sheet),
            None => format!("page {}", self.page_number),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(|v| normalize_text(v))
        .filter(|v| !v.is_empty())
}

/// Strip control characters and collapse all whitespace runs to one space.
pub fn normalize_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .join(" ")
}

/// AIA discipline designator, taken from the first letter of a sheet number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    General,
    Civil,
    Landscape,
    Structural,
    Architectural,
    Interiors,
    Equipment,
    FireProtection,
    Plumbing,
    Mechanical,
    Electrical,
    Unknown,
}

impl Discipline {
    pub fn from_sheet_number(sheet_number: &str) -> Self {
        match sheet_number.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('G') => Discipline::General,
            Some('C') => Discipline::Civil,
            Some('L') => Discipline::Landscape,
            Some('S') => Discipline::Structural,
            Some('A') => Discipline::Architectural,
            Some('I') => Discipline::Interiors,
            Some('Q') => Discipline::Equipment,
            Some('F') => Discipline::FireProtection,
            Some('P') => Discipline::Plumbing,
            Some('M') => Discipline::Mechanical,
            Some('E') => Discipline::Electrical,
            _ => Discipline::Unknown,
        }
    }
}

/// Placeholder used when no sheet number can be found on a page.
pub fn placeholder_sheet_number(page_number: u32) -> String {
    format!("PAGE-{}", page_number)
}

pub fn is_placeholder_sheet_number(sheet_number: &str) -> bool {
    sheet_number
        .strip_prefix("PAGE-")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Title-block sheet number: the most frequent hit of the first pattern
/// family that matches anything.
pub fn infer_sheet_number(text: &str, page_number: u32) -> String {
    for re in SHEET_NUMBER_RES.iter() {
        let hits: Vec<String> = re
            .captures_iter(text)
            .map(|c| c[1].to_uppercase())
            .collect();
        if hits.is_empty() {
            continue;
        }
        let counts = hits.iter().counts();
        // ties keep the first-seen hit
        let mut best: Option<(&String, usize)> = None;
        for hit in hits.iter().unique() {
            let n = counts[hit];
            if best.map_or(true, |(_, b)| n > b) {
                best = Some((hit, n));
            }
        }
        if let Some((hit, _)) = best {
            return hit.clone();
        }
    }
    placeholder_sheet_number(page_number)
}

pub fn infer_sheet_title(text: &str) -> Option<String> {
    SHEET_TITLE_RES.iter().find_map(|re| {
        re.find(text).map(|m| {
            m.as_str()
                .trim()
                .chars()
                .take(MAX_TITLE_CHARS)
                .collect::<String>()
        })
    })
}

// ── Tests ──
