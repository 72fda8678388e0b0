//! Division 07 specification sections: number, title, category, listed
//! manufacturers, products and the submittal requirements.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use serde::Serialize;

use crate::error::Diagnostic;

/// Below this many characters the PDF most likely had no text layer.
pub const MIN_TEXT_CHARS: usize = 100;
const NUMBER_SEARCH_CHARS: usize = 2000;
const TITLE_SEARCH_CHARS: usize = 3000;
const MIN_REQUIREMENT_CHARS: usize = 15;
const MIN_MANUFACTURER_CHARS: usize = 3;
const MIN_PRODUCT_CHARS: usize = 3;

pub const OTHER_SUBMITTAL_TYPES: &[&str] = &[
    "Product Data",
    "Samples",
    "Qualification Data",
    "Product Test Reports",
    "Field Reports",
    "Warranties",
    "Closeout Submittals",
    "Maintenance Data",
];

// Most specific first.
static NUMBER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(07\s?\d{2}\s?\d{2}\.\d{2})\b",
        r"\b(07\s?\d{2}\s?\d{2})\b",
        r"\b(07\s?\d{2})\b",
        r"(?i)\bdivision\s+(07)\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:SECTION\s+)?\b07\s?\d{2}\s?\d{2}(?:\.\d{2})?\s*[-–]\s*([A-Z][A-Z0-9 ()&/,.-]*[A-Z)])").unwrap()
});

static MANUFACTURERS_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:basis-of-design\s+products?|(?:available|acceptable|approved)\s+manufacturers|manufacturers(?:\s+offering\b[^:\n]*)?)\s*:").unwrap()
});

static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+\.\d+\s+[A-Z]|PART\s+\d)").unwrap());
static ACTION_SUBMITTALS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+\.\d+\s+)?ACTION\s+SUBMITTALS\b").unwrap());
static SUBMITTALS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+\.\d+\s+)?(?:[A-Z]+\s+)?SUBMITTALS?\b").unwrap());
static PRODUCTS_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*PART\s+2\s*[-–]\s*PRODUCTS\b").unwrap());
static EXECUTION_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:PART\s+3\b|EXECUTION\b)").unwrap());
/// "2.2 TPO ROOFING"
static PRODUCT_ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\d+\s+([A-Z][A-Z0-9 &/()-]*[A-Z0-9)])\s*$").unwrap());
/// "B. Source Limitations: ..."
static PRODUCT_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[A-Z]\.\s+([A-Z][A-Za-z0-9 -]*[A-Za-z0-9]):").unwrap());
static SHOP_DRAWINGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:[A-Z]\.\s+)?shop\s+drawings?\s*:?").unwrap());

/// A capital-lettered paragraph such as "B. Samples: ...".
static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[A-Z]\.\s+\S").unwrap());
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[a-z][.)]|•|-)\s+").unwrap());
static DOT_LEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());
static COMPANY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),?\s+(?:inc(?:orporated)?|llc|l\.l\.c|company|co|corp(?:oration)?)\.?$").unwrap()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    #[default]
    Success,
    /// Too little text; the source probably needs OCR.
    NoText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpecCategory {
    Roofing,
    Waterproofing,
    #[serde(rename = "Wall Panel/Flashing")]
    WallPanelFlashing,
    #[serde(rename = "Joint Sealants")]
    JointSealants,
    #[serde(rename = "Other Div07")]
    OtherDiv07,
}

impl SpecCategory {
    /// Bucket on the third digit of a Division 07 number.
    pub fn from_number(number: &str) -> Self {
        let mut digits = number.chars().filter(char::is_ascii_digit);
        let division: String = digits.by_ref().take(2).collect();
        if division != "07" {
            return SpecCategory::OtherDiv07;
        }
        match digits.next() {
            Some('2'..='4') => SpecCategory::Roofing,
            Some('5' | '6') => SpecCategory::Waterproofing,
            Some('7' | '8') => SpecCategory::WallPanelFlashing,
            Some('9') => SpecCategory::JointSealants,
            _ => SpecCategory::OtherDiv07,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecCategory::Roofing => "Roofing",
            SpecCategory::Waterproofing => "Waterproofing",
            SpecCategory::WallPanelFlashing => "Wall Panel/Flashing",
            SpecCategory::JointSealants => "Joint Sealants",
            SpecCategory::OtherDiv07 => "Other Div07",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecSummary {
    pub document: String,
    pub status: SpecStatus,
    pub spec_number: String,
    pub spec_title: String,
    pub category: Option<SpecCategory>,
    pub manufacturers: Vec<String>,
    /// Article titles and labeled paragraphs of PART 2 - PRODUCTS.
    pub products: Vec<String>,
    pub shop_drawing_requirements: Vec<String>,
    pub other_submittals: BTreeMap<String, Vec<String>>,
    pub text_length: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Collapse runs of spaces inside each line; line breaks are kept because
/// list items and articles are line-delimited.
fn clean_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.split_whitespace().join(" ").replace(" :", ":"))
        .collect()
}

fn head(text: &str, chars: usize) -> &str {
    text.char_indices().nth(chars).map_or(text, |(i, _)| &text[..i])
}

pub fn parse_spec(text: &str) -> SpecSummary {
    let lines = clean_lines(text);
    let flat = text.split_whitespace().join(" ");
    let text_length = flat.chars().count();

    if text_length < MIN_TEXT_CHARS {
        tracing::warn!(chars = text_length, "specification has no usable text");
        return SpecSummary {
            status: SpecStatus::NoText,
            text_length,
            diagnostics: vec![Diagnostic::empty_input("specification text")],
            ..SpecSummary::default()
        };
    }

    let joined = lines.join("\n");
    let spec_number = spec_number(head(&flat, NUMBER_SEARCH_CHARS)).unwrap_or_default();
    let spec_title = TITLE_RE
        .captures(head(&joined, TITLE_SEARCH_CHARS))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let category = SpecCategory::from_number(&spec_number);

    let manufacturers = manufacturers(&lines);
    let products = products(&lines);
    let articles = submittal_articles(&lines);
    let shop_drawing_requirements = shop_drawings(&articles);
    let other_submittals = OTHER_SUBMITTAL_TYPES
        .iter()
        .filter_map(|kind| {
            let items = other_submittal(&articles, kind);
            (!items.is_empty()).then(|| (kind.to_string(), items))
        })
        .collect();

    let mut diagnostics = Vec::new();
    if shop_drawing_requirements.is_empty() {
        diagnostics.push(Diagnostic::no_match("shop drawing requirements"));
    }

    tracing::info!(
        number = %spec_number,
        title = %spec_title,
        manufacturers = manufacturers.len(),
        products = products.len(),
        requirements = shop_drawing_requirements.len(),
        "parsed specification"
    );

    SpecSummary {
        document: String::new(),
        status: SpecStatus::Success,
        spec_number,
        spec_title,
        category: Some(category),
        manufacturers,
        products,
        shop_drawing_requirements,
        other_submittals,
        text_length,
        diagnostics,
    }
}

fn spec_number(text: &str) -> Option<String> {
    NUMBER_RES.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
    })
}

/// Names listed after a "Manufacturers:" style marker, either inline and
/// comma separated or as list items on the following lines.
fn manufacturers(lines: &[String]) -> Vec<String> {
    let Some((start, rest)) = lines.iter().enumerate().find_map(|(i, line)| {
        MANUFACTURERS_MARKER_RE
            .find(line)
            .map(|m| (i, line[m.end()..].to_string()))
    }) else {
        return Vec::new();
    };

    let mut items: Vec<String> = rest.split([',', ';']).map(str::to_string).collect();
    for line in &lines[start + 1..] {
        if line.is_empty() || PARAGRAPH_RE.is_match(line) || ARTICLE_RE.is_match(line) {
            break;
        }
        if let Some(m) = LIST_ITEM_RE.find(line) {
            items.push(line[m.end()..].to_string());
        }
    }

    items
        .iter()
        .filter_map(|item| manufacturer_name(item))
        .unique()
        .collect()
}

fn manufacturer_name(item: &str) -> Option<String> {
    let item = item.split(['(', ':']).next().unwrap_or("").trim();
    let item = item.trim_end_matches('.').trim();
    let name = COMPANY_SUFFIX_RE.replace(item, "");
    let name = name.trim().trim_end_matches([',', '.']).trim();
    let starts_upper = name.chars().next().is_some_and(char::is_uppercase);
    (starts_upper && name.chars().count() > MIN_MANUFACTURER_CHARS).then(|| name.to_string())
}

/// Product headings between "PART 2 - PRODUCTS" and the execution part, in
/// document order.
fn products(lines: &[String]) -> Vec<String> {
    let Some(start) = lines.iter().position(|l| PRODUCTS_PART_RE.is_match(l)) else {
        return Vec::new();
    };
    lines[start + 1..]
        .iter()
        .take_while(|l| !EXECUTION_PART_RE.is_match(l))
        .filter_map(|l| {
            PRODUCT_ARTICLE_RE
                .captures(l)
                .or_else(|| PRODUCT_LABEL_RE.captures(l))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|name| name.chars().count() > MIN_PRODUCT_CHARS)
        .unique()
        .collect()
}

/// Lines of every "... SUBMITTALS" article, action submittals first.
fn submittal_articles(lines: &[String]) -> Vec<&[String]> {
    let article = |start: usize| {
        let end = lines[start + 1..]
            .iter()
            .position(|l| ARTICLE_RE.is_match(l))
            .map_or(lines.len(), |p| start + 1 + p);
        &lines[start..end]
    };
    let starts: Vec<usize> = lines
        .iter()
        .positions(|l| SUBMITTALS_RE.is_match(l))
        .collect();
    starts
        .iter()
        .copied()
        .sorted_by_key(|&i| !ACTION_SUBMITTALS_RE.is_match(&lines[i]))
        .map(article)
        .collect()
}

/// The paragraph opened by `opener`, up to the next lettered paragraph.
fn paragraph<'a>(article: &'a [String], opener: &Regex) -> Option<Vec<&'a str>> {
    let start = article.iter().position(|l| opener.is_match(l))?;
    let first = opener.find(&article[start]).map_or("", |m| &article[start][m.end()..]);
    let mut body = vec![first];
    for line in &article[start + 1..] {
        if PARAGRAPH_RE.is_match(line) {
            break;
        }
        body.push(line.as_str());
    }
    Some(body)
}

fn shop_drawings(articles: &[&[String]]) -> Vec<String> {
    articles
        .iter()
        .find_map(|a| paragraph(a, &SHOP_DRAWINGS_RE))
        .map(|body| requirement_items(&body))
        .unwrap_or_default()
}

fn other_submittal(articles: &[&[String]], kind: &str) -> Vec<String> {
    let opener = match Regex::new(&format!(r"(?i)^\s*(?:[A-Z]\.\s+)?{}\s*:", regex::escape(kind))) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    articles
        .iter()
        .find_map(|a| paragraph(a, &opener))
        .map(|body| requirement_items(&body))
        .unwrap_or_default()
}

/// Split a paragraph into list items. Continuation lines join the item
/// above; short fragments are dropped.
fn requirement_items(body: &[&str]) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut current = String::new();
    for line in body {
        if let Some(m) = LIST_ITEM_RE.find(line) {
            items.push(std::mem::take(&mut current));
            current.push_str(&line[m.end()..]);
        } else {
            current.push(' ');
            current.push_str(line);
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| DOT_LEADER_RE.replace_all(&item, "").split_whitespace().join(" "))
        .filter(|item| item.chars().count() > MIN_REQUIREMENT_CHARS)
        .map(|mut item| {
            if !item.ends_with('.') && !item.ends_with(':') {
                item.push('.');
            }
            item
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SpecSummary {
        let text = std::fs::read_to_string("tests/fixtures/spec_075423.txt").unwrap();
        parse_spec(&text)
    }

    #[test]
    fn number_title_and_category() {
        let s = fixture();
        assert_eq!(s.status, SpecStatus::Success);
        assert_eq!(s.spec_number, "075423");
        assert_eq!(s.spec_title, "THERMOPLASTIC POLYOLEFIN (TPO) ROOFING");
        assert_eq!(s.category, Some(SpecCategory::Waterproofing));
    }

    #[test]
    fn manufacturers_from_list() {
        let s = fixture();
        assert_eq!(
            s.manufacturers,
            vec!["Carlisle SynTec", "Firestone Building Products", "GAF Materials", "Johns Manville"]
        );
    }

    #[test]
    fn products_from_part_two() {
        let s = fixture();
        assert_eq!(s.products, vec!["MANUFACTURERS", "Source Limitations", "TPO ROOFING"]);
    }

    #[test]
    fn products_stop_at_execution() {
        let text = format!(
            "{}\nPART 2 - PRODUCTS\n2.1 SHEET METAL\nA. Coping Profile: As indicated.\n2.1 SHEET METAL\n\
             PART 3 - EXECUTION\n3.1 INSTALLATION\nA. Field Welding: Per manufacturer.\n",
            "x ".repeat(60)
        );
        let s = parse_spec(&text);
        assert_eq!(s.products, vec!["SHEET METAL", "Coping Profile"]);
    }

    #[test]
    fn shop_drawing_items() {
        let s = fixture();
        assert_eq!(s.shop_drawing_requirements.len(), 4);
        assert_eq!(s.shop_drawing_requirements[0], "For roofing system. Include plans, sections and details.");
        assert!(s.shop_drawing_requirements.iter().all(|r| !r.contains("..")));
        assert!(s.shop_drawing_requirements.iter().all(|r| r.ends_with('.') || r.ends_with(':')));
        assert!(s
            .shop_drawing_requirements
            .iter()
            .any(|r| r == "Base flashings and membrane terminations."));
        assert!(s.diagnostics.is_empty());
    }

    #[test]
    fn other_submittals_found() {
        let s = fixture();
        assert!(s.other_submittals.contains_key("Product Data"));
        assert!(s.other_submittals.contains_key("Samples"));
        assert!(s.other_submittals.contains_key("Qualification Data"));
        assert!(!s.other_submittals.contains_key("Maintenance Data"));
    }

    #[test]
    fn short_text_needs_ocr() {
        let s = parse_spec("SECTION 07 54 23");
        assert_eq!(s.status, SpecStatus::NoText);
        assert!(s.spec_number.is_empty());
        assert!(matches!(s.diagnostics[..], [Diagnostic::EmptyInput { .. }]));
    }

    #[test]
    fn categories() {
        assert_eq!(SpecCategory::from_number("074113"), SpecCategory::Roofing);
        assert_eq!(SpecCategory::from_number("076200"), SpecCategory::Waterproofing);
        assert_eq!(SpecCategory::from_number("077200"), SpecCategory::WallPanelFlashing);
        assert_eq!(SpecCategory::from_number("079200"), SpecCategory::JointSealants);
        assert_eq!(SpecCategory::from_number("07"), SpecCategory::OtherDiv07);
        assert_eq!(SpecCategory::from_number(""), SpecCategory::OtherDiv07);
    }

    #[test]
    fn number_falls_back_to_division() {
        assert_eq!(spec_number("Division 07 - Thermal and Moisture").as_deref(), Some("07"));
        assert_eq!(spec_number("Section 07 62 00.13").as_deref(), Some("076200.13"));
    }

    #[test]
    fn missing_shop_drawings_is_noted() {
        let text = "SECTION 07 92 00 - JOINT SEALANTS\n".to_string() + &"General requirements apply. ".repeat(10);
        let s = parse_spec(&text);
        assert_eq!(s.spec_number, "079200");
        assert!(s.shop_drawing_requirements.is_empty());
        assert!(matches!(s.diagnostics[..], [Diagnostic::NoMatch { .. }]));
    }
}
