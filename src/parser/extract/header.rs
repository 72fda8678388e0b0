use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static MANUFACTURER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:roofing\s+)?manufacturer\s*:").unwrap());
static SYSTEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:roof(?:ing)?\s+)?system(?:\s+type)?\s*:").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bdate\s*:").unwrap());

/// Any field marker; a value ends where the next one begins.
static ANY_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:manufacturer|system|date|warranty|spec(?:ification)?)\s*:").unwrap());

static SPEC_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b07\s?\d{2}\s?\d{2}(?:\.\d{2})?\b").unwrap());

/// How many lines after a bare marker are searched for its value.
const VALUE_LOOKAHEAD_LINES: usize = 3;

/// Roofing manufacturers recognized when no "Manufacturer:" field exists.
pub const KNOWN_MANUFACTURERS: &[&str] = &[
    "Carlisle",
    "GAF",
    "Firestone",
    "Johns Manville",
    "Versico",
    "Siplast",
    "SOPREMA",
    "Sika",
    "Barrett",
    "Tremco",
    "Holcim",
    "Elevate",
    "Mule-Hide",
    "Duro-Last",
];

static KNOWN_MANUFACTURER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = KNOWN_MANUFACTURERS
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", names)).unwrap()
});

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyHeader {
    pub manufacturer: String,
    pub system: String,
    pub date: String,
    pub spec_number: String,
}

pub fn extract_header(text: &str) -> AssemblyHeader {
    let lines: Vec<&str> = text.lines().collect();
    let manufacturer = field_value(&lines, &MANUFACTURER_RE, is_named_value)
        .or_else(|| known_manufacturer(text))
        .unwrap_or_default();
    AssemblyHeader {
        manufacturer,
        system: field_value(&lines, &SYSTEM_RE, is_named_value).unwrap_or_default(),
        date: field_value(&lines, &DATE_RE, |v| !v.is_empty()).unwrap_or_default(),
        spec_number: spec_number(text).unwrap_or_default(),
    }
}

/// Non-empty, not purely numeric, and containing a letter.
fn is_named_value(value: &str) -> bool {
    value.chars().any(char::is_alphabetic)
}

/// The value on the marker's own line, or failing that the first qualifying
/// line below it. Lines that open another field stop the search.
fn field_value(lines: &[&str], marker: &Regex, accept: impl Fn(&str) -> bool) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        let Some(m) = marker.find(line) else {
            continue;
        };
        let rest = &line[m.end()..];
        let inline = ANY_FIELD_RE.find(rest).map_or(rest, |next| &rest[..next.start()]);
        let inline = clean(inline);
        if accept(&inline) {
            return Some(inline);
        }
        for next in lines.iter().skip(i + 1).take(VALUE_LOOKAHEAD_LINES) {
            if ANY_FIELD_RE.is_match(next) {
                break;
            }
            let candidate = clean(next);
            if accept(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn clean(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches([',', ';'])
        .to_string()
}

fn known_manufacturer(text: &str) -> Option<String> {
    let found = KNOWN_MANUFACTURER_RE.find(text)?.as_str();
    KNOWN_MANUFACTURERS
        .iter()
        .find(|name| name.eq_ignore_ascii_case(found))
        .map(|name| name.to_string())
}

/// Division 07 section number, spaces removed ("07 54 23" → "075423").
pub fn spec_number(text: &str) -> Option<String> {
    SPEC_NUMBER_RE
        .find(text)
        .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
}
