use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::Diagnostic;

/// Known roof-area names, canonical casing. Longer names come first so the
/// alternation prefers "Entry Canopy" over "Canopy".
const AREA_NAMES: &[&str] = &[
    "Main Roof",
    "Low Roof",
    "High Roof",
    "Upper Roof",
    "Lower Roof",
    "Entry Canopy",
    "Canopy",
    "Penthouse Roof",
    "Penthouse",
    "Mechanical Well",
    "Mansard",
];

static CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let areas = AREA_NAMES
        .iter()
        .map(|name| name.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?mx)
        \b(?:
            (?P<area>(?i:{areas}))\b
          | (?P<named>(?i:roof\s+area|area|building)\s+[A-Z0-9]{{1,3}})\b
          # an unnamed heading must be the whole line
          | (?P<unnamed>(?i:(?:roof\s+)?assembly)(?:\s+(?i:no\.?\s*|\#\s*)?\d+)?)[\x20\t]*:?[\x20\t]*\r?$
        )"
    ))
    .unwrap()
});

static FIELD_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:manufacturer|system|date)\s*:").unwrap());

pub const MAX_SECTIONS: usize = 5;
pub const DEFAULT_LOOKAHEAD: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblySection {
    pub label: String,
    /// Byte span into the source document.
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionSplit {
    pub sections: Vec<AssemblySection>,
    /// True when no boundary was accepted and the whole text is one section.
    pub implicit: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
enum SplitState {
    Scanning,
    InSection { label: Option<String>, start: usize },
    Emitting,
}

#[derive(Debug)]
struct Candidate {
    start: usize,
    end: usize,
    label: Option<String>,
}

/// Partitions an assembly letter into per-roof-area sections.
///
/// A candidate heading becomes a boundary only when it starts a line and an
/// assembly field marker follows within `lookahead` characters. The whole
/// document must be seen at once.
#[derive(Debug, Clone, Copy)]
pub struct AssemblySectionSplitter {
    lookahead: usize,
}

impl Default for AssemblySectionSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD)
    }
}

impl AssemblySectionSplitter {
    pub fn new(lookahead: usize) -> Self {
        AssemblySectionSplitter { lookahead }
    }

    pub fn split(&self, text: &str) -> SectionSplit {
        if text.trim().is_empty() {
            return SectionSplit {
                diagnostics: vec![Diagnostic::empty_input("assembly document")],
                ..SectionSplit::default()
            };
        }

        let mut sections = Vec::new();
        let mut dropped = 0usize;
        let mut state = SplitState::Scanning;

        for cand in candidates(text) {
            if !starts_line(text, cand.start) {
                tracing::debug!(at = cand.start, "inline area mention, not a boundary");
                continue;
            }
            if !self.field_marker_follows(text, cand.end) {
                tracing::debug!(at = cand.start, "no assembly field after heading, not a boundary");
                continue;
            }
            state = match state {
                SplitState::Scanning => SplitState::InSection {
                    label: cand.label,
                    start: cand.start,
                },
                SplitState::InSection { label, start } => {
                    push_section(&mut sections, text, label, start, cand.start);
                    if sections.len() == MAX_SECTIONS {
                        dropped += 1;
                        SplitState::Emitting
                    } else {
                        SplitState::InSection {
                            label: cand.label,
                            start: cand.start,
                        }
                    }
                }
                SplitState::Emitting => {
                    dropped += 1;
                    SplitState::Emitting
                }
            };
        }

        let mut implicit = false;
        match state {
            SplitState::Scanning => {
                implicit = true;
                push_section(&mut sections, text, None, 0, text.len());
            }
            SplitState::InSection { label, start } => {
                push_section(&mut sections, text, label, start, text.len());
            }
            SplitState::Emitting => {}
        }

        let mut diagnostics = Vec::new();
        if dropped > 0 {
            diagnostics.push(Diagnostic::cap_exceeded(
                "assembly sections",
                MAX_SECTIONS + dropped,
                MAX_SECTIONS,
            ));
        }

        SectionSplit {
            sections,
            implicit,
            diagnostics,
        }
    }

    fn field_marker_follows(&self, text: &str, from: usize) -> bool {
        let rest = &text[from..];
        let window_end = rest
            .char_indices()
            .nth(self.lookahead)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        FIELD_MARKER_RE.is_match(&rest[..window_end])
    }
}

/// Convenience wrapper using the default lookahead.
pub fn split(text: &str) -> SectionSplit {
    AssemblySectionSplitter::default().split(text)
}

fn candidates(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    CANDIDATE_RE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let label = if let Some(m) = caps.name("area") {
            Some(canonical_area(m.as_str()))
        } else {
            caps.name("named")
                .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        };
        Some(Candidate {
            start: whole.start(),
            end: whole.end(),
            label,
        })
    })
}

fn canonical_area(matched: &str) -> String {
    let folded = matched.split_whitespace().collect::<Vec<_>>().join(" ");
    AREA_NAMES
        .iter()
        .find(|name| name.eq_ignore_ascii_case(&folded))
        .map(|name| name.to_string())
        .unwrap_or(folded)
}

/// Only spaces or tabs may sit between the previous line break (or the start
/// of the document) and `at`.
fn starts_line(text: &str, at: usize) -> bool {
    for c in text[..at].chars().rev() {
        match c {
            ' ' | '\t' => continue,
            '\n' | '\r' => return true,
            _ => return false,
        }
    }
    true
}

fn push_section(
    sections: &mut Vec<AssemblySection>,
    text: &str,
    label: Option<String>,
    start: usize,
    end: usize,
) {
    let label = label.unwrap_or_else(|| format!("Assembly {}", sections.len() + 1));
    sections.push(AssemblySection {
        label,
        start,
        end,
        text: text[start..end].to_string(),
    });
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(split: &SectionSplit) -> Vec<&str> {
        split.sections.iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn two_marked_areas() {
        let doc = "Carlisle SynTec\n\nMain Roof\nManufacturer: Carlisle\nSystem: TPO\n\nCanopy\nManufacturer: Carlisle\nSystem: EPDM\n";
        let s = split(doc);
        assert_eq!(labels(&s), vec!["Main Roof", "Canopy"]);
        assert!(!s.implicit);
        assert!(s.sections[0].text.contains("TPO"));
        assert!(!s.sections[0].text.contains("EPDM"));
        assert!(s.sections[1].text.starts_with("Canopy"));
    }

    #[test]
    fn inline_mention_is_not_a_boundary() {
        let doc = "Manufacturer: GAF\nThe membrane extends over the canopy at the entrance. System: TPO\n";
        let s = split(doc);
        assert_eq!(s.sections.len(), 1);
        assert!(s.implicit);
        assert_eq!(s.sections[0].label, "Assembly 1");
        assert_eq!(s.sections[0].text, doc);
    }

    #[test]
    fn heading_without_field_marker_is_rejected() {
        let doc = "Main Roof\nSee attached drawings for the canopy.\n";
        let s = split(doc);
        assert!(s.implicit);
        assert_eq!(labels(&s), vec!["Assembly 1"]);
    }

    #[test]
    fn field_marker_outside_window_is_rejected() {
        let filler = "x".repeat(300);
        let doc = format!("Main Roof\n{}\nManufacturer: GAF\n", filler);
        assert!(split(&doc).implicit);
        assert!(!AssemblySectionSplitter::new(400).split(&doc).implicit);
    }

    #[test]
    fn indented_heading_counts_as_line_start() {
        let doc = "Letter intro\n   \tHIGH ROOF\nSystem: SBS\n";
        let s = split(doc);
        assert_eq!(labels(&s), vec!["High Roof"]);
    }

    #[test]
    fn generic_headings() {
        let doc = "Roof Area B\nManufacturer: GAF\n\nRoof Assembly 2\nDate: 01/02/2024\n";
        let s = split(doc);
        assert_eq!(labels(&s), vec!["Roof Area B", "Assembly 2"]);
    }

    #[test]
    fn assembly_prose_is_not_a_heading() {
        let doc = "Main Roof\nManufacturer: GAF\nSystem: TPO\nAssembly shall be installed per manufacturer instructions.\nDate: 2024-01-01\nMembrane: EverGuard TPO\n";
        let s = split(doc);
        assert_eq!(labels(&s), vec!["Main Roof"]);
        assert!(s.sections[0].text.ends_with("Membrane: EverGuard TPO\n"));
    }

    #[test]
    fn unnamed_heading_with_colon() {
        let doc = "Assembly No. 1:\nManufacturer: GAF\n\nROOF ASSEMBLY\nSystem: SBS\n";
        let s = split(doc);
        assert_eq!(labels(&s), vec!["Assembly 1", "Assembly 2"]);
    }

    #[test]
    fn caps_at_five_sections() {
        let names = ["Main Roof", "Low Roof", "High Roof", "Upper Roof", "Lower Roof", "Canopy", "Penthouse"];
        let doc: String = names
            .iter()
            .map(|n| format!("{}\nManufacturer: GAF\nSystem: TPO\n\n", n))
            .collect();
        let s = split(&doc);
        assert_eq!(s.sections.len(), MAX_SECTIONS);
        assert_eq!(labels(&s), names[..5].to_vec());
        assert!(!s.sections[4].text.contains("Canopy"));
        assert_eq!(
            s.diagnostics,
            vec![Diagnostic::CapExceeded { what: "assembly sections".into(), found: 7, kept: 5 }]
        );
    }

    #[test]
    fn sections_are_ordered_disjoint_spans() {
        let doc = "Intro text\nMain Roof\nManufacturer: A\n\nCanopy\nDate: today\nmore\nMansard\nSystem: metal\n";
        let s = split(doc);
        let mut last_end = 0;
        for sec in &s.sections {
            assert!(sec.start >= last_end);
            assert!(sec.end > sec.start);
            assert_eq!(&doc[sec.start..sec.end], sec.text);
            last_end = sec.end;
        }
        let joined: String = s.sections.iter().map(|x| x.text.as_str()).collect();
        assert!(doc.ends_with(&joined));
    }

    #[test]
    fn empty_document() {
        let s = split(" \n\t");
        assert!(s.sections.is_empty());
        assert!(matches!(s.diagnostics[0], Diagnostic::EmptyInput { .. }));
    }

    #[test]
    fn fixture_letter_sections() {
        let doc = std::fs::read_to_string("tests/fixtures/assembly_letter.txt").unwrap();
        let s = split(&doc);
        assert_eq!(labels(&s), vec!["Main Roof", "Entry Canopy"]);
    }
}
