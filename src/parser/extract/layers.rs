use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerCategory {
    Membrane,
    Insulation,
    Coverboard,
    VaporBarrier,
}

impl LayerCategory {
    /// Order in which unlabeled lines are tested. Vapor barriers and cover
    /// boards are often described with membrane/insulation words, so the
    /// narrower categories go first.
    const SCAN_ORDER: [LayerCategory; 4] = [
        LayerCategory::VaporBarrier,
        LayerCategory::Coverboard,
        LayerCategory::Insulation,
        LayerCategory::Membrane,
    ];

    /// Column count in the legacy spreadsheet.
    pub const fn cap(self) -> usize {
        match self {
            LayerCategory::Membrane => 3,
            LayerCategory::Insulation => 3,
            LayerCategory::Coverboard => 2,
            LayerCategory::VaporBarrier => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerCategory::Membrane => "membrane",
            LayerCategory::Insulation => "insulation",
            LayerCategory::Coverboard => "coverboard",
            LayerCategory::VaporBarrier => "vapor barrier",
        }
    }

    fn keywords(self) -> &'static Regex {
        match self {
            LayerCategory::Membrane => &MEMBRANE_RE,
            LayerCategory::Insulation => &INSULATION_RE,
            LayerCategory::Coverboard => &COVERBOARD_RE,
            LayerCategory::VaporBarrier => &VAPOR_BARRIER_RE,
        }
    }

    /// Category named by a line label, matched on whole words so that
    /// "Supply" or "Sheeting" do not count.
    fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        let words: Vec<&str> = label
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |w: &str| words.contains(&w);
        if has("vapor") || has("vapour") || label.contains("air barrier") {
            Some(LayerCategory::VaporBarrier)
        } else if has("cover") || has("coverboard") || label.contains("recovery board") {
            Some(LayerCategory::Coverboard)
        } else if has("insulation") {
            Some(LayerCategory::Insulation)
        } else if has("membrane") || has("membranes") || has("sheet") || has("ply") || has("plies") {
            Some(LayerCategory::Membrane)
        } else {
            None
        }
    }
}

impl fmt::Display for LayerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

static MEMBRANE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:membrane|tpo|pvc|epdm|modified\s+bitumen|mod\s+bit|sbs|app|base\s+sheet|cap\s+sheet|ply\s+sheet|bur)\b").unwrap()
});
static INSULATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:insulation|polyiso(?:cyanurate)?|iso|eps|xps|mineral\s+wool|tapered)\b").unwrap()
});
static COVERBOARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cover\s*board|densdeck|securock|gypsum\s+(?:roof\s+)?board|hd\s+(?:polyiso|iso)|high[\s-]density\s+(?:polyiso|iso|board)|recovery\s+board|fiberboard)\b").unwrap()
});
static VAPOR_BARRIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:vapou?r\s+(?:barrier|retarder)|air\s*/\s*vapou?r\s+barrier)\b").unwrap()
});

/// `Label: value` at the start of a line.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:(?:\d{1,2}|[A-Za-z])[.)]\s+)?([A-Za-z][A-Za-z0-9 #/&()-]{0,39}?)\s*:\s*(.*)$").unwrap());

/// Lines carrying assembly-level fields rather than layers.
static FIELD_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:roofing\s+)?(?:manufacturer|system(?:\s+type)?|date|spec(?:ification)?(?:\s+section)?|section|warranty|project|owner|contractor|re|attn|to|from|approvals?|fm(?:\s+global)?|ul|astm|deck|fasteners?|plates?|adhesives?|seams?|notes?)\b").unwrap()
});

/// Accessory products named after the layer they serve ("Membrane Adhesive",
/// "Insulation Fasteners"). Never layers themselves.
static ACCESSORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:adhesives?|fasteners?|plates?|tapes?|primers?|seams?|sealants?)\b").unwrap()
});

/// Splits a line into clauses, one layer at most per clause.
static CLAUSE_SEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i);\s*|,\s+|\s+(?:and|over|with|plus|under|beneath|below)\s+").unwrap()
});

static PROPER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\d+(?:[./]\d+)?\s*(?:mil|in\.?|inch(?:es)?|"|mm)\s+)?[A-Z][\w®™&'./-]*(?:\s+(?:[A-Z0-9][\w®™&'./"-]*|mil\b|in\.))*"#).unwrap()
});

static ATTACHMENT_RES: LazyLock<Vec<(Regex, AttachmentMethod)>> = LazyLock::new(|| {
    [
        (r"(?i)\bmechanically[\s-]+(?:attached|fastened)\b|\bmech\.?\s+attached\b", AttachmentMethod::MechanicallyAttached),
        (r"(?i)\bfully[\s-]+adhered\b", AttachmentMethod::FullyAdhered),
        (r"(?i)\bself[\s-]+adhered\b|\bpeel[\s-]+(?:and|&)[\s-]+stick\b", AttachmentMethod::SelfAdhered),
        (r"(?i)\btorch(?:ed)?[\s-]+(?:applied|welded|on)\b|\btorched\b", AttachmentMethod::TorchApplied),
        (r"(?i)\bhot[\s-]+(?:mopped\s+)?asphalt\b|\bhot[\s-]+mopped\b", AttachmentMethod::HotAsphalt),
        (r"(?i)\bcold[\s-]+(?:applied\s+)?adhesive\b|\bcold[\s-]+applied\b", AttachmentMethod::ColdAdhesive),
        (r"(?i)\bballast(?:ed)?\b", AttachmentMethod::Ballasted),
    ]
    .into_iter()
    .map(|(p, m)| (Regex::new(p).unwrap(), m))
    .collect()
});

const MAX_PRODUCT_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttachmentMethod {
    #[serde(rename = "Mechanically Attached")]
    MechanicallyAttached,
    #[serde(rename = "Fully Adhered")]
    FullyAdhered,
    #[serde(rename = "Self-Adhered")]
    SelfAdhered,
    #[serde(rename = "Torch-Applied")]
    TorchApplied,
    #[serde(rename = "Hot Asphalt")]
    HotAsphalt,
    #[serde(rename = "Cold Adhesive")]
    ColdAdhesive,
    #[serde(rename = "Ballasted")]
    Ballasted,
}

impl AttachmentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentMethod::MechanicallyAttached => "Mechanically Attached",
            AttachmentMethod::FullyAdhered => "Fully Adhered",
            AttachmentMethod::SelfAdhered => "Self-Adhered",
            AttachmentMethod::TorchApplied => "Torch-Applied",
            AttachmentMethod::HotAsphalt => "Hot Asphalt",
            AttachmentMethod::ColdAdhesive => "Cold Adhesive",
            AttachmentMethod::Ballasted => "Ballasted",
        }
    }
}

impl fmt::Display for AttachmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub category: LayerCategory,
    pub product: String,
    pub attachment: Option<AttachmentMethod>,
}

impl LayerSpec {
    /// Spreadsheet cell text: `product` or `product (attachment)`.
    pub fn cell(&self) -> String {
        match (self.product.is_empty(), self.attachment) {
            (_, None) => self.product.clone(),
            (true, Some(a)) => a.as_str().to_string(),
            (false, Some(a)) => format!("{} ({})", self.product, a),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerSet {
    pub membranes: Vec<LayerSpec>,
    pub insulation: Vec<LayerSpec>,
    pub coverboards: Vec<LayerSpec>,
    pub vapor_barrier: Option<LayerSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
struct Occurrence {
    category: LayerCategory,
    /// Clause span within the line's value.
    clause: Range<usize>,
}

#[derive(Debug)]
enum LineKind<'a> {
    Field,
    Layer {
        value: &'a str,
        labeled: bool,
        occurrences: Vec<Occurrence>,
    },
    Plain,
}

fn line_kind(line: &str) -> LineKind<'_> {
    if let Some(caps) = LABEL_RE.captures(line) {
        let label = caps.get(1).map_or("", |m| m.as_str()).trim();
        let value = caps.get(2).map_or("", |m| m.as_str());
        if ACCESSORY_RE.is_match(label) {
            return LineKind::Field;
        }
        if let Some(category) = LayerCategory::from_label(label) {
            let mut occurrences = occurrences(value, Some(category));
            if occurrences.is_empty() && !value.trim().is_empty() {
                occurrences.push(Occurrence {
                    category,
                    clause: 0..value.len(),
                });
            }
            return layer_or_plain(value, true, occurrences);
        }
        if FIELD_LABEL_RE.is_match(label) {
            return LineKind::Field;
        }
        return layer_or_plain(value, false, occurrences(value, None));
    }
    layer_or_plain(line, false, occurrences(line, None))
}

fn layer_or_plain(value: &str, labeled: bool, occurrences: Vec<Occurrence>) -> LineKind<'_> {
    if occurrences.is_empty() {
        LineKind::Plain
    } else {
        LineKind::Layer {
            value,
            labeled,
            occurrences,
        }
    }
}

fn clauses(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for sep in CLAUSE_SEP_RE.find_iter(text) {
        spans.push(start..sep.start());
        start = sep.end();
    }
    spans.push(start..text.len());
    spans
}

/// One occurrence per clause carrying a category keyword. A labeled line
/// only counts clauses of its own category; unlabeled clauses take the
/// first category in scan order.
fn occurrences(text: &str, labeled: Option<LayerCategory>) -> Vec<Occurrence> {
    clauses(text)
        .into_iter()
        .filter_map(|clause| {
            let part = &text[clause.clone()];
            if ACCESSORY_RE.is_match(part) {
                return None;
            }
            let category = match labeled {
                Some(c) => Some(c).filter(|c| c.keywords().is_match(part)),
                None => LayerCategory::SCAN_ORDER
                    .into_iter()
                    .find(|c| c.keywords().is_match(part)),
            }?;
            Some(Occurrence { category, clause })
        })
        .collect()
}

fn first_attachment(text: &str) -> Option<(Range<usize>, AttachmentMethod)> {
    ATTACHMENT_RES
        .iter()
        .filter_map(|(re, method)| re.find(text).map(|m| (m.range(), *method)))
        .min_by_key(|(span, _)| span.start)
}

/// The clause up to its attachment phrase or first separator. A leading
/// attachment phrase ("Self-adhered vapor barrier") is skipped instead.
fn product_candidate(clause: &str) -> &str {
    let mut text = clause.trim();
    match first_attachment(text) {
        Some((span, _)) if span.start == 0 => text = text[span.end..].trim_start(),
        Some((span, _)) => text = &text[..span.start],
        None => {}
    }
    let cut = [",", ";", "(", " - ", " – "]
        .iter()
        .filter_map(|sep| text.find(sep))
        .min()
        .unwrap_or(text.len());
    text[..cut].trim()
}

/// Proper-noun run touching the first category keyword, unless the run is
/// the bare keyword ("EPS", "TPO").
fn proper_run(candidate: &str, category: LayerCategory) -> Option<&str> {
    let keyword = category.keywords().find(candidate)?;
    PROPER_RE
        .find_iter(candidate)
        .find(|run| {
            let (a, b) = if run.end() <= keyword.start() {
                (run.end(), keyword.start())
            } else if keyword.end() <= run.start() {
                (keyword.end(), run.start())
            } else {
                (0, 0)
            };
            let bare = category
                .keywords()
                .find(run.as_str())
                .is_some_and(|m| m.start() == 0 && m.end() == run.as_str().len());
            candidate[a..b].trim().is_empty() && !bare
        })
        .map(|run| run.as_str())
}

fn product_name(clause: &str, category: LayerCategory, labeled: bool) -> String {
    let candidate = product_candidate(clause);
    let product = if labeled {
        candidate
    } else {
        proper_run(candidate, category).unwrap_or(candidate)
    };
    product
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ':' | '-' | ' '))
        .chars()
        .take(MAX_PRODUCT_CHARS)
        .collect()
}

/// Scan a section for layer occurrences in document order. Each occurrence
/// looks for its attachment method from its own clause up to the next
/// occurrence on the line; the last one on a line may also read a following
/// continuation line.
pub fn extract_layers(section_text: &str) -> LayerSet {
    let lines: Vec<&str> = section_text.lines().collect();
    let kinds: Vec<LineKind> = lines.iter().map(|l| line_kind(l)).collect();

    let mut found: Vec<LayerSpec> = Vec::new();
    for (i, kind) in kinds.iter().enumerate() {
        let LineKind::Layer {
            value,
            labeled,
            occurrences,
        } = kind
        else {
            continue;
        };
        for (k, occ) in occurrences.iter().enumerate() {
            let from = if k == 0 { 0 } else { occ.clause.start };
            let last = k + 1 == occurrences.len();
            let to = occurrences.get(k + 1).map_or(value.len(), |next| next.clause.start);
            let attachment = first_attachment(&value[from..to])
                .map(|(_, m)| m)
                .or_else(|| match kinds.get(i + 1) {
                    Some(LineKind::Plain) if last => first_attachment(lines[i + 1]).map(|(_, m)| m),
                    _ => None,
                });
            found.push(LayerSpec {
                category: occ.category,
                product: product_name(&value[occ.clause.clone()], occ.category, *labeled),
                attachment,
            });
        }
    }

    let mut set = LayerSet::default();
    for category in LayerCategory::SCAN_ORDER {
        let mut layers: Vec<LayerSpec> = found.iter().filter(|l| l.category == category).cloned().collect();
        if layers.len() > category.cap() {
            set.diagnostics.push(Diagnostic::cap_exceeded(
                format!("{} layers", category),
                layers.len(),
                category.cap(),
            ));
            layers.truncate(category.cap());
        }
        match category {
            LayerCategory::Membrane => set.membranes = layers,
            LayerCategory::Insulation => set.insulation = layers,
            LayerCategory::Coverboard => set.coverboards = layers,
            LayerCategory::VaporBarrier => set.vapor_barrier = layers.into_iter().next(),
        }
    }
    set
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_layers_with_attachment() {
        let text = "Membrane: Carlisle Sure-Weld 60 mil TPO, fully adhered\n\
                    Insulation: Two layers HP-H Polyiso, mechanically attached\n\
                    Cover Board: SecuRock Gypsum-Fiber 1/2\"\n\
                    Vapor Barrier: VapAir Seal 725TR self-adhered\n";
        let set = extract_layers(text);
        assert_eq!(set.membranes.len(), 1);
        assert_eq!(set.membranes[0].product, "Carlisle Sure-Weld 60 mil TPO");
        assert_eq!(set.membranes[0].attachment, Some(AttachmentMethod::FullyAdhered));
        assert_eq!(set.insulation[0].product, "Two layers HP-H Polyiso");
        assert_eq!(set.insulation[0].attachment, Some(AttachmentMethod::MechanicallyAttached));
        assert_eq!(set.coverboards[0].product, "SecuRock Gypsum-Fiber 1/2\"");
        assert_eq!(set.coverboards[0].attachment, None);
        let vb = set.vapor_barrier.unwrap();
        assert_eq!(vb.product, "VapAir Seal 725TR");
        assert_eq!(vb.attachment, Some(AttachmentMethod::SelfAdhered));
        assert!(set.diagnostics.is_empty());
    }

    #[test]
    fn four_insulation_lines_keep_three() {
        let text = "Polyiso insulation layer 1\n\
                    Polyiso insulation layer 2\n\
                    Tapered insulation system\n\
                    EPS insulation fill\n";
        let set = extract_layers(text);
        assert_eq!(set.insulation.len(), 3);
        assert!(set.insulation[2].product.starts_with("Tapered"));
        assert_eq!(
            set.diagnostics,
            vec![Diagnostic::CapExceeded { what: "insulation layers".into(), found: 4, kept: 3 }]
        );
    }

    #[test]
    fn caps_hold_for_every_category() {
        let mut text = String::new();
        for i in 0..6 {
            text.push_str(&format!("Membrane: Ply {}\nCover Board: Board {}\nVapor Barrier: VB {}\n", i, i, i));
        }
        let set = extract_layers(&text);
        assert_eq!(set.membranes.len(), 3);
        assert_eq!(set.coverboards.len(), 2);
        assert_eq!(set.vapor_barrier.unwrap().product, "VB 0");
        assert_eq!(set.diagnostics.len(), 3);
    }

    #[test]
    fn attachment_on_continuation_line() {
        let text = "Membrane: GAF EverGuard TPO 60 mil\n    installed mechanically fastened at 12\" o.c.\nInsulation: EnergyGuard Polyiso\n";
        let set = extract_layers(text);
        assert_eq!(set.membranes[0].attachment, Some(AttachmentMethod::MechanicallyAttached));
        assert_eq!(set.insulation[0].attachment, None);
    }

    #[test]
    fn attachment_does_not_leak_from_next_layer() {
        let text = "Membrane: Firestone UltraPly TPO\nInsulation: ISO 95+ GL fully adhered\n";
        let set = extract_layers(text);
        assert_eq!(set.membranes[0].attachment, None);
        assert_eq!(set.insulation[0].attachment, Some(AttachmentMethod::FullyAdhered));
    }

    #[test]
    fn unlabeled_lines_use_scan_order() {
        let text = "Self-adhered vapor barrier membrane over deck\n1/2\" DensDeck Prime cover board\n";
        let set = extract_layers(text);
        assert!(set.membranes.is_empty());
        assert!(set.vapor_barrier.is_some());
        assert_eq!(set.coverboards[0].product, "1/2\" DensDeck Prime");
    }

    #[test]
    fn field_lines_are_not_layers() {
        let text = "System: TPO Mechanically Attached\nManufacturer: Carlisle\nDeck: steel\n";
        let set = extract_layers(text);
        assert!(set.membranes.is_empty());
        assert!(set.insulation.is_empty());
    }

    #[test]
    fn unlabeled_product_takes_proper_noun_run() {
        let text = "install 60 mil Sure-Weld TPO membrane, ballasted\n";
        let set = extract_layers(text);
        assert_eq!(set.membranes[0].product, "60 mil Sure-Weld TPO");
        assert_eq!(set.membranes[0].attachment, Some(AttachmentMethod::Ballasted));
    }

    #[test]
    fn several_occurrences_on_one_labeled_line() {
        let text = "Manufacturer: GAF\nInsulation: polyiso base layer, EPS filler, XPS at curbs, mineral wool at walls\n";
        let set = extract_layers(text);
        let products: Vec<&str> = set.insulation.iter().map(|l| l.product.as_str()).collect();
        assert_eq!(products, vec!["polyiso base layer", "EPS filler", "XPS at curbs"]);
        assert_eq!(
            set.diagnostics,
            vec![Diagnostic::CapExceeded { what: "insulation layers".into(), found: 4, kept: 3 }]
        );
    }

    #[test]
    fn several_occurrences_in_prose() {
        let text = "Two layers of polyiso insulation over tapered EPS insulation with XPS insulation at curbs.\n";
        let set = extract_layers(text);
        assert_eq!(set.insulation.len(), 3);
        assert_eq!(set.insulation[1].product, "tapered EPS insulation");
        assert_eq!(set.insulation[2].product, "XPS insulation at curbs");
        assert!(set.diagnostics.is_empty());
    }

    #[test]
    fn attachment_stays_with_its_own_clause() {
        let text = "60 mil TPO membrane fully adhered over polyiso insulation, mechanically attached\n";
        let set = extract_layers(text);
        assert_eq!(set.membranes[0].attachment, Some(AttachmentMethod::FullyAdhered));
        assert_eq!(set.insulation[0].attachment, Some(AttachmentMethod::MechanicallyAttached));
    }

    #[test]
    fn accessory_lines_are_not_layers() {
        let text = "Membrane: Sure-Weld TPO 60 mil\n\
                    Membrane Adhesive: Carlisle Bonding Adhesive\n\
                    Membrane Seam Tape: SecurTape\n\
                    Insulation: HP-H Polyiso\n\
                    Insulation Fasteners: HP Fasteners with 3in plates\n\
                    Insulation Adhesive: Flexible FAST\n\
                    Insulation Plates: Seam Plates\n";
        let set = extract_layers(text);
        let membranes: Vec<&str> = set.membranes.iter().map(|l| l.product.as_str()).collect();
        let insulation: Vec<&str> = set.insulation.iter().map(|l| l.product.as_str()).collect();
        assert_eq!(membranes, vec!["Sure-Weld TPO 60 mil"]);
        assert_eq!(insulation, vec!["HP-H Polyiso"]);
        assert!(set.diagnostics.is_empty());
    }

    #[test]
    fn label_words_match_whole_words() {
        let text = "Supply Contact: Roofing Supply Co.\nBase Sheet: Glasbase\n";
        let set = extract_layers(text);
        let membranes: Vec<&str> = set.membranes.iter().map(|l| l.product.as_str()).collect();
        assert_eq!(membranes, vec!["Glasbase"]);
    }

    #[test]
    fn cell_text() {
        let layer = LayerSpec {
            category: LayerCategory::Membrane,
            product: "Sure-Weld".into(),
            attachment: Some(AttachmentMethod::TorchApplied),
        };
        assert_eq!(layer.cell(), "Sure-Weld (Torch-Applied)");
    }

    #[test]
    fn empty_text_has_no_layers() {
        assert_eq!(extract_layers(""), LayerSet::default());
    }
}
