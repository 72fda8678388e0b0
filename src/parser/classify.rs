use std::fmt;

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

use super::page::PageTextUnit;
use crate::error::{Diagnostic, Result};

/// Drawing category of one sheet. Variant order is the rule declaration
/// order, which is also the tie-break between rules of equal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DrawingType {
    #[serde(rename = "Roof Plan")]
    RoofPlan,
    #[serde(rename = "Detail")]
    Detail,
    #[serde(rename = "Wall Section")]
    WallSection,
    #[serde(rename = "Building Section")]
    BuildingSection,
    #[serde(rename = "Exterior Elevation")]
    ExteriorElevation,
    #[serde(rename = "Schedule")]
    Schedule,
    #[serde(rename = "Floor Plan")]
    FloorPlan,
    #[serde(rename = "Structural")]
    Structural,
    #[serde(rename = "MEP")]
    Mep,
    #[serde(rename = "Site/Civil")]
    SiteCivil,
    #[serde(rename = "General")]
    General,
    #[serde(rename = "Other")]
    Other,
}

impl DrawingType {
    pub const ALL: [DrawingType; 12] = [
        DrawingType::RoofPlan,
        DrawingType::Detail,
        DrawingType::WallSection,
        DrawingType::BuildingSection,
        DrawingType::ExteriorElevation,
        DrawingType::Schedule,
        DrawingType::FloorPlan,
        DrawingType::Structural,
        DrawingType::Mep,
        DrawingType::SiteCivil,
        DrawingType::General,
        DrawingType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DrawingType::RoofPlan => "Roof Plan",
            DrawingType::Detail => "Detail",
            DrawingType::WallSection => "Wall Section",
            DrawingType::BuildingSection => "Building Section",
            DrawingType::ExteriorElevation => "Exterior Elevation",
            DrawingType::Schedule => "Schedule",
            DrawingType::FloorPlan => "Floor Plan",
            DrawingType::Structural => "Structural",
            DrawingType::Mep => "MEP",
            DrawingType::SiteCivil => "Site/Civil",
            DrawingType::General => "General",
            DrawingType::Other => "Other",
        }
    }

    /// Static tier lookup. Depends on the type only, never on page content.
    pub fn tier(self) -> RelevanceTier {
        match self {
            DrawingType::RoofPlan | DrawingType::Detail | DrawingType::WallSection => {
                RelevanceTier::Critical
            }
            DrawingType::BuildingSection | DrawingType::ExteriorElevation => RelevanceTier::High,
            DrawingType::Schedule | DrawingType::FloorPlan | DrawingType::Structural => {
                RelevanceTier::Reference
            }
            DrawingType::General | DrawingType::SiteCivil => RelevanceTier::Context,
            DrawingType::Mep | DrawingType::Other => RelevanceTier::Low,
        }
    }

    /// Sheet types counted as critical for shop-drawing takeoff.
    pub fn is_critical_sheet(self) -> bool {
        matches!(
            self,
            DrawingType::RoofPlan
                | DrawingType::ExteriorElevation
                | DrawingType::BuildingSection
                | DrawingType::WallSection
                | DrawingType::Detail
        )
    }
}

impl fmt::Display for DrawingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceTier {
    Critical,
    High,
    Reference,
    Context,
    Low,
}

impl RelevanceTier {
    /// Score bonus applied by the scope matcher.
    pub fn bonus(self) -> f64 {
        match self {
            RelevanceTier::Critical => 0.30,
            RelevanceTier::High => 0.15,
            _ => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelevanceTier::Critical => "critical",
            RelevanceTier::High => "high",
            RelevanceTier::Reference => "reference",
            RelevanceTier::Context => "context",
            RelevanceTier::Low => "low",
        }
    }
}

impl fmt::Display for RelevanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// (type, priority, patterns). Lower priority wins; equal priorities fall
/// back to position in this table.
const BUILTIN_RULES: &[(DrawingType, u8, &[&str])] = &[
    (
        DrawingType::RoofPlan,
        10,
        &[r"\broof(?:ing)?\s+plans?\b", r"^A-?5\d{2}\b", r"^A5\.\d+"],
    ),
    (
        DrawingType::Detail,
        20,
        &[
            r"\b(?:roof(?:ing)?|parapet|flashing|edge|curb|coping|drain|penetration|scupper|expansion\s+joint)\s+details?\b",
            r"\b(?:enlarged|typical)\s+details?\b",
            r"^A-?[89]\d{2}\b",
            r"^A[89]\.\d+",
            r"^AD-?\d+",
        ],
    ),
    (
        DrawingType::WallSection,
        20,
        &[r"\bwall\s+sections?\b", r"\bparapet\s+sections?\b"],
    ),
    (
        DrawingType::BuildingSection,
        30,
        &[
            r"\bbuilding\s+sections?\b",
            r"\broof\s+sections?\b",
            r"^A-?3\d{2}\b",
            r"^A3\.\d+",
        ],
    ),
    (
        DrawingType::ExteriorElevation,
        30,
        &[
            r"\bexterior\s+elevations?\b",
            r"\b(?:north|south|east|west)\s+elevations?\b",
            r"\bbuilding\s+elevations?\b",
            r"^A-?2\d{2}\b",
            r"^A2\.\d+",
        ],
    ),
    (
        DrawingType::Schedule,
        40,
        &[r"\b(?:door|window|finish|roof\s+drain|equipment|hardware)\s+schedules?\b"],
    ),
    (
        DrawingType::FloorPlan,
        50,
        &[
            r"\bfloor\s+plans?\b",
            r"\blevel\s+\d+\s+plans?\b",
            r"\breflected\s+ceiling\s+plans?\b",
            r"^A-?1\d{2}\b",
            r"^A1\.\d+",
        ],
    ),
    (
        DrawingType::Structural,
        50,
        &[r"\bframing\s+plans?\b", r"\bfoundation\s+plans?\b", r"^S-?\d"],
    ),
    (
        DrawingType::Mep,
        60,
        &[
            r"^[MEP]-?\d",
            r"\b(?:mechanical|plumbing|electrical|lighting|power)\s+plans?\b",
        ],
    ),
    (
        DrawingType::SiteCivil,
        60,
        &[r"^[CL]-?\d", r"\b(?:site|grading|landscape|utility)\s+plans?\b"],
    ),
    (
        DrawingType::General,
        70,
        &[
            r"^G-?\d",
            r"\bcover\s+sheet\b",
            r"\b(?:sheet|drawing)\s+index\b",
            r"\bgeneral\s+notes\b",
            r"\bcode\s+(?:analysis|plan)\b",
        ],
    ),
];

/// A rule as supplied by callers that want a custom table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawingRule {
    pub drawing_type: DrawingType,
    pub priority: u8,
    pub patterns: Vec<String>,
}

#[derive(Debug)]
struct CompiledRule {
    drawing_type: DrawingType,
    priority: u8,
    patterns: RegexSet,
}

/// Output of [`DrawingTypeClassifier::classify_page`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub page_number: u32,
    pub sheet_number: Option<String>,
    pub drawing_type: DrawingType,
    pub tier: RelevanceTier,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Classification {
    pub fn other(page: &PageTextUnit) -> Self {
        Classification {
            page_number: page.page_number,
            sheet_number: page.sheet_number.clone(),
            drawing_type: DrawingType::Other,
            tier: DrawingType::Other.tier(),
            diagnostics: Vec::new(),
        }
    }
}

/// Priority-ranked pattern classifier. Rules are kept sorted by
/// (priority, declaration index) so the first rule that fires wins.
#[derive(Debug)]
pub struct DrawingTypeClassifier {
    rules: Vec<CompiledRule>,
}

impl DrawingTypeClassifier {
    pub fn new() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .map(|(drawing_type, priority, patterns)| DrawingRule {
                drawing_type: *drawing_type,
                priority: *priority,
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
            })
            .collect();
        Self::with_rules(rules).expect("built-in drawing rules")
    }

    pub fn with_rules(rules: Vec<DrawingRule>) -> Result<Self> {
        let mut compiled = rules
            .into_iter()
            .map(|rule| {
                let patterns = RegexSetBuilder::new(&rule.patterns)
                    .case_insensitive(true)
                    .build()?;
                Ok(CompiledRule {
                    drawing_type: rule.drawing_type,
                    priority: rule.priority,
                    patterns,
                })
            })
            .collect::<std::result::Result<Vec<_>, regex::Error>>()?;
        // stable: equal priorities keep declaration order
        compiled.sort_by_key(|r| r.priority);
        Ok(DrawingTypeClassifier { rules: compiled })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Total: every input yields exactly one type, `Other` when nothing fires.
    pub fn classify(&self, text: &str, sheet_number: Option<&str>) -> DrawingType {
        let sheet = sheet_number.map(str::trim).filter(|s| !s.is_empty());
        self.rules
            .iter()
            .find(|rule| {
                rule.patterns.is_match(text)
                    || sheet.is_some_and(|s| rule.patterns.is_match(s))
            })
            .map(|rule| {
                tracing::trace!(drawing_type = %rule.drawing_type, priority = rule.priority, "rule fired");
                rule.drawing_type
            })
            .unwrap_or(DrawingType::Other)
    }

    pub fn classify_page(&self, page: &PageTextUnit) -> Classification {
        let mut diagnostics = Vec::new();
        if page.is_blank() && page.sheet_title.is_none() {
            diagnostics.push(Diagnostic::empty_input(page.label()));
        }
        let drawing_type = self.classify(&page.searchable_text(), page.sheet_number.as_deref());
        Classification {
            page_number: page.page_number,
            sheet_number: page.sheet_number.clone(),
            drawing_type,
            tier: drawing_type.tier(),
            diagnostics,
        }
    }
}

impl Default for DrawingTypeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str, sheet: Option<&str>) -> DrawingType {
        DrawingTypeClassifier::new().classify(text, sheet)
    }

    #[test]
    fn builtin_rules_compile() {
        assert_eq!(DrawingTypeClassifier::new().rule_count(), BUILTIN_RULES.len());
    }

    #[test]
    fn sheet_number_alone_selects_roof_plan() {
        assert_eq!(classify("SCALE: 1/8\" = 1'-0\"", Some("A-501")), DrawingType::RoofPlan);
        assert_eq!(classify("", Some("A5.02")), DrawingType::RoofPlan);
    }

    #[test]
    fn body_text_patterns() {
        assert_eq!(classify("TYPICAL PARAPET DETAIL 3/A-901", None), DrawingType::Detail);
        assert_eq!(classify("NORTH ELEVATION", None), DrawingType::ExteriorElevation);
        assert_eq!(classify("FIRST FLOOR PLAN", None), DrawingType::FloorPlan);
        assert_eq!(classify("ROOF FRAMING PLAN", None), DrawingType::Structural);
        assert_eq!(classify("DOOR SCHEDULE", None), DrawingType::Schedule);
        assert_eq!(classify("COVER SHEET", None), DrawingType::General);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(classify("enlarged roof plan", None), DrawingType::RoofPlan);
    }

    #[test]
    fn lower_priority_wins() {
        // Building section (30) and roof plan (10) both fire
        assert_eq!(
            classify("BUILDING SECTION - SEE ROOF PLAN", None),
            DrawingType::RoofPlan
        );
        assert_eq!(classify("NORTH ELEVATION", Some("A-501")), DrawingType::RoofPlan);
    }

    #[test]
    fn equal_priority_breaks_by_declaration_order() {
        // Detail and Wall Section are both priority 20; Detail is declared first
        assert_eq!(classify("WALL SECTION AND ROOF DETAIL", None), DrawingType::Detail);
        assert_eq!(classify("ROOF DETAIL AND WALL SECTION", None), DrawingType::Detail);
        assert_eq!(classify("WALL SECTION", None), DrawingType::WallSection);
    }

    #[test]
    fn custom_rules_keep_declaration_order_on_ties() {
        let rules = vec![
            DrawingRule {
                drawing_type: DrawingType::WallSection,
                priority: 5,
                patterns: vec!["section".into()],
            },
            DrawingRule {
                drawing_type: DrawingType::Detail,
                priority: 5,
                patterns: vec!["section".into()],
            },
        ];
        let classifier = DrawingTypeClassifier::with_rules(rules).unwrap();
        assert_eq!(classifier.classify("SECTION", None), DrawingType::WallSection);
    }

    #[test]
    fn invalid_custom_pattern_is_an_error() {
        let rules = vec![DrawingRule {
            drawing_type: DrawingType::Detail,
            priority: 1,
            patterns: vec!["(unclosed".into()],
        }];
        let err = DrawingTypeClassifier::with_rules(rules).unwrap_err();
        assert!(matches!(err, crate::error::Error::Pattern(_)));
    }

    #[test]
    fn nothing_matches_falls_back_to_other() {
        assert_eq!(classify("lorem ipsum", None), DrawingType::Other);
        assert_eq!(classify("", None), DrawingType::Other);
        assert_eq!(classify("", Some("   ")), DrawingType::Other);
    }

    #[test]
    fn tier_depends_only_on_type() {
        let classifier = DrawingTypeClassifier::new();
        let a = classifier.classify_page(&PageTextUnit::new(1, Some("A-501"), None, "x"));
        let b = classifier.classify_page(&PageTextUnit::new(2, None, None, "MAIN ROOF PLAN"));
        assert_eq!(a.drawing_type, b.drawing_type);
        assert_eq!(a.tier, b.tier);
        for t in DrawingType::ALL {
            assert_eq!(t.tier(), t.tier());
        }
        assert_eq!(DrawingType::Detail.tier(), RelevanceTier::Critical);
        assert_eq!(DrawingType::Other.tier(), RelevanceTier::Low);
    }

    #[test]
    fn empty_page_is_other_with_diagnostic() {
        let c = DrawingTypeClassifier::new().classify_page(&PageTextUnit::new(4, None, None, "  "));
        assert_eq!(c.drawing_type, DrawingType::Other);
        assert_eq!(c.diagnostics.len(), 1);
        assert!(matches!(c.diagnostics[0], Diagnostic::EmptyInput { .. }));
    }

    #[test]
    fn critical_sheet_set() {
        let critical: Vec<_> = DrawingType::ALL
            .into_iter()
            .filter(|t| t.is_critical_sheet())
            .collect();
        assert_eq!(
            critical,
            vec![
                DrawingType::RoofPlan,
                DrawingType::Detail,
                DrawingType::WallSection,
                DrawingType::BuildingSection,
                DrawingType::ExteriorElevation,
            ]
        );
    }
}
