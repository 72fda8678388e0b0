pub mod approvals;
pub mod header;
pub mod layers;

use std::io::{self, Write};

use serde::Serialize;

use super::sections::{AssemblySection, AssemblySectionSplitter};
use crate::error::Diagnostic;

pub use approvals::{extract_approvals, ApprovalSet};
pub use header::{extract_header, AssemblyHeader};
pub use layers::{extract_layers, AttachmentMethod, LayerCategory, LayerSpec};

/// One roof area's assembly as found in the letter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyRecord {
    pub roof_area: String,
    pub spec_number: String,
    pub manufacturer: String,
    pub system: String,
    pub date: String,
    pub membranes: Vec<LayerSpec>,
    pub insulation: Vec<LayerSpec>,
    pub coverboards: Vec<LayerSpec>,
    pub vapor_barrier: Option<LayerSpec>,
    pub approvals: ApprovalSet,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl AssemblyRecord {
    pub fn layer_count(&self) -> usize {
        self.membranes.len()
            + self.insulation.len()
            + self.coverboards.len()
            + usize::from(self.vapor_barrier.is_some())
    }

    /// Flatten into the fixed-width spreadsheet row.
    pub fn to_row(&self) -> AssemblyRow {
        let cell = |layers: &[LayerSpec], i: usize| layers.get(i).map(LayerSpec::cell).unwrap_or_default();
        AssemblyRow {
            roof_area: self.roof_area.clone(),
            spec_number: self.spec_number.clone(),
            manufacturer: self.manufacturer.clone(),
            system: self.system.clone(),
            date: self.date.clone(),
            membrane_1: cell(&self.membranes, 0),
            membrane_2: cell(&self.membranes, 1),
            membrane_3: cell(&self.membranes, 2),
            insulation_1: cell(&self.insulation, 0),
            insulation_2: cell(&self.insulation, 1),
            insulation_3: cell(&self.insulation, 2),
            coverboard_1: cell(&self.coverboards, 0),
            coverboard_2: cell(&self.coverboards, 1),
            vapor_barrier: self.vapor_barrier.as_ref().map(LayerSpec::cell).unwrap_or_default(),
            fm_approval: self.approvals.fm.join("; "),
            ul_approval: self.approvals.ul.join("; "),
            astm_approval: self.approvals.astm.join("; "),
        }
    }
}

/// The legacy takeoff spreadsheet layout. Column order is fixed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyRow {
    pub roof_area: String,
    pub spec_number: String,
    pub manufacturer: String,
    pub system: String,
    pub date: String,
    pub membrane_1: String,
    pub membrane_2: String,
    pub membrane_3: String,
    pub insulation_1: String,
    pub insulation_2: String,
    pub insulation_3: String,
    pub coverboard_1: String,
    pub coverboard_2: String,
    pub vapor_barrier: String,
    pub fm_approval: String,
    pub ul_approval: String,
    pub astm_approval: String,
}

impl AssemblyRow {
    pub const HEADERS: [&'static str; 17] = [
        "Roof Area",
        "Spec Number",
        "Manufacturer",
        "System",
        "Date",
        "Membrane 1",
        "Membrane 2",
        "Membrane 3",
        "Insulation 1",
        "Insulation 2",
        "Insulation 3",
        "Coverboard 1",
        "Coverboard 2",
        "Vapor Barrier",
        "FM Approval",
        "UL Approval",
        "ASTM Approval",
    ];

    pub fn values(&self) -> [&str; 17] {
        [
            &self.roof_area,
            &self.spec_number,
            &self.manufacturer,
            &self.system,
            &self.date,
            &self.membrane_1,
            &self.membrane_2,
            &self.membrane_3,
            &self.insulation_1,
            &self.insulation_2,
            &self.insulation_3,
            &self.coverboard_1,
            &self.coverboard_2,
            &self.vapor_barrier,
            &self.fm_approval,
            &self.ul_approval,
            &self.astm_approval,
        ]
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_csv_line<W: Write>(out: &mut W, fields: &[&str]) -> io::Result<()> {
    let line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
    writeln!(out, "{}", line)
}

/// Header line, then one line per row.
pub fn write_csv<W: Write>(out: &mut W, rows: &[AssemblyRow]) -> io::Result<()> {
    write_csv_line(out, &AssemblyRow::HEADERS)?;
    for row in rows {
        write_csv_line(out, &row.values())?;
    }
    Ok(())
}

/// Extract one assembly from a single section's text. The roof area is left
/// blank; [`extract_section`] fills it from the section label.
pub fn extract(section_text: &str) -> AssemblyRecord {
    if section_text.trim().is_empty() {
        return AssemblyRecord {
            diagnostics: vec![Diagnostic::empty_input("assembly section")],
            ..AssemblyRecord::default()
        };
    }

    let header = extract_header(section_text);
    let layers = extract_layers(section_text);
    let mut record = AssemblyRecord {
        roof_area: String::new(),
        spec_number: header.spec_number,
        manufacturer: header.manufacturer,
        system: header.system,
        date: header.date,
        membranes: layers.membranes,
        insulation: layers.insulation,
        coverboards: layers.coverboards,
        vapor_barrier: layers.vapor_barrier,
        approvals: extract_approvals(section_text),
        diagnostics: layers.diagnostics,
    };
    if record.layer_count() == 0 {
        record.diagnostics.push(Diagnostic::no_match("assembly layers"));
    }
    record
}

pub fn extract_section(section: &AssemblySection) -> AssemblyRecord {
    let mut record = extract(&section.text);
    record.roof_area = section.label.clone();
    tracing::debug!(
        area = %record.roof_area,
        layers = record.layer_count(),
        "extracted assembly"
    );
    record
}

/// Split a whole letter and extract every section. Split diagnostics are
/// returned alongside the records.
pub fn extract_assemblies(
    text: &str,
    splitter: &AssemblySectionSplitter,
) -> (Vec<AssemblyRecord>, Vec<Diagnostic>) {
    let split = splitter.split(text);
    let records = split.sections.iter().map(extract_section).collect();
    (records, split.diagnostics)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> String {
        std::fs::read_to_string("tests/fixtures/assembly_letter.txt").unwrap()
    }

    #[test]
    fn letter_main_roof() {
        let (records, diags) = extract_assemblies(&letter(), &AssemblySectionSplitter::default());
        assert!(diags.is_empty());
        assert_eq!(records.len(), 2);

        let main = &records[0];
        assert_eq!(main.roof_area, "Main Roof");
        assert_eq!(main.manufacturer, "Carlisle SynTec");
        assert_eq!(main.system, "Sure-Weld TPO Fully Adhered");
        assert_eq!(main.date, "March 4, 2024");
        assert_eq!(main.spec_number, "075423");
        assert_eq!(main.membranes.len(), 1);
        assert_eq!(main.membranes[0].attachment, Some(AttachmentMethod::FullyAdhered));
        assert_eq!(main.insulation.len(), 2);
        assert_eq!(main.coverboards.len(), 1);
        assert!(main.vapor_barrier.is_some());
        assert_eq!(main.approvals.fm, vec!["FM 1-90"]);
        assert_eq!(main.approvals.ul, vec!["Class A"]);
        assert_eq!(main.approvals.astm, vec!["D6878"]);
    }

    #[test]
    fn letter_canopy_row() {
        let (records, _) = extract_assemblies(&letter(), &AssemblySectionSplitter::default());
        let canopy = &records[1];
        assert_eq!(canopy.roof_area, "Entry Canopy");
        assert_eq!(canopy.manufacturer, "Carlisle SynTec");
        let row = canopy.to_row();
        assert_eq!(row.membrane_1, "Sure-Seal EPDM 60 mil (Ballasted)");
        assert_eq!(row.membrane_2, "");
        assert_eq!(row.vapor_barrier, "");
    }

    #[test]
    fn caps_and_cap_diagnostic() {
        let text = "Manufacturer: GAF\n\
                    Insulation: EnergyGuard Polyiso 2.0\n\
                    Insulation: EnergyGuard Polyiso 1.5\n\
                    Insulation: EnergyGuard Tapered\n\
                    Insulation: EnergyGuard Cricket\n";
        let record = extract(text);
        assert_eq!(record.insulation.len(), 3);
        assert!(record
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::CapExceeded { found: 4, kept: 3, .. })));
    }

    #[test]
    fn row_matches_headers() {
        let record = AssemblyRecord {
            roof_area: "Low Roof".into(),
            approvals: ApprovalSet {
                fm: vec!["FM 1-90".into(), "RoofNav 123456".into()],
                ..ApprovalSet::default()
            },
            ..AssemblyRecord::default()
        };
        let row = record.to_row();
        assert_eq!(row.values().len(), AssemblyRow::HEADERS.len());
        assert_eq!(row.values()[0], "Low Roof");
        assert_eq!(row.fm_approval, "FM 1-90; RoofNav 123456");
    }

    #[test]
    fn csv_quotes_commas() {
        let row = AssemblyRow {
            roof_area: "Main Roof".into(),
            date: "March 4, 2024".into(),
            ..AssemblyRow::default()
        };
        let mut out = Vec::new();
        write_csv(&mut out, &[row]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Roof Area,Spec Number,"));
        assert!(lines.next().unwrap().starts_with("Main Roof,,,,\"March 4, 2024\","));
    }

    #[test]
    fn blank_section() {
        let record = extract("  \n");
        assert_eq!(record, AssemblyRecord {
            diagnostics: vec![Diagnostic::empty_input("assembly section")],
            ..AssemblyRecord::default()
        });
    }

    #[test]
    fn section_without_layers_notes_no_match() {
        let record = extract("Manufacturer: GAF\nSee attached.\n");
        assert_eq!(record.manufacturer, "GAF");
        assert!(matches!(record.diagnostics[..], [Diagnostic::NoMatch { .. }]));
    }
}
