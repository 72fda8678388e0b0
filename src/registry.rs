//! Read-only catalog of Division 07 specification scopes.
//!
//! The registry is built once (built-in catalog or a JSON file) and handed to
//! the engine by reference; nothing mutates it afterwards.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDefinition {
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub manufacturers: Vec<String>,
    /// Shop-drawing requirement template, category → free text.
    #[serde(default)]
    pub requirements: BTreeMap<String, String>,
}

impl ScopeDefinition {
    /// Keywords then manufacturers, lower-cased, blank and duplicate terms
    /// removed, declared order kept.
    pub fn search_terms(&self) -> Vec<String> {
        self.keywords
            .iter()
            .chain(self.manufacturers.iter())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .unique()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    scopes: Vec<ScopeDefinition>,
}

#[derive(Debug, Clone)]
pub struct ScopeRegistry {
    scopes: Vec<ScopeDefinition>,
}

impl ScopeRegistry {
    /// Validates and sorts by scope id.
    pub fn new(mut scopes: Vec<ScopeDefinition>) -> Result<Self, RegistryError> {
        let mut ids = HashSet::new();
        for scope in &scopes {
            if scope.id.len() != 6 || !scope.id.chars().all(|c| c.is_ascii_digit()) {
                return Err(RegistryError::InvalidId(scope.id.clone()));
            }
            if !ids.insert(scope.id.clone()) {
                return Err(RegistryError::DuplicateId(scope.id.clone()));
            }
            if scope.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(RegistryError::EmptyKeywords(scope.id.clone()));
            }
        }
        scopes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(ScopeRegistry { scopes })
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Self::new(file.scopes)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), scopes = registry.len(), "loaded scope registry");
        Ok(registry)
    }

    pub fn builtin() -> Self {
        ScopeRegistry {
            scopes: builtin_scopes(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ScopeDefinition> {
        self.scopes.iter().find(|s| s.id == id)
    }

    pub fn scopes(&self) -> &[ScopeDefinition] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn scope(
    id: &str,
    name: &str,
    keywords: &[&str],
    manufacturers: &[&str],
    requirements: &[(&str, &str)],
) -> ScopeDefinition {
    ScopeDefinition {
        id: id.to_string(),
        name: name.to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        manufacturers: manufacturers.iter().map(|s| s.to_string()).collect(),
        requirements: requirements
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

const ROOFING_MANUFACTURERS: &[&str] = &[
    "Carlisle",
    "GAF",
    "Firestone",
    "Johns Manville",
    "Versico",
    "Siplast",
    "Soprema",
    "Sika",
    "Tremco",
];

// Sorted by id.
fn builtin_scopes() -> Vec<ScopeDefinition> {
    vec![
        scope(
            "072100",
            "Thermal Insulation",
            &[
                "insulation",
                "polyiso",
                "polyisocyanurate",
                "tapered insulation",
                "mineral wool",
                "xps",
                "r-value",
                "072100",
                "07 21 00",
            ],
            &["Hunter Panels", "Atlas Roofing", "Rmax", "Owens Corning"],
            &[
                ("layout", "Tapered insulation layout with slopes, crickets and saddles."),
                ("thickness", "Insulation thickness and R-value at each roof area."),
            ],
        ),
        scope(
            "072700",
            "Air Barriers",
            &[
                "air barrier",
                "vapor retarder",
                "vapor barrier",
                "self-adhered",
                "transition membrane",
                "072700",
                "07 27 00",
            ],
            &["Henry", "Carlisle", "Tremco", "Grace"],
            &[("transitions", "Air barrier transitions at roof-to-wall interfaces.")],
        ),
        scope(
            "074113",
            "Metal Roof Panels",
            &[
                "standing seam",
                "metal roof panel",
                "roof panel",
                "panel clip",
                "snow guard",
                "074113",
                "07 41 13",
            ],
            &["Berridge", "Petersen", "McElroy", "Englert", "Centria"],
            &[
                ("layout", "Panel layout, seam orientation and clip spacing."),
                ("details", "Eave, rake, ridge and penetration details."),
            ],
        ),
        scope(
            "075000",
            "Membrane Roofing",
            &[
                "membrane",
                "roofing",
                "tpo",
                "pvc",
                "epdm",
                "modified bitumen",
                "cover board",
                "coverboard",
                "polyiso",
                "fully adhered",
                "mechanically attached",
                "roof drain",
                "075000",
                "07 50 00",
            ],
            ROOFING_MANUFACTURERS,
            &[
                ("roof plan", "Roof plan showing membrane layout, seams and drains."),
                ("details", "Perimeter, penetration and termination details."),
                ("attachment", "Fastening patterns for field, perimeter and corner zones."),
            ],
        ),
        scope(
            "075216",
            "SBS Modified Bituminous Membrane Roofing",
            &[
                "sbs",
                "modified bitumen",
                "mod bit",
                "base sheet",
                "cap sheet",
                "torch-applied",
                "hot asphalt",
                "075216",
                "07 52 16",
            ],
            &["Siplast", "Soprema", "GAF", "Johns Manville", "Tremco"],
            &[("plies", "Ply layout and lap dimensions for base and cap sheets.")],
        ),
        scope(
            "075323",
            "EPDM Roofing",
            &["epdm", "ethylene propylene", "ballasted", "075323", "07 53 23"],
            &["Carlisle", "Firestone", "Versico", "Johns Manville"],
            &[("seams", "Seam tape and splice layout.")],
        ),
        scope(
            "075423",
            "Thermoplastic Polyolefin (TPO) Roofing",
            &[
                "tpo",
                "thermoplastic",
                "heat-welded",
                "hot-air welded",
                "075423",
                "07 54 23",
            ],
            &["Carlisle", "GAF", "Firestone", "Versico", "Johns Manville"],
            &[("seams", "Seam layout and welding details.")],
        ),
        scope(
            "076200",
            "Sheet Metal Flashing and Trim",
            &[
                "flashing",
                "coping",
                "edge metal",
                "gravel stop",
                "counterflashing",
                "gutter",
                "downspout",
                "scupper",
                "fascia",
                "076200",
                "07 62 00",
            ],
            &["Metal-Era", "Hickman", "Petersen", "Berridge"],
            &[
                ("profiles", "Profiles, gauges and joint details for sheet metal."),
                ("fabrication", "Fabrication and installation details at terminations."),
            ],
        ),
        scope(
            "077200",
            "Roof Accessories",
            &[
                "roof hatch",
                "curb",
                "equipment support",
                "pipe support",
                "skylight",
                "walkway pad",
                "pitch pocket",
                "077200",
                "07 72 00",
            ],
            &["Bilco", "Pate", "Miro", "Portals Plus"],
            &[("accessories", "Accessory locations and mounting details.")],
        ),
        scope(
            "079200",
            "Joint Sealants",
            &[
                "sealant",
                "joint sealant",
                "backer rod",
                "expansion joint",
                "079200",
                "07 92 00",
            ],
            &["Sika", "Tremco", "Dow", "Pecora"],
            &[("joints", "Joint locations, widths and sealant types.")],
        ),
    ]
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid_and_sorted() {
        let builtin = ScopeRegistry::builtin();
        let revalidated = ScopeRegistry::new(builtin.scopes().to_vec()).unwrap();
        let ids: Vec<&str> = revalidated.scopes().iter().map(|s| s.id.as_str()).collect();
        let builtin_ids: Vec<&str> = builtin.scopes().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, builtin_ids);
        assert!(builtin.get("075000").is_some());
    }

    #[test]
    fn search_terms_dedupe_in_declared_order() {
        let s = scope("075000", "x", &["TPO", "membrane", "tpo", " "], &["Carlisle", "membrane"], &[]);
        assert_eq!(s.search_terms(), vec!["tpo", "membrane", "carlisle"]);
    }

    #[test]
    fn loads_json() {
        let json = r#"{"scopes": [
            {"id": "076200", "name": "Flashing", "keywords": ["coping"]},
            {"id": "075000", "name": "Membrane Roofing", "keywords": ["tpo"],
             "manufacturers": ["GAF"], "requirements": {"details": "Edge details."}}
        ]}"#;
        let registry = ScopeRegistry::from_json(json).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.scopes()[0].id, "075000");
        assert_eq!(registry.scopes()[0].requirements["details"], "Edge details.");
    }

    #[test]
    fn rejects_bad_ids() {
        let bad = vec![scope("7500", "x", &["a"], &[], &[])];
        assert!(matches!(ScopeRegistry::new(bad), Err(RegistryError::InvalidId(_))));
        let dup = vec![scope("075000", "x", &["a"], &[], &[]), scope("075000", "y", &["b"], &[], &[])];
        assert!(matches!(ScopeRegistry::new(dup), Err(RegistryError::DuplicateId(_))));
    }

    #[test]
    fn rejects_scope_without_keywords() {
        let empty = vec![scope("075000", "x", &[" "], &["GAF"], &[])];
        assert!(matches!(ScopeRegistry::new(empty), Err(RegistryError::EmptyKeywords(_))));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(ScopeRegistry::from_json("{"), Err(RegistryError::Json(_))));
    }
}
