//! Runtime settings: built-in defaults, then an optional TOML file, then
//! `ROOFTAKEOFF_*` environment variables.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::escalation::{Escalation, NeverEscalate, SparseEvidence};
use crate::parser::relevance::DEFAULT_MIN_RELEVANCE;
use crate::parser::sections::DEFAULT_LOOKAHEAD;
use crate::registry::ScopeRegistry;

pub const ENV_PREFIX: &str = "ROOFTAKEOFF";
/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_NAME: &str = "rooftakeoff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Characters after a roof-area heading searched for a field marker.
    pub section_lookahead: usize,
    pub min_roof_relevance: f64,
    pub infer_sheet_info: bool,
    pub include_empty_scopes: bool,
    /// JSON scope catalog; the built-in catalog when unset.
    pub registry_path: Option<PathBuf>,
    pub escalation: EscalationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            section_lookahead: DEFAULT_LOOKAHEAD,
            min_roof_relevance: DEFAULT_MIN_RELEVANCE,
            infer_sheet_info: true,
            include_empty_scopes: false,
            registry_path: None,
            escalation: EscalationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSettings {
    pub enabled: bool,
    pub min_critical_sheets: usize,
    pub score_floor: f64,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        let sparse = SparseEvidence::default();
        EscalationSettings {
            enabled: true,
            min_critical_sheets: sparse.min_critical_sheets,
            score_floor: sparse.score_floor,
        }
    }
}

impl EscalationSettings {
    pub fn policy(&self) -> Box<dyn Escalation> {
        if self.enabled {
            Box::new(SparseEvidence {
                min_critical_sheets: self.min_critical_sheets,
                score_floor: self.score_floor,
            })
        } else {
            Box::new(NeverEscalate)
        }
    }
}

impl Settings {
    /// `path` must exist when given; otherwise `rooftakeoff.toml` (or any
    /// format `config` recognizes) is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn registry(&self) -> Result<ScopeRegistry> {
        match &self.registry_path {
            Some(path) => Ok(ScopeRegistry::load(path)?),
            None => Ok(ScopeRegistry::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.section_lookahead, 200);
        assert_eq!(s.min_roof_relevance, 0.3);
        assert!(s.infer_sheet_info);
        assert!(s.escalation.enabled);
        assert_eq!(s.registry().unwrap().len(), ScopeRegistry::builtin().len());
    }

    #[test]
    fn file_overrides_defaults() {
        let s = Settings::load(Some(Path::new("tests/fixtures/settings.toml"))).unwrap();
        assert_eq!(s.section_lookahead, 300);
        assert!(s.include_empty_scopes);
        assert_eq!(s.escalation.score_floor, 0.5);
        // untouched keys keep their defaults
        assert_eq!(s.min_roof_relevance, 0.3);
        assert_eq!(s.escalation.min_critical_sheets, 1);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Settings::load(Some(Path::new("tests/fixtures/no_such_settings.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn registry_path_is_loaded() {
        let s = Settings {
            registry_path: Some(PathBuf::from("tests/fixtures/registry.json")),
            ..Settings::default()
        };
        let registry = s.registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("075000").is_some());
    }
}
