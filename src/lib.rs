//! Rule-based takeoff engine for commercial roofing construction documents:
//! drawing-sheet classification, Division 07 scope matching, assembly letter
//! extraction and specification parsing over already-extracted PDF text.

pub mod error;
pub mod escalation;
pub mod input;
pub mod parser;
pub mod registry;
pub mod settings;

pub use error::{Diagnostic, Error, RegistryError, Result};
pub use escalation::{Escalation, NeverEscalate, SparseEvidence};
pub use parser::classify::{DrawingType, DrawingTypeClassifier, RelevanceTier};
pub use parser::extract::{AssemblyRecord, AssemblyRow};
pub use parser::page::PageTextUnit;
pub use parser::scope::{ScopeAnalysis, ScopeKeywordMatcher, ScopeMatch};
pub use parser::sections::AssemblySectionSplitter;
pub use parser::spec::SpecSummary;
pub use parser::{AssemblyReport, DrawingSetReport, Engine};
pub use registry::{ScopeDefinition, ScopeRegistry};
pub use settings::Settings;
