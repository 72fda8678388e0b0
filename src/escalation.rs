//! The one seam between the deterministic engine and any secondary
//! (network-bound) analysis. The engine only records the decision.

use serde::Deserialize;

use crate::parser::scope::ScopeAnalysis;

pub trait Escalation: Send + Sync {
    fn escalate(&self, analysis: &ScopeAnalysis) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEscalate;

impl Escalation for NeverEscalate {
    fn escalate(&self, _analysis: &ScopeAnalysis) -> bool {
        false
    }
}

/// Escalate scopes that show up on enough critical sheets but never with a
/// convincing keyword score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SparseEvidence {
    pub min_critical_sheets: usize,
    pub score_floor: f64,
}

impl Default for SparseEvidence {
    fn default() -> Self {
        SparseEvidence {
            min_critical_sheets: 1,
            score_floor: 0.6,
        }
    }
}

impl Escalation for SparseEvidence {
    fn escalate(&self, analysis: &ScopeAnalysis) -> bool {
        analysis.critical_sheets.len() >= self.min_critical_sheets.max(1)
            && analysis
                .best_score()
                .is_some_and(|best| best < self.score_floor)
    }
}
