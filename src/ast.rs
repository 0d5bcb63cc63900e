//! Bound script representation.
//!
//! Parsing produces a `Script`: an ordered list of step nodes, each
//! already bound to a handler. Execution never consults the source text
//! again.

use crate::phase::Phase;
use crate::registry::Handler;

/// One bound statement. `id` is monotonically increasing and breaks
/// ties between structurally equal steps; it equals source order.
#[derive(Debug, Clone)]
pub struct StepNode {
    pub id: u64,
    /// Original line, kept verbatim for the traceback.
    pub source: String,
    /// Quoted arguments in source order, interior spaces rewritten to `_`.
    pub args: Vec<String>,
    pub phase: Phase,
    /// Canonical pattern the statement bound to.
    pub pattern: String,
    pub handler: Handler,
}

/// A fully parsed and bound script, ready to run.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub steps: Vec<StepNode>,
}

impl Script {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
