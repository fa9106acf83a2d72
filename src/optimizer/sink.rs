//! Hand-off of emitted actions to an external executor.

use crate::errors::Result;
use crate::types::Action;

/// Consumer of an ordered action list.
///
/// Implementations must apply (or queue) actions in the order given; the
/// order is what keeps a sequential executor solvent.
pub trait ActionSink: Send {
    /// Accept a complete, ordered action list.
    fn submit(&mut self, actions: &[Action]) -> Result<()>;
}

/// In-memory sink that records every submitted action.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    actions: Vec<Action>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

impl ActionSink for VecSink {
    fn submit(&mut self, actions: &[Action]) -> Result<()> {
        self.actions.extend_from_slice(actions);
        Ok(())
    }
}
