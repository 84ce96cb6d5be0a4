//! In-progress stack for circular dependency detection.

use crate::key::CallableId;
use crate::result::CycleLink;
use crate::types::TypeRef;

/// Requests currently being resolved, outermost first, with the candidate
/// chosen for each.
///
/// Choosing a candidate that is already in progress for the same type
/// closes a cycle. Matching on the candidate as well as the type lets a
/// function-type provider parameter shadow an outer request of that type.
pub(crate) struct ResolutionStack {
    frames: Vec<CycleLink>,
    max_depth: usize,
}

/// Pushing would exceed the configured depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DepthExceeded;

impl ResolutionStack {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub(crate) fn push(&mut self, ty: TypeRef, candidate: CallableId) -> Result<(), DepthExceeded> {
        if self.frames.len() >= self.max_depth {
            return Err(DepthExceeded);
        }
        self.frames.push(CycleLink { ty, candidate });
        Ok(())
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The cycle re-entering (`ty`, `candidate`) would close, from its
    /// first occurrence to the top of the stack
    pub(crate) fn cycle_from(&self, ty: &TypeRef, candidate: &CallableId) -> Option<Vec<CycleLink>> {
        let start = self
            .frames
            .iter()
            .position(|frame| &frame.ty == ty && &frame.candidate == candidate)?;
        Some(self.frames[start..].to_vec())
    }
}
