//! The parse stack arena.
//!
//! GLR "parallel stacks" are persistent linked stacks: every frame points at
//! its parent, frames are never mutated, and forked heads share their common
//! prefix. Frames live in one append-only arena indexed by integer handles,
//! so there is no ownership cycle between stacks and subtrees and the whole
//! structure is dropped at once when the parse finishes.

use crate::base::Length;
use crate::grammar::StateId;
use crate::tree::subtree::Subtree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameId(u32);

#[derive(Debug)]
pub(crate) struct Frame {
    pub state: StateId,
    /// `None` only for the bottom-of-stack frame.
    pub subtree: Option<Subtree>,
    pub parent: Option<FrameId>,
}

#[derive(Debug, Default)]
pub(crate) struct StackArena {
    frames: Vec<Frame>,
}

impl StackArena {
    pub fn push(
        &mut self,
        parent: Option<FrameId>,
        state: StateId,
        subtree: Option<Subtree>,
    ) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame {
            state,
            subtree,
            parent,
        });
        id
    }

    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    /// All subtrees on the stack, bottom to top.
    pub fn collect(&self, top: FrameId) -> Vec<Subtree> {
        let mut out = Vec::new();
        let mut cursor = Some(top);
        while let Some(id) = cursor {
            let frame = self.frame(id);
            if let Some(subtree) = &frame.subtree {
                out.push(subtree.clone());
            }
            cursor = frame.parent;
        }
        out.reverse();
        out
    }
}

/// One live parse attempt: the top of its stack plus progress bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct Head {
    pub top: FrameId,
    /// Cached copy of `frame(top).state`.
    pub state: StateId,
    /// Absolute position after everything consumed so far.
    pub position: Length,
    pub error_cost: u32,
    /// Fork sequence number; earlier forks are preferred on merge.
    pub order: u32,
}

impl Head {
    /// Of two heads at the same state and position, the one worth keeping.
    pub fn better_than(&self, other: &Head) -> bool {
        self.error_cost < other.error_cost
            || (self.error_cost == other.error_cost && self.order < other.order)
    }
}
