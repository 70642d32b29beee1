//! Call frames.
//!
//! Each frame owns a private [`bumpalo::Bump`] arena for its locals.
//! Pushing a frame is "checkpoint the arena"; popping it is "release
//! the checkpoint" — here expressed as allocating a fresh arena on
//! push and letting `Drop` reclaim it on pop, rather than the
//! reference VM's single shared arena plus an explicit
//! `gbTempArenaMemory` begin/end pair. RAII gives the same LIFO
//! discipline without a separate checkpoint token to thread through.

use std::alloc::Layout;
use std::collections::HashMap;

use bumpalo::Bump;

use crate::ssa::{BlockId, ProcId, ValueId};
use crate::value::VmValue;

pub struct VmFrame {
    pub curr_proc: ProcId,
    pub curr_block: BlockId,
    /// The block control last jumped from, consulted by `Phi`. `None`
    /// for a frame that has not yet taken a branch (the reference VM
    /// has no equivalent and panics on `Phi`; this field is this
    /// crate's fix for that, per this crate's redesign notes).
    pub prev_block: Option<BlockId>,
    pub instr_index: usize,
    pub finished: bool,
    values: HashMap<ValueId, VmValue>,
    pub locals: Vec<*mut u8>,
    pub result: VmValue,
    arena: Bump,
}

impl VmFrame {
    pub fn new(proc: ProcId, entry_block: BlockId) -> Self {
        VmFrame {
            curr_proc: proc,
            curr_block: entry_block,
            prev_block: None,
            instr_index: 0,
            finished: false,
            values: HashMap::new(),
            locals: Vec::new(),
            result: VmValue::default(),
            arena: Bump::new(),
        }
    }

    pub fn set_value(&mut self, v: ValueId, val: VmValue) {
        self.values.insert(v, val);
    }

    pub fn get_value(&self, v: ValueId) -> Option<&VmValue> {
        self.values.get(&v)
    }

    /// Allocate `size` bytes aligned to `align` out of this frame's
    /// arena; the memory is valid until the frame is popped.
    pub fn alloc(&mut self, size: u64, align: u64) -> *mut u8 {
        let size = size.max(1) as usize;
        let align = (align.max(1) as usize).next_power_of_two();
        let layout = Layout::from_size_align(size, align).expect("invalid local layout");
        self.arena.alloc_layout(layout).as_ptr()
    }

    /// Jump to `block`, recording the block jumped from for `Phi`.
    pub fn jump_to(&mut self, block: BlockId) {
        self.prev_block = Some(self.curr_block);
        self.curr_block = block;
        self.instr_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_aligned_non_null_pointer() {
        let mut f = VmFrame::new(ProcId(0), BlockId(0));
        let p = f.alloc(3, 4);
        assert!(!p.is_null());
        assert_eq!((p as usize) % 4, 0);
    }

    #[test]
    fn jump_to_records_predecessor() {
        let mut f = VmFrame::new(ProcId(0), BlockId(0));
        f.jump_to(BlockId(1));
        assert_eq!(f.prev_block, Some(BlockId(0)));
        assert_eq!(f.curr_block, BlockId(1));
    }
}
