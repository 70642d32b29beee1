//! The SSA instruction set the virtual machine interprets.
//!
//! Values (instructions, constants, globals, parameters, procedures)
//! live in a flat arena and are referred to by [`ValueId`], matching
//! this workspace's identity-arena convention rather than the pointer
//! graph the reference VM walks (`ssaValue *`).

use sema_core::{ExactValue, NodeId, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvKind {
    Trunc,
    Zext,
    Fptrunc,
    Fpext,
    Fptoui,
    Fptosi,
    Uitofp,
    Sitofp,
    Ptrtoint,
    Inttoptr,
    Bitcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Quo,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::CmpEq | BinOp::CmpNe | BinOp::CmpLt | BinOp::CmpLe | BinOp::CmpGt | BinOp::CmpGe
        )
    }
}

#[derive(Debug, Clone)]
pub struct BoundsCheckInfo {
    pub pos: sema_core::Pos,
    pub index: ValueId,
    pub len: ValueId,
}

#[derive(Debug, Clone)]
pub struct SliceBoundsCheckInfo {
    pub pos: sema_core::Pos,
    pub low: ValueId,
    pub high: ValueId,
    pub max: Option<ValueId>,
    pub is_substring: bool,
}

/// What an instruction-kind [`SsaValue::Instr`] does. Each variant
/// carries operand [`ValueId`]s rather than re-deriving them from a
/// shared mutable cursor, matching the reference instruction union's
/// per-kind payload structs.
#[derive(Debug, Clone)]
pub enum Instr {
    Comment(String),
    Local { ty: TypeId },
    ZeroInit { address: ValueId },
    Store { address: ValueId, value: ValueId },
    Load { address: ValueId, ty: TypeId },
    ArrayElementPtr { address: ValueId, elem_index: ValueId },
    StructElementPtr { address: ValueId, elem_index: usize },
    PtrOffset { address: ValueId, offset: ValueId },
    /// Predecessor block -> incoming value. Evaluated against the
    /// frame's record of which block branched into the current one.
    Phi { incoming: Vec<(BlockId, ValueId)> },
    ArrayExtractValue { address: ValueId, index: usize },
    StructExtractValue { address: ValueId, index: usize },
    Jump { block: BlockId },
    If { cond: ValueId, true_block: BlockId, false_block: BlockId },
    Return { value: Option<ValueId> },
    Conv { kind: ConvKind, value: ValueId, from: TypeId, to: TypeId },
    Unreachable,
    BinaryOp { op: BinOp, ty: TypeId, left: ValueId, right: ValueId },
    Call { callee: ValueId, args: Vec<ValueId> },
    Select { cond: ValueId, true_value: ValueId, false_value: ValueId },
    BoundsCheck(BoundsCheckInfo),
    SliceBoundsCheck(SliceBoundsCheckInfo),
}

#[derive(Debug, Clone)]
pub enum SsaValue {
    Constant { value: ExactValue, ty: TypeId, node: Option<NodeId> },
    ConstantSlice { backing_array: ValueId, count: i64 },
    Global { name: String, ty: TypeId, init: Option<ValueId> },
    Param { ty: TypeId },
    Proc(ProcId),
    /// An external (host-provided) procedure: no SSA body, called
    /// through the name-keyed host table.
    ExternalProc { name: String },
    Instr { kind: Instr, ty: TypeId },
}

#[derive(Debug, Clone, Default)]
pub struct SsaBlock {
    pub instrs: Vec<ValueId>,
}

#[derive(Debug, Clone)]
pub struct SsaProcedure {
    pub name: String,
    pub params: Vec<ValueId>,
    pub param_types: Vec<TypeId>,
    pub result_types: Vec<TypeId>,
    pub blocks: Vec<BlockId>,
    pub local_count: usize,
}

/// Owns every SSA value, block and procedure of one compiled module,
/// plus the [`crate::target::TargetSizes`] profile memory layout is
/// computed against.
#[derive(Debug)]
pub struct SsaModule {
    pub values: Vec<SsaValue>,
    pub blocks: Vec<SsaBlock>,
    pub procs: Vec<SsaProcedure>,
    pub sizes: crate::target::TargetSizes,
    /// Per-element values of a compound-literal constant, keyed by the
    /// literal's source node and already arranged in field/array
    /// order by the (out-of-scope) SSA-generation pass. The VM reads
    /// this instead of re-deriving element order from the AST.
    pub compound_elems: std::collections::HashMap<NodeId, Vec<ValueId>>,
}

impl SsaModule {
    pub fn new(sizes: crate::target::TargetSizes) -> Self {
        SsaModule {
            values: Vec::new(),
            blocks: Vec::new(),
            procs: Vec::new(),
            sizes,
            compound_elems: std::collections::HashMap::new(),
        }
    }

    pub fn push_value(&mut self, v: SsaValue) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(v);
        id
    }

    pub fn push_block(&mut self, b: SsaBlock) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(b);
        id
    }

    pub fn push_proc(&mut self, p: SsaProcedure) -> ProcId {
        let id = ProcId(self.procs.len() as u32);
        self.procs.push(p);
        id
    }

    pub fn value(&self, id: ValueId) -> &SsaValue {
        &self.values[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &SsaBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn proc(&self, id: ProcId) -> &SsaProcedure {
        &self.procs[id.0 as usize]
    }

    pub fn type_of(&self, id: ValueId) -> TypeId {
        match self.value(id) {
            SsaValue::Constant { ty, .. } => *ty,
            SsaValue::ConstantSlice { .. } => TypeId(0),
            SsaValue::Global { ty, .. } => *ty,
            SsaValue::Param { ty } => *ty,
            SsaValue::Proc(_) | SsaValue::ExternalProc { .. } => TypeId(0),
            SsaValue::Instr { ty, .. } => *ty,
        }
    }

    pub fn lookup_proc(&self, name: &str) -> Option<ValueId> {
        self.values.iter().enumerate().find_map(|(i, v)| match v {
            SsaValue::Proc(pid) if self.procs[pid.0 as usize].name == name => {
                Some(ValueId(i as u32))
            }
            SsaValue::ExternalProc { name: n } if n == name => Some(ValueId(i as u32)),
            _ => None,
        })
    }
}
