pub mod frame;
pub mod host;
pub mod machine;
pub mod ssa;
pub mod target;
pub mod value;

pub use frame::VmFrame;
pub use host::HostTable;
pub use machine::VirtualMachine;
pub use ssa::{
    BinOp, BlockId, BoundsCheckInfo, ConvKind, Instr, ProcId, SliceBoundsCheckInfo, SsaBlock,
    SsaModule, SsaProcedure, SsaValue, ValueId,
};
pub use target::{Endian, TargetSizes};
pub use value::{ProcRef, VmValue};
