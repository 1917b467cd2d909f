//! Execution module: turns a decided route into the executor's packed instruction stream.

pub mod assembler;
pub mod encoder;
pub mod flags;
pub mod positions;

pub use assembler::{ExecutionPlan, PlanAssembler};
pub use encoder::{
    decode_instruction, decode_plan, encode_instruction, ExecutorVersion, InstructionFields,
    InstructionLayout, PackedInstruction,
};
pub use flags::InstructionFlags;
pub use positions::{resolve_field, resolve_positions, CallLayout, FieldLocation, FieldPath, PatchField};
