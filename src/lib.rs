//! Route compiler for a DEX aggregator executor.
//!
//! Takes an already-decided swap route (`SwapDescriptor`) and compiles it into
//! the packed instruction stream an on-chain executor contract interprets:
//!
//! 1. each hop's exchange adapter produces its call (`dex`);
//! 2. the position resolver finds the byte offsets the executor patches at run
//!    time (`execution::positions`);
//! 3. the encoder packs one fixed-header record per hop (`execution::encoder`);
//! 4. the assembler validates the route and concatenates the records
//!    (`execution::assembler`).

pub mod abi;
pub mod config;
pub mod dex;
pub mod errors;
pub mod execution;
pub mod types;

pub use config::NetworkConfig;
pub use dex::{AdapterRegistry, DexAdapter, ExchangeAdapter};
pub use errors::{AdapterError, CompileError, DecodeError, EncodingError, PositionError};
pub use execution::{ExecutionPlan, ExecutorVersion, InstructionFlags, PlanAssembler};
pub use types::{Hop, Leg, LegStep, SwapDescriptor, SwapRequest, SwapSide};
