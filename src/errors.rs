//! # Centralized Error Handling
//!
//! Typed errors for every stage of route compilation. Each component reports
//! its own narrow error; the assembler wraps those with the index of the hop
//! that caused them so a rejected route can be diagnosed without re-running it.

use crate::types::SwapSide;
use ethers::abi::ParamType;
use ethers::types::Address;
use thiserror::Error;

/// Top-level error returned by `PlanAssembler::compile`.
///
/// No partial plan is ever produced: any of these aborts the whole route.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("hop {hop}: exchange {exchange} has no on-chain path for {side} swaps")]
    UnsupportedSide {
        hop: usize,
        exchange: String,
        side: SwapSide,
    },
    #[error("hop {hop}: position resolution failed: {source}")]
    PositionResolution {
        hop: usize,
        #[source]
        source: PositionError,
    },
    #[error("hop {hop}: instruction encoding failed: {source}")]
    EncodingOverflow {
        hop: usize,
        #[source]
        source: EncodingError,
    },
    #[error("leg {leg} (first hop {hop}): split shares sum to {total}, expected 100")]
    InvalidSplit { leg: usize, hop: usize, total: u32 },
    #[error("hop {hop}: invalid wrap/unwrap placement: {reason}")]
    InvalidWrapPlacement { hop: usize, reason: String },
    #[error("hop {hop}: no adapter registered for exchange {exchange}")]
    UnknownExchange { hop: usize, exchange: String },
    #[error("hop {hop}: adapter {exchange} failed: {source}")]
    Adapter {
        hop: usize,
        exchange: String,
        #[source]
        source: AdapterError,
    },
    #[error("leg {leg} (first hop {hop}): {field} total overflows 256 bits")]
    AmountOverflow {
        leg: usize,
        hop: usize,
        field: &'static str,
    },
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("no executor address configured for {0}")]
    UnknownExecutor(String),
}

impl CompileError {
    /// Hop index the error is attributed to, when it concerns a single hop.
    pub fn hop_index(&self) -> Option<usize> {
        match self {
            CompileError::UnsupportedSide { hop, .. }
            | CompileError::PositionResolution { hop, .. }
            | CompileError::EncodingOverflow { hop, .. }
            | CompileError::InvalidSplit { hop, .. }
            | CompileError::AmountOverflow { hop, .. }
            | CompileError::InvalidWrapPlacement { hop, .. }
            | CompileError::UnknownExchange { hop, .. }
            | CompileError::Adapter { hop, .. } => Some(*hop),
            CompileError::InvalidRoute(_) | CompileError::UnknownExecutor(_) => None,
        }
    }

    /// Lifts an adapter failure into the route-level taxonomy.
    pub(crate) fn from_adapter(hop: usize, exchange: &str, err: AdapterError) -> Self {
        match err {
            AdapterError::UnsupportedSide { side, .. } => CompileError::UnsupportedSide {
                hop,
                exchange: exchange.to_string(),
                side,
            },
            other => CompileError::Adapter {
                hop,
                exchange: exchange.to_string(),
                source: other,
            },
        }
    }
}

/// Errors raised by exchange adapters.
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    #[error("{exchange} does not support {side} swaps")]
    UnsupportedSide { exchange: String, side: SwapSide },
    #[error("invalid exchange data for {exchange}: {reason}")]
    InvalidData { exchange: String, reason: String },
    #[error("no {what} address configured for {exchange}")]
    MissingAddress { exchange: String, what: String },
    #[error("ABI error: {0}")]
    Abi(String),
}

/// Errors raised while locating patchable fields inside exchange calldata.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("calldata selector 0x{found} does not match {function} (0x{expected})")]
    SelectorMismatch {
        function: String,
        expected: String,
        found: String,
    },
    #[error("field {field} is not part of the {function} signature")]
    FieldNotInSignature { field: String, function: String },
    #[error("index {index} out of range for {param}")]
    ArgumentOutOfRange { index: usize, param: String },
    #[error("pointer at byte {at} resolves outside calldata of {len} bytes")]
    PointerOutOfBounds { at: usize, len: usize },
    #[error("resolved slot has type {0} which is not a single 32-byte word")]
    NotAWord(ParamType),
    #[error("offset {offset} exceeds the 16-bit position range")]
    OffsetTooLarge { offset: usize },
    #[error("hop consumes a previous leg's output but exposes no fromAmount position")]
    MissingChainedAmount,
}

/// Errors raised by the instruction encoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("{field} value {value} exceeds its {bits}-bit field")]
    Overflow {
        field: &'static str,
        value: u64,
        bits: u32,
    },
    #[error("{field} offset {offset} is outside calldata of {len} bytes")]
    OffsetOutOfBounds {
        field: &'static str,
        offset: u16,
        len: usize,
    },
}

/// Errors raised when decoding a packed instruction stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("instruction at byte {at} truncated: need {needed} bytes, {available} available")]
    Truncated {
        at: usize,
        needed: usize,
        available: usize,
    },
    #[error("instruction at byte {at} has non-zero reserved padding")]
    NonZeroPadding { at: usize },
    #[error("instruction at byte {at} sets undefined flag bits {bits:#06x}")]
    UnknownFlags { at: usize, bits: u16 },
    #[error("instruction at byte {at} carries special exchange {value} without the special-exchange flag")]
    UnflaggedSpecialExchange { at: usize, value: u16 },
    #[error("instruction for {target:?} references {field} offset {offset} outside its {len}-byte calldata")]
    OffsetOutOfBounds {
        target: Address,
        field: &'static str,
        offset: u16,
        len: usize,
    },
}
