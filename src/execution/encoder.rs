//! # Instruction Encoder
//!
//! Serializes one hop into the fixed-width record the on-chain executor reads,
//! and decodes such records back for verification. Two layouts exist, tied 1:1
//! to executor contract versions:
//!
//! ```text
//! Layout A (Executor01/02):
//!   [20 target][4 len][2 fromAmount][2 srcToken][1 returnAmount][1 special][2 flags][28 zero][calldata]
//! Layout B (Executor03):
//!   [20 target][2 len][2 toAmount][2 fromAmount][2 srcToken][2 special][2 flags][28 zero][calldata]
//! ```
//!
//! All fields are big-endian. Both headers are 60 bytes.

use crate::errors::{DecodeError, EncodingError};
use crate::execution::flags::InstructionFlags;
use crate::types::FieldPositions;
use ethers::types::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ADDRESS_LEN: usize = 20;
pub const PADDING_LEN: usize = 28;
pub const HEADER_LEN: usize = 60;

/// Executor contract versions the compiler can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutorVersion {
    Executor01,
    Executor02,
    Executor03,
}

impl ExecutorVersion {
    pub fn layout(self) -> InstructionLayout {
        match self {
            ExecutorVersion::Executor01 | ExecutorVersion::Executor02 => InstructionLayout::Basic,
            ExecutorVersion::Executor03 => InstructionLayout::MultiField,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExecutorVersion::Executor01 => "Executor01",
            ExecutorVersion::Executor02 => "Executor02",
            ExecutorVersion::Executor03 => "Executor03",
        }
    }
}

impl fmt::Display for ExecutorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record layout of a packed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionLayout {
    /// Layout A: 4-byte length, 1-byte return amount and special exchange id, no toAmount.
    Basic,
    /// Layout B: 2-byte length, toAmount offset, 2-byte special exchange id, no returnAmount.
    MultiField,
}

impl InstructionLayout {
    /// Field widths in bytes; zero means the layout has no such field.
    const fn widths(self) -> FieldWidths {
        match self {
            InstructionLayout::Basic => FieldWidths {
                length: 4,
                from_amount: 2,
                to_amount: 0,
                src_token: 2,
                return_amount: 1,
                special: 1,
            },
            InstructionLayout::MultiField => FieldWidths {
                length: 2,
                from_amount: 2,
                to_amount: 2,
                src_token: 2,
                return_amount: 0,
                special: 2,
            },
        }
    }
}

#[derive(Clone, Copy)]
struct FieldWidths {
    length: usize,
    from_amount: usize,
    to_amount: usize,
    src_token: usize,
    return_amount: usize,
    special: usize,
}

/// Everything that goes into one record, before packing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionFields {
    pub target: Address,
    pub positions: FieldPositions,
    pub special_exchange: Option<u16>,
    pub flags: InstructionFlags,
    pub calldata: Bytes,
}

/// One encoded hop. Never mutated after encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct PackedInstruction {
    layout: InstructionLayout,
    bytes: Bytes,
}

impl PackedInstruction {
    pub fn layout(&self) -> InstructionLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn calldata(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    pub fn decode(&self) -> Result<InstructionFields, DecodeError> {
        decode_instruction(&self.bytes, 0, self.layout).map(|(fields, _)| fields)
    }
}

impl fmt::Debug for PackedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedInstruction({:?}, 0x{})", self.layout, hex::encode(&self.bytes))
    }
}

/// Pack one instruction.
///
/// Absent positions are written as zero and flagged absent. A position the layout
/// has no field for is dropped and flagged absent as well.
pub fn encode_instruction(
    fields: &InstructionFields,
    layout: InstructionLayout,
) -> Result<PackedInstruction, EncodingError> {
    let widths = layout.widths();
    let len = fields.calldata.len();

    let mut positions = fields.positions;
    if widths.to_amount == 0 {
        positions.to_amount = None;
    }
    if widths.return_amount == 0 {
        positions.return_amount = None;
    }
    for (field, offset) in positions.iter() {
        if let Some(offset) = offset {
            if offset as usize >= len {
                return Err(EncodingError::OffsetOutOfBounds { field, offset, len });
            }
        }
    }

    let mut flags = fields.flags;
    flags.mark_absent(&positions);
    flags.set(InstructionFlags::SPECIAL_EXCHANGE, fields.special_exchange.is_some());

    let mut out = Vec::with_capacity(HEADER_LEN + len);
    out.extend_from_slice(fields.target.as_bytes());
    put_be(&mut out, "calldataLength", len as u64, widths.length)?;
    match layout {
        InstructionLayout::Basic => {
            put_be(&mut out, "fromAmount", positions.from_amount.unwrap_or(0).into(), widths.from_amount)?;
            put_be(&mut out, "srcToken", positions.src_token.unwrap_or(0).into(), widths.src_token)?;
            put_be(&mut out, "returnAmount", positions.return_amount.unwrap_or(0).into(), widths.return_amount)?;
        }
        InstructionLayout::MultiField => {
            put_be(&mut out, "toAmount", positions.to_amount.unwrap_or(0).into(), widths.to_amount)?;
            put_be(&mut out, "fromAmount", positions.from_amount.unwrap_or(0).into(), widths.from_amount)?;
            put_be(&mut out, "srcToken", positions.src_token.unwrap_or(0).into(), widths.src_token)?;
        }
    }
    put_be(&mut out, "specialExchange", fields.special_exchange.unwrap_or(0).into(), widths.special)?;
    put_be(&mut out, "flags", flags.bits().into(), 2)?;
    out.extend_from_slice(&[0u8; PADDING_LEN]);
    debug_assert_eq!(out.len(), HEADER_LEN);
    out.extend_from_slice(&fields.calldata);

    Ok(PackedInstruction {
        layout,
        bytes: Bytes::from(out),
    })
}

/// Decode the instruction starting at `at`. Returns the fields and the offset of the next record.
///
/// Undefined flag bits and a nonzero special-exchange id without its flag are
/// rejected, as is any offset outside the calldata.
pub fn decode_instruction(
    data: &[u8],
    at: usize,
    layout: InstructionLayout,
) -> Result<(InstructionFields, usize), DecodeError> {
    let widths = layout.widths();
    let header = take(data, at, HEADER_LEN)?;
    let target = Address::from_slice(&header[..ADDRESS_LEN]);
    let mut cursor = ADDRESS_LEN;
    let mut next = |width: usize| -> u64 {
        let value = read_be(&header[cursor..cursor + width]);
        cursor += width;
        value
    };

    let len = next(widths.length) as usize;
    let (from_amount, to_amount, src_token, return_amount) = match layout {
        InstructionLayout::Basic => {
            let from_amount = next(widths.from_amount);
            let src_token = next(widths.src_token);
            let return_amount = next(widths.return_amount);
            (from_amount, 0, src_token, return_amount)
        }
        InstructionLayout::MultiField => {
            let to_amount = next(widths.to_amount);
            let from_amount = next(widths.from_amount);
            let src_token = next(widths.src_token);
            (from_amount, to_amount, src_token, 0)
        }
    };
    let special = next(widths.special) as u16;
    let flags = InstructionFlags::from_bits_retain(next(2) as u16);

    if header[HEADER_LEN - PADDING_LEN..].iter().any(|b| *b != 0) {
        return Err(DecodeError::NonZeroPadding { at });
    }
    if flags.has_unknown_bits() {
        return Err(DecodeError::UnknownFlags { at, bits: flags.unknown_bits() });
    }
    if special != 0 && !flags.is_special_exchange() {
        return Err(DecodeError::UnflaggedSpecialExchange { at, value: special });
    }

    let calldata = take(data, at + HEADER_LEN, len)?;
    let positions = flags.positions(from_amount as u16, to_amount as u16, src_token as u16, return_amount as u16);
    for (field, offset) in positions.iter() {
        if let Some(offset) = offset {
            if offset as usize >= len {
                return Err(DecodeError::OffsetOutOfBounds { target, field, offset, len });
            }
        }
    }

    let fields = InstructionFields {
        target,
        positions,
        special_exchange: flags.is_special_exchange().then_some(special),
        flags,
        calldata: Bytes::from(calldata.to_vec()),
    };
    Ok((fields, at + HEADER_LEN + len))
}

/// Split a concatenated plan back into its instructions.
pub fn decode_plan(data: &[u8], layout: InstructionLayout) -> Result<Vec<InstructionFields>, DecodeError> {
    let mut out = Vec::new();
    let mut at = 0;
    while at < data.len() {
        let (fields, next) = decode_instruction(data, at, layout)?;
        out.push(fields);
        at = next;
    }
    Ok(out)
}

fn put_be(out: &mut Vec<u8>, field: &'static str, value: u64, width: usize) -> Result<(), EncodingError> {
    let bits = (width * 8) as u32;
    if bits < 64 && value >> bits != 0 {
        return Err(EncodingError::Overflow { field, value, bits });
    }
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    Ok(())
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn take(data: &[u8], at: usize, needed: usize) -> Result<&[u8], DecodeError> {
    data.get(at..at.saturating_add(needed))
        .ok_or(DecodeError::Truncated {
            at,
            needed,
            available: data.len().saturating_sub(at),
        })
}
