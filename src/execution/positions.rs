//! # Position Resolver
//!
//! Locates the byte offsets inside an exchange call that the executor overwrites
//! at run time (input amount, output bound, source token). Offsets are derived
//! from the function's ABI layout and, where an argument sits behind a dynamic
//! pointer, from the pointer words in the calldata itself.

use crate::errors::PositionError;
use crate::types::FieldPositions;
use ethers::abi::{Function, ParamType};
use ethers::types::U256;
use std::fmt;
use std::sync::Arc;

const SELECTOR_LEN: usize = 4;
const WORD: usize = 32;

/// `withdraw(uint256)` on the wrapped native token: the amount word follows the selector.
pub const WRAP_UNWRAP_FROM_AMOUNT_POS: u16 = 4;

/// Legacy constant for the token slot of a packed `approve` instruction. It points
/// one byte past the 68-byte `approve(address,uint256)` payload, so it can never
/// satisfy the in-bounds offset rule and no instruction is built from it.
pub const APPROVE_CALLDATA_DEST_TOKEN_POS: u16 = 68;

/// Abstract parameters an executor may need to find inside an exchange call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchField {
    FromAmount,
    ToAmount,
    SrcToken,
    ReturnAmount,
    Recipient,
    DestToken,
}

impl fmt::Display for PatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatchField::FromAmount => "fromAmount",
            PatchField::ToAmount => "toAmount",
            PatchField::SrcToken => "srcToken",
            PatchField::ReturnAmount => "returnAmount",
            PatchField::Recipient => "recipient",
            PatchField::DestToken => "destToken",
        };
        f.write_str(name)
    }
}

/// Argument slot inside a call: top-level argument index, then tuple component
/// or array element indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<usize>);

impl FieldPath {
    pub fn arg(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn then(mut self, index: usize) -> Self {
        self.0.push(index);
        self
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

/// Where a field lives: derived from the ABI, or a literal offset for well-known calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLocation {
    Slot(FieldPath),
    Literal(u16),
}

/// An exchange function together with the slots of its patchable fields.
#[derive(Debug, Clone)]
pub struct CallLayout {
    pub function: Arc<Function>,
    pub from_amount: Option<FieldLocation>,
    pub to_amount: Option<FieldLocation>,
    pub src_token: Option<FieldLocation>,
    pub return_amount: Option<FieldLocation>,
    pub recipient: Option<FieldLocation>,
    pub dest_token: Option<FieldLocation>,
}

impl CallLayout {
    /// Layout with no patchable fields declared yet.
    pub fn new(function: Arc<Function>) -> Self {
        Self {
            function,
            from_amount: None,
            to_amount: None,
            src_token: None,
            return_amount: None,
            recipient: None,
            dest_token: None,
        }
    }

    pub fn with(mut self, field: PatchField, location: FieldLocation) -> Self {
        *self.slot_mut(field) = Some(location);
        self
    }

    pub fn with_slot(self, field: PatchField, path: FieldPath) -> Self {
        self.with(field, FieldLocation::Slot(path))
    }

    pub fn location(&self, field: PatchField) -> Option<&FieldLocation> {
        match field {
            PatchField::FromAmount => self.from_amount.as_ref(),
            PatchField::ToAmount => self.to_amount.as_ref(),
            PatchField::SrcToken => self.src_token.as_ref(),
            PatchField::ReturnAmount => self.return_amount.as_ref(),
            PatchField::Recipient => self.recipient.as_ref(),
            PatchField::DestToken => self.dest_token.as_ref(),
        }
    }

    fn slot_mut(&mut self, field: PatchField) -> &mut Option<FieldLocation> {
        match field {
            PatchField::FromAmount => &mut self.from_amount,
            PatchField::ToAmount => &mut self.to_amount,
            PatchField::SrcToken => &mut self.src_token,
            PatchField::ReturnAmount => &mut self.return_amount,
            PatchField::Recipient => &mut self.recipient,
            PatchField::DestToken => &mut self.dest_token,
        }
    }
}

/// Resolve one declared field to its byte offset within `calldata`.
///
/// Fails with `FieldNotInSignature` when the layout does not declare the field;
/// callers must treat such fields as absent rather than guess an offset.
pub fn resolve_field(
    layout: &CallLayout,
    calldata: &[u8],
    field: PatchField,
) -> Result<u16, PositionError> {
    let location = layout
        .location(field)
        .ok_or_else(|| PositionError::FieldNotInSignature {
            field: field.to_string(),
            function: layout.function.signature(),
        })?;

    let offset = match location {
        FieldLocation::Slot(path) => resolve_offset(&layout.function, calldata, path)?,
        FieldLocation::Literal(offset) => {
            check_selector(&layout.function, calldata)?;
            let offset = *offset as usize;
            if offset + WORD > calldata.len() {
                return Err(PositionError::PointerOutOfBounds {
                    at: offset,
                    len: calldata.len(),
                });
            }
            offset
        }
    };

    u16::try_from(offset).map_err(|_| PositionError::OffsetTooLarge { offset })
}

/// Resolve all patchable fields the executor consumes. Undeclared fields are absent.
pub fn resolve_positions(layout: &CallLayout, calldata: &[u8]) -> Result<FieldPositions, PositionError> {
    let optional = |field: PatchField| -> Result<Option<u16>, PositionError> {
        match layout.location(field) {
            Some(_) => resolve_field(layout, calldata, field).map(Some),
            None => Ok(None),
        }
    };

    Ok(FieldPositions {
        from_amount: optional(PatchField::FromAmount)?,
        to_amount: optional(PatchField::ToAmount)?,
        src_token: optional(PatchField::SrcToken)?,
        return_amount: optional(PatchField::ReturnAmount)?,
    })
}

/// Absolute offset of the 32-byte word at `path` in ABI-encoded `calldata`.
pub fn resolve_offset(
    function: &Function,
    calldata: &[u8],
    path: &FieldPath,
) -> Result<usize, PositionError> {
    check_selector(function, calldata)?;

    let indices = path.indices();
    let Some((&last, descend)) = indices.split_last() else {
        return Err(PositionError::FieldNotInSignature {
            field: "<empty path>".to_string(),
            function: function.signature(),
        });
    };

    // `base` is where the current tuple's head section starts; dynamic pointers
    // inside it are relative to that point.
    let mut base = SELECTOR_LEN;
    let mut types: Vec<ParamType> = function.inputs.iter().map(|p| p.kind.clone()).collect();
    let mut container = function.name.clone();

    for &index in descend {
        let (head, ty) = head_slot(&types, index, base, &container)?;
        let start = if is_dynamic(&ty) {
            let pointer = read_usize(calldata, head)?;
            checked_position(base, pointer, calldata.len())?
        } else {
            head
        };

        container = ty.to_string();
        match ty {
            ParamType::Tuple(components) => {
                base = start;
                types = components;
            }
            ParamType::FixedArray(inner, len) => {
                base = start;
                types = vec![*inner; len];
            }
            ParamType::Array(inner) => {
                let len = read_usize(calldata, start)?;
                base = start + WORD;
                // element heads must fit before we materialize them
                checked_position(base, len.saturating_mul(head_size(&inner)), calldata.len())?;
                types = vec![*inner; len];
            }
            other => {
                return Err(PositionError::ArgumentOutOfRange {
                    index,
                    param: other.to_string(),
                })
            }
        }
    }

    let (offset, ty) = head_slot(&types, last, base, &container)?;
    if !is_word(&ty) {
        return Err(PositionError::NotAWord(ty));
    }
    if offset + WORD > calldata.len() {
        return Err(PositionError::PointerOutOfBounds {
            at: offset,
            len: calldata.len(),
        });
    }
    Ok(offset)
}

fn check_selector(function: &Function, calldata: &[u8]) -> Result<(), PositionError> {
    let expected = function.short_signature();
    let found = calldata.get(..SELECTOR_LEN).unwrap_or(calldata);
    if found != expected {
        return Err(PositionError::SelectorMismatch {
            function: function.signature(),
            expected: hex::encode(expected),
            found: hex::encode(found),
        });
    }
    Ok(())
}

fn head_slot(
    types: &[ParamType],
    index: usize,
    base: usize,
    container: &str,
) -> Result<(usize, ParamType), PositionError> {
    let ty = types
        .get(index)
        .cloned()
        .ok_or_else(|| PositionError::ArgumentOutOfRange {
            index,
            param: container.to_string(),
        })?;
    let preceding: usize = types[..index].iter().map(head_size).sum();
    Ok((base + preceding, ty))
}

fn checked_position(base: usize, delta: usize, len: usize) -> Result<usize, PositionError> {
    base.checked_add(delta)
        .filter(|pos| *pos <= len)
        .ok_or(PositionError::PointerOutOfBounds { at: base, len })
}

fn read_usize(calldata: &[u8], at: usize) -> Result<usize, PositionError> {
    let word = calldata
        .get(at..at + WORD)
        .ok_or(PositionError::PointerOutOfBounds {
            at,
            len: calldata.len(),
        })?;
    let value = U256::from_big_endian(word);
    if value > U256::from(calldata.len()) {
        return Err(PositionError::PointerOutOfBounds {
            at,
            len: calldata.len(),
        });
    }
    Ok(value.as_usize())
}

/// Bytes a type occupies in the head section of its enclosing tuple.
fn head_size(ty: &ParamType) -> usize {
    if is_dynamic(ty) {
        return WORD;
    }
    match ty {
        ParamType::Tuple(components) => components.iter().map(head_size).sum(),
        ParamType::FixedArray(inner, len) => len * head_size(inner),
        _ => WORD,
    }
}

fn is_dynamic(ty: &ParamType) -> bool {
    match ty {
        ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
        ParamType::FixedArray(inner, _) => is_dynamic(inner),
        ParamType::Tuple(components) => components.iter().any(is_dynamic),
        _ => false,
    }
}

fn is_word(ty: &ParamType) -> bool {
    matches!(
        ty,
        ParamType::Address
            | ParamType::Uint(_)
            | ParamType::Int(_)
            | ParamType::Bool
            | ParamType::FixedBytes(_)
    )
}
