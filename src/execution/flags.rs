//! Instruction flag bitfield carried in every packed instruction.

use crate::types::FieldPositions;
use std::fmt;

/// 16-bit flag field of a packed instruction.
///
/// Bits describe exchange semantics and wrapping only; they never depend on amounts.
/// The `*_ABSENT` bits tell the decoder that a zero offset means "no such field".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InstructionFlags(u16);

impl InstructionFlags {
    pub const NEEDS_WRAP: Self = Self(1 << 0);
    pub const UNWRAP_OUTPUT: Self = Self(1 << 1);
    pub const SPECIAL_EXCHANGE: Self = Self(1 << 2);
    pub const NO_RECIPIENT_PARAM: Self = Self(1 << 3);
    pub const NO_DEST_TOKEN_PARAM: Self = Self(1 << 4);
    pub const SEND_NATIVE_VALUE: Self = Self(1 << 5);
    pub const FROM_AMOUNT_ABSENT: Self = Self(1 << 8);
    pub const TO_AMOUNT_ABSENT: Self = Self(1 << 9);
    pub const SRC_TOKEN_ABSENT: Self = Self(1 << 10);
    pub const RETURN_AMOUNT_ABSENT: Self = Self(1 << 11);

    const KNOWN: u16 = 0x0f3f;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Rebuild flags read off the wire. Unknown bits are kept so the decoder can report them.
    pub const fn from_bits_retain(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    pub const fn has_unknown_bits(self) -> bool {
        self.unknown_bits() != 0
    }

    /// Bits outside every defined flag.
    pub const fn unknown_bits(self) -> u16 {
        self.0 & !Self::KNOWN
    }

    pub const fn needs_wrap(self) -> bool {
        self.contains(Self::NEEDS_WRAP)
    }

    pub const fn unwraps_output(self) -> bool {
        self.contains(Self::UNWRAP_OUTPUT)
    }

    pub const fn is_special_exchange(self) -> bool {
        self.contains(Self::SPECIAL_EXCHANGE)
    }

    pub const fn has_recipient_param(self) -> bool {
        !self.contains(Self::NO_RECIPIENT_PARAM)
    }

    pub const fn has_dest_token_param(self) -> bool {
        !self.contains(Self::NO_DEST_TOKEN_PARAM)
    }

    pub const fn sends_native_value(self) -> bool {
        self.contains(Self::SEND_NATIVE_VALUE)
    }

    /// Set the absence bit of every position that is `None`.
    pub fn mark_absent(&mut self, positions: &FieldPositions) {
        self.set(Self::FROM_AMOUNT_ABSENT, positions.from_amount.is_none());
        self.set(Self::TO_AMOUNT_ABSENT, positions.to_amount.is_none());
        self.set(Self::SRC_TOKEN_ABSENT, positions.src_token.is_none());
        self.set(Self::RETURN_AMOUNT_ABSENT, positions.return_amount.is_none());
    }

    /// Apply the absence bits to raw offsets read off the wire.
    pub fn positions(self, from_amount: u16, to_amount: u16, src_token: u16, return_amount: u16) -> FieldPositions {
        let keep = |absent: Self, value: u16| (!self.contains(absent)).then_some(value);
        FieldPositions {
            from_amount: keep(Self::FROM_AMOUNT_ABSENT, from_amount),
            to_amount: keep(Self::TO_AMOUNT_ABSENT, to_amount),
            src_token: keep(Self::SRC_TOKEN_ABSENT, src_token),
            return_amount: keep(Self::RETURN_AMOUNT_ABSENT, return_amount),
        }
    }
}

impl std::ops::BitOr for InstructionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for InstructionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(InstructionFlags, &str); 10] = [
            (InstructionFlags::NEEDS_WRAP, "NEEDS_WRAP"),
            (InstructionFlags::UNWRAP_OUTPUT, "UNWRAP_OUTPUT"),
            (InstructionFlags::SPECIAL_EXCHANGE, "SPECIAL_EXCHANGE"),
            (InstructionFlags::NO_RECIPIENT_PARAM, "NO_RECIPIENT_PARAM"),
            (InstructionFlags::NO_DEST_TOKEN_PARAM, "NO_DEST_TOKEN_PARAM"),
            (InstructionFlags::SEND_NATIVE_VALUE, "SEND_NATIVE_VALUE"),
            (InstructionFlags::FROM_AMOUNT_ABSENT, "FROM_AMOUNT_ABSENT"),
            (InstructionFlags::TO_AMOUNT_ABSENT, "TO_AMOUNT_ABSENT"),
            (InstructionFlags::SRC_TOKEN_ABSENT, "SRC_TOKEN_ABSENT"),
            (InstructionFlags::RETURN_AMOUNT_ABSENT, "RETURN_AMOUNT_ABSENT"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "InstructionFlags({:#06x}: {})", self.0, names.join(" | "))
    }
}
