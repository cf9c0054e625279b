//! Processor status register (P).
//!
//! ```text
//! 7  6  5  4  3  2  1  0
//! N  V  U  B  D  I  Z  C
//! ```
//!
//! Two bits need care: U reads as 1 in every observable copy, and B exists
//! only in copies PHP pushes to the stack — the live register never
//! carries it.

use bitflags::bitflags;

bitflags! {
    /// Status register flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// Carry.
        const C = 1 << 0;
        /// Zero.
        const Z = 1 << 1;
        /// IRQ disable.
        const I = 1 << 2;
        /// Decimal mode. Tracked but has no effect on ADC/SBC (NES 6502).
        const D = 1 << 3;
        /// Break. Only ever set in copies PHP pushes.
        const B = 1 << 4;
        /// Unused. Always reads as 1.
        const U = 1 << 5;
        /// Overflow.
        const V = 1 << 6;
        /// Negative.
        const N = 1 << 7;
    }
}

impl Status {
    /// Value of P after power-on / reset: I and U set ($24).
    pub const POWER_ON: Self = Self::I.union(Self::U);

    /// Update Z and N from a result byte.
    #[inline]
    pub fn set_zn(&mut self, value: u8) {
        self.set(Self::Z, value == 0);
        self.set(Self::N, value & 0x80 != 0);
    }

    /// Byte as pushed to the stack by PHP: U and B are both set in the
    /// pushed copy.
    #[inline]
    #[must_use]
    pub const fn to_stack_byte(self) -> u8 {
        self.bits() | Self::U.bits() | Self::B.bits()
    }

    /// Rebuild P from a byte pulled off the stack: B is masked off, U is
    /// forced on (PLP/RTI behavior).
    #[inline]
    #[must_use]
    pub const fn from_stack_byte(value: u8) -> Self {
        Self::from_bits_truncate((value & !Self::B.bits()) | Self::U.bits())
    }
}
