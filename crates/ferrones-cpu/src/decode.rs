//! Opcode decoding.
//!
//! The 6502 encoding splits into two halves. Opcodes with `byte & 0x03 ==
//! 0x01` form the ALU group: eight operations (selected by bits 5-7) sharing
//! the same eight addressing modes (selected by bits 2-4). Everything else
//! is a one-off and is enumerated. Bytes outside the implemented set decode
//! to `None`; the stepper halts the machine when it fetches one.

use crate::addressing::AddrMode;
use crate::status::Status;

/// Instruction semantics, independent of addressing.
#[allow(missing_docs)] // mnemonic names are self-describing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // ALU group
    Ora, And, Eor, Adc, Sta, Lda, Cmp, Sbc,
    // Loads/stores
    Ldx, Ldy, Stx, Sty,
    // Compares and bit test
    Cpx, Cpy, Bit,
    // Memory and accumulator shifts/rotates, memory inc/dec
    Asl, Lsr, Rol, Ror, Inc, Dec,
    // Register arithmetic and transfers
    Inx, Iny, Dex, Dey, Tax, Tay, Txa, Tya, Tsx, Txs,
    // Flag operations
    Clc, Sec, Cli, Sei, Clv, Cld, Sed,
    // Control flow
    Jmp, Jsr, Rts, Rti,
    Bpl, Bmi, Bvc, Bvs, Bcc, Bcs, Bne, Beq,
    // Stack
    Pha, Php, Pla, Plp,
    Nop,
}

impl Op {
    /// Branch predicate as `(mask, expected)`: the branch is taken when
    /// `P & mask == expected`. Only meaningful for the eight branch ops.
    #[must_use]
    pub fn branch_condition(self) -> (Status, Status) {
        match self {
            Self::Bpl => (Status::N, Status::empty()),
            Self::Bmi => (Status::N, Status::N),
            Self::Bvc => (Status::V, Status::empty()),
            Self::Bvs => (Status::V, Status::V),
            Self::Bcc => (Status::C, Status::empty()),
            Self::Bcs => (Status::C, Status::C),
            Self::Bne => (Status::Z, Status::empty()),
            Self::Beq => (Status::Z, Status::Z),
            _ => (Status::empty(), Status::empty()),
        }
    }
}

/// Per-cycle sequencing class of an instruction.
///
/// Every documented opcode follows one of these micro-step shapes; the
/// stepper selects the sequence from this value and `AddrMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Resolve address, read, operate on a register.
    Read,
    /// Resolve address, write. Never pre-reads the effective address.
    Write,
    /// Resolve address, read, modify internally, write back.
    Rmw,
    /// Register-only operation; dummy read at PC.
    Implied,
    /// Shift/rotate on A; dummy read at PC.
    Accumulator,
    /// Conditional relative branch.
    Branch,
    /// JMP absolute.
    JumpAbs,
    /// JMP indirect, with the page-wrap bug.
    JumpInd,
    /// JSR.
    Jsr,
    /// RTS.
    Rts,
    /// RTI.
    Rti,
    /// PHA/PHP.
    Push,
    /// PLA/PLP.
    Pull,
}

/// A decoded opcode: what to do, where the operand is, and which micro-step
/// sequence to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// Operation semantics.
    pub op: Op,
    /// Addressing mode.
    pub mode: AddrMode,
    /// Micro-step sequencing class.
    pub access: Access,
}

/// Decode one opcode byte. `None` means the byte is not an implemented
/// instruction — `$00` among them — and the machine must halt.
#[must_use]
pub fn decode(byte: u8) -> Option<Opcode> {
    if byte & 0x03 == 0x01 {
        return decode_alu(byte);
    }
    let (op, mode, access) = match byte {
        // Branches
        0x10 => (Op::Bpl, AddrMode::Rel, Access::Branch),
        0x30 => (Op::Bmi, AddrMode::Rel, Access::Branch),
        0x50 => (Op::Bvc, AddrMode::Rel, Access::Branch),
        0x70 => (Op::Bvs, AddrMode::Rel, Access::Branch),
        0x90 => (Op::Bcc, AddrMode::Rel, Access::Branch),
        0xB0 => (Op::Bcs, AddrMode::Rel, Access::Branch),
        0xD0 => (Op::Bne, AddrMode::Rel, Access::Branch),
        0xF0 => (Op::Beq, AddrMode::Rel, Access::Branch),

        // Flag operations
        0x18 => (Op::Clc, AddrMode::Imp, Access::Implied),
        0x38 => (Op::Sec, AddrMode::Imp, Access::Implied),
        0x58 => (Op::Cli, AddrMode::Imp, Access::Implied),
        0x78 => (Op::Sei, AddrMode::Imp, Access::Implied),
        0xB8 => (Op::Clv, AddrMode::Imp, Access::Implied),
        0xD8 => (Op::Cld, AddrMode::Imp, Access::Implied),
        0xF8 => (Op::Sed, AddrMode::Imp, Access::Implied),

        // Transfers
        0xAA => (Op::Tax, AddrMode::Imp, Access::Implied),
        0xA8 => (Op::Tay, AddrMode::Imp, Access::Implied),
        0x8A => (Op::Txa, AddrMode::Imp, Access::Implied),
        0x98 => (Op::Tya, AddrMode::Imp, Access::Implied),
        0xBA => (Op::Tsx, AddrMode::Imp, Access::Implied),
        0x9A => (Op::Txs, AddrMode::Imp, Access::Implied),

        // Register increment/decrement
        0xE8 => (Op::Inx, AddrMode::Imp, Access::Implied),
        0xC8 => (Op::Iny, AddrMode::Imp, Access::Implied),
        0xCA => (Op::Dex, AddrMode::Imp, Access::Implied),
        0x88 => (Op::Dey, AddrMode::Imp, Access::Implied),

        // Memory increment/decrement
        0xE6 => (Op::Inc, AddrMode::Zp0, Access::Rmw),
        0xF6 => (Op::Inc, AddrMode::Zpx, Access::Rmw),
        0xEE => (Op::Inc, AddrMode::Abs, Access::Rmw),
        0xFE => (Op::Inc, AddrMode::Abx, Access::Rmw),
        0xC6 => (Op::Dec, AddrMode::Zp0, Access::Rmw),
        0xD6 => (Op::Dec, AddrMode::Zpx, Access::Rmw),
        0xCE => (Op::Dec, AddrMode::Abs, Access::Rmw),
        0xDE => (Op::Dec, AddrMode::Abx, Access::Rmw),

        // Index compares
        0xE0 => (Op::Cpx, AddrMode::Imm, Access::Read),
        0xE4 => (Op::Cpx, AddrMode::Zp0, Access::Read),
        0xEC => (Op::Cpx, AddrMode::Abs, Access::Read),
        0xC0 => (Op::Cpy, AddrMode::Imm, Access::Read),
        0xC4 => (Op::Cpy, AddrMode::Zp0, Access::Read),
        0xCC => (Op::Cpy, AddrMode::Abs, Access::Read),

        // Shifts and rotates
        0x0A => (Op::Asl, AddrMode::Acc, Access::Accumulator),
        0x06 => (Op::Asl, AddrMode::Zp0, Access::Rmw),
        0x16 => (Op::Asl, AddrMode::Zpx, Access::Rmw),
        0x0E => (Op::Asl, AddrMode::Abs, Access::Rmw),
        0x1E => (Op::Asl, AddrMode::Abx, Access::Rmw),
        0x4A => (Op::Lsr, AddrMode::Acc, Access::Accumulator),
        0x46 => (Op::Lsr, AddrMode::Zp0, Access::Rmw),
        0x56 => (Op::Lsr, AddrMode::Zpx, Access::Rmw),
        0x4E => (Op::Lsr, AddrMode::Abs, Access::Rmw),
        0x5E => (Op::Lsr, AddrMode::Abx, Access::Rmw),
        0x2A => (Op::Rol, AddrMode::Acc, Access::Accumulator),
        0x26 => (Op::Rol, AddrMode::Zp0, Access::Rmw),
        0x36 => (Op::Rol, AddrMode::Zpx, Access::Rmw),
        0x2E => (Op::Rol, AddrMode::Abs, Access::Rmw),
        0x3E => (Op::Rol, AddrMode::Abx, Access::Rmw),
        0x6A => (Op::Ror, AddrMode::Acc, Access::Accumulator),
        0x66 => (Op::Ror, AddrMode::Zp0, Access::Rmw),
        0x76 => (Op::Ror, AddrMode::Zpx, Access::Rmw),
        0x6E => (Op::Ror, AddrMode::Abs, Access::Rmw),
        0x7E => (Op::Ror, AddrMode::Abx, Access::Rmw),

        // LDX/LDY
        0xA2 => (Op::Ldx, AddrMode::Imm, Access::Read),
        0xA6 => (Op::Ldx, AddrMode::Zp0, Access::Read),
        0xB6 => (Op::Ldx, AddrMode::Zpy, Access::Read),
        0xAE => (Op::Ldx, AddrMode::Abs, Access::Read),
        0xBE => (Op::Ldx, AddrMode::Aby, Access::Read),
        0xA0 => (Op::Ldy, AddrMode::Imm, Access::Read),
        0xA4 => (Op::Ldy, AddrMode::Zp0, Access::Read),
        0xB4 => (Op::Ldy, AddrMode::Zpx, Access::Read),
        0xAC => (Op::Ldy, AddrMode::Abs, Access::Read),
        0xBC => (Op::Ldy, AddrMode::Abx, Access::Read),

        // STX/STY
        0x86 => (Op::Stx, AddrMode::Zp0, Access::Write),
        0x96 => (Op::Stx, AddrMode::Zpy, Access::Write),
        0x8E => (Op::Stx, AddrMode::Abs, Access::Write),
        0x84 => (Op::Sty, AddrMode::Zp0, Access::Write),
        0x94 => (Op::Sty, AddrMode::Zpx, Access::Write),
        0x8C => (Op::Sty, AddrMode::Abs, Access::Write),

        // BIT
        0x24 => (Op::Bit, AddrMode::Zp0, Access::Read),
        0x2C => (Op::Bit, AddrMode::Abs, Access::Read),

        // Jumps and returns
        0x4C => (Op::Jmp, AddrMode::Abs, Access::JumpAbs),
        0x6C => (Op::Jmp, AddrMode::Ind, Access::JumpInd),
        0x20 => (Op::Jsr, AddrMode::Abs, Access::Jsr),
        0x60 => (Op::Rts, AddrMode::Imp, Access::Rts),
        0x40 => (Op::Rti, AddrMode::Imp, Access::Rti),

        // Stack
        0x48 => (Op::Pha, AddrMode::Imp, Access::Push),
        0x08 => (Op::Php, AddrMode::Imp, Access::Push),
        0x68 => (Op::Pla, AddrMode::Imp, Access::Pull),
        0x28 => (Op::Plp, AddrMode::Imp, Access::Pull),

        0xEA => (Op::Nop, AddrMode::Imp, Access::Implied),

        _ => return None,
    };
    Some(Opcode { op, mode, access })
}

/// Decode the ALU quarter of the opcode map.
fn decode_alu(byte: u8) -> Option<Opcode> {
    // $89 would be STA-immediate, which does not exist.
    if byte == 0x89 {
        return None;
    }
    let (op, access) = match byte & 0xE0 {
        0x00 => (Op::Ora, Access::Read),
        0x20 => (Op::And, Access::Read),
        0x40 => (Op::Eor, Access::Read),
        0x60 => (Op::Adc, Access::Read),
        0x80 => (Op::Sta, Access::Write),
        0xA0 => (Op::Lda, Access::Read),
        0xC0 => (Op::Cmp, Access::Read),
        0xE0 => (Op::Sbc, Access::Read),
        _ => return None,
    };
    // Bits 2-4 select the mode; bit 0 is already known to be set.
    let mode = match byte & 0x1C {
        0x00 => AddrMode::Idx,
        0x04 => AddrMode::Zp0,
        0x08 => AddrMode::Imm,
        0x0C => AddrMode::Abs,
        0x10 => AddrMode::Idy,
        0x14 => AddrMode::Zpx,
        0x18 => AddrMode::Aby,
        0x1C => AddrMode::Abx,
        _ => return None,
    };
    Some(Opcode { op, mode, access })
}

/// Cycle cost of one instruction.
///
/// `page_crossed` is the indexed/branch low-byte carry; `branch_taken` only
/// matters for `Access::Branch`. The stepper's measured cycle counts must
/// agree with this function for every documented opcode.
#[must_use]
pub const fn cycles_taken(
    access: Access,
    mode: AddrMode,
    page_crossed: bool,
    branch_taken: bool,
) -> u8 {
    match access {
        Access::Implied | Access::Accumulator => 2,
        Access::Read => {
            let base = match mode {
                AddrMode::Imm => 2,
                AddrMode::Zp0 => 3,
                AddrMode::Zpx | AddrMode::Zpy | AddrMode::Abs | AddrMode::Abx | AddrMode::Aby => 4,
                AddrMode::Idx => 6,
                AddrMode::Idy => 5,
                _ => 2,
            };
            let penalty = matches!(mode, AddrMode::Abx | AddrMode::Aby | AddrMode::Idy);
            base + (page_crossed && penalty) as u8
        }
        Access::Write => match mode {
            AddrMode::Zp0 => 3,
            AddrMode::Zpx | AddrMode::Zpy | AddrMode::Abs => 4,
            AddrMode::Abx | AddrMode::Aby => 5,
            AddrMode::Idx | AddrMode::Idy => 6,
            _ => 3,
        },
        Access::Rmw => match mode {
            AddrMode::Zp0 => 5,
            AddrMode::Zpx | AddrMode::Abs => 6,
            AddrMode::Abx => 7,
            _ => 5,
        },
        Access::Branch => 2 + branch_taken as u8 + (branch_taken && page_crossed) as u8,
        Access::JumpAbs => 3,
        Access::JumpInd => 5,
        Access::Jsr | Access::Rts | Access::Rti => 6,
        Access::Push => 3,
        Access::Pull => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alu_group_decodes_from_bit_fields() {
        // LDA in all eight modes
        for (byte, mode) in [
            (0xA9, AddrMode::Imm),
            (0xA5, AddrMode::Zp0),
            (0xB5, AddrMode::Zpx),
            (0xAD, AddrMode::Abs),
            (0xBD, AddrMode::Abx),
            (0xB9, AddrMode::Aby),
            (0xA1, AddrMode::Idx),
            (0xB1, AddrMode::Idy),
        ] {
            let opcode = decode(byte).unwrap();
            assert_eq!(opcode.op, Op::Lda);
            assert_eq!(opcode.mode, mode);
            assert_eq!(opcode.access, Access::Read);
        }

        let sta = decode(0x91).unwrap();
        assert_eq!(sta.op, Op::Sta);
        assert_eq!(sta.mode, AddrMode::Idy);
        assert_eq!(sta.access, Access::Write);
    }

    #[test]
    fn sta_immediate_is_invalid() {
        assert!(decode(0x89).is_none());
    }

    #[test]
    fn unimplemented_bytes_decode_to_none() {
        for byte in [0x00, 0x02, 0x03, 0x04, 0x0B, 0x1A, 0x44, 0x80, 0x9E, 0xDB, 0xFF] {
            assert!(decode(byte).is_none(), "{byte:02X} should be invalid");
        }
    }

    #[test]
    fn implemented_opcode_count() {
        let count = (0u16..256).filter(|b| decode(*b as u8).is_some()).count();
        assert_eq!(count, 150);
    }

    #[test]
    fn one_off_spot_checks() {
        let jmp = decode(0x6C).unwrap();
        assert_eq!((jmp.op, jmp.access), (Op::Jmp, Access::JumpInd));

        let inc = decode(0xFE).unwrap();
        assert_eq!((inc.mode, inc.access), (AddrMode::Abx, Access::Rmw));

        let txs = decode(0x9A).unwrap();
        assert_eq!(txs.op, Op::Txs);

        let ldx = decode(0xB6).unwrap();
        assert_eq!((ldx.op, ldx.mode), (Op::Ldx, AddrMode::Zpy));
    }

    #[test]
    fn branch_conditions() {
        assert_eq!(Op::Bne.branch_condition(), (Status::Z, Status::empty()));
        assert_eq!(Op::Beq.branch_condition(), (Status::Z, Status::Z));
        assert_eq!(Op::Bcs.branch_condition(), (Status::C, Status::C));
        assert_eq!(Op::Bpl.branch_condition(), (Status::N, Status::empty()));
    }

    #[test]
    fn cycle_table_matches_documented_timing() {
        use AddrMode::*;
        // LDA family
        assert_eq!(cycles_taken(Access::Read, Imm, false, false), 2);
        assert_eq!(cycles_taken(Access::Read, Zp0, false, false), 3);
        assert_eq!(cycles_taken(Access::Read, Zpx, false, false), 4);
        assert_eq!(cycles_taken(Access::Read, Abs, false, false), 4);
        assert_eq!(cycles_taken(Access::Read, Abx, false, false), 4);
        assert_eq!(cycles_taken(Access::Read, Abx, true, false), 5);
        assert_eq!(cycles_taken(Access::Read, Idx, false, false), 6);
        assert_eq!(cycles_taken(Access::Read, Idy, false, false), 5);
        assert_eq!(cycles_taken(Access::Read, Idy, true, false), 6);
        // Stores never get the discount
        assert_eq!(cycles_taken(Access::Write, Abx, false, false), 5);
        assert_eq!(cycles_taken(Access::Write, Idy, false, false), 6);
        // RMW
        assert_eq!(cycles_taken(Access::Rmw, Zp0, false, false), 5);
        assert_eq!(cycles_taken(Access::Rmw, Abx, false, false), 7);
        assert_eq!(cycles_taken(Access::Rmw, Abx, true, false), 7);
        // Branches
        assert_eq!(cycles_taken(Access::Branch, Rel, false, false), 2);
        assert_eq!(cycles_taken(Access::Branch, Rel, false, true), 3);
        assert_eq!(cycles_taken(Access::Branch, Rel, true, true), 4);
        assert_eq!(cycles_taken(Access::Branch, Rel, true, false), 2);
    }
}
