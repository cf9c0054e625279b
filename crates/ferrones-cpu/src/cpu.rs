//! The cycle-stepped 6502 core.
//!
//! `Cpu::tick` advances the processor by exactly one bus cycle. An
//! instruction occupies one fetch cycle plus the micro-steps of its
//! addressing mode and access pattern; the micro-step index returning to 0
//! is the only signal that the next call fetches a new opcode.

use crate::addressing::AddrMode;
use crate::bus::Bus;
use crate::decode::{decode, Access, Op, Opcode};
use crate::status::Status;
use crate::vectors;

/// Diagnostic left behind when the stepper fetches an opcode it does not
/// implement.
///
/// This is not surfaced as an error return: the machine halts and the host
/// observes `tick` making no progress. The fault stays inspectable until
/// the next power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid opcode ${opcode:02X} at ${pc:04X}")]
pub struct Fault {
    /// The offending opcode byte.
    pub opcode: u8,
    /// Address it was fetched from.
    pub pc: u16,
}

/// Placeholder occupying the latch before the first fetch.
const IDLE: Opcode = Opcode {
    op: Op::Nop,
    mode: AddrMode::Imp,
    access: Access::Implied,
};

/// NES 6502 CPU (no BCD arithmetic effect).
#[derive(Debug)]
pub struct Cpu {
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Program counter.
    pub pc: u16,
    /// Stack pointer low byte; the stack lives at `$0100 | s`.
    pub s: u8,
    /// Status register.
    pub p: Status,

    cycles: u64,
    halted: bool,
    fault: Option<Fault>,

    // Instruction latch: the state of the per-cycle machine.
    instr: Opcode,
    opcode: u8,
    step: u8,
    lo: u8,
    hi: u8,
    base: u16,
    addr: u16,
    value: u8,
    crossed: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Create a CPU in the pre-power-on state. Call [`Cpu::power_on`]
    /// before ticking.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            s: 0xFD,
            p: Status::POWER_ON,
            cycles: 0,
            halted: false,
            fault: None,
            instr: IDLE,
            opcode: 0,
            step: 0,
            lo: 0,
            hi: 0,
            base: 0,
            addr: 0,
            value: 0,
            crossed: false,
        }
    }

    /// Power-on / reset.
    ///
    /// Runs the six-cycle reset sequence: two discarded fetches at PC,
    /// three reads walking down the stack window, then the little-endian
    /// vector at `$FFFC/$FFFD`. Leaves A=X=Y=0, S=$FD, P=$24, and the
    /// micro-step index at 0.
    pub fn power_on(&mut self, bus: &mut impl Bus) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.s = 0xFD;
        self.p = Status::POWER_ON;
        self.halted = false;
        self.fault = None;
        self.instr = IDLE;
        self.step = 0;
        self.crossed = false;

        let _ = bus.read(self.pc);
        let _ = bus.read(self.pc.wrapping_add(1));
        let _ = bus.read(0x0100 + u16::from(self.s));
        let _ = bus.read(0x00FF + u16::from(self.s));
        let _ = bus.read(0x00FE + u16::from(self.s));
        let lo = bus.read(vectors::RESET);
        let hi = bus.read(vectors::RESET + 1);
        self.pc = u16::from_le_bytes([lo, hi]);
        self.cycles = 6;

        log::trace!("reset vector -> {:04X}", self.pc);
    }

    /// Advance exactly one cycle, issuing at most one bus access.
    ///
    /// Returns `true` when the cycle retired an instruction. A halted CPU
    /// makes no progress and returns `false`.
    pub fn tick(&mut self, bus: &mut impl Bus) -> bool {
        if self.halted {
            return false;
        }
        self.cycles += 1;

        if self.step == 0 {
            self.begin(bus);
            return false;
        }

        match self.instr.access {
            Access::Implied | Access::Accumulator => self.tick_implied(bus),
            Access::Read | Access::Write | Access::Rmw => self.tick_memory(bus),
            Access::Branch => self.tick_branch(bus),
            Access::JumpAbs => self.tick_jmp_abs(bus),
            Access::JumpInd => self.tick_jmp_ind(bus),
            Access::Jsr => self.tick_jsr(bus),
            Access::Rts => self.tick_rts(bus),
            Access::Rti => self.tick_rti(bus),
            Access::Push => self.tick_push(bus),
            Access::Pull => self.tick_pull(bus),
        }
    }

    /// Run whole instructions until one retires; returns cycles consumed.
    ///
    /// Stops early (returning the cycles spent so far) if the CPU halts on
    /// an invalid opcode.
    pub fn step_instruction(&mut self, bus: &mut impl Bus) -> u8 {
        let start = self.cycles;
        while !self.halted && !self.tick(bus) {}
        (self.cycles - start) as u8
    }

    /// Total cycles executed since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// True once the stepper has hit an unimplemented opcode.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The opcode byte currently latched (slot 0 of the instruction
    /// buffer). Stale between retirement and the next fetch.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// The invalid-opcode diagnostic, if the CPU is halted on one.
    #[must_use]
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Cycle 1 of every instruction: fetch and decode. An unimplemented
    /// opcode halts the machine with PC unmoved.
    fn begin(&mut self, bus: &mut impl Bus) {
        let byte = bus.read(self.pc);
        match decode(byte) {
            Some(instr) => {
                self.pc = self.pc.wrapping_add(1);
                self.opcode = byte;
                self.instr = instr;
                self.lo = 0;
                self.hi = 0;
                self.base = 0;
                self.addr = 0;
                self.value = 0;
                self.crossed = false;
                self.step = 1;
            }
            None => {
                self.halted = true;
                self.fault = Some(Fault {
                    opcode: byte,
                    pc: self.pc,
                });
                log::warn!("invalid opcode ${byte:02X} at ${:04X}, halting", self.pc);
            }
        }
    }

    // =========================================================================
    // Micro-step sequences
    // =========================================================================

    /// Two-cycle register-only and accumulator opcodes: dummy read at PC,
    /// then the operation.
    fn tick_implied(&mut self, bus: &mut impl Bus) -> bool {
        let _ = bus.read(self.pc);
        self.execute_implied();
        self.retire()
    }

    /// Read / write / read-modify-write through a memory addressing mode.
    #[allow(clippy::too_many_lines)]
    fn tick_memory(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match self.instr.mode {
            AddrMode::Imm => {
                self.value = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.execute_read();
                self.retire()
            }

            AddrMode::Zp0 => match step {
                1 => {
                    self.addr = u16::from(bus.read(self.pc));
                    self.pc = self.pc.wrapping_add(1);
                    false
                }
                _ => self.access_memory(bus, step - 2),
            },

            AddrMode::Zpx | AddrMode::Zpy => match step {
                1 => {
                    self.base = u16::from(bus.read(self.pc));
                    self.pc = self.pc.wrapping_add(1);
                    false
                }
                2 => {
                    // Dummy read of the un-indexed base while the index is
                    // added; the sum wraps within page zero.
                    let _ = bus.read(self.base);
                    let index = if self.instr.mode == AddrMode::Zpx {
                        self.x
                    } else {
                        self.y
                    };
                    self.addr = u16::from((self.base as u8).wrapping_add(index));
                    false
                }
                _ => self.access_memory(bus, step - 3),
            },

            AddrMode::Abs => match step {
                1 => {
                    self.lo = bus.read(self.pc);
                    self.pc = self.pc.wrapping_add(1);
                    false
                }
                2 => {
                    self.hi = bus.read(self.pc);
                    self.pc = self.pc.wrapping_add(1);
                    self.addr = u16::from_le_bytes([self.lo, self.hi]);
                    false
                }
                _ => self.access_memory(bus, step - 3),
            },

            AddrMode::Abx | AddrMode::Aby => match step {
                1 => {
                    self.lo = bus.read(self.pc);
                    self.pc = self.pc.wrapping_add(1);
                    false
                }
                2 => {
                    self.hi = bus.read(self.pc);
                    self.pc = self.pc.wrapping_add(1);
                    self.base = u16::from_le_bytes([self.lo, self.hi]);
                    let index = if self.instr.mode == AddrMode::Abx {
                        self.x
                    } else {
                        self.y
                    };
                    self.addr = self.base.wrapping_add(u16::from(index));
                    self.crossed = (self.base & 0x00FF) + u16::from(index) > 0x00FF;
                    false
                }
                3 => self.index_fixup(bus),
                _ => self.access_memory(bus, step - 4),
            },

            AddrMode::Idx => match step {
                1 => {
                    self.base = u16::from(bus.read(self.pc));
                    self.pc = self.pc.wrapping_add(1);
                    false
                }
                2 => {
                    // Dummy read of the base while X is added (page-zero wrap).
                    let _ = bus.read(self.base);
                    self.base = u16::from((self.base as u8).wrapping_add(self.x));
                    false
                }
                3 => {
                    self.lo = bus.read(self.base);
                    false
                }
                4 => {
                    self.hi = bus.read(u16::from((self.base as u8).wrapping_add(1)));
                    self.addr = u16::from_le_bytes([self.lo, self.hi]);
                    false
                }
                _ => self.access_memory(bus, step - 5),
            },

            AddrMode::Idy => match step {
                1 => {
                    self.base = u16::from(bus.read(self.pc));
                    self.pc = self.pc.wrapping_add(1);
                    false
                }
                2 => {
                    self.lo = bus.read(self.base);
                    false
                }
                3 => {
                    self.hi = bus.read(u16::from((self.base as u8).wrapping_add(1)));
                    self.base = u16::from_le_bytes([self.lo, self.hi]);
                    self.addr = self.base.wrapping_add(u16::from(self.y));
                    self.crossed = (self.base & 0x00FF) + u16::from(self.y) > 0x00FF;
                    false
                }
                4 => self.index_fixup(bus),
                _ => self.access_memory(bus, step - 5),
            },

            // Imp/Acc/Rel/Ind never route through the memory engine.
            _ => self.retire(),
        }
    }

    /// The extra cycle after an indexed high-byte fetch.
    ///
    /// Reads take it only on a page cross, as a dummy read of the un-fixed
    /// address. Stores and RMW ops always take it, and take it silently —
    /// they must not pre-read the effective address.
    fn index_fixup(&mut self, bus: &mut impl Bus) -> bool {
        if self.instr.access == Access::Read {
            if self.crossed {
                let _ = bus.read((self.base & 0xFF00) | (self.addr & 0x00FF));
                false
            } else {
                self.access_memory(bus, 0)
            }
        } else {
            false
        }
    }

    /// The data cycles once the effective address is resolved. `phase` is
    /// 0 on the first data cycle.
    fn access_memory(&mut self, bus: &mut impl Bus, phase: u8) -> bool {
        match self.instr.access {
            Access::Read => {
                self.value = bus.read(self.addr);
                self.execute_read();
                self.retire()
            }
            Access::Write => {
                bus.write(self.addr, self.store_value());
                self.retire()
            }
            Access::Rmw => match phase {
                0 => {
                    self.value = bus.read(self.addr);
                    false
                }
                1 => {
                    // Internal modify cycle. The hardware's dummy write of
                    // the old value is omitted.
                    self.value = self.apply_rmw(self.value);
                    false
                }
                _ => {
                    bus.write(self.addr, self.value);
                    self.retire()
                }
            },
            _ => self.retire(),
        }
    }

    fn tick_branch(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                self.lo = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                let (mask, expected) = self.instr.op.branch_condition();
                if self.p & mask != expected {
                    return self.retire();
                }
                false
            }
            2 => {
                // Penalty cycles are internal. The extra page-cross cycle
                // is charged when the low-byte addition carries out.
                self.crossed = (self.pc & 0x00FF) + u16::from(self.lo) > 0x00FF;
                let offset = i16::from(self.lo as i8) as u16;
                self.pc = self.pc.wrapping_add(offset);
                if self.crossed {
                    false
                } else {
                    self.retire()
                }
            }
            _ => self.retire(),
        }
    }

    fn tick_jmp_abs(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                self.lo = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                false
            }
            _ => {
                self.hi = bus.read(self.pc);
                self.pc = u16::from_le_bytes([self.lo, self.hi]);
                self.retire()
            }
        }
    }

    fn tick_jmp_ind(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                self.lo = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                false
            }
            2 => {
                self.hi = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.base = u16::from_le_bytes([self.lo, self.hi]);
                false
            }
            3 => {
                self.value = bus.read(self.base);
                false
            }
            _ => {
                // 6502 bug: a pointer at $xxFF fetches its high byte from
                // $xx00, not the next page.
                let hi_addr = (self.base & 0xFF00) | u16::from((self.base as u8).wrapping_add(1));
                let hi = bus.read(hi_addr);
                self.pc = u16::from_le_bytes([self.value, hi]);
                self.retire()
            }
        }
    }

    fn tick_jsr(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                self.lo = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                false
            }
            2 => {
                let _ = bus.read(0x0100 | u16::from(self.s));
                false
            }
            3 => {
                // PC now addresses the target high byte, i.e. return-1.
                self.push(bus, (self.pc >> 8) as u8);
                false
            }
            4 => {
                self.push(bus, (self.pc & 0xFF) as u8);
                false
            }
            _ => {
                self.hi = bus.read(self.pc);
                self.pc = u16::from_le_bytes([self.lo, self.hi]);
                self.retire()
            }
        }
    }

    fn tick_rts(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                let _ = bus.read(self.pc);
                false
            }
            2 => {
                let _ = bus.read(0x0100 | u16::from(self.s));
                false
            }
            3 => {
                self.lo = self.pull(bus);
                false
            }
            4 => {
                self.hi = self.pull(bus);
                self.pc = u16::from_le_bytes([self.lo, self.hi]);
                false
            }
            _ => {
                let _ = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.retire()
            }
        }
    }

    fn tick_rti(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                let _ = bus.read(self.pc);
                false
            }
            2 => {
                let _ = bus.read(0x0100 | u16::from(self.s));
                false
            }
            3 => {
                let value = self.pull(bus);
                self.p = Status::from_stack_byte(value);
                false
            }
            4 => {
                self.lo = self.pull(bus);
                false
            }
            _ => {
                self.hi = self.pull(bus);
                self.pc = u16::from_le_bytes([self.lo, self.hi]);
                self.retire()
            }
        }
    }

    fn tick_push(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                let _ = bus.read(self.pc);
                false
            }
            _ => {
                let value = match self.instr.op {
                    Op::Pha => self.a,
                    // PHP pushes with B and U set.
                    _ => self.p.to_stack_byte(),
                };
                self.push(bus, value);
                self.retire()
            }
        }
    }

    fn tick_pull(&mut self, bus: &mut impl Bus) -> bool {
        let step = self.step;
        self.step += 1;
        match step {
            1 => {
                let _ = bus.read(self.pc);
                false
            }
            2 => {
                let _ = bus.read(0x0100 | u16::from(self.s));
                false
            }
            _ => {
                let value = self.pull(bus);
                match self.instr.op {
                    Op::Pla => {
                        self.a = value;
                        self.p.set_zn(self.a);
                    }
                    _ => self.p = Status::from_stack_byte(value),
                }
                self.retire()
            }
        }
    }

    // =========================================================================
    // Operation kernels
    // =========================================================================

    fn execute_read(&mut self) {
        let value = self.value;
        match self.instr.op {
            Op::Lda => {
                self.a = value;
                self.p.set_zn(self.a);
            }
            Op::Ldx => {
                self.x = value;
                self.p.set_zn(self.x);
            }
            Op::Ldy => {
                self.y = value;
                self.p.set_zn(self.y);
            }
            Op::Ora => {
                self.a |= value;
                self.p.set_zn(self.a);
            }
            Op::And => {
                self.a &= value;
                self.p.set_zn(self.a);
            }
            Op::Eor => {
                self.a ^= value;
                self.p.set_zn(self.a);
            }
            Op::Adc => self.do_adc(value),
            // SBC is ADC of the complement.
            Op::Sbc => self.do_adc(!value),
            Op::Cmp => self.do_compare(self.a, value),
            Op::Cpx => self.do_compare(self.x, value),
            Op::Cpy => self.do_compare(self.y, value),
            Op::Bit => {
                self.p.set(Status::Z, self.a & value == 0);
                self.p.set(Status::V, value & 0x40 != 0);
                self.p.set(Status::N, value & 0x80 != 0);
            }
            _ => {}
        }
    }

    fn store_value(&self) -> u8 {
        match self.instr.op {
            Op::Sta => self.a,
            Op::Stx => self.x,
            _ => self.y,
        }
    }

    fn apply_rmw(&mut self, value: u8) -> u8 {
        let result = match self.instr.op {
            Op::Asl => {
                self.p.set(Status::C, value & 0x80 != 0);
                value << 1
            }
            Op::Lsr => {
                self.p.set(Status::C, value & 0x01 != 0);
                value >> 1
            }
            Op::Rol => {
                let carry_in = u8::from(self.p.contains(Status::C));
                self.p.set(Status::C, value & 0x80 != 0);
                (value << 1) | carry_in
            }
            Op::Ror => {
                let carry_in = u8::from(self.p.contains(Status::C));
                self.p.set(Status::C, value & 0x01 != 0);
                (value >> 1) | (carry_in << 7)
            }
            Op::Inc => value.wrapping_add(1),
            _ => value.wrapping_sub(1),
        };
        self.p.set_zn(result);
        result
    }

    fn execute_implied(&mut self) {
        match self.instr.op {
            // Transfers; TXS alone sets no flags.
            Op::Tax => {
                self.x = self.a;
                self.p.set_zn(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.p.set_zn(self.y);
            }
            Op::Txa => {
                self.a = self.x;
                self.p.set_zn(self.a);
            }
            Op::Tya => {
                self.a = self.y;
                self.p.set_zn(self.a);
            }
            Op::Tsx => {
                self.x = self.s;
                self.p.set_zn(self.x);
            }
            Op::Txs => self.s = self.x,

            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.p.set_zn(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.p.set_zn(self.y);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.p.set_zn(self.x);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.p.set_zn(self.y);
            }

            Op::Clc => self.p.remove(Status::C),
            Op::Sec => self.p.insert(Status::C),
            Op::Cli => self.p.remove(Status::I),
            Op::Sei => self.p.insert(Status::I),
            Op::Clv => self.p.remove(Status::V),
            Op::Cld => self.p.remove(Status::D),
            Op::Sed => self.p.insert(Status::D),

            // Accumulator-mode shifts/rotates.
            Op::Asl | Op::Lsr | Op::Rol | Op::Ror => self.a = self.apply_rmw(self.a),

            _ => {} // NOP
        }
    }

    fn do_adc(&mut self, value: u8) {
        let carry = u16::from(self.p.contains(Status::C));
        let sum = u16::from(self.a) + u16::from(value) + carry;
        let result = sum as u8;
        self.p.set(Status::C, sum > 0xFF);
        self.p
            .set(Status::V, !(self.a ^ value) & (self.a ^ result) & 0x80 != 0);
        self.a = result;
        self.p.set_zn(result);
    }

    fn do_compare(&mut self, register: u8, value: u8) {
        self.p.set(Status::C, register >= value);
        self.p.set_zn(register.wrapping_sub(value));
    }

    // =========================================================================
    // Stack and retirement plumbing
    // =========================================================================

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(0x0100 | u16::from(self.s), value);
        self.s = self.s.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.s = self.s.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.s))
    }

    fn retire(&mut self) -> bool {
        self.step = 0;
        log::trace!(
            "A:{:02X} X:{:02X} Y:{:02X} P:{:02X} S:{:02X} ({})",
            self.a,
            self.x,
            self.y,
            self.p.bits(),
            self.s,
            self.cycles
        );
        true
    }
}
