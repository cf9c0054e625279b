//! The console control surface.
//!
//! The host owns the scheduling loop and polls [`Console::step_cycle`];
//! the console decides whether a cycle actually runs. Four entry points
//! gate execution: `power_on` (reset and go), `run` (free-running),
//! `step` (halt again at the next retirement), `brk` (halt now).

use std::io::Read;
use std::path::Path;

use ferrones_cpu::{Cpu, Fault};
use ferrones_mappers::{create_mapper, Rom, RomError};

use crate::bus::CpuBus;

/// Errors surfaced at the host boundary.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Cartridge loading failed; nothing was installed.
    #[error(transparent)]
    Rom(#[from] RomError),
}

/// The emulated machine: CPU, bus, and the run/halt control flags.
pub struct Console {
    cpu: Cpu,
    bus: CpuBus,
    halt: bool,
    single_step: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// A powered-off console with no cartridge.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: CpuBus::new(),
            halt: true,
            single_step: false,
        }
    }

    /// Load a cartridge from a byte stream and install its mapper.
    ///
    /// Parsing completes before anything is installed, so a failed load
    /// leaves the previous cartridge (if any) in place.
    ///
    /// # Errors
    ///
    /// Any [`RomError`] from the loader.
    pub fn insert_cartridge<R: Read>(&mut self, reader: &mut R) -> Result<(), ConsoleError> {
        let rom = Rom::from_reader(reader)?;
        let mapper = create_mapper(rom)?;
        self.bus.install_mapper(mapper);
        Ok(())
    }

    /// Load a cartridge already held in memory.
    ///
    /// # Errors
    ///
    /// Any [`RomError`] from the loader.
    pub fn insert_cartridge_bytes(&mut self, data: &[u8]) -> Result<(), ConsoleError> {
        let mut cursor = data;
        self.insert_cartridge(&mut cursor)
    }

    /// Load a cartridge from a file.
    ///
    /// # Errors
    ///
    /// IO errors from opening the file, then any [`RomError`].
    pub fn insert_cartridge_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConsoleError> {
        let mut file = std::fs::File::open(path).map_err(RomError::from)?;
        self.insert_cartridge(&mut file)
    }

    /// Eject the cartridge.
    pub fn remove_cartridge(&mut self) {
        self.bus.remove_mapper();
    }

    /// Power on: reinitialise the registers, run the reset-vector
    /// sequence, clear the halt flag.
    pub fn power_on(&mut self) {
        self.cpu.power_on(&mut self.bus);
        self.halt = false;
    }

    /// Execute one instruction: the next retirement re-asserts halt.
    pub fn step(&mut self) {
        self.single_step = true;
        self.halt = false;
    }

    /// Free-run until told otherwise.
    pub fn run(&mut self) {
        self.single_step = false;
        self.halt = false;
    }

    /// Halt now, and stay in single-step mode.
    pub fn brk(&mut self) {
        self.halt = true;
        self.single_step = true;
    }

    /// Advance one cycle if not halted; returns the post-cycle halt flag.
    pub fn step_cycle(&mut self) -> bool {
        if !self.halt {
            self.cycle();
        }
        self.halt
    }

    /// Drive cycles until an instruction retires or the machine halts; a
    /// convenience for hosts and tests.
    pub fn step_instruction(&mut self) {
        while !self.halt && !self.cycle() {}
    }

    /// One CPU cycle plus the halt bookkeeping; returns true on
    /// instruction retirement.
    fn cycle(&mut self) -> bool {
        let retired = self.cpu.tick(&mut self.bus);
        if self.cpu.is_halted() || (retired && self.single_step) {
            self.halt = true;
        }
        retired
    }

    /// True while the machine refuses to advance.
    #[must_use]
    pub fn halted(&self) -> bool {
        self.halt
    }

    /// The CPU, for inspection.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutable CPU access, for hosts that preload register state.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// The bus, for inspection.
    #[must_use]
    pub fn bus(&self) -> &CpuBus {
        &self.bus
    }

    /// Mutable bus access.
    pub fn bus_mut(&mut self) -> &mut CpuBus {
        &mut self.bus
    }

    /// The invalid-opcode diagnostic, if the stepper halted on one.
    #[must_use]
    pub fn fault(&self) -> Option<Fault> {
        self.cpu.fault()
    }
}
