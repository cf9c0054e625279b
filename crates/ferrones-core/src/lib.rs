//! NES emulation core: the CPU-side bus and the console control surface.
//!
//! [`CpuBus`] is the address decoder — internal RAM with its mirrors, the
//! PPU and APU register shims, and the cartridge mapper installed from
//! `ferrones-mappers`. [`Console`] wires a `ferrones-cpu` CPU to that bus
//! and exposes the four host entry points (`power_on`, `step`, `run`,
//! `brk`) plus the per-cycle tick, `step_cycle`.
//!
//! # Example
//!
//! ```no_run
//! use ferrones_core::Console;
//!
//! let mut console = Console::new();
//! console
//!     .insert_cartridge_file("game.nes")
//!     .expect("load cartridge");
//! console.power_on();
//! while !console.step_cycle() {}
//! ```

#![warn(missing_docs)]

pub mod bus;
pub mod console;

pub use bus::{ppu_register_addr, CpuBus};
pub use console::{Console, ConsoleError};
