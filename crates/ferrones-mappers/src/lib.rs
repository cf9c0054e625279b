//! NES cartridge loading and mapper implementations.
//!
//! [`Rom`] stages an iNES image (header, optional trainer, PRG, CHR) from a
//! byte stream, and [`create_mapper`] turns it into the [`Mapper`] handle
//! the console installs. A mapper carries both address-space faces — the
//! CPU-side PRG window and the PPU-side CHR window — so one installation
//! swaps them atomically.
//!
//! Only mapper 0 (NROM) is implemented; everything else is refused with
//! [`RomError::UnsupportedMapper`] before any state changes hands.
//!
//! # Example
//!
//! ```no_run
//! use ferrones_mappers::{create_mapper, Mapper, Rom};
//!
//! let data = std::fs::read("game.nes").expect("read ROM");
//! let rom = Rom::load(&data).expect("parse ROM");
//! let mapper = create_mapper(rom).expect("unsupported cartridge");
//! let reset_lo = mapper.read_prg(0xFFFC);
//! ```

#![warn(missing_docs)]

pub mod mapper;
pub mod rom;

mod nrom;

pub use mapper::{Mapper, Mirroring};
pub use nrom::Nrom;
pub use rom::{Rom, RomError, RomHeader};

/// Build the mapper a staged cartridge asks for.
///
/// # Errors
///
/// `RomError::UnsupportedMapper` for any mapper number other than 0.
pub fn create_mapper(rom: Rom) -> Result<Box<dyn Mapper>, RomError> {
    match rom.header.mapper {
        0 => Ok(Box::new(Nrom::new(rom))),
        n => Err(RomError::UnsupportedMapper(n)),
    }
}

/// Mapper numbers this crate implements.
#[must_use]
pub fn supported_mappers() -> &'static [u16] {
    &[0]
}
