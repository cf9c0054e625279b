//! The mapper interface.
//!
//! A cartridge presents two faces to the console: the CPU side (PRG ROM/RAM
//! plus any banking registers) and the PPU side (CHR ROM/RAM). Both live on
//! one handle so that installing a cartridge swaps them atomically.

/// Nametable mirroring wired by the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mirroring {
    /// Horizontal mirroring.
    #[default]
    Horizontal,
    /// Vertical mirroring.
    Vertical,
    /// Four-screen VRAM on the cartridge.
    FourScreen,
}

/// Cartridge-side memory dispatch.
///
/// The CPU bus routes every access at `$4020` and above to `read_prg` /
/// `write_prg`; a future PPU routes pattern-table accesses (`$0000-$1FFF`)
/// to `read_chr`/`write_chr`. Both must be total over their address space.
pub trait Mapper: Send + Sync {
    /// Read from the CPU side.
    fn read_prg(&self, addr: u16) -> u8;

    /// Write to the CPU side.
    fn write_prg(&mut self, addr: u16, val: u8);

    /// Read from the PPU side (`$0000-$1FFF`).
    fn read_chr(&self, addr: u16) -> u8;

    /// Write to the PPU side. Only effective for CHR-RAM carts.
    fn write_chr(&mut self, addr: u16, val: u8);

    /// Nametable mirroring this cartridge selects.
    fn mirroring(&self) -> Mirroring;

    /// iNES mapper number.
    fn mapper_number(&self) -> u16;

    /// Human-readable mapper name.
    fn mapper_name(&self) -> &'static str;
}
