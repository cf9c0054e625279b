//! The CPU-side address-bus decoder.
//!
//! Routes every 16-bit address to internal RAM, the PPU register shim, the
//! APU/IO shim, or the installed cartridge mapper. Total over the address
//! space and never failing: unmapped reads return 0, unmapped writes are
//! dropped.

use ferrones_cpu::Bus;
use ferrones_mappers::Mapper;

/// Mirror a PPU register address into `$2000-$2007`.
///
/// The eight PPU registers repeat every 8 bytes through `$3FFF`.
#[must_use]
pub const fn ppu_register_addr(addr: u16) -> u16 {
    addr & 0x2007
}

/// CPU memory map: 2 KiB internal RAM plus shims and the mapper.
pub struct CpuBus {
    ram: [u8; 2048],
    mapper: Option<Box<dyn Mapper>>,
}

impl Default for CpuBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBus {
    /// A bus with zeroed RAM and no cartridge.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: [0; 2048],
            mapper: None,
        }
    }

    /// Install a cartridge. The swap is atomic: both the CPU-side and
    /// PPU-side faces of the handle change together.
    pub fn install_mapper(&mut self, mapper: Box<dyn Mapper>) {
        self.mapper = Some(mapper);
    }

    /// Remove the cartridge, returning the handle if one was installed.
    pub fn remove_mapper(&mut self) -> Option<Box<dyn Mapper>> {
        self.mapper.take()
    }

    /// The installed mapper, if any.
    #[must_use]
    pub fn mapper(&self) -> Option<&dyn Mapper> {
        self.mapper.as_deref()
    }

    /// Zero internal RAM.
    pub fn clear_ram(&mut self) {
        self.ram = [0; 2048];
    }

    /// Read without side effects, for diagnostics and tests. Shim regions
    /// report 0, exactly as a live read would.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x401F => 0,
            0x4020..=0xFFFF => self.mapper.as_ref().map_or(0, |m| m.read_prg(addr)),
        }
    }

    /// PPU register shim. Reads report 0 and writes are dropped until a
    /// PPU is plugged in here; `reg` is already mirrored into
    /// `$2000-$2007`.
    fn ppu_read(&self, reg: u16) -> u8 {
        let _ = reg;
        0
    }

    fn ppu_write(&mut self, reg: u16, val: u8) {
        let _ = (reg, val);
    }

    /// APU/IO shim ($4000-$4017). Reads report 0, writes are dropped.
    fn apu_read(&self, addr: u16) -> u8 {
        let _ = addr;
        0
    }

    fn apu_write(&mut self, addr: u16, val: u8) {
        let _ = (addr, val);
    }
}

impl Bus for CpuBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            // Internal RAM, mirrored every 2 KiB.
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            // PPU registers, mirrored every 8 bytes.
            0x2000..=0x3FFF => self.ppu_read(ppu_register_addr(addr)),

            // APU and IO registers.
            0x4000..=0x4017 => self.apu_read(addr),

            // CPU test-mode region, normally disabled.
            0x4018..=0x401F => 0,

            // Cartridge space.
            0x4020..=0xFFFF => self.mapper.as_ref().map_or(0, |m| m.read_prg(addr)),
        };
        log::trace!("read  [{addr:04X}] {value:02X}");
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        log::trace!("write [{addr:04X}] {value:02X}");
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => self.ppu_write(ppu_register_addr(addr), value),
            0x4000..=0x4017 => self.apu_write(addr, value),
            0x4018..=0x401F => {}
            0x4020..=0xFFFF => {
                if let Some(mapper) = self.mapper.as_mut() {
                    mapper.write_prg(addr, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrones_mappers::{create_mapper, Rom};

    fn nrom_bus() -> CpuBus {
        let mut data = vec![b'N', b'E', b'S', 0x1A, 1, 1, 0, 0];
        data.extend_from_slice(&[0; 8]);
        let mut prg = vec![0u8; 16384];
        prg[0] = 0x42;
        data.extend_from_slice(&prg);
        data.extend_from_slice(&[0; 8192]);

        let mut bus = CpuBus::new();
        bus.install_mapper(create_mapper(Rom::load(&data).unwrap()).unwrap());
        bus
    }

    #[test]
    fn ram_mirrors_through_1fff() {
        let mut bus = CpuBus::new();
        bus.write(0x0000, 0x42);
        assert_eq!(bus.read(0x0800), 0x42);
        assert_eq!(bus.read(0x1000), 0x42);
        assert_eq!(bus.read(0x1800), 0x42);

        bus.write(0x1ABC, 0x55);
        assert_eq!(bus.read(0x0ABC & 0x07FF), 0x55);

        for addr in (0x0000u16..0x2000).step_by(0x101) {
            assert_eq!(bus.peek(addr), bus.peek(addr & 0x07FF));
        }
    }

    #[test]
    fn ppu_register_mirroring_mask() {
        for addr in 0x2000u16..0x4000 {
            let reg = ppu_register_addr(addr);
            assert_eq!(reg, 0x2000 | (addr & 0x0007));
        }
    }

    #[test]
    fn shim_regions_read_zero_and_drop_writes() {
        let mut bus = CpuBus::new();
        for addr in [0x2000, 0x2002, 0x3FFF, 0x4000, 0x4015, 0x4017, 0x4018, 0x401F] {
            bus.write(addr, 0xFF);
            assert_eq!(bus.read(addr), 0, "addr {addr:04X}");
        }
    }

    #[test]
    fn unmapped_cartridge_space_without_mapper() {
        let mut bus = CpuBus::new();
        bus.write(0x8000, 0xFF);
        assert_eq!(bus.read(0x8000), 0);
        assert_eq!(bus.read(0xFFFC), 0);
    }

    #[test]
    fn mapper_dispatch_above_4020() {
        let mut bus = nrom_bus();
        assert_eq!(bus.read(0x8000), 0x42);
        // NROM-128 mirror.
        assert_eq!(bus.read(0xC000), 0x42);
        // PRG-RAM window through the mapper.
        bus.write(0x6000, 0x77);
        assert_eq!(bus.read(0x6000), 0x77);
    }

    #[test]
    fn remove_mapper_restores_open_space() {
        let mut bus = nrom_bus();
        assert_eq!(bus.read(0x8000), 0x42);
        let mapper = bus.remove_mapper();
        assert!(mapper.is_some());
        assert_eq!(bus.read(0x8000), 0);
    }

    #[test]
    fn peek_matches_read_without_side_effects() {
        let mut bus = nrom_bus();
        bus.write(0x0123, 0x99);
        assert_eq!(bus.peek(0x0123), 0x99);
        assert_eq!(bus.peek(0x0923), 0x99);
        assert_eq!(bus.peek(0x8000), 0x42);
        assert_eq!(bus.peek(0x2002), 0);
    }
}
