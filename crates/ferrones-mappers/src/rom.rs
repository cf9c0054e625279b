//! iNES cartridge parsing.
//!
//! Classical iNES only: the 16-byte header, an optional 512-byte trainer,
//! then PRG and CHR. NES 2.0 and archaic (pre-standard) iNES dumps are
//! recognised and refused with a typed error so the host can report them.

use std::io::Read;

use bitflags::bitflags;

use crate::mapper::Mirroring;

/// Errors surfaced by the cartridge loader. On any error, nothing is
/// installed.
#[derive(Debug, thiserror::Error)]
pub enum RomError {
    /// The first four bytes are not `NES\x1A`.
    #[error("not an iNES image: bad magic {0:02X?}")]
    BadMagic([u8; 4]),

    /// The header is a recognisable variant this loader does not handle.
    #[error("unsupported ROM format: {0}")]
    UnsupportedFormat(&'static str),

    /// The mapper number is not implemented.
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),

    /// The underlying stream failed (including short reads).
    #[error("ROM read failed")]
    Io(#[from] std::io::Error),
}

bitflags! {
    /// Header byte 6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flags6: u8 {
        const VERTICAL = 0x01;
        const BATTERY = 0x02;
        const TRAINER = 0x04;
        const FOUR_SCREEN = 0x08;
    }
}

/// Parsed iNES header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomHeader {
    /// PRG-ROM size in bytes (multiple of 16 KiB).
    pub prg_rom_size: usize,
    /// CHR-ROM size in bytes (multiple of 8 KiB; 0 means CHR-RAM).
    pub chr_rom_size: usize,
    /// PRG-RAM size in bytes (header byte 8; 0 decodes to 8 KiB).
    pub prg_ram_size: usize,
    /// Mapper number assembled from flags 6/7.
    pub mapper: u16,
    /// Nametable mirroring.
    pub mirroring: Mirroring,
    /// Battery-backed PRG-RAM flag.
    pub has_battery: bool,
    /// 512-byte trainer precedes PRG.
    pub has_trainer: bool,
}

impl RomHeader {
    const MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];

    /// Parse the 16 header bytes.
    ///
    /// # Errors
    ///
    /// `BadMagic` when the signature is wrong; `UnsupportedFormat` for
    /// NES 2.0 (`flags7 & $0C == $08`) and for archaic iNES (anything that
    /// is neither NES 2.0 nor a classical header with bytes 12-15 zero).
    pub fn parse(header: &[u8; 16]) -> Result<Self, RomError> {
        let magic = [header[0], header[1], header[2], header[3]];
        if magic != Self::MAGIC {
            return Err(RomError::BadMagic(magic));
        }

        let flags6 = Flags6::from_bits_truncate(header[6]);
        let flags7 = header[7];

        match flags7 & 0x0C {
            0x08 => return Err(RomError::UnsupportedFormat("NES 2.0")),
            0x00 if header[12..16] == [0, 0, 0, 0] => {}
            _ => return Err(RomError::UnsupportedFormat("archaic iNES")),
        }

        let mapper = u16::from((flags7 & 0xF0) | (header[6] >> 4));

        let mirroring = if flags6.contains(Flags6::FOUR_SCREEN) {
            Mirroring::FourScreen
        } else if flags6.contains(Flags6::VERTICAL) {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        // Bytes 9-10 carry TV-system hints; ignored here.
        Ok(Self {
            prg_rom_size: usize::from(header[4]) * 16 * 1024,
            chr_rom_size: usize::from(header[5]) * 8 * 1024,
            prg_ram_size: if header[8] == 0 {
                8 * 1024
            } else {
                usize::from(header[8]) * 8 * 1024
            },
            mapper,
            mirroring,
            has_battery: flags6.contains(Flags6::BATTERY),
            has_trainer: flags6.contains(Flags6::TRAINER),
        })
    }
}

/// A fully staged cartridge image: header plus PRG/CHR payloads.
#[derive(Debug, Clone)]
pub struct Rom {
    /// Parsed header.
    pub header: RomHeader,
    /// Trainer payload, when byte 6 announced one.
    pub trainer: Option<Vec<u8>>,
    /// PRG-ROM backing (CPU-visible program).
    pub prg_rom: Vec<u8>,
    /// CHR-ROM backing (PPU-visible patterns); empty means CHR-RAM.
    pub chr_rom: Vec<u8>,
}

impl Rom {
    /// Read a cartridge from a byte stream.
    ///
    /// # Errors
    ///
    /// Header errors as [`RomHeader::parse`]; `Io` when the stream ends
    /// before the sizes announced in the header are satisfied.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self, RomError> {
        let mut header_bytes = [0u8; 16];
        reader.read_exact(&mut header_bytes)?;
        let header = RomHeader::parse(&header_bytes)?;

        let trainer = if header.has_trainer {
            let mut buf = vec![0u8; 512];
            reader.read_exact(&mut buf)?;
            Some(buf)
        } else {
            None
        };

        let mut prg_rom = vec![0u8; header.prg_rom_size];
        reader.read_exact(&mut prg_rom)?;

        let mut chr_rom = vec![0u8; header.chr_rom_size];
        reader.read_exact(&mut chr_rom)?;

        log::info!(
            "iNES image: mapper {}, PRG {} KiB, CHR {} KiB, PRG-RAM {} KiB{}",
            header.mapper,
            header.prg_rom_size / 1024,
            header.chr_rom_size / 1024,
            header.prg_ram_size / 1024,
            if header.has_trainer { ", trainer" } else { "" }
        );

        Ok(Self {
            header,
            trainer,
            prg_rom,
            chr_rom,
        })
    }

    /// Parse a cartridge already held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`Rom::from_reader`].
    pub fn load(mut data: &[u8]) -> Result<Self, RomError> {
        Self::from_reader(&mut data)
    }
}
