use crate::error::{ C8Error, C8Result };
use crate::utils::{ ADDR_MASK, FONT, FONT_START, MEM_SIZE, PROGRAM_START };

/// Flat 4K address space. The font lives at `FONT_START`, programs are
/// loaded at `PROGRAM_START`. Every access is truncated to 12 bits.
#[derive(Debug)]
pub struct Memory {
    pub data: [u8; MEM_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        let mut data = [0u8; MEM_SIZE];
        data[FONT_START..FONT_START + FONT.len()].copy_from_slice(&FONT);
        Self { data }
    }
}

impl Memory {
    pub fn from_rom(rom: &[u8]) -> C8Result<Self> {
        if PROGRAM_START + rom.len() > MEM_SIZE {
            Err(C8Error::RomTooLarge {
                size: rom.len(),
                max: MEM_SIZE - PROGRAM_START,
            })
        } else {
            let mut mem = Self::default();
            mem.data[PROGRAM_START..PROGRAM_START + rom.len()].copy_from_slice(rom);
            Ok(mem)
        }
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.data[(addr & ADDR_MASK) as usize]
    }

    pub fn get_mut(&mut self, addr: u16) -> &mut u8 {
        &mut self.data[(addr & ADDR_MASK) as usize]
    }

    /// Big-endian 16-bit word at `addr`; the second byte wraps past the top of memory.
    pub fn word(&self, addr: u16) -> u16 {
        ((self.get(addr) as u16) << 8) | (self.get(addr.wrapping_add(1)) as u16)
    }
}
