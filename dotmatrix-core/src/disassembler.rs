use crate::cpu::instructions;
use crate::memory::{AddressSpace, Cartridge, CartridgeLoadError};
use crate::ppu::PpuState;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisassembleError {
    #[error("error loading ROM: {source}")]
    CartridgeLoad {
        #[from]
        source: CartridgeLoadError,
    },
    #[error("error writing output: {source}")]
    Output {
        #[from]
        source: io::Error,
    },
}

/// Linearly decode the mapped 32KiB ROM window (banks 0 and 1), one line
/// per instruction. Bytes that do not decode to an instruction are emitted
/// as data bytes.
pub fn disassemble(rom: Vec<u8>, out: &mut dyn io::Write) -> Result<(), DisassembleError> {
    let rom_len = rom.len().min(0x8000) as u32;

    // Run the decoder over the cartridge mapping so banked ROMs still show
    // a coherent bank-0/bank-1 window
    let address_space = AddressSpace::new(Cartridge::new(rom, None)?, None);
    let ppu_state = PpuState::new();

    let mut pc: u32 = 0;
    while pc < rom_len {
        match instructions::parse_next_instruction(&address_space, pc as u16, &ppu_state, false) {
            Ok((instruction, next_pc)) => {
                writeln!(out, "{pc:04X} - {instruction}")?;
                pc = if u32::from(next_pc) > pc { next_pc.into() } else { rom_len };
            }
            Err(_) => {
                let byte = address_space.read_address_u8(pc as u16, &ppu_state);
                writeln!(out, "{pc:04X} - DB ${byte:02X}")?;
                pc += 1;
            }
        }
    }

    Ok(())
}
