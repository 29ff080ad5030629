use crate::config::RunConfig;
use crate::cpu::CpuRegisters;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use crate::memory::{AddressSpace, Cartridge, CartridgeLoadError};
use crate::ppu::PpuState;
use crate::serial::SerialState;
use crate::timer::TimerState;
use serde::{Deserialize, Serialize};
use std::{fs, io};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("error loading cartridge from {file_path}: {source}")]
    CartridgeLoad {
        file_path: String,
        #[source]
        source: CartridgeLoadError,
    },
    #[error("error reading boot ROM from {file_path}: {source}")]
    BootRomRead {
        file_path: String,
        #[source]
        source: io::Error,
    },
    #[error("boot ROM should be 1-256 bytes, was {size} bytes")]
    InvalidBootRomSize { size: usize },
}

/// All serializable emulation state; one value of this type is a complete
/// console.
#[derive(Serialize, Deserialize)]
pub struct EmulationState {
    pub address_space: AddressSpace,
    pub cpu_registers: CpuRegisters,
    pub ppu_state: PpuState,
    pub timer_state: TimerState,
    pub serial_state: SerialState,
}

pub fn init_emulation_state(run_config: &RunConfig) -> Result<EmulationState, StartupError> {
    let boot_rom = match &run_config.boot_rom_path {
        Some(boot_rom_path) => {
            let boot_rom = fs::read(boot_rom_path).map_err(|err| StartupError::BootRomRead {
                file_path: boot_rom_path.clone(),
                source: err,
            })?;
            if boot_rom.is_empty() || boot_rom.len() > 256 {
                return Err(StartupError::InvalidBootRomSize { size: boot_rom.len() });
            }
            log::info!("Using {}-byte boot ROM from '{boot_rom_path}'", boot_rom.len());
            Some(boot_rom)
        }
        None => None,
    };

    let cartridge =
        Cartridge::from_file(&run_config.rom_file_path).map_err(|err| {
            StartupError::CartridgeLoad { file_path: run_config.rom_file_path.clone(), source: err }
        })?;

    let has_boot_rom = boot_rom.is_some();
    let mut address_space = AddressSpace::new(cartridge, boot_rom);

    let (cpu_registers, timer_state) = if has_boot_rom {
        (CpuRegisters::new_with_boot_rom(), TimerState::new())
    } else {
        synthesize_power_up_io(address_space.get_io_registers_mut());
        (CpuRegisters::new_post_boot(), TimerState::new_post_boot())
    };

    Ok(EmulationState {
        address_space,
        cpu_registers,
        ppu_state: PpuState::new(),
        timer_state,
        serial_state: SerialState::new(),
    })
}

/// With no boot ROM to run, write the I/O register values the DMG boot ROM
/// leaves behind so games see a post-boot console.
fn synthesize_power_up_io(io_registers: &mut IoRegisters) {
    const POWER_UP_VALUES: [(IoRegister, u8); 34] = [
        (IoRegister::JOYP, 0xCF),
        (IoRegister::SB, 0x00),
        (IoRegister::SC, 0x7E),
        (IoRegister::TIMA, 0x00),
        (IoRegister::TMA, 0x00),
        (IoRegister::TAC, 0xF8),
        (IoRegister::IF, 0x01),
        (IoRegister::NR10, 0x80),
        (IoRegister::NR11, 0xBF),
        (IoRegister::NR12, 0xF3),
        (IoRegister::NR13, 0xFF),
        (IoRegister::NR14, 0xBF),
        (IoRegister::NR21, 0x3F),
        (IoRegister::NR22, 0x00),
        (IoRegister::NR23, 0xFF),
        (IoRegister::NR24, 0xBF),
        (IoRegister::NR30, 0x7F),
        (IoRegister::NR31, 0xFF),
        (IoRegister::NR32, 0x9F),
        (IoRegister::NR33, 0xFF),
        (IoRegister::NR34, 0xBF),
        (IoRegister::NR41, 0xFF),
        (IoRegister::NR42, 0x00),
        (IoRegister::NR43, 0x00),
        (IoRegister::NR44, 0xBF),
        (IoRegister::NR50, 0x77),
        (IoRegister::NR51, 0xF3),
        (IoRegister::NR52, 0xF1),
        (IoRegister::LCDC, 0x91),
        (IoRegister::STAT, 0x85),
        (IoRegister::DMA, 0xFF),
        (IoRegister::BGP, 0xFC),
        (IoRegister::WY, 0x00),
        (IoRegister::BOOT, 0x01),
    ];

    for (register, value) in POWER_UP_VALUES {
        io_registers.write_register(register, value);
    }
}
