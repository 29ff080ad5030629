pub(crate) mod address;
pub mod ioregisters;
mod mapper;

use crate::memory::ioregisters::IoRegisters;
use crate::memory::mapper::{Mapper, RamMapResult};
use crate::ppu::{PpuMode, PpuState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CartridgeLoadError {
    #[error("ROM should be at least 0x0150 bytes, was {rom_len} bytes")]
    HeaderTooShort { rom_len: usize },
    #[error("ROM size not in 32KiB..=8MiB: {rom_len} bytes")]
    UnsupportedRomSize { rom_len: usize },
    #[error("invalid or unsupported cartridge type byte in header: {mapper_byte:02X}")]
    InvalidMapper { mapper_byte: u8 },
    #[error("invalid ROM size code in header, expected 0-8: {rom_size_code}")]
    InvalidRomSize { rom_size_code: u8 },
    #[error("invalid RAM size code in header, expected 0 or 2-5: {ram_size_code}")]
    InvalidRamSize { ram_size_code: u8 },
    #[error("error reading data from {file_path}: {source}")]
    FileReadError {
        file_path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FsRamBattery {
    dirty: bool,
    sav_path: PathBuf,
}

impl FsRamBattery {
    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn persist_ram(&mut self, ram: &[u8]) -> Result<(), io::Error> {
        if !self.dirty {
            return Ok(());
        }

        let tmp_file = self.sav_path.with_extension("sav.tmp");
        fs::write(&tmp_file, ram)?;
        fs::rename(&tmp_file, &self.sav_path)?;

        self.dirty = false;

        log::debug!("flushed external RAM to {}", self.sav_path.display());

        Ok(())
    }
}

fn load_sav_file<P: AsRef<Path>>(sav_file: P) -> Result<Option<Vec<u8>>, CartridgeLoadError> {
    let sav_file = sav_file.as_ref();
    if !fs::metadata(sav_file).map(|metadata| metadata.is_file()).unwrap_or(false) {
        return Ok(None);
    }

    let ram = fs::read(sav_file).map_err(|err| CartridgeLoadError::FileReadError {
        file_path: sav_file.display().to_string(),
        source: err,
    })?;

    log::info!("Loaded external RAM from {}", sav_file.display());

    Ok(Some(ram))
}

fn load_rtc<P: AsRef<Path>>(rtc_file: P) -> Result<mapper::RealTimeClock, String> {
    let rtc_bytes = fs::read(rtc_file.as_ref())
        .map_err(|err| format!("error reading RTC file {}: {err}", rtc_file.as_ref().display()))?;

    let clock = bincode::deserialize(&rtc_bytes).map_err(|err| {
        format!("error deserializing RTC bytes from {}: {err}", rtc_file.as_ref().display())
    })?;

    log::info!("Loaded real-time clock state from {}", rtc_file.as_ref().display());

    Ok(clock)
}

#[derive(Serialize, Deserialize)]
pub struct Cartridge {
    #[serde(skip)]
    rom: Vec<u8>,
    mapper: Mapper,
    ram: Vec<u8>,
    ram_battery: Option<FsRamBattery>,
}

impl Cartridge {
    /// Create a new Cartridge from a ROM image.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM is shorter than the 0x0150-byte header,
    /// falls outside 32KiB..=8MiB, or carries an invalid cartridge
    /// type / ROM size / RAM size byte.
    pub fn new(rom: Vec<u8>, sav_path: Option<PathBuf>) -> Result<Self, CartridgeLoadError> {
        log::info!("Initializing cartridge using {} bytes of data", rom.len());

        if rom.len() < 0x0150 {
            return Err(CartridgeLoadError::HeaderTooShort { rom_len: rom.len() });
        }

        if rom.len() > 8 * 1024 * 1024 {
            return Err(CartridgeLoadError::UnsupportedRomSize { rom_len: rom.len() });
        }

        let mapper_byte = rom[address::MAPPER as usize];
        let Some((mapper_type, mapper_features)) = mapper::parse_byte(mapper_byte) else {
            return Err(CartridgeLoadError::InvalidMapper { mapper_byte });
        };

        log::info!("Detected mapper type {mapper_type:?} (byte: {mapper_byte:02X})");
        log::info!("Mapper features: {mapper_features}");

        let rom_size_code = rom[address::ROM_SIZE as usize];
        if rom_size_code > 0x08 {
            return Err(CartridgeLoadError::InvalidRomSize { rom_size_code });
        }
        let declared_rom_len = (32 * 1024) << rom_size_code;
        if declared_rom_len != rom.len() {
            log::warn!(
                "ROM size code {rom_size_code:02X} declares {declared_rom_len} bytes but image is {} bytes",
                rom.len()
            );
        }

        let loaded_ram = match &sav_path {
            Some(sav_path) => load_sav_file(sav_path)?,
            None => None,
        };

        let clock = match (mapper_features.has_rtc, &sav_path) {
            (true, Some(sav_path)) => match load_rtc(sav_path.with_extension("rtc")) {
                Ok(clock) => Some(clock),
                Err(err) => {
                    log::warn!("unable to load previous RTC state, resetting: {err}");
                    None
                }
            },
            _ => None,
        };

        let ram = match (mapper_features.has_ram, mapper_features.has_battery, loaded_ram) {
            (true, true, Some(ram)) => ram,
            (true, ..) => {
                let ram_size_code = rom[address::RAM_SIZE as usize];
                let ram_size: usize = match ram_size_code {
                    0x00 => {
                        // MBC2 RAM is built into the controller and not declared
                        if mapper_type == mapper::MapperType::Mbc2 { 512 } else { 0 }
                    }
                    0x02 => 8 * 1024,
                    0x03 => 32 * 1024,
                    0x04 => 128 * 1024,
                    0x05 => 64 * 1024,
                    _ => return Err(CartridgeLoadError::InvalidRamSize { ram_size_code }),
                };
                vec![0; ram_size]
            }
            _ => Vec::new(),
        };

        let ram_battery = match (mapper_features.has_battery, sav_path) {
            (true, Some(sav_path)) => {
                log::info!("Persisting external RAM to {}", sav_path.display());
                Some(FsRamBattery { dirty: false, sav_path })
            }
            _ => None,
        };

        let mapper =
            Mapper::new(mapper_type, mapper_features, clock, rom.len() as u32, ram.len() as u32);

        log::info!("Cartridge has {} bytes of external RAM", ram.len());
        log::info!("Cartridge has battery: {}", mapper_features.has_battery);

        Ok(Self { rom, mapper, ram, ram_battery })
    }

    pub fn from_file(file_path: &str) -> Result<Self, CartridgeLoadError> {
        log::info!("Loading cartridge from '{file_path}'");

        let rom = fs::read(Path::new(file_path)).map_err(|err| {
            CartridgeLoadError::FileReadError { file_path: file_path.into(), source: err }
        })?;

        let sav_path = Path::new(file_path).with_extension("sav");

        Self::new(rom, Some(sav_path))
    }

    /// Read a value from the given ROM address through the current bank
    /// mapping.
    pub fn read_rom_address(&self, address: u16) -> u8 {
        let mapped_address = self.mapper.map_rom_address(address);
        self.rom.get(mapped_address as usize).copied().unwrap_or(0xFF)
    }

    /// Write to the ROM address range, which configures controller
    /// registers rather than modifying the ROM.
    pub fn write_rom_address(&mut self, address: u16, value: u8) {
        self.mapper.write_rom_address(address, value);
    }

    /// Read external RAM. Returns 0xFF if RAM is disabled or unmapped.
    pub fn read_ram_address(&self, address: u16) -> u8 {
        match self.mapper.map_ram_address(address) {
            RamMapResult::Address(mapped_address) => {
                let byte = self.ram.get(mapped_address as usize).copied().unwrap_or(0xFF);
                if matches!(self.mapper, Mapper::Mbc2 { .. }) {
                    // MBC2 cells are 4 bits wide
                    byte | 0xF0
                } else {
                    byte
                }
            }
            RamMapResult::RtcRegister => self.mapper.read_rtc_register().unwrap_or(0xFF),
            RamMapResult::Unmapped => 0xFF,
        }
    }

    /// Write external RAM. Ignored if RAM is disabled or unmapped.
    pub fn write_ram_address(&mut self, address: u16, value: u8) {
        match self.mapper.map_ram_address(address) {
            RamMapResult::Address(mapped_address) => {
                if let Some(ram_value) = self.ram.get_mut(mapped_address as usize) {
                    *ram_value = value;
                    if let Some(ram_battery) = &mut self.ram_battery {
                        ram_battery.mark_dirty();
                    }
                }
            }
            RamMapResult::RtcRegister => {
                self.mapper.write_rtc_register(value);
            }
            RamMapResult::Unmapped => {}
        }
    }

    /// Write external RAM out to the .sav file if it is battery-backed and
    /// has been modified since the last flush.
    pub fn persist_external_ram(&mut self) -> Result<(), io::Error> {
        match &mut self.ram_battery {
            Some(ram_battery) => ram_battery.persist_ram(&self.ram),
            None => Ok(()),
        }
    }

    /// Save the real-time clock state alongside the .sav file, if this
    /// cartridge has a clock.
    pub fn persist_rtc(&self) -> Result<(), io::Error> {
        if let (Some(clock), Some(battery)) = (self.mapper.get_clock(), self.ram_battery.as_ref())
        {
            let rtc_bytes = bincode::serialize(clock)
                .expect("RTC value-to-bytes serialization should never fail");
            fs::write(battery.sav_path.with_extension("rtc"), rtc_bytes)?;
        }

        Ok(())
    }

    pub fn update_rtc(&mut self) {
        self.mapper.update_rtc();
    }
}

#[derive(Serialize, Deserialize)]
pub struct AddressSpace {
    cartridge: Cartridge,
    #[serde(
        serialize_with = "crate::serialize::serialize_array",
        deserialize_with = "crate::serialize::deserialize_array"
    )]
    vram: [u8; 8192],
    #[serde(
        serialize_with = "crate::serialize::serialize_array",
        deserialize_with = "crate::serialize::deserialize_array"
    )]
    working_ram: [u8; 8192],
    #[serde(
        serialize_with = "crate::serialize::serialize_array",
        deserialize_with = "crate::serialize::deserialize_array"
    )]
    oam: [u8; 160],
    io_registers: IoRegisters,
    #[serde(
        serialize_with = "crate::serialize::serialize_array",
        deserialize_with = "crate::serialize::deserialize_array"
    )]
    hram: [u8; 127],
    ie_register: u8,
    #[serde(skip)]
    boot_rom: Option<Vec<u8>>,
    boot_rom_enabled: bool,
}

impl AddressSpace {
    pub fn new(cartridge: Cartridge, boot_rom: Option<Vec<u8>>) -> Self {
        let boot_rom_enabled = boot_rom.is_some();
        Self {
            cartridge,
            vram: [0; 8192],
            working_ram: [0; 8192],
            oam: [0; 160],
            io_registers: IoRegisters::new(),
            hram: [0; 127],
            ie_register: 0,
            boot_rom,
            boot_rom_enabled,
        }
    }

    fn is_cpu_access_allowed(address: u16, ppu_state: &PpuState) -> bool {
        // While an OAM DMA transfer is active the CPU can only reach HRAM
        if ppu_state.oam_dma_status().is_some()
            && !(address::HRAM_START..=address::HRAM_END).contains(&address)
        {
            return false;
        }

        // OAM is blocked while the PPU is scanning OAM or drawing
        if ppu_state.enabled()
            && matches!(ppu_state.mode(), PpuMode::ScanningOam | PpuMode::Rendering)
            && (address::OAM_START..=address::OAM_END).contains(&address)
        {
            return false;
        }

        // VRAM is blocked while the PPU is drawing
        !(ppu_state.enabled()
            && ppu_state.mode() == PpuMode::Rendering
            && (address::VRAM_START..=address::VRAM_END).contains(&address))
    }

    /// Read the value at the given address from the perspective of the CPU.
    /// Returns 0xFF if the address is inaccessible due to PPU state.
    pub fn read_address_u8(&self, address: u16, ppu_state: &PpuState) -> u8 {
        if !Self::is_cpu_access_allowed(address, ppu_state) {
            return 0xFF;
        }

        self.read_address_u8_no_access_check(address)
    }

    fn read_address_u8_no_access_check(&self, address: u16) -> u8 {
        match address {
            address::ROM_START..=address::ROM_END => {
                if address <= address::BOOT_ROM_END && self.boot_rom_enabled {
                    if let Some(boot_rom) = &self.boot_rom {
                        if let Some(&byte) = boot_rom.get(address as usize) {
                            return byte;
                        }
                    }
                }
                self.cartridge.read_rom_address(address)
            }
            address::VRAM_START..=address::VRAM_END => {
                self.vram[(address - address::VRAM_START) as usize]
            }
            address::EXTERNAL_RAM_START..=address::EXTERNAL_RAM_END => {
                self.cartridge.read_ram_address(address)
            }
            address::WORKING_RAM_START..=address::WORKING_RAM_END => {
                self.working_ram[(address - address::WORKING_RAM_START) as usize]
            }
            address::ECHO_RAM_START..=address::ECHO_RAM_END => {
                self.working_ram[(address - address::ECHO_RAM_START) as usize]
            }
            address::OAM_START..=address::OAM_END => {
                self.oam[(address - address::OAM_START) as usize]
            }
            address::UNUSABLE_START..=address::UNUSABLE_END => 0xFF,
            address::IO_REGISTERS_START..=address::IO_REGISTERS_END => {
                self.io_registers.read_address(address)
            }
            address::HRAM_START..=address::HRAM_END => {
                self.hram[(address - address::HRAM_START) as usize]
            }
            address::IE_REGISTER => self.ie_register & 0x1F,
        }
    }

    /// Read the value at the given address and the following address as a
    /// little-endian 16-bit value.
    pub fn read_address_u16(&self, address: u16, ppu_state: &PpuState) -> u16 {
        let lsb = self.read_address_u8(address, ppu_state);
        let msb = self.read_address_u8(address.wrapping_add(1), ppu_state);
        u16::from_le_bytes([lsb, msb])
    }

    /// Assign a value to the given address from the perspective of the CPU.
    /// The write is dropped if the address is inaccessible due to PPU state.
    pub fn write_address_u8(&mut self, address: u16, value: u8, ppu_state: &PpuState) {
        if !Self::is_cpu_access_allowed(address, ppu_state) {
            return;
        }

        self.write_address_u8_no_access_check(address, value);
    }

    fn write_address_u8_no_access_check(&mut self, address: u16, value: u8) {
        match address {
            address::ROM_START..=address::ROM_END => {
                self.cartridge.write_rom_address(address, value);
            }
            address::VRAM_START..=address::VRAM_END => {
                self.vram[(address - address::VRAM_START) as usize] = value;
            }
            address::EXTERNAL_RAM_START..=address::EXTERNAL_RAM_END => {
                self.cartridge.write_ram_address(address, value);
            }
            address::WORKING_RAM_START..=address::WORKING_RAM_END => {
                self.working_ram[(address - address::WORKING_RAM_START) as usize] = value;
            }
            address::ECHO_RAM_START..=address::ECHO_RAM_END => {
                self.working_ram[(address - address::ECHO_RAM_START) as usize] = value;
            }
            address::OAM_START..=address::OAM_END => {
                self.oam[(address - address::OAM_START) as usize] = value;
            }
            address::UNUSABLE_START..=address::UNUSABLE_END => {}
            address::IO_REGISTERS_START..=address::IO_REGISTERS_END => {
                if address == 0xFF50 && self.boot_rom_enabled {
                    log::debug!("boot ROM overlay disabled");
                    self.boot_rom_enabled = false;
                }
                self.io_registers.write_address(address, value);
            }
            address::HRAM_START..=address::HRAM_END => {
                self.hram[(address - address::HRAM_START) as usize] = value;
            }
            address::IE_REGISTER => {
                self.ie_register = value;
            }
        }
    }

    /// Assign a 16-bit value to the given address and the following address,
    /// using little-endian.
    pub fn write_address_u16(&mut self, address: u16, value: u16, ppu_state: &PpuState) {
        let [lsb, msb] = value.to_le_bytes();
        self.write_address_u8(address, lsb, ppu_state);
        self.write_address_u8(address.wrapping_add(1), msb, ppu_state);
    }

    /// Read an OAM or VRAM byte from the perspective of the PPU, bypassing
    /// the CPU access check.
    ///
    /// # Panics
    ///
    /// Panics if the address is not an OAM or VRAM address.
    pub fn ppu_read_address_u8(&self, address: u16) -> u8 {
        match address {
            address::VRAM_START..=address::VRAM_END => {
                self.vram[(address - address::VRAM_START) as usize]
            }
            address::OAM_START..=address::OAM_END => {
                self.oam[(address - address::OAM_START) as usize]
            }
            _ => panic!("PPU read method is only allowed to read OAM and VRAM: {address:04X}"),
        }
    }

    /// Copy a byte from the given source address into OAM, bypassing access
    /// checks. Used by the OAM DMA engine.
    pub fn oam_dma_copy_byte(&mut self, src_address: u16, dst_address: u16) {
        let byte = self.read_address_u8_no_access_check(src_address);
        self.write_address_u8_no_access_check(dst_address, byte);
    }

    pub fn get_io_registers(&self) -> &IoRegisters {
        &self.io_registers
    }

    pub fn get_io_registers_mut(&mut self) -> &mut IoRegisters {
        &mut self.io_registers
    }

    /// The current value of the IE register (interrupts enabled).
    pub fn get_ie_register(&self) -> u8 {
        self.ie_register & 0x1F
    }

    pub fn persist_cartridge_ram(&mut self) -> Result<(), io::Error> {
        self.cartridge.persist_external_ram()
    }

    pub fn persist_rtc(&self) -> Result<(), io::Error> {
        self.cartridge.persist_rtc()
    }

    pub fn update_rtc(&mut self) {
        self.cartridge.update_rtc();
    }

    /// Re-attach the fields that are skipped during serialization (the ROM
    /// image and boot ROM buffer) after loading a save state.
    pub fn move_unserializable_fields_from(&mut self, other: Self) {
        self.cartridge.rom = other.cartridge.rom;
        self.boot_rom = other.boot_rom;
    }
}
