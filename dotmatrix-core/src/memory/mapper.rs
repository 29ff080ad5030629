mod rtc;

use crate::memory::address;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Formatter};
use std::time::SystemTime;

pub(crate) use rtc::RealTimeClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapperType {
    None,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MapperFeatures {
    pub(crate) has_ram: bool,
    pub(crate) has_battery: bool,
    pub(crate) has_rtc: bool,
}

impl fmt::Display for MapperFeatures {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "has_ram={}, has_battery={}, has_rtc={}",
            self.has_ram, self.has_battery, self.has_rtc
        )
    }
}

pub(crate) fn parse_byte(mapper_byte: u8) -> Option<(MapperType, MapperFeatures)> {
    let (mapper_type, has_ram, has_battery) = match mapper_byte {
        0x00 => (MapperType::None, false, false),
        0x01 => (MapperType::Mbc1, false, false),
        0x02 => (MapperType::Mbc1, true, false),
        0x03 => (MapperType::Mbc1, true, true),
        0x05 => (MapperType::Mbc2, true, false),
        0x06 => (MapperType::Mbc2, true, true),
        0x0F => (MapperType::Mbc3, false, true),
        // 0x10 is w/ RTC, 0x13 is w/o RTC
        0x10 | 0x13 => (MapperType::Mbc3, true, true),
        0x11 => (MapperType::Mbc3, false, false),
        0x12 => (MapperType::Mbc3, true, false),
        // 0x19/0x1A/0x1B are w/o rumble, 0x1C/0x1D/0x1E are w/ rumble
        0x19 | 0x1C => (MapperType::Mbc5, false, false),
        0x1A | 0x1D => (MapperType::Mbc5, true, false),
        0x1B | 0x1E => (MapperType::Mbc5, true, true),
        _ => return None,
    };

    let has_rtc = mapper_byte == 0x0F || mapper_byte == 0x10;

    Some((mapper_type, MapperFeatures { has_ram, has_battery, has_rtc }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RamMapResult {
    // Relative address into the full external RAM array
    Address(u32),
    // The address window is mapped to an MBC3 clock register
    RtcRegister,
    // RAM is disabled or the bank number is out of range
    Unmapped,
}

fn ram_enabled(ram_enable: u8) -> bool {
    ram_enable & 0x0F == 0x0A
}

const ROM_BANK_SHIFT: u32 = 14;
const RAM_BANK_SHIFT: u32 = 13;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Mapper {
    None,
    Mbc1 {
        rom_bank_mask: u8,
        ram_bank_mask: u8,
        ram_enable: u8,
        rom_bank: u8,
        ram_bank: u8,
        banking_mode: u8,
    },
    Mbc2 {
        rom_bank_mask: u8,
        ram_enable: u8,
        rom_bank: u8,
    },
    Mbc3 {
        rom_bank_mask: u8,
        ram_enable: u8,
        rom_bank: u8,
        ram_bank: u8,
        clock: Option<RealTimeClock>,
    },
    Mbc5 {
        rom_bank_mask: u16,
        ram_bank_mask: u8,
        ram_enable: u8,
        rom_bank: u16,
        ram_bank: u8,
    },
}

impl Mapper {
    pub(crate) fn new(
        mapper_type: MapperType,
        features: MapperFeatures,
        clock: Option<RealTimeClock>,
        rom_size: u32,
        ram_size: u32,
    ) -> Self {
        let rom_bank_mask =
            if rom_size >= 1 << ROM_BANK_SHIFT { ((rom_size >> ROM_BANK_SHIFT) - 1) as u16 } else { 0 };
        let ram_bank_mask =
            if ram_size >= 1 << RAM_BANK_SHIFT { ((ram_size >> RAM_BANK_SHIFT) - 1) as u8 } else { 0 };

        log::debug!("ROM bank mask {rom_bank_mask:02X} for size {rom_size}");
        log::debug!("RAM bank mask {ram_bank_mask:02X} for size {ram_size}");

        match mapper_type {
            MapperType::None => Self::None,
            MapperType::Mbc1 => Self::Mbc1 {
                rom_bank_mask: rom_bank_mask as u8,
                ram_bank_mask,
                ram_enable: 0x00,
                rom_bank: 0x00,
                ram_bank: 0x00,
                banking_mode: 0x00,
            },
            MapperType::Mbc2 => {
                Self::Mbc2 { rom_bank_mask: rom_bank_mask as u8, ram_enable: 0x00, rom_bank: 0x00 }
            }
            MapperType::Mbc3 => {
                let clock = features.has_rtc.then(|| match clock {
                    Some(mut clock) => {
                        clock.update(SystemTime::now());
                        clock
                    }
                    None => RealTimeClock::new(SystemTime::now()),
                });
                Self::Mbc3 {
                    rom_bank_mask: rom_bank_mask as u8,
                    ram_enable: 0x00,
                    rom_bank: 0x00,
                    ram_bank: 0x00,
                    clock,
                }
            }
            MapperType::Mbc5 => Self::Mbc5 {
                rom_bank_mask,
                ram_bank_mask,
                ram_enable: 0x00,
                rom_bank: 0x01,
                ram_bank: 0x00,
            },
        }
    }

    /// Translate a CPU address in 0x0000-0x7FFF into an offset into the full
    /// ROM image, honoring the currently selected bank.
    pub(crate) fn map_rom_address(&self, address: u16) -> u32 {
        debug_assert!(address <= address::ROM_END);

        match self {
            Self::None => u32::from(address),
            &Self::Mbc1 { rom_bank_mask, rom_bank, ram_bank, banking_mode, .. } => {
                let rom_bank = if rom_bank == 0x00 { 0x01 } else { rom_bank };

                match address {
                    0x0000..=0x3FFF => {
                        if banking_mode == 0x00 {
                            u32::from(address)
                        } else {
                            // In mode 1 the upper bank bits also affect the fixed region
                            let bank = (ram_bank << 5) & rom_bank_mask;
                            u32::from(address) + (u32::from(bank) << ROM_BANK_SHIFT)
                        }
                    }
                    _ => {
                        let bank = if banking_mode == 0x00 {
                            rom_bank & rom_bank_mask
                        } else {
                            (rom_bank | (ram_bank << 5)) & rom_bank_mask
                        };
                        u32::from(address - 0x4000) + (u32::from(bank) << ROM_BANK_SHIFT)
                    }
                }
            }
            &Self::Mbc2 { rom_bank_mask, rom_bank, .. }
            | &Self::Mbc3 { rom_bank_mask, rom_bank, .. } => {
                let rom_bank = if rom_bank == 0x00 { 0x01 } else { rom_bank };

                match address {
                    0x0000..=0x3FFF => u32::from(address),
                    _ => {
                        let bank = rom_bank & rom_bank_mask;
                        u32::from(address - 0x4000) + (u32::from(bank) << ROM_BANK_SHIFT)
                    }
                }
            }
            &Self::Mbc5 { rom_bank_mask, rom_bank, .. } => {
                // Unlike the other controllers, MBC5 can genuinely map bank 0
                // into the switchable region
                match address {
                    0x0000..=0x3FFF => u32::from(address),
                    _ => {
                        let bank = rom_bank & rom_bank_mask;
                        u32::from(address - 0x4000) + (u32::from(bank) << ROM_BANK_SHIFT)
                    }
                }
            }
        }
    }

    /// ROM writes configure controller registers; the ROM itself is never
    /// modified.
    pub(crate) fn write_rom_address(&mut self, address: u16, value: u8) {
        debug_assert!(address <= address::ROM_END);

        match self {
            Self::None => {}
            Self::Mbc1 { ram_enable, rom_bank, ram_bank, banking_mode, .. } => match address {
                0x0000..=0x1FFF => {
                    log::trace!("MBC1 ram_enable changed to {value:02X}");
                    *ram_enable = value;
                }
                0x2000..=0x3FFF => {
                    log::trace!("MBC1 rom_bank changed to {value:02X}");
                    *rom_bank = value & 0x1F;
                }
                0x4000..=0x5FFF => {
                    log::trace!("MBC1 ram_bank changed to {value:02X}");
                    *ram_bank = value & 0x03;
                }
                _ => {
                    log::trace!("MBC1 banking_mode changed to {value:02X}");
                    *banking_mode = value & 0x01;
                }
            },
            Self::Mbc2 { ram_enable, rom_bank, .. } => {
                if address <= 0x3FFF {
                    // Address bit 8 selects between the two registers
                    if address & 0x0100 != 0 {
                        *rom_bank = value & 0x0F;
                    } else {
                        *ram_enable = value;
                    }
                }
            }
            Self::Mbc3 { ram_enable, rom_bank, ram_bank, clock, .. } => match address {
                0x0000..=0x1FFF => {
                    *ram_enable = value;
                }
                0x2000..=0x3FFF => {
                    *rom_bank = value & 0x7F;
                }
                0x4000..=0x5FFF => {
                    *ram_bank = value;
                }
                _ => {
                    if let Some(clock) = clock {
                        clock.process_latch_write(value);
                    }
                }
            },
            Self::Mbc5 { ram_enable, rom_bank, ram_bank, .. } => match address {
                0x0000..=0x1FFF => {
                    *ram_enable = value;
                }
                0x2000..=0x2FFF => {
                    *rom_bank = (*rom_bank & 0x0100) | u16::from(value);
                }
                0x3000..=0x3FFF => {
                    *rom_bank = (u16::from(value & 0x01) << 8) | (*rom_bank & 0x00FF);
                }
                0x4000..=0x5FFF => {
                    *ram_bank = value & 0x0F;
                }
                _ => {}
            },
        }
    }

    /// Translate a CPU address in 0xA000-0xBFFF into external RAM, an RTC
    /// register, or nothing.
    pub(crate) fn map_ram_address(&self, address: u16) -> RamMapResult {
        let relative_address = address - address::EXTERNAL_RAM_START;

        match self {
            Self::None => RamMapResult::Address(u32::from(relative_address)),
            &Self::Mbc1 { ram_bank_mask, ram_enable, ram_bank, banking_mode, .. } => {
                if !ram_enabled(ram_enable) {
                    return RamMapResult::Unmapped;
                }

                if banking_mode == 0x00 {
                    RamMapResult::Address(u32::from(relative_address))
                } else {
                    let bank = ram_bank & ram_bank_mask;
                    RamMapResult::Address(
                        u32::from(relative_address) + (u32::from(bank) << RAM_BANK_SHIFT),
                    )
                }
            }
            &Self::Mbc2 { ram_enable, .. } => {
                if ram_enabled(ram_enable) {
                    // Built-in 512-entry RAM, mirrored across the window
                    RamMapResult::Address(u32::from(relative_address & 0x01FF))
                } else {
                    RamMapResult::Unmapped
                }
            }
            &Self::Mbc3 { ram_enable, ram_bank, .. } => {
                if !ram_enabled(ram_enable) {
                    return RamMapResult::Unmapped;
                }

                match ram_bank {
                    0x00..=0x03 => RamMapResult::Address(
                        u32::from(relative_address) + (u32::from(ram_bank) << RAM_BANK_SHIFT),
                    ),
                    0x08..=0x0C => RamMapResult::RtcRegister,
                    _ => RamMapResult::Unmapped,
                }
            }
            &Self::Mbc5 { ram_bank_mask, ram_enable, ram_bank, .. } => {
                if ram_enabled(ram_enable) {
                    let bank = ram_bank & ram_bank_mask;
                    RamMapResult::Address(
                        u32::from(relative_address) + (u32::from(bank) << RAM_BANK_SHIFT),
                    )
                } else {
                    RamMapResult::Unmapped
                }
            }
        }
    }

    pub(crate) fn read_rtc_register(&self) -> Option<u8> {
        match self {
            Self::Mbc3 { ram_bank, clock: Some(clock), .. } => clock.read_register(*ram_bank),
            _ => None,
        }
    }

    pub(crate) fn write_rtc_register(&mut self, value: u8) {
        if let Self::Mbc3 { ram_bank, clock: Some(clock), .. } = self {
            clock.write_register(*ram_bank, value);
        }
    }

    pub(crate) fn update_rtc(&mut self) {
        if let Self::Mbc3 { clock: Some(clock), .. } = self {
            clock.update(SystemTime::now());
        }
    }

    pub(crate) fn get_clock(&self) -> Option<&RealTimeClock> {
        match self {
            Self::Mbc3 { clock, .. } => clock.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_features() -> MapperFeatures {
        MapperFeatures { has_ram: false, has_battery: false, has_rtc: false }
    }

    #[test]
    fn mbc1_rom_banking() {
        // 256KB ROM
        let mut mapper = Mapper::new(MapperType::Mbc1, no_features(), None, 1 << 18, 0);

        assert_eq!(0x0000, mapper.map_rom_address(0x0000));
        assert_eq!(0x4000, mapper.map_rom_address(0x4000));
        assert_eq!(0x7FFF, mapper.map_rom_address(0x7FFF));

        mapper.write_rom_address(0x2000, 0x05);

        assert_eq!(0x3FFF, mapper.map_rom_address(0x3FFF));
        assert_eq!(0x14000, mapper.map_rom_address(0x4000));
        assert_eq!(0x15324, mapper.map_rom_address(0x5324));

        // Bank numbers past the last bank wrap via the mask
        mapper.write_rom_address(0x2000, 0x15);
        assert_eq!(0x14000, mapper.map_rom_address(0x4000));
    }

    #[test]
    fn mbc1_bank_zero_remaps_to_one() {
        let mut mapper = Mapper::new(MapperType::Mbc1, no_features(), None, 1 << 21, 0);

        mapper.write_rom_address(0x2000, 0x00);
        assert_eq!(0x4000, mapper.map_rom_address(0x4000));

        mapper.write_rom_address(0x2000, 0x01);
        assert_eq!(0x4000, mapper.map_rom_address(0x4000));
    }

    #[test]
    fn mbc1_mode_one_banked_fixed_region() {
        // 2MB ROM
        let mut mapper = Mapper::new(MapperType::Mbc1, no_features(), None, 1 << 21, 0);

        mapper.write_rom_address(0x6000, 0x01);
        mapper.write_rom_address(0x2000, 0x05);
        mapper.write_rom_address(0x4000, 0x02);

        assert_eq!(0x100000, mapper.map_rom_address(0x0000));
        assert_eq!(0x114000, mapper.map_rom_address(0x4000));
    }

    #[test]
    fn mbc1_ram_enable() {
        let mut mapper = Mapper::new(MapperType::Mbc1, no_features(), None, 1 << 18, 8192);

        assert_eq!(RamMapResult::Unmapped, mapper.map_ram_address(0xA000));

        mapper.write_rom_address(0x0000, 0x0A);
        assert_eq!(RamMapResult::Address(0x0000), mapper.map_ram_address(0xA000));
        assert_eq!(RamMapResult::Address(0x1234), mapper.map_ram_address(0xB234));

        mapper.write_rom_address(0x0000, 0x00);
        assert_eq!(RamMapResult::Unmapped, mapper.map_ram_address(0xA000));
    }

    #[test]
    fn mbc2_register_select_by_address_bit() {
        let mut mapper = Mapper::new(MapperType::Mbc2, no_features(), None, 1 << 18, 512);

        // Bit 8 clear: RAM enable; bit 8 set: ROM bank
        mapper.write_rom_address(0x0000, 0x0A);
        mapper.write_rom_address(0x0100, 0x03);

        assert_eq!(0xC000, mapper.map_rom_address(0x4000));
        assert_eq!(RamMapResult::Address(0x0012), mapper.map_ram_address(0xA012));
        // The 512-entry RAM is mirrored through the full window
        assert_eq!(RamMapResult::Address(0x0012), mapper.map_ram_address(0xA212));
    }

    #[test]
    fn mbc3_ram_banks_and_rtc_select() {
        let mut mapper = Mapper::new(
            MapperType::Mbc3,
            MapperFeatures { has_ram: true, has_battery: true, has_rtc: true },
            None,
            1 << 19,
            32768,
        );

        mapper.write_rom_address(0x0000, 0x0A);
        mapper.write_rom_address(0x4000, 0x02);
        assert_eq!(RamMapResult::Address(0x4000), mapper.map_ram_address(0xA000));

        mapper.write_rom_address(0x4000, 0x08);
        assert_eq!(RamMapResult::RtcRegister, mapper.map_ram_address(0xA000));
    }

    #[test]
    fn mbc5_nine_bit_rom_bank() {
        let mut mapper = Mapper::new(MapperType::Mbc5, no_features(), None, 1 << 23, 0);

        mapper.write_rom_address(0x2000, 0x34);
        mapper.write_rom_address(0x3000, 0x01);

        let bank = 0x0134_u32;
        assert_eq!(bank << 14, mapper.map_rom_address(0x4000));

        // MBC5 does not remap bank 0
        mapper.write_rom_address(0x2000, 0x00);
        mapper.write_rom_address(0x3000, 0x00);
        assert_eq!(0x0000, mapper.map_rom_address(0x4000));
    }
}
