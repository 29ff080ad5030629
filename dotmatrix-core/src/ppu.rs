mod fifo;
mod queue;

use crate::cpu::InterruptType;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use crate::memory::AddressSpace;
use crate::ppu::queue::PixelQueue;
use serde::{Deserialize, Serialize};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

/// One completed frame: `frame[y][x]` holds a shade 0..=3, 0 lightest.
pub type FrameBuffer = [[u8; SCREEN_WIDTH]; SCREEN_HEIGHT];

const DOTS_PER_LINE: u32 = 456;
const OAM_SCAN_DOTS: u32 = 80;
const LINES_PER_FRAME: u8 = 154;
const MAX_SPRITES_PER_LINE: usize = 10;

const OAM_DMA_BYTES: u8 = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PpuMode {
    HBlank,
    VBlank,
    ScanningOam,
    Rendering,
}

impl PpuMode {
    fn stat_bits(self) -> u8 {
        match self {
            Self::HBlank => 0,
            Self::VBlank => 1,
            Self::ScanningOam => 2,
            Self::Rendering => 3,
        }
    }
}

/// LCDC register viewed through its bit fields.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lcdc(u8);

impl Lcdc {
    pub(crate) fn read(io_registers: &IoRegisters) -> Self {
        Self(io_registers.read_register(IoRegister::LCDC))
    }

    fn enabled(self) -> bool {
        self.0 & 0x80 != 0
    }

    fn window_tile_map_high(self) -> bool {
        self.0 & 0x40 != 0
    }

    fn window_enabled(self) -> bool {
        self.0 & 0x20 != 0
    }

    fn unsigned_tile_data(self) -> bool {
        self.0 & 0x10 != 0
    }

    fn bg_tile_map_high(self) -> bool {
        self.0 & 0x08 != 0
    }

    fn sprite_height(self) -> u16 {
        if self.0 & 0x04 != 0 { 16 } else { 8 }
    }

    fn sprites_enabled(self) -> bool {
        self.0 & 0x02 != 0
    }

    fn bg_enabled(self) -> bool {
        self.0 & 0x01 != 0
    }
}

// STAT interrupt source select bits
const STAT_LYC_SELECT: u8 = 1 << 6;
const STAT_OAM_SELECT: u8 = 1 << 5;
const STAT_VBLANK_SELECT: u8 = 1 << 4;
const STAT_HBLANK_SELECT: u8 = 1 << 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SpriteData {
    y: u8,
    x: u8,
    tile_index: u8,
    bg_priority: bool,
    y_flip: bool,
    x_flip: bool,
    // Selects OBP1 over OBP0
    palette_select: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Pixel {
    color_index: u8,
    shade: u8,
    bg_priority: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OamDmaStatus {
    source_high: u8,
    next_byte: u8,
}

impl OamDmaStatus {
    fn source_address(self) -> u16 {
        u16::from_be_bytes([self.source_high, self.next_byte])
    }

    fn oam_address(self) -> u16 {
        0xFE00 | u16::from(self.next_byte)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpuState {
    mode: PpuMode,
    enabled: bool,
    line_dots: u32,
    #[serde(
        serialize_with = "crate::serialize::serialize_2d_array",
        deserialize_with = "crate::serialize::deserialize_2d_array"
    )]
    frame_buffer: FrameBuffer,
    #[serde(
        serialize_with = "crate::serialize::serialize_2d_array",
        deserialize_with = "crate::serialize::deserialize_2d_array"
    )]
    completed_frame: FrameBuffer,
    frame_ready: bool,
    frames_rendered: u64,
    sprite_buffer: Vec<SpriteData>,
    bg_fifo: PixelQueue<Pixel>,
    sprite_fifo: PixelQueue<Pixel>,
    // Fetcher state, reset at the start of every scanline
    fetched_x: u8,
    pushed_x: u8,
    discarded_pixels: u8,
    fetched_sprites: usize,
    window_triggered: bool,
    line_contained_window: bool,
    window_line_counter: u8,
    lyc_match: bool,
    stat_interrupt_line: bool,
    oam_dma: Option<OamDmaStatus>,
}

impl PpuState {
    pub fn new() -> Self {
        Self {
            mode: PpuMode::ScanningOam,
            enabled: false,
            line_dots: 0,
            frame_buffer: [[0; SCREEN_WIDTH]; SCREEN_HEIGHT],
            completed_frame: [[0; SCREEN_WIDTH]; SCREEN_HEIGHT],
            frame_ready: false,
            frames_rendered: 0,
            sprite_buffer: Vec::with_capacity(MAX_SPRITES_PER_LINE),
            bg_fifo: PixelQueue::new(),
            sprite_fifo: PixelQueue::new(),
            fetched_x: 0,
            pushed_x: 0,
            discarded_pixels: 0,
            fetched_sprites: 0,
            window_triggered: false,
            line_contained_window: false,
            window_line_counter: 0,
            lyc_match: false,
            stat_interrupt_line: false,
            oam_dma: None,
        }
    }

    pub fn mode(&self) -> PpuMode {
        self.mode
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Hand out the most recently completed frame, clearing the frame-ready
    /// flag.
    pub fn take_frame(&mut self) -> &FrameBuffer {
        self.frame_ready = false;
        &self.completed_frame
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn oam_dma_status(&self) -> Option<OamDmaStatus> {
        self.oam_dma
    }

    pub fn begin_oam_dma(&mut self, source_high: u8) {
        log::trace!("OAM DMA started from page {source_high:02X}");
        self.oam_dma = Some(OamDmaStatus { source_high, next_byte: 0 });
    }

    fn reset_line_fetcher(&mut self) {
        self.fetched_x = 0;
        self.pushed_x = 0;
        self.discarded_pixels = 0;
        self.fetched_sprites = 0;
        self.window_triggered = false;
        self.bg_fifo.clear();
        self.sprite_fifo.clear();
    }
}

impl Default for PpuState {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance the PPU by the given number of T-cycles (dots).
pub fn tick(ppu_state: &mut PpuState, address_space: &mut AddressSpace, cycles: u32) {
    for _ in 0..cycles {
        tick_dot(ppu_state, address_space);
    }
}

fn tick_dot(ppu_state: &mut PpuState, address_space: &mut AddressSpace) {
    let lcdc = Lcdc::read(address_space.get_io_registers());

    if !lcdc.enabled() {
        if ppu_state.enabled || current_ly(address_space) != 0 || ppu_state.mode != PpuMode::HBlank
        {
            // Turning the LCD off blanks the screen and parks the PPU at
            // the start of the frame
            ppu_state.frame_buffer = [[0; SCREEN_WIDTH]; SCREEN_HEIGHT];
            ppu_state.line_dots = 0;
            ppu_state.mode = PpuMode::HBlank;
            ppu_state.enabled = false;

            let io_registers = address_space.get_io_registers_mut();
            io_registers.privileged_set_ly(0);
            sync_stat_and_interrupt(ppu_state, address_space);
        }

        return;
    }

    ppu_state.enabled = true;
    ppu_state.line_dots += 1;

    match ppu_state.mode {
        PpuMode::ScanningOam => {
            if ppu_state.line_dots >= OAM_SCAN_DOTS {
                scan_oam(ppu_state, address_space, lcdc);
                ppu_state.reset_line_fetcher();
                ppu_state.mode = PpuMode::Rendering;
            }
        }
        PpuMode::Rendering => {
            while ppu_state.fetched_sprites < ppu_state.sprite_buffer.len()
                && ppu_state.sprite_buffer[ppu_state.fetched_sprites].x <= ppu_state.pushed_x + 8
            {
                fifo::fetch_sprite_pixels(ppu_state, address_space, lcdc);
            }

            fifo::fetch_bg_window_pixels(ppu_state, address_space, lcdc);
            fifo::push_pixel(ppu_state, address_space, lcdc);

            if ppu_state.pushed_x >= SCREEN_WIDTH as u8 {
                ppu_state.mode = PpuMode::HBlank;
            }
        }
        PpuMode::HBlank => {
            if ppu_state.line_dots >= DOTS_PER_LINE {
                ppu_state.line_dots = 0;

                let ly = current_ly(address_space) + 1;
                address_space.get_io_registers_mut().privileged_set_ly(ly);
                check_lyc(ppu_state, address_space);

                if ppu_state.line_contained_window {
                    ppu_state.window_line_counter += 1;
                    ppu_state.line_contained_window = false;
                }

                if ly < SCREEN_HEIGHT as u8 {
                    ppu_state.mode = PpuMode::ScanningOam;
                } else {
                    ppu_state.mode = PpuMode::VBlank;
                    ppu_state.window_line_counter = 0;

                    ppu_state.completed_frame = ppu_state.frame_buffer;
                    ppu_state.frame_buffer = [[0; SCREEN_WIDTH]; SCREEN_HEIGHT];
                    ppu_state.frames_rendered += 1;
                    ppu_state.frame_ready = true;

                    address_space
                        .get_io_registers_mut()
                        .interrupt_flags()
                        .set(InterruptType::VBlank);
                }
            }
        }
        PpuMode::VBlank => {
            if ppu_state.line_dots >= DOTS_PER_LINE {
                ppu_state.line_dots = 0;

                let mut ly = current_ly(address_space) + 1;
                if ly == LINES_PER_FRAME {
                    ppu_state.mode = PpuMode::ScanningOam;
                    ly = 0;
                }
                address_space.get_io_registers_mut().privileged_set_ly(ly);
                check_lyc(ppu_state, address_space);
            }
        }
    }

    sync_stat_and_interrupt(ppu_state, address_space);
}

fn current_ly(address_space: &AddressSpace) -> u8 {
    address_space.get_io_registers().read_register(IoRegister::LY)
}

fn check_lyc(ppu_state: &mut PpuState, address_space: &mut AddressSpace) {
    let io_registers = address_space.get_io_registers();
    ppu_state.lyc_match =
        io_registers.read_register(IoRegister::LY) == io_registers.read_register(IoRegister::LYC);
}

/// Mirror the PPU-owned STAT bits into the register and drive the shared
/// STAT interrupt line; the interrupt fires on the line's rising edge.
fn sync_stat_and_interrupt(ppu_state: &mut PpuState, address_space: &mut AddressSpace) {
    let io_registers = address_space.get_io_registers_mut();
    io_registers.privileged_set_stat_low_bits(ppu_state.lyc_match, ppu_state.mode.stat_bits());

    let stat = io_registers.read_register(IoRegister::STAT);
    let line = ppu_state.enabled
        && ((ppu_state.lyc_match && stat & STAT_LYC_SELECT != 0)
            || (ppu_state.mode == PpuMode::ScanningOam && stat & STAT_OAM_SELECT != 0)
            || (ppu_state.mode == PpuMode::VBlank && stat & STAT_VBLANK_SELECT != 0)
            || (ppu_state.mode == PpuMode::HBlank && stat & STAT_HBLANK_SELECT != 0));

    if line && !ppu_state.stat_interrupt_line {
        io_registers.interrupt_flags().set(InterruptType::LcdStatus);
    }
    ppu_state.stat_interrupt_line = line;
}

/// Collect the first 10 sprites overlapping this scanline, in OAM order,
/// then stably sort by X so leftmost sprites win merge conflicts.
fn scan_oam(ppu_state: &mut PpuState, address_space: &AddressSpace, lcdc: Lcdc) {
    let ly = u16::from(current_ly(address_space));
    let sprite_height = lcdc.sprite_height();

    ppu_state.sprite_buffer.clear();

    for oam_index in 0..40 {
        if ppu_state.sprite_buffer.len() == MAX_SPRITES_PER_LINE {
            break;
        }

        let entry_addr = 0xFE00 + 4 * oam_index;
        let y = address_space.ppu_read_address_u8(entry_addr);

        if ly + 16 >= u16::from(y) && ly + 16 < u16::from(y) + sprite_height {
            let attributes = address_space.ppu_read_address_u8(entry_addr + 3);
            ppu_state.sprite_buffer.push(SpriteData {
                y,
                x: address_space.ppu_read_address_u8(entry_addr + 1),
                tile_index: address_space.ppu_read_address_u8(entry_addr + 2),
                bg_priority: attributes & 0x80 != 0,
                y_flip: attributes & 0x40 != 0,
                x_flip: attributes & 0x20 != 0,
                palette_select: attributes & 0x10 != 0,
            });
        }
    }

    ppu_state.sprite_buffer.sort_by_key(|sprite| sprite.x);
}

/// Advance an in-flight OAM DMA transfer: one byte copied per 4 T-cycles.
pub fn progress_oam_dma_transfer(
    ppu_state: &mut PpuState,
    address_space: &mut AddressSpace,
    cycles: u32,
) {
    let Some(mut status) = ppu_state.oam_dma else {
        return;
    };

    for _ in 0..cycles / 4 {
        address_space.oam_dma_copy_byte(status.source_address(), status.oam_address());
        status.next_byte += 1;

        if status.next_byte == OAM_DMA_BYTES {
            log::trace!("OAM DMA finished");
            ppu_state.oam_dma = None;
            return;
        }
    }

    ppu_state.oam_dma = Some(status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::test_address_space;

    fn enabled_ppu() -> (PpuState, AddressSpace) {
        let mut address_space = test_address_space();
        address_space.get_io_registers_mut().write_register(IoRegister::LCDC, 0x91);

        (PpuState::new(), address_space)
    }

    #[test]
    fn oam_scan_enters_rendering_after_80_dots() {
        let (mut ppu_state, mut address_space) = enabled_ppu();

        tick(&mut ppu_state, &mut address_space, 79);
        assert_eq!(PpuMode::ScanningOam, ppu_state.mode());

        tick(&mut ppu_state, &mut address_space, 1);
        assert_eq!(PpuMode::Rendering, ppu_state.mode());
    }

    #[test]
    fn rendering_enters_hblank_after_160_pixels() {
        let (mut ppu_state, mut address_space) = enabled_ppu();

        tick(&mut ppu_state, &mut address_space, 80);
        assert_eq!(PpuMode::Rendering, ppu_state.mode());

        // More than enough dots to push all 160 pixels, less than a full line
        tick(&mut ppu_state, &mut address_space, 300);
        assert_eq!(PpuMode::HBlank, ppu_state.mode());
        assert_eq!(160, ppu_state.pushed_x);
    }

    #[test]
    fn hblank_stat_interrupt_follows_select_bit() {
        // Not selected: no STAT interrupt on entering HBlank
        let (mut ppu_state, mut address_space) = enabled_ppu();
        tick(&mut ppu_state, &mut address_space, 380);
        assert_eq!(PpuMode::HBlank, ppu_state.mode());
        assert!(!address_space
            .get_io_registers_mut()
            .interrupt_flags()
            .get(InterruptType::LcdStatus));

        // Selected: STAT interrupt requested
        let (mut ppu_state, mut address_space) = enabled_ppu();
        address_space.get_io_registers_mut().write_register(IoRegister::STAT, 0x08);
        tick(&mut ppu_state, &mut address_space, 380);
        assert_eq!(PpuMode::HBlank, ppu_state.mode());
        assert!(address_space
            .get_io_registers_mut()
            .interrupt_flags()
            .get(InterruptType::LcdStatus));
    }

    #[test]
    fn frame_timing_and_vblank_interrupt() {
        let (mut ppu_state, mut address_space) = enabled_ppu();

        // One frame is 154 lines of 456 dots
        tick(&mut ppu_state, &mut address_space, 144 * 456 - 1);
        assert!(!ppu_state.is_frame_ready());

        tick(&mut ppu_state, &mut address_space, 1);
        assert!(ppu_state.is_frame_ready());
        assert_eq!(PpuMode::VBlank, ppu_state.mode());
        assert!(address_space
            .get_io_registers_mut()
            .interrupt_flags()
            .get(InterruptType::VBlank));

        // LY wraps to 0 at the end of the frame
        tick(&mut ppu_state, &mut address_space, 10 * 456);
        assert_eq!(0, current_ly(&address_space));
        assert_eq!(PpuMode::ScanningOam, ppu_state.mode());
        assert_eq!(1, ppu_state.frames_rendered());
    }

    #[test]
    fn ly_advances_once_per_line() {
        let (mut ppu_state, mut address_space) = enabled_ppu();

        for line in 0..154 {
            assert_eq!(line, current_ly(&address_space));
            tick(&mut ppu_state, &mut address_space, 456);
        }
        assert_eq!(0, current_ly(&address_space));
    }

    #[test]
    fn lyc_match_sets_stat_flag_and_interrupt() {
        let (mut ppu_state, mut address_space) = enabled_ppu();
        address_space.get_io_registers_mut().write_register(IoRegister::LYC, 1);
        address_space.get_io_registers_mut().write_register(IoRegister::STAT, 0x40);

        tick(&mut ppu_state, &mut address_space, 456);
        assert_eq!(1, current_ly(&address_space));
        assert_eq!(0x04, address_space.get_io_registers().read_register(IoRegister::STAT) & 0x07 & 0x04);
        assert!(address_space
            .get_io_registers_mut()
            .interrupt_flags()
            .get(InterruptType::LcdStatus));
    }

    #[test]
    fn oam_scan_limits_and_sorts_sprites() {
        let (mut ppu_state, mut address_space) = enabled_ppu();

        // 12 sprites on line 0, with descending X so the sort has work to do
        let ppu_probe = PpuState::new();
        for i in 0..12u16 {
            let base = 0xFE00 + 4 * i;
            address_space.write_address_u8(base, 16, &ppu_probe);
            address_space.write_address_u8(base + 1, (200 - i * 10) as u8, &ppu_probe);
            address_space.write_address_u8(base + 2, i as u8, &ppu_probe);
            address_space.write_address_u8(base + 3, 0, &ppu_probe);
        }

        tick(&mut ppu_state, &mut address_space, 80);

        assert_eq!(10, ppu_state.sprite_buffer.len());
        let xs: Vec<u8> = ppu_state.sprite_buffer.iter().map(|sprite| sprite.x).collect();
        let mut sorted = xs.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, xs);
    }

    #[test]
    fn oam_dma_copies_160_bytes_then_deactivates() {
        let (mut ppu_state, mut address_space) = enabled_ppu();
        let ppu_probe = PpuState::new();

        for i in 0..160u16 {
            address_space.write_address_u8(0xC000 + i, i as u8, &ppu_probe);
        }

        ppu_state.begin_oam_dma(0xC0);
        assert!(ppu_state.oam_dma_status().is_some());

        progress_oam_dma_transfer(&mut ppu_state, &mut address_space, 4 * 159);
        assert!(ppu_state.oam_dma_status().is_some());

        progress_oam_dma_transfer(&mut ppu_state, &mut address_space, 4);
        assert!(ppu_state.oam_dma_status().is_none());

        for i in 0..160u16 {
            assert_eq!(i as u8, address_space.ppu_read_address_u8(0xFE00 + i));
        }
    }

    #[test]
    fn disabling_lcd_parks_ppu_at_line_zero() {
        let (mut ppu_state, mut address_space) = enabled_ppu();

        tick(&mut ppu_state, &mut address_space, 20 * 456);
        assert_eq!(20, current_ly(&address_space));

        address_space.get_io_registers_mut().write_register(IoRegister::LCDC, 0x11);
        tick(&mut ppu_state, &mut address_space, 1);

        assert_eq!(0, current_ly(&address_space));
        assert_eq!(PpuMode::HBlank, ppu_state.mode());
        assert!(!ppu_state.enabled());
    }
}
