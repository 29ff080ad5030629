use crate::cpu::InterruptType;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

const TIMA_DIVISORS: [u64; 4] = [1024, 16, 64, 256];

/// Timer internals not visible through the I/O registers: the full 16-bit
/// divider (DIV exposes its upper byte) and the cycles accumulated toward
/// the next TIMA increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    divider: u16,
    tima_cycles: u64,
}

impl TimerState {
    pub fn new() -> Self {
        Self { divider: 0, tima_cycles: 0 }
    }

    /// Divider mid-count, where the DMG boot ROM leaves it.
    pub fn new_post_boot() -> Self {
        Self { divider: 0xAB00, tima_cycles: 0 }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance the divider and timer counter by the given number of T-cycles.
pub fn update_timer_registers(
    timer_state: &mut TimerState,
    io_registers: &mut IoRegisters,
    cycles: u64,
) {
    if io_registers.take_div_write() {
        // A DIV write clears the whole internal counter, not just the
        // visible byte
        timer_state.divider = 0;
        timer_state.tima_cycles = 0;
    }

    timer_state.divider = timer_state.divider.wrapping_add(cycles as u16);
    io_registers.privileged_set_div((timer_state.divider >> 8) as u8);

    let timer_control = io_registers.read_register(IoRegister::TAC);
    if timer_control & 0x04 == 0 {
        return;
    }

    timer_state.tima_cycles += cycles;
    let divisor = TIMA_DIVISORS[usize::from(timer_control & 0x03)];

    while timer_state.tima_cycles >= divisor {
        timer_state.tima_cycles -= divisor;

        let tima = io_registers.read_register(IoRegister::TIMA);
        match tima.overflowing_add(1) {
            (new_tima, false) => {
                io_registers.write_register(IoRegister::TIMA, new_tima);
            }
            (_, true) => {
                let timer_modulo = io_registers.read_register(IoRegister::TMA);
                io_registers.write_register(IoRegister::TIMA, timer_modulo);
                io_registers.interrupt_flags().set(InterruptType::Timer);
            }
        }
    }
}
