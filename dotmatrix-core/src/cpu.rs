pub(crate) mod instructions;
mod registers;


use crate::memory::ioregisters::IoRegister;
use crate::memory::AddressSpace;
use crate::ppu::PpuState;

pub use registers::CpuRegisters;
pub(crate) use registers::{Reg16, Reg8};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    VBlank,
    LcdStatus,
    Timer,
    Serial,
    Joypad,
}

impl InterruptType {
    /// Interrupts in dispatch priority order, highest first.
    pub const PRIORITY_ORDER: [Self; 5] =
        [Self::VBlank, Self::LcdStatus, Self::Timer, Self::Serial, Self::Joypad];

    pub fn bit(self) -> u8 {
        match self {
            Self::VBlank => 0x01,
            Self::LcdStatus => 0x02,
            Self::Timer => 0x04,
            Self::Serial => 0x08,
            Self::Joypad => 0x10,
        }
    }

    pub fn handler_address(self) -> u16 {
        match self {
            Self::VBlank => 0x0040,
            Self::LcdStatus => 0x0048,
            Self::Timer => 0x0050,
            Self::Serial => 0x0058,
            Self::Joypad => 0x0060,
        }
    }
}

/// T-cycles consumed by interrupt dispatch.
pub const ISR_CYCLES_REQUIRED: u32 = 20;

fn pending_interrupts(address_space: &AddressSpace) -> u8 {
    address_space.get_ie_register()
        & address_space.get_io_registers().read_register(IoRegister::IF)
        & 0x1F
}

/// Whether an enabled interrupt is pending, ignoring IME. This is the
/// condition that wakes a halted CPU.
pub fn interrupt_triggered_no_ime_check(address_space: &AddressSpace) -> bool {
    pending_interrupts(address_space) != 0
}

/// Whether the CPU will dispatch an interrupt before the next instruction.
pub fn interrupt_triggered(registers: &CpuRegisters, address_space: &AddressSpace) -> bool {
    registers.ime && interrupt_triggered_no_ime_check(address_space)
}

/// Dispatch the highest-priority pending interrupt: clear IME and the
/// pending IF bit, push PC, and jump to the handler vector.
pub fn execute_interrupt_service_routine(
    registers: &mut CpuRegisters,
    address_space: &mut AddressSpace,
    ppu_state: &PpuState,
) {
    registers.ime = false;
    registers.ime_scheduled = false;
    registers.halted = false;

    let pending = pending_interrupts(address_space);
    for interrupt_type in InterruptType::PRIORITY_ORDER {
        if pending & interrupt_type.bit() != 0 {
            address_space.get_io_registers_mut().interrupt_flags().clear(interrupt_type);

            registers.sp = registers.sp.wrapping_sub(2);
            address_space.write_address_u16(registers.sp, registers.pc, ppu_state);
            registers.pc = interrupt_type.handler_address();

            log::trace!("dispatched {interrupt_type:?} interrupt to {:04X}", registers.pc);

            return;
        }
    }
}
