use crate::cpu::InterruptType;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

// 4,194,304 Hz / 8,192 Hz = 512 T-cycles per bit, 4096 per byte
const CYCLES_PER_TRANSFER: u64 = 4096;

const SC_TRANSFER_ENABLE: u8 = 0x80;
const SC_INTERNAL_CLOCK: u8 = 0x01;

/// Receives every byte the emulated console shifts out over the link port.
pub trait SerialSink {
    fn byte_out(&mut self, byte: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialState {
    transfer_cycles: u64,
}

impl SerialState {
    pub fn new() -> Self {
        Self { transfer_cycles: 0 }
    }
}

impl Default for SerialState {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance an armed serial transfer. With no link partner attached the
/// shifted-in byte is always 0xFF (line dead).
pub fn update_serial_port(
    serial_state: &mut SerialState,
    io_registers: &mut IoRegisters,
    cycles: u64,
    sink: Option<&mut dyn SerialSink>,
) {
    let sc = io_registers.read_register(IoRegister::SC);
    if sc & (SC_TRANSFER_ENABLE | SC_INTERNAL_CLOCK) != (SC_TRANSFER_ENABLE | SC_INTERNAL_CLOCK) {
        return;
    }

    serial_state.transfer_cycles += cycles;
    if serial_state.transfer_cycles < CYCLES_PER_TRANSFER {
        return;
    }

    let byte = io_registers.read_register(IoRegister::SB);
    if let Some(sink) = sink {
        sink.byte_out(byte);
    }

    io_registers.write_register(IoRegister::SB, 0xFF);
    io_registers.write_register(IoRegister::SC, sc & !SC_TRANSFER_ENABLE);
    serial_state.transfer_cycles = 0;
    io_registers.interrupt_flags().set(InterruptType::Serial);

    log::trace!("serial transfer completed, sent {byte:02X}");
}
