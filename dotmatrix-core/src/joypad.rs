use crate::cpu::InterruptType;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

const JOYP_SELECT_DIRECTIONS: u8 = 0x10;
const JOYP_SELECT_BUTTONS: u8 = 0x20;

/// Snapshot of the eight logical buttons, true = held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub start: bool,
    pub select: bool,
}

impl ButtonState {
    fn any_newly_pressed(self, previous: Self) -> bool {
        (self.up && !previous.up)
            || (self.down && !previous.down)
            || (self.left && !previous.left)
            || (self.right && !previous.right)
            || (self.a && !previous.a)
            || (self.b && !previous.b)
            || (self.start && !previous.start)
            || (self.select && !previous.select)
    }
}

/// Apply a freshly polled button snapshot: requests the joypad interrupt on
/// any rising edge and records the state for matrix reads.
pub fn update_button_state(
    joypad_state: &mut ButtonState,
    new_state: ButtonState,
    io_registers: &mut IoRegisters,
) {
    if new_state.any_newly_pressed(*joypad_state) {
        io_registers.interrupt_flags().set(InterruptType::Joypad);
    }

    *joypad_state = new_state;
}

/// Refresh the read-only low nibble of JOYP from the held buttons and the
/// row select bits. Selected rows pull their held buttons' bits low.
pub fn update_joyp_register(joypad_state: &ButtonState, io_registers: &mut IoRegisters) {
    let joyp = io_registers.read_register(IoRegister::JOYP);

    let mut low_nibble = 0x0F;

    if joyp & JOYP_SELECT_DIRECTIONS == 0 {
        low_nibble &= !(u8::from(joypad_state.right)
            | (u8::from(joypad_state.left) << 1)
            | (u8::from(joypad_state.up) << 2)
            | (u8::from(joypad_state.down) << 3));
    }

    if joyp & JOYP_SELECT_BUTTONS == 0 {
        low_nibble &= !(u8::from(joypad_state.a)
            | (u8::from(joypad_state.b) << 1)
            | (u8::from(joypad_state.select) << 2)
            | (u8::from(joypad_state.start) << 3));
    }

    io_registers.privileged_set_joyp_buttons(low_nibble);
}
