//! Cycle-driven emulation core for the original monochrome handheld (DMG).
//!
//! The engine is single-threaded and cooperative: each loop iteration runs
//! one CPU instruction, then steps the timer, OAM DMA, serial port and PPU
//! by the consumed T-cycles. Hosts attach through the [`Renderer`],
//! [`InputPoller`] and [`SerialSink`] traits; a headless run attaches none
//! of them.

mod config;
mod cpu;
mod disassembler;
mod eventloop;
mod joypad;
mod memory;
mod ppu;
mod serial;
mod serialize;
mod startup;
mod timer;

use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use config::RunConfig;
pub use disassembler::{disassemble, DisassembleError};
pub use eventloop::{HostHooks, HostSignal, InputPoller, Renderer, RunError};
pub use joypad::ButtonState;
pub use memory::CartridgeLoadError;
pub use ppu::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use serial::SerialSink;
pub use startup::{EmulationState, StartupError};

/// Initialize a console from the given config and run it until the host
/// asks to quit, then persist battery RAM and (when enabled) the snapshot.
pub fn run(
    run_config: &RunConfig,
    hooks: HostHooks<'_>,
    quit_signal: Arc<AtomicBool>,
) -> Result<(), Box<dyn Error>> {
    let mut emulation_state = startup::init_emulation_state(run_config)?;

    if run_config.state_enabled {
        let save_state_path = serialize::determine_save_state_path(&run_config.rom_file_path);
        if save_state_path.is_file() {
            match serialize::load_state(&save_state_path, emulation_state) {
                Ok(state) => {
                    emulation_state = state;
                }
                Err((err, existing_state)) => {
                    log::warn!("unable to load save state, starting fresh: {err}");
                    emulation_state = *existing_state;
                }
            }
        }
    }

    let final_state = eventloop::run(emulation_state, run_config, hooks, quit_signal)?;
    eventloop::shutdown(final_state, run_config);

    Ok(())
}
