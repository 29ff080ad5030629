use crate::config::RunConfig;
use crate::cpu::instructions::{self, ParseError};
use crate::cpu::{self, CpuRegisters};
use crate::joypad::{self, ButtonState};
use crate::memory::AddressSpace;
use crate::ppu::{self, FrameBuffer, PpuState};
use crate::serial::{self, SerialSink};
use crate::startup::EmulationState;
use crate::{serialize, timer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("error parsing CPU instruction: {source}")]
    InstructionParse {
        #[from]
        source: ParseError,
    },
}

/// Control signal polled from the renderer once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Continue,
    Pause,
    Quit,
}

/// Receives each completed 160x144 frame and reports control signals back
/// to the engine.
pub trait Renderer {
    fn draw(&mut self, frame: &FrameBuffer);

    fn poll_signal(&mut self) -> HostSignal {
        HostSignal::Continue
    }
}

/// Polled once per frame for the current button state.
pub trait InputPoller {
    fn poll(&mut self) -> ButtonState;
}

/// The host-side attachments; every port is optional and a headless run
/// passes none of them.
#[derive(Default)]
pub struct HostHooks<'a> {
    pub renderer: Option<&'a mut dyn Renderer>,
    pub input: Option<&'a mut dyn InputPoller>,
    pub serial: Option<&'a mut dyn SerialSink>,
}

// One frame is 154 lines x 456 dots; at 4.194304 MHz that is roughly 59.7
// frames per second
const CYCLES_PER_FRAME: u64 = 154 * 456;
const FRAME_DURATION: Duration = Duration::from_nanos(70224 * 1_000_000_000 / 4_194_304);

// Battery RAM flush cadence, roughly every five seconds of emulated time
const RAM_FLUSH_FRAME_INTERVAL: u64 = 300;

/// Run the emulator until the renderer asks to quit or the quit signal is
/// raised. Returns the final emulation state so the caller can persist it.
pub fn run(
    emulation_state: EmulationState,
    run_config: &RunConfig,
    mut hooks: HostHooks<'_>,
    quit_signal: Arc<AtomicBool>,
) -> Result<EmulationState, RunError> {
    log::info!("Running with config:\n{run_config}");

    let EmulationState {
        mut address_space,
        mut cpu_registers,
        mut ppu_state,
        mut timer_state,
        mut serial_state,
    } = emulation_state;

    let mut joypad_state = ButtonState::default();
    let mut paused = false;
    let mut total_cycles = 0_u64;
    let mut frame_count = 0_u64;
    let mut next_frame_time = Instant::now() + FRAME_DURATION;

    loop {
        if paused {
            std::thread::sleep(FRAME_DURATION);
            if quit_signal.load(Ordering::Relaxed) {
                break;
            }
            if let Some(renderer) = hooks.renderer.as_deref_mut() {
                match renderer.poll_signal() {
                    HostSignal::Pause => paused = false,
                    HostSignal::Quit => break,
                    HostSignal::Continue => {}
                }
            }
            continue;
        }

        joypad::update_joyp_register(&joypad_state, address_space.get_io_registers_mut());

        let cycles = if cpu_registers.stopped {
            // STOP latch: the CPU and timer freeze, everything else idles
            4
        } else {
            let cycles = match tick_cpu(
                &mut address_space,
                &mut cpu_registers,
                &ppu_state,
                run_config.debug_trace,
            ) {
                Ok(cycles) => cycles,
                Err(err) => {
                    // Even a fatal decode abort must not lose battery RAM
                    flush_persistent_state(&mut address_space);
                    return Err(err);
                }
            };
            timer::update_timer_registers(
                &mut timer_state,
                address_space.get_io_registers_mut(),
                cycles.into(),
            );
            cycles
        };

        if let Some(source_high) = address_space.get_io_registers_mut().take_pending_oam_dma() {
            ppu_state.begin_oam_dma(source_high);
        }
        ppu::progress_oam_dma_transfer(&mut ppu_state, &mut address_space, cycles);

        serial::update_serial_port(
            &mut serial_state,
            address_space.get_io_registers_mut(),
            cycles.into(),
            reborrow_serial_sink(&mut hooks.serial),
        );

        ppu::tick(&mut ppu_state, &mut address_space, cycles);

        // Check the quit latch once per frame-time of cycles, so shutdown
        // still works while the LCD is disabled or the CPU is stopped
        if total_cycles / CYCLES_PER_FRAME
            != (total_cycles + u64::from(cycles)) / CYCLES_PER_FRAME
            && quit_signal.load(Ordering::Relaxed)
        {
            log::info!("Quit signal received, exiting main loop");
            break;
        }
        total_cycles += u64::from(cycles);

        if ppu_state.is_frame_ready() {
            frame_count += 1;

            {
                let frame = ppu_state.take_frame();
                if let Some(renderer) = hooks.renderer.as_deref_mut() {
                    renderer.draw(frame);
                }
            }

            if let Some(input) = hooks.input.as_deref_mut() {
                let new_buttons = input.poll();
                joypad::update_button_state(
                    &mut joypad_state,
                    new_buttons,
                    address_space.get_io_registers_mut(),
                );
            }

            if let Some(renderer) = hooks.renderer.as_deref_mut() {
                match renderer.poll_signal() {
                    HostSignal::Continue => {}
                    HostSignal::Pause => paused = true,
                    HostSignal::Quit => break,
                }
            }

            if frame_count % RAM_FLUSH_FRAME_INTERVAL == 0 {
                address_space.update_rtc();
                // Persistence failures are logged, never fatal
                if let Err(err) = address_space.persist_cartridge_ram() {
                    log::error!("error writing cartridge RAM to sav file: {err}");
                }
            }

            if !run_config.headless {
                let now = Instant::now();
                if next_frame_time > now {
                    std::thread::sleep(next_frame_time - now);
                }
                next_frame_time += FRAME_DURATION;
            }
        }
    }

    Ok(EmulationState { address_space, cpu_registers, ppu_state, timer_state, serial_state })
}

fn reborrow_serial_sink<'a>(
    sink: &'a mut Option<&mut dyn SerialSink>,
) -> Option<&'a mut dyn SerialSink> {
    match sink {
        Some(sink) => Some(&mut **sink),
        None => None,
    }
}

fn flush_persistent_state(address_space: &mut AddressSpace) {
    if let Err(err) = address_space.persist_cartridge_ram() {
        log::error!("error writing cartridge RAM to sav file: {err}");
    }
    if let Err(err) = address_space.persist_rtc() {
        log::error!("error writing real-time clock state: {err}");
    }
}

/// Execute one CPU step: an interrupt dispatch, one instruction, or a
/// 4-cycle idle while halted with nothing pending.
fn tick_cpu(
    address_space: &mut AddressSpace,
    cpu_registers: &mut CpuRegisters,
    ppu_state: &PpuState,
    debug_trace: bool,
) -> Result<u32, RunError> {
    if cpu::interrupt_triggered(cpu_registers, address_space) {
        cpu::execute_interrupt_service_routine(cpu_registers, address_space, ppu_state);
        return Ok(cpu::ISR_CYCLES_REQUIRED);
    }

    if cpu_registers.halted && !cpu::interrupt_triggered_no_ime_check(address_space) {
        return Ok(4);
    }
    cpu_registers.halted = false;

    if debug_trace {
        trace_instruction(address_space, cpu_registers, ppu_state);
    }

    let (instruction, pc) = instructions::parse_next_instruction(
        address_space,
        cpu_registers.pc,
        ppu_state,
        cpu_registers.halt_bug,
    )?;
    cpu_registers.halt_bug = false;
    cpu_registers.pc = pc;

    let cycles_required = instruction.cycles_required(cpu_registers);
    instruction.execute(address_space, cpu_registers, ppu_state);

    Ok(cycles_required)
}

fn trace_instruction(
    address_space: &AddressSpace,
    cpu_registers: &CpuRegisters,
    ppu_state: &PpuState,
) {
    let pc = cpu_registers.pc;
    eprintln!(
        "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X} PCMEM:{:02X},{:02X},{:02X},{:02X}",
        cpu_registers.a,
        cpu_registers.f,
        cpu_registers.b,
        cpu_registers.c,
        cpu_registers.d,
        cpu_registers.e,
        cpu_registers.h,
        cpu_registers.l,
        cpu_registers.sp,
        pc,
        address_space.read_address_u8(pc, ppu_state),
        address_space.read_address_u8(pc.wrapping_add(1), ppu_state),
        address_space.read_address_u8(pc.wrapping_add(2), ppu_state),
        address_space.read_address_u8(pc.wrapping_add(3), ppu_state),
    );
}


/// Flush battery RAM, the RTC, and (when enabled) the snapshot on the way
/// out. Persistence failures are logged and swallowed.
pub fn shutdown(mut emulation_state: EmulationState, run_config: &RunConfig) {
    flush_persistent_state(&mut emulation_state.address_space);

    if run_config.state_enabled {
        let save_state_path = serialize::determine_save_state_path(&run_config.rom_file_path);
        if let Err(err) = serialize::save_state(&emulation_state, &save_state_path) {
            log::error!("error writing save state to {}: {err}", save_state_path.display());
        }
    }
}
