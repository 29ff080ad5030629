use anyhow::Context;
use clap::{Parser, Subcommand};
use dotmatrix_core::{HostHooks, RunConfig, SerialSink};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dotmatrix", about = "DMG emulator", version)]
struct Cli {
    /// Path to the ROM image
    rom_file_path: Option<String>,
    /// Use a boot ROM overlay (<=256 bytes)
    #[arg(short = 'b', long = "boot")]
    boot_rom_path: Option<String>,
    /// Mirror outgoing serial bytes to standard output
    #[arg(long = "print-serial", default_value_t = false)]
    print_serial: bool,
    /// Do not load or save snapshot state
    #[arg(long = "no-state", default_value_t = false)]
    no_state: bool,
    /// Run without a renderer or input poller
    #[arg(long = "headless", default_value_t = false)]
    headless: bool,
    /// Emit a per-instruction trace to standard error
    #[arg(short = 'd', long = "debug", default_value_t = false)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Linearly decode a ROM, one line per opcode
    Disassemble { rom_file_path: String },
}

/// Writes each serial byte straight to stdout, the way the Blargg test
/// ROMs report their results.
struct StdoutSerial(io::Stdout);

impl SerialSink for StdoutSerial {
    fn byte_out(&mut self, byte: u8) {
        let _ = self.0.write_all(&[byte]);
        let _ = self.0.flush();
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Cli::parse();

    if let Some(Command::Disassemble { rom_file_path }) = args.command {
        let rom = std::fs::read(&rom_file_path)
            .with_context(|| format!("failed to read ROM from {rom_file_path}"))?;
        dotmatrix_core::disassemble(rom, &mut io::stdout().lock())?;
        return Ok(());
    }

    let Some(rom_file_path) = args.rom_file_path else {
        anyhow::bail!("no ROM path given");
    };

    let run_config = RunConfig {
        rom_file_path,
        boot_rom_path: args.boot_rom_path,
        state_enabled: !args.no_state,
        headless: args.headless,
        debug_trace: args.debug,
    };

    let mut serial_sink = StdoutSerial(io::stdout());
    let hooks = HostHooks {
        renderer: None,
        input: None,
        serial: args.print_serial.then_some(&mut serial_sink as &mut dyn SerialSink),
    };

    // Ctrl-C raises the quit latch so the engine exits its loop cleanly and
    // persists battery RAM and snapshot state on the way out
    let quit_signal = Arc::new(AtomicBool::new(false));
    {
        let quit_signal = Arc::clone(&quit_signal);
        ctrlc::set_handler(move || {
            quit_signal.store(true, Ordering::Relaxed);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    dotmatrix_core::run(&run_config, hooks, quit_signal)
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    Ok(())
}
