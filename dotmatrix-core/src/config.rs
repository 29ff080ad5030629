use std::fmt::{self, Formatter};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub rom_file_path: String,
    /// Optional path to a <=256-byte boot ROM mapped over 0x0000-0x00FF
    pub boot_rom_path: Option<String>,
    /// Skip loading/saving the snapshot side-car file
    pub state_enabled: bool,
    /// Run without frame pacing (no renderer attached)
    pub headless: bool,
    /// Emit a per-instruction trace to stderr
    pub debug_trace: bool,
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "rom_file_path: {}", self.rom_file_path)?;
        writeln!(f, "boot_rom_path: {}", self.boot_rom_path.as_deref().unwrap_or("<None>"))?;
        writeln!(f, "state_enabled: {}", self.state_enabled)?;
        writeln!(f, "headless: {}", self.headless)?;
        writeln!(f, "debug_trace: {}", self.debug_trace)?;

        Ok(())
    }
}
