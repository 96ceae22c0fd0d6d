//! Logging facade for the emulation core.
//!
//! The core does not link a logger crate. A frontend installs a [`LogSink`]
//! once per process and receives every line the core emits; with no sink
//! installed a logging macro costs a single atomic load. Lines are tagged
//! with the [`Subsystem`] they came from rather than free-form module paths,
//! so a debugger UI can filter them without string matching.

use std::fmt;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Trace,
    Info,
    Warn,
}

/// Origin of a log line within the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsystem {
    /// Register file decode: unmapped accesses, open-bus reads.
    Registers,
    /// Controller-level events: model switches, resets.
    Control,
    /// Mixing, resampling and the host sample queue.
    Mixer,
}

impl Subsystem {
    /// Stable dotted name for frontends that key filters off strings.
    pub const fn name(self) -> &'static str {
        match self {
            Subsystem::Registers => "apu.registers",
            Subsystem::Control => "apu.control",
            Subsystem::Mixer => "apu.mixer",
        }
    }
}

pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: Level, subsystem: Subsystem, args: fmt::Arguments);
}

static SINK: OnceLock<Box<dyn LogSink>> = OnceLock::new();

/// Install the process-wide sink. At most one sink can ever be installed; a
/// second attempt hands the rejected sink back to the caller.
pub fn install_sink(sink: Box<dyn LogSink>) -> Result<(), Box<dyn LogSink>> {
    SINK.set(sink)
}

pub(crate) fn emit(level: Level, subsystem: Subsystem, args: fmt::Arguments) {
    if let Some(sink) = SINK.get() {
        sink.log(level, subsystem, args);
    }
}
