//! Cycle-accurate NES (2A03) APU emulation core.
//!
//! This crate contains the platform-agnostic audio subsystem of the emulator:
//! the five sound channels, the frame counter, the CPU-visible register file
//! at $4000-$4017, and the delta-accumulating mixer that produces PCM for a
//! host sink. The CPU core drives it through [`apu::Apu::step`] once per CPU
//! cycle; frontends consume samples through [`audio_queue::AudioConsumer`].

pub mod diagnostics;

// Internal logging shorthands. The first argument names a
// `diagnostics::Subsystem` variant; the rest is a format string. A no-op
// unless a frontend has installed a sink.
macro_rules! core_trace {
    ($subsystem:ident, $($arg:tt)*) => {
        crate::diagnostics::emit(
            crate::diagnostics::Level::Trace,
            crate::diagnostics::Subsystem::$subsystem,
            format_args!($($arg)*),
        )
    };
}

macro_rules! core_info {
    ($subsystem:ident, $($arg:tt)*) => {
        crate::diagnostics::emit(
            crate::diagnostics::Level::Info,
            crate::diagnostics::Subsystem::$subsystem,
            format_args!($($arg)*),
        )
    };
}

macro_rules! core_warn {
    ($subsystem:ident, $($arg:tt)*) => {
        crate::diagnostics::emit(
            crate::diagnostics::Level::Warn,
            crate::diagnostics::Subsystem::$subsystem,
            format_args!($($arg)*),
        )
    };
}

/// Audio Processing Unit (APU) emulation.
pub mod apu;

/// Sample queue between the APU and the host audio callback.
pub mod audio_queue;

/// Console models (NTSC/PAL) and their clock rates.
pub mod model;
