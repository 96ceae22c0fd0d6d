//! Length counter shared by the pulse, triangle and noise channels.

use super::tables::LENGTH_TABLE;

/// Gating down-counter clocked on half-frame ticks.
///
/// Writes to the halt flag and to the counter itself latch until the end of
/// the write cycle and are applied by [`LengthCounter::reload`]. A latched
/// counter load is discarded when the counter was clocked away from the value
/// it held at write time, which reproduces the write-versus-clock collision
/// of the hardware.
#[derive(Default)]
pub struct LengthCounter {
    enabled: bool,
    halt: bool,
    counter: u8,
    pending_halt: Option<bool>,
    pending_load: Option<u8>,
    value_at_load: u8,
}

impl LengthCounter {
    /// Latch the halt flag from a control register write.
    pub fn write_halt(&mut self, halt: bool) {
        self.pending_halt = Some(halt);
    }

    /// Latch a counter load from the high 5 bits of a length register write.
    /// Ignored while the channel is disabled.
    pub fn load(&mut self, value: u8) {
        if self.enabled {
            self.pending_load = Some(LENGTH_TABLE[(value >> 3) as usize]);
            self.value_at_load = self.counter;
        }
    }

    /// Apply latched writes. Called once the APU has drained up to the cycle
    /// following the write.
    pub fn reload(&mut self) {
        if let Some(halt) = self.pending_halt.take() {
            self.halt = halt;
        }
        if let Some(load) = self.pending_load.take() {
            if self.counter == self.value_at_load {
                self.counter = load;
            }
        }
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending_halt.is_some() || self.pending_load.is_some()
    }

    /// Half-frame tick. Saturates at zero.
    pub fn tick(&mut self) {
        if self.counter > 0 && !self.halt {
            self.counter -= 1;
        }
    }

    /// $4015 enable bit. Disabling forces the counter to zero and holds it
    /// there until re-enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.counter = 0;
        }
    }

    /// True while the counter gates the channel open.
    #[inline]
    pub fn status(&self) -> bool {
        self.counter > 0
    }

    #[inline]
    pub fn counter(&self) -> u8 {
        self.counter
    }

    pub(crate) fn state(&self) -> super::state::LengthCounterState {
        super::state::LengthCounterState {
            enabled: self.enabled,
            halt: self.halt,
            counter: self.counter,
        }
    }

    pub(crate) fn restore(&mut self, state: &super::state::LengthCounterState) {
        self.enabled = state.enabled;
        self.halt = state.halt;
        self.counter = state.counter;
        self.pending_halt = None;
        self.pending_load = None;
        self.value_at_load = 0;
    }
}
