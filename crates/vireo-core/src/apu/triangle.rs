//! Triangle channel.

use super::length_counter::LengthCounter;
use super::mixer::{ChannelId, Mixer};
use super::state::TriangleState;
use super::tables::TRIANGLE_SEQUENCE;

/// 32-step triangle generator gated by the length counter and a linear
/// counter.
///
/// The sequencer only advances while both counters are non-zero; when gated
/// off the channel holds its last amplitude rather than stepping to zero.
/// Periods below 2 are not muted: the sequencer toggles at an ultrasonic rate
/// and the resulting aliasing buzz is an intentional fidelity quirk.
pub struct Triangle {
    /// Timer reload; the sequencer steps every `period + 1` CPU cycles.
    period: u16,
    timer: u16,
    step: u8,
    cycle: u32,
    last_output: i8,
    pub(super) length: LengthCounter,
    linear_counter: u8,
    linear_reload_value: u8,
    linear_reload: bool,
    /// $4008 bit 7: halts the length counter and keeps the reload flag set.
    control: bool,
}

impl Triangle {
    pub fn new() -> Self {
        Triangle {
            period: 0,
            timer: 0,
            step: 0,
            cycle: 0,
            last_output: 0,
            length: LengthCounter::default(),
            linear_counter: 0,
            linear_reload_value: 0,
            linear_reload: false,
            control: false,
        }
    }

    /// $4008: control flag and linear counter reload value.
    pub fn write_linear_control(&mut self, value: u8) {
        self.control = value & 0x80 != 0;
        self.linear_reload_value = value & 0x7F;
        self.length.write_halt(self.control);
    }

    /// $400A: period low bits.
    pub fn write_period_low(&mut self, value: u8) {
        self.period = (self.period & 0x0700) | value as u16;
    }

    /// $400B: period high bits, length load; flags the linear counter for
    /// reload.
    pub fn write_period_high(&mut self, value: u8) {
        self.period = (self.period & 0x00FF) | (((value & 0x07) as u16) << 8);
        self.length.load(value);
        self.linear_reload = true;
    }

    /// Quarter-frame tick.
    pub fn tick_linear_counter(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    pub fn run(&mut self, to_cycle: u32, mixer: &mut Mixer) {
        while self.cycle < to_cycle {
            let remaining = to_cycle - self.cycle;
            if remaining > self.timer as u32 {
                self.cycle += self.timer as u32 + 1;
                self.timer = self.period;
                if self.length.status() && self.linear_counter > 0 {
                    self.step = (self.step + 1) & 0x1F;
                    let output = TRIANGLE_SEQUENCE[self.step as usize] as i8;
                    if output != self.last_output {
                        mixer.add_delta(
                            ChannelId::Triangle,
                            self.cycle,
                            (output - self.last_output) as i16,
                        );
                        self.last_output = output;
                    }
                }
            } else {
                self.timer -= remaining as u16;
                self.cycle = to_cycle;
            }
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    pub fn end_frame(&mut self) {
        self.cycle = 0;
    }

    pub fn reset(&mut self, _soft: bool) {
        *self = Triangle::new();
    }

    #[inline]
    pub fn linear_counter(&self) -> u8 {
        self.linear_counter
    }

    #[inline]
    pub fn step(&self) -> u8 {
        self.step
    }

    #[inline]
    pub fn period(&self) -> u16 {
        self.period
    }

    pub(super) fn state(&self) -> TriangleState {
        TriangleState {
            period: self.period,
            timer: self.timer,
            step: self.step,
            cycle: self.cycle,
            last_output: self.last_output,
            length: self.length.state(),
            linear_counter: self.linear_counter,
            linear_reload_value: self.linear_reload_value,
            linear_reload: self.linear_reload,
            control: self.control,
        }
    }

    pub(super) fn restore(&mut self, state: &TriangleState) {
        self.period = state.period;
        self.timer = state.timer;
        self.step = state.step;
        self.cycle = state.cycle;
        self.last_output = state.last_output;
        self.length.restore(&state.length);
        self.linear_counter = state.linear_counter;
        self.linear_reload_value = state.linear_reload_value;
        self.linear_reload = state.linear_reload;
        self.control = state.control;
    }
}
