//! Pulse (square) channels 1 and 2.

use super::envelope::Envelope;
use super::length_counter::LengthCounter;
use super::mixer::{ChannelId, Mixer};
use super::state::PulseState;
use super::tables::DUTY_TABLE;

/// Duty-cycle square generator with envelope, sweep and length counter.
///
/// The two pulse channels differ in exactly one way: the sweep unit's
/// negation. Channel 1 subtracts in ones' complement (`period - delta - 1`),
/// channel 2 in two's complement (`period - delta`). The channel identity is
/// fixed at construction.
pub struct Pulse {
    id: ChannelId,
    duty: u8,
    duty_pos: u8,
    /// 11-bit period from $4002/$4003 (and sweep write-back).
    real_period: u16,
    /// Timer reload value. The duty sequencer steps every `period + 1` CPU
    /// cycles; the pulse timer runs in APU cycles (2 CPU cycles), so this is
    /// `real_period * 2 + 1`.
    period: u16,
    timer: u16,
    cycle: u32,
    last_output: i8,
    pub(super) length: LengthCounter,
    pub(super) envelope: Envelope,
    sweep_enabled: bool,
    sweep_negate: bool,
    sweep_shift: u8,
    /// Divider reload (register field + 1).
    sweep_period: u8,
    sweep_divider: u8,
    sweep_reload: bool,
    sweep_target: u32,
}

impl Pulse {
    pub fn new(id: ChannelId) -> Self {
        debug_assert!(matches!(id, ChannelId::Pulse1 | ChannelId::Pulse2));
        Pulse {
            id,
            duty: 0,
            duty_pos: 0,
            real_period: 0,
            period: 1,
            timer: 0,
            cycle: 0,
            last_output: 0,
            length: LengthCounter::default(),
            envelope: Envelope::default(),
            sweep_enabled: false,
            sweep_negate: false,
            sweep_shift: 0,
            sweep_period: 0,
            sweep_divider: 0,
            sweep_reload: false,
            sweep_target: 0,
        }
    }

    /// $4000/$4004: duty, length halt, envelope.
    pub fn write_control(&mut self, value: u8) {
        self.duty = (value >> 6) & 0x03;
        self.length.write_halt(value & 0x20 != 0);
        self.envelope.write_control(value);
    }

    /// $4001/$4005: sweep setup.
    pub fn write_sweep(&mut self, value: u8) {
        self.sweep_enabled = value & 0x80 != 0;
        self.sweep_period = ((value >> 4) & 0x07) + 1;
        self.sweep_negate = value & 0x08 != 0;
        self.sweep_shift = value & 0x07;
        self.sweep_reload = true;
        self.update_sweep_target();
    }

    /// $4002/$4006: period low bits.
    pub fn write_period_low(&mut self, value: u8) {
        self.set_real_period((self.real_period & 0x0700) | value as u16);
    }

    /// $4003/$4007: period high bits, length load; restarts the sequencer
    /// and the envelope.
    pub fn write_period_high(&mut self, value: u8) {
        self.set_real_period((self.real_period & 0x00FF) | (((value & 0x07) as u16) << 8));
        self.length.load(value);
        self.duty_pos = 0;
        self.envelope.restart();
    }

    fn set_real_period(&mut self, period: u16) {
        self.real_period = period;
        self.period = self.real_period * 2 + 1;
        self.update_sweep_target();
    }

    fn update_sweep_target(&mut self) {
        let delta = (self.real_period >> self.sweep_shift) as u32;
        self.sweep_target = if self.sweep_negate {
            let target = (self.real_period as u32).wrapping_sub(delta);
            if self.id == ChannelId::Pulse1 {
                // Ones' complement: channel 1 undershoots by one.
                target.wrapping_sub(1)
            } else {
                target
            }
        } else {
            self.real_period as u32 + delta
        };
    }

    /// The sweep mutes the channel on out-of-range periods. An underflowing
    /// negated target wraps far above $7FF and is caught by the write-back
    /// guard, not by muting.
    fn is_muted(&self) -> bool {
        self.real_period < 8 || (!self.sweep_negate && self.sweep_target > 0x7FF)
    }

    /// Half-frame tick.
    pub fn tick_sweep(&mut self) {
        self.sweep_divider = self.sweep_divider.wrapping_sub(1);
        if self.sweep_divider == 0 {
            if self.sweep_shift > 0
                && self.sweep_enabled
                && self.real_period >= 8
                && self.sweep_target <= 0x7FF
            {
                self.set_real_period(self.sweep_target as u16);
            }
            self.sweep_divider = self.sweep_period;
        }
        if self.sweep_reload {
            self.sweep_divider = self.sweep_period;
            self.sweep_reload = false;
        }
    }

    fn output(&self) -> i8 {
        if self.is_muted() || !self.length.status() {
            return 0;
        }
        if DUTY_TABLE[self.duty as usize][self.duty_pos as usize] == 0 {
            return 0;
        }
        self.envelope.volume() as i8
    }

    /// Post the current output if it changed since the last posting. The
    /// gate is combinational: enable/length/envelope changes take effect
    /// between sequencer steps.
    pub fn update_output(&mut self, mixer: &mut Mixer) {
        let output = self.output();
        if output != self.last_output {
            mixer.add_delta(self.id, self.cycle, (output - self.last_output) as i16);
            self.last_output = output;
        }
    }

    /// Advance to `to_cycle`, stepping the duty sequencer on timer expiry.
    pub fn run(&mut self, to_cycle: u32, mixer: &mut Mixer) {
        while self.cycle < to_cycle {
            let remaining = to_cycle - self.cycle;
            if remaining > self.timer as u32 {
                self.cycle += self.timer as u32 + 1;
                self.timer = self.period;
                self.duty_pos = (self.duty_pos + 1) & 0x07;
                self.update_output(mixer);
            } else {
                self.timer -= remaining as u16;
                self.cycle = to_cycle;
            }
        }
        self.update_output(mixer);
    }

    pub fn set_enabled(&mut self, enabled: bool, mixer: &mut Mixer) {
        self.length.set_enabled(enabled);
        self.update_output(mixer);
    }

    pub fn end_frame(&mut self) {
        self.cycle = 0;
    }

    pub fn reset(&mut self, _soft: bool) {
        let id = self.id;
        *self = Pulse::new(id);
    }

    #[inline]
    pub fn real_period(&self) -> u16 {
        self.real_period
    }

    #[inline]
    pub fn duty_pos(&self) -> u8 {
        self.duty_pos
    }

    pub(super) fn state(&self) -> PulseState {
        PulseState {
            duty: self.duty,
            duty_pos: self.duty_pos,
            real_period: self.real_period,
            timer: self.timer,
            cycle: self.cycle,
            last_output: self.last_output,
            length: self.length.state(),
            envelope: self.envelope.state(),
            sweep_enabled: self.sweep_enabled,
            sweep_negate: self.sweep_negate,
            sweep_shift: self.sweep_shift,
            sweep_period: self.sweep_period,
            sweep_divider: self.sweep_divider,
            sweep_reload: self.sweep_reload,
        }
    }

    pub(super) fn restore(&mut self, state: &PulseState) {
        self.duty = state.duty;
        self.duty_pos = state.duty_pos;
        self.timer = state.timer;
        self.cycle = state.cycle;
        self.last_output = state.last_output;
        self.length.restore(&state.length);
        self.envelope.restore(&state.envelope);
        self.sweep_enabled = state.sweep_enabled;
        self.sweep_negate = state.sweep_negate;
        self.sweep_shift = state.sweep_shift;
        self.sweep_period = state.sweep_period;
        self.sweep_divider = state.sweep_divider;
        self.sweep_reload = state.sweep_reload;
        self.set_real_period(state.real_period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConsoleModel;

    fn pulse_with_period(id: ChannelId, period: u16) -> Pulse {
        let mut pulse = Pulse::new(id);
        pulse.write_period_low((period & 0xFF) as u8);
        pulse.write_period_high((period >> 8) as u8);
        pulse
    }

    #[test]
    fn sweep_negate_complements_differ_by_one() {
        let mut p1 = pulse_with_period(ChannelId::Pulse1, 0x200);
        let mut p2 = pulse_with_period(ChannelId::Pulse2, 0x200);
        // negate, shift 1, divider field 0
        p1.write_sweep(0x89);
        p2.write_sweep(0x89);
        // First tick consumes the reload, second applies the target.
        p1.tick_sweep();
        p1.tick_sweep();
        p2.tick_sweep();
        p2.tick_sweep();
        assert_eq!(p1.real_period(), 0x0FF);
        assert_eq!(p2.real_period(), 0x100);
    }

    #[test]
    fn sweep_target_overflow_mutes() {
        let mut pulse = pulse_with_period(ChannelId::Pulse2, 0x700);
        pulse.write_sweep(0x01); // shift 1, no negate
        assert!(pulse.is_muted());
    }

    #[test]
    fn low_period_mutes() {
        let pulse = pulse_with_period(ChannelId::Pulse1, 0x007);
        assert!(pulse.is_muted());
        let pulse = pulse_with_period(ChannelId::Pulse1, 0x008);
        assert!(!pulse.is_muted());
    }

    #[test]
    fn sequencer_spacing_is_two_cpu_cycles_per_period_step() {
        let mut mixer = Mixer::new(ConsoleModel::Ntsc);
        let mut pulse = pulse_with_period(ChannelId::Pulse1, 0x0FD);
        // Timer starts empty: the first step lands after one cycle, then
        // every 2 * (period + 1) cycles.
        pulse.run(1, &mut mixer);
        assert_eq!(pulse.duty_pos(), 1);
        pulse.run(1 + 508, &mut mixer);
        assert_eq!(pulse.duty_pos(), 2);
        pulse.run(1 + 508 * 2, &mut mixer);
        assert_eq!(pulse.duty_pos(), 3);
    }
}
