//! Delta modulation channel (DMC).

use super::mixer::{ChannelId, Mixer};
use super::state::DmcState;
use super::tables::dmc_period;
use super::{IrqLine, IrqSource, SampleBus};
use crate::model::ConsoleModel;

/// Number of CPU cycles a sample fetch steals from the CPU.
pub const FETCH_STALL_CYCLES: u32 = 4;

/// DPCM playback from CPU-addressable sample memory.
///
/// The shifter consumes one bit per rate-table clock, nudging the 7-bit
/// output level up or down by two. When the shifter empties it refills
/// straight from the
/// sample bus, which stalls the CPU; the stall cycles accumulate in the
/// owner. Exhausting the sample either loops it or raises the DMC IRQ.
pub struct Dmc {
    irq_enabled: bool,
    loop_flag: bool,
    rate_index: u8,
    /// Timer reload (`rate table - 1`; clocks land every table-entry cycles).
    period: u16,
    timer: u16,
    output_level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
    cycle: u32,
    last_output: i8,
}

impl Dmc {
    pub fn new(model: ConsoleModel) -> Self {
        Dmc {
            irq_enabled: false,
            loop_flag: false,
            rate_index: 0,
            period: dmc_period(model, 0) - 1,
            timer: 0,
            output_level: 0,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0,
            bytes_remaining: 0,
            shift_register: 0,
            bits_remaining: 8,
            silence: true,
            cycle: 0,
            last_output: 0,
        }
    }

    /// $4010: IRQ enable, loop flag, rate index. Clearing the IRQ enable bit
    /// acknowledges a pending DMC IRQ.
    pub fn write_rate(&mut self, value: u8, model: ConsoleModel, irq: &mut IrqLine) {
        self.irq_enabled = value & 0x80 != 0;
        if !self.irq_enabled {
            irq.acknowledge(IrqSource::Dmc);
        }
        self.loop_flag = value & 0x40 != 0;
        self.rate_index = value & 0x0F;
        self.period = dmc_period(model, self.rate_index) - 1;
    }

    /// $4011: direct output level load. Audible immediately; games use this
    /// for raw PCM playback.
    pub fn write_direct_load(&mut self, value: u8, mixer: &mut Mixer) {
        self.output_level = value & 0x7F;
        self.update_output(mixer);
    }

    /// $4012: sample start address.
    pub fn write_sample_address(&mut self, value: u8) {
        self.sample_address = 0xC000 | ((value as u16) << 6);
    }

    /// $4013: sample length in bytes.
    pub fn write_sample_length(&mut self, value: u8) {
        self.sample_length = ((value as u16) << 4) | 1;
    }

    fn restart_sample(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    /// $4015 bit 4. Disabling drops the remaining bytes; enabling with an
    /// exhausted sample restarts it from the top.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart_sample();
        }
    }

    pub fn set_model(&mut self, model: ConsoleModel) {
        self.period = dmc_period(model, self.rate_index) - 1;
    }

    fn update_output(&mut self, mixer: &mut Mixer) {
        let output = self.output_level as i8;
        if output != self.last_output {
            mixer.add_delta(ChannelId::Dmc, self.cycle, (output - self.last_output) as i16);
            self.last_output = output;
        }
    }

    /// One rate-table clock. Returns the CPU stall cycles a fetch incurred.
    fn clock(&mut self, mixer: &mut Mixer, bus: &mut dyn SampleBus, irq: &mut IrqLine) -> u32 {
        let mut stall = 0;
        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
        }
        self.shift_register >>= 1;
        self.bits_remaining -= 1;

        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            if self.bytes_remaining > 0 {
                self.shift_register = bus.read_sample(self.current_address);
                stall += FETCH_STALL_CYCLES;
                self.silence = false;
                self.current_address = if self.current_address == 0xFFFF {
                    0x8000
                } else {
                    self.current_address + 1
                };
                self.bytes_remaining -= 1;
                if self.bytes_remaining == 0 {
                    if self.loop_flag {
                        self.restart_sample();
                    } else if self.irq_enabled {
                        irq.raise(IrqSource::Dmc);
                    }
                }
            } else {
                self.silence = true;
            }
        }

        self.update_output(mixer);
        stall
    }

    /// Advance to `to_cycle`. Returns accumulated CPU stall cycles.
    pub fn run(
        &mut self,
        to_cycle: u32,
        mixer: &mut Mixer,
        bus: &mut dyn SampleBus,
        irq: &mut IrqLine,
    ) -> u32 {
        let mut stall = 0;
        while self.cycle < to_cycle {
            let remaining = to_cycle - self.cycle;
            if remaining > self.timer as u32 {
                self.cycle += self.timer as u32 + 1;
                self.timer = self.period;
                stall += self.clock(mixer, bus, irq);
            } else {
                self.timer -= remaining as u16;
                self.cycle = to_cycle;
            }
        }
        stall
    }

    /// True when the DMC IRQ would fire within `within` cycles, so the owner
    /// can stop deferring work.
    ///
    /// The IRQ is raised by the clock that fetches the final sample byte:
    /// `bits_left` clocks from now, the first of which lands when the
    /// in-flight timer expires.
    pub fn irq_pending(&self, within: u32) -> bool {
        if !self.irq_enabled || self.loop_flag || self.bytes_remaining == 0 {
            return false;
        }
        let bits_left = self.bits_remaining as u32 + (self.bytes_remaining as u32 - 1) * 8;
        let cycles_to_irq = self.timer as u32 + 1 + (bits_left - 1) * (self.period as u32 + 1);
        within >= cycles_to_irq
    }

    pub fn has_bytes_remaining(&self) -> bool {
        self.bytes_remaining > 0
    }

    pub fn end_frame(&mut self) {
        self.cycle = 0;
    }

    pub fn reset(&mut self, soft: bool, model: ConsoleModel) {
        // The output level survives a soft reset; games rely on the DAC not
        // popping back to zero.
        let output_level = if soft { self.output_level } else { 0 };
        let last_output = if soft { self.last_output } else { 0 };
        *self = Dmc::new(model);
        self.output_level = output_level;
        self.last_output = last_output;
    }

    #[inline]
    pub fn bytes_remaining(&self) -> u16 {
        self.bytes_remaining
    }

    #[inline]
    pub fn output_level(&self) -> u8 {
        self.output_level
    }

    pub(super) fn state(&self) -> DmcState {
        DmcState {
            irq_enabled: self.irq_enabled,
            loop_flag: self.loop_flag,
            rate_index: self.rate_index,
            timer: self.timer,
            output_level: self.output_level,
            sample_address: self.sample_address,
            sample_length: self.sample_length,
            current_address: self.current_address,
            bytes_remaining: self.bytes_remaining,
            shift_register: self.shift_register,
            bits_remaining: self.bits_remaining,
            silence: self.silence,
            cycle: self.cycle,
            last_output: self.last_output,
        }
    }

    pub(super) fn restore(&mut self, state: &DmcState, model: ConsoleModel) {
        self.irq_enabled = state.irq_enabled;
        self.loop_flag = state.loop_flag;
        self.rate_index = state.rate_index;
        self.period = dmc_period(model, self.rate_index) - 1;
        self.timer = state.timer;
        self.output_level = state.output_level;
        self.sample_address = state.sample_address;
        self.sample_length = state.sample_length;
        self.current_address = state.current_address;
        self.bytes_remaining = state.bytes_remaining;
        self.shift_register = state.shift_register;
        self.bits_remaining = state.bits_remaining;
        self.silence = state.silence;
        self.cycle = state.cycle;
        self.last_output = state.last_output;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatBus(u8);

    impl SampleBus for FlatBus {
        fn read_sample(&mut self, _addr: u16) -> u8 {
            self.0
        }
    }

    #[test]
    fn level_adjusts_by_two_and_saturates() {
        let mut mixer = Mixer::new(ConsoleModel::Ntsc);
        let mut irq = IrqLine::default();
        let mut bus = FlatBus(0xFF); // all 1 bits: level climbs
        let mut dmc = Dmc::new(ConsoleModel::Ntsc);
        dmc.write_rate(0x4F, ConsoleModel::Ntsc, &mut irq); // loop, fastest
        dmc.write_sample_length(0x10);
        dmc.set_enabled(true);
        let mut cycle = 0;
        for _ in 0..2_000 {
            cycle += 54;
            dmc.run(cycle, &mut mixer, &mut bus, &mut irq);
        }
        assert_eq!(dmc.output_level(), 126);
    }

    #[test]
    fn address_wraps_to_8000() {
        let mut mixer = Mixer::new(ConsoleModel::Ntsc);
        let mut irq = IrqLine::default();
        let mut bus = FlatBus(0);
        let mut dmc = Dmc::new(ConsoleModel::Ntsc);
        dmc.write_rate(0x4F, ConsoleModel::Ntsc, &mut irq);
        dmc.write_sample_address(0xFF); // $FFC0
        dmc.write_sample_length(0x10); // 257 bytes
        dmc.set_enabled(true);
        // 65 fetches cover $FFC0..=$FFFF and wrap into $8000.
        dmc.run(54 * 8 * 70, &mut mixer, &mut bus, &mut irq);
        assert!((0x8000..0x9000).contains(&dmc.current_address));
    }

    #[test]
    fn fetch_stalls_four_cycles() {
        let mut mixer = Mixer::new(ConsoleModel::Ntsc);
        let mut irq = IrqLine::default();
        let mut bus = FlatBus(0);
        let mut dmc = Dmc::new(ConsoleModel::Ntsc);
        dmc.write_rate(0x00, ConsoleModel::Ntsc, &mut irq); // slowest, 428
        dmc.write_sample_length(0x00); // 1 byte
        dmc.set_enabled(true);
        // First refill happens on the 8th clock.
        let stall = dmc.run(428 * 8, &mut mixer, &mut bus, &mut irq);
        assert_eq!(stall, FETCH_STALL_CYCLES);
    }
}
