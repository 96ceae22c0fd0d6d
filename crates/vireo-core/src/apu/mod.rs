//! Audio Processing Unit (APU) emulation.
//!
//! The 2A03's five channels (two pulse, triangle, noise, DMC), the frame
//! counter, and the CPU-visible register file at $4000-$4017.
//!
//! ## Timing
//!
//! The CPU drives [`Apu::step`] once per CPU cycle. Work is deferred: the
//! channels are only caught up (`run`) when something observable demands it,
//! meaning a register access, an IRQ about to fire, a latched length-counter
//! write, or the end of the 10000-cycle output frame. `previous_cycle` is the
//! watermark the channels have been advanced to; after any register access it
//! equals `current_cycle`, so CPU-visible reads match on-the-wire timing.
//!
//! ## Output
//!
//! Channels post amplitude deltas to the owner-held [`mixer::Mixer`]; at the
//! frame boundary the mixer's PCM lands in the [`crate::audio_queue`] handed
//! out by [`Apu::enable_output`].

pub mod dmc;
pub mod envelope;
pub mod frame_counter;
pub mod length_counter;
pub mod mixer;
pub mod noise;
pub mod pulse;
pub mod state;
pub mod tables;
pub mod triangle;

use serde::{Deserialize, Serialize};

use crate::audio_queue::{AudioConsumer, AudioProducer, audio_queue};
use crate::model::ConsoleModel;
use dmc::Dmc;
use frame_counter::{FrameCounter, FrameEvent};
use mixer::{ChannelId, Mixer};
use noise::Noise;
use pulse::Pulse;
use state::ApuState;
use triangle::Triangle;

/// APU register addresses.
pub mod regs {
    // Pulse 1 ($4000-$4003)
    pub const PULSE1_CTRL: u16 = 0x4000;
    pub const PULSE1_SWEEP: u16 = 0x4001;
    pub const PULSE1_TIMER_LO: u16 = 0x4002;
    pub const PULSE1_TIMER_HI: u16 = 0x4003;

    // Pulse 2 ($4004-$4007)
    pub const PULSE2_CTRL: u16 = 0x4004;
    pub const PULSE2_SWEEP: u16 = 0x4005;
    pub const PULSE2_TIMER_LO: u16 = 0x4006;
    pub const PULSE2_TIMER_HI: u16 = 0x4007;

    // Triangle ($4008-$400B; $4009 is unmapped)
    pub const TRI_LINEAR: u16 = 0x4008;
    pub const TRI_TIMER_LO: u16 = 0x400A;
    pub const TRI_TIMER_HI: u16 = 0x400B;

    // Noise ($400C-$400F; $400D is unmapped)
    pub const NOISE_CTRL: u16 = 0x400C;
    pub const NOISE_MODE: u16 = 0x400E;
    pub const NOISE_LENGTH: u16 = 0x400F;

    // DMC ($4010-$4013)
    pub const DMC_RATE: u16 = 0x4010;
    pub const DMC_DIRECT_LOAD: u16 = 0x4011;
    pub const DMC_SAMPLE_ADDR: u16 = 0x4012;
    pub const DMC_SAMPLE_LEN: u16 = 0x4013;

    // Control/status
    pub const STATUS: u16 = 0x4015;
    pub const FRAME_COUNTER: u16 = 0x4017;
}

/// CPU cycles per output frame (the flush budget, not a video frame).
pub const FRAME_CYCLE_LIMIT: u32 = 10_000;

/// Sample-queue depth handed to the host, in milliseconds of audio.
pub const AUDIO_LATENCY_MS: u32 = 40;

/// CPU address space access for DMC sample fetches.
pub trait SampleBus {
    fn read_sample(&mut self, addr: u16) -> u8;
}

/// Latched interrupt sources sharing the CPU IRQ line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqSource {
    FrameCounter,
    Dmc,
}

/// The APU's two IRQ latches, ORed onto the CPU IRQ line. Each source is
/// cleared only by its owning register semantics ($4015 reads, $4017/$4010
/// writes), never by the CPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrqLine {
    frame_counter: bool,
    dmc: bool,
}

impl IrqLine {
    pub fn raise(&mut self, source: IrqSource) {
        match source {
            IrqSource::FrameCounter => self.frame_counter = true,
            IrqSource::Dmc => self.dmc = true,
        }
    }

    pub fn acknowledge(&mut self, source: IrqSource) {
        match source {
            IrqSource::FrameCounter => self.frame_counter = false,
            IrqSource::Dmc => self.dmc = false,
        }
    }

    #[inline]
    pub fn is_raised(&self, source: IrqSource) -> bool {
        match source {
            IrqSource::FrameCounter => self.frame_counter,
            IrqSource::Dmc => self.dmc,
        }
    }

    #[inline]
    pub fn asserted(&self) -> bool {
        self.frame_counter || self.dmc
    }
}

/// The APU controller: owns the channels, the frame counter and the mixer,
/// and decodes the CPU-visible register file.
pub struct Apu {
    model: ConsoleModel,
    current_cycle: u32,
    previous_cycle: u32,
    irq: IrqLine,
    stall_cycles: u32,
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_counter: FrameCounter,
    mixer: Mixer,
    output: Option<AudioProducer>,
}

impl Apu {
    pub fn new() -> Self {
        Self::with_model(ConsoleModel::Ntsc)
    }

    pub fn with_model(model: ConsoleModel) -> Self {
        Apu {
            model,
            current_cycle: 0,
            previous_cycle: 0,
            irq: IrqLine::default(),
            stall_cycles: 0,
            pulse1: Pulse::new(ChannelId::Pulse1),
            pulse2: Pulse::new(ChannelId::Pulse2),
            triangle: Triangle::new(),
            noise: Noise::new(model),
            dmc: Dmc::new(model),
            frame_counter: FrameCounter::new(model),
            mixer: Mixer::new(model),
            output: None,
        }
    }

    /// Configure the output sample rate and hand back the consuming end of
    /// the sample queue. Until this is called the APU runs silently.
    pub fn enable_output(&mut self, sample_rate: u32) -> AudioConsumer {
        self.mixer.set_sample_rate(self.model, sample_rate);
        let capacity = (sample_rate as usize * AUDIO_LATENCY_MS as usize) / 1000;
        let (producer, consumer) = audio_queue(capacity);
        self.output = Some(producer);
        consumer
    }

    /// Advance by exactly one CPU cycle. Flushes an audio frame when the
    /// cycle budget is reached; otherwise defers work unless something
    /// observable is due.
    pub fn step(&mut self, bus: &mut dyn SampleBus) {
        self.current_cycle += 1;
        if self.current_cycle == FRAME_CYCLE_LIMIT {
            self.flush_frame(bus);
        } else if self.need_to_run() {
            self.run(bus);
        }
    }

    fn need_to_run(&self) -> bool {
        if self.frame_counter.has_pending_write()
            || self.pulse1.length.has_pending_write()
            || self.pulse2.length.has_pending_write()
            || self.triangle.length.has_pending_write()
            || self.noise.length.has_pending_write()
        {
            return true;
        }
        let window = self.current_cycle - self.previous_cycle;
        self.frame_counter.irq_pending(window) || self.dmc.irq_pending(window)
    }

    /// Catch the frame counter and every channel up to `current_cycle`.
    ///
    /// Channels advance in a fixed order (pulse1, pulse2, noise, triangle,
    /// DMC) for determinism. Sequencer events land exactly on their cycle:
    /// the frame counter stops at each event boundary, the channels are
    /// caught up to it, and only then are the event's clocks applied, so the
    /// resulting amplitude changes are stamped with the event cycle.
    pub fn run(&mut self, bus: &mut dyn SampleBus) {
        debug_assert!(self.previous_cycle <= self.current_cycle);
        // Latched length-counter writes from the previous cycle apply first.
        self.pulse1.length.reload();
        self.pulse2.length.reload();
        self.triangle.length.reload();
        self.noise.length.reload();

        while self.previous_cycle < self.current_cycle {
            let remaining = self.current_cycle - self.previous_cycle;
            let (ran, event) = self.frame_counter.run(remaining, &mut self.irq);
            self.previous_cycle += ran;

            self.pulse1.run(self.previous_cycle, &mut self.mixer);
            self.pulse2.run(self.previous_cycle, &mut self.mixer);
            self.noise.run(self.previous_cycle, &mut self.mixer);
            self.triangle.run(self.previous_cycle, &mut self.mixer);
            self.stall_cycles +=
                self.dmc
                    .run(self.previous_cycle, &mut self.mixer, bus, &mut self.irq);

            if let Some(kind) = event {
                self.clock_quarter_frame();
                if kind == FrameEvent::Half {
                    self.clock_half_frame();
                }
                // Gating is combinational: post the new levels at the event
                // cycle.
                self.pulse1.update_output(&mut self.mixer);
                self.pulse2.update_output(&mut self.mixer);
                self.noise.update_output(&mut self.mixer);
            }
        }
    }

    fn clock_quarter_frame(&mut self) {
        self.pulse1.envelope.tick();
        self.pulse2.envelope.tick();
        self.noise.envelope.tick();
        self.triangle.tick_linear_counter();
    }

    fn clock_half_frame(&mut self) {
        self.pulse1.length.tick();
        self.pulse2.length.tick();
        self.triangle.length.tick();
        self.noise.length.tick();
        self.pulse1.tick_sweep();
        self.pulse2.tick_sweep();
    }

    fn flush_frame(&mut self, bus: &mut dyn SampleBus) {
        self.run(bus);
        self.pulse1.end_frame();
        self.pulse2.end_frame();
        self.triangle.end_frame();
        self.noise.end_frame();
        self.dmc.end_frame();

        let budget = (self.mixer.sample_rate() / self.model.frame_rate()) as usize;
        let samples = self.mixer.end_frame(self.current_cycle);
        if let Some(output) = &self.output {
            let mut dropped = 0usize;
            for &sample in samples.iter().take(budget) {
                // A saturated host sink drops samples rather than
                // backpressuring the CPU.
                if !output.push(sample) {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                core_warn!(Mixer, "host sink saturated, dropped {dropped} samples");
            }
        }

        self.current_cycle = 0;
        self.previous_cycle = 0;
    }

    /// Read an APU register. Only $4015 is readable; other addresses in the
    /// region float to open bus, which the memory map supplies.
    pub fn read_register(&mut self, addr: u16, bus: &mut dyn SampleBus) -> Option<u8> {
        if addr != regs::STATUS {
            core_trace!(Registers, "open-bus read ${addr:04X}");
            return None;
        }
        self.run(bus);

        let mut status = 0u8;
        if self.pulse1.length.status() {
            status |= 0x01;
        }
        if self.pulse2.length.status() {
            status |= 0x02;
        }
        if self.triangle.length.status() {
            status |= 0x04;
        }
        if self.noise.length.status() {
            status |= 0x08;
        }
        if self.dmc.has_bytes_remaining() {
            status |= 0x10;
        }
        if self.irq.is_raised(IrqSource::FrameCounter) {
            status |= 0x40;
        }
        if self.irq.is_raised(IrqSource::Dmc) {
            status |= 0x80;
        }

        // Reading $4015 acknowledges the frame IRQ, and only that one.
        self.irq.acknowledge(IrqSource::FrameCounter);
        Some(status)
    }

    /// Write an APU register. The APU is drained to the current cycle before
    /// the write lands.
    pub fn write_register(&mut self, addr: u16, value: u8, bus: &mut dyn SampleBus) {
        self.run(bus);
        match addr {
            regs::PULSE1_CTRL => {
                self.pulse1.write_control(value);
                self.pulse1.update_output(&mut self.mixer);
            }
            regs::PULSE1_SWEEP => {
                self.pulse1.write_sweep(value);
                self.pulse1.update_output(&mut self.mixer);
            }
            regs::PULSE1_TIMER_LO => {
                self.pulse1.write_period_low(value);
                self.pulse1.update_output(&mut self.mixer);
            }
            regs::PULSE1_TIMER_HI => {
                self.pulse1.write_period_high(value);
                self.pulse1.update_output(&mut self.mixer);
            }
            regs::PULSE2_CTRL => {
                self.pulse2.write_control(value);
                self.pulse2.update_output(&mut self.mixer);
            }
            regs::PULSE2_SWEEP => {
                self.pulse2.write_sweep(value);
                self.pulse2.update_output(&mut self.mixer);
            }
            regs::PULSE2_TIMER_LO => {
                self.pulse2.write_period_low(value);
                self.pulse2.update_output(&mut self.mixer);
            }
            regs::PULSE2_TIMER_HI => {
                self.pulse2.write_period_high(value);
                self.pulse2.update_output(&mut self.mixer);
            }
            regs::TRI_LINEAR => self.triangle.write_linear_control(value),
            regs::TRI_TIMER_LO => self.triangle.write_period_low(value),
            regs::TRI_TIMER_HI => self.triangle.write_period_high(value),
            regs::NOISE_CTRL => {
                self.noise.write_control(value);
                self.noise.update_output(&mut self.mixer);
            }
            regs::NOISE_MODE => self.noise.write_mode(value, self.model),
            regs::NOISE_LENGTH => self.noise.write_length(value),
            regs::DMC_RATE => self.dmc.write_rate(value, self.model, &mut self.irq),
            regs::DMC_DIRECT_LOAD => self.dmc.write_direct_load(value, &mut self.mixer),
            regs::DMC_SAMPLE_ADDR => self.dmc.write_sample_address(value),
            regs::DMC_SAMPLE_LEN => self.dmc.write_sample_length(value),
            regs::STATUS => {
                // The DMC IRQ clears before the enable bits land; re-enabling
                // the DMC can raise it again immediately.
                self.irq.acknowledge(IrqSource::Dmc);
                self.pulse1.set_enabled(value & 0x01 != 0, &mut self.mixer);
                self.pulse2.set_enabled(value & 0x02 != 0, &mut self.mixer);
                self.triangle.set_enabled(value & 0x04 != 0);
                self.noise.set_enabled(value & 0x08 != 0, &mut self.mixer);
                self.dmc.set_enabled(value & 0x10 != 0);
            }
            regs::FRAME_COUNTER => {
                let on_even_cycle = self.current_cycle % 2 == 0;
                self.frame_counter.write(value, on_even_cycle, &mut self.irq);
            }
            _ => {
                core_trace!(Registers, "ignored write ${addr:04X} = ${value:02X}");
            }
        }
    }

    /// Switch console models. Pending work is drained at the old clock rate
    /// first; `force` reconfigures even when the model is unchanged (used
    /// after state loads).
    pub fn set_model(&mut self, model: ConsoleModel, force: bool, bus: &mut dyn SampleBus) {
        if self.model != model || force {
            self.run(bus);
            self.model = model;
            self.mixer.set_clock_rate(model);
            self.noise.set_model(model);
            self.dmc.set_model(model);
            self.frame_counter.set_model(model);
            core_info!(Control, "console model set to {model:?}");
        }
    }

    #[inline]
    pub fn model(&self) -> ConsoleModel {
        self.model
    }

    /// Reset all children and the cycle counters. Soft resets keep the state
    /// each block flags as surviving (DMC output level, last $4017 mode); a
    /// hard reset reinitializes everything. No audio is emitted.
    pub fn reset(&mut self, soft: bool) {
        self.current_cycle = 0;
        self.previous_cycle = 0;
        self.stall_cycles = 0;
        self.irq = IrqLine::default();
        self.pulse1.reset(soft);
        self.pulse2.reset(soft);
        self.triangle.reset(soft);
        self.noise.reset(soft, self.model);
        self.dmc.reset(soft, self.model);
        self.frame_counter.reset(soft);
        self.mixer.reset();
    }

    /// True while either IRQ latch drives the CPU IRQ line.
    #[inline]
    pub fn irq_asserted(&self) -> bool {
        self.irq.asserted()
    }

    #[inline]
    pub fn has_irq_source(&self, source: IrqSource) -> bool {
        self.irq.is_raised(source)
    }

    /// CPU stall cycles accrued by DMC fetches since the last call. The CPU
    /// adds these before its next instruction.
    pub fn take_stall_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.stall_cycles)
    }

    pub fn save_state(&self) -> ApuState {
        ApuState {
            model: self.model,
            current_cycle: self.current_cycle,
            previous_cycle: self.previous_cycle,
            irq: self.irq,
            pulse1: self.pulse1.state(),
            pulse2: self.pulse2.state(),
            triangle: self.triangle.state(),
            noise: self.noise.state(),
            dmc: self.dmc.state(),
            frame_counter: self.frame_counter.state(),
            mixer: state::MixerState {
                level: self.mixer.level(),
                phase: self.mixer.phase(),
            },
        }
    }

    pub fn load_state(&mut self, state: &ApuState, bus: &mut dyn SampleBus) {
        self.current_cycle = state.current_cycle;
        self.previous_cycle = state.previous_cycle.min(state.current_cycle);
        self.irq = state.irq;
        self.stall_cycles = 0;
        self.pulse1.restore(&state.pulse1);
        self.pulse2.restore(&state.pulse2);
        self.triangle.restore(&state.triangle);
        self.noise.restore(&state.noise, state.model);
        self.dmc.restore(&state.dmc, state.model);
        self.frame_counter.restore(&state.frame_counter);
        self.mixer.restore(state.mixer.level, state.mixer.phase);
        self.set_model(state.model, true, bus);
    }

    // Introspection for tests and debug frontends, in register units.

    #[inline]
    pub fn current_cycle(&self) -> u32 {
        self.current_cycle
    }

    #[inline]
    pub fn previous_cycle(&self) -> u32 {
        self.previous_cycle
    }

    #[inline]
    pub fn pulse1_period(&self) -> u16 {
        self.pulse1.real_period()
    }

    #[inline]
    pub fn pulse2_period(&self) -> u16 {
        self.pulse2.real_period()
    }

    #[inline]
    pub fn pulse1_length(&self) -> u8 {
        self.pulse1.length.counter()
    }

    #[inline]
    pub fn pulse2_length(&self) -> u8 {
        self.pulse2.length.counter()
    }

    #[inline]
    pub fn triangle_length(&self) -> u8 {
        self.triangle.length.counter()
    }

    #[inline]
    pub fn triangle_linear_counter(&self) -> u8 {
        self.triangle.linear_counter()
    }

    #[inline]
    pub fn triangle_step(&self) -> u8 {
        self.triangle.step()
    }

    #[inline]
    pub fn noise_length(&self) -> u8 {
        self.noise.length.counter()
    }

    #[inline]
    pub fn noise_lfsr(&self) -> u16 {
        self.noise.shift_register()
    }

    #[inline]
    pub fn dmc_bytes_remaining(&self) -> u16 {
        self.dmc.bytes_remaining()
    }

    #[inline]
    pub fn dmc_output_level(&self) -> u8 {
        self.dmc.output_level()
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
