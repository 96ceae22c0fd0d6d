//! Frame counter: the 4/5-step sequencer clocking envelopes, linear and
//! length counters and sweeps, and the frame IRQ source.

use super::state::FrameCounterState;
use super::tables::frame_counter_steps;
use super::{IrqLine, IrqSource};
use crate::model::ConsoleModel;

/// Auxiliary clock produced by the sequencer. A half-frame event also implies
/// a quarter-frame at the dispatch site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameEvent {
    Quarter,
    Half,
}

/// Event kinds per sequence step; identical in both modes, the modes differ
/// only in their cycle tables and the IRQ.
const FRAME_EVENTS: [Option<FrameEvent>; 6] = [
    Some(FrameEvent::Quarter),
    Some(FrameEvent::Half),
    Some(FrameEvent::Quarter),
    None,
    Some(FrameEvent::Half),
    None,
];

pub struct FrameCounter {
    model: ConsoleModel,
    five_step: bool,
    inhibit_irq: bool,
    /// Index into the step table (0..6).
    step: usize,
    /// CPU cycles into the current sequence.
    cycle: u32,
    /// A $4017 write maturing towards its delayed sequencer reset.
    pending: Option<u8>,
    /// Cycles until the pending value applies: 3 after an even-cycle write,
    /// 4 after an odd one.
    delay: u8,
    /// Suppresses sequencer events for a short window after a 5-step reset
    /// already clocked the units.
    block_tick: u8,
    /// Last value written to $4017; soft reset re-applies it.
    last_write: u8,
}

impl FrameCounter {
    pub fn new(model: ConsoleModel) -> Self {
        FrameCounter {
            model,
            five_step: false,
            inhibit_irq: false,
            step: 0,
            cycle: 0,
            pending: None,
            delay: 0,
            block_tick: 0,
            last_write: 0,
        }
    }

    #[inline]
    fn steps(&self) -> &'static [u32; 6] {
        &frame_counter_steps(self.model)[self.five_step as usize]
    }

    /// $4017 write. The mode/reset applies after the 3-or-4 cycle delay; the
    /// IRQ inhibit bit acts immediately and acknowledges a pending frame IRQ.
    pub fn write(&mut self, value: u8, on_even_cycle: bool, irq: &mut IrqLine) {
        self.last_write = value;
        self.inhibit_irq = value & 0x40 != 0;
        if self.inhibit_irq {
            irq.acknowledge(IrqSource::FrameCounter);
        }
        self.pending = Some(value);
        self.delay = if on_even_cycle { 3 } else { 4 };
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some()
    }

    /// Advance up to `max_cycles`, stopping at the next sequencer event or
    /// pending-write boundary. Returns the cycles consumed and the event, if
    /// one fired at the stopping point.
    pub fn run(&mut self, max_cycles: u32, irq: &mut IrqLine) -> (u32, Option<FrameEvent>) {
        debug_assert!(max_cycles > 0);
        let mut event = None;
        let ran;
        if let Some(value) = self.pending {
            // Single-cycle steps while a $4017 write matures, so the reset
            // lands on its exact cycle.
            self.delay -= 1;
            if self.delay == 0 {
                self.pending = None;
                self.apply_write(value, &mut event);
                // The apply cycle already counts toward the new sequence.
                self.cycle += 1;
            } else {
                self.advance(1, irq, &mut event);
            }
            ran = 1;
        } else {
            let until_step = self.steps()[self.step].saturating_sub(self.cycle).max(1);
            ran = max_cycles.min(until_step);
            self.advance(ran, irq, &mut event);
        }
        (ran, event)
    }

    fn advance(&mut self, cycles: u32, irq: &mut IrqLine, event: &mut Option<FrameEvent>) {
        // The post-reset tick block expires with elapsed cycles; a boundary
        // at the end of this span is suppressed only while it is live.
        let blocked = self.block_tick as u32 >= cycles;
        self.block_tick = (self.block_tick as u32).saturating_sub(cycles) as u8;

        self.cycle += cycles;
        if self.cycle >= self.steps()[self.step] {
            if !self.five_step && !self.inhibit_irq && self.step >= 3 {
                irq.raise(IrqSource::FrameCounter);
            }
            if let Some(kind) = FRAME_EVENTS[self.step]
                && !blocked
            {
                *event = Some(kind);
            }
            self.step += 1;
            if self.step == 6 {
                self.step = 0;
                self.cycle = 0;
            }
        }
    }

    fn apply_write(&mut self, value: u8, event: &mut Option<FrameEvent>) {
        self.five_step = value & 0x80 != 0;
        self.step = 0;
        self.cycle = 0;
        if self.five_step && self.block_tick == 0 {
            // Selecting 5-step mode clocks a half frame (and with it a
            // quarter frame) on the spot.
            *event = Some(FrameEvent::Half);
            self.block_tick = 2;
        }
    }

    /// True when the frame IRQ would be raised within `within` cycles.
    pub fn irq_pending(&self, within: u32) -> bool {
        !self.five_step
            && !self.inhibit_irq
            && self.cycle + within >= frame_counter_steps(self.model)[0][3]
    }

    pub fn set_model(&mut self, model: ConsoleModel) {
        self.model = model;
    }

    pub fn reset(&mut self, soft: bool) {
        self.step = 0;
        self.cycle = 0;
        self.pending = None;
        self.delay = 0;
        self.block_tick = 0;
        if soft {
            // Hardware behaves as if the previous $4017 value were rewritten.
            self.five_step = self.last_write & 0x80 != 0;
            self.inhibit_irq = self.last_write & 0x40 != 0;
        } else {
            self.five_step = false;
            self.inhibit_irq = false;
            self.last_write = 0;
        }
    }

    pub(super) fn state(&self) -> FrameCounterState {
        FrameCounterState {
            five_step: self.five_step,
            inhibit_irq: self.inhibit_irq,
            step: self.step as u8,
            cycle: self.cycle,
            pending: self.pending,
            delay: self.delay,
            block_tick: self.block_tick,
            last_write: self.last_write,
        }
    }

    pub(super) fn restore(&mut self, state: &FrameCounterState) {
        self.five_step = state.five_step;
        self.inhibit_irq = state.inhibit_irq;
        self.step = (state.step as usize).min(5);
        self.cycle = state.cycle;
        self.pending = state.pending;
        self.delay = state.delay;
        self.block_tick = state.block_tick;
        self.last_write = state.last_write;
    }
}
