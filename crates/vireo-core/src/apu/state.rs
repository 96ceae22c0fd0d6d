//! Save-state data for the APU and its children.
//!
//! Plain data structs, decoupled from the live types so the wire layout is
//! explicit. In-flight mixer deltas are not part of a state: the accumulator
//! carries only its running level and resample phase, which is lossless when
//! states are taken at a frame boundary.

use serde::{Deserialize, Serialize};

use super::IrqLine;
use crate::model::ConsoleModel;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthCounterState {
    pub enabled: bool,
    pub halt: bool,
    pub counter: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeState {
    pub constant_volume: bool,
    pub volume: u8,
    pub loop_flag: bool,
    pub start: bool,
    pub divider: u8,
    pub decay: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseState {
    pub duty: u8,
    pub duty_pos: u8,
    pub real_period: u16,
    pub timer: u16,
    pub cycle: u32,
    pub last_output: i8,
    pub length: LengthCounterState,
    pub envelope: EnvelopeState,
    pub sweep_enabled: bool,
    pub sweep_negate: bool,
    pub sweep_shift: u8,
    pub sweep_period: u8,
    pub sweep_divider: u8,
    pub sweep_reload: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleState {
    pub period: u16,
    pub timer: u16,
    pub step: u8,
    pub cycle: u32,
    pub last_output: i8,
    pub length: LengthCounterState,
    pub linear_counter: u8,
    pub linear_reload_value: u8,
    pub linear_reload: bool,
    pub control: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseState {
    pub shift: u16,
    pub short_mode: bool,
    pub period_index: u8,
    pub timer: u16,
    pub cycle: u32,
    pub last_output: i8,
    pub length: LengthCounterState,
    pub envelope: EnvelopeState,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DmcState {
    pub irq_enabled: bool,
    pub loop_flag: bool,
    pub rate_index: u8,
    pub timer: u16,
    pub output_level: u8,
    pub sample_address: u16,
    pub sample_length: u16,
    pub current_address: u16,
    pub bytes_remaining: u16,
    pub shift_register: u8,
    pub bits_remaining: u8,
    pub silence: bool,
    pub cycle: u32,
    pub last_output: i8,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameCounterState {
    pub five_step: bool,
    pub inhibit_irq: bool,
    pub step: u8,
    pub cycle: u32,
    pub pending: Option<u8>,
    pub delay: u8,
    pub block_tick: u8,
    pub last_write: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MixerState {
    pub level: f32,
    pub phase: f64,
}

/// Complete APU state as produced by [`super::Apu::save_state`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApuState {
    pub model: ConsoleModel,
    pub current_cycle: u32,
    pub previous_cycle: u32,
    pub irq: IrqLine,
    pub pulse1: PulseState,
    pub pulse2: PulseState,
    pub triangle: TriangleState,
    pub noise: NoiseState,
    pub dmc: DmcState,
    pub frame_counter: FrameCounterState,
    pub mixer: MixerState,
}
