mod common;

use common::{FlatBus, drain, step_cycles};
use vireo_core::apu::{Apu, FRAME_CYCLE_LIMIT, IrqSource, regs};

#[test]
fn pulse1_tone_plays_and_gates() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();
    let consumer = apu.enable_output(48_000);

    apu.write_register(regs::STATUS, 0x01, &mut bus);
    apu.write_register(regs::PULSE1_CTRL, 0xBF, &mut bus); // duty 2, halt, vol 15
    apu.write_register(regs::PULSE1_SWEEP, 0x00, &mut bus);
    apu.write_register(regs::PULSE1_TIMER_LO, 0xFD, &mut bus);
    apu.write_register(regs::PULSE1_TIMER_HI, 0x08, &mut bus); // ~440 Hz, length 254

    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    assert!(!frame.is_empty());
    assert!(frame.iter().any(|&s| s != 0));
    // Halt flag set: the length counter holds after a full frame.
    assert_eq!(apu.pulse1_length(), 254);

    // Disabling zeroes the length counter and silences the next frame
    // completely.
    apu.write_register(regs::STATUS, 0x00, &mut bus);
    assert_eq!(apu.pulse1_length(), 0);
    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    assert!(!frame.is_empty());
    assert!(frame.iter().all(|&s| s == 0));
}

#[test]
fn status_reads_are_stable_except_frame_irq() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();

    apu.write_register(regs::STATUS, 0x09, &mut bus); // pulse1 + noise
    apu.write_register(regs::PULSE1_TIMER_HI, 0x08, &mut bus); // length 254
    apu.write_register(regs::NOISE_LENGTH, 0x08, &mut bus); // length 254

    // The power-on frame counter runs in 4-step mode with IRQs enabled; a
    // full lap raises the frame IRQ.
    step_cycles(&mut apu, &mut bus, 29_830);

    let first = apu.read_register(regs::STATUS, &mut bus).unwrap();
    assert_eq!(first & 0x01, 0x01);
    assert_eq!(first & 0x08, 0x08);
    assert_eq!(first & 0x40, 0x40);
    assert_eq!(first & 0x20, 0x00); // reserved bit reads zero

    // Second read: identical except the frame IRQ bit, which the first read
    // acknowledged.
    let second = apu.read_register(regs::STATUS, &mut bus).unwrap();
    assert_eq!(second, first & !0x40);
}

#[test]
fn register_access_drains_the_apu() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();

    step_cycles(&mut apu, &mut bus, 1_234);
    apu.write_register(regs::PULSE1_CTRL, 0x30, &mut bus);
    assert_eq!(apu.previous_cycle(), apu.current_cycle());

    step_cycles(&mut apu, &mut bus, 777);
    apu.read_register(regs::STATUS, &mut bus);
    assert_eq!(apu.previous_cycle(), apu.current_cycle());
}

#[test]
fn only_status_is_readable() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();
    assert!(apu.read_register(0x4000, &mut bus).is_none());
    assert!(apu.read_register(0x4009, &mut bus).is_none());
    assert!(apu.read_register(0x4014, &mut bus).is_none());
    assert!(apu.read_register(regs::STATUS, &mut bus).is_some());
}

#[test]
fn triangle_plays_then_linear_counter_silences() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();
    let consumer = apu.enable_output(48_000);

    apu.write_register(regs::STATUS, 0x04, &mut bus);
    apu.write_register(regs::TRI_LINEAR, 0x81, &mut bus); // control, reload 1
    apu.write_register(regs::TRI_TIMER_LO, 0xFF, &mut bus);
    apu.write_register(regs::TRI_TIMER_HI, 0x00, &mut bus);

    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    assert!(frame.iter().any(|&s| s != 0));
    // Control flag keeps the reload flag set: the linear counter reloads on
    // every quarter frame instead of decaying.
    assert_eq!(apu.triangle_linear_counter(), 1);

    // Clearing the control flag lets the counter decay to zero and freeze
    // the sequencer.
    apu.write_register(regs::TRI_LINEAR, 0x01, &mut bus);
    apu.write_register(regs::TRI_TIMER_HI, 0x00, &mut bus);
    step_cycles(&mut apu, &mut bus, 3 * FRAME_CYCLE_LIMIT);
    assert_eq!(apu.triangle_linear_counter(), 0);

    drain(&consumer);
    let frozen_step = apu.triangle_step();
    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    assert_eq!(apu.triangle_step(), frozen_step);
    // The channel holds its last level: a flat line, no transitions.
    let frame = drain(&consumer);
    assert!(frame.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn noise_muted_at_volume_zero_then_audible() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();
    let consumer = apu.enable_output(48_000);

    apu.write_register(regs::STATUS, 0x08, &mut bus);
    apu.write_register(regs::NOISE_CTRL, 0x30, &mut bus); // halt, constant vol 0
    apu.write_register(regs::NOISE_MODE, 0x00, &mut bus);
    apu.write_register(regs::NOISE_LENGTH, 0x00, &mut bus);

    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    assert!(frame.iter().all(|&s| s == 0));
    let lfsr_before = apu.noise_lfsr();

    apu.write_register(regs::NOISE_CTRL, 0x3F, &mut bus); // constant vol 15
    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    assert!(frame.iter().any(|&s| s != 0));
    // The LFSR keeps shifting regardless of volume.
    assert_ne!(apu.noise_lfsr(), lfsr_before);
    assert_ne!(apu.noise_lfsr(), 0);
}

#[test]
fn pulse_mutes_below_period_eight() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();
    let consumer = apu.enable_output(48_000);

    apu.write_register(regs::STATUS, 0x01, &mut bus);
    apu.write_register(regs::PULSE1_CTRL, 0xBF, &mut bus);
    apu.write_register(regs::PULSE1_SWEEP, 0x00, &mut bus);
    apu.write_register(regs::PULSE1_TIMER_LO, 0x04, &mut bus);
    apu.write_register(regs::PULSE1_TIMER_HI, 0x08, &mut bus);

    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    assert!(frame.iter().all(|&s| s == 0));
    // Silent but alive: the length counter still gates the status bit on.
    let status = apu.read_register(regs::STATUS, &mut bus).unwrap();
    assert_eq!(status & 0x01, 0x01);
}

#[test]
fn pulse_mutes_when_sweep_target_overflows() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();
    let consumer = apu.enable_output(48_000);

    apu.write_register(regs::STATUS, 0x01, &mut bus);
    apu.write_register(regs::PULSE1_CTRL, 0xBF, &mut bus);
    apu.write_register(regs::PULSE1_SWEEP, 0x01, &mut bus); // shift 1, no negate
    apu.write_register(regs::PULSE1_TIMER_LO, 0x00, &mut bus);
    apu.write_register(regs::PULSE1_TIMER_HI, 0x0F, &mut bus); // period $700

    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    assert!(frame.iter().all(|&s| s == 0));
}

#[test]
fn dmc_direct_load_moves_the_output_level() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();
    let consumer = apu.enable_output(48_000);

    apu.write_register(regs::DMC_DIRECT_LOAD, 0x45, &mut bus);
    assert_eq!(apu.dmc_output_level(), 0x45);

    step_cycles(&mut apu, &mut bus, FRAME_CYCLE_LIMIT);
    let frame = drain(&consumer);
    // The raw level shift is audible even with the channel disabled.
    assert!(frame.iter().all(|&s| s > 0));
}

#[test]
fn disabled_channels_report_zero_length() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();

    apu.write_register(regs::STATUS, 0x0F, &mut bus);
    apu.write_register(regs::PULSE1_TIMER_HI, 0x08, &mut bus);
    apu.write_register(regs::PULSE2_TIMER_HI, 0x08, &mut bus);
    apu.write_register(regs::TRI_TIMER_HI, 0x08, &mut bus);
    apu.write_register(regs::NOISE_LENGTH, 0x08, &mut bus);
    let status = apu.read_register(regs::STATUS, &mut bus).unwrap();
    assert_eq!(status & 0x0F, 0x0F);

    apu.write_register(regs::STATUS, 0x00, &mut bus);
    let status = apu.read_register(regs::STATUS, &mut bus).unwrap();
    assert_eq!(status & 0x0F, 0x00);
    assert_eq!(apu.pulse2_length(), 0);
    assert_eq!(apu.triangle_length(), 0);
    assert_eq!(apu.noise_length(), 0);
}

#[test]
fn frame_irq_raised_and_acknowledged_by_status_read() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();

    apu.write_register(regs::FRAME_COUNTER, 0x00, &mut bus);
    step_cycles(&mut apu, &mut bus, 29_830);
    assert!(apu.has_irq_source(IrqSource::FrameCounter));
    assert!(apu.irq_asserted());

    let status = apu.read_register(regs::STATUS, &mut bus).unwrap();
    assert_eq!(status & 0x40, 0x40);
    assert!(!apu.has_irq_source(IrqSource::FrameCounter));
    assert!(!apu.irq_asserted());
}

#[test]
fn hard_reset_clears_dmc_level_soft_reset_keeps_it() {
    let mut bus = FlatBus(0);
    let mut apu = Apu::new();

    apu.write_register(regs::DMC_DIRECT_LOAD, 0x30, &mut bus);
    apu.reset(true);
    assert_eq!(apu.dmc_output_level(), 0x30);
    assert_eq!(apu.current_cycle(), 0);

    apu.write_register(regs::DMC_DIRECT_LOAD, 0x30, &mut bus);
    apu.reset(false);
    assert_eq!(apu.dmc_output_level(), 0);
}
