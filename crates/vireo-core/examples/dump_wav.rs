use std::env;
use std::fs;
use std::path::Path;
use vireo_core::apu::{Apu, SampleBus, regs};
use vireo_core::model::ConsoleModel;

const DEFAULT_SECONDS: f64 = 3.0;
const SAMPLE_RATE: u32 = 48_000;

/// Stand-in sample memory for the DMC: an alternating bit pattern that turns
/// into a gentle sawtooth wobble.
struct PatternBus;

impl SampleBus for PatternBus {
    fn read_sample(&mut self, addr: u16) -> u8 {
        if addr & 1 == 0 { 0x0F } else { 0xF0 }
    }
}

/// Pulse periods for a little arpeggio (NTSC, roughly A4 C5 E5 A5).
const MELODY: [u16; 4] = [0x0FD, 0x0D5, 0x0A9, 0x07E];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let out_path = args
        .next()
        .ok_or("expected <output wav> [--seconds=N] [--pal] [--dmc]")?;

    let mut seconds = DEFAULT_SECONDS;
    let mut model = ConsoleModel::Ntsc;
    let mut with_dmc = false;

    for arg in args {
        if let Some(value) = arg.strip_prefix("--seconds=") {
            seconds = value.parse()?;
        } else if arg == "--pal" {
            model = ConsoleModel::Pal;
        } else if arg == "--ntsc" {
            model = ConsoleModel::Ntsc;
        } else if arg == "--dmc" {
            with_dmc = true;
        } else {
            return Err(format!("unrecognised flag: {arg}").into());
        }
    }

    if seconds <= 0.0 {
        return Err("seconds must be positive".into());
    }

    let mut bus = PatternBus;
    let mut apu = Apu::with_model(model);
    let consumer = apu.enable_output(SAMPLE_RATE);

    // Pulse 1 carries the melody; triangle drones an octave below; noise adds
    // a tick every beat.
    apu.write_register(regs::STATUS, if with_dmc { 0x1D } else { 0x0D }, &mut bus);
    apu.write_register(regs::PULSE1_CTRL, 0xBC, &mut bus); // duty 2, halt, vol 12
    apu.write_register(regs::PULSE1_SWEEP, 0x00, &mut bus);
    apu.write_register(regs::TRI_LINEAR, 0xFF, &mut bus);
    if with_dmc {
        apu.write_register(regs::DMC_RATE, 0x4E, &mut bus); // loop, quick rate
        apu.write_register(regs::DMC_SAMPLE_ADDR, 0x00, &mut bus);
        apu.write_register(regs::DMC_SAMPLE_LEN, 0x04, &mut bus);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let out_dir = Path::new(&out_path);
    if let Some(parent) = out_dir
        .parent()
        .and_then(|p| (!p.as_os_str().is_empty()).then_some(p))
    {
        fs::create_dir_all(parent)?;
    }
    let mut writer = hound::WavWriter::create(out_dir, spec)?;

    let total_samples = (seconds * SAMPLE_RATE as f64).ceil() as u64;
    let beat_cycles = model.clock_rate() / 4; // quarter-second beats
    let mut samples_written = 0u64;
    let mut cycle = 0u32;
    let mut beat = usize::MAX;

    while samples_written < total_samples {
        if (cycle / beat_cycles) as usize != beat {
            beat = (cycle / beat_cycles) as usize;
            let period = MELODY[beat % MELODY.len()];
            apu.write_register(regs::PULSE1_TIMER_LO, (period & 0xFF) as u8, &mut bus);
            apu.write_register(regs::PULSE1_TIMER_HI, 0x08 | (period >> 8) as u8, &mut bus);
            let tri_period = period * 2 + 1;
            apu.write_register(regs::TRI_TIMER_LO, (tri_period & 0xFF) as u8, &mut bus);
            apu.write_register(regs::TRI_TIMER_HI, 0x08 | (tri_period >> 8) as u8, &mut bus);
            apu.write_register(regs::NOISE_CTRL, 0x04, &mut bus); // short decay tick
            apu.write_register(regs::NOISE_MODE, 0x04, &mut bus);
            apu.write_register(regs::NOISE_LENGTH, 0x10, &mut bus);
        }

        apu.step(&mut bus);
        cycle = cycle.wrapping_add(1);

        while samples_written < total_samples {
            let Some(sample) = consumer.pop() else {
                break;
            };
            writer.write_sample(sample)?;
            samples_written += 1;
        }
    }

    writer.finalize()?;
    println!(
        "wrote {samples_written} samples ({seconds:.2}s) to {}",
        out_dir.display()
    );

    Ok(())
}
