#![allow(dead_code)]

use vireo_core::apu::{Apu, SampleBus};
use vireo_core::audio_queue::AudioConsumer;

/// Sample memory returning a fixed byte everywhere.
pub struct FlatBus(pub u8);

impl SampleBus for FlatBus {
    fn read_sample(&mut self, _addr: u16) -> u8 {
        self.0
    }
}

/// Sample memory that records every fetch address.
#[derive(Default)]
pub struct RecordingBus {
    pub value: u8,
    pub reads: Vec<u16>,
}

impl SampleBus for RecordingBus {
    fn read_sample(&mut self, addr: u16) -> u8 {
        self.reads.push(addr);
        self.value
    }
}

pub fn step_cycles(apu: &mut Apu, bus: &mut dyn SampleBus, cycles: u32) {
    for _ in 0..cycles {
        apu.step(bus);
    }
}

pub fn drain(consumer: &AudioConsumer) -> Vec<i16> {
    let mut samples = Vec::new();
    while let Some(sample) = consumer.pop() {
        samples.push(sample);
    }
    samples
}
