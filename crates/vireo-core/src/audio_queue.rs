//! Sample queue between the APU and the host audio callback.
//!
//! The mixer flushes a few hundred mono samples per 10000-cycle APU frame
//! (about 268 at 48 kHz NTSC); the host's audio callback drains them from
//! another thread. The 2A03 mixes to a single output pin, so the queue
//! carries mono i16 samples and a stereo frontend duplicates them.
//!
//! The ring is single-producer/single-consumer with no locks and no unsafe
//! code: every slot is an atomic i16, and the head/tail counters increase
//! monotonically and are masked down to a power-of-two capacity on access.
//! The head store/load pair is the release/acquire edge that publishes each
//! slot to the consumer; the tail pair hands the slot back.
//!
//! A full queue rejects new samples: the APU never backpressures the CPU on
//! audio (a stalled host drops sound, not cycles). Rejections are counted so
//! a frontend can surface the underrun instead of guessing at crackle.

use std::sync::Arc;
use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};

struct Shared {
    slots: Box<[AtomicI16]>,
    mask: usize,
    /// Total samples ever pushed; the slot index is `head & mask`.
    head: AtomicUsize,
    /// Total samples ever popped.
    tail: AtomicUsize,
    /// Samples rejected because the consumer fell behind.
    overruns: AtomicUsize,
}

impl Shared {
    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }
}

/// Writing end, held by the APU.
pub struct AudioProducer {
    shared: Arc<Shared>,
}

/// Draining end, handed to the host audio callback.
pub struct AudioConsumer {
    shared: Arc<Shared>,
}

/// Create a queue holding at least `min_capacity` samples (rounded up to a
/// power of two so indices can be masked instead of divided).
pub fn audio_queue(min_capacity: usize) -> (AudioProducer, AudioConsumer) {
    let capacity = min_capacity.max(2).next_power_of_two();
    let slots = (0..capacity)
        .map(|_| AtomicI16::new(0))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(Shared {
        slots,
        mask: capacity - 1,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        overruns: AtomicUsize::new(0),
    });

    (
        AudioProducer {
            shared: Arc::clone(&shared),
        },
        AudioConsumer { shared },
    )
}

impl AudioProducer {
    /// Queue one sample. Returns false, and counts an overrun, when the
    /// consumer has fallen a full queue behind.
    #[inline]
    pub fn push(&self, sample: i16) -> bool {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) == self.shared.slots.len() {
            self.shared.overruns.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.shared.slots[head & self.shared.mask].store(sample, Ordering::Relaxed);
        self.shared.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Samples dropped so far because the queue was full.
    #[inline]
    pub fn overruns(&self) -> usize {
        self.shared.overruns.load(Ordering::Relaxed)
    }
}

impl AudioConsumer {
    #[inline]
    pub fn pop(&self) -> Option<i16> {
        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let sample = self.shared.slots[tail & self.shared.mask].load(Ordering::Relaxed);
        self.shared.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(sample)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Samples dropped so far because the queue was full.
    #[inline]
    pub fn overruns(&self) -> usize {
        self.shared.overruns.load(Ordering::Relaxed)
    }
}
