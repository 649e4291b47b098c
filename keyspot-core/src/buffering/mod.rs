//! Frame hand-off between the audio producer and the pipeline worker.
//!
//! Uses `ringbuf::HeapRb<i16>`: the producer side is wait-free, so the
//! real-time audio thread never blocks. The worker pops exactly one frame
//! width at a time, preserving arrival order.

pub mod frame;
pub mod ring;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use ringbuf::{traits::Split, HeapRb};
use tracing::warn;

pub use ringbuf::traits::{Consumer, Observer, Producer};

pub use frame::AudioFrame;
pub use ring::RingBuffer;

/// Type alias for the producer half, held by the audio source.
pub type SampleProducer = ringbuf::HeapProd<i16>;

/// Type alias for the consumer half, held by the pipeline worker.
pub type SampleConsumer = ringbuf::HeapCons<i16>;

/// Create a matched producer/consumer pair holding `frames` whole frames.
pub fn create_frame_queue(frame_samples: usize, frames: usize) -> (SampleProducer, SampleConsumer) {
    HeapRb::<i16>::new(frame_samples * frames.max(1)).split()
}

/// Producer handle given to the audio source.
///
/// `push_frame` never blocks: a frame that does not fit is dropped whole
/// and counted, so the worker only ever sees complete frames.
pub struct FrameSink {
    producer: SampleProducer,
    frame_samples: usize,
    dropped: Arc<AtomicUsize>,
}

impl FrameSink {
    pub fn new(producer: SampleProducer, frame_samples: usize, dropped: Arc<AtomicUsize>) -> Self {
        Self {
            producer,
            frame_samples,
            dropped,
        }
    }

    /// Number of samples in one frame.
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Queue one frame. Returns `false` if the frame was dropped, either
    /// because it has the wrong width or because the queue is full.
    pub fn push_frame(&mut self, samples: &[i16]) -> bool {
        if samples.len() != self.frame_samples {
            warn!(
                expected = self.frame_samples,
                got = samples.len(),
                "dropping frame with unexpected width"
            );
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if self.producer.vacant_len() < samples.len() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.producer.push_slice(samples);
        true
    }

    /// Queue one frame of little-endian 16-bit PCM bytes.
    pub fn push_le_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != self.frame_samples * 2 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if self.producer.vacant_len() < self.frame_samples {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let pushed = self.producer.push_iter(
            bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );
        debug_assert_eq!(pushed, self.frame_samples);
        true
    }
}

/// Pop one whole frame into `scratch`. Returns `false` if a full frame is
/// not yet available.
pub fn pop_frame(consumer: &mut SampleConsumer, scratch: &mut [i16]) -> bool {
    if consumer.occupied_len() < scratch.len() {
        return false;
    }
    consumer.pop_slice(scratch) == scratch.len()
}

/// Discard everything currently queued.
pub fn discard_queued(consumer: &mut SampleConsumer) -> usize {
    consumer.clear()
}
