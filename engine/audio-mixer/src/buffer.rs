//! Immutable sample payloads shared between sources

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{MixerError, Result};
use crate::format::SampleFormat;

pub type BufferId = u32;

/// A block of PCM samples plus the "processed" flag the mixer maintains.
///
/// The payload never changes after creation. Buffers are shared through
/// `Arc` so one buffer may sit in several source queues at once.
#[derive(Debug)]
pub struct AudioBuffer {
    id: BufferId,
    format: SampleFormat,
    samples: Box<[u8]>,
    processed: AtomicBool,
}

impl AudioBuffer {
    pub fn new(id: BufferId, format: SampleFormat, samples: Vec<u8>) -> Result<Self> {
        format.validate()?;
        let frame_size = format.frame_size();
        if samples.len() % frame_size != 0 {
            return Err(MixerError::MisalignedBuffer { len: samples.len(), frame_size });
        }
        Ok(Self { id, format, samples: samples.into_boxed_slice(), processed: AtomicBool::new(false) })
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    #[inline]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn is_processed(&self) -> bool {
        self.processed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_processed(&self, processed: bool) {
        self.processed.store(processed, Ordering::Release);
    }
}
