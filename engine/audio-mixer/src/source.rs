//! A playing source: ordered buffer queue, playback cursor and tick-paced mixing

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use virtual_time::VirtualTime;

use crate::buffer::AudioBuffer;
use crate::convert::{apply_gain, gain_q16, mix_into, SampleConverter};
use crate::error::{MixerError, Result};
use crate::format::SampleFormat;
use crate::sink::ReferenceSink;

pub type SourceId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// How buffers were attached to the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Undetermined,
    /// A single buffer attached directly
    Static,
    /// Buffers queued one after another
    Streaming,
}

/// Result of one [`AudioSource::mix_with`] call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MixOutcome {
    /// Input bytes requested by the tick delta
    pub bytes_requested: usize,
    /// Input bytes actually read from the queue
    pub bytes_consumed: usize,
    /// Output bytes added into the shared buffer
    pub bytes_mixed: usize,
    /// The queue ran out and the source stopped
    pub stopped: bool,
}

pub struct AudioSource {
    id: SourceId,
    kind: SourceKind,
    queue: Vec<Arc<AudioBuffer>>,
    queue_index: usize,
    position: usize,
    state: SourceState,
    looping: bool,
    volume: f32,
    converter: Option<SampleConverter>,
    sink: Option<Box<dyn ReferenceSink>>,
}

impl AudioSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            kind: SourceKind::Undetermined,
            queue: Vec::new(),
            queue_index: 0,
            position: 0,
            state: SourceState::Initial,
            looping: false,
            volume: 1.0,
            converter: None,
            sink: None,
        }
    }

    #[inline]
    pub fn id(&self) -> SourceId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> SourceState {
        self.state
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
    }

    /// Current cursor as (queue index, in-buffer byte offset)
    #[inline]
    pub fn cursor(&self) -> (usize, usize) {
        (self.queue_index, self.position)
    }

    pub fn buffers(&self) -> &[Arc<AudioBuffer>] {
        &self.queue
    }

    /// Format shared by every queued buffer, if any are queued.
    pub fn format(&self) -> Option<SampleFormat> {
        self.queue.first().map(|b| b.format())
    }

    /// Replace the queue with a single buffer.
    pub fn set_buffer(&mut self, buffer: Arc<AudioBuffer>) {
        self.queue.clear();
        buffer.set_processed(false);
        self.queue.push(buffer);
        self.kind = SourceKind::Static;
        self.reset_cursor();
    }

    /// Append a buffer to the playback queue. Every buffer in the queue must
    /// share one format.
    pub fn queue_buffer(&mut self, buffer: Arc<AudioBuffer>) -> Result<()> {
        if let Some(expected) = self.format() {
            if expected != buffer.format() {
                return Err(MixerError::FormatMismatch { expected, found: buffer.format() });
            }
        }
        buffer.set_processed(false);
        self.queue.push(buffer);
        if self.kind == SourceKind::Undetermined {
            self.kind = SourceKind::Streaming;
        }
        Ok(())
    }

    /// Remove up to `max` fully played buffers from the front of the queue.
    pub fn unqueue_processed(&mut self, max: usize) -> Vec<Arc<AudioBuffer>> {
        let n = max.min(self.processed_count());
        self.queue_index -= n;
        self.queue.drain(..n).collect()
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Buffers entirely behind the cursor.
    #[inline]
    pub fn processed_count(&self) -> usize {
        self.queue_index.min(self.queue.len())
    }

    /// Total payload bytes across the queue.
    pub fn queue_size(&self) -> usize {
        self.queue.iter().map(|b| b.len()).sum()
    }

    pub fn play(&mut self) {
        if self.state == SourceState::Stopped {
            self.rewind_buffers();
        }
        self.state = SourceState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == SourceState::Playing {
            self.state = SourceState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = SourceState::Stopped;
        self.reset_cursor();
    }

    pub fn rewind(&mut self) {
        self.state = SourceState::Initial;
        self.rewind_buffers();
    }

    fn rewind_buffers(&mut self) {
        for buffer in &self.queue {
            buffer.set_processed(false);
        }
        self.reset_cursor();
    }

    fn reset_cursor(&mut self) {
        self.queue_index = 0;
        self.position = 0;
        if let Some(conv) = self.converter.as_mut() {
            conv.reset();
        }
    }

    pub fn attach_sink(&mut self, sink: Box<dyn ReferenceSink>) {
        self.sink = Some(sink);
    }

    #[inline]
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Close the reference sink, if any.
    pub fn close_sink(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(mut sink) => sink.finalize(),
            None => Ok(()),
        }
    }

    /// Absolute byte offset of the cursor from the start of the queue.
    pub fn get_position(&self) -> usize {
        let before: usize = self.queue.iter().take(self.queue_index).map(|b| b.len()).sum();
        before + self.position
    }

    /// Move the cursor to `offset` bytes from the start of the queue,
    /// rounded down to a frame boundary.
    ///
    /// Buffers wholly before the target are marked processed, the target
    /// buffer and everything after it unprocessed. Offsets past the end of a
    /// non-looping queue park the cursor at the end of the last buffer.
    pub fn set_position(&mut self, offset: usize) {
        let total = self.queue_size();
        if self.queue.is_empty() {
            self.reset_cursor();
            return;
        }
        let mut local = if self.looping && total > 0 { offset % total } else { offset };

        let mut target = None;
        for (i, buffer) in self.queue.iter().enumerate() {
            if target.is_some() {
                buffer.set_processed(false);
            } else if local < buffer.len() {
                target = Some((i, buffer.format().align_down(local)));
                buffer.set_processed(false);
            } else {
                buffer.set_processed(true);
                local -= buffer.len();
            }
        }

        let (index, position) = target.unwrap_or_else(|| {
            let last = self.queue.len() - 1;
            (last, self.queue[last].len())
        });
        self.queue_index = index;
        self.position = position;
        if let Some(conv) = self.converter.as_mut() {
            conv.reset();
        }
    }

    /// Advance playback by `ticks` of virtual time and add the resulting
    /// samples, converted to `out_format`, into `output`.
    ///
    /// The effective gain is `min(1, volume * master_volume)`. Output depends
    /// only on the cursor, `ticks`, the buffer contents and the formats.
    pub fn mix_with(
        &mut self,
        ticks: VirtualTime,
        output: &mut [u8],
        out_format: SampleFormat,
        master_volume: f32,
    ) -> Result<MixOutcome> {
        // A queue of empty buffers never advances.
        if self.state != SourceState::Playing || self.queue_size() == 0 {
            return Ok(MixOutcome::default());
        }

        if self.queue_index >= self.queue.len() {
            self.queue_index = 0;
            self.position = 0;
        }

        let in_format = self.queue[self.queue_index].format();
        let reusable = matches!(
            &self.converter,
            Some(conv) if conv.input_format() == in_format && conv.output_format() == out_format
        );
        if !reusable {
            self.converter = None;
        }
        let converter =
            self.converter.get_or_insert_with(|| SampleConverter::new(in_format, out_format));

        let requested = in_format.ticks_to_bytes(ticks);
        let mut remaining = requested;
        let mut index = self.queue_index;
        let mut position = self.position.min(self.queue[index].len());
        let mut exhausted = false;

        tracing::trace!(
            source_id = self.id,
            buffer_index = index,
            position,
            requested,
            "Mixing source"
        );

        while remaining > 0 {
            let buffer = &self.queue[index];
            let available = buffer.len() - position;

            if remaining < available {
                converter.push(&buffer.samples()[position..position + remaining]);
                position += remaining;
                remaining = 0;
                break;
            }

            converter.push(&buffer.samples()[position..]);
            remaining -= available;
            buffer.set_processed(true);

            let next = index + 1;
            if next < self.queue.len() {
                index = next;
                position = 0;
            } else if self.looping {
                // A new pass over the queue starts.
                for b in &self.queue {
                    b.set_processed(false);
                }
                index = 0;
                position = 0;
            } else {
                exhausted = true;
                break;
            }
        }

        let consumed = requested - remaining;

        let mut mixed = Vec::with_capacity(output.len());
        converter.drain_into(&mut mixed);

        let gain = gain_q16((self.volume * master_volume).min(1.0));
        apply_gain(&mut mixed, out_format, gain);
        let mixed_len = mixed.len().min(output.len());
        mix_into(output, &mixed[..mixed_len], out_format);

        if let Some(sink) = self.sink.as_mut() {
            sink.write_samples(&mixed[..mixed_len])?;
        }

        if exhausted {
            tracing::debug!(source_id = self.id, "Source played until the end of its queue");
            self.state = SourceState::Stopped;
            self.queue_index = 0;
            self.position = 0;
            converter.reset();
        } else {
            self.queue_index = index;
            self.position = position;
        }

        Ok(MixOutcome {
            bytes_requested: requested,
            bytes_consumed: consumed,
            bytes_mixed: mixed_len,
            stopped: exhausted,
        })
    }
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("queue_len", &self.queue.len())
            .field("cursor", &(self.queue_index, self.position))
            .field("state", &self.state)
            .field("looping", &self.looping)
            .field("volume", &self.volume)
            .finish()
    }
}
