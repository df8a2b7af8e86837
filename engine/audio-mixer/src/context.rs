//! Owner of all sources and buffers; mixes every active source once per rendezvous

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use virtual_time::VirtualTime;

use crate::buffer::{AudioBuffer, BufferId};
use crate::config::MixerConfig;
use crate::error::{MixerError, Result};
use crate::format::SampleFormat;
use crate::sink::{SinkFactory, WavSinkFactory};
use crate::source::{AudioSource, SourceId, SourceState};

/// Totals for one [`AudioContext::mix_all_sources`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixReport {
    pub sources_mixed: usize,
    pub sources_stopped: usize,
    pub output_bytes: usize,
}

struct ContextState {
    // BTreeMap keeps mixing order by source id, independent of creation timing.
    sources: BTreeMap<SourceId, AudioSource>,
    master_volume: f32,
    output: Vec<u8>,
}

pub struct AudioContext {
    output_format: SampleFormat,
    state: Mutex<ContextState>,
    sink_factory: Option<Arc<dyn SinkFactory>>,
    next_source_id: AtomicU32,
    next_buffer_id: AtomicU32,
}

impl AudioContext {
    pub fn new(config: MixerConfig) -> Result<Self> {
        config.output_format.validate()?;
        let sink_factory = config
            .reference_sink_dir
            .clone()
            .map(|dir| Arc::new(WavSinkFactory::new(dir)) as Arc<dyn SinkFactory>);

        tracing::info!(
            output_format = ?config.output_format,
            master_volume = config.master_volume,
            "Creating AudioContext"
        );

        Ok(Self {
            output_format: config.output_format,
            state: Mutex::new(ContextState {
                sources: BTreeMap::new(),
                master_volume: config.master_volume,
                output: Vec::new(),
            }),
            sink_factory,
            next_source_id: AtomicU32::new(1),
            next_buffer_id: AtomicU32::new(1),
        })
    }

    /// Replace the reference sink factory used for sources opened from now on.
    pub fn with_sink_factory(mut self, factory: Arc<dyn SinkFactory>) -> Self {
        self.sink_factory = Some(factory);
        self
    }

    #[inline]
    pub fn output_format(&self) -> SampleFormat {
        self.output_format
    }

    pub fn master_volume(&self) -> f32 {
        self.state.lock().master_volume
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.state.lock().master_volume = volume.max(0.0);
    }

    pub fn create_buffer(&self, format: SampleFormat, samples: Vec<u8>) -> Result<Arc<AudioBuffer>> {
        let id: BufferId = self.next_buffer_id.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(AudioBuffer::new(id, format, samples)?))
    }

    pub fn create_source(&self) -> SourceId {
        let id = self.next_source_id.fetch_add(1, Ordering::Relaxed);
        self.state.lock().sources.insert(id, AudioSource::new(id));
        tracing::debug!(source_id = id, "Created audio source");
        id
    }

    pub fn delete_source(&self, id: SourceId) -> Result<()> {
        let mut source =
            self.state.lock().sources.remove(&id).ok_or(MixerError::UnknownSource(id))?;
        source.close_sink()
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.state.lock().sources.keys().copied().collect()
    }

    /// Run `f` against a source while holding the context lock.
    pub fn with_source<R>(&self, id: SourceId, f: impl FnOnce(&mut AudioSource) -> R) -> Result<R> {
        let mut state = self.state.lock();
        let source = state.sources.get_mut(&id).ok_or(MixerError::UnknownSource(id))?;
        Ok(f(source))
    }

    /// Mix every playing source by `ticks` into a fresh output buffer.
    ///
    /// Reference-sink failures detach the failing sink and mixing continues.
    pub fn mix_all_sources(&self, ticks: VirtualTime) -> MixReport {
        let out_format = self.output_format;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.output.clear();
        state.output.resize(out_format.ticks_to_bytes(ticks), out_format.silence());

        let mut report = MixReport { output_bytes: state.output.len(), ..Default::default() };

        for (id, source) in state.sources.iter_mut() {
            if source.state() != SourceState::Playing || source.queue_len() == 0 {
                continue;
            }

            if !source.has_sink() {
                if let Some(factory) = &self.sink_factory {
                    match factory.open(*id, out_format) {
                        Ok(sink) => source.attach_sink(sink),
                        Err(e) => tracing::warn!(source_id = id, "Failed to open reference sink: {}", e),
                    }
                }
            }

            match source.mix_with(ticks, &mut state.output, out_format, state.master_volume) {
                Ok(outcome) => {
                    report.sources_mixed += 1;
                    if outcome.stopped {
                        report.sources_stopped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(source_id = id, "Reference sink write failed, detaching: {}", e);
                    if let Err(e) = source.close_sink() {
                        tracing::debug!(source_id = id, "Closing failed sink: {}", e);
                    }
                }
            }
        }

        tracing::trace!(
            sources_mixed = report.sources_mixed,
            output_bytes = report.output_bytes,
            "Mixed all sources"
        );
        report
    }

    /// Copy of the output buffer produced by the last mixing pass.
    pub fn last_output(&self) -> Vec<u8> {
        self.state.lock().output.clone()
    }

    /// Finalize every reference sink.
    pub fn close_sinks(&self) -> Result<()> {
        let mut state = self.state.lock();
        for source in state.sources.values_mut() {
            source.close_sink()?;
        }
        Ok(())
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        if let Err(e) = self.close_sinks() {
            tracing::warn!("Failed to finalize reference sinks: {}", e);
        }
    }
}
