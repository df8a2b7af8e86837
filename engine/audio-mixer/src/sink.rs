//! Reference sinks receiving each source's mixed samples for verification

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::format::SampleFormat;
use crate::source::SourceId;

/// A per-source writable sample stream.
///
/// Sinks see exactly the bytes that a source added into the shared output
/// buffer. They never influence mixing.
pub trait ReferenceSink: Send {
    /// Unique name the sink was opened under.
    fn name(&self) -> &str;

    /// Append interleaved samples in the sink's format.
    fn write_samples(&mut self, samples: &[u8]) -> Result<()>;

    /// Flush and close. Further writes are ignored.
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens one sink per source on first mix.
pub trait SinkFactory: Send + Sync {
    fn open(&self, source_id: SourceId, format: SampleFormat) -> Result<Box<dyn ReferenceSink>>;
}

/// Generate a unique sink name with the given extension.
pub fn unique_sink_name(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), extension)
}

/// WAV file sink, one file per source.
pub struct WavSink {
    name: String,
    path: PathBuf,
    format: SampleFormat,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn create(dir: &Path, format: SampleFormat) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = unique_sink_name("wav");
        let path = dir.join(&name);
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bit_depth,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec)?;
        Ok(Self { name, path, format, writer: Some(writer) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReferenceSink for WavSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_samples(&mut self, samples: &[u8]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else { return Ok(()) };
        if self.format.bit_depth == 8 {
            // hound takes signed 8-bit samples and stores them unsigned.
            for &b in samples {
                writer.write_sample((b as i16 - 0x80) as i8)?;
            }
        } else {
            for pair in samples.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

/// Writes WAV sinks into a directory.
pub struct WavSinkFactory {
    dir: PathBuf,
}

impl WavSinkFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SinkFactory for WavSinkFactory {
    fn open(&self, source_id: SourceId, format: SampleFormat) -> Result<Box<dyn ReferenceSink>> {
        let sink = WavSink::create(&self.dir, format)?;
        tracing::debug!(source_id, path = ?sink.path(), "Opened WAV reference sink");
        Ok(Box::new(sink))
    }
}

/// In-memory sink; the captured bytes stay reachable through a shared handle.
pub struct MemorySink {
    name: String,
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self { name: unique_sink_name("pcm"), data: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<u8>>> {
        self.data.clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_samples(&mut self, samples: &[u8]) -> Result<()> {
        self.data.lock().extend_from_slice(samples);
        Ok(())
    }
}

/// Keeps a [`MemorySink`] per source so callers can read back what was mixed.
#[derive(Default)]
pub struct MemorySinkFactory {
    sinks: Mutex<Vec<(SourceId, Arc<Mutex<Vec<u8>>>)>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything source `source_id` has written so far.
    pub fn captured(&self, source_id: SourceId) -> Option<Vec<u8>> {
        self.sinks
            .lock()
            .iter()
            .find(|(id, _)| *id == source_id)
            .map(|(_, data)| data.lock().clone())
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open(&self, source_id: SourceId, _format: SampleFormat) -> Result<Box<dyn ReferenceSink>> {
        let sink = MemorySink::new();
        self.sinks.lock().push((source_id, sink.handle()));
        Ok(Box::new(sink))
    }
}

/// Accepts and discards everything.
pub struct NullSink {
    name: String,
}

impl NullSink {
    pub fn new() -> Self {
        Self { name: unique_sink_name("null") }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceSink for NullSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_samples(&mut self, _samples: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names() {
        let a = unique_sink_name("wav");
        let b = unique_sink_name("wav");
        assert_ne!(a, b);
        assert!(a.ends_with(".wav"));
    }

    #[test]
    fn test_wav_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fmt = SampleFormat::new(16, 1, 8000);
        let mut sink = WavSink::create(dir.path(), fmt).unwrap();
        let path = sink.path().to_path_buf();
        let samples: Vec<u8> = [1i16, -2, 300].iter().flat_map(|s| s.to_le_bytes()).collect();
        sink.write_samples(&samples).unwrap();
        sink.finalize().unwrap();

        let mut reader = hound::WavReader::open(path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![1, -2, 300]);
    }

    #[test]
    fn test_memory_factory_tracks_sources() {
        let factory = MemorySinkFactory::new();
        let mut sink = factory.open(3, SampleFormat::default()).unwrap();
        sink.write_samples(&[1, 2, 3, 4]).unwrap();
        assert_eq!(factory.captured(3), Some(vec![1, 2, 3, 4]));
        assert_eq!(factory.captured(4), None);
    }

    #[test]
    fn test_null_sink_discards() {
        let mut sink = NullSink::new();
        assert!(sink.name().ends_with(".null"));
        sink.write_samples(&[0xff; 64]).unwrap();
        sink.finalize().unwrap();
    }
}
