//! Streaming sample format / channel / rate conversion and gain mixing

use std::collections::VecDeque;

use crate::format::SampleFormat;

/// Deterministic streaming converter between two PCM formats.
///
/// Input frames are decoded to a 16-bit domain, remapped to the output
/// channel count, and resampled with a zero-order hold driven by an integer
/// phase accumulator. State carries across calls, so feeding a stream in
/// arbitrary chunks yields the same output as feeding it whole.
#[derive(Debug)]
pub struct SampleConverter {
    input: SampleFormat,
    output: SampleFormat,
    pending: VecDeque<[i16; 2]>,
    // Output frame k reads input frame (phase / output_rate); advances by input_rate per frame.
    phase: u64,
}

impl SampleConverter {
    pub fn new(input: SampleFormat, output: SampleFormat) -> Self {
        Self { input, output, pending: VecDeque::new(), phase: 0 }
    }

    #[inline]
    pub fn input_format(&self) -> SampleFormat {
        self.input
    }

    #[inline]
    pub fn output_format(&self) -> SampleFormat {
        self.output
    }

    /// Decode `bytes` and queue them for conversion. Trailing partial frames are ignored.
    pub fn push(&mut self, bytes: &[u8]) {
        let frame_size = self.input.frame_size();
        let bps = self.input.bytes_per_sample();
        for frame in bytes.chunks_exact(frame_size) {
            let left = decode_sample(&frame[..bps], self.input.bit_depth);
            let right = if self.input.channels == 2 {
                decode_sample(&frame[bps..2 * bps], self.input.bit_depth)
            } else {
                left
            };
            let mapped = if self.output.channels == 1 {
                let mono = ((left as i32 + right as i32) / 2) as i16;
                [mono, mono]
            } else {
                [left, right]
            };
            self.pending.push_back(mapped);
        }
    }

    /// Append every output frame that can be produced from queued input.
    /// Returns the number of output frames written.
    pub fn drain_into(&mut self, out: &mut Vec<u8>) -> usize {
        let in_rate = self.input.sample_rate as u64;
        let out_rate = self.output.sample_rate as u64;
        let mut produced = 0;

        loop {
            let idx = (self.phase / out_rate) as usize;
            let Some(frame) = self.pending.get(idx) else { break };
            for &sample in frame.iter().take(self.output.channels as usize) {
                encode_sample(sample, self.output.bit_depth, out);
            }
            self.phase += in_rate;
            produced += 1;
        }

        let consumed = ((self.phase / out_rate) as usize).min(self.pending.len());
        self.pending.drain(..consumed);
        self.phase -= consumed as u64 * out_rate;
        produced
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.phase = 0;
    }
}

#[inline]
fn decode_sample(bytes: &[u8], bit_depth: u16) -> i16 {
    if bit_depth == 8 {
        ((bytes[0] as i16) - 0x80) << 8
    } else {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
}

#[inline]
fn encode_sample(sample: i16, bit_depth: u16, out: &mut Vec<u8>) {
    if bit_depth == 8 {
        out.push(((sample >> 8) + 0x80) as u8);
    } else {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

/// Fixed-point gain (Q16). Unity is 65536.
pub fn gain_q16(gain: f32) -> i32 {
    (gain.clamp(0.0, 1.0) * 65536.0) as i32
}

/// Scale every sample of `samples` in place by a Q16 gain.
pub fn apply_gain(samples: &mut [u8], format: SampleFormat, gain: i32) {
    if gain >= 65536 {
        return;
    }
    let bps = format.bytes_per_sample();
    for chunk in samples.chunks_exact_mut(bps) {
        let s = decode_sample(chunk, format.bit_depth) as i32;
        let scaled = ((s * gain) >> 16) as i16;
        write_in_place(chunk, scaled, format.bit_depth);
    }
}

/// Add `src` into `dst` sample by sample with saturation. Extra bytes on
/// either side are left untouched.
pub fn mix_into(dst: &mut [u8], src: &[u8], format: SampleFormat) {
    let bps = format.bytes_per_sample();
    for (d, s) in dst.chunks_exact_mut(bps).zip(src.chunks_exact(bps)) {
        let a = decode_sample(d, format.bit_depth) as i32;
        let b = decode_sample(s, format.bit_depth) as i32;
        let sum = (a + b).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        write_in_place(d, sum, format.bit_depth);
    }
}

#[inline]
fn write_in_place(chunk: &mut [u8], sample: i16, bit_depth: u16) {
    if bit_depth == 8 {
        chunk[0] = ((sample >> 8) + 0x80) as u8;
    } else {
        chunk.copy_from_slice(&sample.to_le_bytes());
    }
}
