//! Byte packing for the projector's serial link.
//!
//! Every tick becomes eight bytes: 5-bit colour channels, 12-bit scanner
//! coordinates and two 12-bit audio channels. Samples are shipped in fixed
//! batches (32 samples, 256 bytes, by default).

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::{
    frame::{FrameSample, OutputFrame},
    render::FrameSink,
    LaserError, Result,
};

/// Size of one packed sample in bytes.
pub const SAMPLE_BYTES: usize = 8;

const COLOR_MAX: u8 = 0x1F;
const TWELVE_BITS: u16 = 0x0FFF;

/// Everything the hardware receives for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub x: u16,
    pub y: u16,
    pub audio_l: u16,
    pub audio_r: u16,
}

impl From<&FrameSample> for WireSample {
    fn from(sample: &FrameSample) -> Self {
        Self {
            r: sample.r,
            g: sample.g,
            b: sample.b,
            x: sample.x,
            y: sample.y,
            audio_l: 0,
            audio_r: 0,
        }
    }
}

/// Packs one sample. Colour is clamped to 5 bits here, not in the engine.
/// Green's low three bits are taken before clamping; its top two bits come
/// from the clamped value.
pub fn pack_sample(sample: &WireSample) -> [u8; SAMPLE_BYTES] {
    let r = sample.r.min(COLOR_MAX);
    let g = sample.g.min(COLOR_MAX);
    let b = sample.b.min(COLOR_MAX);
    let x = sample.x & TWELVE_BITS;
    let y = sample.y & TWELVE_BITS;
    let audio_l = sample.audio_l & TWELVE_BITS;
    let audio_r = sample.audio_r & TWELVE_BITS;

    [
        r | ((sample.g & 0x07) << 5),
        ((g >> 3) & 0x03) | (b << 2),
        x as u8,
        (((x >> 8) as u8) & 0x0F) | (((y << 4) as u8) & 0xF0),
        (y >> 4) as u8,
        audio_l as u8,
        (((audio_l >> 8) as u8) & 0x0F) | (((audio_r << 4) as u8) & 0xF0),
        (audio_r >> 4) as u8,
    ]
}

/// Packs frames into fixed-size batches and writes each full batch.
#[derive(Debug)]
pub struct WireSink<W: Write> {
    out: W,
    batch_samples: usize,
    buffer: Vec<u8>,
    batches_written: u64,
}

impl<W: Write> WireSink<W> {
    pub fn new(out: W, batch_samples: usize) -> Result<Self> {
        if batch_samples == 0 {
            return Err(LaserError::msg("wire batches must hold at least one sample"));
        }
        Ok(Self {
            out,
            batch_samples,
            buffer: Vec::with_capacity(batch_samples * SAMPLE_BYTES),
            batches_written: 0,
        })
    }

    pub fn batch_bytes(&self) -> usize {
        self.batch_samples * SAMPLE_BYTES
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn push(&mut self, sample: &WireSample) -> Result<()> {
        self.buffer.extend_from_slice(&pack_sample(sample));
        if self.buffer.len() == self.batch_bytes() {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> Result<()> {
        self.out.write_all(&self.buffer)?;
        self.buffer.clear();
        self.batches_written += 1;
        Ok(())
    }
}

impl<W: Write> FrameSink for WireSink<W> {
    fn consume(&mut self, frame: &OutputFrame) -> Result<()> {
        for sample in frame.samples() {
            self.push(&WireSample::from(sample))?;
        }
        Ok(())
    }

    /// Pads a trailing partial batch with blank samples (beam at the origin,
    /// colour off) so the receiver always sees whole batches.
    fn finish(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            let blank = pack_sample(&WireSample::default());
            while self.buffer.len() < self.batch_bytes() {
                self.buffer.extend_from_slice(&blank);
            }
            self.flush_batch()?;
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_reference_layout() {
        let sample = WireSample {
            r: 31,
            g: 31,
            b: 31,
            x: 0xABC,
            y: 0x123,
            audio_l: 0x456,
            audio_r: 0x789,
        };
        assert_eq!(
            pack_sample(&sample),
            [0xFF, 0x7F, 0xBC, 0x3A, 0x12, 0x56, 0x94, 0x78]
        );
    }

    #[test]
    fn splits_green_across_first_two_bytes() {
        let sample = WireSample {
            g: 0b10101,
            ..Default::default()
        };
        let packed = pack_sample(&sample);
        assert_eq!(packed[0], 0b101 << 5);
        assert_eq!(packed[1], 0b10);
    }

    #[test]
    fn clamps_red_and_blue_to_five_bits() {
        let bright = WireSample {
            r: 200,
            b: 32,
            ..Default::default()
        };
        let full = WireSample {
            r: 31,
            b: 31,
            ..Default::default()
        };
        assert_eq!(pack_sample(&bright), pack_sample(&full));
        assert_eq!(pack_sample(&bright)[1] & 0x80, 0);
    }

    #[test]
    fn green_low_bits_are_unclamped() {
        let sample = WireSample {
            g: 40,
            ..Default::default()
        };
        let packed = pack_sample(&sample);
        // 40 & 0b111 == 0; clamped 31 >> 3 == 0b11
        assert_eq!(packed[0], 0x00);
        assert_eq!(packed[1], 0x03);

        let odd = WireSample {
            g: 45,
            ..Default::default()
        };
        let packed = pack_sample(&odd);
        assert_eq!(packed[0], 0b101 << 5);
        assert_eq!(packed[1], 0x03);
    }

    #[test]
    fn coordinates_use_twelve_bits() {
        let sample = WireSample {
            x: 4095,
            y: 4095,
            ..Default::default()
        };
        assert_eq!(&pack_sample(&sample)[2..5], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn writes_whole_batches_and_pads_the_tail() {
        let mut frame = OutputFrame::new(0, 40);
        frame.sample_mut(0).x = 1;
        let mut sink = WireSink::new(Vec::new(), 32).unwrap();

        sink.consume(&frame).unwrap();
        assert_eq!(sink.batches_written(), 1);
        sink.finish().unwrap();
        assert_eq!(sink.batches_written(), 2);

        let bytes = sink.into_inner();
        assert_eq!(bytes.len(), 2 * 256);
        assert_eq!(bytes[2], 1);
        assert!(bytes[256..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_empty_batches() {
        assert!(WireSink::new(Vec::new(), 0).is_err());
    }
}
