//! Audio file loading utilities

use crate::{Result, WatchError};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::conv::IntoSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Sample rate reported for placeholder data
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Decoded audio data, one sample vector per channel
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Sample data per channel, normalized to [-1.0, 1.0]
    pub channels: Vec<Vec<f64>>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of frames (samples per channel)
    pub num_frames: usize,

    /// Source file path
    pub source_path: String,
}

impl AudioData {
    /// Single silent mono frame, stands in for audio that could not be read
    pub fn placeholder() -> Self {
        Self {
            channels: vec![vec![0.0]],
            sample_rate: DEFAULT_SAMPLE_RATE,
            num_frames: 1,
            source_path: String::new(),
        }
    }

    /// Build from already decoded channel planes
    pub fn from_channels(channels: Vec<Vec<f64>>, sample_rate: u32) -> Self {
        let num_frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        Self {
            channels,
            sample_rate,
            num_frames,
            source_path: String::new(),
        }
    }

    /// Load audio from file. Files without any frame are rejected.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

        let data = if is_wav {
            Self::load_wav(path, &path_str)?
        } else {
            Self::load_symphonia(path, &path_str)?
        };

        if data.num_frames == 0 || data.channels.is_empty() {
            return Err(WatchError::EmptyAudio(path_str));
        }
        Ok(data)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames as f64 / self.sample_rate as f64
    }

    /// Load WAV file using hound
    fn load_wav(path: &Path, path_str: &str) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| WatchError::Decode(format!("{}: {}", path_str, e)))?;

        let spec = reader.spec();
        let num_channels = spec.channels as usize;
        if num_channels == 0 {
            return Err(WatchError::Decode(format!("{}: zero channels", path_str)));
        }

        let samples: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| WatchError::Decode(format!("{}: {}", path_str, e)))?,
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / max_val))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| WatchError::Decode(format!("{}: {}", path_str, e)))?
            }
        };

        // Deinterleave, dropping a trailing partial frame
        let num_frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(num_frames); num_channels];
        for (i, sample) in samples.into_iter().take(num_frames * num_channels).enumerate() {
            channels[i % num_channels].push(sample);
        }

        Ok(Self {
            channels,
            sample_rate: spec.sample_rate,
            num_frames,
            source_path: path_str.to_string(),
        })
    }

    /// Load audio using symphonia (flac, ogg, mp3, aiff...)
    fn load_symphonia(path: &Path, path_str: &str) -> Result<Self> {
        let decode_err = |e: symphonia::core::errors::Error| {
            WatchError::Decode(format!("{}: {}", path_str, e))
        };

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_err)?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| WatchError::Decode(format!("{}: no audio track", path_str)))?;

        let sample_rate = track.codec_params.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
        let num_channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| WatchError::Decode(format!("{}: unknown channels", path_str)))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(decode_err)?;

        let track_id = track.id;
        let mut channels = vec![Vec::new(); num_channels];

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(decode_err(e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder.decode(&packet).map_err(decode_err)?;
            copy_planes(&decoded, &mut channels);
        }

        let num_frames = channels.iter().map(Vec::len).min().unwrap_or(0);

        Ok(Self {
            channels,
            sample_rate,
            num_frames,
            source_path: path_str.to_string(),
        })
    }
}

/// Append decoded planes to per-channel vectors
fn copy_planes(buffer: &AudioBufferRef, channels: &mut [Vec<f64>]) {
    match buffer {
        AudioBufferRef::U8(buf) => extend_planes(buf, channels),
        AudioBufferRef::U16(buf) => extend_planes(buf, channels),
        AudioBufferRef::U24(buf) => extend_planes(buf, channels),
        AudioBufferRef::U32(buf) => extend_planes(buf, channels),
        AudioBufferRef::S8(buf) => extend_planes(buf, channels),
        AudioBufferRef::S16(buf) => extend_planes(buf, channels),
        AudioBufferRef::S24(buf) => extend_planes(buf, channels),
        AudioBufferRef::S32(buf) => extend_planes(buf, channels),
        AudioBufferRef::F32(buf) => extend_planes(buf, channels),
        AudioBufferRef::F64(buf) => extend_planes(buf, channels),
    }
}

fn extend_planes<S>(buf: &AudioBuffer<S>, channels: &mut [Vec<f64>])
where
    S: Sample + IntoSample<f64>,
{
    let count = buf.spec().channels.count();
    for (ch_idx, channel) in channels.iter_mut().enumerate().take(count) {
        channel.extend(buf.chan(ch_idx).iter().map(|&s| s.into_sample()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, frames: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_placeholder() {
        let data = AudioData::placeholder();
        assert_eq!(data.num_channels(), 1);
        assert_eq!(data.channels[0], vec![0.0]);
        assert_eq!(data.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_load_wav_deinterleaves() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[16384, -16384, 0, 32767]);

        let data = AudioData::load(&path).unwrap();
        assert_eq!(data.num_channels(), 2);
        assert_eq!(data.num_frames, 2);
        assert_eq!(data.sample_rate, 48000);
        assert_eq!(data.channels[0], vec![0.5, 0.0]);
        assert_eq!(data.channels[1][0], -0.5);
    }

    #[test]
    fn test_load_empty_wav_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, 1, &[]);

        assert!(matches!(
            AudioData::load(&path),
            Err(WatchError::EmptyAudio(_))
        ));
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        assert!(matches!(AudioData::load(&path), Err(WatchError::Decode(_))));
    }

    #[test]
    fn test_symphonia_path_16_bit_stereo() {
        let dir = TempDir::new().unwrap();
        // non-.wav extension routes through symphonia
        let path = dir.path().join("stereo.bwf");
        write_wav(&path, 2, &[16384, -8192, 0, 32767, -16384, 8192]);

        let data = AudioData::load(&path).unwrap();
        assert_eq!(data.num_channels(), 2);
        assert_eq!(data.num_frames, 3);
        assert_eq!(data.sample_rate, 48000);
        assert_eq!(data.channels[0].len(), 3);
        assert_abs_diff_eq!(data.channels[0][0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(data.channels[1][0], -0.25, epsilon = 1e-9);
        assert_abs_diff_eq!(data.channels[0][2], -0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(data.channels[1][2], 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_symphonia_path_24_bit_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono24.bwf");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [16384i32, -4_194_304, 0, 4_194_304] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let data = AudioData::load(&path).unwrap();
        assert_eq!(data.num_channels(), 1);
        assert_eq!(data.num_frames, 4);
        assert_eq!(data.sample_rate, 44100);
        let plane = &data.channels[0];
        assert_abs_diff_eq!(plane[0], 0.001953125, epsilon = 1e-9);
        assert_abs_diff_eq!(plane[1], -0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(plane[2], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(plane[3], 0.5, epsilon = 1e-9);
    }
}
