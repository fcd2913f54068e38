//! Loudness and channel metrics derived from decoded audio

use crate::loader::AudioData;
use serde::{Deserialize, Serialize};

/// Level below which audio is treated as silence (dBFS)
pub const MIN_VOLUME_DB: f64 = -120.0;

/// Linear amplitude matching [`MIN_VOLUME_DB`]
pub fn silence_floor() -> f64 {
    10f64.powf(MIN_VOLUME_DB / 20.0)
}

/// Per-channel level metrics of one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetrics {
    /// RMS level per channel in dBFS, floored at [`MIN_VOLUME_DB`]
    pub rms_dbfs: Vec<f64>,

    /// Sample peak per channel in dBFS, floored at [`MIN_VOLUME_DB`]
    pub max_dbfs: Vec<f64>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Duration in seconds
    pub duration: f64,
}

impl AudioMetrics {
    /// Calculate metrics from decoded audio
    pub fn calculate(audio: &AudioData) -> Self {
        let rms_dbfs = audio
            .channels
            .iter()
            .map(|ch| amplitude_to_dbfs(rms(ch)))
            .collect();
        let max_dbfs = audio
            .channels
            .iter()
            .map(|ch| amplitude_to_dbfs(peak(ch)))
            .collect();

        Self {
            rms_dbfs,
            max_dbfs,
            sample_rate: audio.sample_rate,
            duration: audio.duration(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.rms_dbfs.len()
    }

    /// Mean of the per-channel RMS levels
    pub fn mean_rms_dbfs(&self) -> f64 {
        mean(&self.rms_dbfs)
    }

    /// Mean of the per-channel peak levels
    pub fn mean_max_dbfs(&self) -> f64 {
        mean(&self.max_dbfs)
    }

    /// Loudness spread between the loudest and quietest channel
    pub fn channel_spread_db(&self) -> f64 {
        let max = self.rms_dbfs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.rms_dbfs.iter().copied().fold(f64::INFINITY, f64::min);
        if self.rms_dbfs.is_empty() {
            0.0
        } else {
            max - min
        }
    }
}

/// Convert linear amplitude to dBFS, clamping at the silence floor
pub fn amplitude_to_dbfs(amplitude: f64) -> f64 {
    20.0 * amplitude.max(silence_floor()).log10()
}

fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

fn peak(samples: &[f64]) -> f64 {
    samples.iter().map(|s| s.abs()).fold(0.0, f64::max)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return MIN_VOLUME_DB;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
