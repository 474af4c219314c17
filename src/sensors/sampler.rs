//! Raw analog sampling.
//!
//! A [`RawSampler`] is the only view the rest of the crate has of an ADC
//! channel: it hands out one quantized sample per call. Hardware backends
//! live in [`crate::sensors::adc`]; the samplers here are pure software and
//! are used for hosts without an ADC and for tests.

use crate::error::{MonitorError, Result};
use crate::ADC_MAX;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A single quantized ADC reading in `0..=ADC_MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RawSample(u16);

impl RawSample {
    /// Lowest possible reading.
    pub const MIN: Self = Self(0);
    /// Full-scale reading.
    pub const MAX: Self = Self(ADC_MAX);

    /// Create a sample, saturating values above full scale.
    pub fn new(value: u16) -> Self {
        Self(value.min(ADC_MAX))
    }

    /// The raw count.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl From<RawSample> for f64 {
    fn from(sample: RawSample) -> Self {
        f64::from(sample.0)
    }
}

/// Capability to read one raw sample from an analog channel.
///
/// Implementations block only for the hardware conversion time. They take
/// `&self` because every connection handler reads the same channels
/// concurrently; backends that need exclusive bus access guard it
/// internally.
pub trait RawSampler: Send + Sync {
    /// Read a single sample.
    fn read(&self) -> Result<RawSample>;
}

impl<S: RawSampler + ?Sized> RawSampler for Arc<S> {
    fn read(&self) -> Result<RawSample> {
        (**self).read()
    }
}

impl<S: RawSampler + ?Sized> RawSampler for Box<S> {
    fn read(&self) -> Result<RawSample> {
        (**self).read()
    }
}

/// Sampler that always returns the same value until told otherwise.
#[derive(Debug)]
pub struct ConstantSampler {
    value: AtomicU16,
}

impl ConstantSampler {
    /// Create a sampler pinned at `value` (saturated to full scale).
    pub fn new(value: u16) -> Self {
        Self {
            value: AtomicU16::new(RawSample::new(value).value()),
        }
    }

    /// Change the value returned by subsequent reads.
    pub fn set(&self, value: u16) {
        self.value
            .store(RawSample::new(value).value(), Ordering::Relaxed);
    }
}

impl RawSampler for ConstantSampler {
    fn read(&self) -> Result<RawSample> {
        Ok(RawSample(self.value.load(Ordering::Relaxed)))
    }
}

/// Sampler that replays a fixed sequence, wrapping around at the end.
#[derive(Debug)]
pub struct SequenceSampler {
    samples: Vec<RawSample>,
    cursor: Mutex<usize>,
    reads: AtomicUsize,
}

impl SequenceSampler {
    /// Create a sampler over `values`. The sequence must not be empty.
    pub fn new(values: impl IntoIterator<Item = u16>) -> Result<Self> {
        let samples: Vec<RawSample> = values.into_iter().map(RawSample::new).collect();
        if samples.is_empty() {
            return Err(MonitorError::sampler_error(
                "sequence sampler needs at least one sample",
            ));
        }

        Ok(Self {
            samples,
            cursor: Mutex::new(0),
            reads: AtomicUsize::new(0),
        })
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl RawSampler for SequenceSampler {
    fn read(&self) -> Result<RawSample> {
        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| MonitorError::sampler_error("sequence sampler lock poisoned"))?;
        let sample = self.samples[*cursor];
        *cursor = (*cursor + 1) % self.samples.len();
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(sample)
    }
}

/// Deterministic triangle wave around a midpoint.
///
/// Stands in for a real channel on machines without an ADC so the page and
/// the `watch` command show moving values.
#[derive(Debug)]
pub struct SyntheticSampler {
    center: i32,
    amplitude: i32,
    period: u32,
    tick: AtomicU32,
}

impl SyntheticSampler {
    /// Create a wave of `amplitude` counts around `center`, repeating every
    /// `period` reads.
    pub fn new(center: u16, amplitude: u16, period: u32) -> Self {
        Self {
            center: i32::from(center),
            amplitude: i32::from(amplitude),
            period: period.max(2),
            tick: AtomicU32::new(0),
        }
    }
}

impl RawSampler for SyntheticSampler {
    fn read(&self) -> Result<RawSample> {
        let period = i64::from(self.period);
        let tick = i64::from(self.tick.fetch_add(1, Ordering::Relaxed) % self.period);
        let half = period / 2;
        let position = if tick <= half { tick } else { period - tick };

        let center = i64::from(self.center);
        let amplitude = i64::from(self.amplitude);
        let value = center - amplitude + 2 * amplitude * position / half;
        let clamped = value.clamp(0, i64::from(ADC_MAX));
        Ok(RawSample::new(clamped as u16))
    }
}
