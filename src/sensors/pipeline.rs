//! Sensor acquisition pipeline: calibrated channels to snapshots.

use crate::error::Result;
use crate::sensors::calibration::{CalibrationParameters, SensorSettings, ZeroCalibrator};
use crate::sensors::channels::{CurrentChannel, VoltageChannel};
use crate::sensors::data::ReadingSnapshot;
use crate::sensors::sampler::RawSampler;
use futures_util::stream::{self, BoxStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Both calibrated channels plus the calibration they share.
///
/// A pipeline can only be built from finished [`CalibrationParameters`],
/// which makes it the readiness barrier for everything downstream: the
/// server takes a pipeline, so it cannot accept before calibration is done.
pub struct SensorPipeline {
    voltage: VoltageChannel,
    current: CurrentChannel,
    calibration: Arc<CalibrationParameters>,
}

impl SensorPipeline {
    /// Assemble a pipeline from samplers and finished calibration.
    pub fn new(
        voltage: Box<dyn RawSampler>,
        current: Box<dyn RawSampler>,
        calibration: CalibrationParameters,
    ) -> Self {
        let calibration = Arc::new(calibration);
        Self {
            voltage: VoltageChannel::new(voltage, Arc::clone(&calibration)),
            current: CurrentChannel::new(current, Arc::clone(&calibration)),
            calibration,
        }
    }

    /// Run the zero-current pass on `current`, then assemble the pipeline.
    ///
    /// Blocks the calling thread for the duration of the pass.
    pub fn calibrate(
        settings: SensorSettings,
        calibrator: &ZeroCalibrator,
        voltage: Box<dyn RawSampler>,
        current: Box<dyn RawSampler>,
    ) -> Result<Self> {
        let calibration = calibrator.calibrate(settings, current.as_ref())?;
        Ok(Self::new(voltage, current, calibration))
    }

    /// Calibration in effect for every reading.
    pub fn calibration(&self) -> &CalibrationParameters {
        &self.calibration
    }

    /// Read voltage then current into one snapshot.
    pub fn capture(&self) -> Result<ReadingSnapshot> {
        let voltage = self.voltage.read_voltage()?;
        let current = self.current.read_current()?;
        Ok(ReadingSnapshot::new(voltage, current))
    }

    /// Capture a snapshot every `interval_ms`, starting immediately.
    ///
    /// The stream ends at the first sampler failure.
    pub fn stream(self: Arc<Self>, interval_ms: u64) -> BoxStream<'static, ReadingSnapshot> {
        let period = Duration::from_millis(interval_ms.max(1));

        let stream = stream::unfold(
            (self, None::<Interval>),
            move |(pipeline, interval)| async move {
                let mut interval = interval.unwrap_or_else(|| {
                    let mut interval = time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    interval
                });
                interval.tick().await;

                match pipeline.capture() {
                    Ok(snapshot) => Some((snapshot, (pipeline, Some(interval)))),
                    Err(err) => {
                        tracing::error!("Failed to capture sensor snapshot: {}", err);
                        None
                    }
                }
            },
        );

        Box::pin(stream)
    }
}
