//! Telemetry persistence seam.

use crate::error::Result;
use crate::model::TelemetrySample;

/// Destination for every telemetry sample a device produces.
///
/// Runners call [`write`](TelemetrySink::write) once per tick after the
/// sample has been published. Errors are logged by the runner and never
/// stop the simulation.
pub trait TelemetrySink: Send + Sync {
    /// Record one sample.
    fn write(&mut self, sample: &TelemetrySample) -> Result<()>;
}

impl TelemetrySink for Vec<TelemetrySample> {
    fn write(&mut self, sample: &TelemetrySample) -> Result<()> {
        self.push(sample.clone());
        Ok(())
    }
}
