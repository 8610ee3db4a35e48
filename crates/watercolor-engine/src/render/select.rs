use anyhow::Result;

use super::gpu::{GpuProbe, GpuTier};
use super::null::NullBackend;
use super::software::SoftwareProbe;
use super::WatercolorBackend;

/// One step of the backend fallback chain.
pub trait BackendProbe {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Attempts to bring the backend up. Errors move selection to the next probe.
    fn probe(&self) -> Result<Box<dyn WatercolorBackend>>;
}

/// The standard chain: primary GPU, compatibility GPU, software.
pub fn default_probes() -> Vec<Box<dyn BackendProbe>> {
    vec![
        Box::new(GpuProbe::new(GpuTier::Primary)),
        Box::new(GpuProbe::new(GpuTier::Compat)),
        Box::new(SoftwareProbe),
    ]
}

/// Returns the first backend whose probe succeeds, or the null backend.
///
/// Probes run in order and stop at the first success.
pub fn select_backend(probes: &[Box<dyn BackendProbe>]) -> Box<dyn WatercolorBackend> {
    for probe in probes {
        match probe.probe() {
            Ok(backend) => {
                log::info!("watercolor backend: {} ({})", backend.kind(), probe.name());
                return backend;
            }
            Err(e) => log::info!("watercolor backend {} unavailable: {e:#}", probe.name()),
        }
    }
    log::warn!("no watercolor backend available; overlays will stay blank");
    Box::new(NullBackend::new())
}
