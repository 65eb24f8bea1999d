use std::time::Duration;

pub(crate) const ERROR_BAND: f64 = 0.1;
pub(crate) const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) const RECOVERY_INCREASE: usize = 1;
pub(crate) const MAX_WORKERS: usize = 10_000;
