//! Session data usage accounting.
//!
//! Real tunnel byte counters are preferred. When the OS exposes none, a
//! synthetic model fills in and every update says which path it took.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::collector::run_checked;
use super::executor::CommandExecutor;
use super::probes::Platform;
use crate::config::EstimationConfig;
use crate::constants;
use crate::state::{UsageCounters, VpnStatus};

/// Where the last usage increment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageSource {
    /// Delta of kernel interface counters.
    Measured,
    /// Synthetic traffic model.
    Estimated,
}

impl std::fmt::Display for UsageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageSource::Measured => write!(f, "measured"),
            UsageSource::Estimated => write!(f, "estimated"),
        }
    }
}

/// Usage counters plus the bookkeeping needed to keep them monotonic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageState {
    pub counters: UsageCounters,
    /// Last kernel reading, the baseline for the next delta.
    pub baseline: Option<UsageCounters>,
    pub last_source: Option<UsageSource>,
}

impl UsageState {
    #[must_use]
    pub fn with_counters(counters: UsageCounters) -> Self {
        Self {
            counters,
            ..Self::default()
        }
    }

    /// Zeroes the counters and forgets the baseline.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True if the counters are currently an estimate.
    #[must_use]
    pub fn is_estimated(&self) -> bool {
        self.last_source == Some(UsageSource::Estimated)
    }
}

/// Source of cumulative tunnel byte counters.
pub trait InterfaceStats {
    /// Kernel totals across tunnel interfaces, or `None` if unavailable.
    fn read(&self) -> Option<UsageCounters>;
}

/// Reads counters with `netstat -ib` or `/proc/net/dev`.
pub struct CommandInterfaceStats {
    executor: Rc<dyn CommandExecutor>,
    platform: Platform,
}

impl CommandInterfaceStats {
    #[must_use]
    pub fn new(executor: Rc<dyn CommandExecutor>, platform: Platform) -> Self {
        Self { executor, platform }
    }
}

impl InterfaceStats for CommandInterfaceStats {
    fn read(&self) -> Option<UsageCounters> {
        match run_checked(
            self.executor.as_ref(),
            &self.platform.interface_stats_command(),
        ) {
            Ok(out) => self.platform.parse_interface_stats(&out),
            Err(e) => {
                log::debug!("Interface counters unavailable: {e}");
                None
            }
        }
    }
}

/// Produces the bytes moved during one tick when nothing can be measured.
pub trait TrafficEstimator {
    /// `local_hour` is 0-23 in the user's time zone.
    fn estimate(&mut self, local_hour: u32) -> UsageCounters;
}

/// Randomised traffic: `base_rate × U(min_variation, max_variation)` up,
/// doubled in business hours, with download a random 2-5× of upload.
pub struct SyntheticTraffic<R: Rng = StdRng> {
    config: EstimationConfig,
    rng: R,
}

impl SyntheticTraffic<StdRng> {
    #[must_use]
    pub fn from_entropy(config: EstimationConfig) -> Self {
        Self::new(config, StdRng::from_entropy())
    }
}

impl<R: Rng> SyntheticTraffic<R> {
    pub fn new(config: EstimationConfig, rng: R) -> Self {
        Self { config, rng }
    }
}

impl<R: Rng> TrafficEstimator for SyntheticTraffic<R> {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn estimate(&mut self, local_hour: u32) -> UsageCounters {
        let c = &self.config;
        let (lo, hi) = ordered(
            finite_or(c.min_variation, constants::DEFAULT_MIN_VARIATION),
            finite_or(c.max_variation, constants::DEFAULT_MAX_VARIATION),
        );
        let variation = self.rng.gen_range(lo..=hi);
        let multiplier = if c.is_business_hour(local_hour) {
            finite_or(c.business_hours_multiplier, constants::DEFAULT_BUSINESS_MULTIPLIER)
        } else {
            1.0
        };
        let uploaded = (c.base_rate as f64 * variation * multiplier) as u64;

        let (lo, hi) = ordered(c.min_download_ratio, c.max_download_ratio);
        let ratio = self.rng.gen_range(lo..=hi);

        UsageCounters {
            uploaded,
            downloaded: uploaded.saturating_mul(ratio),
        }
    }
}

/// Non-negative finite `value`, or `fallback` for NaN and infinities.
fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Advances [`UsageState`] once per tick while connected.
pub struct DataUsageTracker {
    stats: Box<dyn InterfaceStats>,
    estimator: Box<dyn TrafficEstimator>,
}

impl DataUsageTracker {
    #[must_use]
    pub fn new(stats: Box<dyn InterfaceStats>, estimator: Box<dyn TrafficEstimator>) -> Self {
        Self { stats, estimator }
    }

    /// Updates `usage` and returns the path taken, or `None` if not connected.
    ///
    /// The first kernel reading of a session only sets the baseline.
    /// Falling back to the estimator drops the baseline so traffic seen by
    /// the kernel in the meantime is not counted twice.
    pub fn update(
        &mut self,
        usage: &mut UsageState,
        status: VpnStatus,
        local_hour: u32,
    ) -> Option<UsageSource> {
        if !status.is_connected() {
            return None;
        }

        let source = if let Some(reading) = self.stats.read() {
            if let Some(base) = usage.baseline {
                usage.counters.add(UsageCounters {
                    uploaded: reading.uploaded.saturating_sub(base.uploaded),
                    downloaded: reading.downloaded.saturating_sub(base.downloaded),
                });
            }
            usage.baseline = Some(reading);
            UsageSource::Measured
        } else {
            usage.baseline = None;
            usage.counters.add(self.estimator.estimate(local_hour));
            UsageSource::Estimated
        };

        if usage.last_source != Some(source) {
            log::debug!("Data usage is now {source}");
        }
        usage.last_source = Some(source);
        Some(source)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{InterfaceStats, TrafficEstimator};
    use crate::state::UsageCounters;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Returns queued readings in order, then `None`.
    #[derive(Default)]
    pub struct FixedInterfaceStats {
        pub readings: RefCell<VecDeque<Option<UsageCounters>>>,
    }

    impl FixedInterfaceStats {
        pub fn new(readings: impl IntoIterator<Item = Option<UsageCounters>>) -> Self {
            Self {
                readings: RefCell::new(readings.into_iter().collect()),
            }
        }
    }

    impl InterfaceStats for FixedInterfaceStats {
        fn read(&self) -> Option<UsageCounters> {
            self.readings.borrow_mut().pop_front().flatten()
        }
    }

    /// Same increment every tick; records the hours it was asked about.
    pub struct FixedTraffic {
        pub per_tick: UsageCounters,
        pub hours: Vec<u32>,
    }

    impl FixedTraffic {
        pub fn new(uploaded: u64, downloaded: u64) -> Self {
            Self {
                per_tick: UsageCounters {
                    uploaded,
                    downloaded,
                },
                hours: Vec::new(),
            }
        }
    }

    impl TrafficEstimator for FixedTraffic {
        fn estimate(&mut self, local_hour: u32) -> UsageCounters {
            self.hours.push(local_hour);
            self.per_tick
        }
    }
}
