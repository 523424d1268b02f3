//! Conversion of cumulative CPU counters into instantaneous nanocore rates.
//!
//! The container runtime only reports cumulative core-nanoseconds, so a rate
//! has to be derived by differencing against the previous sample. The cache
//! remembers that previous sample per container. One authoritative caller
//! updates the baseline each polling interval; any number of read-only
//! callers may observe the last computed rate concurrently.

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::container::ContainerID;
use crate::runtime::CpuUsage;

/// How long an unseen container's record is retained before eviction.
pub(crate) const DEFAULT_CACHE_RETENTION: Duration = Duration::from_secs(10 * 60);

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy)]
struct UsageRecord {
    /// The last raw sample observed for the container.
    stats: CpuUsage,
    /// The rate computed from the previous two samples, if any.
    usage_nano_cores: Option<u64>,
}

/// Per-container CPU rate cache, shared across concurrent reconciliation
/// passes. Reads take shard-level shared locks; updates and the eviction
/// sweep take exclusive ones. No lock is ever held across an await point.
#[derive(Debug, Default)]
pub(crate) struct CpuUsageCache {
    records: DashMap<ContainerID, UsageRecord>,
}

impl CpuUsageCache {
    /// Returns the last computed nanocore rate for the container without
    /// touching the baseline.
    pub(crate) fn cached_rate(&self, id: &str) -> Option<u64> {
        self.records.get(id).and_then(|r| r.usage_nano_cores)
    }

    /// Observes a new raw sample for the container and returns the derived
    /// nanocore rate.
    ///
    /// A rate is only emitted when a prior sample exists, the cumulative
    /// counter did not regress (a restart resets it), and the elapsed time is
    /// strictly positive. On any of those failures the new sample still
    /// replaces the baseline so the next pass can compute a rate, but `None`
    /// is returned, never a negative or wrapped-around value. A sample
    /// without a cumulative counter leaves the cache untouched.
    pub(crate) fn observe(&self, id: &ContainerID, sample: CpuUsage) -> Option<u64> {
        let new_usage = sample.usage_core_nano_seconds?;

        let mut entry = match self.records.entry(id.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(UsageRecord {
                    stats: sample,
                    usage_nano_cores: None,
                });
                return None;
            }
            Entry::Occupied(occupied) => occupied,
        };
        let record = entry.get_mut();

        let rate = match record.stats.usage_core_nano_seconds {
            Some(cached_usage) if new_usage >= cached_usage => {
                let elapsed = sample.timestamp - record.stats.timestamp;
                if elapsed > 0 {
                    Some(((new_usage - cached_usage) as f64 / elapsed as f64 * NANOS_PER_SECOND) as u64)
                } else {
                    // The clock did not advance between samples. This should
                    // not happen with a single authoritative caller.
                    log::error!(
                        "zero or negative sample interval ({} - {}) for container `{}`",
                        sample.timestamp,
                        record.stats.timestamp,
                        id
                    );
                    None
                }
            }
            Some(cached_usage) => {
                log::debug!(
                    "cumulative cpu usage of container `{}` regressed ({} < {}), resetting baseline",
                    id,
                    new_usage,
                    cached_usage
                );
                None
            }
            None => None,
        };

        *record = UsageRecord {
            stats: sample,
            usage_nano_cores: rate,
        };
        rate
    }

    /// Removes records that lack a cumulative counter and records whose last
    /// sample is older than `retention` relative to `now` (nanoseconds since
    /// the UNIX epoch).
    pub(crate) fn evict_expired(&self, now: i64, retention: Duration) {
        let cutoff = now.saturating_sub(retention.as_nanos() as i64);
        self.records.retain(|_, record| {
            record.stats.usage_core_nano_seconds.is_some() && record.stats.timestamp >= cutoff
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.records.len()
    }
}
