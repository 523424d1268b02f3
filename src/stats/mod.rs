//! Pod and container statistics aggregation.
//!
//! This module reconciles two independent, eventually-inconsistent views of
//! the same containers (the container runtime's raw stat records and the
//! host accounting subsystem's cgroup samples) into one consistent
//! per-pod/per-container snapshot.
//!
//! # Key Components
//!
//! - [`StatsProvider`] — the snapshot reconciler: fetches the listings and
//!   folds every resolvable stat record into its pod's aggregate.
//! - `rate` — remembers the previous cumulative CPU sample per container to
//!   derive instantaneous nanocore rates.
//! - `dedup` — resolves overlapping listings to the single current entry per
//!   logical pod/container identity.
//! - `merge` — fill-in policies preferring accounting data with
//!   runtime-derived fallbacks.
//!
//! # Data Flow
//!
//! raw listings → dedup filters → pairing (container → sandbox) →
//! per-container stat construction (using the rate cache) → per-pod
//! aggregation → snapshot returned to the caller.

mod dedup;
mod error;
mod merge;
mod provider;
mod rate;
mod summary;

pub use error::{Error, Result};
pub use provider::StatsProvider;
pub use summary::{
    ContainerStats, CpuStats, DeviceIoStats, DiskIoStats, FsStats, InterfaceStats, MemoryStats,
    NetworkStats, PodStats, ProcessStats, UserDefinedMetric, UserDefinedMetricType,
};

/// Wall-clock "now" in nanoseconds since the UNIX epoch.
pub(crate) fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_nanos() as i64
}
