//! The host-level resource-accounting interface consumed by the stats
//! provider.
//!
//! The accounting subsystem watches the host's cgroup hierarchy and keeps a
//! short sample history per cgroup: CPU and memory counters, per-device disk
//! I/O, process counts, network interface counters, and optional
//! user-defined metrics. Its view is independent of the container runtime's
//! and the two drift apart under churn; the provider cross-references both.
//!
//! Infos are keyed by cgroup path. [`infos`] holds the hygiene helpers that
//! turn a raw keyed map into something the reconciler can join against the
//! runtime's listings.

use std::collections::HashMap;

mod error;
mod infos;

pub use error::{Error, Result};
pub use infos::{container_keyed_infos, pod_info_by_uid};

/// Filesystem capacity and usage as known to the accounting subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsInfo {
    /// Sample time, nanoseconds since the UNIX epoch.
    pub timestamp: i64,
    pub device: String,
    pub mountpoint: String,
    pub capacity_bytes: u64,
    pub available_bytes: u64,
    pub inodes: Option<u64>,
    pub inodes_free: Option<u64>,
}

/// Declares a user-defined metric a cgroup exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub name: String,
    pub units: String,
    pub metric_type: MetricType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
    Cumulative,
}

/// A single observation of a user-defined metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricValue {
    /// Observation time, nanoseconds since the UNIX epoch.
    pub timestamp: i64,
    pub value: f64,
}

/// Static description of an accounted cgroup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    /// Creation time, nanoseconds since the UNIX epoch.
    pub creation_time: i64,
    /// Labels propagated from the container runtime, when the cgroup belongs
    /// to a runtime-managed container.
    pub labels: HashMap<String, String>,
    pub has_custom_metrics: bool,
    pub custom_metrics: Vec<MetricSpec>,
}

/// CPU counters of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    /// Cumulative CPU time consumed, in core-nanoseconds.
    pub usage_core_nano_seconds: u64,
    /// Instantaneous usage in nanocores, when the subsystem could derive one.
    pub usage_nano_cores: Option<u64>,
}

/// Memory counters of one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub usage_bytes: u64,
    pub working_set_bytes: u64,
    pub rss_bytes: u64,
    pub available_bytes: Option<u64>,
    pub page_faults: Option<u64>,
    pub major_page_faults: Option<u64>,
}

/// Per-device I/O counters of one sample, keyed by device name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskIoSample {
    pub devices: HashMap<String, DeviceIoSample>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceIoSample {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

/// Process and descriptor counters of one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSample {
    pub process_count: u64,
    pub fd_count: u64,
    pub socket_count: u64,
    pub threads_current: u64,
    pub threads_max: u64,
}

/// Network interface counters of one sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkSample {
    pub interfaces: Vec<InterfaceSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSample {
    pub name: String,
    pub rx_bytes: u64,
    pub rx_errors: u64,
    pub tx_bytes: u64,
    pub tx_errors: u64,
}

/// One timestamped sample of a cgroup's counters. Every block is optional;
/// absence means the subsystem has no data for that family, not zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    /// Sample time, nanoseconds since the UNIX epoch.
    pub timestamp: i64,
    pub cpu: Option<CpuSample>,
    pub memory: Option<MemorySample>,
    pub disk_io: Option<DiskIoSample>,
    pub processes: Option<ProcessSample>,
    pub network: Option<NetworkSample>,
    /// Observed values per user-defined metric name, oldest first.
    pub custom_metrics: HashMap<String, Vec<MetricValue>>,
}

/// An accounted cgroup: its description plus a bounded sample history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerInfo {
    pub spec: ContainerSpec,
    /// Sample history, oldest first.
    pub samples: Vec<Sample>,
}

impl ContainerInfo {
    /// Returns the most recent sample, if any were collected.
    pub fn latest_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Query operations of the resource-accounting subsystem.
pub trait ResourceAccounting: Send + Sync {
    /// Returns all accounted cgroups, keyed by cgroup path.
    fn container_infos(
        &self,
    ) -> impl std::future::Future<Output = Result<HashMap<String, ContainerInfo>>> + Send;

    /// Returns usage information about the host's root filesystem.
    fn root_fs_info(&self) -> impl std::future::Future<Output = Result<FsInfo>> + Send;

    /// Returns usage information for the filesystem mounted at `mountpoint`.
    fn dir_fs_info(
        &self,
        mountpoint: &str,
    ) -> impl std::future::Future<Output = Result<FsInfo>> + Send;
}
