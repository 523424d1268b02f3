//! Snapshot types returned to the host-telemetry caller.
//!
//! Every counter is `Option<u64>`: `None` means the value is unknown, which
//! is different from a measured zero. The distinction survives serialization
//! (`None` becomes `null`), so downstream consumers can tell "no data" from
//! "idle". All timestamps are nanoseconds since the UNIX epoch.

use std::collections::HashMap;

use crate::container::PodReference;

/// Aggregated statistics of one pod and its containers, produced by a single
/// reconciliation pass. Never mutated after being returned.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct PodStats {
    pub pod_ref: PodReference,
    /// The pod sandbox's creation time.
    pub start_time: i64,
    pub containers: Vec<ContainerStats>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub network: Option<NetworkStats>,
    pub disk_io: Option<DiskIoStats>,
    pub process_stats: Option<ProcessStats>,
}

/// Statistics of one container, merged from the runtime record and the
/// accounting subsystem's sample.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ContainerStats {
    pub name: String,
    /// The container's creation time.
    pub start_time: i64,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub rootfs: Option<FsStats>,
    pub disk_io: Option<DiskIoStats>,
    pub process_stats: Option<ProcessStats>,
    pub user_defined_metrics: Vec<UserDefinedMetric>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CpuStats {
    pub timestamp: i64,
    /// Instantaneous usage rate in nanocores (1e-9 of a logical core).
    pub usage_nano_cores: Option<u64>,
    /// Cumulative CPU time consumed, in core-nanoseconds.
    pub usage_core_nano_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MemoryStats {
    pub timestamp: i64,
    pub available_bytes: Option<u64>,
    pub usage_bytes: Option<u64>,
    pub working_set_bytes: Option<u64>,
    pub rss_bytes: Option<u64>,
    pub page_faults: Option<u64>,
    pub major_page_faults: Option<u64>,
}

/// Filesystem stats of a container's writable layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FsStats {
    pub timestamp: i64,
    pub available_bytes: Option<u64>,
    pub capacity_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
    pub inodes_free: Option<u64>,
    pub inodes: Option<u64>,
    pub inodes_used: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NetworkStats {
    pub timestamp: i64,
    pub interfaces: Vec<InterfaceStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct InterfaceStats {
    pub name: String,
    pub rx_bytes: Option<u64>,
    pub rx_errors: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub tx_errors: Option<u64>,
}

/// Per-device disk I/O counters, keyed by device name.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DiskIoStats {
    pub timestamp: i64,
    pub devices: HashMap<String, DeviceIoStats>,
}

impl DiskIoStats {
    /// Adds another set of counters device by device. The timestamp advances
    /// to the newer of the two.
    pub fn add(&mut self, other: &DiskIoStats) {
        for (device, io) in &other.devices {
            *self.devices.entry(device.clone()).or_default() += *io;
        }
        if other.timestamp > self.timestamp {
            self.timestamp = other.timestamp;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeviceIoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

impl std::ops::AddAssign for DeviceIoStats {
    fn add_assign(&mut self, rhs: Self) {
        self.read_bytes += rhs.read_bytes;
        self.write_bytes += rhs.write_bytes;
        self.read_ops += rhs.read_ops;
        self.write_ops += rhs.write_ops;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ProcessStats {
    pub process_count: u64,
    pub fd_count: u64,
    pub socket_count: u64,
    pub threads_current: u64,
    pub threads_max: u64,
}

impl std::ops::AddAssign for ProcessStats {
    fn add_assign(&mut self, rhs: Self) {
        self.process_count += rhs.process_count;
        self.fd_count += rhs.fd_count;
        self.socket_count += rhs.socket_count;
        self.threads_current += rhs.threads_current;
        self.threads_max += rhs.threads_max;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UserDefinedMetricType {
    Gauge,
    Cumulative,
}

/// Latest observation of a custom metric the accounting subsystem exposes for
/// a container.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UserDefinedMetric {
    pub name: String,
    pub units: String,
    pub metric_type: UserDefinedMetricType,
    pub timestamp: i64,
    pub value: f64,
}
