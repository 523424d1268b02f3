//! The container-runtime interface consumed by the stats provider.
//!
//! The runtime manages pod sandboxes (the shared execution context of a pod)
//! and the containers running inside them, and reports raw per-container
//! resource counters. Each listing call returns a snapshot as of call time;
//! there is no streaming. Listings taken back to back may disagree, since
//! the runtime mutates state concurrently, and callers are expected to
//! tolerate records that reference entities missing from a sibling listing.

use std::collections::HashMap;

use crate::container::ContainerID;

mod error;

pub use error::{Error, Result};

/// The state of a pod sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    /// The sandbox is set up and able to host running containers.
    Ready,
    /// The sandbox has been torn down or is still being created.
    NotReady,
}

/// Identifying metadata of a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxMetadata {
    pub name: String,
    pub uid: String,
    pub namespace: String,
    /// How many times this sandbox has been (re-)created for its pod.
    pub attempt: u32,
}

/// A pod sandbox as enumerated by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSandbox {
    pub id: String,
    pub metadata: SandboxMetadata,
    pub state: SandboxState,
    /// Creation time, nanoseconds since the UNIX epoch.
    pub created_at: i64,
}

/// The state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Exited,
    Unknown,
}

/// A container as enumerated by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: ContainerID,
    /// Id of the sandbox this container runs in.
    pub pod_sandbox_id: String,
    pub name: String,
    pub state: ContainerState,
    /// Creation time, nanoseconds since the UNIX epoch.
    pub created_at: i64,
    pub labels: HashMap<String, String>,
}

/// Identifies which container a [`ContainerStatsRecord`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAttributes {
    pub id: ContainerID,
    pub name: String,
    pub labels: HashMap<String, String>,
}

/// Cumulative CPU usage reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuUsage {
    /// Sample time, nanoseconds since the UNIX epoch.
    pub timestamp: i64,
    /// Cumulative CPU time consumed, in core-nanoseconds. `None` means the
    /// runtime could not supply the counter, not zero usage.
    pub usage_core_nano_seconds: Option<u64>,
}

/// Memory usage reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Sample time, nanoseconds since the UNIX epoch.
    pub timestamp: i64,
    pub working_set_bytes: Option<u64>,
}

/// Identifies a filesystem, used to cache capacity lookups across containers
/// sharing one filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilesystemIdentifier {
    pub mountpoint: String,
}

/// Usage of a container's writable layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemUsage {
    /// Sample time, nanoseconds since the UNIX epoch.
    pub timestamp: i64,
    pub fs_id: Option<FilesystemIdentifier>,
    pub used_bytes: Option<u64>,
    pub inodes_used: Option<u64>,
}

/// A raw per-container stats record.
///
/// Every metric block is optional: runtimes differ in what they can report,
/// and a missing block means "unknown" rather than zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatsRecord {
    pub attributes: ContainerAttributes,
    pub cpu: Option<CpuUsage>,
    pub memory: Option<MemoryUsage>,
    pub writable_layer: Option<FilesystemUsage>,
}

/// Listing operations of the container runtime.
pub trait RuntimeService: Send + Sync {
    /// Lists all containers known to the runtime, including exited ones.
    fn list_containers(&self) -> impl std::future::Future<Output = Result<Vec<Container>>> + Send;

    /// Lists all pod sandboxes known to the runtime, including not-ready ones.
    fn list_pod_sandboxes(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<PodSandbox>>> + Send;

    /// Lists raw stats records for all containers the runtime can sample.
    fn list_container_stats(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ContainerStatsRecord>>> + Send;
}
