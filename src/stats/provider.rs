//! The snapshot reconciler.
//!
//! Cross-references the runtime's listings (containers, pod sandboxes, raw
//! stat records) against the accounting subsystem's cgroup infos and builds
//! one [`PodStats`] aggregate per live sandbox. The listings are fetched
//! sequentially, since the snapshot should be "almost consistent" and
//! consistency across fetches matters more than latency. Any fetch failure
//! aborts the pass. Records that reference a container or sandbox missing from a
//! sibling listing are skipped: the runtime mutates state between calls and
//! such churn is expected.

use std::collections::HashMap;

use crate::accounting::{
    self, ContainerInfo, FsInfo, ResourceAccounting, container_keyed_infos, pod_info_by_uid,
};
use crate::container::{ContainerID, PodReference};
use crate::runtime::{
    Container, ContainerStatsRecord, FilesystemIdentifier, PodSandbox, RuntimeService,
};

use super::dedup::{select_current_sandboxes, select_running_containers};
use super::error::{Error, Result};
use super::merge;
use super::now_nanos;
use super::rate::{CpuUsageCache, DEFAULT_CACHE_RETENTION};
use super::summary::{ContainerStats, CpuStats, FsStats, MemoryStats, PodStats};

/// Aggregates per-pod statistics from a container runtime and the host's
/// resource-accounting subsystem.
///
/// The provider itself is stateless across passes except for the CPU rate
/// cache, so a single instance can serve a periodic poller and any number of
/// concurrent on-demand readers.
pub struct StatsProvider<R, A> {
    runtime: R,
    accounting: A,
    cpu_usage_cache: CpuUsageCache,
}

/// Deduplicated listings of one pass, indexed for cross-referencing.
struct Listings {
    sandboxes: HashMap<String, PodSandbox>,
    containers: HashMap<ContainerID, Container>,
    records: Vec<ContainerStatsRecord>,
}

impl<R, A> StatsProvider<R, A>
where
    R: RuntimeService,
    A: ResourceAccounting,
{
    pub fn new(runtime: R, accounting: A) -> Self {
        Self {
            runtime,
            accounting,
            cpu_usage_cache: CpuUsageCache::default(),
        }
    }

    /// Returns stats for all pod-managed containers without updating the CPU
    /// rate baseline: rates are read from the cache as computed by the last
    /// authoritative pass.
    pub async fn list_pod_stats(&self) -> Result<Vec<PodStats>> {
        self.build_snapshot(false).await
    }

    /// Returns stats for all pod-managed containers and advances the CPU
    /// rate baseline.
    ///
    /// The runtime only supplies cumulative CPU counters, so nanocore rates
    /// are derived by differencing against the previous sample. Exactly one
    /// caller must invoke this periodically; concurrent authoritative
    /// callers make the sampling period vary and the computed rates
    /// incoherent. If nobody calls it, rates stay absent.
    pub async fn list_pod_stats_and_update_cpu_nano_core_usage(&self) -> Result<Vec<PodStats>> {
        self.build_snapshot(true).await
    }

    async fn build_snapshot(&self, update_cpu_nano_core_usage: bool) -> Result<Vec<PodStats>> {
        let root_fs = self
            .accounting
            .root_fs_info()
            .await
            .map_err(Error::RootFsInfo)?;
        let listings = self.fetch_listings().await?;
        let all_infos = self
            .accounting
            .container_infos()
            .await
            .map_err(Error::ContainerInfos)?;
        let ca_infos = container_keyed_infos(&all_infos);

        // Per-pass cache of filesystem lookups, keyed by filesystem id so
        // containers sharing one filesystem query it once. Seeded with the
        // root filesystem; failed lookups are cached as absent.
        let mut fs_cache: HashMap<FilesystemIdentifier, Option<FsInfo>> = HashMap::new();
        fs_cache.insert(
            FilesystemIdentifier {
                mountpoint: root_fs.mountpoint.clone(),
            },
            Some(root_fs),
        );

        let mut pod_stats: HashMap<String, PodStats> = HashMap::new();
        for record in &listings.records {
            let Some(container) = listings.containers.get(record.attributes.id.as_str()) else {
                continue;
            };
            let Some(sandbox) = listings.sandboxes.get(container.pod_sandbox_id.as_str()) else {
                continue;
            };

            let ps = pod_stats
                .entry(sandbox.id.clone())
                .or_insert_with(|| build_pod_stats(sandbox));

            let mut cs = self
                .make_container_stats(
                    record,
                    container,
                    &mut fs_cache,
                    update_cpu_nano_core_usage,
                    &ca_infos,
                )
                .await;

            // Host-level per-container network telemetry is not collected on
            // this platform; the sandbox's accounting info is the only source.
            let sandbox_info = ca_infos.get(sandbox.id.as_str()).copied();
            merge::add_pod_network_stats(ps, &sandbox.id, sandbox_info, None);

            let pod_info = pod_info_by_uid(&all_infos, &sandbox.metadata.uid);
            merge::add_pod_cpu_memory_stats(ps, pod_info, &cs);
            merge::add_pod_disk_io_stats(ps, pod_info, &cs);
            merge::add_pod_process_stats(ps, pod_info, &cs);

            match ca_infos.get(record.attributes.id.as_str()) {
                Some(info) => merge::apply_accounting_container_stats(&mut cs, info),
                None => log::debug!(
                    "unable to find accounting stats for container `{}`",
                    record.attributes.id
                ),
            }
            ps.containers.push(cs);
        }

        self.cpu_usage_cache
            .evict_expired(now_nanos(), DEFAULT_CACHE_RETENTION);

        Ok(pod_stats.into_values().collect())
    }

    /// Lighter-weight variant of [`Self::list_pod_stats`] omitting
    /// writable-layer/filesystem stats and network aggregation. Read-only
    /// with respect to the CPU rate baseline.
    pub async fn list_pod_cpu_and_memory_stats(&self) -> Result<Vec<PodStats>> {
        let listings = self.fetch_listings().await?;
        let all_infos = self
            .accounting
            .container_infos()
            .await
            .map_err(Error::ContainerInfos)?;
        let ca_infos = container_keyed_infos(&all_infos);

        let mut pod_stats: HashMap<String, PodStats> = HashMap::new();
        for record in &listings.records {
            let Some(container) = listings.containers.get(record.attributes.id.as_str()) else {
                continue;
            };
            let Some(sandbox) = listings.sandboxes.get(container.pod_sandbox_id.as_str()) else {
                continue;
            };

            let ps = pod_stats
                .entry(sandbox.id.clone())
                .or_insert_with(|| build_pod_stats(sandbox));

            let mut cs = self.make_container_cpu_and_memory_stats(record, container, &ca_infos);

            let pod_info = pod_info_by_uid(&all_infos, &sandbox.metadata.uid);
            merge::add_pod_cpu_memory_stats(ps, pod_info, &cs);
            merge::add_pod_disk_io_stats(ps, pod_info, &cs);
            merge::add_pod_process_stats(ps, pod_info, &cs);

            match ca_infos.get(record.attributes.id.as_str()) {
                Some(info) => merge::apply_accounting_container_stats(&mut cs, info),
                None => log::debug!(
                    "unable to find accounting stats for container `{}`",
                    record.attributes.id
                ),
            }
            ps.containers.push(cs);
        }

        self.cpu_usage_cache
            .evict_expired(now_nanos(), DEFAULT_CACHE_RETENTION);

        Ok(pod_stats.into_values().collect())
    }

    /// Fetches and deduplicates the three runtime listings, sequentially.
    async fn fetch_listings(&self) -> Result<Listings> {
        let containers = self
            .runtime
            .list_containers()
            .await
            .map_err(Error::ListContainers)?;
        let sandboxes = self
            .runtime
            .list_pod_sandboxes()
            .await
            .map_err(Error::ListPodSandboxes)?;
        let records = self
            .runtime
            .list_container_stats()
            .await
            .map_err(Error::ListContainerStats)?;

        let sandboxes = select_current_sandboxes(sandboxes)
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let containers = select_running_containers(containers)
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        Ok(Listings {
            sandboxes,
            containers,
            records,
        })
    }

    /// Builds the full per-container stats from a raw record and whatever
    /// the accounting subsystem knows about the container.
    async fn make_container_stats(
        &self,
        record: &ContainerStatsRecord,
        container: &Container,
        fs_cache: &mut HashMap<FilesystemIdentifier, Option<FsInfo>>,
        update_cpu_nano_core_usage: bool,
        ca_infos: &HashMap<&str, &ContainerInfo>,
    ) -> ContainerStats {
        let mut cs =
            self.make_container_cpu_and_memory_stats_inner(record, container, ca_infos, |cpu| {
                if update_cpu_nano_core_usage {
                    self.cpu_usage_cache.observe(&record.attributes.id, cpu)
                } else {
                    self.cpu_usage_cache.cached_rate(record.attributes.id.as_str())
                }
            });

        if let Some(writable_layer) = &record.writable_layer {
            let mut rootfs = FsStats {
                timestamp: writable_layer.timestamp,
                used_bytes: writable_layer.used_bytes,
                inodes_used: writable_layer.inodes_used,
                ..Default::default()
            };
            if let Some(fs_id) = &writable_layer.fs_id {
                if !fs_cache.contains_key(fs_id) {
                    let looked_up = self.lookup_fs_info(fs_id).await;
                    fs_cache.insert(fs_id.clone(), looked_up);
                }
                if let Some(fs_info) = fs_cache.get(fs_id).and_then(|cached| cached.as_ref()) {
                    rootfs.available_bytes = Some(fs_info.available_bytes);
                    rootfs.capacity_bytes = Some(fs_info.capacity_bytes);
                    rootfs.inodes_free = fs_info.inodes_free;
                    rootfs.inodes = fs_info.inodes;
                }
            }
            cs.rootfs = Some(rootfs);
        }

        cs
    }

    /// Builds per-container CPU/memory/disk/process stats from a raw record.
    /// Rates are read from the cache without advancing the baseline.
    fn make_container_cpu_and_memory_stats(
        &self,
        record: &ContainerStatsRecord,
        container: &Container,
        ca_infos: &HashMap<&str, &ContainerInfo>,
    ) -> ContainerStats {
        self.make_container_cpu_and_memory_stats_inner(record, container, ca_infos, |_| {
            self.cpu_usage_cache.cached_rate(record.attributes.id.as_str())
        })
    }

    fn make_container_cpu_and_memory_stats_inner(
        &self,
        record: &ContainerStatsRecord,
        container: &Container,
        ca_infos: &HashMap<&str, &ContainerInfo>,
        usage_nano_cores: impl FnOnce(crate::runtime::CpuUsage) -> Option<u64>,
    ) -> ContainerStats {
        let mut cs = ContainerStats {
            name: record.attributes.name.clone(),
            start_time: container.created_at,
            ..Default::default()
        };

        let sample = ca_infos
            .get(record.attributes.id.as_str())
            .and_then(|info| info.latest_sample());
        if let Some(sample) = sample {
            // The runtime interface does not supply these two families.
            cs.process_stats = sample.processes.map(merge::convert_processes);
            cs.disk_io = sample
                .disk_io
                .as_ref()
                .map(|d| merge::convert_disk_io(sample.timestamp, d));
        }

        cs.cpu = Some(match record.cpu {
            Some(cpu) => CpuStats {
                timestamp: cpu.timestamp,
                usage_nano_cores: usage_nano_cores(cpu),
                usage_core_nano_seconds: cpu.usage_core_nano_seconds,
            },
            // The runtime reported no CPU block at all. A zero-valued,
            // now-timestamped placeholder keeps "no data" distinguishable
            // from "data not yet available" (an absent rate).
            None => CpuStats {
                timestamp: now_nanos(),
                usage_nano_cores: Some(0),
                usage_core_nano_seconds: Some(0),
            },
        });

        cs.memory = Some(match &record.memory {
            Some(memory) => {
                let accounted = sample.and_then(|s| s.memory);
                MemoryStats {
                    timestamp: memory.timestamp,
                    working_set_bytes: memory.working_set_bytes,
                    usage_bytes: accounted.map(|m| m.usage_bytes),
                    rss_bytes: accounted.map(|m| m.rss_bytes),
                    ..Default::default()
                }
            }
            None => MemoryStats {
                timestamp: now_nanos(),
                working_set_bytes: Some(0),
                ..Default::default()
            },
        });

        cs
    }

    /// Resolves filesystem capacity information for the given id, mapping
    /// every failure to absent data.
    async fn lookup_fs_info(&self, fs_id: &FilesystemIdentifier) -> Option<FsInfo> {
        match self.accounting.dir_fs_info(&fs_id.mountpoint).await {
            Ok(info) => Some(info),
            Err(err @ accounting::Error::NoSuchDevice { .. }) => {
                log::debug!(
                    "failed to get info of the filesystem at `{}`: {}",
                    fs_id.mountpoint,
                    err
                );
                None
            }
            Err(err) => {
                log::error!(
                    "failed to get info of the filesystem at `{}`: {}",
                    fs_id.mountpoint,
                    err
                );
                None
            }
        }
    }
}

/// Seeds a [`PodStats`] identifying the pod a sandbox belongs to. The start
/// time is the sandbox creation time.
fn build_pod_stats(sandbox: &PodSandbox) -> PodStats {
    PodStats {
        pod_ref: PodReference {
            name: sandbox.metadata.name.clone(),
            uid: sandbox.metadata.uid.clone(),
            namespace: sandbox.metadata.namespace.clone(),
        },
        start_time: sandbox.created_at,
        ..Default::default()
    }
}
