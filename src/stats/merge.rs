//! Fill-in policies combining runtime-reported and accounting-reported
//! numbers.
//!
//! The accounting subsystem's counters win whenever it has data for a
//! container or pod; runtime-derived values (and running sums of already
//! merged container values) are the fallback. Absent counters contribute 0
//! to a sum, but a present zero is a real measurement and stays one.

use crate::accounting::{ContainerInfo, DiskIoSample, MetricType, MetricValue, ProcessSample};

use super::summary::{
    ContainerStats, CpuStats, DeviceIoStats, DiskIoStats, InterfaceStats, MemoryStats,
    NetworkStats, PodStats, ProcessStats, UserDefinedMetric, UserDefinedMetricType,
};

/// Converts the latest accounting sample into CPU and memory stats.
pub(crate) fn cpu_and_memory_stats(
    info: &ContainerInfo,
) -> (Option<CpuStats>, Option<MemoryStats>) {
    let Some(sample) = info.latest_sample() else {
        return (None, None);
    };
    let cpu = sample.cpu.map(|c| CpuStats {
        timestamp: sample.timestamp,
        usage_nano_cores: c.usage_nano_cores,
        usage_core_nano_seconds: Some(c.usage_core_nano_seconds),
    });
    let memory = sample.memory.map(|m| MemoryStats {
        timestamp: sample.timestamp,
        available_bytes: m.available_bytes,
        usage_bytes: Some(m.usage_bytes),
        working_set_bytes: Some(m.working_set_bytes),
        rss_bytes: Some(m.rss_bytes),
        page_faults: m.page_faults,
        major_page_faults: m.major_page_faults,
    });
    (cpu, memory)
}

/// Converts the latest accounting sample's interface counters.
pub(crate) fn network_stats(info: &ContainerInfo) -> Option<NetworkStats> {
    let sample = info.latest_sample()?;
    let network = sample.network.as_ref()?;
    if network.interfaces.is_empty() {
        return None;
    }
    Some(NetworkStats {
        timestamp: sample.timestamp,
        interfaces: network
            .interfaces
            .iter()
            .map(|i| InterfaceStats {
                name: i.name.clone(),
                rx_bytes: Some(i.rx_bytes),
                rx_errors: Some(i.rx_errors),
                tx_bytes: Some(i.tx_bytes),
                tx_errors: Some(i.tx_errors),
            })
            .collect(),
    })
}

/// Converts the latest accounting sample's per-device I/O counters.
pub(crate) fn disk_io_stats(info: &ContainerInfo) -> Option<DiskIoStats> {
    let sample = info.latest_sample()?;
    let disk_io = sample.disk_io.as_ref()?;
    Some(convert_disk_io(sample.timestamp, disk_io))
}

pub(crate) fn convert_disk_io(timestamp: i64, sample: &DiskIoSample) -> DiskIoStats {
    DiskIoStats {
        timestamp,
        devices: sample
            .devices
            .iter()
            .map(|(device, io)| {
                (
                    device.clone(),
                    DeviceIoStats {
                        read_bytes: io.read_bytes,
                        write_bytes: io.write_bytes,
                        read_ops: io.read_ops,
                        write_ops: io.write_ops,
                    },
                )
            })
            .collect(),
    }
}

/// Converts the latest accounting sample's process counters.
pub(crate) fn process_stats(info: &ContainerInfo) -> Option<ProcessStats> {
    info.latest_sample()?.processes.map(convert_processes)
}

pub(crate) fn convert_processes(sample: ProcessSample) -> ProcessStats {
    ProcessStats {
        process_count: sample.process_count,
        fd_count: sample.fd_count,
        socket_count: sample.socket_count,
        threads_current: sample.threads_current,
        threads_max: sample.threads_max,
    }
}

/// Collects the newest observation of every user-defined metric the info's
/// spec declares. Metrics without any observation are omitted.
pub(crate) fn user_defined_metrics(info: &ContainerInfo) -> Vec<UserDefinedMetric> {
    info.spec
        .custom_metrics
        .iter()
        .filter_map(|spec| {
            let mut latest: Option<MetricValue> = None;
            for sample in &info.samples {
                for value in sample.custom_metrics.get(&spec.name).into_iter().flatten() {
                    if latest.is_none_or(|l| value.timestamp > l.timestamp) {
                        latest = Some(*value);
                    }
                }
            }
            latest.map(|v| UserDefinedMetric {
                name: spec.name.clone(),
                units: spec.units.clone(),
                metric_type: match spec.metric_type {
                    MetricType::Gauge => UserDefinedMetricType::Gauge,
                    MetricType::Cumulative => UserDefinedMetricType::Cumulative,
                },
                timestamp: v.timestamp,
                value: v.value,
            })
        })
        .collect()
}

/// Replaces the runtime-derived CPU/memory blocks with the accounting
/// subsystem's, when it has data for the container, and attaches declared
/// custom metrics.
pub(crate) fn apply_accounting_container_stats(cs: &mut ContainerStats, info: &ContainerInfo) {
    if info.spec.has_custom_metrics {
        cs.user_defined_metrics = user_defined_metrics(info);
    }
    let (cpu, memory) = cpu_and_memory_stats(info);
    if cpu.is_some() {
        cs.cpu = cpu;
    }
    if memory.is_some() {
        cs.memory = memory;
    }
}

/// Fills the pod's network stats: the sandbox container owns the pod's
/// network namespace, so its accounting info is the preferred source, with
/// host-level telemetry as fallback.
pub(crate) fn add_pod_network_stats(
    ps: &mut PodStats,
    sandbox_id: &str,
    sandbox_info: Option<&ContainerInfo>,
    host_stats: Option<&NetworkStats>,
) {
    if let Some(network) = sandbox_info.and_then(network_stats) {
        ps.network = Some(network);
        return;
    }
    if let Some(stats) = host_stats {
        ps.network = Some(stats.clone());
        return;
    }
    log::debug!("unable to find network stats for sandbox `{sandbox_id}`");
}

/// Fills the pod's CPU and memory stats, preferring the pod-level accounting
/// cgroup and falling back to a running sum over the merged containers.
pub(crate) fn add_pod_cpu_memory_stats(
    ps: &mut PodStats,
    pod_info: Option<&ContainerInfo>,
    cs: &ContainerStats,
) {
    if let Some(info) = pod_info {
        let (cpu, memory) = cpu_and_memory_stats(info);
        if cpu.is_some() || memory.is_some() {
            ps.cpu = cpu;
            ps.memory = memory;
            return;
        }
    }

    if let Some(cs_cpu) = &cs.cpu {
        let pod_cpu = ps.cpu.get_or_insert_with(CpuStats::default);
        pod_cpu.timestamp = cs_cpu.timestamp;
        pod_cpu.usage_core_nano_seconds = Some(
            cs_cpu.usage_core_nano_seconds.unwrap_or(0)
                + pod_cpu.usage_core_nano_seconds.unwrap_or(0),
        );
        pod_cpu.usage_nano_cores =
            Some(cs_cpu.usage_nano_cores.unwrap_or(0) + pod_cpu.usage_nano_cores.unwrap_or(0));
    }

    if let Some(cs_memory) = &cs.memory {
        let pod_memory = ps.memory.get_or_insert_with(MemoryStats::default);
        pod_memory.timestamp = cs_memory.timestamp;
        pod_memory.available_bytes =
            Some(cs_memory.available_bytes.unwrap_or(0) + pod_memory.available_bytes.unwrap_or(0));
        pod_memory.usage_bytes =
            Some(cs_memory.usage_bytes.unwrap_or(0) + pod_memory.usage_bytes.unwrap_or(0));
        pod_memory.working_set_bytes = Some(
            cs_memory.working_set_bytes.unwrap_or(0)
                + pod_memory.working_set_bytes.unwrap_or(0),
        );
        pod_memory.rss_bytes =
            Some(cs_memory.rss_bytes.unwrap_or(0) + pod_memory.rss_bytes.unwrap_or(0));
        pod_memory.page_faults =
            Some(cs_memory.page_faults.unwrap_or(0) + pod_memory.page_faults.unwrap_or(0));
        pod_memory.major_page_faults = Some(
            cs_memory.major_page_faults.unwrap_or(0)
                + pod_memory.major_page_faults.unwrap_or(0),
        );
    }
}

/// Fills the pod's disk I/O stats, preferring the pod-level accounting cgroup
/// and falling back to per-device running sums over the merged containers.
pub(crate) fn add_pod_disk_io_stats(
    ps: &mut PodStats,
    pod_info: Option<&ContainerInfo>,
    cs: &ContainerStats,
) {
    if let Some(disk_io) = pod_info.and_then(disk_io_stats) {
        ps.disk_io = Some(disk_io);
        return;
    }
    if let Some(cs_disk_io) = &cs.disk_io {
        ps.disk_io
            .get_or_insert_with(DiskIoStats::default)
            .add(cs_disk_io);
    }
}

/// Fills the pod's process stats, preferring the pod-level accounting cgroup
/// and falling back to a running sum over the merged containers.
pub(crate) fn add_pod_process_stats(
    ps: &mut PodStats,
    pod_info: Option<&ContainerInfo>,
    cs: &ContainerStats,
) {
    if let Some(processes) = pod_info.and_then(process_stats) {
        ps.process_stats = Some(processes);
        return;
    }
    if let Some(cs_processes) = cs.process_stats {
        *ps.process_stats.get_or_insert_with(ProcessStats::default) += cs_processes;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::accounting::{
        ContainerSpec, CpuSample, InterfaceSample, MemorySample, MetricSpec, NetworkSample, Sample,
    };

    fn info_with_sample(sample: Sample) -> ContainerInfo {
        ContainerInfo {
            spec: ContainerSpec::default(),
            samples: vec![sample],
        }
    }

    fn container_with_cpu_memory(cumulative: u64, working_set: u64) -> ContainerStats {
        ContainerStats {
            name: "c".to_owned(),
            cpu: Some(CpuStats {
                timestamp: 100,
                usage_nano_cores: Some(cumulative / 10),
                usage_core_nano_seconds: Some(cumulative),
            }),
            memory: Some(MemoryStats {
                timestamp: 100,
                working_set_bytes: Some(working_set),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_cpu_memory_sums_containers() {
        let mut ps = PodStats::default();
        add_pod_cpu_memory_stats(&mut ps, None, &container_with_cpu_memory(1_000, 10));
        add_pod_cpu_memory_stats(&mut ps, None, &container_with_cpu_memory(2_000, 20));
        let cpu = ps.cpu.unwrap();
        assert_eq!(cpu.usage_core_nano_seconds, Some(3_000));
        assert_eq!(cpu.usage_nano_cores, Some(300));
        let memory = ps.memory.unwrap();
        assert_eq!(memory.working_set_bytes, Some(30));
    }

    #[test]
    fn test_absent_counter_contributes_zero_to_sum() {
        let mut ps = PodStats::default();
        let mut cs = container_with_cpu_memory(1_000, 10);
        cs.cpu.as_mut().unwrap().usage_nano_cores = None;
        add_pod_cpu_memory_stats(&mut ps, None, &cs);
        assert_eq!(ps.cpu.unwrap().usage_nano_cores, Some(0));
    }

    #[test]
    fn test_pod_level_accounting_wins_over_sums() {
        let mut ps = PodStats::default();
        add_pod_cpu_memory_stats(&mut ps, None, &container_with_cpu_memory(1_000, 10));

        let pod_info = info_with_sample(Sample {
            timestamp: 200,
            cpu: Some(CpuSample {
                usage_core_nano_seconds: 9_999,
                usage_nano_cores: Some(77),
            }),
            memory: Some(MemorySample {
                working_set_bytes: 555,
                ..Default::default()
            }),
            ..Default::default()
        });
        add_pod_cpu_memory_stats(&mut ps, Some(&pod_info), &container_with_cpu_memory(2_000, 20));
        let cpu = ps.cpu.unwrap();
        assert_eq!(cpu.usage_core_nano_seconds, Some(9_999));
        assert_eq!(cpu.usage_nano_cores, Some(77));
        assert_eq!(ps.memory.unwrap().working_set_bytes, Some(555));
    }

    #[test]
    fn test_network_prefers_sandbox_info_over_host_stats() {
        let sandbox_info = info_with_sample(Sample {
            timestamp: 10,
            network: Some(NetworkSample {
                interfaces: vec![InterfaceSample {
                    name: "eth0".to_owned(),
                    rx_bytes: 1,
                    rx_errors: 0,
                    tx_bytes: 2,
                    tx_errors: 0,
                }],
            }),
            ..Default::default()
        });
        let host_stats = NetworkStats {
            timestamp: 99,
            interfaces: Vec::new(),
        };

        let mut ps = PodStats::default();
        add_pod_network_stats(&mut ps, "sb-1", Some(&sandbox_info), Some(&host_stats));
        assert_eq!(ps.network.as_ref().unwrap().timestamp, 10);

        let mut ps = PodStats::default();
        add_pod_network_stats(&mut ps, "sb-1", None, Some(&host_stats));
        assert_eq!(ps.network.as_ref().unwrap().timestamp, 99);

        let mut ps = PodStats::default();
        add_pod_network_stats(&mut ps, "sb-1", None, None);
        assert!(ps.network.is_none());
    }

    #[test]
    fn test_process_stats_sum_containers() {
        let mut ps = PodStats::default();
        let cs = ContainerStats {
            process_stats: Some(ProcessStats {
                process_count: 3,
                threads_current: 12,
                ..Default::default()
            }),
            ..Default::default()
        };
        add_pod_process_stats(&mut ps, None, &cs);
        add_pod_process_stats(&mut ps, None, &cs);
        let processes = ps.process_stats.unwrap();
        assert_eq!(processes.process_count, 6);
        assert_eq!(processes.threads_current, 24);
    }

    #[test]
    fn test_user_defined_metrics_latest_observation_wins() {
        let mut info = ContainerInfo {
            spec: ContainerSpec {
                has_custom_metrics: true,
                custom_metrics: vec![MetricSpec {
                    name: "queue_depth".to_owned(),
                    units: "count".to_owned(),
                    metric_type: MetricType::Gauge,
                }],
                ..Default::default()
            },
            samples: Vec::new(),
        };
        info.samples.push(Sample {
            timestamp: 10,
            custom_metrics: HashMap::from([(
                "queue_depth".to_owned(),
                vec![
                    MetricValue {
                        timestamp: 10,
                        value: 4.0,
                    },
                    MetricValue {
                        timestamp: 20,
                        value: 7.0,
                    },
                ],
            )]),
            ..Default::default()
        });
        let metrics = user_defined_metrics(&info);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].timestamp, 20);
        assert_eq!(metrics[0].value, 7.0);
    }

    #[test]
    fn test_accounting_override_keeps_runtime_values_when_absent() {
        let mut cs = container_with_cpu_memory(1_000, 10);
        let info = ContainerInfo::default();
        apply_accounting_container_stats(&mut cs, &info);
        assert_eq!(cs.cpu.unwrap().usage_core_nano_seconds, Some(1_000));
        assert!(cs.user_defined_metrics.is_empty());
    }
}
