//! Hygiene helpers over the raw cgroup-path-keyed info map.
//!
//! The accounting subsystem reports every cgroup it has ever watched within
//! its retention window, so the raw map carries `.mount` unit cgroups,
//! cgroups of containers the runtime does not manage, and stale entries for
//! earlier incarnations of a restarted container. The reconciler joins
//! against the runtime's listings by container id, so the map has to be
//! filtered and re-keyed first.

use std::collections::HashMap;

use crate::container::{ContainerIdentity, POD_NAME_LABEL, POD_NAMESPACE_LABEL};

use super::ContainerInfo;

/// Returns the container-level infos re-keyed by container id (the trailing
/// cgroup path segment), with `.mount` cgroups, non-pod-managed cgroups and
/// stale incarnations of restarted containers removed.
///
/// When several infos share one logical container identity, only the most
/// recently created one that still shows live CPU and memory usage is kept;
/// a group where none qualifies contributes nothing.
pub fn container_keyed_infos(
    infos: &HashMap<String, ContainerInfo>,
) -> HashMap<&str, &ContainerInfo> {
    let mut groups: HashMap<ContainerIdentity, Vec<(&str, &ContainerInfo)>> = HashMap::new();
    for (key, info) in infos {
        // On systemd hosts every mount into a container has an associated
        // `.mount` cgroup shadowing the container's own entry.
        if key.ends_with(".mount") {
            continue;
        }
        if !is_pod_managed(info) {
            continue;
        }
        groups
            .entry(ContainerIdentity::from_labels(&info.spec.labels))
            .or_default()
            .push((key.as_str(), info));
    }

    let mut out = HashMap::new();
    for mut entries in groups.into_values() {
        if entries.len() == 1 {
            let (key, info) = entries[0];
            out.insert(base_segment(key), info);
            continue;
        }
        entries.sort_by_key(|(_, info)| info.spec.creation_time);
        if let Some(&(key, info)) = entries.iter().rev().find(|(_, info)| has_live_usage(info)) {
            out.insert(base_segment(key), info);
        }
    }

    out
}

/// Finds the pod-level cgroup info for the given pod UID, if the accounting
/// subsystem tracks one. Pod cgroups are named `pod<uid>` (with an optional
/// systemd `.slice` suffix).
pub fn pod_info_by_uid<'a>(
    infos: &'a HashMap<String, ContainerInfo>,
    uid: &str,
) -> Option<&'a ContainerInfo> {
    if uid.is_empty() {
        return None;
    }
    infos.iter().find_map(|(key, info)| {
        let base = base_segment(key).trim_end_matches(".slice");
        (base.strip_prefix("pod") == Some(uid)).then_some(info)
    })
}

/// True when the info's labels identify a runtime-managed pod container.
fn is_pod_managed(info: &ContainerInfo) -> bool {
    let labels = &info.spec.labels;
    labels.get(POD_NAME_LABEL).is_some_and(|v| !v.is_empty())
        && labels.get(POD_NAMESPACE_LABEL).is_some_and(|v| !v.is_empty())
}

/// True when the latest sample still reports CPU and memory activity, i.e.
/// the cgroup belongs to a live container rather than an exited incarnation.
fn has_live_usage(info: &ContainerInfo) -> bool {
    info.latest_sample().is_some_and(|s| {
        s.cpu.is_some_and(|c| c.usage_nano_cores.unwrap_or(0) > 0)
            && s.memory.is_some_and(|m| m.rss_bytes > 0)
    })
}

fn base_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::{CpuSample, MemorySample, Sample};
    use crate::container::{CONTAINER_NAME_LABEL, POD_UID_LABEL};

    fn pod_labels(name: &str, container: &str) -> HashMap<String, String> {
        HashMap::from([
            (POD_NAME_LABEL.to_owned(), name.to_owned()),
            (POD_NAMESPACE_LABEL.to_owned(), "default".to_owned()),
            (POD_UID_LABEL.to_owned(), "uid-1".to_owned()),
            (CONTAINER_NAME_LABEL.to_owned(), container.to_owned()),
        ])
    }

    fn live_info(labels: HashMap<String, String>, creation_time: i64) -> ContainerInfo {
        ContainerInfo {
            spec: crate::accounting::ContainerSpec {
                creation_time,
                labels,
                ..Default::default()
            },
            samples: vec![Sample {
                timestamp: creation_time + 1,
                cpu: Some(CpuSample {
                    usage_core_nano_seconds: 100,
                    usage_nano_cores: Some(50),
                }),
                memory: Some(MemorySample {
                    rss_bytes: 4096,
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }
    }

    fn dead_info(labels: HashMap<String, String>, creation_time: i64) -> ContainerInfo {
        ContainerInfo {
            spec: crate::accounting::ContainerSpec {
                creation_time,
                labels,
                ..Default::default()
            },
            samples: vec![Sample {
                timestamp: creation_time + 1,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_rekeys_by_trailing_segment() {
        let infos = HashMap::from([(
            "/kubepods/poduid-1/abc123".to_owned(),
            live_info(pod_labels("web", "nginx"), 10),
        )]);
        let keyed = container_keyed_infos(&infos);
        assert!(keyed.contains_key("abc123"));
    }

    #[test]
    fn test_skips_mount_and_unmanaged_cgroups() {
        let infos = HashMap::from([
            (
                "/kubepods/poduid-1/abc123/var-lib.mount".to_owned(),
                live_info(pod_labels("web", "nginx"), 10),
            ),
            ("/system.slice/sshd".to_owned(), live_info(HashMap::new(), 10)),
        ]);
        assert!(container_keyed_infos(&infos).is_empty());
    }

    #[test]
    fn test_keeps_newest_live_incarnation() {
        let infos = HashMap::from([
            (
                "/kubepods/poduid-1/old000".to_owned(),
                dead_info(pod_labels("web", "nginx"), 10),
            ),
            (
                "/kubepods/poduid-1/new111".to_owned(),
                live_info(pod_labels("web", "nginx"), 20),
            ),
        ]);
        let keyed = container_keyed_infos(&infos);
        assert_eq!(keyed.len(), 1);
        assert!(keyed.contains_key("new111"));
    }

    #[test]
    fn test_group_without_live_usage_is_dropped() {
        let infos = HashMap::from([
            (
                "/kubepods/poduid-1/old000".to_owned(),
                dead_info(pod_labels("web", "nginx"), 10),
            ),
            (
                "/kubepods/poduid-1/new111".to_owned(),
                dead_info(pod_labels("web", "nginx"), 20),
            ),
        ]);
        assert!(container_keyed_infos(&infos).is_empty());
    }

    #[test]
    fn test_pod_info_by_uid() {
        let infos = HashMap::from([
            ("/kubepods/poduid-1".to_owned(), dead_info(HashMap::new(), 5)),
            (
                "/kubepods/poduid-1/abc123".to_owned(),
                live_info(pod_labels("web", "nginx"), 10),
            ),
        ]);
        assert!(pod_info_by_uid(&infos, "uid-1").is_some());
        assert!(pod_info_by_uid(&infos, "uid-2").is_none());
        assert!(pod_info_by_uid(&infos, "").is_none());
    }

    #[test]
    fn test_pod_info_by_uid_systemd_slice() {
        let infos = HashMap::from([(
            "/kubepods.slice/poduid-9.slice".to_owned(),
            dead_info(HashMap::new(), 5),
        )]);
        assert!(pod_info_by_uid(&infos, "uid-9").is_some());
    }
}
