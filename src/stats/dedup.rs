//! Selection of the "current" entry per logical pod/container identity.
//!
//! Runtime listings overlap across restarts: a recreated sandbox appears next
//! to its terminated predecessor, and an exited container incarnation next to
//! its running replacement. The two selection policies below are deliberately
//! asymmetric and kept separate: a pod with no ready sandbox still needs a
//! best-effort representative to report, whereas a terminated container
//! contributes no useful live stats and is always omitted.

use std::collections::HashMap;

use crate::container::{ContainerIdentity, PodIdentity};
use crate::runtime::{Container, ContainerState, PodSandbox, SandboxState};

/// Picks the sandboxes that represent their pods.
///
/// Sandboxes are grouped by UID-less pod identity and each group is ordered
/// by creation time. A singleton group passes through unchanged. A larger
/// group keeps every ready sandbox (several may legitimately coexist while
/// transitioning); if none is ready, only the most recently created one is
/// kept.
pub(crate) fn select_current_sandboxes(mut sandboxes: Vec<PodSandbox>) -> Vec<PodSandbox> {
    sandboxes.sort_by_key(|s| s.created_at);

    let mut groups: HashMap<PodIdentity, Vec<PodSandbox>> = HashMap::new();
    for sandbox in sandboxes {
        let identity = PodIdentity {
            name: sandbox.metadata.name.clone(),
            namespace: sandbox.metadata.namespace.clone(),
        };
        groups.entry(identity).or_default().push(sandbox);
    }

    let mut result = Vec::new();
    for mut group in groups.into_values() {
        if group.len() == 1 {
            result.append(&mut group);
            continue;
        }
        if group.iter().any(|s| s.state == SandboxState::Ready) {
            group.retain(|s| s.state == SandboxState::Ready);
            result.append(&mut group);
        } else if let Some(latest) = group.pop() {
            result.push(latest);
        }
    }
    result
}

/// Picks the containers whose stats are worth aggregating.
///
/// Containers are grouped by logical identity (owning pod plus container
/// name, from labels) and each group is ordered by creation time. Only
/// running entries survive; a group with no running incarnation contributes
/// nothing.
pub(crate) fn select_running_containers(mut containers: Vec<Container>) -> Vec<Container> {
    containers.sort_by_key(|c| c.created_at);

    let mut groups: HashMap<ContainerIdentity, Vec<Container>> = HashMap::new();
    for container in containers {
        let identity = ContainerIdentity::from_labels(&container.labels);
        groups.entry(identity).or_default().push(container);
    }

    groups
        .into_values()
        .flatten()
        .filter(|c| c.state == ContainerState::Running)
        .collect()
}
