//! Pod Monitor: per-pod and per-container resource statistics for a host
//! agent.
//!
//! This library reconciles two independent views of the containers running
//! on a host (the container runtime's listings and raw counters, and the
//! host accounting subsystem's cgroup samples) into consistent
//! [`stats::PodStats`] snapshots. The two collaborators are consumed through
//! the [`runtime::RuntimeService`] and [`accounting::ResourceAccounting`]
//! traits; wiring concrete clients is the embedding agent's job.
//!
//! A telemetry consumer typically runs one [`poller::StatsPoller`] to keep
//! CPU rate computation meaningful and serves ad-hoc queries through
//! [`stats::StatsProvider::list_pod_stats`].

pub mod accounting;
pub mod container;
pub mod error;
pub mod poller;
pub mod runtime;
pub mod stats;
