//! Periodic authoritative polling of the stats provider.
//!
//! CPU nanocore rates only exist relative to a sampling baseline, and the
//! baseline is only advanced by the authoritative entry point. This poller
//! is that entry point's single caller: it ticks on a fixed interval,
//! collects a snapshot, and ships it to the consumer over a bounded channel.
//! Running more than one poller against the same provider makes the sampling
//! period vary and the computed rates incoherent.

use std::sync::Arc;
use std::time::Duration;

use crate::accounting::ResourceAccounting;
use crate::error::ResultOkLogExt;
use crate::runtime::RuntimeService;
use crate::stats::{PodStats, StatsProvider};

/// The default sampling interval of the authoritative poller.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Drives [`StatsProvider::list_pod_stats_and_update_cpu_nano_core_usage`]
/// on a fixed interval.
pub struct StatsPoller<R, A> {
    provider: Arc<StatsProvider<R, A>>,
    interval: Duration,
}

impl<R, A> StatsPoller<R, A>
where
    R: RuntimeService,
    A: ResourceAccounting,
{
    pub fn new(provider: Arc<StatsProvider<R, A>>) -> Self {
        Self {
            provider,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs the polling loop until the receiving side is dropped.
    ///
    /// A failed pass is logged and skipped; the next tick retries. Snapshots
    /// are sent over `tx` in collection order.
    pub async fn run(self, tx: tokio::sync::mpsc::Sender<Vec<PodStats>>) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            let Some(snapshot) = self
                .provider
                .list_pod_stats_and_update_cpu_nano_core_usage()
                .await
                .ok_log()
            else {
                continue;
            };
            log::trace!("collected stats for {} pods", snapshot.len());
            if tx.send(snapshot).await.is_err() {
                log::debug!("snapshot receiver dropped, stopping stats poller");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::accounting::{ContainerInfo, FsInfo};
    use crate::runtime::{Container, ContainerStatsRecord, PodSandbox};

    struct EmptyRuntime;

    impl RuntimeService for EmptyRuntime {
        async fn list_containers(&self) -> crate::runtime::Result<Vec<Container>> {
            Ok(Vec::new())
        }

        async fn list_pod_sandboxes(&self) -> crate::runtime::Result<Vec<PodSandbox>> {
            Ok(Vec::new())
        }

        async fn list_container_stats(&self) -> crate::runtime::Result<Vec<ContainerStatsRecord>> {
            Ok(Vec::new())
        }
    }

    struct EmptyAccounting;

    impl ResourceAccounting for EmptyAccounting {
        async fn container_infos(
            &self,
        ) -> crate::accounting::Result<HashMap<String, ContainerInfo>> {
            Ok(HashMap::new())
        }

        async fn root_fs_info(&self) -> crate::accounting::Result<FsInfo> {
            Ok(FsInfo {
                timestamp: 0,
                device: "/dev/sda1".to_owned(),
                mountpoint: "/".to_owned(),
                capacity_bytes: 1 << 30,
                available_bytes: 1 << 29,
                inodes: None,
                inodes_free: None,
            })
        }

        async fn dir_fs_info(&self, mountpoint: &str) -> crate::accounting::Result<FsInfo> {
            Err(crate::accounting::Error::NoSuchDevice {
                mountpoint: mountpoint.to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn test_poller_ships_snapshots_until_receiver_drops() {
        let provider = Arc::new(StatsProvider::new(EmptyRuntime, EmptyAccounting));
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);

        let poller = StatsPoller::new(provider).with_interval(Duration::from_millis(5));
        let handle = tokio::spawn(poller.run(tx));

        assert_eq!(rx.recv().await, Some(Vec::new()));
        assert_eq!(rx.recv().await, Some(Vec::new()));
        drop(rx);

        handle.await.expect("poller task panicked");
    }
}
