use crate::{accounting, runtime};

/// Errors aborting a reconciliation pass.
///
/// Any upstream fetch failure is fatal for the whole pass: callers get either
/// a complete snapshot or one of these, never a partial result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to get root filesystem info: {0}")]
    RootFsInfo(#[source] accounting::Error),
    #[error("failed to list all containers: {0}")]
    ListContainers(#[source] runtime::Error),
    #[error("failed to list all pod sandboxes: {0}")]
    ListPodSandboxes(#[source] runtime::Error),
    #[error("failed to list all container stats: {0}")]
    ListContainerStats(#[source] runtime::Error),
    #[error("failed to fetch accounting container infos: {0}")]
    ContainerInfos(#[source] accounting::Error),
}
pub type Result<T> = std::result::Result<T, Error>;
