use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// Label carrying the pod name on runtime-managed containers and sandboxes.
pub const POD_NAME_LABEL: &str = "io.kubernetes.pod.name";
/// Label carrying the pod namespace.
pub const POD_NAMESPACE_LABEL: &str = "io.kubernetes.pod.namespace";
/// Label carrying the pod UID.
pub const POD_UID_LABEL: &str = "io.kubernetes.pod.uid";
/// Label carrying the container name.
pub const CONTAINER_NAME_LABEL: &str = "io.kubernetes.container.name";

/// A validated container identifier as reported by the container runtime.
///
/// # Examples
///
/// ```
/// # use pod_monitor::container::ContainerID;
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.as_str(), raw_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty or its
    /// length exceeds [`CONTAINER_ID_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > CONTAINER_ID_MAX_LEN {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContainerID {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ContainerID::new(s)
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The logical display identity of a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PodReference {
    pub name: String,
    pub uid: String,
    pub namespace: String,
}

/// A UID-less pod identity. A sandbox may be recreated under a fresh UID, so
/// grouping incarnations of the same pod must ignore the UID. Never used for
/// display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PodIdentity {
    pub name: String,
    pub namespace: String,
}

impl PodIdentity {
    /// Extracts the pod identity from runtime labels. Missing labels yield
    /// empty fields, which still group consistently.
    pub fn from_labels(labels: &HashMap<String, String>) -> Self {
        Self {
            name: label_value(labels, POD_NAME_LABEL),
            namespace: label_value(labels, POD_NAMESPACE_LABEL),
        }
    }
}

/// Groups container incarnations across restarts: the owning pod's UID-less
/// identity plus the container's logical name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContainerIdentity {
    pub pod: PodIdentity,
    pub container_name: String,
}

impl ContainerIdentity {
    pub fn from_labels(labels: &HashMap<String, String>) -> Self {
        Self {
            pod: PodIdentity::from_labels(labels),
            container_name: label_value(labels, CONTAINER_NAME_LABEL),
        }
    }
}

fn label_value(labels: &HashMap<String, String>, key: &str) -> String {
    labels.get(key).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_rejects_empty() {
        assert!(ContainerID::new("").is_err());
    }

    #[test]
    fn test_container_id_rejects_overlong() {
        let raw = "a".repeat(CONTAINER_ID_MAX_LEN + 1);
        assert!(ContainerID::new(raw).is_err());
    }

    #[test]
    fn test_container_id_borrows_as_str() {
        let id = ContainerID::new("abc123").unwrap();
        let map: HashMap<ContainerID, u32> = HashMap::from([(id, 7)]);
        assert_eq!(map.get("abc123"), Some(&7));
    }

    #[test]
    fn test_identity_from_labels() {
        let labels = HashMap::from([
            (POD_NAME_LABEL.to_owned(), "web".to_owned()),
            (POD_NAMESPACE_LABEL.to_owned(), "prod".to_owned()),
            (CONTAINER_NAME_LABEL.to_owned(), "nginx".to_owned()),
        ]);
        let identity = ContainerIdentity::from_labels(&labels);
        assert_eq!(identity.pod.name, "web");
        assert_eq!(identity.pod.namespace, "prod");
        assert_eq!(identity.container_name, "nginx");
    }

    #[test]
    fn test_identity_tolerates_missing_labels() {
        let identity = ContainerIdentity::from_labels(&HashMap::new());
        assert_eq!(identity, ContainerIdentity::default());
    }
}
