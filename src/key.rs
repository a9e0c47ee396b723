//! Work queue keys
//!
//! A key names one object as `<namespace>/<name>`, or just `<name>` for
//! cluster-scoped objects.

use std::fmt;

use kube::Resource;

use crate::error::{Error, Result};

/// Identity of a namespaced or cluster-scoped object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace, empty for cluster-scoped objects
    pub namespace: String,
    /// Object name, never empty
    pub name: String,
}

impl ObjectKey {
    /// Key for a namespaced object
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key for a cluster-scoped object
    pub fn cluster(name: impl Into<String>) -> Self {
        Self::namespaced(String::new(), name)
    }

    /// Build the key of a Kubernetes object, `None` if it has no name yet
    pub fn from_resource<K: Resource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        let name = meta.name.clone().filter(|n| !n.is_empty())?;
        Some(Self::namespaced(
            meta.namespace.clone().unwrap_or_default(),
            name,
        ))
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Encode into the string form used by the work queue
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a queue key.
    ///
    /// Accepts `name` and `namespace/name`. Anything with more separators,
    /// an empty name or an empty namespace segment is rejected.
    pub fn decode(key: &str) -> Result<Self> {
        let mut parts = key.split('/');
        let first = parts.next().unwrap_or_default();
        let key_obj = match (parts.next(), parts.next()) {
            (None, _) => Self::cluster(first),
            (Some(name), None) if !first.is_empty() => Self::namespaced(first, name),
            _ => return Err(Error::MalformedKey(key.to_string())),
        };

        if key_obj.name.is_empty() {
            return Err(Error::MalformedKey(key.to_string()));
        }
        Ok(key_obj)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}
