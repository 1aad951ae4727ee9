//! Seams to the cluster that owns the annotated resources.
//!
//! The real API client lives outside this crate. The replay loop only needs
//! [`AnnotationPublisher`], and the score monitor additionally reads back
//! through [`ResourceDirectory`]. [`InMemoryCluster`] implements both for the
//! binary and the tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::json;
use tracing::{debug, info};

use crate::error::{ClusterError, PublishError};

/// Name of a managed resource (a cluster node).
pub type ResourceId = String;

/// Metadata fields; all values are serialized as strings.
pub type Fields = BTreeMap<String, String>;

/// Persists metadata on one resource.
///
/// Publishing is fire-and-forget: callers log a failure and move on.
pub trait AnnotationPublisher {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError>;
}

/// Lists resources and reads back their current metadata.
pub trait ResourceDirectory {
    /// Resource ids in stable listing order.
    ///
    /// `filter` is a `key=value` label selector.
    fn list_resources(&self, filter: Option<&str>) -> Result<Vec<ResourceId>, ClusterError>;

    /// Current annotations of every listed resource, in listing order.
    fn resource_annotations(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<(ResourceId, Fields)>, ClusterError>;

    /// Number of workloads currently placed on `id`.
    fn workload_count(&self, id: &str) -> Result<usize, ClusterError>;
}

/// Splits a `key=value` selector.
pub fn parse_selector(filter: &str) -> Result<(&str, &str), ClusterError> {
    match filter.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ClusterError::InvalidFilter(filter.to_string())),
    }
}

/// One resource held by [`InMemoryCluster`].
#[derive(Debug, Clone, Default)]
pub struct Resource {
    pub id: ResourceId,
    pub labels: Fields,
    pub annotations: Fields,
    /// Workloads placed on this resource by whoever schedules onto the cluster.
    pub workloads: usize,
}

/// A cluster kept entirely in memory.
///
/// Patches merge into the resource's annotations, like a metadata merge
/// patch against a real API server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    resources: Vec<Resource>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster of `count` worker nodes named `node-0`, `node-1`, ...
    pub fn with_nodes(count: usize) -> Self {
        let mut cluster = Self::new();
        for i in 0..count {
            cluster.add_resource(format!("node-{i}"), [("role", "node")]);
        }
        cluster
    }

    /// Adds a resource with the given labels. Re-adding an id replaces its labels.
    pub fn add_resource<'a>(
        &mut self,
        id: impl Into<ResourceId>,
        labels: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let id = id.into();
        let labels: Fields = labels
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        match self.resources.iter_mut().find(|r| r.id == id) {
            Some(existing) => existing.labels = labels,
            None => self.resources.push(Resource {
                id,
                labels,
                ..Resource::default()
            }),
        }
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Records how many workloads run on `id`.
    pub fn set_workload_count(&mut self, id: &str, count: usize) -> Result<(), ClusterError> {
        let resource = self
            .resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ClusterError::UnknownResource(id.to_string()))?;
        resource.workloads = count;
        Ok(())
    }

    /// A single annotation value, if set.
    pub fn annotation(&self, id: &str, key: &str) -> Option<&str> {
        self.resource(id)
            .and_then(|r| r.annotations.get(key))
            .map(String::as_str)
    }

    fn matching(&self, filter: Option<&str>) -> Result<Vec<&Resource>, ClusterError> {
        let selector = filter.map(parse_selector).transpose()?;
        Ok(self
            .resources
            .iter()
            .filter(|r| match selector {
                Some((key, value)) => r.labels.get(key).is_some_and(|v| v == value),
                None => true,
            })
            .collect())
    }
}

impl ResourceDirectory for InMemoryCluster {
    fn list_resources(&self, filter: Option<&str>) -> Result<Vec<ResourceId>, ClusterError> {
        Ok(self.matching(filter)?.into_iter().map(|r| r.id.clone()).collect())
    }

    fn resource_annotations(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<(ResourceId, Fields)>, ClusterError> {
        Ok(self
            .matching(filter)?
            .into_iter()
            .map(|r| (r.id.clone(), r.annotations.clone()))
            .collect())
    }

    fn workload_count(&self, id: &str) -> Result<usize, ClusterError> {
        self.resource(id)
            .map(|r| r.workloads)
            .ok_or_else(|| ClusterError::UnknownResource(id.to_string()))
    }
}

impl AnnotationPublisher for InMemoryCluster {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        let resource = self
            .resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PublishError::UnknownResource(id.to_string()))?;
        resource
            .annotations
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        debug!(resource = id, fields = fields.len(), "annotations merged");
        Ok(())
    }
}

/// Logs the merge-patch document each patch would send to an API server.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

/// Metadata merge-patch body for `fields`.
pub fn annotation_patch(fields: &Fields) -> serde_json::Value {
    json!({ "metadata": { "annotations": fields } })
}

impl AnnotationPublisher for LogPublisher {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        info!(resource = id, patch = %annotation_patch(fields), "patch resource");
        Ok(())
    }
}

impl<P: AnnotationPublisher + ?Sized> AnnotationPublisher for &mut P {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        (**self).patch_resource_metadata(id, fields)
    }
}

impl<P: AnnotationPublisher + ?Sized> AnnotationPublisher for Box<P> {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        (**self).patch_resource_metadata(id, fields)
    }
}

impl<P: AnnotationPublisher> AnnotationPublisher for Rc<RefCell<P>> {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        self.borrow_mut().patch_resource_metadata(id, fields)
    }
}

/// A disabled sink accepts everything.
impl<P: AnnotationPublisher> AnnotationPublisher for Option<P> {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        match self {
            Some(inner) => inner.patch_resource_metadata(id, fields),
            None => Ok(()),
        }
    }
}

/// Fans a patch out to both sinks. Both are always attempted; the first
/// failure is reported.
impl<A: AnnotationPublisher, B: AnnotationPublisher> AnnotationPublisher for (A, B) {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        let first = self.0.patch_resource_metadata(id, fields);
        let second = self.1.patch_resource_metadata(id, fields);
        first.and(second)
    }
}

impl<D: ResourceDirectory> ResourceDirectory for Rc<RefCell<D>> {
    fn list_resources(&self, filter: Option<&str>) -> Result<Vec<ResourceId>, ClusterError> {
        self.borrow().list_resources(filter)
    }

    fn resource_annotations(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<(ResourceId, Fields)>, ClusterError> {
        self.borrow().resource_annotations(filter)
    }

    fn workload_count(&self, id: &str) -> Result<usize, ClusterError> {
        self.borrow().workload_count(id)
    }
}
