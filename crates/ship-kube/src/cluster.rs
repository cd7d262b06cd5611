//! Cluster status reads
//!
//! The poller only needs one thing from the cluster: the value of a single
//! `.status.<field>` of a namespaced resource. [`ClusterReader`] is that seam;
//! [`KubeStatusReader`] implements it with typed kube-rs APIs.

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use kube::config::KubeConfigOptions;
use kube::{Api, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use ship_core::ResourceKind;
use std::fmt::Debug;

use crate::error::{KubeError, Result};

/// Read access to resource status fields
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Read `.status.<field>` of a resource
    ///
    /// Returns `Ok(None)` when the resource or the field does not exist yet.
    /// An `Err` means the read itself failed.
    async fn status_field(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
        field: &str,
    ) -> Result<Option<Value>>;
}

/// Status reader backed by the Kubernetes API
pub struct KubeStatusReader {
    client: kube::Client,
}

impl KubeStatusReader {
    /// Connect using the default kubeconfig, or a named context
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let config = match context {
            Some(context) => {
                let options = KubeConfigOptions {
                    context: Some(context.to_string()),
                    ..Default::default()
                };
                kube::Config::from_kubeconfig(&options)
                    .await
                    .map_err(|e| KubeError::Kubeconfig(e.to_string()))?
            }
            None => kube::Config::infer()
                .await
                .map_err(|e| KubeError::Kubeconfig(e.to_string()))?,
        };

        let client = kube::Client::try_from(config)?;
        Ok(Self { client })
    }

    async fn fetch_status<K>(&self, name: &str, namespace: &str) -> Result<Option<Value>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);

        let Some(object) = api.get_opt(name).await? else {
            tracing::debug!(name, namespace, "resource not found yet");
            return Ok(None);
        };

        let mut value = serde_json::to_value(&object)?;
        Ok(value.get_mut("status").map(Value::take))
    }
}

#[async_trait]
impl ClusterReader for KubeStatusReader {
    async fn status_field(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
        field: &str,
    ) -> Result<Option<Value>> {
        let status = match kind {
            ResourceKind::Deployment => self.fetch_status::<Deployment>(name, namespace).await,
            ResourceKind::DaemonSet => self.fetch_status::<DaemonSet>(name, namespace).await,
            ResourceKind::StatefulSet => self.fetch_status::<StatefulSet>(name, namespace).await,
            ResourceKind::Pod => self.fetch_status::<Pod>(name, namespace).await,
        }
        .map_err(|e| KubeError::ClusterRead {
            resource: format!("{} {}/{}", kind, namespace, name),
            message: e.to_string(),
        })?;

        Ok(status.and_then(|mut s| s.get_mut(field).map(Value::take)))
    }
}
