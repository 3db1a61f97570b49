//! Cluster query and mutation seam
//!
//! Everything the provisioning run needs from the control plane goes through
//! [`ClusterClient`]: ensure a namespace, create-or-update an object, and
//! list registered GatewayClasses. [`KubeClusterClient`] implements it with
//! kube-rs server-side apply; tests substitute a mock or a recording fake.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace as CoreNamespace;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams};
use kube::Client;
use serde::Serialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::gateway::types::GatewayClass;
use crate::kube_utils::{build_api_resource, HasApiResource, ObjectMeta};
use crate::workload::Namespace;
use crate::{Error, Result, FIELD_MANAGER};

/// A typed object serialized for submission.
///
/// Internal logic works on typed structs; conversion to an untyped JSON body
/// happens only here, at the cluster boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Object name
    pub name: String,
    /// Namespace, absent for cluster-scoped objects
    pub namespace: Option<String>,
    /// Full object body
    pub body: serde_json::Value,
}

impl Manifest {
    /// Serialize a typed object
    pub fn from_typed<T>(object: &T, metadata: &ObjectMeta) -> Result<Self>
    where
        T: HasApiResource + Serialize,
    {
        let body = serde_json::to_value(object).map_err(|e| {
            Error::serialization(format!(
                "failed to serialize {} {}: {}",
                T::KIND,
                metadata.name,
                e
            ))
        })?;
        Ok(Self {
            api_version: T::API_VERSION.to_string(),
            kind: T::KIND.to_string(),
            name: metadata.name.clone(),
            namespace: metadata.namespace.clone(),
            body,
        })
    }

    /// `Kind/namespace/name` for logs and reports
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}/{}", self.kind, ns, self.name),
            None => format!("{}/{}", self.kind, self.name),
        }
    }
}

/// Operations the provisioning run issues against a cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create the namespace, or update its labels if it already exists
    async fn ensure_namespace(&self, namespace: &Namespace) -> Result<()>;

    /// Create or update an object
    async fn apply(&self, manifest: &Manifest) -> Result<()>;

    /// Names of every registered GatewayClass, in query order
    async fn list_gateway_classes(&self) -> Result<Vec<String>>;
}

/// [`ClusterClient`] backed by a kube-rs client
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn ensure_namespace(&self, namespace: &Namespace) -> Result<()> {
        let manifest = Manifest::from_typed(namespace, &namespace.metadata)?;
        let name = manifest.name.as_str();
        let api: Api<CoreNamespace> = Api::all(self.client.clone());

        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&manifest.body),
        )
        .await
        .map_err(|e| Error::submission(&manifest.kind, name, e.to_string()))?;

        debug!(namespace = %name, "namespace ensured");
        Ok(())
    }

    async fn apply(&self, manifest: &Manifest) -> Result<()> {
        let ar = build_api_resource(&manifest.api_version, &manifest.kind);
        let api: Api<DynamicObject> = match &manifest.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };

        api.patch(
            &manifest.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&manifest.body),
        )
        .await
        .map_err(|e| Error::submission(&manifest.kind, &manifest.name, e.to_string()))?;

        debug!(
            kind = %manifest.kind,
            name = %manifest.name,
            namespace = ?manifest.namespace,
            "applied"
        );
        Ok(())
    }

    async fn list_gateway_classes(&self) -> Result<Vec<String>> {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &GatewayClass::api_resource());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::cluster_query(e.to_string()))?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|item| item.metadata.name)
            .filter(|name| !name.is_empty())
            .collect())
    }
}
