//! Resource units for the RAGFlow stack
//!
//! Each backing service is produced by a pure factory function taking the
//! stack configuration and the target namespace. Nothing here talks to the
//! cluster: units are handed to [`crate::orchestrator`] for submission.
//!
//! | Unit | Module |
//! |---|---|
//! | MySQL database | [`mysql`] |
//! | Valkey cache | [`redis`] |
//! | Elasticsearch document engine | [`elasticsearch`] |
//! | MinIO object store | [`minio`] |
//! | Text embeddings inference | [`tei`] |
//! | RAGFlow server | [`application`] |

pub mod application;
pub mod elasticsearch;
pub mod minio;
pub mod mysql;
pub mod redis;
pub mod tei;

use crate::cluster::Manifest;
use crate::config::StackConfig;
use crate::workload::{Deployment, PersistentVolumeClaim, Service};
use crate::Result;

/// One workload plus the endpoint that exposes it
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceUnit {
    /// Logical service name
    pub name: String,
    /// Storage claim, for stateful units
    pub claim: Option<PersistentVolumeClaim>,
    /// Workload
    pub deployment: Deployment,
    /// Network endpoint
    pub service: Service,
}

impl ResourceUnit {
    /// Name of the Deployment
    pub fn deployment_name(&self) -> &str {
        &self.deployment.metadata.name
    }

    /// Name of the Service
    pub fn service_name(&self) -> &str {
        &self.service.metadata.name
    }

    /// Objects to submit, in dependency order (claim, workload, endpoint)
    pub fn manifests(&self) -> Result<Vec<Manifest>> {
        let mut manifests = Vec::with_capacity(3);
        if let Some(claim) = &self.claim {
            manifests.push(Manifest::from_typed(claim, &claim.metadata)?);
        }
        manifests.push(Manifest::from_typed(
            &self.deployment,
            &self.deployment.metadata,
        )?);
        manifests.push(Manifest::from_typed(&self.service, &self.service.metadata)?);
        Ok(manifests)
    }
}

/// The five backing services. None depends on another, only on the namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct BackingServices {
    /// Relational database
    pub mysql: ResourceUnit,
    /// Cache
    pub redis: ResourceUnit,
    /// Document engine
    pub elasticsearch: ResourceUnit,
    /// Object store
    pub minio: ResourceUnit,
    /// Embedding inference
    pub tei: ResourceUnit,
}

impl BackingServices {
    /// Every unit, in a fixed order
    pub fn units(&self) -> [&ResourceUnit; 5] {
        [
            &self.mysql,
            &self.redis,
            &self.elasticsearch,
            &self.minio,
            &self.tei,
        ]
    }
}

/// Build all backing services for `namespace`
pub fn backing_services(config: &StackConfig, namespace: &str) -> BackingServices {
    BackingServices {
        mysql: mysql::unit(config, namespace),
        redis: redis::unit(config, namespace),
        elasticsearch: elasticsearch::unit(config, namespace),
        minio: minio::unit(config, namespace),
        tei: tei::unit(config, namespace),
    }
}
