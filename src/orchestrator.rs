//! Phase-ordered provisioning of the stack
//!
//! ```text
//! Namespace -> BackingServices -> Application -> ResolveGateway -> ComposeRoutes -> Publish
//! ```
//!
//! A phase starts only after every submission of the previous phase was
//! accepted by the API server; workload readiness is not awaited. The first
//! failure aborts the run with the failing phase attached. Objects already
//! submitted are left in place and nothing is retried.
//!
//! Backing services are independent of each other and are submitted
//! concurrently. Within a unit the claim is submitted before its workload.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cluster::{ClusterClient, Manifest};
use crate::config::StackConfig;
use crate::gateway::{ComposedIngress, GatewayClassResolver, ResolvedGatewayClass, RouteComposer};
use crate::services::{application, backing_services, BackingServices, ResourceUnit};
use crate::workload::Namespace;
use crate::{Error, Result};

/// Provisioning phases, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeployPhase {
    /// Ensure the target namespace
    Namespace,
    /// Submit the backing services
    BackingServices,
    /// Submit the application
    Application,
    /// Select a GatewayClass from the cluster
    ResolveGateway,
    /// Build and submit the Gateway and HTTPRoute
    ComposeRoutes,
    /// Collect generated identifiers
    Publish,
}

impl DeployPhase {
    /// Every phase, in execution order
    pub const ALL: [DeployPhase; 6] = [
        DeployPhase::Namespace,
        DeployPhase::BackingServices,
        DeployPhase::Application,
        DeployPhase::ResolveGateway,
        DeployPhase::ComposeRoutes,
        DeployPhase::Publish,
    ];

    /// Kebab-case phase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployPhase::Namespace => "namespace",
            DeployPhase::BackingServices => "backing-services",
            DeployPhase::Application => "application",
            DeployPhase::ResolveGateway => "resolve-gateway",
            DeployPhase::ComposeRoutes => "compose-routes",
            DeployPhase::Publish => "publish",
        }
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of everything a run created, for status tooling
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutputs {
    /// Namespace
    pub namespace: String,
    /// MySQL Deployment
    pub mysql_deployment: String,
    /// MySQL Service
    pub mysql_service: String,
    /// Redis Deployment
    pub redis_deployment: String,
    /// Redis Service
    pub redis_service: String,
    /// Elasticsearch Deployment
    pub es_deployment: String,
    /// Elasticsearch Service
    pub es_service: String,
    /// MinIO Deployment
    pub minio_deployment: String,
    /// MinIO Service
    pub minio_service: String,
    /// TEI Deployment
    pub tei_deployment: String,
    /// TEI Service
    pub tei_service: String,
    /// Application Deployment
    pub ragflow_deployment: String,
    /// Application Service
    pub ragflow_service: String,
    /// Selected GatewayClass
    pub gateway_class: String,
    /// Gateway name
    pub gateway_name: String,
}

impl DeploymentOutputs {
    fn collect(plan: &StackPlan, class: &ResolvedGatewayClass, ingress: &ComposedIngress) -> Self {
        let backing = &plan.backing;
        Self {
            namespace: plan.namespace.metadata.name.clone(),
            mysql_deployment: backing.mysql.deployment_name().to_string(),
            mysql_service: backing.mysql.service_name().to_string(),
            redis_deployment: backing.redis.deployment_name().to_string(),
            redis_service: backing.redis.service_name().to_string(),
            es_deployment: backing.elasticsearch.deployment_name().to_string(),
            es_service: backing.elasticsearch.service_name().to_string(),
            minio_deployment: backing.minio.deployment_name().to_string(),
            minio_service: backing.minio.service_name().to_string(),
            tei_deployment: backing.tei.deployment_name().to_string(),
            tei_service: backing.tei.service_name().to_string(),
            ragflow_deployment: plan.application.deployment_name().to_string(),
            ragflow_service: plan.application.service_name().to_string(),
            gateway_class: class.name().to_string(),
            gateway_name: ingress.gateway.metadata.name.clone(),
        }
    }
}

/// Every cluster-independent object of the stack
#[derive(Clone, Debug, PartialEq)]
pub struct StackPlan {
    /// Target namespace
    pub namespace: Namespace,
    /// Backing services
    pub backing: BackingServices,
    /// Application unit
    pub application: ResourceUnit,
}

impl StackPlan {
    /// Build the plan from configuration alone
    pub fn build(config: &StackConfig) -> Self {
        let ns = config.namespace.as_str();
        Self {
            namespace: Namespace::new(ns),
            backing: backing_services(config, ns),
            application: application::unit(config, ns),
        }
    }

    /// Gateway and route for this plan's application endpoint
    pub fn ingress(
        &self,
        config: &StackConfig,
        class: &ResolvedGatewayClass,
    ) -> Result<ComposedIngress> {
        RouteComposer.compose(config, &self.application.service, class)
    }

    /// Every object in submission order, ingress last
    pub fn manifests(&self, ingress: &ComposedIngress) -> Result<Vec<Manifest>> {
        let mut manifests = vec![Manifest::from_typed(&self.namespace, &self.namespace.metadata)?];
        for unit in self.backing.units() {
            manifests.extend(unit.manifests()?);
        }
        manifests.extend(self.application.manifests()?);
        manifests.extend(ingress_manifests(ingress)?);
        Ok(manifests)
    }
}

fn ingress_manifests(ingress: &ComposedIngress) -> Result<Vec<Manifest>> {
    Ok(vec![
        Manifest::from_typed(&ingress.gateway, &ingress.gateway.metadata)?,
        Manifest::from_typed(&ingress.http_route, &ingress.http_route.metadata)?,
    ])
}

/// Render the whole stack as a multi-document YAML stream without a cluster.
///
/// `class` must come from [`GatewayClassResolver`], typically over names
/// supplied by an operator.
pub fn render(config: &StackConfig, class: &ResolvedGatewayClass) -> Result<String> {
    let plan = StackPlan::build(config);
    let ingress = plan.ingress(config, class)?;

    let mut out = String::new();
    for manifest in plan.manifests(&ingress)? {
        let doc = serde_yaml::to_string(&manifest.body)
            .map_err(|e| Error::serialization(format!("{}: {}", manifest.key(), e)))?;
        out.push_str("---\n");
        out.push_str(&doc);
    }
    Ok(out)
}

/// Drives one provisioning run against a cluster
pub struct TopologyOrchestrator {
    client: Arc<dyn ClusterClient>,
    config: StackConfig,
    resolver: GatewayClassResolver,
}

impl TopologyOrchestrator {
    /// Orchestrator for `config`, honouring its GatewayClass preference
    pub fn new(client: Arc<dyn ClusterClient>, config: StackConfig) -> Self {
        let resolver = GatewayClassResolver::new(config.gateway.class_name.clone());
        Self {
            client,
            config,
            resolver,
        }
    }

    /// Run every phase in order
    #[instrument(skip(self), fields(stack = %self.config.name, namespace = %self.config.namespace))]
    pub async fn run(&self) -> Result<DeploymentOutputs> {
        let plan = StackPlan::build(&self.config);

        self.ensure_namespace(&plan)
            .await
            .map_err(|e| e.in_phase(DeployPhase::Namespace))?;

        self.provision_backing_services(&plan.backing)
            .await
            .map_err(|e| e.in_phase(DeployPhase::BackingServices))?;

        info!(name = %plan.application.name, "provisioning application");
        self.submit_unit(&plan.application)
            .await
            .map_err(|e| e.in_phase(DeployPhase::Application))?;

        let class = self
            .resolver
            .resolve(self.client.as_ref())
            .await
            .map_err(|e| e.in_phase(DeployPhase::ResolveGateway))?;

        let ingress = self
            .compose_routes(&plan, &class)
            .await
            .map_err(|e| e.in_phase(DeployPhase::ComposeRoutes))?;

        let outputs = DeploymentOutputs::collect(&plan, &class, &ingress);
        info!(
            gateway_class = %outputs.gateway_class,
            gateway = %outputs.gateway_name,
            "stack provisioned"
        );
        Ok(outputs)
    }

    async fn ensure_namespace(&self, plan: &StackPlan) -> Result<()> {
        let name = plan.namespace.metadata.name.as_str();
        info!(namespace = %name, "ensuring namespace");
        self.client.ensure_namespace(&plan.namespace).await
    }

    async fn provision_backing_services(&self, backing: &BackingServices) -> Result<()> {
        let units = backing.units();
        info!(count = units.len(), "provisioning backing services");
        try_join_all(units.into_iter().map(|unit| self.submit_unit(unit))).await?;
        Ok(())
    }

    async fn submit_unit(&self, unit: &ResourceUnit) -> Result<()> {
        for manifest in unit.manifests()? {
            self.submit(&manifest).await?;
        }
        debug!(unit = %unit.name, "unit submitted");
        Ok(())
    }

    async fn compose_routes(
        &self,
        plan: &StackPlan,
        class: &ResolvedGatewayClass,
    ) -> Result<ComposedIngress> {
        let ingress = plan.ingress(&self.config, class)?;
        for manifest in ingress_manifests(&ingress)? {
            self.submit(&manifest).await?;
        }
        Ok(ingress)
    }

    async fn submit(&self, manifest: &Manifest) -> Result<()> {
        debug!(
            kind = %manifest.kind,
            name = %manifest.name,
            namespace = ?manifest.namespace,
            "submitting"
        );
        self.client.apply(manifest).await
    }
}
