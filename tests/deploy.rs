//! End-to-end provisioning scenarios against an in-memory cluster
//!
//! `RecordingCluster` stands in for the API server: it records every call in
//! order, serves a fixed GatewayClass list, and can be told to reject one
//! object.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rstest::rstest;

use ragflow_k8s::cluster::{ClusterClient, Manifest};
use ragflow_k8s::config::StackConfig;
use ragflow_k8s::orchestrator::{DeployPhase, TopologyOrchestrator};
use ragflow_k8s::workload::Namespace;
use ragflow_k8s::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
enum Call {
    EnsureNamespace(String),
    Apply(Manifest),
    ListGatewayClasses,
}

#[derive(Default)]
struct RecordingCluster {
    classes: Vec<String>,
    reject: Option<(String, String)>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingCluster {
    fn with_classes(classes: &[&str]) -> Self {
        Self {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn rejecting(mut self, kind: &str, name: &str) -> Self {
        self.reject = Some((kind.to_string(), name.to_string()));
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn applied(&self) -> Vec<Manifest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Apply(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn applied_of_kind(&self, kind: &str) -> Vec<Manifest> {
        self.applied().into_iter().filter(|m| m.kind == kind).collect()
    }

    fn position(&self, kind: &str, name: &str) -> Option<usize> {
        self.applied()
            .iter()
            .position(|m| m.kind == kind && m.name == name)
    }
}

#[async_trait]
impl ClusterClient for RecordingCluster {
    async fn ensure_namespace(&self, namespace: &Namespace) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::EnsureNamespace(namespace.metadata.name.clone()));
        Ok(())
    }

    async fn apply(&self, manifest: &Manifest) -> Result<()> {
        if let Some((kind, name)) = &self.reject {
            if manifest.kind == *kind && manifest.name == *name {
                return Err(Error::submission(kind, name, "admission webhook denied"));
            }
        }
        self.calls.lock().unwrap().push(Call::Apply(manifest.clone()));
        Ok(())
    }

    async fn list_gateway_classes(&self) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(Call::ListGatewayClasses);
        Ok(self.classes.clone())
    }
}

fn config_from(pairs: &[(&str, &str)]) -> StackConfig {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    StackConfig::from_lookup(move |key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
}

async fn deploy(
    cluster: RecordingCluster,
    config: StackConfig,
) -> (Arc<RecordingCluster>, Result<ragflow_k8s::orchestrator::DeploymentOutputs>) {
    let cluster = Arc::new(cluster);
    let orchestrator = TopologyOrchestrator::new(cluster.clone(), config);
    let result = orchestrator.run().await;
    (cluster, result)
}

#[rstest]
#[case::cilium_preferred(&["nginx", "cilium-gw", "istio"], "cilium-gw")]
#[case::lexicographic(&["nginx", "istio"], "istio")]
#[tokio::test]
async fn story_gateway_uses_selected_class(#[case] classes: &[&str], #[case] expected: &str) {
    let (cluster, result) = deploy(RecordingCluster::with_classes(classes), config_from(&[])).await;

    let outputs = result.unwrap();
    assert_eq!(outputs.gateway_class, expected);

    let gateways = cluster.applied_of_kind("Gateway");
    assert_eq!(gateways.len(), 1);
    assert_eq!(gateways[0].body["spec"]["gatewayClassName"], expected);
}

#[tokio::test]
async fn story_empty_cluster_registry_aborts_without_ingress() {
    let (cluster, result) = deploy(RecordingCluster::with_classes(&[]), config_from(&[])).await;

    let err = result.unwrap_err();
    assert_eq!(err.phase(), Some(DeployPhase::ResolveGateway));
    assert!(matches!(err.root(), Error::NoGatewayImplementationFound));
    assert!(cluster.applied_of_kind("Gateway").is_empty());
    assert!(cluster.applied_of_kind("HTTPRoute").is_empty());

    // Nothing is submitted after the failed query
    let calls = cluster.calls();
    assert_eq!(calls.last(), Some(&Call::ListGatewayClasses));
}

#[tokio::test]
async fn story_phases_run_in_dependency_order() {
    let (cluster, result) =
        deploy(RecordingCluster::with_classes(&["nginx"]), config_from(&[])).await;
    result.unwrap();

    let calls = cluster.calls();
    assert_eq!(calls[0], Call::EnsureNamespace("ragflow".to_string()));

    let list_at = calls
        .iter()
        .position(|c| *c == Call::ListGatewayClasses)
        .unwrap();
    let app_at = calls
        .iter()
        .position(|c| matches!(c, Call::Apply(m) if m.kind == "Service" && m.name == "ragflow"))
        .unwrap();
    assert!(app_at < list_at, "gateway resolved before the application endpoint existed");

    let app = cluster.position("Deployment", "ragflow").unwrap();
    for unit in ["mysql", "redis", "elasticsearch", "minio", "tei"] {
        assert!(cluster.position("Deployment", unit).unwrap() < app);
        assert!(cluster.position("Service", unit).unwrap() < app);
    }
    assert!(
        cluster.position("Gateway", "ragflow-gateway").unwrap()
            < cluster.position("HTTPRoute", "ragflow-http-route").unwrap()
    );
}

#[tokio::test]
async fn story_outputs_name_every_created_object() {
    let (_, result) = deploy(
        RecordingCluster::with_classes(&["cilium"]),
        config_from(&[("PULUMI_NAME", "rag"), ("PULUMI_NAMESPACE", "rag-prod")]),
    )
    .await;
    let outputs = result.unwrap();

    let json = serde_json::to_value(&outputs).unwrap();
    assert_eq!(json["namespace"], "rag-prod");
    assert_eq!(json["mysqlDeployment"], "mysql");
    assert_eq!(json["esService"], "elasticsearch");
    assert_eq!(json["teiDeployment"], "tei");
    assert_eq!(json["ragflowDeployment"], "rag");
    assert_eq!(json["ragflowService"], "rag");
    assert_eq!(json["gatewayClass"], "cilium");
    assert_eq!(json["gatewayName"], "rag-gateway");
}

#[tokio::test]
async fn story_hostname_reaches_listener_and_route() {
    let (cluster, result) = deploy(
        RecordingCluster::with_classes(&["nginx"]),
        config_from(&[("RAGFLOW_GATEWAY", "rag.example.com")]),
    )
    .await;
    result.unwrap();

    let gateway = &cluster.applied_of_kind("Gateway")[0];
    for listener in gateway.body["spec"]["listeners"].as_array().unwrap() {
        assert_eq!(listener["hostname"], "rag.example.com");
    }
    let route = &cluster.applied_of_kind("HTTPRoute")[0];
    assert_eq!(route.body["spec"]["hostnames"], serde_json::json!(["rag.example.com"]));
}

#[tokio::test]
async fn story_hostless_gateway_matches_all_hosts() {
    let (cluster, result) = deploy(
        RecordingCluster::with_classes(&["nginx"]),
        config_from(&[("RAGFLOW_GATEWAY", "")]),
    )
    .await;
    result.unwrap();

    let gateway = &cluster.applied_of_kind("Gateway")[0];
    assert!(gateway.body["spec"]["listeners"][0].get("hostname").is_none());
    let route = &cluster.applied_of_kind("HTTPRoute")[0];
    assert!(route.body["spec"].get("hostnames").is_none());
}

#[tokio::test]
async fn story_unparsable_port_falls_back_to_80() {
    let (cluster, result) = deploy(
        RecordingCluster::with_classes(&["nginx"]),
        config_from(&[("SVR_HTTP_PORT", "abc")]),
    )
    .await;
    result.unwrap();

    let service = cluster
        .applied_of_kind("Service")
        .into_iter()
        .find(|m| m.name == "ragflow")
        .unwrap();
    assert_eq!(service.body["spec"]["ports"][0]["name"], "api");
    assert_eq!(service.body["spec"]["ports"][0]["port"], 80);

    let route = &cluster.applied_of_kind("HTTPRoute")[0];
    assert_eq!(route.body["spec"]["rules"][0]["backendRefs"][0]["port"], 80);
}

#[tokio::test]
async fn story_bucket_init_precedes_application_container() {
    let (cluster, result) = deploy(
        RecordingCluster::with_classes(&["nginx"]),
        config_from(&[("MINIO_BUCKET", "ragflow")]),
    )
    .await;
    result.unwrap();

    let deployment = cluster
        .applied_of_kind("Deployment")
        .into_iter()
        .find(|m| m.name == "ragflow")
        .unwrap();
    let pod = &deployment.body["spec"]["template"]["spec"];
    let init = &pod["initContainers"][0];
    assert_eq!(init["name"], "init-minio-bucket");

    let script = init["command"][2].as_str().unwrap();
    let ping = script.find("mc ping").unwrap();
    let create = script.find("mc mb --ignore-existing store/ragflow").unwrap();
    assert!(ping < create);
    assert_eq!(pod["containers"][0]["name"], "ragflow");
}

#[tokio::test]
async fn story_empty_bucket_setting_skips_bucket_bootstrap() {
    let (cluster, result) = deploy(
        RecordingCluster::with_classes(&["nginx"]),
        config_from(&[("MINIO_BUCKET", "")]),
    )
    .await;
    result.unwrap();

    let deployment = cluster
        .applied_of_kind("Deployment")
        .into_iter()
        .find(|m| m.name == "ragflow")
        .unwrap();
    let pod = &deployment.body["spec"]["template"]["spec"];
    assert!(pod.get("initContainers").is_none());
}

#[tokio::test]
async fn story_rejected_backing_service_stops_the_run() {
    let cluster =
        RecordingCluster::with_classes(&["nginx"]).rejecting("Deployment", "elasticsearch");
    let (cluster, result) = deploy(cluster, config_from(&[])).await;

    let err = result.unwrap_err();
    assert_eq!(err.phase(), Some(DeployPhase::BackingServices));
    assert!(err.to_string().contains("elasticsearch"));
    assert!(cluster.position("Deployment", "ragflow").is_none());
    assert!(!cluster.calls().contains(&Call::ListGatewayClasses));
}

#[tokio::test]
async fn story_configured_class_must_exist() {
    let (cluster, result) = deploy(
        RecordingCluster::with_classes(&["cilium", "nginx"]),
        config_from(&[("RAGFLOW_GATEWAY_CLASS", "istio")]),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.phase(), Some(DeployPhase::ResolveGateway));
    assert!(matches!(err.root(), Error::GatewayClassNotFound { .. }));
    assert!(cluster.applied_of_kind("Gateway").is_empty());
}

#[tokio::test]
async fn story_gateway_lands_in_its_own_namespace() {
    let (cluster, result) = deploy(
        RecordingCluster::with_classes(&["nginx"]),
        config_from(&[("RAGFLOW_GATEWAY_NAMESPACE", "nginx-gateway")]),
    )
    .await;
    result.unwrap();

    let gateway = &cluster.applied_of_kind("Gateway")[0];
    assert_eq!(gateway.namespace.as_deref(), Some("nginx-gateway"));
    let route = &cluster.applied_of_kind("HTTPRoute")[0];
    assert_eq!(route.namespace.as_deref(), Some("ragflow"));
    assert_eq!(route.body["spec"]["parentRefs"][0]["namespace"], "nginx-gateway");
    assert_eq!(route.body["spec"]["parentRefs"][0]["sectionName"], "http");
}
