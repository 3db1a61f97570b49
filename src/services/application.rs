//! RAGFlow application unit
//!
//! Every configuration setting is passed through to the server container as an
//! environment variable; the assembler does not interpret individual keys.
//!
//! When an object-storage bucket is configured, an init container runs before
//! the server and only exits successfully once:
//! 1. an `mc` alias for the object store is configured,
//! 2. the store answers a liveness ping (bounded retry),
//! 3. the bucket exists (created if missing).
//!
//! Kubernetes runs init containers to completion before any regular container,
//! so the server never starts against a missing bucket.

use crate::config::StackConfig;
use crate::workload::{
    Container, ContainerPort, Deployment, EnvVar, PodSpec, ResourceRequirements, Service,
    ServicePort,
};

use super::ResourceUnit;

/// Container port of the HTTP API
pub const API_TARGET_PORT: u16 = 9380;
/// Container port of the admin server
pub const ADMIN_TARGET_PORT: u16 = 9381;
/// Container port of the MCP server
pub const MCP_TARGET_PORT: u16 = 9382;

/// Service port name of the HTTP API
pub const API_PORT_NAME: &str = "api";
/// Service port name of the admin server
pub const ADMIN_PORT_NAME: &str = "admin";
/// Service port name of the MCP server
pub const MCP_PORT_NAME: &str = "mcp";

/// Name of the bucket bootstrap init container
pub const BUCKET_INIT_CONTAINER: &str = "init-minio-bucket";
const MC_IMAGE: &str = "minio/mc:latest";
const MC_ALIAS: &str = "store";
/// Readiness polls before the init step gives up
pub const READINESS_ATTEMPTS: u32 = 60;
/// Seconds between readiness polls
pub const READINESS_INTERVAL_SECS: u32 = 5;

/// Build the application unit
pub fn unit(config: &StackConfig, namespace: &str) -> ResourceUnit {
    let name = config.name.as_str();
    let env = passthrough_env(config);

    let mut container = Container::new(name, config.application.image.clone());
    container.ports = vec![
        ContainerPort::named(API_PORT_NAME, API_TARGET_PORT),
        ContainerPort::named(ADMIN_PORT_NAME, ADMIN_TARGET_PORT),
        ContainerPort::named(MCP_PORT_NAME, MCP_TARGET_PORT),
    ];
    container.env = env.clone();
    container.args = Some(vec!["--enable-adminserver".to_string()]);
    container.resources = Some(ResourceRequirements::bounded(
        ("1000m", "2Gi"),
        ("2000m", "4Gi"),
    ));

    let mut pod = PodSpec::with_container(container);
    if let Some(bucket) = config.bucket() {
        let store_port = config.port("MINIO_PORT");
        pod.init_containers.push(bucket_init_container(bucket, store_port, env));
    }

    let mut service = Service::selecting(
        name,
        namespace,
        name,
        vec![
            ServicePort::named(API_PORT_NAME, config.port("SVR_HTTP_PORT"), API_TARGET_PORT),
            ServicePort::named(
                ADMIN_PORT_NAME,
                config.port("ADMIN_SVR_HTTP_PORT"),
                ADMIN_TARGET_PORT,
            ),
            ServicePort::named(MCP_PORT_NAME, config.port("SVR_MCP_PORT"), MCP_TARGET_PORT),
        ],
    );
    service.spec.type_ = Some(config.application.service_type.clone());

    ResourceUnit {
        name: name.to_string(),
        claim: None,
        deployment: Deployment::single_replica(name, namespace, name, pod),
        service,
    }
}

/// One environment entry per configuration setting
fn passthrough_env(config: &StackConfig) -> Vec<EnvVar> {
    config
        .env
        .iter()
        .map(|(key, value)| EnvVar::new(key, value))
        .collect()
}

/// Init container that waits for the object store and creates `bucket`.
///
/// Host and credentials are read from the container environment, which carries
/// the same passthrough settings as the application. The port is the coerced
/// one the object store actually listens on.
fn bucket_init_container(bucket: &str, store_port: u16, env: Vec<EnvVar>) -> Container {
    let script = format!(
        r#"set -e
echo "Setting object store alias..."
mc alias set {alias} "http://${{MINIO_HOST}}:{port}" "${{MINIO_USER}}" "${{MINIO_PASSWORD}}"
echo "Waiting for object store to be ready..."
attempt=0
until mc ping --count 1 {alias} >/dev/null 2>&1; do
  attempt=$((attempt + 1))
  if [ "$attempt" -ge {attempts} ]; then
    echo "Object store not ready after {attempts} attempts" >&2
    exit 1
  fi
  echo "Object store not ready, waiting..."
  sleep {interval}
done
echo "Creating bucket '{bucket}'..."
mc mb --ignore-existing {alias}/{bucket}
echo "Bucket ready."
"#,
        alias = MC_ALIAS,
        port = store_port,
        attempts = READINESS_ATTEMPTS,
        interval = READINESS_INTERVAL_SECS,
        bucket = bucket,
    );

    let mut init = Container::new(BUCKET_INIT_CONTAINER, MC_IMAGE);
    init.env = env;
    init.command = Some(vec!["sh".to_string(), "-c".to_string(), script]);
    init
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> StackConfig {
        StackConfig::from_lookup(|_| None)
    }

    fn init_script(config: &StackConfig) -> String {
        let unit = unit(config, "ragflow");
        unit.deployment.spec.template.spec.init_containers[0]
            .command
            .clone()
            .unwrap()
            .remove(2)
    }

    #[test]
    fn every_setting_becomes_an_env_entry() {
        let mut config = default_config();
        config
            .env
            .insert("CUSTOM_FLAG".to_string(), "enabled".to_string());
        let unit = unit(&config, "ragflow");
        let env = &unit.deployment.spec.template.spec.containers[0].env;

        assert_eq!(env.len(), config.env.len());
        for (key, value) in &config.env {
            assert!(env.contains(&EnvVar::new(key, value)), "missing {key}");
        }
    }

    #[test]
    fn bucket_init_runs_before_the_server() {
        let unit = unit(&default_config(), "ragflow");
        let pod = &unit.deployment.spec.template.spec;

        assert_eq!(pod.init_containers.len(), 1);
        assert_eq!(pod.init_containers[0].name, BUCKET_INIT_CONTAINER);
        assert_eq!(pod.containers.len(), 1);
        assert_eq!(pod.containers[0].name, "ragflow");
    }

    #[test]
    fn bucket_script_orders_alias_ping_then_create() {
        let script = init_script(&default_config());

        let alias = script.find("mc alias set store").unwrap();
        let ping = script.find("mc ping --count 1 store").unwrap();
        let create = script.find("mc mb --ignore-existing store/ragflow").unwrap();
        assert!(alias < ping && ping < create);
        assert!(script.contains("-ge 60"));
        assert!(script.trim_end().ends_with("echo \"Bucket ready.\""));
    }

    #[test]
    fn explicitly_empty_bucket_means_no_init_step() {
        let config = StackConfig::from_lookup(|key| (key == "MINIO_BUCKET").then(String::new));
        let unit = unit(&config, "ragflow");

        assert_eq!(config.bucket(), None);
        assert!(unit.deployment.spec.template.spec.init_containers.is_empty());
    }

    #[test]
    fn bucket_init_dials_the_port_the_store_listens_on() {
        let config =
            StackConfig::from_lookup(|key| (key == "MINIO_PORT").then(|| "abc".to_string()));
        let store = crate::services::minio::unit(&config, "ragflow");
        assert_eq!(store.service.port_named("api"), Some(80));

        let script = init_script(&config);
        assert!(script.contains(r#"mc alias set store "http://${MINIO_HOST}:80""#));
        assert!(!script.contains("${MINIO_PORT}"));
    }

    #[test]
    fn bucket_init_uses_configured_store_port() {
        let config =
            StackConfig::from_lookup(|key| (key == "MINIO_PORT").then(|| "9100".to_string()));
        assert!(init_script(&config).contains(r#""http://${MINIO_HOST}:9100""#));
    }

    #[test]
    fn service_ports_are_named_and_coerced() {
        let mut config = default_config();
        config
            .env
            .insert("ADMIN_SVR_HTTP_PORT".to_string(), "abc".to_string());
        let unit = unit(&config, "ragflow");

        assert_eq!(unit.service.port_named(API_PORT_NAME), Some(9380));
        assert_eq!(unit.service.port_named(ADMIN_PORT_NAME), Some(80));
        assert_eq!(unit.service.port_named(MCP_PORT_NAME), Some(9382));
        let admin = unit
            .service
            .spec
            .ports
            .iter()
            .find(|p| p.name.as_deref() == Some(ADMIN_PORT_NAME))
            .unwrap();
        assert_eq!(admin.target_port, Some(ADMIN_TARGET_PORT));
        assert_eq!(unit.service.spec.type_.as_deref(), Some("ClusterIP"));
    }

    #[test]
    fn unit_is_named_after_the_stack() {
        let mut config = default_config();
        config.name = "rag".to_string();
        let unit = unit(&config, "ragflow");
        assert_eq!(unit.deployment_name(), "rag");
        assert_eq!(unit.service_name(), "rag");
    }
}
