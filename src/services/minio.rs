//! MinIO object store unit

use crate::config::StackConfig;
use crate::workload::{
    Container, ContainerPort, Deployment, EnvVar, PersistentVolumeClaim, PodSpec, Service,
    ServicePort, Volume, VolumeMount,
};

use super::ResourceUnit;

const NAME: &str = "minio";
const IMAGE: &str = "minio/minio:latest";
const CLAIM: &str = "minio-pvc";
const STORAGE: &str = "1Gi";
const DATA_DIR: &str = "/data";
const VOLUME: &str = "minio-storage";
/// Port of the MinIO web console
pub const CONSOLE_PORT: u16 = 9001;

/// Build the object store unit. API port and root credentials come from
/// `MINIO_PORT`, `MINIO_USER` and `MINIO_PASSWORD`.
pub fn unit(config: &StackConfig, namespace: &str) -> ResourceUnit {
    let api_port = config.port("MINIO_PORT");
    let claim =
        PersistentVolumeClaim::read_write_once(CLAIM, namespace, STORAGE, &config.storage_class);

    let mut container = Container::new(NAME, IMAGE);
    container.ports = vec![
        ContainerPort::new(api_port),
        ContainerPort::named("console", CONSOLE_PORT),
    ];
    container.env = vec![
        EnvVar::new("MINIO_ROOT_USER", config.value("MINIO_USER")),
        EnvVar::new("MINIO_ROOT_PASSWORD", config.value("MINIO_PASSWORD")),
    ];
    container.command = Some(vec![
        "minio".to_string(),
        "server".to_string(),
        DATA_DIR.to_string(),
        "--address".to_string(),
        format!(":{api_port}"),
        "--console-address".to_string(),
        format!(":{CONSOLE_PORT}"),
    ]);
    container.volume_mounts = vec![VolumeMount::new(VOLUME, DATA_DIR)];

    let mut pod = PodSpec::with_container(container);
    pod.volumes = vec![Volume::from_claim(VOLUME, &claim)];

    ResourceUnit {
        name: NAME.to_string(),
        deployment: Deployment::single_replica(NAME, namespace, NAME, pod),
        service: Service::selecting(
            NAME,
            namespace,
            NAME,
            vec![
                ServicePort::named("api", api_port, api_port),
                ServicePort::named("console", CONSOLE_PORT, CONSOLE_PORT),
            ],
        ),
        claim: Some(claim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_api_and_console() {
        let config = StackConfig::from_lookup(|_| None);
        let unit = unit(&config, "ragflow");
        assert_eq!(unit.service.port_named("api"), Some(9000));
        assert_eq!(unit.service.port_named("console"), Some(CONSOLE_PORT));
    }

    #[test]
    fn server_listens_on_configured_api_port() {
        let config =
            StackConfig::from_lookup(|key| (key == "MINIO_PORT").then(|| "9100".to_string()));
        let unit = unit(&config, "ragflow");
        let container = &unit.deployment.spec.template.spec.containers[0];
        let command = container.command.as_ref().unwrap();

        assert!(command.windows(2).any(|w| w == ["--address", ":9100"]));
        assert_eq!(container.ports[0].container_port, 9100);
        assert_eq!(unit.service.port_named("api"), Some(9100));
    }

    #[test]
    fn root_credentials_come_from_config() {
        let config = StackConfig::from_lookup(|_| None);
        let unit = unit(&config, "ragflow");
        let env = &unit.deployment.spec.template.spec.containers[0].env;
        assert!(env.contains(&EnvVar::new("MINIO_ROOT_USER", "minioadmin")));
        assert!(env.contains(&EnvVar::new("MINIO_ROOT_PASSWORD", "minioadmin")));
    }
}
