//! MySQL database unit

use crate::config::StackConfig;
use crate::workload::{
    Container, ContainerPort, Deployment, EnvVar, PersistentVolumeClaim, PodSpec, Service,
    ServicePort, Volume, VolumeMount,
};

use super::ResourceUnit;

const NAME: &str = "mysql";
const IMAGE: &str = "mysql:8.0";
const CLAIM: &str = "mysql-pvc";
const STORAGE: &str = "1Gi";
const DATA_DIR: &str = "/var/lib/mysql";

/// Build the MySQL unit. Port and credentials come from `MYSQL_*` settings.
pub fn unit(config: &StackConfig, namespace: &str) -> ResourceUnit {
    let port = config.port("MYSQL_PORT");
    let claim =
        PersistentVolumeClaim::read_write_once(CLAIM, namespace, STORAGE, &config.storage_class);

    let mut container = Container::new(NAME, IMAGE);
    container.ports = vec![ContainerPort::new(port)];
    container.env = vec![
        EnvVar::new("MYSQL_ROOT_PASSWORD", config.value("MYSQL_PASSWORD")),
        EnvVar::new("MYSQL_DATABASE", config.value("MYSQL_DBNAME")),
    ];
    container.volume_mounts = vec![VolumeMount::new("mysql-storage", DATA_DIR)];

    let mut pod = PodSpec::with_container(container);
    pod.volumes = vec![Volume::from_claim("mysql-storage", &claim)];

    ResourceUnit {
        name: NAME.to_string(),
        deployment: Deployment::single_replica(NAME, namespace, NAME, pod),
        service: Service::selecting(NAME, namespace, NAME, vec![ServicePort::same(port)]),
        claim: Some(claim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_and_port_come_from_config() {
        let config = StackConfig::from_lookup(|key| match key {
            "MYSQL_PASSWORD" => Some("hunter2".to_string()),
            "MYSQL_PORT" => Some("3307".to_string()),
            _ => None,
        });
        let unit = unit(&config, "ragflow");
        let container = &unit.deployment.spec.template.spec.containers[0];

        assert_eq!(container.ports[0].container_port, 3307);
        assert!(container
            .env
            .contains(&EnvVar::new("MYSQL_ROOT_PASSWORD", "hunter2")));
        assert!(container.env.contains(&EnvVar::new("MYSQL_DATABASE", "ragflow")));
        assert_eq!(unit.service.spec.ports[0].port, 3307);
    }

    #[test]
    fn data_dir_is_backed_by_claim() {
        let config = StackConfig::from_lookup(|_| None);
        let unit = unit(&config, "ragflow");
        let pod = &unit.deployment.spec.template.spec;

        assert_eq!(pod.containers[0].volume_mounts[0].mount_path, DATA_DIR);
        let claim_name = pod.volumes[0]
            .persistent_volume_claim
            .as_ref()
            .map(|c| c.claim_name.as_str());
        assert_eq!(claim_name, Some("mysql-pvc"));
        assert_eq!(
            unit.claim.unwrap().spec.storage_class_name.as_deref(),
            Some("rook-ceph-block")
        );
    }

    #[test]
    fn unparsable_port_falls_back_to_80() {
        let config =
            StackConfig::from_lookup(|key| (key == "MYSQL_PORT").then(|| "abc".to_string()));
        let unit = unit(&config, "ragflow");
        assert_eq!(unit.service.spec.ports[0].port, 80);
    }
}
