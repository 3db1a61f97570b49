//! Elasticsearch document engine unit
//!
//! Runs single-node with security disabled. The data directory lives on a
//! claim that a root init container chowns to the elasticsearch user first.

use crate::config::StackConfig;
use crate::workload::{
    Container, ContainerPort, Deployment, EnvVar, PersistentVolumeClaim, PodSecurityContext,
    PodSpec, ResourceRequirements, SecurityContext, Service, ServicePort, Volume, VolumeMount,
};

use super::ResourceUnit;

const NAME: &str = "elasticsearch";
const CLAIM: &str = "es-pvc";
const STORAGE: &str = "2Gi";
const PORT: u16 = 9200;
const DATA_DIR: &str = "/usr/share/elasticsearch/data";
const VOLUME: &str = "es-storage";
const ES_UID: i64 = 1000;

/// Build the document engine unit, versioned by `STACK_VERSION`
pub fn unit(config: &StackConfig, namespace: &str) -> ResourceUnit {
    let claim =
        PersistentVolumeClaim::read_write_once(CLAIM, namespace, STORAGE, &config.storage_class);

    let mut init = Container::new("init-es-data", "busybox");
    init.security_context = Some(SecurityContext {
        run_as_user: Some(0),
        run_as_group: Some(0),
    });
    init.command = Some(vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("mkdir -p {DATA_DIR} && chown -R {ES_UID}:{ES_UID} {DATA_DIR}"),
    ]);
    init.volume_mounts = vec![VolumeMount::new(VOLUME, DATA_DIR)];

    let image = format!("elasticsearch:{}", config.value("STACK_VERSION"));
    let mut container = Container::new(NAME, image);
    container.ports = vec![ContainerPort::new(PORT)];
    container.env = vec![
        EnvVar::new("discovery.type", "single-node"),
        EnvVar::new("xpack.security.enabled", "false"),
    ];
    container.volume_mounts = vec![VolumeMount::new(VOLUME, DATA_DIR)];
    container.resources = Some(ResourceRequirements::bounded(("1000m", "2Gi"), ("2000m", "4Gi")));

    let pod = PodSpec {
        security_context: Some(PodSecurityContext {
            fs_group: Some(ES_UID),
            run_as_user: Some(ES_UID),
            run_as_group: Some(ES_UID),
        }),
        init_containers: vec![init],
        containers: vec![container],
        volumes: vec![Volume::from_claim(VOLUME, &claim)],
    };

    ResourceUnit {
        name: NAME.to_string(),
        deployment: Deployment::single_replica(NAME, namespace, NAME, pod),
        service: Service::selecting(NAME, namespace, NAME, vec![ServicePort::same(PORT)]),
        claim: Some(claim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_tracks_stack_version() {
        let config =
            StackConfig::from_lookup(|key| (key == "STACK_VERSION").then(|| "8.15.0".to_string()));
        let unit = unit(&config, "ragflow");
        assert_eq!(
            unit.deployment.spec.template.spec.containers[0].image,
            "elasticsearch:8.15.0"
        );
    }

    #[test]
    fn init_container_prepares_data_dir_as_root() {
        let config = StackConfig::from_lookup(|_| None);
        let unit = unit(&config, "ragflow");
        let pod = &unit.deployment.spec.template.spec;

        assert_eq!(pod.init_containers.len(), 1);
        let init = &pod.init_containers[0];
        assert_eq!(init.security_context.as_ref().and_then(|s| s.run_as_user), Some(0));
        assert!(init.command.as_ref().unwrap()[2].contains("chown -R 1000:1000"));
        assert_eq!(pod.security_context.as_ref().and_then(|s| s.fs_group), Some(1000));
    }

    #[test]
    fn resources_are_bounded() {
        let config = StackConfig::from_lookup(|_| None);
        let unit = unit(&config, "ragflow");
        let resources = unit.deployment.spec.template.spec.containers[0]
            .resources
            .clone()
            .unwrap();
        assert_eq!(resources.requests.unwrap().memory.as_deref(), Some("2Gi"));
        assert_eq!(resources.limits.unwrap().cpu.as_deref(), Some("2000m"));
    }
}
