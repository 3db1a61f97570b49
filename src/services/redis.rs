//! Valkey (Redis-compatible) cache unit

use crate::config::StackConfig;
use crate::workload::{Container, ContainerPort, Deployment, PodSpec, Service, ServicePort};

use super::ResourceUnit;

const NAME: &str = "redis";
const IMAGE: &str = "valkey/valkey:8";
const PORT: u16 = 6379;

/// Build the cache unit, protected by `REDIS_PASSWORD`
pub fn unit(config: &StackConfig, namespace: &str) -> ResourceUnit {
    let mut container = Container::new(NAME, IMAGE);
    container.ports = vec![ContainerPort::new(PORT)];
    container.command = Some(vec![
        "valkey-server".to_string(),
        "--requirepass".to_string(),
        config.value("REDIS_PASSWORD").to_string(),
    ]);

    ResourceUnit {
        name: NAME.to_string(),
        claim: None,
        deployment: Deployment::single_replica(
            NAME,
            namespace,
            NAME,
            PodSpec::with_container(container),
        ),
        service: Service::selecting(NAME, namespace, NAME, vec![ServicePort::same(PORT)]),
    }
}
