//! Text embeddings inference unit
//!
//! The unit's name is taken from `TEI_HOST` so the application's configured
//! host resolves to this Service.

use crate::config::StackConfig;
use crate::workload::{Container, ContainerPort, Deployment, PodSpec, Service, ServicePort};

use super::ResourceUnit;

const IMAGE: &str = "infiniflow/text-embeddings-inference:cpu-1.8";
const PORT: u16 = 80;
const FALLBACK_NAME: &str = "tei";

/// Build the embedding service unit serving `TEI_MODEL`
pub fn unit(config: &StackConfig, namespace: &str) -> ResourceUnit {
    let name = match config.value("TEI_HOST") {
        "" => FALLBACK_NAME,
        host => host,
    };

    let mut container = Container::new("tei", IMAGE);
    container.ports = vec![ContainerPort::new(PORT)];
    container.args = Some(vec![
        "--model-id".to_string(),
        format!("/data/{}", config.value("TEI_MODEL")),
        "--auto-truncate".to_string(),
    ]);

    ResourceUnit {
        name: name.to_string(),
        claim: None,
        deployment: Deployment::single_replica(
            name,
            namespace,
            name,
            PodSpec::with_container(container),
        ),
        service: Service::selecting(name, namespace, name, vec![ServicePort::same(PORT)]),
    }
}
