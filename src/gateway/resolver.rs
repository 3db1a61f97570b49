//! GatewayClass discovery and selection
//!
//! Selection over the classes registered in the cluster, in priority order:
//! 1. A configured preference, which must be among the registered classes
//! 2. The first class (in query order) whose name contains "cilium",
//!    compared case-insensitively
//! 3. The lexicographically smallest class name
//!
//! An empty registry is fatal. Discovery is a single query; classes registered
//! afterwards are not considered.

use tracing::{debug, info};

use crate::cluster::ClusterClient;
use crate::{Error, Result};

const PREFERRED_IMPLEMENTATION: &str = "cilium";

/// A GatewayClass observed in the cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayClassCandidate {
    /// Class name
    pub name: String,
}

impl GatewayClassCandidate {
    /// Candidate with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn is_preferred_implementation(&self) -> bool {
        self.name.to_lowercase().contains(PREFERRED_IMPLEMENTATION)
    }
}

/// A GatewayClass name chosen by the selection rules.
///
/// Only selection produces one, so a Gateway is always built against a class
/// picked from a candidate list. [`GatewayClassResolver::resolve`] takes that
/// list from the cluster; [`GatewayClassResolver::select`] trusts the caller's.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedGatewayClass(String);

impl ResolvedGatewayClass {
    /// Class name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResolvedGatewayClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pick a GatewayClass from `candidates`, given in query order.
///
/// Unnamed candidates are ignored.
pub fn select_gateway_class(
    candidates: &[GatewayClassCandidate],
    preferred: Option<&str>,
) -> Result<ResolvedGatewayClass> {
    let named: Vec<&GatewayClassCandidate> =
        candidates.iter().filter(|c| !c.name.is_empty()).collect();
    for candidate in &named {
        debug!(gateway_class = %candidate.name, "found GatewayClass");
    }

    if named.is_empty() {
        return Err(Error::NoGatewayImplementationFound);
    }

    if let Some(wanted) = preferred.filter(|p| !p.is_empty()) {
        return match named.iter().find(|c| c.name == wanted) {
            Some(candidate) => {
                info!(gateway_class = %candidate.name, "selected configured GatewayClass");
                Ok(ResolvedGatewayClass(candidate.name.clone()))
            }
            None => Err(Error::GatewayClassNotFound {
                name: wanted.to_string(),
                available: named.iter().map(|c| c.name.clone()).collect(),
            }),
        };
    }

    if let Some(candidate) = named.iter().find(|c| c.is_preferred_implementation()) {
        info!(gateway_class = %candidate.name, "selected preferred GatewayClass");
        return Ok(ResolvedGatewayClass(candidate.name.clone()));
    }

    // Non-empty, checked above
    let Some(first) = named.iter().map(|c| c.name.as_str()).min() else {
        return Err(Error::NoGatewayImplementationFound);
    };
    info!(gateway_class = %first, "selected first GatewayClass in sorted order");
    Ok(ResolvedGatewayClass(first.to_string()))
}

/// Resolves the GatewayClass for a run against a cluster
#[derive(Clone, Debug, Default)]
pub struct GatewayClassResolver {
    preferred: Option<String>,
}

impl GatewayClassResolver {
    /// Resolver honouring an optional configured preference
    pub fn new(preferred: Option<String>) -> Self {
        Self { preferred }
    }

    /// Query the cluster once and select a class.
    ///
    /// A failed query is reported as [`Error::ClusterQuery`].
    pub async fn resolve(&self, client: &dyn ClusterClient) -> Result<ResolvedGatewayClass> {
        let names = client.list_gateway_classes().await.map_err(|e| match e {
            Error::ClusterQuery(_) => e,
            other => Error::cluster_query(other.to_string()),
        })?;
        self.select(names)
    }

    /// Select from names obtained elsewhere, e.g. supplied by an operator.
    ///
    /// The names are not checked against any cluster.
    pub fn select(&self, names: Vec<String>) -> Result<ResolvedGatewayClass> {
        let candidates: Vec<GatewayClassCandidate> =
            names.into_iter().map(GatewayClassCandidate::new).collect();
        select_gateway_class(&candidates, self.preferred.as_deref())
    }
}
