//! Error types for stack provisioning
//!
//! Every fatal condition aborts the run. Errors raised inside the orchestrator
//! are wrapped in [`Error::Phase`] so the caller can report which phase failed.

use thiserror::Error;

use crate::orchestrator::DeployPhase;

/// Main error type for provisioning operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Invalid or unloadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The control plane could not be queried for GatewayClasses
    #[error("failed to list gatewayclasses: {0}")]
    ClusterQuery(String),

    /// The cluster has no Gateway API implementation installed
    #[error("no GatewayClass found in cluster")]
    NoGatewayImplementationFound,

    /// A configured GatewayClass preference is not registered in the cluster
    #[error("GatewayClass {name:?} not found in cluster (available: {available:?})")]
    GatewayClassNotFound {
        /// The requested class name
        name: String,
        /// Class names that were observed
        available: Vec<String>,
    },

    /// Two route rules claim the same path prefix
    #[error("path prefix {prefix:?} is claimed by more than one route rule")]
    RouteConflict {
        /// The duplicated prefix
        prefix: String,
    },

    /// A create/update call against the cluster failed
    #[error("failed to apply {kind} {name}: {message}")]
    Submission {
        /// Resource kind
        kind: String,
        /// Resource name
        name: String,
        /// Underlying cause
        message: String,
    },

    /// An error annotated with the provisioning phase it occurred in
    #[error("{phase} phase failed: {source}")]
    Phase {
        /// Phase that failed
        phase: DeployPhase,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a cluster query error
    pub fn cluster_query(msg: impl Into<String>) -> Self {
        Self::ClusterQuery(msg.into())
    }

    /// Create a submission error for a specific object
    pub fn submission(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Submission {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Wrap this error with the phase it occurred in
    pub fn in_phase(self, phase: DeployPhase) -> Self {
        Self::Phase {
            phase,
            source: Box::new(self),
        }
    }

    /// Phase the error was raised in, if it has been annotated
    pub fn phase(&self) -> Option<DeployPhase> {
        match self {
            Self::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The innermost error, skipping phase annotations
    pub fn root(&self) -> &Error {
        match self {
            Self::Phase { source, .. } => source.root(),
            other => other,
        }
    }
}
