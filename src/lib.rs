//! RAGFlow on Kubernetes - dependency-ordered stack provisioning with Gateway API exposure
//!
//! The crate turns a [`config::StackConfig`] plus the live state of a cluster into
//! a set of declarative Kubernetes objects and submits them in dependency order:
//!
//! ```text
//! Namespace -> backing services -> application -> GatewayClass resolution -> Gateway + HTTPRoute
//! ```
//!
//! # Modules
//!
//! - [`config`] - Immutable stack configuration resolved from the environment
//! - [`workload`] - Typed Kubernetes core objects (Deployment, Service, PVC)
//! - [`services`] - Backing-service factories and the application assembler
//! - [`gateway`] - Gateway API types, GatewayClass resolution, route composition
//! - [`cluster`] - Cluster query/mutation seam and its kube-rs implementation
//! - [`orchestrator`] - Phase-ordered topology provisioning
//! - [`kube_utils`] - ApiResource helpers and client construction
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod gateway;
pub mod kube_utils;
pub mod orchestrator;
pub mod services;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for every server-side apply issued by this tool
pub const FIELD_MANAGER: &str = "ragflow-k8s";

/// Standard `app.kubernetes.io/name` label key
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Standard `app.kubernetes.io/managed-by` label key
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label on every generated object
pub const LABEL_MANAGED_BY_VALUE: &str = "ragflow-k8s";

/// Selector label shared by Deployments and Services
pub const LABEL_APP: &str = "app";
