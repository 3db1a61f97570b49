//! Stack configuration
//!
//! The configuration is resolved once at startup from the process environment
//! and is read-only afterwards. Components receive it by reference and never
//! consult the environment themselves.
//!
//! Resolution (highest priority first):
//! 1. Process environment variable with the same name
//! 2. Built-in defaults matching the reference RAGFlow deployment

use std::collections::BTreeMap;

use tracing::warn;

/// Port used when a configured port string cannot be parsed
pub const FALLBACK_PORT: u16 = 80;

/// Default stack name
pub const DEFAULT_NAME: &str = "ragflow";
/// Default target namespace
pub const DEFAULT_NAMESPACE: &str = "ragflow";
/// Default external hostname when `RAGFLOW_GATEWAY` is unset
pub const DEFAULT_GATEWAY_HOST: &str = "ragflow.local";
/// Default storage class for persistent volume claims
pub const DEFAULT_STORAGE_CLASS: &str = "rook-ceph-block";
/// Default Service type for the application
pub const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";

const NAME_ENV: &str = "PULUMI_NAME";
const NAMESPACE_ENV: &str = "PULUMI_NAMESPACE";
const GATEWAY_HOST_ENV: &str = "RAGFLOW_GATEWAY";
const GATEWAY_NAMESPACE_ENV: &str = "RAGFLOW_GATEWAY_NAMESPACE";
const GATEWAY_CLASS_ENV: &str = "RAGFLOW_GATEWAY_CLASS";
const SERVICE_TYPE_ENV: &str = "RAGFLOW_SERVICE_TYPE";
const STORAGE_CLASS_ENV: &str = "RAGFLOW_STORAGE_CLASS";
const BUCKET_ENV: &str = "MINIO_BUCKET";

/// Settings where an explicitly empty value switches the feature off instead
/// of falling back to the default
const DISABLE_WHEN_EMPTY: &[&str] = &[BUCKET_ENV];

/// Runtime settings passed to the application container. Each key may be
/// overridden by a process variable of the same name.
pub const DEFAULT_ENV: &[(&str, &str)] = &[
    ("DOC_ENGINE", "elasticsearch"),
    ("RAGFLOW_IMAGE", "infiniflow/ragflow:nightly"),
    ("STACK_VERSION", "8.11.3"),
    ("MYSQL_HOST", "mysql"),
    ("MYSQL_PORT", "3306"),
    ("MYSQL_DBNAME", "ragflow"),
    ("MYSQL_USER", "root"),
    ("MYSQL_PASSWORD", "root"),
    ("REDIS_HOST", "redis"),
    ("REDIS_PASSWORD", "infini_rag_flow"),
    ("ES_HOST", "elasticsearch"),
    ("ELASTIC_PASSWORD", "infini_rag_flow"),
    ("MINIO_HOST", "minio"),
    ("MINIO_PORT", "9000"),
    ("MINIO_USER", "minioadmin"),
    ("MINIO_PASSWORD", "minioadmin"),
    ("MINIO_BUCKET", "ragflow"),
    ("PYTHONPATH", "/ragflow"),
    ("TEI_HOST", "tei"),
    ("TEI_MODEL", "BAAI/bge-small-en-v1.5"),
    ("SVR_WEB_HTTP_PORT", "80"),
    ("SVR_WEB_HTTPS_PORT", "443"),
    ("SVR_HTTP_PORT", "9380"),
    ("ADMIN_SVR_HTTP_PORT", "9381"),
    ("SVR_MCP_PORT", "9382"),
    ("COMPOSE_PROFILES", "elasticsearch,cpu,tei-cpu"),
];

/// Gateway exposure settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// External hostname applied to every listener and the route, if any
    pub host: Option<String>,
    /// Namespace the Gateway object is created in
    pub namespace: String,
    /// Preferred GatewayClass; must still be present in the cluster
    pub class_name: Option<String>,
}

/// Application (RAGFlow server) settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationConfig {
    /// Container image reference
    pub image: String,
    /// Kubernetes Service type for the application endpoint
    pub service_type: String,
}

/// Immutable configuration snapshot for one deployment run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackConfig {
    /// Stack name, used to derive Gateway and route names
    pub name: String,
    /// Namespace for every workload
    pub namespace: String,
    /// Free-form settings, passed verbatim to the application
    pub env: BTreeMap<String, String>,
    /// Application settings
    pub application: ApplicationConfig,
    /// Storage class for persistent volume claims
    pub storage_class: String,
    /// Gateway settings
    pub gateway: GatewayConfig,
}

impl StackConfig {
    /// Resolve configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary variable lookup
    ///
    /// Unset or empty variables fall back to defaults, except `RAGFLOW_GATEWAY`
    /// and `MINIO_BUCKET` where an explicitly empty value disables hostname
    /// filtering and bucket bootstrap respectively.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let name = non_empty(NAME_ENV).unwrap_or_else(|| DEFAULT_NAME.to_string());
        let namespace = non_empty(NAMESPACE_ENV).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let host = match lookup(GATEWAY_HOST_ENV) {
            None => Some(DEFAULT_GATEWAY_HOST.to_string()),
            Some(h) if h.is_empty() => None,
            Some(h) => Some(h),
        };

        let env: BTreeMap<String, String> = DEFAULT_ENV
            .iter()
            .map(|(key, default)| {
                let value = match lookup(*key) {
                    Some(v) if v.is_empty() && DISABLE_WHEN_EMPTY.contains(key) => v,
                    Some(v) if !v.is_empty() => v,
                    _ => default.to_string(),
                };
                (key.to_string(), value)
            })
            .collect();

        let image = env
            .get("RAGFLOW_IMAGE")
            .cloned()
            .unwrap_or_default();

        Self {
            gateway: GatewayConfig {
                host,
                namespace: non_empty(GATEWAY_NAMESPACE_ENV).unwrap_or_else(|| namespace.clone()),
                class_name: non_empty(GATEWAY_CLASS_ENV),
            },
            application: ApplicationConfig {
                image,
                service_type: non_empty(SERVICE_TYPE_ENV)
                    .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string()),
            },
            storage_class: non_empty(STORAGE_CLASS_ENV)
                .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_string()),
            name,
            namespace,
            env,
        }
    }

    /// Value of a setting, or the empty string when absent
    pub fn value(&self, key: &str) -> &str {
        self.env.get(key).map(String::as_str).unwrap_or("")
    }

    /// Port setting coerced with [`parse_port`]
    pub fn port(&self, key: &str) -> u16 {
        parse_port(key, self.value(key))
    }

    /// Object-storage bucket to bootstrap, if configured
    pub fn bucket(&self) -> Option<&str> {
        self.env
            .get(BUCKET_ENV)
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }
}

/// Coerce a port string, falling back to [`FALLBACK_PORT`] when it is not a
/// valid port number. The fallback is logged rather than treated as an error.
pub fn parse_port(key: &str, raw: &str) -> u16 {
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => port,
        _ => {
            warn!(
                key = %key,
                value = %raw,
                fallback = FALLBACK_PORT,
                "unparsable port setting, using fallback"
            );
            FALLBACK_PORT
        }
    }
}
