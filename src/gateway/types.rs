//! Gateway API objects emitted for external exposure
//!
//! Typed mirrors of the subset of `gateway.networking.k8s.io/v1` the stack
//! needs: a Gateway with plain HTTP listeners and an HTTPRoute with
//! path-prefix rules. The CRD schema itself is owned by the installed
//! implementation; nothing here validates against it.

use serde::{Deserialize, Serialize};

use crate::kube_utils::{HasApiResource, ObjectMeta};

/// Gateway API group
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
/// Gateway API group/version served by every supported implementation
pub const GATEWAY_API_VERSION: &str = "gateway.networking.k8s.io/v1";

/// Fills apiVersion/kind from `HasApiResource` for serde defaults and `new`.
macro_rules! impl_gateway_object {
    ($type:ty, $spec:ty) => {
        impl $type {
            fn default_api_version() -> String {
                <Self as HasApiResource>::API_VERSION.to_string()
            }

            fn default_kind() -> String {
                <Self as HasApiResource>::KIND.to_string()
            }

            /// Create the object with its canonical apiVersion and kind
            pub fn new(metadata: ObjectMeta, spec: $spec) -> Self {
                Self {
                    api_version: Self::default_api_version(),
                    kind: Self::default_kind(),
                    metadata,
                    spec,
                }
            }
        }
    };
}

// =============================================================================
// GatewayClass
// =============================================================================

/// Marker for the cluster-scoped GatewayClass kind; only ever listed, never
/// emitted.
pub struct GatewayClass;

impl HasApiResource for GatewayClass {
    const API_VERSION: &'static str = GATEWAY_API_VERSION;
    const KIND: &'static str = "GatewayClass";
}

// =============================================================================
// Gateway
// =============================================================================

/// Gateway API Gateway
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    /// API version
    #[serde(default = "Gateway::default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "Gateway::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: GatewaySpec,
}

impl HasApiResource for Gateway {
    const API_VERSION: &'static str = GATEWAY_API_VERSION;
    const KIND: &'static str = "Gateway";
}

impl_gateway_object!(Gateway, GatewaySpec);

/// Gateway spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Verified GatewayClass name
    pub gateway_class_name: String,
    /// Listeners, in declaration order
    pub listeners: Vec<GatewayListener>,
}

/// Gateway listener
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayListener {
    /// Listener name; routes bind to it through `sectionName`
    pub name: String,
    /// Hostname filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Port
    pub port: u16,
    /// Protocol (HTTP)
    pub protocol: String,
    /// Which namespaces may attach routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_routes: Option<AllowedRoutes>,
}

impl GatewayListener {
    /// Plain HTTP listener accepting routes from every namespace
    pub fn http(name: impl Into<String>, port: u16, hostname: Option<String>) -> Self {
        Self {
            name: name.into(),
            hostname,
            port,
            protocol: "HTTP".to_string(),
            allowed_routes: Some(AllowedRoutes::all_namespaces()),
        }
    }
}

/// Allowed routes for a listener
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllowedRoutes {
    /// Namespace selector
    pub namespaces: RouteNamespaces,
}

impl AllowedRoutes {
    /// Routes from any namespace may attach
    pub fn all_namespaces() -> Self {
        Self {
            namespaces: RouteNamespaces {
                from: "All".to_string(),
            },
        }
    }
}

/// Route namespace selector
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteNamespaces {
    /// Selection mode (Same, All, Selector)
    pub from: String,
}

// =============================================================================
// HTTPRoute
// =============================================================================

/// Gateway API HTTPRoute
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoute {
    /// API version
    #[serde(default = "HttpRoute::default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "HttpRoute::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: HttpRouteSpec,
}

impl HasApiResource for HttpRoute {
    const API_VERSION: &'static str = GATEWAY_API_VERSION;
    const KIND: &'static str = "HTTPRoute";
}

impl_gateway_object!(HttpRoute, HttpRouteSpec);

/// HTTPRoute spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteSpec {
    /// Gateway listeners this route attaches to
    pub parent_refs: Vec<ParentRef>,
    /// Hostname filter; empty matches every host reaching the listener
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    /// Rules, in evaluation order
    pub rules: Vec<HttpRouteRule>,
}

/// Reference from a route to a Gateway listener
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    /// API group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Gateway name
    pub name: String,
    /// Gateway namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Listener name, matched exactly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

impl ParentRef {
    /// Bind to listener `section_name` of Gateway `name` in `namespace`
    pub fn gateway(name: &str, namespace: &str, section_name: impl Into<String>) -> Self {
        Self {
            group: Some(GATEWAY_API_GROUP.to_string()),
            kind: Some("Gateway".to_string()),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            section_name: Some(section_name.into()),
        }
    }
}

/// HTTPRoute rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteRule {
    /// Matches; any one suffices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<HttpRouteMatch>,
    /// Backends
    pub backend_refs: Vec<BackendRef>,
}

/// HTTP request match
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteMatch {
    /// Path match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<HttpPathMatch>,
}

impl HttpRouteMatch {
    /// Match requests whose path starts with `prefix`
    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        Self {
            path: Some(HttpPathMatch {
                type_: "PathPrefix".to_string(),
                value: prefix.into(),
            }),
        }
    }
}

/// HTTP path match
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpPathMatch {
    /// Match type (PathPrefix, Exact)
    #[serde(rename = "type")]
    pub type_: String,
    /// Path value
    pub value: String,
}

/// Backend reference
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    /// Kind (Service)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Service name
    pub name: String,
    /// Service port
    pub port: u16,
}

impl BackendRef {
    /// Reference a port of a Service in the route's namespace
    pub fn service(name: impl Into<String>, port: u16) -> Self {
        Self {
            kind: Some("Service".to_string()),
            name: name.into(),
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_serializes_for_the_api_server() {
        let gateway = Gateway::new(
            ObjectMeta::new("ragflow-gateway", "ragflow"),
            GatewaySpec {
                gateway_class_name: "cilium".to_string(),
                listeners: vec![GatewayListener::http("http", 80, None)],
            },
        );
        let json = serde_json::to_value(&gateway).unwrap();

        assert_eq!(json["apiVersion"], "gateway.networking.k8s.io/v1");
        assert_eq!(json["kind"], "Gateway");
        assert_eq!(json["spec"]["gatewayClassName"], "cilium");
        let listener = &json["spec"]["listeners"][0];
        assert_eq!(listener["protocol"], "HTTP");
        assert_eq!(listener["allowedRoutes"]["namespaces"]["from"], "All");
        assert!(listener.get("hostname").is_none());
    }

    #[test]
    fn route_parent_ref_targets_a_listener() {
        let parent = ParentRef::gateway("ragflow-gateway", "infra", "http");
        let json = serde_json::to_value(&parent).unwrap();
        assert_eq!(json["group"], GATEWAY_API_GROUP);
        assert_eq!(json["namespace"], "infra");
        assert_eq!(json["sectionName"], "http");
    }

    #[test]
    fn path_prefix_match_uses_type_key() {
        let json = serde_json::to_value(HttpRouteMatch::path_prefix("/v1")).unwrap();
        assert_eq!(json["path"]["type"], "PathPrefix");
        assert_eq!(json["path"]["value"], "/v1");
    }

    #[test]
    fn missing_type_meta_is_defaulted_on_read() {
        let route: HttpRoute = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "ragflow-http-route"},
            "spec": {"parentRefs": [], "rules": []}
        }))
        .unwrap();
        assert_eq!(route.api_version, GATEWAY_API_VERSION);
        assert_eq!(route.kind, "HTTPRoute");
    }

    #[test]
    fn gateway_class_resource_is_cluster_plural() {
        let ar = GatewayClass::api_resource();
        assert_eq!(ar.group, GATEWAY_API_GROUP);
        assert_eq!(ar.plural, "gatewayclasses");
    }
}
