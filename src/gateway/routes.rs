//! Gateway and HTTPRoute composition
//!
//! One Gateway with a single HTTP listener fronts the application. The route
//! binds to that listener by exact section name and multiplexes the
//! application's ports by path prefix:
//!
//! | Prefixes | Service port |
//! |---|---|
//! | `/v1`, `/api` | `api` |
//! | `/api/v1/admin` | `admin` |
//!
//! Rules are emitted in that order. More specific prefixes get their own rule
//! instead of relying on the implementation's longest-prefix matching.

use tracing::debug;

use crate::config::StackConfig;
use crate::kube_utils::ObjectMeta;
use crate::services::application::{ADMIN_PORT_NAME, API_PORT_NAME};
use crate::workload::Service;
use crate::{Error, Result};

use super::resolver::ResolvedGatewayClass;
use super::types::{
    BackendRef, Gateway, GatewayListener, GatewaySpec, HttpRoute, HttpRouteMatch, HttpRouteRule,
    HttpRouteSpec, ParentRef,
};

/// Name of the single Gateway listener
pub const HTTP_LISTENER: &str = "http";
/// Port of the single Gateway listener
pub const HTTP_LISTENER_PORT: u16 = 80;

/// Prefixes served by the primary API port
pub const API_PREFIXES: &[&str] = &["/v1", "/api"];
/// Prefixes served by the admin port
pub const ADMIN_PREFIXES: &[&str] = &["/api/v1/admin"];

/// A set of path prefixes routed to one backend port
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRule {
    /// Path prefixes, in match order
    pub path_prefixes: Vec<String>,
    /// Backend service port
    pub backend_port: u16,
}

impl RouteRule {
    /// Rule routing `prefixes` to `backend_port`
    pub fn new(prefixes: &[&str], backend_port: u16) -> Self {
        Self {
            path_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            backend_port,
        }
    }
}

/// Ordered, collision-free set of route rules for one listener.
///
/// Two rules collide when they claim the same prefix string. Nested prefixes
/// such as `/api` and `/api/v1/admin` are distinct.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule, rejecting any prefix already claimed
    pub fn push(&mut self, rule: RouteRule) -> Result<()> {
        for (i, prefix) in rule.path_prefixes.iter().enumerate() {
            let claimed = self
                .rules
                .iter()
                .flat_map(|r| r.path_prefixes.iter())
                .chain(rule.path_prefixes[..i].iter())
                .any(|p| p == prefix);
            if claimed {
                return Err(Error::RouteConflict {
                    prefix: prefix.clone(),
                });
            }
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Every prefix across all rules, in declaration order
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .flat_map(|r| r.path_prefixes.iter().map(String::as_str))
    }
}

/// Gateway plus the route attached to it
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedIngress {
    /// External Gateway
    pub gateway: Gateway,
    /// Route to the application endpoint
    pub http_route: HttpRoute,
}

/// Builds the ingress objects for an application endpoint
#[derive(Clone, Copy, Debug, Default)]
pub struct RouteComposer;

impl RouteComposer {
    /// Route table for an endpoint exposing `api` and `admin` ports
    pub fn route_table(&self, endpoint: &Service) -> Result<RouteTable> {
        let api = named_port(endpoint, API_PORT_NAME)?;
        let admin = named_port(endpoint, ADMIN_PORT_NAME)?;

        let mut table = RouteTable::new();
        table.push(RouteRule::new(API_PREFIXES, api))?;
        table.push(RouteRule::new(ADMIN_PREFIXES, admin))?;
        Ok(table)
    }

    /// Compose the Gateway and HTTPRoute for `endpoint`
    pub fn compose(
        &self,
        config: &StackConfig,
        endpoint: &Service,
        class: &ResolvedGatewayClass,
    ) -> Result<ComposedIngress> {
        let gateway_name = format!("{}-gateway", config.name);
        let route_name = format!("{}-http-route", config.name);
        let host = config.gateway.host.clone().filter(|h| !h.is_empty());

        let gateway = Gateway::new(
            ObjectMeta::new(&gateway_name, &config.gateway.namespace),
            GatewaySpec {
                gateway_class_name: class.name().to_string(),
                listeners: vec![GatewayListener::http(
                    HTTP_LISTENER,
                    HTTP_LISTENER_PORT,
                    host.clone(),
                )],
            },
        );

        let table = self.route_table(endpoint)?;
        let backend = endpoint.metadata.name.as_str();
        let rules = table
            .rules()
            .iter()
            .map(|rule| HttpRouteRule {
                matches: rule
                    .path_prefixes
                    .iter()
                    .map(|p| HttpRouteMatch::path_prefix(p.as_str()))
                    .collect(),
                backend_refs: vec![BackendRef::service(backend, rule.backend_port)],
            })
            .collect();

        let route_namespace = endpoint
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| config.namespace.clone());
        let http_route = HttpRoute::new(
            ObjectMeta::new(&route_name, route_namespace),
            HttpRouteSpec {
                parent_refs: vec![ParentRef::gateway(
                    &gateway_name,
                    &config.gateway.namespace,
                    HTTP_LISTENER,
                )],
                hostnames: host.into_iter().collect(),
                rules,
            },
        );

        debug!(
            gateway = %gateway_name,
            route = %route_name,
            gateway_class = %class,
            "composed ingress"
        );
        Ok(ComposedIngress {
            gateway,
            http_route,
        })
    }
}

fn named_port(endpoint: &Service, name: &str) -> Result<u16> {
    endpoint.port_named(name).ok_or_else(|| {
        Error::config(format!(
            "service {} has no port named {name}",
            endpoint.metadata.name
        ))
    })
}
