//! External exposure through the Gateway API
//!
//! Exposure happens in two steps once the application endpoint exists:
//! 1. [`resolver`] picks one GatewayClass from a candidate list, normally the
//!    classes registered in the cluster, and hands back a
//!    [`ResolvedGatewayClass`] that only the selection rules can produce.
//! 2. [`routes`] builds the Gateway and the HTTPRoute multiplexing the
//!    application's ports behind one listener.

pub mod resolver;
pub mod routes;
pub mod types;

pub use resolver::{
    select_gateway_class, GatewayClassCandidate, GatewayClassResolver, ResolvedGatewayClass,
};
pub use routes::{ComposedIngress, RouteComposer, RouteRule, RouteTable};
pub use types::{Gateway, HttpRoute};
