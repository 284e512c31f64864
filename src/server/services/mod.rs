pub mod access_services;
pub mod proxy_services;
pub mod upstream_services;

pub use access_services::{AccessPolicy, GateDecision};
pub use proxy_services::ProxyServices;
pub use upstream_services::DynUpstreamService;
