// Routes module - route/host data model, private range filtering and route membership

pub mod parser;
pub mod private;
pub mod registry;

use serde::{Deserialize, Serialize};

/// Fields extracted from the registry for one address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub cidr: String, // CIDR notation, empty when unmatched
    pub asn: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: i64,
    pub cidr: String,
    pub asn: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: i64,
    pub name: String,
    pub address: String,
    /// None for hosts in a private range
    pub route_id: Option<i64>,
}
