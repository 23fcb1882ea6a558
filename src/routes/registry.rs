// In-memory registry of routes discovered during a run

use ipnet::IpNet;
use std::net::IpAddr;

/// A discovered network block together with its registry metadata
#[derive(Debug, Clone)]
pub struct KnownRoute {
    pub network: IpNet,
    pub asn: String,
    pub owner: String,
}

/// Append-only list of routes in discovery order.
///
/// A route's index in the list is also its persisted id.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<KnownRoute>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        RouteRegistry { routes: Vec::new() }
    }

    /// Find the first (lowest id) known route containing `addr`.
    ///
    /// Linear scan; route counts are bounded by the hostnames in one run.
    pub fn find_route(&self, addr: IpAddr) -> Option<usize> {
        self.routes
            .iter()
            .position(|route| route.network.contains(&addr))
    }

    /// Append a route and return its newly assigned index
    pub fn append(&mut self, route: KnownRoute) -> usize {
        self.routes.push(route);
        self.routes.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&KnownRoute> {
        self.routes.get(index)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(cidr: &str) -> KnownRoute {
        KnownRoute {
            network: cidr.parse().unwrap(),
            asn: "AS64500".to_string(),
            owner: "EXAMPLE-NET".to_string(),
        }
    }

    #[test]
    fn test_append_assigns_dense_indices() {
        let mut registry = RouteRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.append(route("198.51.100.0/24")), 0);
        assert_eq!(registry.append(route("203.0.113.0/24")), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(1).unwrap().network.to_string(), "203.0.113.0/24");
    }

    #[test]
    fn test_find_route() {
        let mut registry = RouteRegistry::new();
        registry.append(route("198.51.100.0/24"));
        registry.append(route("203.0.113.0/24"));

        let ip: IpAddr = "203.0.113.77".parse().unwrap();
        assert_eq!(registry.find_route(ip), Some(1));

        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        assert_eq!(registry.find_route(ip), None);
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        let mut registry = RouteRegistry::new();
        registry.append(route("198.51.100.0/24"));
        registry.append(route("198.51.0.0/16"));
        registry.append(route("198.51.100.0/25"));

        let ip: IpAddr = "198.51.100.5".parse().unwrap();
        assert_eq!(registry.find_route(ip), Some(0));

        let ip: IpAddr = "198.51.7.1".parse().unwrap();
        assert_eq!(registry.find_route(ip), Some(1));
    }

    #[test]
    fn test_ipv6_routes() {
        let mut registry = RouteRegistry::new();
        registry.append(route("2001:db8::/32"));

        let ip: IpAddr = "2001:db8:1::1".parse().unwrap();
        assert_eq!(registry.find_route(ip), Some(0));

        let ip: IpAddr = "198.51.100.5".parse().unwrap();
        assert_eq!(registry.find_route(ip), None);
    }
}
