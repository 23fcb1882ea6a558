// Hostname resolution through the host's resolver

use async_trait::async_trait;
use std::net::IpAddr;

#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve `hostname` to its first address, or None if it has no records.
    async fn resolve(&self, hostname: &str) -> Option<IpAddr>;
}

/// Resolver backed by the operating system (getaddrinfo via tokio)
#[derive(Debug, Clone, Default)]
pub struct SystemResolver;

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn resolve(&self, hostname: &str) -> Option<IpAddr> {
        match tokio::net::lookup_host((hostname, 0)).await {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => {
                    let ip = addr.ip();
                    tracing::debug!("Got {} for {}", ip, hostname);
                    Some(ip)
                }
                None => {
                    tracing::info!("No record for {}: empty answer", hostname);
                    None
                }
            },
            Err(e) => {
                tracing::info!("No record for {}: {}", hostname, e);
                None
            }
        }
    }
}
