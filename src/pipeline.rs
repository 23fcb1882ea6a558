// Ingestion pipeline: resolve -> filter -> route lookup -> record
//
// Hostnames are handled strictly in input order. Resolution may run ahead
// of the current hostname, but route membership checks, registry lookups
// and writes happen one hostname at a time so a block discovered for one
// host is always visible to the next.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use ipnet::IpNet;
use serde::Serialize;
use std::net::IpAddr;
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::lookup::resolver::AddressResolver;
use crate::lookup::whois::{RegistryLookupClient, RegistryQuery};
use crate::routes::private::is_private;
use crate::routes::registry::{KnownRoute, RouteRegistry};
use crate::routes::{HostRecord, RouteRecord};
use crate::store::RecordSink;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hosts_written: usize,
    pub routes_discovered: usize,
    pub private_hosts: usize,
    /// Hostnames with no address or no route, in input order
    pub failed: Vec<String>,
}

/// Read a newline-delimited host list. Every line is a hostname, blank
/// lines included.
pub fn read_host_list(path: &Path) -> AppResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            AppError::InvalidInput(format!("{} is not UTF-8 text", path.display()))
        } else {
            AppError::Io(e)
        }
    })?;
    Ok(content.lines().map(str::to_string).collect())
}

pub struct IngestionPipeline<R, Q> {
    resolver: R,
    lookup: RegistryLookupClient<Q>,
    registry: RouteRegistry,
    resolve_ahead: usize,
}

impl<R, Q> IngestionPipeline<R, Q>
where
    R: AddressResolver,
    Q: RegistryQuery,
{
    pub fn new(resolver: R, lookup: RegistryLookupClient<Q>) -> Self {
        IngestionPipeline {
            resolver,
            lookup,
            registry: RouteRegistry::new(),
            resolve_ahead: 1,
        }
    }

    /// Allow up to `n` hostnames to be resolved ahead of the one being recorded
    pub fn with_resolve_ahead(mut self, n: usize) -> Self {
        self.resolve_ahead = n.max(1);
        self
    }

    /// Process every hostname and write the resulting rows to `sink`.
    ///
    /// Per-host failures end up in the report; an unparseable route or a
    /// sink error aborts the run.
    pub async fn ingest<S: RecordSink>(
        &mut self,
        hostnames: Vec<String>,
        sink: &mut S,
    ) -> AppResult<IngestReport> {
        let started_at = Utc::now();
        let resolver = &self.resolver;
        let lookup = &self.lookup;
        let registry = &mut self.registry;

        let mut resolved = std::pin::pin!(stream::iter(hostnames)
            .map(move |name| async move {
                tracing::info!("Ingesting {}", name);
                let addr = resolver.resolve(&name).await;
                (name, addr)
            })
            .buffered(self.resolve_ahead));

        let mut next_host_id: i64 = 0;
        let mut private_hosts = 0;
        let mut failed = Vec::new();

        while let Some((name, addr)) = resolved.next().await {
            let Some(addr) = addr else {
                failed.push(name);
                continue;
            };

            let route_id = match assign_route(lookup, registry, sink, &name, addr).await? {
                Assignment::Private => {
                    private_hosts += 1;
                    None
                }
                Assignment::Route(index) => Some(index as i64),
                Assignment::Failed => {
                    failed.push(name);
                    continue;
                }
            };

            sink.insert_host(&HostRecord {
                id: next_host_id,
                name,
                address: addr.to_string(),
                route_id,
            })?;
            next_host_id += 1;
        }

        Ok(IngestReport {
            started_at,
            finished_at: Utc::now(),
            hosts_written: next_host_id as usize,
            routes_discovered: registry.len(),
            private_hosts,
            failed,
        })
    }
}

enum Assignment {
    Private,
    Route(usize),
    Failed,
}

async fn assign_route<Q: RegistryQuery, S: RecordSink>(
    lookup: &RegistryLookupClient<Q>,
    registry: &mut RouteRegistry,
    sink: &mut S,
    name: &str,
    addr: IpAddr,
) -> AppResult<Assignment> {
    if is_private(addr) {
        tracing::info!("Skipping rfc1918 netblock for {}: {}", name, addr);
        return Ok(Assignment::Private);
    }

    if let Some(index) = registry.find_route(addr) {
        if let Some(known) = registry.get(index) {
            tracing::debug!(
                "{} ({}) is in known route {} {} ({})",
                name,
                addr,
                known.network,
                known.asn,
                known.owner
            );
        }
        return Ok(Assignment::Route(index));
    }

    let info = match lookup.lookup_route(addr).await {
        Ok(info) => info,
        Err(e) => {
            tracing::error!("Could not retrieve whois report for {}: {}", addr, e);
            return Ok(Assignment::Failed);
        }
    };

    if info.cidr.is_empty() {
        tracing::error!("Couldn't parse data for {}, skipping", name);
        return Ok(Assignment::Failed);
    }

    let network: IpNet = info.cidr.parse().map_err(|_| {
        tracing::error!("Invalid CIDR for route {}", info.cidr);
        AppError::InvalidCidr(info.cidr.clone())
    })?;

    let index = registry.append(KnownRoute {
        network,
        asn: info.asn.clone(),
        owner: info.owner.clone(),
    });
    sink.insert_route(&RouteRecord {
        id: index as i64,
        cidr: info.cidr,
        asn: info.asn,
        owner: info.owner,
    })?;

    Ok(Assignment::Route(index))
}
