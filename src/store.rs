// SQLite persistence for hosts and routes
//
// The store is rebuilt from scratch on every run and written inside a
// single transaction that is committed once all hostnames are processed.

use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use std::path::Path;

use crate::error::AppResult;
use crate::routes::{HostRecord, RouteRecord};

const SCHEMA: &str = r#"
CREATE TABLE routes (
    id INTEGER NOT NULL PRIMARY KEY,
    route TEXT,
    asn TEXT,
    owner TEXT
);
CREATE TABLE records (
    id INTEGER NOT NULL PRIMARY KEY,
    name TEXT,
    addr TEXT,
    route_id INTEGER REFERENCES routes(id)
);
"#;

/// Destination for the rows produced by an ingestion run
pub trait RecordSink {
    fn insert_route(&mut self, route: &RouteRecord) -> AppResult<()>;
    fn insert_host(&mut self, host: &HostRecord) -> AppResult<()>;
}

/// A route together with how many hosts were attributed to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub route: RouteRecord,
    pub host_count: i64,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Delete whatever is at `path` and create a fresh store there
    pub fn create(path: &Path) -> AppResult<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!("Removed previous store at {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let conn = Connection::open(path)?;
        let store = Store { conn };
        store.init_schema()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> AppResult<Self> {
        let store = Store {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an existing store without resetting it
    #[cfg(test)]
    pub fn open(path: &Path) -> AppResult<Self> {
        Ok(Store {
            conn: Connection::open(path)?,
        })
    }

    fn init_schema(&self) -> AppResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Begin the run transaction. Dropping it without `commit` rolls back.
    pub fn begin(&mut self) -> AppResult<StoreTransaction<'_>> {
        Ok(StoreTransaction {
            tx: self.conn.transaction()?,
        })
    }

    #[cfg(test)]
    pub fn routes(&self) -> AppResult<Vec<RouteRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, route, asn, owner FROM routes ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(RouteRecord {
                id: row.get(0)?,
                cidr: row.get(1)?,
                asn: row.get(2)?,
                owner: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn hosts(&self) -> AppResult<Vec<HostRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, addr, route_id FROM records ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(HostRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                address: row.get(2)?,
                route_id: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every route with the number of hosts living in it, by route id
    pub fn route_summary(&self) -> AppResult<Vec<RouteSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.route, r.asn, r.owner, COUNT(h.id)
             FROM routes r LEFT JOIN records h ON h.route_id = r.id
             GROUP BY r.id ORDER BY r.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RouteSummary {
                route: RouteRecord {
                    id: row.get(0)?,
                    cidr: row.get(1)?,
                    asn: row.get(2)?,
                    owner: row.get(3)?,
                },
                host_count: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// The single write transaction of an ingestion run
pub struct StoreTransaction<'a> {
    tx: Transaction<'a>,
}

impl StoreTransaction<'_> {
    pub fn commit(self) -> AppResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}

impl RecordSink for StoreTransaction<'_> {
    fn insert_route(&mut self, route: &RouteRecord) -> AppResult<()> {
        self.tx
            .prepare_cached("INSERT INTO routes (id, route, asn, owner) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![route.id, route.cidr, route.asn, route.owner])?;
        Ok(())
    }

    fn insert_host(&mut self, host: &HostRecord) -> AppResult<()> {
        self.tx
            .prepare_cached("INSERT INTO records (id, name, addr, route_id) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![host.id, host.name, host.address, host.route_id])?;
        Ok(())
    }
}

/// Sink that keeps rows in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub routes: Vec<RouteRecord>,
    pub hosts: Vec<HostRecord>,
}

#[cfg(test)]
impl RecordSink for MemorySink {
    fn insert_route(&mut self, route: &RouteRecord) -> AppResult<()> {
        self.routes.push(route.clone());
        Ok(())
    }

    fn insert_host(&mut self, host: &HostRecord) -> AppResult<()> {
        self.hosts.push(host.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: i64, cidr: &str) -> RouteRecord {
        RouteRecord {
            id,
            cidr: cidr.to_string(),
            asn: "AS64500".to_string(),
            owner: "EXAMPLE-NET".to_string(),
        }
    }

    fn host(id: i64, name: &str, route_id: Option<i64>) -> HostRecord {
        HostRecord {
            id,
            name: name.to_string(),
            address: "198.51.100.5".to_string(),
            route_id,
        }
    }

    #[test]
    fn test_commit_persists_rows() {
        let mut store = Store::in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_route(&route(0, "198.51.100.0/24")).unwrap();
        tx.insert_host(&host(0, "a.example", Some(0))).unwrap();
        tx.insert_host(&host(1, "intranet.example", None)).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.routes().unwrap(), vec![route(0, "198.51.100.0/24")]);
        let hosts = store.hosts().unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].route_id, Some(0));
        assert_eq!(hosts[1].route_id, None);
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let mut store = Store::in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_route(&route(0, "198.51.100.0/24")).unwrap();
            tx.insert_host(&host(0, "a.example", Some(0))).unwrap();
        }
        assert!(store.routes().unwrap().is_empty());
        assert!(store.hosts().unwrap().is_empty());
    }

    #[test]
    fn test_route_summary_counts_hosts() {
        let mut store = Store::in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_route(&route(0, "198.51.100.0/24")).unwrap();
        tx.insert_route(&route(1, "203.0.113.0/24")).unwrap();
        tx.insert_host(&host(0, "a.example", Some(0))).unwrap();
        tx.insert_host(&host(1, "b.example", Some(0))).unwrap();
        tx.insert_host(&host(2, "c.example", None)).unwrap();
        tx.commit().unwrap();

        let summary = store.route_summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].host_count, 2);
        assert_eq!(summary[1].host_count, 0);
    }

    #[test]
    fn test_create_discards_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enumerate.db");

        let mut store = Store::create(&path).unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_route(&route(0, "198.51.100.0/24")).unwrap();
        tx.insert_host(&host(0, "a.example", Some(0))).unwrap();
        tx.commit().unwrap();
        drop(store);

        let store = Store::create(&path).unwrap();
        assert!(store.routes().unwrap().is_empty());
        assert!(store.hosts().unwrap().is_empty());
    }
}
