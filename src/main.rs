mod config;
mod error;
mod lookup;
mod pipeline;
mod routes;
mod store;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{AppResult, Severity};
use lookup::resolver::SystemResolver;
use lookup::whois::{RegistryLookupClient, WhoisCommand};
use pipeline::{IngestReport, IngestionPipeline};
use routes::HostRecord;
use store::{RouteSummary, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Logs go to stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(config.log_level).into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(source) = &config.source {
        tracing::info!("Loaded configuration from: {}", source.display());
    }

    let outcome = match run(&config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = match e.severity() {
                Severity::RunFatal => {
                    format!("Run aborted, nothing was committed. {}", e.user_message())
                }
                _ => e.user_message(),
            };
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    if config.json {
        let output = serde_json::json!({
            "report": outcome.report,
            "routes": outcome.routes,
            "hosts": outcome.hosts,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !outcome.report.failed.is_empty() {
        println!("The following domains failed to enumerate correctly:");
        for name in &outcome.report.failed {
            println!("{}", name);
        }
    }

    Ok(())
}

/// What a committed run leaves behind
struct RunOutcome {
    report: IngestReport,
    routes: Vec<RouteSummary>,
    hosts: Vec<HostRecord>,
}

async fn run(config: &Config) -> AppResult<RunOutcome> {
    // Prerequisites are checked before the previous store is discarded
    let whois = WhoisCommand::locate(&config.lookup_tool, config.lookup_timeout, config.retry.clone())?;
    let hostnames = pipeline::read_host_list(&config.list)?;
    if hostnames.is_empty() {
        tracing::warn!("Host list {} is empty", config.list.display());
    }
    tracing::info!(
        "Enumerating {} hostnames from {} into {}",
        hostnames.len(),
        config.list.display(),
        config.db.display()
    );

    let mut store = Store::create(&config.db)?;
    let mut pipeline = IngestionPipeline::new(SystemResolver, RegistryLookupClient::new(whois))
        .with_resolve_ahead(config.resolve_concurrency);

    let report = {
        let mut tx = store.begin()?;
        let report = pipeline.ingest(hostnames, &mut tx).await?;
        tx.commit()?;
        report
    };

    let routes = store.route_summary()?;
    for summary in &routes {
        tracing::info!(
            "Route {} {} ({}) hosts: {}",
            summary.route.cidr,
            summary.route.asn,
            summary.route.owner,
            summary.host_count
        );
    }
    tracing::info!(
        "Wrote {} hosts ({} private) and {} routes in {}ms, {} failed",
        report.hosts_written,
        report.private_hosts,
        report.routes_discovered,
        (report.finished_at - report.started_at).num_milliseconds(),
        report.failed.len()
    );

    let hosts = store.hosts()?;

    Ok(RunOutcome {
        report,
        routes,
        hosts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, RetryConfig};
    use crate::routes::RouteRecord;
    use crate::store::RecordSink;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn config(dir: &Path, list: PathBuf, lookup_tool: &str) -> Config {
        Config {
            list,
            db: dir.join("enumerate.db"),
            log_level: tracing::Level::INFO,
            lookup_tool: lookup_tool.to_string(),
            lookup_timeout: Duration::from_secs(1),
            retry: RetryConfig::default(),
            resolve_concurrency: 1,
            json: false,
            source: None,
        }
    }

    fn seed_store(path: &Path) {
        let mut store = Store::create(path).unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_route(&RouteRecord {
            id: 0,
            cidr: "198.51.100.0/24".to_string(),
            asn: "AS64500".to_string(),
            owner: "EXAMPLE-NET".to_string(),
        })
        .unwrap();
        tx.insert_host(&HostRecord {
            id: 0,
            name: "a.example".to_string(),
            address: "198.51.100.5".to_string(),
            route_id: Some(0),
        })
        .unwrap();
        tx.commit().unwrap();
    }

    #[tokio::test]
    async fn test_missing_tool_keeps_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("enumerate.txt");
        std::fs::write(&list, "b.example\n").unwrap();
        let missing_tool = dir.path().join("no-such-whois");
        let config = config(dir.path(), list, missing_tool.to_str().unwrap());
        seed_store(&config.db);

        let result = run(&config).await;
        assert!(matches!(result, Err(AppError::ToolNotFound(_))));

        let store = Store::open(&config.db).unwrap();
        let hosts = store.hosts().unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name, "a.example");
        assert_eq!(store.route_summary().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_host_list_keeps_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("missing.txt");
        // Only located, never spawned
        let config = config(dir.path(), list, "sh");
        seed_store(&config.db);

        let result = run(&config).await;
        assert!(matches!(result, Err(AppError::Io(_))));

        let store = Store::open(&config.db).unwrap();
        assert_eq!(store.hosts().unwrap().len(), 1);
    }
}
