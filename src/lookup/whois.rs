// Registry lookups through an external whois executable
//
// The tool is invoked as `<tool> -m <query>`, where the query is an IP
// address or an AS identifier, and its stdout is scanned for route fields.

use async_trait::async_trait;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{retry_with_backoff, AppError, AppResult, RetryConfig};
use crate::routes::{parser, RouteInfo};

/// Raw text query against the network registry
#[async_trait]
pub trait RegistryQuery: Send + Sync {
    async fn query(&self, subject: &str) -> AppResult<String>;
}

/// Locate an executable the way the shell would: a name containing a path
/// separator is used as-is, anything else is searched for on `PATH`.
pub fn locate_tool(tool: &str) -> AppResult<PathBuf> {
    let candidate = Path::new(tool);
    if candidate.components().count() > 1 {
        return if is_executable(candidate) {
            Ok(candidate.to_path_buf())
        } else {
            Err(AppError::ToolNotFound(tool.to_string()))
        };
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(tool))
        .find(|path| is_executable(path))
        .ok_or_else(|| AppError::ToolNotFound(tool.to_string()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// `whois -m` invocation with a per-call timeout
#[derive(Debug, Clone)]
pub struct WhoisCommand {
    path: PathBuf,
    timeout: Duration,
    retry: RetryConfig,
}

impl WhoisCommand {
    /// Resolve `tool` on the search path. A missing tool is fatal for the run.
    pub fn locate(tool: &str, timeout: Duration, retry: RetryConfig) -> AppResult<Self> {
        let path = locate_tool(tool)?;
        tracing::debug!("Using lookup tool at {}", path.display());
        Ok(WhoisCommand { path, timeout, retry })
    }

    async fn invoke(&self, subject: &str) -> AppResult<String> {
        let mut command = Command::new(&self.path);
        command.arg("-m").arg("--").arg(subject).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| AppError::LookupTimeout(subject.to_string()))?
            .map_err(|e| {
                AppError::CommandExecution(format!("{} -m {}: {}", self.path.display(), subject, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::CommandExecution(format!(
                "{} -m {} exited with {}: {}",
                self.path.display(),
                subject,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::trace!("whois output for {}:\n{}", subject, stdout);
        Ok(stdout)
    }
}

#[async_trait]
impl RegistryQuery for WhoisCommand {
    async fn query(&self, subject: &str) -> AppResult<String> {
        let name = format!("whois {}", subject);
        retry_with_backoff(move || self.invoke(subject), &self.retry, &name).await
    }
}

/// Extracts route, origin AS and owner for an address
pub struct RegistryLookupClient<Q> {
    registry: Q,
}

impl<Q: RegistryQuery> RegistryLookupClient<Q> {
    pub fn new(registry: Q) -> Self {
        RegistryLookupClient { registry }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Q {
        &self.registry
    }

    /// Look up the route for `addr`.
    ///
    /// Fields that are not present come back empty; an empty `cidr` means
    /// there is nothing to register for this address. Only a failure of the
    /// address query itself is returned as an error.
    pub async fn lookup_route(&self, addr: IpAddr) -> AppResult<RouteInfo> {
        let ip = addr.to_string();
        let report = self.registry.query(&ip).await?;

        let cidr = parser::parse_route(&report).unwrap_or_else(|| {
            tracing::debug!("Could not match route field for {}", ip);
            String::new()
        });
        let asn = parser::parse_origin(&report).unwrap_or_else(|| {
            tracing::debug!("Could not match origin field for {}", ip);
            String::new()
        });

        let owner = if asn.is_empty() {
            String::new()
        } else {
            match self.registry.query(&asn).await {
                Ok(report) => parser::parse_owner(&report).unwrap_or_else(|| {
                    tracing::debug!("Could not match as-name field for {}", asn);
                    String::new()
                }),
                Err(e) => {
                    tracing::error!("Could not retrieve whois report for {}: {}", asn, e);
                    String::new()
                }
            }
        };

        tracing::info!("Got ASN:{} Route:{} Owner:{} for ip {}", asn, cidr, owner, ip);
        Ok(RouteInfo { cidr, asn, owner })
    }
}
