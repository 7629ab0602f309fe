#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use safetrip_os::alerts::{AlertDispatch, AlertRuntime, TracingAlertDispatch};
use safetrip_os::auth::{AuthRuntime, TokenService};
use safetrip_os::dashboard::{DashboardRuntime, MetricsProvider, RandomMetricsProvider};
use safetrip_os::issuance::{ChainProvider, IssuanceRuntime, MockPolygonChain};
use safetrip_os::location::LocationRuntime;
use safetrip_storage::repo::{AlertRepo, CredentialRepo, IssuanceRepo, LocationLogRepo};
use safetrip_storage::{DocumentStore, MemoryStore};

pub mod error;
pub mod routes;

pub use error::{ApiEnvelope, ApiError};
pub use routes::build_router;

pub const DEFAULT_HTTP_BIND: &str = "0.0.0.0:3000";
pub const DEV_JWT_SECRET: &str = "safetrip-development-secret-change-me";
pub const DEFAULT_DISPATCH_DELAY_MS: u64 = 1_000;
pub const MAX_DISPATCH_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite(PathBuf),
}

#[derive(Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub jwt_secret_is_default: bool,
    pub store: StoreBackend,
    pub dispatch_delay: Duration,
}

impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("bind", &self.bind)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_secret_is_default", &self.jwt_secret_is_default)
            .field("store", &self.store)
            .field("dispatch_delay", &self.dispatch_delay)
            .finish()
    }
}

impl AdapterConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_env_var_map(|key| std::env::var(key).ok())
    }

    pub fn from_env_var_map<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("SAFETRIP_HTTP_BIND")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let bind: SocketAddr = bind_raw
            .parse()
            .map_err(|e| format!("SAFETRIP_HTTP_BIND={bind_raw} is not a socket address: {e}"))?;

        let (jwt_secret, jwt_secret_is_default) = match lookup("SAFETRIP_JWT_SECRET") {
            Some(secret) if !secret.trim().is_empty() => (secret, false),
            _ => (DEV_JWT_SECRET.to_string(), true),
        };

        Ok(Self {
            bind,
            jwt_secret,
            jwt_secret_is_default,
            store: parse_store_backend(lookup("SAFETRIP_STORE")),
            dispatch_delay: Duration::from_millis(parse_dispatch_delay_ms(lookup(
                "SAFETRIP_ALERT_DISPATCH_DELAY_MS",
            ))),
        })
    }
}

fn parse_store_backend(raw: Option<String>) -> StoreBackend {
    match raw.as_deref().map(str::trim) {
        None | Some("") => StoreBackend::Memory,
        Some(v) if v.eq_ignore_ascii_case("memory") => StoreBackend::Memory,
        Some(path) => StoreBackend::Sqlite(PathBuf::from(path)),
    }
}

fn parse_dispatch_delay_ms(raw: Option<String>) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .map(|v| v.min(MAX_DISPATCH_DELAY_MS))
        .unwrap_or(DEFAULT_DISPATCH_DELAY_MS)
}

/// Every service the HTTP surface talks to, wired over one store.
pub struct AppRuntime {
    pub auth: AuthRuntime,
    pub alerts: AlertRuntime,
    pub issuance: IssuanceRuntime,
    pub dashboard: DashboardRuntime,
    pub location: LocationRuntime,
    started_at: Instant,
}

impl AppRuntime {
    pub fn from_config(config: &AdapterConfig) -> Result<Self, String> {
        let tokens = Arc::new(TokenService::new(config.jwt_secret.as_bytes()));
        let dispatch = Arc::new(TracingAlertDispatch::new(config.dispatch_delay));
        let metrics = Arc::new(RandomMetricsProvider);
        let chain = Arc::new(MockPolygonChain);
        match &config.store {
            StoreBackend::Memory => Ok(Self::wire(
                Arc::new(MemoryStore::new_in_memory()),
                tokens,
                dispatch,
                metrics,
                chain,
            )),
            StoreBackend::Sqlite(path) => {
                let store = DocumentStore::open(path)
                    .map_err(|e| format!("cannot open store at {}: {e}", path.display()))?;
                Ok(Self::wire(Arc::new(store), tokens, dispatch, metrics, chain))
            }
        }
    }

    pub fn wire<S>(
        store: Arc<S>,
        tokens: Arc<TokenService>,
        dispatch: Arc<dyn AlertDispatch>,
        metrics: Arc<dyn MetricsProvider>,
        chain: Arc<dyn ChainProvider>,
    ) -> Self
    where
        S: CredentialRepo + AlertRepo + IssuanceRepo + LocationLogRepo + 'static,
    {
        Self {
            auth: AuthRuntime::new(store.clone(), tokens),
            alerts: AlertRuntime::new(store.clone(), dispatch),
            issuance: IssuanceRuntime::new(store.clone(), chain),
            dashboard: DashboardRuntime::new(store.clone(), metrics),
            location: LocationRuntime::new(store),
            started_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
