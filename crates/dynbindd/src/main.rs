// # dynbindd - dynbind HTTP daemon
//
// This is a THIN integration layer. All binding, validation and DNS logic
// lives in dynbind-core; the daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Opening the binding store and the agent executor
// 4. Serving the lifecycle operations over HTTP
//
// ## HTTP Interface
//
// - `GET /{op}?field=value…` or `POST /{op}` with a form body, where `op` is
//   `new`, `update` or `delete` and fields are `hostname`, `token`, `ip`
// - Response body: `{"error": null, …}` with 200, or `{"error": "…"}` with 400
//   (500 for internal failures). Undecodable requests get the same shape.
// - `GET /health`: liveness check
//
// ## Configuration
//
// - `DYNBIND_LISTEN`: Listen address (default `127.0.0.1:8080`)
// - `DYNBIND_STORE_TYPE`: Binding store type (file, memory; default file)
// - `DYNBIND_STORE_PATH`: Store root directory (default `/var/lib/dynbind`)
// - `DYNBIND_DNS_SERVER`: Authoritative server updates are sent to
// - `DYNBIND_DNS_ZONE`: Zone hostnames are created under
// - `DYNBIND_DNS_TTL`: Record TTL in seconds (default 60)
// - `DYNBIND_AGENT_PROGRAM`: DNS-update agent (default `nsupdate`)
// - `DYNBIND_AGENT_ARGS`: Whitespace-separated agent arguments
// - `DYNBIND_AGENT_TIMEOUT_SECS`: Agent timeout, 0 disables (default 30)
// - `DYNBIND_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DYNBIND_STORE_TYPE=file
// export DYNBIND_STORE_PATH=/var/lib/dynbind
// export DYNBIND_DNS_SERVER=ns1.example.net
// export DYNBIND_DNS_ZONE=dyn.example.net
// export DYNBIND_AGENT_ARGS="-k /etc/dynbind/update.key"
//
// dynbindd
// curl 'http://127.0.0.1:8080/new?hostname=myhost'
// ```

use anyhow::Result;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dynbind_core::config::DEFAULT_STORE_PATH;
use dynbind_core::{
    AgentConfig, ControllerConfig, DnsConfig, DynbindConfig, Error, ErrorKind,
    LifecycleController, LifecycleEvent, ProcessExecutor, Response, StoreConfig, open_store,
};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    listen: SocketAddr,
    store_type: String,
    store_path: String,
    dns_server: String,
    dns_zone: String,
    dns_ttl: u32,
    agent_program: String,
    agent_args: Vec<String>,
    agent_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            listen: env::var("DYNBIND_LISTEN")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("DYNBIND_LISTEN is not a socket address: {}", e))?,
            store_type: env::var("DYNBIND_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("DYNBIND_STORE_PATH")
                .unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string()),
            dns_server: env::var("DYNBIND_DNS_SERVER").unwrap_or_default(),
            dns_zone: env::var("DYNBIND_DNS_ZONE").unwrap_or_default(),
            dns_ttl: parse_var("DYNBIND_DNS_TTL", 60)?,
            agent_program: env::var("DYNBIND_AGENT_PROGRAM")
                .unwrap_or_else(|_| "nsupdate".to_string()),
            agent_args: env::var("DYNBIND_AGENT_ARGS")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            agent_timeout_secs: parse_var("DYNBIND_AGENT_TIMEOUT_SECS", 30)?,
            log_level: env::var("DYNBIND_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.dns_server.is_empty() {
            anyhow::bail!(
                "DYNBIND_DNS_SERVER is required. \
                Set it via: export DYNBIND_DNS_SERVER=ns1.example.net"
            );
        }

        if self.dns_zone.is_empty() {
            anyhow::bail!(
                "DYNBIND_DNS_ZONE is required. \
                Set it via: export DYNBIND_DNS_ZONE=dyn.example.net"
            );
        }

        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "DYNBIND_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" && self.store_path.is_empty() {
            anyhow::bail!(
                "DYNBIND_STORE_PATH cannot be empty when DYNBIND_STORE_TYPE=file. \
                Set it via: export DYNBIND_STORE_PATH=/var/lib/dynbind"
            );
        }

        if !(1..=86400).contains(&self.dns_ttl) {
            anyhow::bail!(
                "DYNBIND_DNS_TTL must be between 1 and 86400 seconds. Got: {}",
                self.dns_ttl
            );
        }

        if self.agent_timeout_secs > 3600 {
            anyhow::bail!(
                "DYNBIND_AGENT_TIMEOUT_SECS must be at most 3600 seconds. Got: {}",
                self.agent_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DYNBIND_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_core().validate()?;
        Ok(())
    }

    /// Build the library configuration
    fn to_core(&self) -> DynbindConfig {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: self.store_path.clone(),
            },
        };

        DynbindConfig {
            store,
            dns: DnsConfig {
                server: self.dns_server.clone(),
                zone: self.dns_zone.clone(),
                ttl: self.dns_ttl,
            },
            agent: AgentConfig {
                program: self.agent_program.clone(),
                args: self.agent_args.clone(),
                timeout_secs: self.agent_timeout_secs,
            },
            controller: ControllerConfig::default(),
        }
    }
}

/// Parse a numeric environment variable, falling back to `default` when unset
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is not a valid number ({}): {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting dynbindd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let core = config.to_core();

    info!("Store type: {}", core.store.type_name());
    info!("Zone: {} (server {})", core.dns.zone, core.dns.server);
    info!("Agent: {} {:?}", core.agent.program, core.agent.args);

    let store = open_store(&core.store).await?;
    let executor = Arc::new(ProcessExecutor::from_config(&core.agent));
    let (controller, events) = LifecycleController::new(store, executor, &core)?;

    tokio::spawn(log_events(events));

    let app = router(Arc::new(controller));
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.listen, e))?;

    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Shutdown signal error: {}", e),
            }
        })
        .await?;

    info!("Shutting down daemon");
    Ok(())
}

type AppState = Arc<LifecycleController>;

/// HTTP routes
fn router(controller: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/{operation}", get(query_operation).post(form_operation))
        .with_state(controller)
}

/// `GET /{operation}` with fields in the query string
async fn query_operation(
    State(controller): State<AppState>,
    Path(operation): Path<String>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> impl IntoResponse {
    let fields = match query {
        Ok(Query(fields)) => fields,
        Err(rejection) => return malformed(rejection.body_text()),
    };
    respond(controller.dispatch(&operation, &fields).await)
}

/// `POST /{operation}` with fields in a form body; body fields win over query
async fn form_operation(
    State(controller): State<AppState>,
    Path(operation): Path<String>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    body: Result<Form<HashMap<String, String>>, FormRejection>,
) -> impl IntoResponse {
    let mut fields = match query {
        Ok(Query(fields)) => fields,
        Err(rejection) => return malformed(rejection.body_text()),
    };
    match body {
        Ok(Form(body)) => fields.extend(body),
        Err(rejection) => return malformed(rejection.body_text()),
    }
    respond(controller.dispatch(&operation, &fields).await)
}

/// Keep the `{"error": …}` body for requests axum could not decode
fn malformed(reason: String) -> (StatusCode, Json<serde_json::Value>) {
    debug!("Rejected request: {}", reason);
    respond(Response::failure(&Error::MalformedRequest(reason)))
}

fn respond(response: Response) -> (StatusCode, Json<serde_json::Value>) {
    let status = match response.error_kind() {
        None => StatusCode::OK,
        Some(ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        Some(_) => StatusCode::BAD_REQUEST,
    };
    (status, Json(response.to_json()))
}

/// Forward lifecycle events to the log
async fn log_events(mut events: mpsc::Receiver<LifecycleEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Lifecycle event: {:?}", event);
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}


#[cfg(all(test, unix))]
mod route_tests {
    use super::*;
    use axum_test::TestServer;
    use dynbind_core::MemoryBindingStore;
    use serde_json::{Value, json};

    fn server() -> TestServer {
        let executor = ProcessExecutor::new("sh").with_args(["-c", "cat > /dev/null"]);
        let (controller, _events) = LifecycleController::new(
            Arc::new(MemoryBindingStore::new()),
            Arc::new(executor),
            &DynbindConfig::new("ns1.example.net", "dyn.example.net"),
        )
        .unwrap();
        TestServer::new(router(Arc::new(controller))).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let server = server();
        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn test_lifecycle_over_query_strings() {
        let server = server();

        let created = server.get("/new").add_query_param("hostname", "myhost").await;
        created.assert_status_ok();
        let body: Value = created.json();
        assert_eq!(body["error"], Value::Null);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(token.len(), 32);

        let updated = server
            .get("/update")
            .add_query_param("token", &token)
            .add_query_param("ip", "203.0.113.5")
            .await;
        updated.assert_status_ok();
        assert_eq!(
            updated.json::<Value>(),
            json!({"error": null, "a": "203.0.113.5"})
        );

        let deleted = server.get("/delete").add_query_param("token", &token).await;
        deleted.assert_status_ok();
        assert_eq!(deleted.json::<Value>(), json!({"error": null}));

        let stale = server
            .get("/delete")
            .add_query_param("token", &token)
            .expect_failure()
            .await;
        assert_eq!(stale.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(stale.json::<Value>(), json!({"error": "Token not found"}));
    }

    #[tokio::test]
    async fn test_lifecycle_over_form_bodies() {
        let server = server();

        let created = server.post("/new").form(&[("hostname", "formhost")]).await;
        created.assert_status_ok();
        let token = created.json::<Value>()["token"]
            .as_str()
            .unwrap()
            .to_string();

        // Body fields override the query string
        let updated = server
            .post("/update")
            .add_query_param("ip", "203.0.113.5")
            .form(&[("token", token.as_str()), ("ip", "2001:db8::1")])
            .await;
        updated.assert_status_ok();
        assert_eq!(
            updated.json::<Value>(),
            json!({"error": null, "aaaa": "2001:db8::1"})
        );

        let deleted = server
            .post("/delete")
            .form(&[("token", token.as_str())])
            .await;
        assert_eq!(deleted.json::<Value>(), json!({"error": null}));
    }

    #[tokio::test]
    async fn test_failures_keep_json_bodies() {
        let server = server();
        server.get("/new").add_query_param("hostname", "taken").await;

        let conflict = server
            .get("/new")
            .add_query_param("hostname", "taken")
            .expect_failure()
            .await;
        assert_eq!(conflict.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            conflict.json::<Value>(),
            json!({"error": "Hostname already taken: taken"})
        );

        let unknown = server.get("/rename").expect_failure().await;
        assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            unknown.json::<Value>(),
            json!({"error": "Unknown operation: rename"})
        );

        // Not a form body
        let malformed = server
            .post("/new")
            .text("hostname=plain")
            .expect_failure()
            .await;
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = malformed.json();
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Malformed request")
        );
    }
}
