//! dbward Kubernetes Operator
//!
//! Provisions databases, owner roles and grants in an external PostgreSQL
//! server from `Database` custom resources.

use anyhow::{Context, Result};
use clap::Parser;
use dbward_operator::prelude::*;
use dbward_rdbc::prelude::{PgEngine, PgPool};
use kube::Client;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// dbward Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "dbward-operator")]
#[command(about = "Kubernetes operator provisioning databases, roles and grants")]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "DBWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Database server host
    #[arg(long, env = "DB_HOST")]
    db_host: Option<String>,

    /// Database server port
    #[arg(long, env = "DB_PORT")]
    db_port: Option<u16>,

    /// Administrative database user
    #[arg(long, env = "DB_USER")]
    db_user: Option<String>,

    /// Administrative database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    /// Maintenance database to connect to
    #[arg(long, env = "DB_DATABASE")]
    db_database: Option<String>,

    /// Namespaces to act on, comma separated (empty for all)
    #[arg(long, env = "NAMESPACES")]
    namespaces: Option<String>,

    /// Metrics server address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Health probe address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Enable JSON log format
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    log_json: bool,

    /// Print CRD YAML and exit
    #[arg(long)]
    print_crd: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle CRD printing
    if args.print_crd {
        print_crd()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    let config = load_config(&args)?;
    let namespaces = config.namespace_filter();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        namespaces = %namespaces,
        server = %config.connection.endpoint(),
        "Starting dbward operator"
    );

    // Initialize metrics
    let metrics_addr = args.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = start_metrics_server(metrics_addr).await {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    // Start health server
    let health_addr = args.health_addr;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_addr).await {
            tracing::error!(error = %e, "Health server failed");
        }
    });

    // One pool for the lifetime of the process
    let pool = PgPool::open(&config.connection)
        .await
        .context("Failed to open database connection pool")?;

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let reconciler = Reconciler::new(
        EngineRegistry::new().with(Arc::new(PgEngine::new(pool.clone()))),
        Arc::new(KubeResourceStore::new(client.clone())),
        Arc::new(KubeSecretSink::new(client.clone())),
        namespaces,
    );
    let ctx = Arc::new(ControllerContext::new(
        reconciler,
        Some(ControllerMetrics::new()),
    ));

    // Run the controller until a termination signal arrives
    let result = run_controller(client, ctx).await;

    pool.close();
    result.context("Controller failed")?;

    Ok(())
}

/// Merge the config file with flag and environment overrides
fn load_config(args: &Args) -> Result<OperatorConfig> {
    let mut config = match &args.config {
        Some(path) => OperatorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => OperatorConfig::default(),
    };

    let conn = &mut config.connection;
    if let Some(host) = &args.db_host {
        conn.host = host.clone();
    }
    if let Some(port) = args.db_port {
        conn.port = port;
    }
    if let Some(user) = &args.db_user {
        conn.user = user.clone();
    }
    if let Some(password) = &args.db_password {
        conn.password = password.clone();
    }
    if let Some(database) = &args.db_database {
        conn.database = database.clone();
    }
    if let Some(namespaces) = &args.namespaces {
        config.namespaces = namespaces
            .split(',')
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Initialize logging subsystem
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Start the Prometheus metrics server
async fn start_metrics_server(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    info!(address = %addr, "Starting metrics server");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    // Keep the server running
    std::future::pending::<()>().await;

    Ok(())
}

/// Start the health probe server
async fn start_health_server(addr: SocketAddr) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    info!(address = %addr, "Starting health server");

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind health server")?;

    loop {
        let (mut socket, _) = listener.accept().await?;

        tokio::spawn(async move {
            let mut buf = [0; 1024];
            if socket.read(&mut buf).await.is_ok() {
                let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK";
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
    }
}

/// Print the CRD YAML for installation
fn print_crd() -> Result<()> {
    use kube::CustomResourceExt;

    let crd = Database::crd();
    let yaml = serde_yaml::to_string(&crd)?;
    println!("{}", yaml);

    Ok(())
}
