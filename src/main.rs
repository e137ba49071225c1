use clap::Parser;
use ipguard::*;
use log::{error, info};
use pingora::prelude::*;
use pingora::server::configuration::Opt;
use pingora_proxy::http_proxy_service;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/guard.yaml")]
    config: String,

    /// Upstream backend host
    #[arg(short = 'u', long)]
    upstream_host: Option<String>,

    /// Upstream backend port
    #[arg(short = 'p', long)]
    upstream_port: Option<u16>,

    /// Gate listening address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    listen_addr: String,

    /// Gate listening port
    #[arg(short = 'P', long, default_value = "6188")]
    listen_port: u16,

    /// Metrics port
    #[arg(short = 'm', long, default_value = "6190")]
    metrics_port: u16,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    info!("Starting request gate...");
    info!("Loading configuration from: {}", args.config);

    let config = GuardConfig::from_file(&args.config).unwrap_or_else(|e| {
        error!("Failed to load configuration from {}: {}", args.config, e);
        error!("Using default configuration");
        GuardConfig::default()
    });

    let store = match SqliteBlocklist::open(&config.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open blocklist at {}: {}", config.database_path, e);
            std::process::exit(1);
        }
    };
    info!("Blocklist database: {}", config.database_path);

    let cache = Arc::new(MemoryTtlCache::new());
    let settings = Arc::new(MapSettings::from_config(&config));
    let guard = Arc::new(RequestGuard::new(
        store,
        cache.clone(),
        settings,
    ));
    let metrics = Arc::new(MetricsCollector::new());

    let upstream_host = args
        .upstream_host
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let upstream_port = args.upstream_port.unwrap_or(8080);

    info!("Upstream backend: {}:{}", upstream_host, upstream_port);

    let guard_proxy = GuardProxy::new(
        (upstream_host.clone(), upstream_port),
        guard,
        metrics,
        config.trust_proxy,
    );

    let mut server = Server::new(Some(Opt::default())).unwrap();
    server.bootstrap();

    let mut proxy_service = http_proxy_service(&server.configuration, guard_proxy);
    let listen_address = format!("{}:{}", args.listen_addr, args.listen_port);
    proxy_service.add_tcp(&listen_address);
    server.add_service(proxy_service);

    // Built-in Prometheus metrics service
    let metrics_address = format!("{}:{}", args.listen_addr, args.metrics_port);
    let mut prometheus_service_http =
        pingora::services::listening::Service::prometheus_http_service();
    prometheus_service_http.add_tcp(&metrics_address);
    server.add_service(prometheus_service_http);

    // Periodic cache sweep
    std::thread::spawn(move || loop {
        std::thread::sleep(std::time::Duration::from_secs(300));
        cache.purge_expired();
        info!("Purged expired cache entries");
    });

    info!(
        "Gate listening:   http://{}:{}",
        args.listen_addr, args.listen_port
    );
    info!(
        "Metrics:          http://{}:{}/metrics",
        args.listen_addr, args.metrics_port
    );
    info!("Upstream:         {}:{}", upstream_host, upstream_port);
    info!("Config:           {}", args.config);

    server.run_forever();
}
