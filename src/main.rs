mod api;
mod engine;
mod error;
mod link;
mod net;
mod scanner;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::handlers::{self, AppState};
use crate::engine::Controller;
use crate::link::raw::RawLink;

#[derive(Parser, Debug)]
#[command(name = "lancut")]
#[command(about = "Cut LAN hosts off the segment via ARP cache poisoning")]
struct Args {
    /// Control API port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Milliseconds between forged-reply pairs per flow
    #[arg(long, default_value_t = 1000)]
    attack_interval: u64,

    /// Minimum milliseconds between scan sweeps
    #[arg(long, default_value_t = 10000)]
    scan_interval: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lancut=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Handlers are cheap; the expensive work (sweeps, raw I/O) runs on the
    // blocking pool. A quarter of the cores is plenty for the control plane.
    let workers = std::thread::available_parallelism()
        .map(|n| n.get() / 4)
        .unwrap_or(1)
        .max(1);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()?
        .block_on(serve(args))
}

async fn serve(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let interfaces = net::list_interfaces();
    if interfaces.is_empty() {
        tracing::warn!("no operational IPv4 interfaces found, nothing to scan");
    }
    for iface in &interfaces {
        tracing::info!(
            "attached interface {}: {} / {} ({})",
            iface.name,
            iface.ip,
            iface.netmask,
            iface.mac
        );
    }

    let controller = Arc::new(Controller::new(
        Arc::new(RawLink::new()),
        interfaces,
        Duration::from_millis(args.attack_interval),
        Duration::from_millis(args.scan_interval),
    ));

    let state = Arc::new(AppState {
        controller: controller.clone(),
        shutdown: tokio::sync::Notify::new(),
    });

    let app = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/get_targets", get(handlers::get_targets))
        .route("/get_status/:ip", get(handlers::get_status))
        .route("/action/:ip", post(handlers::action))
        .route("/quit", post(handlers::quit))
        .route("/get_info", get(handlers::get_info))
        .route("/set_info", post(handlers::set_info))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    tracing::info!("lancut listening on http://0.0.0.0:{}", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    // The listener has drained, so the /quit response is already delivered.
    // Restore every cut target before the process goes away.
    tokio::task::spawn_blocking(move || controller.recover_all()).await?;
    tracing::info!("all targets recovered, exiting");
    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    tokio::select! {
        _ = state.shutdown.notified() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
        }
    }
}
