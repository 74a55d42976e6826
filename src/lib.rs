// src/lib.rs

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod store;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::cli::CliArgs;
use crate::config::{load_from_path, DaemonConfig, RawConfigFile};
use crate::engine::{Engine, EngineOptions};
use crate::exec::{ActorExecutor, ActorResolver, ProcessExecutor};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + CLI overrides)
/// - result store
/// - process executor, task registry and job pipeline
/// - HTTP boundary
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let store = store::open(&cfg.store).context("opening result store")?;
    let executor: Arc<dyn ActorExecutor> = Arc::new(ProcessExecutor::new(actor_resolver(&cfg)));
    let engine = Arc::new(Engine::start(executor, store, EngineOptions::from(&cfg)));

    let state = Arc::new(AppState {
        engine: Arc::clone(&engine),
        request_timeout: cfg.server.request_timeout,
        verbose: cfg.server.verbose,
    });
    let app = api::router(state);

    let listener = TcpListener::bind(cfg.server.listen)
        .await
        .with_context(|| format!("binding {}", cfg.server.listen))?;
    info!(addr = %listener.local_addr()?, "actord listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    engine.shutdown().await;
    info!("actord stopped");
    Ok(())
}

/// Load the config file (or defaults), apply CLI overrides and validate.
pub fn resolve_config(args: &CliArgs) -> Result<DaemonConfig> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            debug!("no config file given; using defaults");
            RawConfigFile::default()
        }
    };
    apply_cli_overrides(&mut raw, args);
    Ok(DaemonConfig::try_from(raw)?)
}

/// CLI flags win over file values.
pub fn apply_cli_overrides(raw: &mut RawConfigFile, args: &CliArgs) {
    if let Some(listen) = &args.listen {
        raw.server.listen = listen.clone();
    }
    if let Some(timeout) = args.timeout {
        raw.server.request_timeout_secs = timeout;
    }
    if args.verbose {
        raw.server.verbose = true;
    }
}

fn actor_resolver(cfg: &DaemonConfig) -> ActorResolver {
    let resolver = ActorResolver::new(&cfg.actors.dir);
    match &cfg.actors.runner {
        Some(runner) => resolver.with_runner(runner),
        None => resolver,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C; shutting down"),
        _ = terminate => info!("received SIGTERM; shutting down"),
    }
}

/// Simple dry-run output: print the effective configuration.
fn print_dry_run(cfg: &DaemonConfig) {
    println!("actord dry-run");
    println!("  server.listen = {}", cfg.server.listen);
    println!(
        "  server.request_timeout = {}s",
        cfg.server.request_timeout.as_secs()
    );
    println!("  server.verbose = {}", cfg.server.verbose);
    println!();

    println!("actors:");
    println!("  dir: {}", cfg.actors.dir.display());
    if let Some(ref runner) = cfg.actors.runner {
        println!("  runner: {}", runner.display());
    }
    match cfg.actors.timeout {
        Some(t) => println!("  timeout: {}s", t.as_secs()),
        None => println!("  timeout: none"),
    }

    println!("pipeline:");
    println!("  workers: {}", cfg.pipeline.workers);
    println!("  queue_capacity: {}", cfg.pipeline.queue_capacity);
    println!("  results_capacity: {}", cfg.pipeline.results_capacity);
    println!("  host: {}", cfg.pipeline.host);

    println!("registry:");
    println!("  retention: {}s", cfg.registry.retention.as_secs());
    println!("  sweep_interval: {}s", cfg.registry.sweep_interval.as_secs());

    println!("store:");
    println!("  backend: {:?}", cfg.store.backend);
    if let Some(ref path) = cfg.store.path {
        println!("  path: {}", path.display());
    }

    debug!("dry-run complete (not serving)");
}
