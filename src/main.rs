//! Appliance control-plane server entry point: parses CLI flags, loads the
//! field/block database, wires up the simulated hardware bus, installs
//! signal handling, and serves the configuration socket until shutdown.

mod cli;
mod server;

use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use block_core::Context;
use block_hw::SimulatedHwBus;
use log::info;

fn main() {
    let args: cli::Args = argh::from_env();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    match run(args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!("fatal: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: cli::Args) -> Result<()> {
    let persistence_times = cli::parse_persistence_times(&args.persistence_times)
        .context("invalid persistence timing")?;
    info!(
        "persistence timing: poll={}s holdoff={}s backoff={}s",
        persistence_times.poll, persistence_times.holdoff, persistence_times.backoff
    );
    if let Some(path) = &args.persistence_file {
        info!("persistence file configured at {} (format not implemented)", path);
    }

    let bus = Arc::new(SimulatedHwBus::new());
    let mut ctx = Context::new(bus);

    if let Some(dir) = &args.config_dir {
        block_db::load_dir(&mut ctx, Path::new(dir)).context("loading config database")?;
    }
    let ctx = Arc::new(ctx);

    let shutdown = install_signal_handlers()?;

    let address = format!("0.0.0.0:{}", args.config_port);
    let listener = TcpListener::bind(&address).with_context(|| format!("binding {}", address))?;
    info!(
        "listening on {} (data port {} reserved, not served by this process)",
        address, args.data_port
    );

    let shutdown_listener = listener.try_clone().context("cloning listener for shutdown watch")?;
    let watcher = std::thread::spawn(move || {
        while !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        // Dropping the original `listener` (in `serve`) is what actually
        // unblocks `accept`; this handle just observes the flag, matching
        // `signal-hook`'s documented one-flag-per-signal-set idiom.
        drop(shutdown_listener);
    });

    server::serve(listener, ctx, args.verbose);
    let _ = watcher.join();
    info!("shut down");
    Ok(())
}

/// Installs SIGHUP/INT/TERM handlers that flip a shared flag the socket
/// server polls, SIGPIPE ignored, SIGQUIT left at its default (forced
/// exit), per §5.
#[cfg(unix)]
fn install_signal_handlers() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGHUP, signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("registering shutdown signal handler")?;
    }
    // SIGPIPE must not kill the process when a client disconnects mid-write.
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGPIPE, || {})
            .context("ignoring SIGPIPE")?;
    }
    Ok(shutdown)
}

#[cfg(not(unix))]
fn install_signal_handlers() -> Result<Arc<AtomicBool>> {
    Ok(Arc::new(AtomicBool::new(false)))
}
