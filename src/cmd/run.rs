use crate::reports;
use clap::Args;
use refinery::candidates::IdFilter;
use refinery::config::Config;
use refinery::controller::{RefinementLoop, RoundReport};
use refinery::error::RfResult;
use refinery::process::SystemRunner;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory holding one solution file per candidate
    pub target_dir: PathBuf,

    /// Candidates to refine: all, lightning, block, or ids like 1-10,42
    #[arg(long, default_value = "all")]
    pub ids: IdFilter,

    #[command(flatten)]
    pub config: Config,
}

pub fn run(args: &RunArgs, config: Config) -> RfResult<()> {
    let stop = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(stop.clone())?;

    let mut refinement = RefinementLoop::new(
        &config,
        &args.target_dir,
        &args.ids,
        Arc::new(SystemRunner),
    )?;

    info!("🚀 Refining until interrupted (Ctrl-C finishes the current round)");
    let summary = refinement.run(&stop, |_: &RoundReport| true);

    reports::print_run_summary(&summary);
    Ok(())
}

/// First SIGINT/SIGTERM sets `stop`; a second one exits immediately.
/// Staging files abandoned by an immediate exit are swept on the next start.
fn spawn_interrupt_listener(stop: Arc<AtomicBool>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("interrupts".into())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    wait_for_signal().await;
                    if stop.swap(true, Ordering::SeqCst) {
                        warn!("🛑 Second interrupt; exiting without waiting for workers");
                        std::process::exit(130);
                    }
                    warn!("🛑 Interrupt received; finishing the current round (repeat to abort)");
                }
            })
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = wait_for_ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => wait_for_ctrl_c().await,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
