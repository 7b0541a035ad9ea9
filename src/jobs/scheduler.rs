//! Periodic job runner.
//!
//! One tokio task per job ticks on the job's configured interval and runs
//! it against the wall clock on the blocking pool. A zero interval disables the job. Missed
//! ticks are skipped rather than bunched up.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::engine::Engine;

use super::{JobKind, run_job};

/// Runs one job on the blocking pool, since jobs hold store locks.
async fn run_on_blocking_pool(engine: &Engine, kind: JobKind) {
    let result = tokio::task::spawn_blocking({
        let engine = engine.clone();
        move || run_job(&engine, kind, Utc::now())
    })
    .await;

    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!(job = %kind, error = %e, "Job run failed"),
        Err(e) => tracing::error!(job = %kind, error = %e, "Job task join error"),
    }
}

/// Handle to the running background jobs.
#[derive(Debug)]
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns every enabled job onto the current runtime.
    pub fn start(engine: Engine) -> Self {
        let (shutdown, _) = watch::channel(false);
        let jobs = engine.config().config().jobs().clone();
        let mut tasks = Vec::new();

        for kind in JobKind::ALL {
            let secs = kind.interval_secs(&jobs);
            if secs == 0 {
                tracing::info!(job = %kind, "Job disabled");
                continue;
            }

            let engine = engine.clone();
            let mut stop = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut timer = interval(Duration::from_secs(secs));
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = timer.tick() => run_on_blocking_pool(&engine, kind).await,
                        _ = stop.changed() => break,
                    }
                }
                tracing::debug!(job = %kind, "Job stopped");
            }));
        }

        tracing::info!(jobs = tasks.len(), "Background jobs started");
        Self { shutdown, tasks }
    }

    /// Stops every job and waits for in-flight runs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Job task panicked");
            }
        }
        tracing::info!("Background jobs stopped");
    }
}
