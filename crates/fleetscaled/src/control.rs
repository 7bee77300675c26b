//! The control loop.
//!
//! One cycle, run to completion before the next:
//!
//! ```text
//! count_all_tasks      refresh running from the backend
//! update metrics       one refresh per task
//! engine.run           new demand per task
//! stop_start_tasks     act on demand != requested
//! send_state           every `report_every` cycles, if enabled
//! ```
//!
//! Every I/O failure in a cycle is logged and the loop moves on.

use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use fleetscale_api::ApiClient;
use fleetscale_demand::TaskSet;
use fleetscale_engine::Engine;
use fleetscale_scheduler::Scheduler;

pub struct ControlLoop {
    tasks: TaskSet,
    scheduler: Box<dyn Scheduler>,
    engine: Engine,
    reporter: Option<ApiClient>,
    report_every: u32,
    interval: Duration,
    cycles: u64,
}

impl ControlLoop {
    pub fn new(tasks: TaskSet, scheduler: Box<dyn Scheduler>, interval: Duration) -> Self {
        Self {
            tasks,
            scheduler,
            engine: Engine::new(),
            reporter: None,
            report_every: 1,
            interval,
            cycles: 0,
        }
    }

    /// Send state to the API every `every` cycles.
    pub fn with_reporter(mut self, api: ApiClient, every: u32) -> Self {
        self.reporter = Some(api);
        self.report_every = every.max(1);
        self
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Prepare every task on the backend and adopt what is already running.
    ///
    /// Initialisation failures are fatal. Afterwards `requested` and
    /// `demand` start at the observed running count so the first pass sees
    /// no phantom in-flight operations.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        info!(scheduler = self.scheduler.name(), tasks = self.tasks.len(), "initialising tasks");
        for t in self.tasks.iter() {
            self.scheduler
                .init_scheduler(t)
                .await
                .with_context(|| format!("initialising task {}", t.name))?;
        }

        if let Err(e) = self.scheduler.count_all_tasks(&mut self.tasks).await {
            warn!(error = %e, "failed to count tasks at startup");
        }
        for t in self.tasks.iter_mut().filter(|t| t.is_scalable) {
            t.requested = t.running;
            t.demand = t.running;
            debug!(task = %t.name, running = t.running, "adopted running count");
        }
        Ok(())
    }

    /// Run one cycle. Returns whether the engine changed any demand.
    pub async fn cycle(&mut self) -> bool {
        self.cycles += 1;

        if let Err(e) = self.scheduler.count_all_tasks(&mut self.tasks).await {
            warn!(error = %e, "failed to count tasks");
        }

        for t in self.tasks.iter_mut().filter(|t| t.is_scalable) {
            t.metric_mut().update_current().await;
        }

        let changed = self.engine.run(&mut self.tasks);

        if let Err(e) = self.scheduler.stop_start_tasks(&mut self.tasks).await {
            warn!(error = %e, "failed to stop / start tasks");
        }

        if let Some(api) = &self.reporter
            && self.cycles % u64::from(self.report_every) == 0
            && let Err(e) = api.send_state(&self.tasks).await
        {
            warn!(error = %e, "failed to send state");
        }

        changed
    }

    /// Cycle every `interval` until shutdown, or until `max_cycles` cycles
    /// have run.
    pub async fn run(&mut self, max_cycles: Option<u64>, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "control loop started");

        loop {
            if max_cycles.is_some_and(|max| self.cycles >= max) {
                info!(cycles = self.cycles, "cycle limit reached");
                break;
            }

            self.cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
    }

    /// Best-effort backend teardown.
    pub async fn cleanup(&mut self) {
        match self.scheduler.cleanup().await {
            Ok(()) => info!("scheduler cleaned up"),
            Err(e) => warn!(error = %e, "scheduler cleanup failed"),
        }
    }
}
