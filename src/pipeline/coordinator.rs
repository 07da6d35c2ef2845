//! Foreground run loop: click events in, one pipeline run at a time.
//!
//! # Loop
//!
//! ```text
//! loop {
//!     recv ClickEvent (timeout = status poll interval)
//!       └─ handle_click:
//!            disarm TriggerGate
//!            move StatusWriter into a tokio worker ─▶ Pipeline::run
//!            tick PreviewLoop at ~30 Hz until the worker finishes
//!            take StatusWriter back, drain stale events, re-arm gate
//!     PreviewLoop::tick
//! }
//! ```
//!
//! Starting a run requires the unique [`StatusWriter`], which only returns
//! when the worker is joined. A second run can therefore never start while
//! one is active.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

use crate::config::CoordinatorConfig;
use crate::trigger::{ClickEvent, StopFlag, TriggerGate};

use super::preview::PreviewLoop;
use super::runner::Pipeline;
use super::state::{
    status_channel, Phase, PipelineRun, RunError, RunOutcome, StatusReader, StatusSnapshot,
    StatusWriter,
};

// ---------------------------------------------------------------------------
// Settings / summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSettings {
    /// Status poll period of the foreground loop.
    pub poll_interval: Duration,
    /// How long shutdown waits for an in-flight run.
    pub join_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            join_timeout: config.join_timeout(),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&CoordinatorConfig::default())
    }
}

/// Counts reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorSummary {
    pub runs: u64,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Events that arrived while a run was active and were discarded.
    pub dropped_events: u64,
    /// Runs abandoned at shutdown.
    pub abandoned: u64,
}

// ---------------------------------------------------------------------------
// TriggerCoordinator
// ---------------------------------------------------------------------------

pub struct TriggerCoordinator {
    pipeline: Arc<Pipeline>,
    runtime: Handle,
    events: Receiver<ClickEvent>,
    gate: TriggerGate,
    stop: StopFlag,
    writer: Option<StatusWriter>,
    reader: StatusReader,
    preview: PreviewLoop,
    settings: CoordinatorSettings,
    next_run_id: u64,
    summary: CoordinatorSummary,
}

impl TriggerCoordinator {
    /// `runtime` executes the workers; the coordinator itself runs on the
    /// calling thread and must not be inside that runtime.
    pub fn new(
        pipeline: Arc<Pipeline>,
        runtime: Handle,
        events: Receiver<ClickEvent>,
        gate: TriggerGate,
        stop: StopFlag,
        settings: CoordinatorSettings,
    ) -> Self {
        let (writer, reader) = status_channel();
        Self {
            pipeline,
            runtime,
            events,
            gate,
            stop,
            writer: Some(writer),
            reader,
            preview: PreviewLoop::new(),
            settings,
            next_run_id: 1,
            summary: CoordinatorSummary::default(),
        }
    }

    /// A reader onto the status channel.
    pub fn status(&self) -> StatusReader {
        self.reader.clone()
    }

    pub fn summary(&self) -> CoordinatorSummary {
        self.summary
    }

    /// Run until the stop flag is raised or every event sender is gone.
    pub fn run(&mut self) -> CoordinatorSummary {
        log::info!("coordinator: waiting for trigger");
        self.gate.arm();

        while !self.stop.is_stopped() {
            match self.events.recv_timeout(self.settings.poll_interval) {
                Ok(click) => {
                    self.handle_click(click);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("coordinator: trigger source closed");
                    break;
                }
            }
            self.preview.tick(&self.reader);
        }

        self.gate.disarm();
        let s = self.summary;
        log::info!(
            "coordinator: stopped after {} run(s): {} completed, {} skipped, {} failed, {} dropped trigger(s)",
            s.runs,
            s.completed,
            s.skipped,
            s.failed,
            s.dropped_events
        );
        s
    }

    /// Start a run for `click` and block until it reaches a terminal phase.
    ///
    /// Returns `None` when no run could be started or it was abandoned at
    /// shutdown.
    pub fn handle_click(&mut self, click: ClickEvent) -> Option<PipelineRun> {
        let Some(writer) = self.writer.take() else {
            log::warn!("coordinator: a run is already active, trigger ignored");
            self.summary.dropped_events += 1;
            return None;
        };
        self.gate.disarm();

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        if click.is_synthetic() {
            log::info!("coordinator: simulated trigger, starting run #{run_id}");
        } else {
            log::info!(
                "coordinator: button pressed for {:.2}s, starting run #{run_id}",
                click.duration().as_secs_f64()
            );
        }

        let pipeline = Arc::clone(&self.pipeline);
        let worker = self.runtime.spawn(async move {
            let run = pipeline.run(run_id, &writer).await;
            (run, writer)
        });

        let run = match self.await_worker(worker) {
            Some(Ok((run, writer))) => {
                self.writer = Some(writer);
                Some(run)
            }
            Some(Err(e)) => {
                self.recover_lost_worker(run_id, &e);
                None
            }
            None => {
                self.summary.abandoned += 1;
                None
            }
        };

        self.preview.tick(&self.reader);
        self.drain_stale_events();
        if let Some(run) = &run {
            self.record(run);
        }
        if self.writer.is_some() && !self.stop.is_stopped() {
            self.gate.arm();
        }
        run
    }

    /// Tick the preview until `worker` finishes. After a stop request, waits
    /// at most `join_timeout` and then aborts the worker (`None`).
    fn await_worker(
        &mut self,
        worker: JoinHandle<(PipelineRun, StatusWriter)>,
    ) -> Option<Result<(PipelineRun, StatusWriter), JoinError>> {
        let mut stop_seen: Option<Instant> = None;

        while !worker.is_finished() {
            if self.stop.is_stopped() {
                let since = *stop_seen.get_or_insert_with(|| {
                    log::info!("coordinator: stop requested, waiting for the active run");
                    Instant::now()
                });
                if since.elapsed() >= self.settings.join_timeout {
                    log::warn!(
                        "coordinator: run did not finish within {:.1}s, abandoning it",
                        self.settings.join_timeout.as_secs_f64()
                    );
                    worker.abort();
                    return None;
                }
            }
            self.preview.tick(&self.reader);
            thread::sleep(self.settings.poll_interval);
        }

        Some(self.runtime.block_on(worker))
    }

    /// The worker task died outside the pipeline's panic boundary and took
    /// the writer with it. Publish the failure and take a fresh writer so the
    /// gate can re-arm.
    fn recover_lost_worker(&mut self, run_id: u64, error: &dyn std::fmt::Display) {
        log::error!("coordinator: run #{run_id} worker lost: {error}");
        let writer = self.reader.reclaim_writer();
        writer.publish(StatusSnapshot {
            run_id: Some(run_id),
            phase: Phase::Failed,
            outcome: Some(RunOutcome::Failed(RunError::Internal(format!(
                "worker lost: {error}"
            )))),
        });
        self.summary.runs += 1;
        self.summary.failed += 1;
        self.writer = Some(writer);
    }

    /// Discard events queued while the gate was closing or the run was active.
    fn drain_stale_events(&mut self) {
        for click in self.events.try_iter() {
            self.summary.dropped_events += 1;
            log::info!(
                "coordinator: dropping trigger received during the run ({:.2}s press)",
                click.duration().as_secs_f64()
            );
        }
    }

    fn record(&mut self, run: &PipelineRun) {
        self.summary.runs += 1;
        match &run.outcome {
            Some(RunOutcome::Completed(text)) => {
                self.summary.completed += 1;
                println!("\n{}\n{text}\n{}\n", "=".repeat(60), "=".repeat(60));
            }
            Some(RunOutcome::Skipped(_)) => self.summary.skipped += 1,
            Some(RunOutcome::Failed(_)) | None => self.summary.failed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Cue;
    use crate::pipeline::runner::{Collaborators, PipelineSettings};
    use crate::pipeline::testing::{CountingCamera, CountingOcr, CountingPlayer};

    struct Fixture {
        runtime: tokio::runtime::Runtime,
        camera: Arc<CountingCamera>,
        ocr: Arc<CountingOcr>,
        player: Arc<CountingPlayer>,
    }

    impl Fixture {
        fn new(camera: CountingCamera, ocr: CountingOcr) -> Self {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            Self {
                runtime,
                camera: Arc::new(camera),
                ocr: Arc::new(ocr),
                player: Arc::new(CountingPlayer::default()),
            }
        }

        fn coordinator(
            &self,
            events: Receiver<ClickEvent>,
            gate: TriggerGate,
            stop: StopFlag,
        ) -> TriggerCoordinator {
            let pipeline = Pipeline::new(
                Collaborators {
                    camera: self.camera.clone(),
                    classifier: None,
                    ocr: self.ocr.clone(),
                    player: self.player.clone(),
                },
                PipelineSettings::default(),
            );
            TriggerCoordinator::new(
                Arc::new(pipeline),
                self.runtime.handle().clone(),
                events,
                gate,
                stop,
                CoordinatorSettings {
                    poll_interval: Duration::from_millis(5),
                    join_timeout: Duration::from_millis(200),
                },
            )
        }
    }

    #[test]
    fn click_runs_pipeline_to_completion() {
        let fx = Fixture::new(CountingCamera::ok(), CountingOcr::ok("Hello"));
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let mut coordinator = fx.coordinator(rx, TriggerGate::new(), StopFlag::new());

        let run = coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        assert_eq!(run.run_id, 1);
        assert_eq!(run.text(), Some("Hello"));
        assert_eq!(coordinator.status().phase(), Phase::Completed);
        assert_eq!(fx.player.played(), vec![Cue::Success]);
        assert_eq!(coordinator.summary().completed, 1);
    }

    #[test]
    fn gate_is_closed_during_run_and_reopened_after() {
        let fx = Fixture::new(
            CountingCamera::slow(Duration::from_millis(150)),
            CountingOcr::ok("Hello"),
        );
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let gate = TriggerGate::new();
        let mut coordinator = fx.coordinator(rx, gate.clone(), StopFlag::new());

        let observer = {
            let gate = gate.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(60));
                gate.is_armed()
            })
        };

        coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        assert!(!observer.join().unwrap(), "gate armed mid-run");
        assert!(gate.is_armed());
    }

    #[test]
    fn triggers_during_a_run_do_not_start_another() {
        let fx = Fixture::new(
            CountingCamera::slow(Duration::from_millis(150)),
            CountingOcr::ok("Hello"),
        );
        let (tx, rx) = crossbeam_channel::bounded(4);
        let stop = StopFlag::new();
        let mut coordinator = fx.coordinator(rx, TriggerGate::new(), stop.clone());

        tx.send(ClickEvent::synthetic()).unwrap();
        let presser = thread::spawn(move || {
            // Lands in the channel while run #1 is active.
            thread::sleep(Duration::from_millis(50));
            tx.send(ClickEvent::synthetic()).unwrap();
            thread::sleep(Duration::from_millis(400));
            stop.request_stop();
        });

        let summary = coordinator.run();
        presser.join().unwrap();

        assert_eq!(summary.runs, 1);
        assert_eq!(summary.dropped_events, 1);
        assert_eq!(fx.camera.calls(), 1);
        assert_eq!(fx.ocr.calls(), 1);
    }

    #[test]
    fn runs_are_sequential_and_numbered() {
        let fx = Fixture::new(CountingCamera::ok(), CountingOcr::ok("Hello"));
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let mut coordinator = fx.coordinator(rx, TriggerGate::new(), StopFlag::new());

        let first = coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        let second = coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        assert_eq!((first.run_id, second.run_id), (1, 2));
        assert!(first.ended_at.unwrap() <= second.started_at);
        assert_eq!(fx.camera.calls(), 2);
    }

    #[test]
    fn lost_worker_is_reported_and_gate_rearms() {
        let fx = Fixture::new(CountingCamera::ok(), CountingOcr::ok("Hello"));
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let gate = TriggerGate::new();
        let mut coordinator = fx.coordinator(rx, gate.clone(), StopFlag::new());
        let status = coordinator.status();

        // The writer went down with a torn-down worker task.
        drop(coordinator.writer.take());
        coordinator.recover_lost_worker(1, &"task cancelled");

        let snapshot = status.snapshot();
        assert_eq!(snapshot.run_id, Some(1));
        assert_eq!(snapshot.phase, Phase::Failed);
        assert!(matches!(
            snapshot.outcome,
            Some(RunOutcome::Failed(RunError::Internal(_)))
        ));
        assert_eq!(coordinator.summary().failed, 1);

        coordinator.next_run_id = 2;
        let run = coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        assert_eq!(run.text(), Some("Hello"));
        assert_eq!(status.phase(), Phase::Completed);
        assert!(gate.is_armed());
    }

    #[test]
    fn worker_panic_fails_run_and_coordinator_continues() {
        let fx = Fixture::new(CountingCamera::ok(), CountingOcr::panicking());
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let mut coordinator = fx.coordinator(rx, TriggerGate::new(), StopFlag::new());

        let run = coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        assert!(matches!(run.error(), Some(RunError::Internal(_))));

        let again = coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        assert_eq!(again.run_id, 2);
        assert_eq!(coordinator.summary().failed, 2);
    }

    #[test]
    fn loop_exits_when_source_closes() {
        let fx = Fixture::new(CountingCamera::ok(), CountingOcr::ok("Hello"));
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut coordinator = fx.coordinator(rx, TriggerGate::new(), StopFlag::new());

        tx.send(ClickEvent::synthetic()).unwrap();
        drop(tx);

        let summary = coordinator.run();
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.completed, 1);
    }

    #[test]
    fn stop_abandons_a_hung_run_after_join_timeout() {
        let fx = Fixture::new(
            CountingCamera::slow(Duration::from_secs(30)),
            CountingOcr::ok("unused"),
        );
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let stop = StopFlag::new();
        let gate = TriggerGate::new();
        let mut coordinator = fx.coordinator(rx, gate.clone(), stop.clone());

        let stopper = {
            let stop = stop.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                stop.request_stop();
            })
        };

        let started = Instant::now();
        assert!(coordinator.handle_click(ClickEvent::synthetic()).is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(coordinator.summary().abandoned, 1);
        assert!(!gate.is_armed());
        stopper.join().unwrap();
    }

    #[test]
    fn stop_lets_a_short_run_finish() {
        let fx = Fixture::new(
            CountingCamera::slow(Duration::from_millis(80)),
            CountingOcr::ok("Hello"),
        );
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let stop = StopFlag::new();
        let mut coordinator = fx.coordinator(rx, TriggerGate::new(), stop.clone());

        stop.request_stop();
        let run = coordinator.handle_click(ClickEvent::synthetic()).unwrap();
        assert_eq!(run.phase, Phase::Completed);
    }
}
