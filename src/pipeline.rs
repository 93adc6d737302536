//! The export pipeline
//!
//! `ExportPipeline` owns the live document and wires the stages together:
//! content changes flag the preview stale and (re)arm a debounce timer, the
//! timer runs a preview job through the job gate, and the job either
//! publishes its artifact or is discarded when its generation was overtaken.
//! Exports run through the same gate and hand their bytes to the save sink.

use crate::artifact::{ArtifactSlot, ArtifactStore};
use crate::color::ColorResolver;
use crate::live::LiveDocument;
use crate::materialize::materialize;
use crate::render::{invoke, RenderEngine, RenderJob};
use crate::save::{export_file_name, SaveSink};
use crate::snapshot::Snapshot;
use crate::staleness::{ActiveSurface, StalenessTracker, ViewportClass};
use crate::style::Cascade;
use crate::{Error, PipelineConfig, RenderMode, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Lifecycle of the most recent render job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    /// A debounce timer is armed
    Scheduled,
    Running,
    Succeeded,
    Failed,
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub file_name: String,
    pub page_count: usize,
    /// Fingerprint of the materialized snapshot that was rendered
    pub fingerprint: String,
    pub size: usize,
}

/// Handle to a pipeline; clones share the same pipeline
#[derive(Clone)]
pub struct ExportPipeline {
    shared: Arc<Shared>,
}

struct Shared {
    config: PipelineConfig,
    engine: Arc<dyn RenderEngine>,
    sink: Arc<dyn SaveSink>,
    slot: ArtifactSlot,
    state: Mutex<State>,
    resolver: Mutex<ColorResolver>,
    /// Serializes render jobs
    gate: tokio::sync::Mutex<()>,
    /// Bumped by every export; previews started under an older epoch are discarded
    export_epoch: AtomicU64,
    idle: Notify,
}

/// A job counted in `in_flight`. Finishing it records the outcome; dropping it
/// unfinished (the caller's future was cancelled) releases it as idle.
struct JobClaim {
    shared: Arc<Shared>,
    reschedule: bool,
    finished: bool,
}

impl JobClaim {
    fn new(shared: &Arc<Shared>, st: &mut State, reschedule: bool) -> Self {
        st.in_flight += 1;
        Self { shared: Arc::clone(shared), reschedule, finished: false }
    }

    fn finish(mut self, outcome: JobState) -> JobState {
        self.finished = true;
        self.shared.finish_job(outcome, self.reschedule)
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        if !self.finished {
            log::debug!("pipeline: job cancelled before it finished");
            self.shared.finish_job(JobState::Idle, self.reschedule);
        }
    }
}

struct PendingTimer {
    id: u64,
    handle: JoinHandle<()>,
}

struct State {
    live: Option<LiveDocument>,
    tracker: StalenessTracker,
    viewport: ViewportClass,
    surface: ActiveSurface,
    timer: Option<PendingTimer>,
    next_timer_id: u64,
    job: JobState,
    /// Jobs claimed but not yet finished, including ones waiting on the gate
    in_flight: usize,
    page_count: usize,
    preview_fingerprint: Option<String>,
    torn_down: bool,
}

impl ExportPipeline {
    pub fn new(
        config: PipelineConfig,
        engine: Arc<dyn RenderEngine>,
        store: Arc<dyn ArtifactStore>,
        sink: Arc<dyn SaveSink>,
    ) -> Self {
        let tracker = StalenessTracker::new(config.wide_delay(), config.narrow_delay());
        let viewport = config.viewport_class(config.wide_breakpoint_px);
        let state = State {
            live: None,
            tracker,
            viewport,
            surface: ActiveSurface::default(),
            timer: None,
            next_timer_id: 0,
            job: JobState::Idle,
            in_flight: 0,
            page_count: 0,
            preview_fingerprint: None,
            torn_down: false,
        };
        Self {
            shared: Arc::new(Shared {
                config,
                engine,
                sink,
                slot: ArtifactSlot::new(store),
                state: Mutex::new(state),
                resolver: Mutex::new(ColorResolver::new()),
                gate: tokio::sync::Mutex::new(()),
                export_epoch: AtomicU64::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Mount new content and flag the preview stale
    pub fn update_content(&self, markup: &str, stylesheet: &str) {
        let live = LiveDocument::mount(markup, stylesheet, &self.shared.config);
        let mut st = self.shared.state();
        if st.torn_down {
            log::debug!("pipeline: ignoring content change after teardown");
            return;
        }
        st.live = Some(live);
        let generation = st.tracker.mark_stale();
        log::trace!("pipeline: content changed, generation {}", generation);
        self.shared.reevaluate(&mut st);
    }

    /// Remove the live subtree; pending and future jobs abort without side effects
    pub fn unmount(&self) {
        let mut st = self.shared.state();
        if let Some(live) = st.live.as_mut() {
            live.unmount();
        }
        self.shared.reevaluate(&mut st);
    }

    pub fn set_viewport_width(&self, width_px: u32) {
        let viewport = self.shared.config.viewport_class(width_px);
        let mut st = self.shared.state();
        if st.viewport != viewport {
            st.viewport = viewport;
            self.shared.reevaluate(&mut st);
        }
    }

    pub fn set_active_surface(&self, surface: ActiveSurface) {
        let mut st = self.shared.state();
        if st.surface != surface {
            st.surface = surface;
            self.shared.reevaluate(&mut st);
        }
    }

    /// URL of the current preview artifact, `None` until the first success
    pub fn preview_url(&self) -> Option<String> {
        self.shared.slot.current_url()
    }

    /// Page count of the last published preview (0 before the first)
    pub fn page_count(&self) -> usize {
        self.shared.state().page_count
    }

    /// Fingerprint of the snapshot behind the current preview
    pub fn preview_fingerprint(&self) -> Option<String> {
        self.shared.state().preview_fingerprint.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.shared.state().tracker.is_stale()
    }

    /// True while a job is waiting for or holding the job gate
    pub fn is_loading(&self) -> bool {
        self.shared.state().in_flight > 0
    }

    pub fn job_state(&self) -> JobState {
        self.shared.state().job
    }

    pub fn generation(&self) -> u64 {
        self.shared.state().tracker.generation()
    }

    /// Fingerprint of a fresh materialized snapshot of the live document
    pub fn fingerprint(&self) -> Result<String> {
        let st = self.shared.state();
        let (_, snapshot) = self.shared.prepare(&st).ok_or(Error::NotMounted)?;
        Ok(snapshot.fingerprint())
    }

    /// Run a preview job now, cancelling any pending timer
    pub async fn regenerate_now(&self) -> JobState {
        let claim = {
            let mut st = self.shared.state();
            if let Some(timer) = st.timer.take() {
                timer.handle.abort();
            }
            JobClaim::new(&self.shared, &mut st, false)
        };
        self.shared.run_preview(claim).await
    }

    /// Render the document at export fidelity and hand it to the save sink
    ///
    /// Returns `Ok(None)` when nothing is mounted. Engine and save failures are
    /// returned to the caller; nothing is saved on failure.
    pub async fn export(&self, display_name: &str) -> Result<Option<ExportOutcome>> {
        let shared = &self.shared;
        shared.export_epoch.fetch_add(1, Ordering::SeqCst);
        let claim = JobClaim::new(shared, &mut shared.state(), true);
        let _gate = shared.gate.lock().await;

        let prepared = {
            let mut st = shared.state();
            let prepared = if st.torn_down { None } else { shared.prepare(&st) };
            if prepared.is_some() {
                st.job = JobState::Running;
            }
            prepared
        };
        let Some((generation, snapshot)) = prepared else {
            log::debug!("export: nothing mounted, aborting");
            claim.finish(JobState::Idle);
            return Ok(None);
        };

        let job = RenderJob::new(RenderMode::Export, generation, &shared.config);
        let fingerprint = snapshot.fingerprint();
        let result = invoke(shared.engine.as_ref(), snapshot, &job).await;

        let outcome = result.and_then(|output| {
            let file_name = export_file_name(
                display_name,
                &shared.config.file_suffix,
                &shared.config.fallback_file_stem,
            );
            shared.sink.save(&file_name, &output.bytes)?;
            Ok(ExportOutcome {
                file_name,
                page_count: output.page_count,
                fingerprint,
                size: output.bytes.len(),
            })
        });

        match &outcome {
            Ok(o) => {
                log::info!("export: generation {} saved as {} ({} pages)", generation, o.file_name, o.page_count);
                claim.finish(JobState::Succeeded);
            }
            Err(e) => {
                log::error!("export: generation {} failed: {}", generation, e);
                claim.finish(JobState::Failed);
            }
        }
        outcome.map(Some)
    }

    /// Resolves once no timer is armed and no job is claimed
    pub async fn settled(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.state().is_settled() {
                return;
            }
            notified.await;
        }
    }

    /// Cancel the timer, release the current artifact and stop publishing
    pub fn teardown(&self) {
        {
            let mut st = self.shared.state();
            st.torn_down = true;
            if let Some(timer) = st.timer.take() {
                timer.handle.abort();
            }
            if st.job == JobState::Scheduled {
                st.job = JobState::Idle;
            }
        }
        self.shared.slot.teardown();
        self.shared.idle.notify_waiters();
        log::debug!("pipeline: torn down");
    }
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.state();
        f.debug_struct("ExportPipeline")
            .field("generation", &st.tracker.generation())
            .field("stale", &st.tracker.is_stale())
            .field("job", &st.job)
            .field("page_count", &st.page_count)
            .finish()
    }
}

impl State {
    fn is_settled(&self) -> bool {
        self.timer.is_none() && self.in_flight == 0
    }

    fn is_mounted(&self) -> bool {
        self.live.as_ref().is_some_and(LiveDocument::is_mounted)
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capture and materialize the live document at the current generation
    fn prepare(&self, st: &State) -> Option<(u64, Snapshot)> {
        let live = st.live.as_ref()?;
        let mut snapshot = Snapshot::capture(live, &self.config)?;
        let cascade = Cascade::new(live.stylesheet());
        let mut resolver = self.resolver.lock().unwrap_or_else(PoisonError::into_inner);
        materialize(live.document(), &cascade, &mut snapshot, &mut resolver, &self.config);
        Some((st.tracker.generation(), snapshot))
    }

    /// Cancel any armed timer and arm a new one if the preview is stale and visible
    fn reevaluate(self: &Arc<Self>, st: &mut State) {
        if let Some(timer) = st.timer.take() {
            timer.handle.abort();
            if st.job == JobState::Scheduled {
                st.job = JobState::Idle;
            }
        }
        if st.torn_down || !st.tracker.is_stale() || !st.is_mounted() {
            self.idle.notify_waiters();
            return;
        }
        if !st.tracker.should_schedule(st.viewport, st.surface) {
            log::trace!("pipeline: preview hidden, not scheduling");
            self.idle.notify_waiters();
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("pipeline: no tokio runtime, preview not scheduled");
            return;
        };

        let delay = st.tracker.schedule_delay(st.viewport);
        st.next_timer_id += 1;
        let id = st.next_timer_id;
        let shared = Arc::clone(self);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.fire(id).await;
        });
        st.timer = Some(PendingTimer { id, handle });
        if st.in_flight == 0 {
            st.job = JobState::Scheduled;
        }
        log::trace!("pipeline: preview scheduled in {:?}", delay);
    }

    async fn fire(self: Arc<Self>, id: u64) {
        let claim = {
            let mut st = self.state();
            if st.timer.as_ref().map(|t| t.id) != Some(id) {
                return;
            }
            // once disarmed here the timer can no longer be aborted mid-job
            st.timer = None;
            JobClaim::new(&self, &mut st, false)
        };
        self.run_preview(claim).await;
    }

    /// Run one claimed preview job
    async fn run_preview(self: &Arc<Self>, claim: JobClaim) -> JobState {
        let _gate = self.gate.lock().await;
        let epoch = self.export_epoch.load(Ordering::SeqCst);

        let prepared = {
            let mut st = self.state();
            let prepared = if st.torn_down { None } else { self.prepare(&st) };
            if prepared.is_some() {
                st.job = JobState::Running;
            }
            prepared
        };
        let Some((generation, snapshot)) = prepared else {
            log::debug!("preview: nothing mounted, aborting");
            return claim.finish(JobState::Idle);
        };

        let job = RenderJob::new(RenderMode::Preview, generation, &self.config);
        let fingerprint = snapshot.fingerprint();
        let result = invoke(self.engine.as_ref(), snapshot, &job).await;

        let state = {
            let mut st = self.state();
            match result {
                Ok(output) => {
                    let superseded = self.export_epoch.load(Ordering::SeqCst) != epoch;
                    if st.torn_down || superseded || !st.tracker.complete(generation) {
                        log::debug!(
                            "preview: discarding generation {} (current {})",
                            generation,
                            st.tracker.generation()
                        );
                        JobState::Idle
                    } else {
                        let url = self.slot.publish(output.bytes, output.page_count);
                        st.page_count = output.page_count;
                        st.preview_fingerprint = Some(fingerprint);
                        log::debug!(
                            "preview: generation {} published at {} ({} pages)",
                            generation,
                            url,
                            output.page_count
                        );
                        JobState::Succeeded
                    }
                }
                Err(e) => {
                    log::warn!("preview: generation {} failed, keeping previous artifact: {}", generation, e);
                    JobState::Failed
                }
            }
        };
        claim.finish(state)
    }

    /// Release a job claim and wake `settled` waiters. Export claims pass
    /// `reschedule`: the preview they overtook was discarded, so a still-stale
    /// document needs a fresh timer.
    fn finish_job(self: &Arc<Self>, outcome: JobState, reschedule: bool) -> JobState {
        let mut st = self.state();
        st.in_flight = st.in_flight.saturating_sub(1);
        st.job = match outcome {
            JobState::Idle if st.timer.is_some() => JobState::Scheduled,
            other => other,
        };
        if reschedule && st.timer.is_none() && st.in_flight == 0 && st.tracker.is_stale() {
            self.reevaluate(&mut st);
        }
        let job = st.job;
        drop(st);
        self.idle.notify_waiters();
        job
    }
}
