//! The host-facing diagram handle.
//!
//! [`Diagram`] ties the pieces together: the snapshot buffer, the playback
//! controller, particle state, layout cache, and the view renderer. It is a
//! cheap `Clone` handle that can be shared between a producer feeding
//! iterations, a tick source, and a control surface.
//!
//! # Locking
//!
//! The buffer sits behind its own `RwLock` so ingestion never waits on
//! rendering for long and readers always see a whole snapshot count. Playback,
//! particles, layout and selection share one `Mutex`, which serializes every
//! state transition. Locks are always taken in the order buffer, labels,
//! core. Completion callbacks run after every lock is released, so they may
//! call back into the diagram.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

use hmmviz_layout::{LayoutCache, LayoutMode};
use serde::Serialize;
use tracing::{debug, info};

use crate::buffer::SnapshotBuffer;
use crate::dot::{render_static, GraphDescription, StaticOverrides};
use crate::edges::{Edge, EdgeSelector};
use crate::error::{Error, Result};
use crate::export::SvgExporter;
use crate::labels::Labels;
use crate::particles::ParticleField;
use crate::playback::{Jump, Playback, PlaybackState, PlaybackStatus, TickOutcome};
use crate::scene::{render, Frame, Scene, Selection, Surface};
use crate::settings::{DiagramSettings, OutputFormat};
use crate::snapshot::Snapshot;
use crate::ticker::{TickSink, TokioTicker};

/// Payload of a completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Playback position at completion (the last index)
    pub index: usize,
    pub iteration: u64,
}

type CompletionCallback = Box<dyn FnMut(&Completion) + Send + 'static>;

/// Everything a control surface shows.
#[derive(Debug, Clone, Serialize)]
pub struct DiagramStatus {
    pub playback: PlaybackStatus,
    pub iteration: Option<u64>,
    pub log_likelihood: Option<f64>,
    pub particles_enabled: bool,
    pub decongestion_enabled: bool,
    pub layout_mode: LayoutMode,
    pub selection: Selection,
}

/// Edges selected for the snapshot at `index`.
#[derive(Debug)]
struct Drawn {
    index: usize,
    edges: Vec<Edge>,
}

#[derive(Debug)]
struct Core {
    playback: Playback,
    particles: ParticleField,
    layouts: LayoutCache,
    mode: LayoutMode,
    decongestion: bool,
    selection: Selection,
    drawn: Option<Drawn>,
}

impl Core {
    fn jumped(&mut self, jump: Jump) {
        if jump == Jump::Reset {
            self.particles.clear();
        }
    }

    /// Re-select edges if the position moved and match particles to them.
    fn refresh(&mut self, buffer: &SnapshotBuffer, settings: &DiagramSettings) -> Option<Arc<Snapshot>> {
        let index = self.playback.current_index();
        let Ok(snapshot) = buffer.get(index) else {
            self.drawn = None;
            return None;
        };
        if self.drawn.as_ref().map_or(true, |d| d.index != index) {
            let edges = EdgeSelector::from_settings(settings, self.decongestion).select(&snapshot);
            self.drawn = Some(Drawn { index, edges });
        }
        if let Some(drawn) = &self.drawn {
            self.particles.sync(&drawn.edges);
        }
        Some(snapshot)
    }
}

struct Inner {
    settings: DiagramSettings,
    surface: Surface,
    buffer: RwLock<SnapshotBuffer>,
    labels: RwLock<Labels>,
    core: Mutex<Core>,
    listeners: Mutex<Vec<CompletionCallback>>,
    destroyed: AtomicBool,
    ticker: Mutex<Option<TokioTicker>>,
}

/// Handle to one interactive diagram.
#[derive(Clone)]
pub struct Diagram {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Diagram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagram")
            .field("surface", &self.inner.surface)
            .field("len", &self.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Diagram {
    /// Create an empty diagram drawing onto `surface`. Settings are validated
    /// here and fixed for the diagram's lifetime.
    pub fn new(surface: Surface, settings: DiagramSettings) -> Result<Self> {
        let settings = settings.validated()?;
        let core = Core {
            playback: Playback::new(
                Duration::from_millis(settings.iteration_interval_ms),
                settings.animation_speed,
            ),
            particles: ParticleField::new(settings.max_particles_per_edge, settings.particles_enabled),
            layouts: LayoutCache::new(),
            mode: settings.layout_mode,
            decongestion: settings.decongestion_enabled,
            selection: Selection::None,
            drawn: None,
        };
        debug!(width = surface.width, height = surface.height, "diagram created");
        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                surface,
                buffer: RwLock::new(SnapshotBuffer::new()),
                labels: RwLock::new(Labels::default()),
                core: Mutex::new(core),
                listeners: Mutex::new(Vec::new()),
                destroyed: AtomicBool::new(false),
                ticker: Mutex::new(None),
            }),
        })
    }

    pub fn settings(&self) -> &DiagramSettings {
        &self.inner.settings
    }

    pub fn surface(&self) -> Surface {
        self.inner.surface
    }

    /// Number of buffered snapshots.
    pub fn len(&self) -> usize {
        read(&self.inner.buffer).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole run. Playback stops at the first iteration.
    ///
    /// All snapshots are validated before anything changes; on error the
    /// previous run stays loaded.
    pub fn load(&self, snapshots: Vec<Snapshot>) -> Result<()> {
        let mut buffer = write(&self.inner.buffer);
        let labels = read(&self.inner.labels);
        if let Some(first) = snapshots.first() {
            labels.check(first.tier_counts())?;
        }
        let previous = buffer.tier_counts();
        buffer.replace(snapshots)?;

        let mut core = lock(&self.inner.core);
        if buffer.tier_counts() != previous {
            core.layouts.invalidate();
        }
        core.playback.load(buffer.len());
        core.particles.clear();
        core.selection = Selection::None;
        core.drawn = None;
        info!(snapshots = buffer.len(), "loaded training run");
        Ok(())
    }

    /// Append one streamed iteration.
    ///
    /// The current view is not disturbed. If playback had completed it
    /// resumes toward the new snapshot.
    pub fn feed_iteration(&self, snapshot: Snapshot) -> Result<()> {
        let len = {
            let mut buffer = write(&self.inner.buffer);
            if buffer.is_empty() {
                read(&self.inner.labels).check(snapshot.tier_counts())?;
            }
            let iteration = snapshot.iteration;
            buffer.append(snapshot)?;
            debug!(iteration, len = buffer.len(), "fed iteration");
            buffer.len()
        };
        let mut core = lock(&self.inner.core);
        let before = core.playback.state();
        core.playback.extend(len);
        if before != core.playback.state() {
            debug!(from = ?before, to = ?core.playback.state(), "playback state changed on feed");
        }
        Ok(())
    }

    fn transition<R>(&self, op: &str, f: impl FnOnce(&mut Core) -> R) -> R {
        let mut core = lock(&self.inner.core);
        let before = core.playback.state();
        let out = f(&mut core);
        let after = core.playback.state();
        if before != after {
            debug!(op, from = ?before, to = ?after, index = core.playback.current_index(), "playback transition");
        }
        out
    }

    /// Start playing. From `Complete` this restarts at the first iteration.
    pub fn play(&self) {
        self.transition("play", |core| {
            let jump = core.playback.play();
            core.jumped(jump);
        });
    }

    pub fn pause(&self) {
        self.transition("pause", |core| core.playback.pause());
    }

    pub fn step_forward(&self) {
        self.transition("step_forward", |core| core.playback.step_forward());
    }

    pub fn step_back(&self) {
        self.transition("step_back", |core| core.playback.step_back());
    }

    pub fn go_first(&self) {
        self.transition("go_first", |core| {
            let jump = core.playback.go_first();
            core.jumped(jump);
        });
    }

    pub fn go_last(&self) {
        self.transition("go_last", |core| {
            let jump = core.playback.go_last();
            core.jumped(jump);
        });
    }

    /// Jump to `index`. Out of range is a `Range` error and changes nothing.
    pub fn seek_to(&self, index: usize) -> Result<()> {
        self.transition("seek_to", |core| -> Result<()> {
            let jump = core.playback.seek_to(index)?;
            core.jumped(jump);
            Ok(())
        })
    }

    /// Set the playback speed multiplier; must be positive.
    pub fn set_speed(&self, multiplier: f64) -> Result<()> {
        lock(&self.inner.core).playback.set_speed(multiplier)
    }

    /// Back to the first iteration, stopped. The buffer is kept.
    pub fn reset(&self) {
        self.transition("reset", |core| {
            let jump = core.playback.reset();
            core.jumped(jump);
        });
    }

    /// Advance time by `dt`: playback first, then particles. Particles only
    /// flow while playing.
    ///
    /// Fires the completion callbacks if this tick completed playback.
    pub fn tick(&self, dt: Duration) -> TickOutcome {
        if self.is_destroyed() {
            return TickOutcome::default();
        }
        let (outcome, completion) = {
            let buffer = read(&self.inner.buffer);
            let mut core = lock(&self.inner.core);
            let outcome = core.playback.tick(dt);
            let snapshot = core.refresh(&buffer, &self.inner.settings);
            if core.playback.state() == PlaybackState::Playing {
                let time_scale = core.playback.effective_speed() as f32;
                core.particles.advance(dt.as_secs_f32(), time_scale);
            }

            let completion = outcome.completed.then(|| Completion {
                index: core.playback.current_index(),
                iteration: snapshot.map_or(0, |s| s.iteration),
            });
            (outcome, completion)
        };
        if let Some(completion) = completion {
            info!(index = completion.index, iteration = completion.iteration, "playback complete");
            self.notify_complete(&completion);
        }
        outcome
    }

    /// Register a callback for every autonomous completion.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnMut(&Completion) + Send + 'static,
    {
        lock(&self.inner.listeners).push(Box::new(callback));
    }

    fn notify_complete(&self, completion: &Completion) {
        let mut callbacks = std::mem::take(&mut *lock(&self.inner.listeners));
        for callback in callbacks.iter_mut() {
            callback(completion);
        }
        // Keep callbacks registered while these were running.
        let mut listeners = lock(&self.inner.listeners);
        callbacks.append(&mut listeners);
        *listeners = callbacks;
    }

    /// Show or hide particles. Hidden particles keep their phases.
    pub fn toggle_particles(&self) -> bool {
        let enabled = lock(&self.inner.core).particles.toggle();
        debug!(enabled, "particles toggled");
        enabled
    }

    pub fn toggle_decongestion(&self) -> bool {
        let mut core = lock(&self.inner.core);
        core.decongestion = !core.decongestion;
        core.drawn = None;
        debug!(enabled = core.decongestion, "de-congestion toggled");
        core.decongestion
    }

    /// Switch between the flat and volumetric layout.
    pub fn toggle_3d(&self) -> LayoutMode {
        let counts = read(&self.inner.buffer).tier_counts().unwrap_or_default();
        let mut core = lock(&self.inner.core);
        core.mode = core.mode.toggled();
        let mode = core.mode;
        core.layouts.get(counts, mode);
        debug!(?mode, "layout mode toggled");
        mode
    }

    pub fn layout_mode(&self) -> LayoutMode {
        lock(&self.inner.core).mode
    }

    /// Set the hover/click selection.
    pub fn select(&self, selection: Selection) {
        lock(&self.inner.core).selection = selection;
    }

    pub fn selection(&self) -> Selection {
        lock(&self.inner.core).selection
    }

    /// Set custom node captions. Counts must match the loaded run.
    pub fn set_labels(&self, labels: Labels) -> Result<()> {
        let buffer = read(&self.inner.buffer);
        if let Some(counts) = buffer.tier_counts() {
            labels.check(counts)?;
        }
        *write(&self.inner.labels) = labels;
        Ok(())
    }

    pub fn labels(&self) -> Labels {
        read(&self.inner.labels).clone()
    }

    pub fn playback(&self) -> PlaybackStatus {
        PlaybackStatus::from(&lock(&self.inner.core).playback)
    }

    pub fn state(&self) -> PlaybackState {
        lock(&self.inner.core).playback.state()
    }

    pub fn current_index(&self) -> usize {
        lock(&self.inner.core).playback.current_index()
    }

    pub fn status(&self) -> DiagramStatus {
        let buffer = read(&self.inner.buffer);
        let core = lock(&self.inner.core);
        let current = buffer.get(core.playback.current_index()).ok();
        DiagramStatus {
            playback: PlaybackStatus::from(&core.playback),
            iteration: current.as_ref().map(|s| s.iteration),
            log_likelihood: current.as_ref().map(|s| s.log_likelihood),
            particles_enabled: core.particles.is_enabled(),
            decongestion_enabled: core.decongestion,
            layout_mode: core.mode,
            selection: core.selection,
        }
    }

    /// Snapshot at the current playback position.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        let buffer = read(&self.inner.buffer);
        let index = lock(&self.inner.core).playback.current_index();
        buffer.get(index).ok()
    }

    /// Snapshot at `index`.
    pub fn snapshot(&self, index: usize) -> Result<Arc<Snapshot>> {
        read(&self.inner.buffer).get(index)
    }

    /// Edges drawn for the current snapshot.
    pub fn visible_edges(&self) -> Vec<Edge> {
        let buffer = read(&self.inner.buffer);
        let mut core = lock(&self.inner.core);
        core.refresh(&buffer, &self.inner.settings);
        core.drawn.as_ref().map(|d| d.edges.clone()).unwrap_or_default()
    }

    /// Total particles currently tracked, shown or not.
    pub fn particle_count(&self) -> usize {
        lock(&self.inner.core).particles.particle_total()
    }

    /// Render the current frame.
    pub fn scene(&self) -> Scene {
        let buffer = read(&self.inner.buffer);
        let labels = read(&self.inner.labels);
        let mut guard = lock(&self.inner.core);
        let snapshot = guard.refresh(&buffer, &self.inner.settings);
        let counts = buffer.tier_counts().unwrap_or_default();

        let core = &mut *guard;
        let layout = core.layouts.get(counts, core.mode);
        let frame = Frame {
            snapshot: snapshot.as_deref(),
            position: core.playback.current_index(),
            total: buffer.len(),
            settings: &self.inner.settings,
            layout,
            edges: core.drawn.as_ref().map_or(&[][..], |d| d.edges.as_slice()),
            particles: &core.particles,
            selection: core.selection,
            labels: &labels,
        };
        render(&frame, self.inner.surface)
    }

    pub fn export_svg(&self) -> String {
        SvgExporter::new().to_svg_string(&self.scene())
    }

    #[cfg(feature = "png")]
    pub fn export_png(&self) -> Result<Vec<u8>> {
        use crate::export::{PngExporter, SceneExporter};
        PngExporter::new().export(&self.scene())
    }

    /// Graphviz description of the current transition matrix.
    pub fn static_graph(&self, overrides: &StaticOverrides) -> Result<GraphDescription> {
        let snapshot = self
            .current_snapshot()
            .ok_or_else(|| Error::export("no snapshot loaded"))?;
        let labels = self.labels();
        render_static(&snapshot.transition, &labels, &self.inner.settings, overrides)
    }

    /// Write the current frame to `path`.
    ///
    /// SVG and PNG come from the interactive scene. PDF goes through the
    /// Graphviz static renderer.
    pub fn save(&self, path: &Path, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Svg => std::fs::write(path, self.export_svg())?,
            #[cfg(feature = "png")]
            OutputFormat::Png => std::fs::write(path, self.export_png()?)?,
            #[cfg(not(feature = "png"))]
            OutputFormat::Png => {
                return Err(Error::export("PNG export requires the `png` feature"));
            }
            OutputFormat::Pdf => {
                let overrides = StaticOverrides {
                    format: Some(OutputFormat::Pdf),
                    ..StaticOverrides::default()
                };
                self.static_graph(&overrides)?.render_with_graphviz(path)?;
            }
        }
        info!(path = %path.display(), format = format.extension(), "saved diagram");
        Ok(())
    }

    /// Drive this diagram from a real-time ticker on the current tokio
    /// runtime, at the configured frame interval. Replaces any running
    /// ticker.
    pub fn start(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::configuration("diagram has been destroyed"));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::configuration("start() needs a tokio runtime"));
        }
        let weak = Arc::downgrade(&self.inner);
        let ticker = TokioTicker::spawn(
            Duration::from_millis(self.inner.settings.frame_interval_ms),
            move |dt| match weak.upgrade() {
                Some(inner) => Diagram { inner }.on_tick(dt),
                None => false,
            },
        );
        if let Some(previous) = lock(&self.inner.ticker).replace(ticker) {
            previous.stop();
        }
        Ok(())
    }

    /// Halt pending ticks and stop playback. Later ticks are ignored.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(ticker) = lock(&self.inner.ticker).take() {
            ticker.stop();
        }
        lock(&self.inner.core).playback.pause();
        info!("diagram destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

impl TickSink for Diagram {
    fn on_tick(&self, dt: Duration) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.tick(dt);
        true
    }
}
