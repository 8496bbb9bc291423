//! The running widget: one engine, its configuration, persistence and a sink.
//!
//! ## Bootstrap
//!
//! ```text
//! Uninitialized --load(config)----------------------> Initializing -> Ready
//! Uninitialized --grace period elapsed (defaults)---> Initializing -> Ready
//! Ready         --load(config)----------------------> Initializing -> Ready
//! ```
//!
//! Inbound events that arrive before `Ready` are dropped. Reloading with the
//! same storage key keeps the live countdown and only swaps the settings.
//!
//! Nothing is written under a key until it has been read once. If the first
//! read fails the widget starts fresh, keeps retrying on each due flush, and
//! adopts whatever snapshot the store holds once it answers.
//!
//! [`Widget`] itself is synchronous and takes explicit instants, so it can be
//! driven from tests. [`run`] and [`WidgetDriver`] wrap it in a tokio loop
//! that ticks once per frame and multiplexes host messages.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::events::Event;
use crate::inbound::InboundEvent;
use crate::router::{self, Feedback, Handled};
use crate::storage::{Config, PersistWorker, SnapshotStore, WriteBehind};
use crate::timer::{now_ms, EngineSettings, TimerEngine, TimerState};

/// What the sink draws each frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub label: Option<String>,
    pub time: String,
    pub is_running: bool,
}

/// Presentation collaborator. Owns no timer logic.
pub trait RenderSink: Send {
    fn render(&mut self, frame: &Frame);

    /// Transient acknowledgement or rejection text. The sink hides it after
    /// `feedback.dismiss_after`.
    fn feedback(&mut self, feedback: &Feedback);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
}

pub struct Widget<S: RenderSink> {
    phase: Phase,
    config: Config,
    engine: Option<TimerEngine>,
    store: Arc<dyn SnapshotStore>,
    sink: S,
    persist: WriteBehind,
    worker: Option<PersistWorker>,
    /// The configured key has been read successfully at least once.
    store_verified: bool,
}

impl<S: RenderSink> Widget<S> {
    pub fn new(store: Arc<dyn SnapshotStore>, sink: S) -> Self {
        let config = Config::default();
        Self {
            phase: Phase::Uninitialized,
            persist: WriteBehind::new(config.runtime.persist_interval()),
            config,
            engine: None,
            store,
            sink,
            worker: None,
            store_verified: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current timer state, once bootstrapped.
    pub fn state(&self) -> Option<TimerState> {
        self.engine.as_ref().map(TimerEngine::snapshot)
    }

    pub fn frame_interval(&self) -> Duration {
        self.config.runtime.frame_interval()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Initialize (or re-initialize) from `config`.
    ///
    /// A reload under the current storage key keeps the live timer. Otherwise
    /// the previous timer is handed to its writer and the snapshot stored
    /// under the new key is restored, or a fresh one started when there is
    /// none or it cannot be read. Must run inside a tokio runtime: it spawns
    /// the persistence worker.
    pub fn load(&mut self, config: Config, now_ms: u64) -> Event {
        self.phase = Phase::Initializing;
        let key = config.storage_key().to_string();
        let settings = config.engine_settings();
        let same_key = self.config.storage_key() == key;

        let (mut engine, event) = match self.engine.take() {
            Some(mut engine) if same_key => {
                engine.reconfigure(settings, now_ms);
                tracing::info!(key = %key, remaining = engine.remaining_secs(), "configuration reloaded");
                let event = engine.status(now_ms);
                (engine, event)
            }
            previous => {
                if let Some(engine) = previous {
                    self.retire(engine);
                }
                self.read_or_fresh(&key, settings, now_ms)
            }
        };
        engine.apply_autostart(now_ms);

        self.persist = WriteBehind::new(config.runtime.persist_interval());
        self.persist.mark_urgent();
        if !same_key || self.worker.is_none() {
            self.worker = Some(PersistWorker::spawn(Arc::clone(&self.store), key));
        }
        self.engine = Some(engine);
        self.config = config;
        self.phase = Phase::Ready;
        self.render();
        event
    }

    /// Fallback when the host never sent a load: bootstrap with defaults.
    /// No-op once initialization has begun.
    pub fn bootstrap_default(&mut self, now_ms: u64) -> Option<Event> {
        if self.phase != Phase::Uninitialized {
            return None;
        }
        tracing::info!("no load received within grace period, bootstrapping with defaults");
        Some(self.load(Config::default(), now_ms))
    }

    /// One animation frame: apply elapsed time, draw, flush if due.
    pub fn frame(&mut self, now_ms: u64, now: Instant) -> Option<Event> {
        let engine = self.engine.as_mut()?;
        let was_running = engine.is_running();
        let event = engine.tick(now_ms);
        if event.is_some() {
            self.persist.mark_urgent();
        } else if was_running {
            self.persist.mark_dirty();
        }
        self.render();
        self.flush_if_due(now_ms, now);
        event
    }

    /// Flush whatever is pending and wait for the writer to finish.
    pub async fn shutdown(mut self) {
        if self.persist.take(Instant::now()) && self.engine.is_some() {
            if self.store_readable(now_ms()) {
                self.submit_snapshot();
            } else {
                tracing::warn!("timer store still unreadable at shutdown, leaving it untouched");
            }
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await;
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Handle one raw host event.
    pub fn handle_raw(&mut self, raw: &Value, now_ms: u64) -> Handled {
        match InboundEvent::normalize(raw) {
            Some(event) => self.handle_event(&event, now_ms),
            None => {
                tracing::debug!("ignoring unrecognised event");
                Handled::default()
            }
        }
    }

    pub fn handle_event(&mut self, event: &InboundEvent, now_ms: u64) -> Handled {
        let Some(engine) = self.engine.as_mut() else {
            tracing::debug!(kind = event.kind(), "dropping event received before initialization");
            return Handled::default();
        };
        let handled = router::handle(engine, &self.config, event, now_ms);
        if handled.is_mutation() {
            self.persist.mark_urgent();
        }
        if let Some(feedback) = &handled.feedback {
            self.sink.feedback(feedback);
        }
        handled
    }

    // ── Manual surface ───────────────────────────────────────────────

    pub fn manual_add(&mut self, secs: f64, now_ms: u64) -> Option<Event> {
        let event = self.engine.as_mut()?.add_seconds(secs, now_ms);
        self.after_manual(event)
    }

    pub fn manual_reset(&mut self, now_ms: u64) -> Option<Event> {
        let event = self.engine.as_mut()?.reset(now_ms);
        self.after_manual(Some(event))
    }

    pub fn toggle_pause(&mut self, now_ms: u64) -> Option<Event> {
        let event = self.engine.as_mut()?.toggle_pause(now_ms);
        self.after_manual(Some(event))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn after_manual(&mut self, event: Option<Event>) -> Option<Event> {
        if event.is_some() {
            self.persist.mark_urgent();
            self.render();
        }
        event
    }

    fn render(&mut self) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let display = &self.config.display;
        let frame = Frame {
            label: display.show_label.then(|| display.label_text.clone()),
            time: engine.formatted(),
            is_running: engine.is_running(),
        };
        self.sink.render(&frame);
    }

    fn read_or_fresh(
        &mut self,
        key: &str,
        settings: EngineSettings,
        now_ms: u64,
    ) -> (TimerEngine, Event) {
        let stored = self.store.get(key);
        self.store_verified = stored.is_ok();
        match stored {
            Ok(Some(snapshot)) => {
                let (engine, event) = TimerEngine::restore(settings, snapshot, now_ms);
                tracing::info!(key = %key, remaining = engine.remaining_secs(), "restored timer snapshot");
                (engine, event)
            }
            Ok(None) => {
                tracing::info!(key = %key, "no stored timer, starting fresh");
                fresh(settings, now_ms)
            }
            Err(e) => {
                tracing::warn!(key = %key, "timer snapshot read failed, starting fresh: {e}");
                fresh(settings, now_ms)
            }
        }
    }

    /// Hand the outgoing timer to its writer, which finishes in the background.
    fn retire(&mut self, engine: TimerEngine) {
        if let Some(worker) = self.worker.take() {
            if self.store_verified {
                worker.submit(engine.snapshot());
            }
        }
    }

    /// Whether writes under the current key are allowed yet.
    ///
    /// Until a read succeeds the stored snapshot is unknown and must not be
    /// overwritten. When the store answers with a snapshot, it replaces the
    /// fresh timer started in its absence.
    fn store_readable(&mut self, now_ms: u64) -> bool {
        if self.store_verified {
            return true;
        }
        let key = self.config.storage_key().to_string();
        match self.store.get(&key) {
            Ok(stored) => {
                self.store_verified = true;
                if let Some(snapshot) = stored {
                    tracing::warn!(key = %key, "timer store readable again, adopting stored snapshot");
                    let (mut engine, _) =
                        TimerEngine::restore(self.config.engine_settings(), snapshot, now_ms);
                    engine.apply_autostart(now_ms);
                    self.engine = Some(engine);
                    self.render();
                }
                true
            }
            Err(e) => {
                tracing::debug!(key = %key, "timer store still unreadable: {e}");
                false
            }
        }
    }

    fn flush_if_due(&mut self, now_ms: u64, now: Instant) {
        if !self.persist.take_if_due(now) {
            return;
        }
        if !self.store_readable(now_ms) {
            // Retry after another persist interval.
            self.persist.mark_dirty();
            return;
        }
        self.submit_snapshot();
    }

    fn submit_snapshot(&self) {
        if let (Some(engine), Some(worker)) = (self.engine.as_ref(), self.worker.as_ref()) {
            worker.submit(engine.snapshot());
        }
    }
}

fn fresh(settings: EngineSettings, now_ms: u64) -> (TimerEngine, Event) {
    let mut engine = TimerEngine::new(settings, now_ms);
    let event = engine.reset(now_ms);
    (engine, event)
}

/// Messages a host sends to a running widget loop.
#[derive(Debug)]
pub enum HostMessage {
    /// The host's load event, carrying its configuration.
    Load(Config),
    /// A raw inbound event envelope.
    Event(Value),
    ManualAdd(f64),
    ManualReset,
    TogglePause,
    /// Reply with the current state (`None` before initialization).
    State(oneshot::Sender<Option<TimerState>>),
    Shutdown,
}

/// Drive `widget` until `Shutdown` or until every sender is dropped.
///
/// Falls back to default configuration if no `Load` arrives within `grace`.
pub async fn run<S: RenderSink>(
    mut widget: Widget<S>,
    mut rx: mpsc::Receiver<HostMessage>,
    grace: Duration,
) {
    let mut frames = frame_ticker(widget.frame_interval());
    let grace_timer = tokio::time::sleep(grace);
    tokio::pin!(grace_timer);
    let mut grace_pending = true;

    loop {
        tokio::select! {
            _ = frames.tick() => {
                if let Some(event) = widget.frame(now_ms(), Instant::now()) {
                    tracing::info!(?event, "timer event");
                }
            }
            _ = &mut grace_timer, if grace_pending => {
                grace_pending = false;
                if widget.bootstrap_default(now_ms()).is_some() {
                    frames = frame_ticker(widget.frame_interval());
                }
            }
            msg = rx.recv() => match msg {
                Some(HostMessage::Load(config)) => {
                    grace_pending = false;
                    widget.load(config, now_ms());
                    frames = frame_ticker(widget.frame_interval());
                }
                Some(HostMessage::Event(raw)) => {
                    let handled = widget.handle_raw(&raw, now_ms());
                    for event in &handled.events {
                        tracing::debug!(?event, "timer event");
                    }
                }
                Some(HostMessage::ManualAdd(secs)) => {
                    widget.manual_add(secs, now_ms());
                }
                Some(HostMessage::ManualReset) => {
                    widget.manual_reset(now_ms());
                }
                Some(HostMessage::TogglePause) => {
                    widget.toggle_pause(now_ms());
                }
                Some(HostMessage::State(reply)) => {
                    let _ = reply.send(widget.state());
                }
                Some(HostMessage::Shutdown) | None => break,
            }
        }
    }

    widget.shutdown().await;
}

fn frame_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Owns the single widget loop. Starting again stops the previous loop
/// first, and waits for its final flush, so two tickers never run at once.
#[derive(Default)]
pub struct WidgetDriver {
    handle: Option<JoinHandle<()>>,
    tx: Option<mpsc::Sender<HostMessage>>,
}

impl WidgetDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the loop for `widget`; returns the channel hosts talk to it on.
    pub async fn start<S: RenderSink + 'static>(
        &mut self,
        widget: Widget<S>,
        grace: Duration,
    ) -> mpsc::Sender<HostMessage> {
        self.stop().await;
        let (tx, rx) = mpsc::channel(256);
        self.tx = Some(tx.clone());
        self.handle = Some(tokio::spawn(run(widget, rx, grace)));
        tx
    }

    /// Shut the current loop down, persisting its timer, and wait for it.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.tx.take() {
            // A loop that already exited has dropped its receiver.
            let _ = tx.send(HostMessage::Shutdown).await;
        }
        self.join().await;
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the current loop to exit once its hosts hang up or send
    /// `Shutdown`.
    pub async fn join(&mut self) {
        self.tx = None;
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("widget loop ended abnormally: {e}");
                }
            }
        }
    }
}
