//! Sampling loop and the run/stop state machine driving it

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use parse_display::Display;
use strum_macros::EnumString;
use thiserror::Error;
use tokio::{
    select,
    sync::{mpsc, oneshot},
    task::{JoinError, JoinHandle},
};

use crate::{
    analysis,
    capture::{CaptureError, FrameSource},
    controller::{ControllerState, LightCommand, LightController},
    detector::ChangeDetector,
    image::RawImage,
    models::{Color, Config},
    stats::{LogEntry, StatsLog},
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("sampling task failed: {0}")]
    Join(#[from] JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunState {
    Idle,
    Running,
}

impl From<bool> for RunState {
    fn from(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[display(style = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Command {
    Start,
    Stop,
    Quit,
}

/// Outcome of a single sampling cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub color: Color,
    pub emitted: bool,
    pub sample_size: (u32, u32),
}

/// One capture, analyze, decide and log iteration, plus the state it carries between
/// iterations
pub struct SyncCycle<S, C> {
    config: Arc<Config>,
    source: S,
    controller: Option<Arc<C>>,
    detector: ChangeDetector,
    stats: StatsLog,
}

impl<S: FrameSource, C: LightController> SyncCycle<S, C> {
    pub fn new(config: Arc<Config>, source: S, controller: Option<Arc<C>>) -> Self {
        Self {
            detector: ChangeDetector::new(config.sync.color_change_threshold),
            stats: StatsLog::new(config.export.json_path.clone()),
            config,
            source,
            controller,
        }
    }

    /// Last color sent to the controller since the loop was started
    pub fn previous_color(&self) -> Option<Color> {
        self.detector.previous()
    }

    pub fn reset(&mut self) {
        self.detector.reset();
    }

    pub async fn tick(&mut self) -> Result<CycleReport, SyncError> {
        let start = Instant::now();

        let (sample, color) = tokio::task::block_in_place(|| self.sample())?;
        debug!(color = ?color, "dominant color");

        let emitted = self.emit(color).await;

        if self.config.export.json {
            self.log_stats(&sample).await;
        }

        trace!(elapsed = ?start.elapsed(), "cycle complete");

        Ok(CycleReport {
            color,
            emitted,
            sample_size: (sample.width(), sample.height()),
        })
    }

    /// Capture, export and analyze one frame, returning the downscaled frame and its dominant
    /// color
    fn sample(&mut self) -> Result<(RawImage, Color), CaptureError> {
        let frame = self.capture()?;

        if self.config.export.screenshot {
            self.export_frame(&frame);
        }

        let sample = frame.downscale();
        let color = analysis::dominant_color(&sample);
        Ok((sample, color))
    }

    fn capture(&mut self) -> Result<RawImage, CaptureError> {
        if self.source.display_count()? == 0 {
            return Err(CaptureError::NoDisplay);
        }

        self.source.capture(self.config.sync.display)
    }

    fn export_frame(&self, frame: &RawImage) {
        let path = &self.config.export.screenshot_path;

        if let Err(error) = frame.save_png(path) {
            warn!(error = %error, path = %path.display(), "failed to save screenshot");
        }
    }

    async fn emit(&mut self, color: Color) -> bool {
        let controller = match &self.controller {
            Some(controller) => controller,
            None => {
                debug!("no access token configured, skipping light update");
                return false;
            }
        };

        if !self.detector.should_emit(color) {
            debug!(
                threshold = self.detector.threshold(),
                "color change below threshold, skipping light update"
            );
            return false;
        }

        let settings = &self.config.controller;
        let command = LightCommand::color(color, settings.color_mode, settings.brightness);

        if let Err(error) = controller.turn_on(&command).await {
            warn!(error = %error, "failed to update light");
        }

        self.detector.record(color);
        true
    }

    async fn log_stats(&mut self, sample: &RawImage) {
        let top = analysis::top_colors(sample, self.config.export.top_colors);
        let entry = LogEntry::new(
            chrono::Local::now(),
            (sample.width(), sample.height()),
            &top,
            sample.pixel_count(),
        );

        let stats = self.stats.clone();
        match tokio::task::spawn_blocking(move || stats.append(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(error = %error, path = %self.stats.path().display(), "failed to write statistics log");
            }
            Err(error) => {
                warn!(error = %error, "statistics log task failed");
            }
        }
    }

    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) -> (Self, Result<(), SyncError>) {
        let interval = self.config.sync.update_interval();
        info!(interval = ?interval, display = self.config.sync.display, "sampling started");

        loop {
            if let Err(error) = self.tick().await {
                error!(error = %error, "sampling failed");
                return (self, Err(error));
            }

            select! {
                _ = &mut stop_rx => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("sampling stopped");
        (self, Ok(()))
    }
}

struct ActiveCycle<S, C> {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<(SyncCycle<S, C>, Result<(), SyncError>)>,
}

enum Slot<S, C> {
    Idle(SyncCycle<S, C>),
    Running(ActiveCycle<S, C>),
    Failed,
}

enum Wake<S, C> {
    Message(Option<ControlMessage>),
    Exited(Result<(SyncCycle<S, C>, Result<(), SyncError>), JoinError>),
}

#[derive(Debug)]
struct ControlMessage {
    command: Command,
    reply: oneshot::Sender<RunState>,
}

/// Owner of the sampling loop, reacting to start, stop and quit commands
pub struct Supervisor<S, C> {
    rx: mpsc::Receiver<ControlMessage>,
    running: Arc<AtomicBool>,
    controller: Option<Arc<C>>,
    restore_on_stop: bool,
    snapshot: Option<ControllerState>,
    slot: Slot<S, C>,
}

impl<S, C> Supervisor<S, C>
where
    S: FrameSource + 'static,
    C: LightController + 'static,
{
    pub fn new(config: Arc<Config>, source: S, controller: Option<C>) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(4);
        let running = Arc::new(AtomicBool::new(false));
        let controller = controller.map(Arc::new);

        let cycle = SyncCycle::new(config.clone(), source, controller.clone());

        (
            Self {
                rx,
                running: running.clone(),
                controller,
                restore_on_stop: config.controller.restore_on_stop,
                snapshot: None,
                slot: Slot::Idle(cycle),
            },
            SyncHandle { tx, running },
        )
    }

    pub fn state(&self) -> RunState {
        self.running.load(Ordering::SeqCst).into()
    }

    /// Process commands until `quit` is received or every handle is dropped
    ///
    /// Returns an error if the sampling loop failed to capture a frame.
    pub async fn run(mut self) -> Result<(), SyncError> {
        loop {
            let wake = match &mut self.slot {
                Slot::Running(active) => select! {
                    message = self.rx.recv() => Wake::Message(message),
                    result = &mut active.task => Wake::Exited(result),
                },
                _ => Wake::Message(self.rx.recv().await),
            };

            match wake {
                Wake::Exited(result) => self.on_cycle_exit(result)?,
                Wake::Message(None) => {
                    debug!("all handles dropped");
                    break self.stop().await;
                }
                Wake::Message(Some(ControlMessage { command, reply })) => {
                    trace!(command = %command, "control message");

                    let result = match command {
                        Command::Start => {
                            self.start().await;
                            Ok(())
                        }
                        Command::Stop | Command::Quit => self.stop().await,
                    };

                    // ok: the sender may not wait for the new state
                    reply.send(self.state()).ok();
                    result?;

                    if command == Command::Quit {
                        info!("quit requested");
                        break Ok(());
                    }
                }
            }
        }
    }

    async fn start(&mut self) {
        let cycle = match std::mem::replace(&mut self.slot, Slot::Failed) {
            Slot::Idle(cycle) => cycle,
            other => {
                self.slot = other;
                debug!("already running, ignoring start");
                return;
            }
        };

        self.running.store(true, Ordering::SeqCst);

        self.snapshot = match &self.controller {
            Some(controller) => match controller.state().await {
                Ok(state) => {
                    info!(
                        state = %state.state,
                        color = ?state.attributes.color(),
                        brightness = ?state.attributes.brightness,
                        "saved light state"
                    );
                    Some(state)
                }
                Err(error) => {
                    warn!(error = %error, "failed to get light state");
                    None
                }
            },
            None => None,
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(cycle.run(stop_rx));
        self.slot = Slot::Running(ActiveCycle { stop_tx, task });
    }

    async fn stop(&mut self) -> Result<(), SyncError> {
        let active = match std::mem::replace(&mut self.slot, Slot::Failed) {
            Slot::Running(active) => active,
            other => {
                self.slot = other;
                debug!("not running, ignoring stop");
                return Ok(());
            }
        };

        self.running.store(false, Ordering::SeqCst);

        // ok: the cycle may already have exited
        active.stop_tx.send(()).ok();

        let (mut cycle, result) = active.task.await?;
        cycle.reset();
        self.slot = Slot::Idle(cycle);

        self.restore().await;
        result
    }

    fn on_cycle_exit(
        &mut self,
        result: Result<(SyncCycle<S, C>, Result<(), SyncError>), JoinError>,
    ) -> Result<(), SyncError> {
        self.running.store(false, Ordering::SeqCst);

        let (mut cycle, result) = result?;
        cycle.reset();
        self.slot = Slot::Idle(cycle);

        result
    }

    async fn restore(&mut self) {
        let snapshot = self.snapshot.take();
        if !self.restore_on_stop {
            return;
        }

        let (controller, snapshot) = match (&self.controller, snapshot) {
            (Some(controller), Some(snapshot)) => (controller, snapshot),
            _ => return,
        };

        let result = match LightCommand::restoring(&snapshot) {
            Some(command) => controller.turn_on(&command).await,
            None => controller.turn_off().await,
        };

        match result {
            Ok(()) => info!(state = %snapshot.state, "restored light state"),
            Err(error) => warn!(error = %error, "failed to restore light state"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncHandleError {
    #[error("the sampling loop supervisor is no longer running")]
    Dropped,
}

impl<T> From<mpsc::error::SendError<T>> for SyncHandleError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        Self::Dropped
    }
}

impl From<oneshot::error::RecvError> for SyncHandleError {
    fn from(_: oneshot::error::RecvError) -> Self {
        Self::Dropped
    }
}

/// Control surface of a [Supervisor]
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<ControlMessage>,
    running: Arc<AtomicBool>,
}

impl SyncHandle {
    /// Send `command` to the supervisor, returning the state after it was processed
    pub async fn send(&self, command: Command) -> Result<RunState, SyncHandleError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ControlMessage { command, reply }).await?;
        Ok(rx.await?)
    }

    pub async fn start(&self) -> Result<RunState, SyncHandleError> {
        self.send(Command::Start).await
    }

    pub async fn stop(&self) -> Result<RunState, SyncHandleError> {
        self.send(Command::Stop).await
    }

    pub async fn quit(&self) -> Result<RunState, SyncHandleError> {
        self.send(Command::Quit).await
    }

    pub fn state(&self) -> RunState {
        self.running.load(Ordering::SeqCst).into()
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("state", &self.state())
            .finish()
    }
}
