//! Stream controller: the per-session state machine
//!
//! The controller owns every piece of mutable session state (filter history,
//! both buffers, the cadence counter and the last published metrics). Each
//! transport event or control action is handled synchronously and produces an
//! [`Outcome`] describing what the presentation side should update.

use crate::buffers::{AnalysisWindow, DisplayBuffer};
use crate::config::MonitorConfig;
use crate::filters::SampleFilter;
use crate::metrics::MetricsEstimator;
use chrono::Utc;
use ecg_core::{
    EcgError, EcgResult, LinkStatus, MetricsSnapshot, RawSample, SampleKind, SessionId,
    TransportEvent,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    /// No active connection
    Idle,
    /// Receiving and processing samples
    Active,
    /// Connected, but samples are discarded
    Paused,
}

/// User-initiated control actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Switch between Active and Paused
    TogglePause,
    /// Clear all session state and return to Idle
    Reset,
    /// Leave the connection
    Disconnect,
}

/// Anything the controller reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Transport(TransportEvent),
    Control(ControlAction),
}

impl From<TransportEvent> for StreamEvent {
    fn from(event: TransportEvent) -> Self {
        StreamEvent::Transport(event)
    }
}

impl From<ControlAction> for StreamEvent {
    fn from(action: ControlAction) -> Self {
        StreamEvent::Control(action)
    }
}

/// What changed while handling one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Status to show, if the event carries one
    pub status: Option<LinkStatus>,
    /// Newly published metrics
    pub metrics: Option<MetricsSnapshot>,
    /// The display buffer changed and should be redrawn
    pub redraw: bool,
    /// Sample discarded with a warning
    pub rejected: Option<EcgError>,
    /// Session state was cleared
    pub reset: bool,
}

impl Outcome {
    fn status(status: LinkStatus) -> Self {
        Outcome {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Whether nothing observable happened
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.metrics.is_none()
            && !self.redraw
            && self.rejected.is_none()
            && !self.reset
    }
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Samples that went through the filter
    pub accepted: u64,
    /// Disconnect sentinels received while active
    pub disconnect_signals: u64,
    /// Out-of-range samples discarded
    pub rejected: u64,
    /// Published metrics snapshots
    pub evaluations: u64,
    /// Cadence ticks skipped for lack of data
    pub skipped_evaluations: u64,
}

/// Mutable state of one monitoring session
#[derive(Debug, Clone)]
struct Session {
    id: SessionId,
    filter: SampleFilter,
    display: DisplayBuffer,
    window: AnalysisWindow,
    since_evaluation: usize,
    latest_metrics: Option<MetricsSnapshot>,
    stats: SessionStats,
}

impl Session {
    fn new(config: &MonitorConfig) -> Self {
        Session {
            id: SessionId::new(),
            filter: SampleFilter::new(config.filter.window_size),
            display: DisplayBuffer::new(config.display.capacity, config.display.baseline),
            window: AnalysisWindow::new(config.analysis.window_capacity),
            since_evaluation: 0,
            latest_metrics: None,
            stats: SessionStats::default(),
        }
    }

    fn reset(&mut self) {
        self.id = SessionId::new();
        self.filter.reset();
        self.display.reset();
        self.window.reset();
        self.since_evaluation = 0;
        self.latest_metrics = None;
        self.stats = SessionStats::default();
    }
}

/// Orchestrates filter, buffers and metrics for one sample stream
#[derive(Debug, Clone)]
pub struct StreamController {
    config: MonitorConfig,
    estimator: MetricsEstimator,
    state: StreamState,
    status: LinkStatus,
    session: Session,
}

impl StreamController {
    /// Create a controller in the Idle state
    pub fn new(config: MonitorConfig) -> EcgResult<Self> {
        config.validate()?;

        let estimator = MetricsEstimator::from_config(&config);
        let session = Session::new(&config);
        info!(session = %session.id, config = %config.name, "stream controller created");

        Ok(StreamController {
            config,
            estimator,
            state: StreamState::Idle,
            status: LinkStatus::Disconnected,
            session,
        })
    }

    /// Handle one event
    pub fn handle(&mut self, event: impl Into<StreamEvent>) -> Outcome {
        match event.into() {
            StreamEvent::Transport(event) => self.on_transport(event),
            StreamEvent::Control(action) => self.on_control(action),
        }
    }

    /// React to a transport lifecycle event or sample
    pub fn on_transport(&mut self, event: TransportEvent) -> Outcome {
        match event {
            TransportEvent::Connecting => {
                self.transition(StreamState::Idle);
                self.set_status(LinkStatus::Connecting)
            }
            TransportEvent::Opened => {
                if self.state == StreamState::Idle {
                    self.transition(StreamState::Active);
                }
                self.set_status(LinkStatus::Connected)
            }
            TransportEvent::Closed => {
                self.transition(StreamState::Idle);
                self.set_status(LinkStatus::Disconnected)
            }
            TransportEvent::Errored(reason) => {
                warn!(session = %self.session.id, %reason, "transport error");
                self.transition(StreamState::Idle);
                self.set_status(LinkStatus::Error)
            }
            TransportEvent::Sample(raw) => self.on_sample(raw),
        }
    }

    /// React to a user control
    pub fn on_control(&mut self, action: ControlAction) -> Outcome {
        match action {
            ControlAction::TogglePause => match self.state {
                StreamState::Active => {
                    self.transition(StreamState::Paused);
                    Outcome::default()
                }
                StreamState::Paused => {
                    self.transition(StreamState::Active);
                    Outcome::default()
                }
                StreamState::Idle => {
                    debug!(session = %self.session.id, "pause ignored while idle");
                    Outcome::default()
                }
            },
            ControlAction::Disconnect => {
                if self.state == StreamState::Idle {
                    return Outcome::default();
                }
                self.transition(StreamState::Idle);
                self.set_status(LinkStatus::Disconnected)
            }
            ControlAction::Reset => {
                let previous = self.session.id;
                self.session.reset();
                self.transition(StreamState::Idle);
                info!(previous = %previous, session = %self.session.id, "session reset");

                let mut outcome = self.set_status(LinkStatus::Disconnected);
                outcome.redraw = true;
                outcome.reset = true;
                outcome
            }
        }
    }

    /// Per-sample protocol, only while Active
    fn on_sample(&mut self, raw: RawSample) -> Outcome {
        match self.state {
            StreamState::Active => {}
            StreamState::Paused => return Outcome::default(),
            StreamState::Idle => {
                debug!(session = %self.session.id, raw, "sample ignored while idle");
                return Outcome::default();
            }
        }

        match self.config.sample_range.classify(raw) {
            SampleKind::Disconnected => {
                self.session.stats.disconnect_signals += 1;
                if self.status != LinkStatus::Disconnected {
                    warn!(session = %self.session.id, "electrodes disconnected");
                }
                self.set_status(LinkStatus::Disconnected)
            }
            SampleKind::OutOfRange(value) => {
                self.session.stats.rejected += 1;
                let error = self.config.sample_range.reject(value);
                warn!(session = %self.session.id, value, "{}", error);
                Outcome {
                    rejected: Some(error),
                    ..Default::default()
                }
            }
            SampleKind::Signal(value) => {
                let mut outcome = self.set_status(LinkStatus::Connected);
                outcome.metrics = self.accept(value);
                outcome.redraw = true;
                outcome
            }
        }
    }

    /// Filter, buffer, and evaluate on cadence
    fn accept(&mut self, raw: RawSample) -> Option<MetricsSnapshot> {
        let session = &mut self.session;
        let smoothed = session.filter.admit(raw);
        session.display.push(smoothed);
        session.window.push(smoothed);
        session.stats.accepted += 1;
        session.since_evaluation += 1;

        if session.since_evaluation < self.config.analysis.cadence {
            return None;
        }
        session.since_evaluation = 0;

        match self.estimator.try_evaluate(session.window.as_slice()) {
            Ok(snapshot) => {
                let snapshot = snapshot.stamped(Utc::now());
                session.stats.evaluations += 1;
                debug!(
                    session = %session.id,
                    bpm = snapshot.heart_rate_bpm,
                    amplitude = snapshot.amplitude,
                    quality = %snapshot.quality,
                    "metrics published"
                );
                session.latest_metrics = Some(snapshot.clone());
                Some(snapshot)
            }
            Err(e) => {
                session.stats.skipped_evaluations += 1;
                if e.is_silent() {
                    debug!(session = %session.id, "metrics skipped: {}", e);
                } else {
                    warn!(session = %session.id, "metrics evaluation failed: {}", e);
                }
                None
            }
        }
    }

    fn transition(&mut self, next: StreamState) {
        if self.state != next {
            info!(session = %self.session.id, from = ?self.state, to = ?next, "state change");
            self.state = next;
        }
    }

    fn set_status(&mut self, status: LinkStatus) -> Outcome {
        if self.status != status {
            debug!(session = %self.session.id, %status, "status change");
            self.status = status;
        }
        Outcome::status(status)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Pause, reset and zoom are only offered while connected
    pub fn controls_enabled(&self) -> bool {
        self.state != StreamState::Idle
    }

    /// Plot contents, oldest first
    pub fn display_snapshot(&self) -> Vec<RawSample> {
        self.session.display.snapshot_in_order()
    }

    /// Analysis window contents, oldest first
    pub fn analysis_snapshot(&self) -> Vec<RawSample> {
        self.session.window.snapshot_in_order()
    }

    /// Raw samples retained by the smoothing filter
    pub fn filter_history(&self) -> Vec<RawSample> {
        self.session.filter.history()
    }

    /// Last published snapshot of this session
    pub fn latest_metrics(&self) -> Option<&MetricsSnapshot> {
        self.session.latest_metrics.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecg_core::SignalQuality;

    fn active_controller() -> StreamController {
        let mut controller = StreamController::new(MonitorConfig::standard()).unwrap();
        controller.handle(TransportEvent::Opened);
        controller
    }

    fn feed(controller: &mut StreamController, values: &[RawSample]) -> Vec<MetricsSnapshot> {
        values
            .iter()
            .filter_map(|&v| controller.handle(TransportEvent::Sample(v)).metrics)
            .collect()
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut controller = StreamController::new(MonitorConfig::standard()).unwrap();
        assert_eq!(controller.state(), StreamState::Idle);
        assert!(!controller.controls_enabled());

        let outcome = controller.handle(TransportEvent::Connecting);
        assert_eq!(outcome.status, Some(LinkStatus::Connecting));

        controller.handle(TransportEvent::Opened);
        assert_eq!(controller.state(), StreamState::Active);
        assert_eq!(controller.status(), LinkStatus::Connected);
        assert!(controller.controls_enabled());

        controller.handle(ControlAction::TogglePause);
        assert_eq!(controller.state(), StreamState::Paused);
        controller.handle(ControlAction::TogglePause);
        assert_eq!(controller.state(), StreamState::Active);

        let outcome = controller.handle(TransportEvent::Errored("reset by peer".to_string()));
        assert_eq!(outcome.status, Some(LinkStatus::Error));
        assert_eq!(controller.state(), StreamState::Idle);

        controller.handle(TransportEvent::Opened);
        controller.handle(ControlAction::TogglePause);
        controller.handle(TransportEvent::Closed);
        assert_eq!(controller.state(), StreamState::Idle);
        assert_eq!(controller.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn test_explicit_disconnect() {
        let mut controller = active_controller();
        let outcome = controller.handle(ControlAction::Disconnect);
        assert_eq!(outcome.status, Some(LinkStatus::Disconnected));
        assert_eq!(controller.state(), StreamState::Idle);

        assert!(controller.handle(ControlAction::Disconnect).is_empty());
    }

    #[test]
    fn test_pause_ignored_while_idle() {
        let mut controller = StreamController::new(MonitorConfig::standard()).unwrap();
        controller.handle(ControlAction::TogglePause);
        assert_eq!(controller.state(), StreamState::Idle);
    }

    #[test]
    fn test_sample_updates_both_buffers() {
        let mut controller = active_controller();
        let outcome = controller.handle(TransportEvent::Sample(600));

        assert_eq!(outcome.status, Some(LinkStatus::Connected));
        assert!(outcome.redraw);
        assert_eq!(controller.analysis_snapshot(), vec![120]);
        assert_eq!(controller.display_snapshot().last(), Some(&120));
        assert_eq!(controller.display_snapshot().len(), 250);
        assert_eq!(controller.filter_history(), vec![0, 0, 0, 0, 600]);
    }

    #[test]
    fn test_disconnect_sentinel_preserves_state() {
        let mut controller = active_controller();
        feed(&mut controller, &[500, 520, 540]);

        let display = controller.display_snapshot();
        let window = controller.analysis_snapshot();
        let history = controller.filter_history();

        let outcome = controller.handle(TransportEvent::Sample(0));
        assert_eq!(outcome.status, Some(LinkStatus::Disconnected));
        assert!(!outcome.redraw);
        assert_eq!(controller.status(), LinkStatus::Disconnected);
        assert_eq!(controller.state(), StreamState::Active);
        assert_eq!(controller.display_snapshot(), display);
        assert_eq!(controller.analysis_snapshot(), window);
        assert_eq!(controller.filter_history(), history);
        assert_eq!(controller.stats().disconnect_signals, 1);

        let outcome = controller.handle(TransportEvent::Sample(560));
        assert_eq!(outcome.status, Some(LinkStatus::Connected));
    }

    #[test]
    fn test_invalid_sample_is_rejected() {
        let mut controller = active_controller();
        feed(&mut controller, &[500]);
        let window = controller.analysis_snapshot();

        let outcome = controller.handle(TransportEvent::Sample(4096));
        assert_eq!(
            outcome.rejected,
            Some(EcgError::InvalidSample { value: 4096, min: 0, max: 1023 })
        );
        assert!(outcome.status.is_none());
        assert_eq!(controller.analysis_snapshot(), window);
        assert_eq!(controller.stats().rejected, 1);
        assert_eq!(controller.state(), StreamState::Active);
    }

    #[test]
    fn test_paused_discards_samples() {
        let mut controller = active_controller();
        controller.handle(ControlAction::TogglePause);

        assert!(controller.handle(TransportEvent::Sample(700)).is_empty());
        assert!(controller.handle(TransportEvent::Sample(0)).is_empty());
        assert!(controller.analysis_snapshot().is_empty());
        assert_eq!(controller.stats().accepted, 0);
    }

    #[test]
    fn test_idle_discards_samples() {
        let mut controller = StreamController::new(MonitorConfig::standard()).unwrap();
        assert!(controller.handle(TransportEvent::Sample(700)).is_empty());
        assert!(controller.analysis_snapshot().is_empty());
    }

    #[test]
    fn test_metrics_cadence() {
        let mut controller = active_controller();
        let samples: Vec<RawSample> = (0..100).map(|i| if i % 10 < 3 { 800 } else { 450 }).collect();

        let mut published_at = Vec::new();
        for (i, &v) in samples.iter().enumerate() {
            if controller.handle(TransportEvent::Sample(v)).metrics.is_some() {
                published_at.push(i + 1);
            }
        }

        // The tick at 20 is skipped: the window holds fewer than 30 samples
        assert_eq!(published_at, vec![40, 60, 80, 100]);
        assert_eq!(controller.stats().evaluations, 4);
        assert_eq!(controller.stats().skipped_evaluations, 1);
        assert!(controller.latest_metrics().is_some());
    }

    #[test]
    fn test_published_metrics_match_window() {
        let mut controller = active_controller();
        let samples: Vec<RawSample> = (0..40).map(|i| if i % 8 < 2 { 900 } else { 420 }).collect();
        let published = feed(&mut controller, &samples);

        assert_eq!(published.len(), 1);
        let expected = MetricsEstimator::default().evaluate(&controller.analysis_snapshot());
        assert!(published[0].same_metrics(&expected));
        assert!(published[0].published_at.is_some());
        assert_eq!(published[0].quality, SignalQuality::Good);
    }

    #[test]
    fn test_reset_mid_stream() {
        let mut controller = active_controller();
        feed(&mut controller, &(0..35).map(|i| 400 + i * 7).collect::<Vec<_>>());
        assert_ne!(controller.display_snapshot(), vec![512; 250]);
        let before = controller.session_id();

        let outcome = controller.handle(ControlAction::Reset);
        assert!(outcome.reset);
        assert!(outcome.redraw);
        assert_eq!(controller.state(), StreamState::Idle);
        assert_eq!(controller.display_snapshot(), vec![512; 250]);
        assert!(controller.analysis_snapshot().is_empty());
        assert_eq!(controller.filter_history(), vec![0; 5]);
        assert!(controller.latest_metrics().is_none());
        assert_eq!(controller.stats(), SessionStats::default());
        assert_ne!(controller.session_id(), before);
    }

    #[test]
    fn test_reset_restarts_cadence() {
        let mut controller = active_controller();
        feed(&mut controller, &[600; 35]);
        controller.handle(ControlAction::Reset);
        controller.handle(TransportEvent::Opened);

        // 5 samples before the reset must not count toward the next tick
        let published = feed(&mut controller, &[600; 39]);
        assert!(published.is_empty());
        let published = feed(&mut controller, &[600]);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].window_len, 40);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = MonitorConfig::standard();
        config.analysis.cadence = 0;
        assert!(StreamController::new(config).is_err());
    }
}
