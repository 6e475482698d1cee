//! Monitor service: runs the stream controller against a live transport
//!
//! One task owns the [`StreamController`]. Transport events and user controls
//! are both funnelled through its `select!` loop, so the controller is never
//! shared and the published updates follow the order events were handled in.

use crate::tcp_source::TcpCommand;
use ecg_core::{EcgResult, LinkStatus, MetricsSnapshot, RawSample, TransportEvent};
use ecg_processing::{ControlAction, MonitorConfig, SessionStats, StreamController, StreamState};
use ecg_simulation::StreamCommand;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Updates for the presentation side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MonitorUpdate {
    /// Link status changed
    Status(LinkStatus),
    /// Controller state changed
    State {
        state: StreamState,
        controls_enabled: bool,
    },
    Metrics(MetricsSnapshot),
    /// Display buffer, oldest first
    Trace(Vec<RawSample>),
}

/// Handle used to act on the transport itself
#[derive(Debug, Clone)]
pub enum Link {
    Simulated(mpsc::Sender<StreamCommand>),
    Tcp(mpsc::Sender<TcpCommand>),
    /// Events are fed externally; controls only affect the controller
    #[cfg(test)]
    Detached,
}

impl Link {
    async fn disconnect(&self) {
        let sent = match self {
            Link::Simulated(commands) => commands.send(StreamCommand::Stop).await.is_ok(),
            Link::Tcp(commands) => commands.send(TcpCommand::Disconnect).await.is_ok(),
            #[cfg(test)]
            Link::Detached => true,
        };
        if !sent {
            warn!("Transport no longer accepts commands");
        }
    }

    async fn reconnect(&self) {
        let sent = match self {
            Link::Simulated(commands) => {
                commands.send(StreamCommand::Stop).await.is_ok()
                    && commands.send(StreamCommand::Start).await.is_ok()
            }
            Link::Tcp(commands) => commands.send(TcpCommand::Connect).await.is_ok(),
            #[cfg(test)]
            Link::Detached => true,
        };
        if !sent {
            warn!("Transport no longer accepts commands");
        }
    }
}

pub struct MonitorService {
    controller: StreamController,
    link: Link,
    events: mpsc::Receiver<TransportEvent>,
    controls: mpsc::Receiver<ControlAction>,
    update_sender: broadcast::Sender<MonitorUpdate>,
    last_status: Option<LinkStatus>,
    last_state: StreamState,
}

impl MonitorService {
    /// Create the service and the handle used to send it control actions
    pub fn new(
        config: MonitorConfig,
        events: mpsc::Receiver<TransportEvent>,
        link: Link,
    ) -> EcgResult<(Self, mpsc::Sender<ControlAction>)> {
        let controller = StreamController::new(config)?;
        let (update_sender, _) = broadcast::channel(256);
        let (control_sender, controls) = mpsc::channel(32);

        let service = MonitorService {
            last_state: controller.state(),
            controller,
            link,
            events,
            controls,
            update_sender,
            last_status: None,
        };
        Ok((service, control_sender))
    }

    /// Get a receiver for presentation updates
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorUpdate> {
        self.update_sender.subscribe()
    }

    /// Main loop; ends when either the transport or the control side goes away
    pub async fn run(mut self) -> SessionStats {
        info!(session = %self.controller.session_id(), "Monitor service started");

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_transport(event),
                    None => {
                        info!("Transport channel closed, stopping monitor service");
                        break;
                    }
                },

                action = self.controls.recv() => match action {
                    Some(action) => self.handle_control(action).await,
                    None => {
                        debug!("Control channel closed, stopping monitor service");
                        break;
                    }
                },
            }
        }

        let stats = self.controller.stats();
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            evaluations = stats.evaluations,
            "Monitor service finished"
        );
        stats
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        let outcome = self.controller.on_transport(event);
        self.publish_outcome(outcome);
    }

    async fn handle_control(&mut self, action: ControlAction) {
        let was_idle = self.controller.state() == StreamState::Idle;
        let outcome = self.controller.on_control(action);
        self.publish_outcome(outcome);

        match action {
            ControlAction::Disconnect if !was_idle => self.link.disconnect().await,
            ControlAction::Reset => self.link.reconnect().await,
            _ => {}
        }
    }

    fn publish_outcome(&mut self, outcome: ecg_processing::Outcome) {
        if let Some(status) = outcome.status {
            if self.last_status != Some(status) {
                self.last_status = Some(status);
                self.publish(MonitorUpdate::Status(status));
            }
        }

        let state = self.controller.state();
        if state != self.last_state {
            self.last_state = state;
            self.publish(MonitorUpdate::State {
                state,
                controls_enabled: self.controller.controls_enabled(),
            });
        }

        if let Some(metrics) = outcome.metrics {
            self.publish(MonitorUpdate::Metrics(metrics));
        }

        if outcome.redraw {
            self.publish(MonitorUpdate::Trace(self.controller.display_snapshot()));
        }
    }

    fn publish(&self, update: MonitorUpdate) {
        // No subscribers is not an error
        let _ = self.update_sender.send(update);
    }
}

/// Helper function to create and start the service in the background
pub fn start_monitor_service(
    config: MonitorConfig,
    events: mpsc::Receiver<TransportEvent>,
    link: Link,
) -> EcgResult<(
    broadcast::Receiver<MonitorUpdate>,
    mpsc::Sender<ControlAction>,
    JoinHandle<SessionStats>,
)> {
    let (service, controls) = MonitorService::new(config, events, link)?;
    let updates = service.subscribe();
    let handle = tokio::spawn(service.run());
    Ok((updates, controls, handle))
}
