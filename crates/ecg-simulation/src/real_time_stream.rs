//! Real-time simulated ECG device
//!
//! Emits the same [`TransportEvent`] sequence a physical link produces:
//! `Connecting`, `Opened`, one `Sample` per sample interval, then `Closed`
//! or `Errored`. A single task owns the simulator, so there is no shared
//! state between the timer and the command handler.

use crate::ecg_simulator::{EcgConfig, EcgSimulator};
use crate::signal_patterns::EcgPattern;
use ecg_core::{EcgError, EcgResult, TransportEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, Interval};
use tracing::{debug, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// ECG simulation configuration
    pub ecg_config: EcgConfig,
    /// Capacity of the event channel
    pub buffer_size: usize,
    /// Open the link as soon as the task starts
    pub autostart: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ecg_config: EcgConfig::default(),
            buffer_size: 256,
            autostart: false,
        }
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    /// Open the link and begin sampling
    Start,
    /// Close the link and rewind the waveform
    Stop,
    /// Hold sample output while the link stays open
    Pause,
    Resume,
    UpdateConfig(EcgConfig),
    UpdatePattern(EcgPattern),
    SetDropoutProbability(f32),
    /// Drop the link with a transport error
    Fail(String),
}

/// Real-time ECG signal stream
pub struct RealTimeEcgStream {
    config: StreamConfig,
    simulator: EcgSimulator,
    event_sender: mpsc::Sender<TransportEvent>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    link_open: bool,
    paused: bool,
    samples_sent: u64,
}

impl RealTimeEcgStream {
    /// Create a stream with its event receiver and control handle
    ///
    /// The task ends once every clone of the control handle is dropped.
    pub fn new(
        config: StreamConfig,
    ) -> EcgResult<(Self, mpsc::Receiver<TransportEvent>, mpsc::Sender<StreamCommand>)> {
        let simulator = EcgSimulator::new(config.ecg_config.clone())?;
        let (event_sender, event_receiver) = mpsc::channel(config.buffer_size.max(1));
        let (control_sender, control_receiver) = mpsc::channel(32);

        let stream = RealTimeEcgStream {
            config,
            simulator,
            event_sender,
            control_receiver,
            link_open: false,
            paused: false,
            samples_sent: 0,
        };
        Ok((stream, event_receiver, control_sender))
    }

    /// Get current configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run until the control channel closes or the event receiver is dropped
    pub async fn run(mut self) {
        let mut interval_timer = self.sample_timer();

        info!(
            interval_ms = self.config.ecg_config.sample_interval_ms,
            pattern = self.config.ecg_config.pattern.description(),
            "ECG stream task started"
        );

        if self.config.autostart {
            if let Err(e) = self.open_link().await {
                debug!(error = %e, "ECG stream ended before streaming");
                return;
            }
        }

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    if self.link_open && !self.paused {
                        let sample = self.simulator.next_sample();
                        if let Err(e) = self.emit(TransportEvent::Sample(sample)).await {
                            debug!(error = %e, "ECG stream stopping");
                            break;
                        }
                        self.samples_sent += 1;
                    }
                }

                command = self.control_receiver.recv() => {
                    let Some(command) = command else {
                        debug!("ECG stream control channel closed");
                        break;
                    };
                    if let Err(e) = self.apply(command, &mut interval_timer).await {
                        debug!(error = %e, "ECG stream stopping");
                        break;
                    }
                }
            }
        }

        info!(samples = self.samples_sent, "ECG stream task finished");
    }

    /// Fails only once the event receiver is gone
    async fn apply(&mut self, command: StreamCommand, timer: &mut Interval) -> EcgResult<()> {
        match command {
            StreamCommand::Start => {
                if !self.link_open {
                    return self.open_link().await;
                }
            }
            StreamCommand::Stop => {
                if self.link_open {
                    self.link_open = false;
                    self.simulator.reset_time();
                    info!(samples = self.samples_sent, "ECG stream stopped");
                    return self.emit(TransportEvent::Closed).await;
                }
            }
            StreamCommand::Pause => {
                self.paused = true;
                debug!("ECG stream paused");
            }
            StreamCommand::Resume => {
                self.paused = false;
                debug!("ECG stream resumed");
            }
            StreamCommand::UpdateConfig(ecg_config) => {
                let interval_changed =
                    ecg_config.sample_interval_ms != self.config.ecg_config.sample_interval_ms;
                match self.simulator.update_config(ecg_config.clone()) {
                    Ok(()) => {
                        self.config.ecg_config = ecg_config;
                        if interval_changed {
                            *timer = self.sample_timer();
                        }
                        info!("ECG stream configuration updated");
                    }
                    Err(e) => warn!(error = %e, "Rejected stream configuration"),
                }
            }
            StreamCommand::UpdatePattern(pattern) => {
                self.simulator.set_pattern(pattern);
                self.config.ecg_config.pattern = pattern;
                info!(pattern = pattern.description(), "ECG stream pattern updated");
            }
            StreamCommand::SetDropoutProbability(probability) => {
                match self.simulator.set_dropout_probability(probability) {
                    Ok(()) => {
                        self.config.ecg_config.noise.dropout_prob = probability;
                        debug!(probability, "Dropout probability updated");
                    }
                    Err(e) => warn!(error = %e, "Rejected dropout probability"),
                }
            }
            StreamCommand::Fail(reason) => {
                if self.link_open {
                    self.link_open = false;
                    warn!(%reason, "Simulated transport failure");
                    return self.emit(TransportEvent::Errored(reason)).await;
                }
            }
        }
        Ok(())
    }

    async fn open_link(&mut self) -> EcgResult<()> {
        self.emit(TransportEvent::Connecting).await?;
        self.link_open = true;
        self.paused = false;
        info!("ECG stream started");
        self.emit(TransportEvent::Opened).await
    }

    async fn emit(&self, event: TransportEvent) -> EcgResult<()> {
        self.event_sender
            .send(event)
            .await
            .map_err(|_| EcgError::ChannelClosed { channel: "ECG stream events" })
    }

    fn sample_timer(&self) -> Interval {
        interval(self.config.ecg_config.sample_interval())
    }
}

/// Helper function to create and start a stream in the background
pub fn start_ecg_stream(
    config: StreamConfig,
) -> EcgResult<(mpsc::Receiver<TransportEvent>, mpsc::Sender<StreamCommand>)> {
    let (stream, event_receiver, control_sender) = RealTimeEcgStream::new(config)?;

    tokio::spawn(stream.run());

    Ok((event_receiver, control_sender))
}
