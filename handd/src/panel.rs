use hand_broker::{Publisher, ServoState, TopicKind, Topics, TransportEvent};
use std::sync::Arc;
use tokio::time::Instant;

use crate::{
    connection::{ConnectionTracker, ConnectionView},
    dispatch::{Command, CommandDispatcher, Confirm, DispatchError, Gate, Target},
    liveness::{LivenessTracker, LivenessView},
    servo::{ChannelId, ServoBank, ServoView},
    sync::StateSynchronizer,
    HandPanelError,
};

pub type HandPanelResult<T> = std::result::Result<T, HandPanelError>;

/// Modal popup waiting on the operator. While one is open, key input only
/// answers the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Blocking notification, dismissed with Enter or Esc
    Alert(String),
    /// Device is offline; send this command anyway?
    ConfirmBlind(Command),
}

/// [`HandPanel`] is the single owner of all panel state. Each tracker keeps
/// its own state and is only mutated from the handlers here, which the
/// event loop calls one event at a time
pub struct HandPanel {
    pub running: bool,
    pub selected: usize,
    prompt: Option<Prompt>,
    topics: Topics,
    connection: ConnectionTracker,
    liveness: LivenessTracker,
    servos: ServoBank,
    dispatcher: CommandDispatcher,
    synchronizer: StateSynchronizer,
    publisher: Arc<dyn Publisher>,
}

impl HandPanel {
    pub fn new(topics: Topics, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            running: true,
            selected: 0,
            prompt: None,
            connection: ConnectionTracker::new(topics.clone()),
            liveness: LivenessTracker::default(),
            servos: ServoBank::default(),
            dispatcher: CommandDispatcher::new(topics.clone()),
            synchronizer: StateSynchronizer::default(),
            topics,
            publisher,
        }
    }

    pub fn connect(&mut self) {
        if !self.connection.connect() {
            log::debug!("Broker session already started");
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn handle_transport(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Connected => {
                if let Err(e) = self.connection.on_connected(self.publisher.as_ref()) {
                    log::error!("Error setting up subscriptions {e:}");
                }
            }
            TransportEvent::Error(e) => self.connection.on_error(&e),
            TransportEvent::Closed => {
                self.connection.on_closed();
                // a closed transport cannot be carrying heartbeats
                self.liveness.force_offline();
            }
            TransportEvent::Reconnecting => self.connection.on_reconnecting(),
            TransportEvent::Message { topic, payload } => {
                log::debug!(
                    "Message received [{topic}]: {}",
                    String::from_utf8_lossy(&payload)
                );
                match self.topics.classify(&topic) {
                    Some(TopicKind::Status) => {
                        self.liveness.register_heartbeat(now);
                        self.synchronizer
                            .apply_status_message(&payload, &mut self.servos)
                            .ok();
                    }
                    Some(TopicKind::Heartbeat) => self.liveness.register_heartbeat(now),
                    _ => log::trace!("Ignoring message on {topic}"),
                }
            }
        }
    }

    /// Periodic tick, also fires the liveness decay if it is due
    pub fn tick(&mut self, now: Instant) {
        self.liveness.expire(now);
    }

    pub fn liveness_deadline(&self) -> Option<Instant> {
        self.liveness.deadline()
    }

    pub fn expire_liveness(&mut self, now: Instant) -> bool {
        self.liveness.expire(now)
    }

    pub fn toggle_servo(&mut self, channel: ChannelId) {
        let state = self.servos.get(channel).state().toggled();
        self.set_servo(channel, state);
    }

    pub fn set_servo(&mut self, channel: ChannelId, state: ServoState) {
        self.submit(
            Command {
                target: Target::Servo(channel),
                state,
            },
            Confirm::Unconfirmed,
        );
    }

    pub fn toggle_selected(&mut self) {
        if let Some(channel) = ChannelId::from_index(self.selected) {
            self.toggle_servo(channel);
        }
    }

    pub fn set_all(&mut self, state: ServoState) {
        self.submit(
            Command {
                target: Target::All,
                state,
            },
            Confirm::Unconfirmed,
        );
    }

    /// Operator agreed to send the held command while the device is offline
    pub fn confirm_blind(&mut self) {
        if let Some(Prompt::ConfirmBlind(command)) = self.prompt.take() {
            log::info!("Operator confirmed blind send: {command}");
            self.submit(command, Confirm::Blind);
        }
    }

    /// Operator declined: the held command is dropped without side effects
    pub fn decline(&mut self) {
        if let Some(Prompt::ConfirmBlind(command)) = self.prompt.take() {
            log::info!("Operator declined blind send: {command}");
        }
    }

    pub fn dismiss_alert(&mut self) {
        if matches!(self.prompt, Some(Prompt::Alert(_))) {
            self.prompt = None;
        }
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % hand_broker::SERVO_COUNT;
    }

    pub fn select_prev(&mut self) {
        self.selected = self
            .selected
            .checked_sub(1)
            .unwrap_or(hand_broker::SERVO_COUNT - 1);
    }

    fn submit(&mut self, command: Command, confirm: Confirm) {
        let gate = Gate {
            connection: self.connection.state(),
            device_online: self.liveness.is_online(),
        };

        let publisher = self.publisher.as_ref();
        let result = match command.target {
            Target::Servo(channel) => self.dispatcher.toggle_servo(
                gate,
                confirm,
                &mut self.servos,
                publisher,
                channel,
                command.state,
            ),
            Target::All => {
                self.dispatcher
                    .toggle_all(gate, confirm, &mut self.servos, publisher, command.state)
            }
        };

        match result {
            Ok(()) => {}
            Err(DispatchError::NotConnected) => {
                self.prompt = Some(Prompt::Alert(
                    "Error: not connected to the MQTT broker!".to_string(),
                ));
            }
            Err(DispatchError::DeviceOffline(command)) => {
                self.prompt = Some(Prompt::ConfirmBlind(command));
            }
            Err(e @ DispatchError::Transport(_)) => {
                self.prompt = Some(Prompt::Alert(format!("Error: {e:}")));
            }
        }
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn servos(&self) -> &ServoBank {
        &self.servos
    }

    pub fn servo_views(&self) -> Vec<ServoView> {
        self.servos.views()
    }

    pub fn connection_view(&self) -> ConnectionView {
        self.connection.view()
    }

    pub fn liveness_view(&self, now: Instant) -> LivenessView {
        self.liveness.view(now)
    }

    pub fn device_online(&self) -> bool {
        self.liveness.is_online()
    }

    pub fn rejected_reports(&self) -> u64 {
        self.synchronizer.rejected()
    }
}
