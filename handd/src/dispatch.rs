use hand_broker::{BrokerError, Publisher, ServoState, Topics};
use std::fmt;
use thiserror::Error;

use crate::{
    connection::ConnectionState,
    servo::{ChannelId, ServoBank},
};

/// Which servos a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Servo(ChannelId),
    All,
}

/// A user intent, carried through the offline confirmation prompt if needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub target: Target,
    pub state: ServoState,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = if self.state.is_on() {
            "enable"
        } else {
            "disable"
        };
        match self.target {
            Target::Servo(channel) => write!(f, "{action} {channel}"),
            Target::All => write!(f, "{action} all servos"),
        }
    }
}

/// Whether the operator already agreed to send while the device is
/// offline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Unconfirmed,
    Blind,
}

/// Snapshot of the two guards, taken right before dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    pub connection: ConnectionState,
    pub device_online: bool,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Not connected to the MQTT broker")]
    NotConnected,
    #[error("Device appears offline, confirmation needed to {0}")]
    DeviceOffline(Command),
    #[error("Transport Error")]
    Transport(#[from] BrokerError),
}

/// [`CommandDispatcher`] turns user intents into exactly one publish each,
/// after checking the connection and liveness guards in that order. On
/// success the local servo state is updated optimistically; the next status
/// report from the device may overwrite it
#[derive(Debug)]
pub struct CommandDispatcher {
    topics: Topics,
}

impl CommandDispatcher {
    pub fn new(topics: Topics) -> Self {
        Self { topics }
    }

    pub fn toggle_servo(
        &self,
        gate: Gate,
        confirm: Confirm,
        servos: &mut ServoBank,
        publisher: &dyn Publisher,
        channel: ChannelId,
        state: ServoState,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            gate,
            confirm,
            servos,
            publisher,
            Command {
                target: Target::Servo(channel),
                state,
            },
        )
    }

    pub fn toggle_all(
        &self,
        gate: Gate,
        confirm: Confirm,
        servos: &mut ServoBank,
        publisher: &dyn Publisher,
        state: ServoState,
    ) -> Result<(), DispatchError> {
        self.dispatch(
            gate,
            confirm,
            servos,
            publisher,
            Command {
                target: Target::All,
                state,
            },
        )
    }

    fn dispatch(
        &self,
        gate: Gate,
        confirm: Confirm,
        servos: &mut ServoBank,
        publisher: &dyn Publisher,
        command: Command,
    ) -> Result<(), DispatchError> {
        if gate.connection != ConnectionState::Connected {
            log::error!("Cannot {command}: MQTT client not connected");
            return Err(DispatchError::NotConnected);
        }

        if !gate.device_online && confirm == Confirm::Unconfirmed {
            log::warn!("Device offline, holding '{command}' for confirmation");
            return Err(DispatchError::DeviceOffline(command));
        }

        let topic = match command.target {
            Target::Servo(channel) => self
                .topics
                .servo(channel.get())
                .ok_or_else(|| BrokerError::Rejected(format!("no topic for {channel}")))?,
            Target::All => self.topics.all(),
        };

        publisher.publish(topic, command.state.digit())?;
        log::info!("Published: {topic} = {}", command.state);

        match command.target {
            Target::Servo(channel) => servos.set(channel, command.state),
            Target::All => servos.set_all(command.state),
        }
        Ok(())
    }
}
