//! The `hand-broker` crate defines the broker layer for the robotic hand
//! control panel. It owns the MQTT session with the pub/sub broker (MQTT
//! over secure WebSocket by default) and turns it into two halves:
//! 1. An inbound stream of [`TransportEvent`]s (connect, close, error,
//!    reconnect attempts and received messages), fanned out by a [`Broker`]
//!    to every client subscribed through the [`BrokerHandle`], an
//!    [`actix::Actor`] object.
//! 2. An outbound [`Publisher`], which queues publishes and subscriptions
//!    without blocking the caller.
//!
//! Reconnection is handled entirely in this layer: after any failure the
//! link waits the configured reconnect interval, reports
//! [`TransportEvent::Reconnecting`] and dials again.
//!
//! The crate also carries the fixed [`Topics`] namespace and the payload
//! codec ([`ServoState`], [`StatusReport`]) shared by the panel and the
//! device simulator.
//!
//! # Examples
//! ```rust,no_run
//! #[actix::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = hand_broker::BrokerConfig::default();
//!     let (broker_handle, _publisher) = hand_broker::broker(&config)
//!         .await
//!         .map_err(|e| {
//!             log::error!("Error creating broker & handle {e:}");
//!             e
//!         })?;
//!
//!     let (events_tx, _events_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     // The provided client ID must be unique for each subscriber
//!     broker_handle
//!         .send(hand_broker::ClientSubscribe {
//!             id: 0,
//!             events: events_tx,
//!         })
//!         .await
//!         .map_err(|e| {
//!             log::error!("Error sending client subscribe request {e:}");
//!             e
//!         })??;
//!     Ok(())
//! }
//! ```

mod broker;
mod config;
mod link;
mod protocol;
mod topics;

pub(crate) use link::MqttLink;

pub use broker::{
    broker, Broker, BrokerError, BrokerHandle, ClientApi, ClientSubscribe, ClientUnsubscribe,
};
pub use config::{
    session_id, BrokerConfig, BrokerUrl, Scheme, DEFAULT_BROKER_URL, DEFAULT_CLIENT_PREFIX,
};
pub use link::{MqttPublisher, Publisher, TransportEvent};
pub use protocol::{ServoState, StatusError, StatusReport};
pub use topics::{TopicKind, Topics, DEFAULT_TOPIC_PREFIX};

/// [`ClientId`] is used with subscribing to broker events
pub type ClientId = u32;

/// Number of servos on the hand, one per finger
pub const SERVO_COUNT: usize = 5;
