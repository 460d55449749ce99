//! TUI front end for operating the five servo robotic hand over MQTT, as
//! part of the hand control panel system. Tracks broker connectivity and
//! device liveness, dispatches servo commands and keeps the displayed
//! servo state in sync with what the device reports

pub mod connection;
pub mod dispatch;
pub mod event;
pub mod liveness;
pub mod panel;
pub mod servo;
pub mod sync;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

use hand_broker::BrokerError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandPanelError {
    #[error("I/O Error")]
    Io(#[from] std::io::Error),
    #[error("Broker Error")]
    BrokerError(#[from] BrokerError),
    #[error("Actix mailbox Error")]
    MailError(#[from] actix::MailboxError),
    #[error("Event Handling Error")]
    EventError,
}
