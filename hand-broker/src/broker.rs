use actix::{prelude::*, Actor, Addr};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{BrokerConfig, ClientId, MqttLink, MqttPublisher, TransportEvent};

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Invalid broker url: {0}")]
    Url(String),
    #[error("MQTT client rejected request: {0}")]
    Rejected(String),
    #[error("ActorError")]
    ActorError,
}

/// [`Broker`] fans transport events out to every subscribed client, in the
/// order the MQTT link delivered them
pub struct Broker {
    _link: MqttLink,
    receiver: UnboundedReceiver<TransportEvent>,
    subscribers: HashMap<ClientId, UnboundedSender<TransportEvent>>,
    subscription_receiver: UnboundedReceiver<ClientApi>,
    /// Most recent lifecycle event, replayed to late subscribers so they
    /// start from the current connection state
    last_lifecycle: Option<TransportEvent>,
}

/// The [`BrokerHandle`] provides clients a minimal handle exposing only the
/// client subscription API of the [`Broker`]. This handle enables
/// subscription to transport events by the client (as well as unsubscribing)
pub struct BrokerHandle(UnboundedSender<ClientApi>);

pub enum ClientApi {
    Subscribe {
        id: ClientId,
        events: UnboundedSender<TransportEvent>,
    },
    Unsubscribe {
        id: ClientId,
    },
}

/// Public client API for instantiating a [`Broker`]. Returns to the caller a
/// [`BrokerHandle`] with which the client can subscribe or unsubscribe via
/// [`ClientApi`], and the [`MqttPublisher`] for the outbound direction
pub async fn broker(
    config: &BrokerConfig,
) -> Result<(Addr<BrokerHandle>, MqttPublisher), BrokerError> {
    let (link_tx, link_rx) = unbounded_channel();
    let (link, publisher) = MqttLink::new(config, link_tx)?;

    let (mut broker, handle) = Broker::new(link, link_rx);

    tokio::spawn(async move {
        broker.event_loop().await;
        log::warn!("Broker exiting event loop");
    });
    let handle = handle.start();

    Ok((handle, publisher))
}

impl Broker {
    fn new(link: MqttLink, receiver: UnboundedReceiver<TransportEvent>) -> (Self, BrokerHandle) {
        let (handle_sender, subscription_receiver) = unbounded_channel();
        (
            Self {
                _link: link,
                receiver,
                subscribers: HashMap::new(),
                subscription_receiver,
                last_lifecycle: None,
            },
            BrokerHandle(handle_sender),
        )
    }

    async fn event_loop(&mut self) {
        loop {
            tokio::select! {
                incoming = self.receiver.recv() => {
                    match incoming {
                        Some(event) => self.fan_out(event),
                        None => {
                            log::warn!("MQTT link closed its event queue");
                            break;
                        }
                    }
                }
                Some(msg) = self.subscription_receiver.recv() => {
                    self.handle_client_api(msg);
                }
            };
        }
    }

    fn fan_out(&mut self, event: TransportEvent) {
        if event.is_lifecycle() {
            self.last_lifecycle = Some(event.clone());
        }

        self.subscribers.retain(|key, val| {
            val.send(event.clone())
                .map_err(|e| {
                    log::error!(
                        "Failure to send to client event receiver {e:} for client ID {key:}, \
                        dropping subscriber"
                    );
                })
                .is_ok()
        });
    }

    fn handle_client_api(&mut self, msg: ClientApi) {
        match msg {
            ClientApi::Subscribe { id, events } => {
                if let Some(last) = &self.last_lifecycle {
                    events.send(last.clone()).ok();
                }
                self.subscribers.insert(id, events);
                log::debug!("Subscribed client ID {id:}");
            }
            ClientApi::Unsubscribe { id } => {
                if self.subscribers.remove(&id).is_none() {
                    log::warn!("Removing non-existent subscriber ID {id:}");
                } else {
                    log::debug!("Unsubscribed client ID {id:}");
                }
            }
        }
    }
}

impl Actor for BrokerHandle {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "ClientSubscribeResponse")]
pub struct ClientSubscribe {
    pub id: ClientId,
    pub events: UnboundedSender<TransportEvent>,
}
type ClientSubscribeResponse = Result<(), BrokerError>;

impl Handler<ClientSubscribe> for BrokerHandle {
    type Result = ClientSubscribeResponse;

    fn handle(&mut self, msg: ClientSubscribe, _ctx: &mut Self::Context) -> Self::Result {
        self.0
            .send(ClientApi::Subscribe {
                id: msg.id,
                events: msg.events,
            })
            .map_err(|e| {
                log::error!("Error sending sub to actor {e:}");
                BrokerError::ActorError
            })?;
        Ok(())
    }
}

#[derive(Message)]
#[rtype(result = "ClientUnsubscribeResponse")]
pub struct ClientUnsubscribe {
    pub id: ClientId,
}

type ClientUnsubscribeResponse = Result<(), BrokerError>;

impl Handler<ClientUnsubscribe> for BrokerHandle {
    type Result = ClientUnsubscribeResponse;

    fn handle(&mut self, msg: ClientUnsubscribe, _ctx: &mut Self::Context) -> Self::Result {
        self.0
            .send(ClientApi::Unsubscribe { id: msg.id })
            .map_err(|e| {
                log::error!("Error sending unsub to actor {e:}");
                BrokerError::ActorError
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_broker() -> (Broker, UnboundedSender<TransportEvent>) {
        let config = BrokerConfig {
            url: "mqtt://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        // The link task only ever talks to its own (unused) queue here
        let (link_tx, _link_rx) = unbounded_channel();
        let (link, _publisher) = MqttLink::new(&config, link_tx).expect("link builds");
        let (tx, rx) = unbounded_channel();
        let (broker, _handle) = Broker::new(link, rx);
        (broker, tx)
    }

    #[tokio::test]
    async fn fan_out_to_all_subscribers() {
        let (mut broker, _tx) = test_broker();
        let (a_tx, mut a_rx) = unbounded_channel();
        let (b_tx, mut b_rx) = unbounded_channel();
        broker.handle_client_api(ClientApi::Subscribe { id: 0, events: a_tx });
        broker.handle_client_api(ClientApi::Subscribe { id: 1, events: b_tx });

        broker.fan_out(TransportEvent::Connected);
        broker.fan_out(TransportEvent::Message {
            topic: "mao_robotica/heartbeat".to_string(),
            payload: vec![],
        });

        for rx in [&mut a_rx, &mut b_rx] {
            assert_eq!(rx.recv().await, Some(TransportEvent::Connected));
            assert!(matches!(
                rx.recv().await,
                Some(TransportEvent::Message { .. })
            ));
        }
    }

    #[tokio::test]
    async fn late_subscriber_gets_last_lifecycle_event() {
        let (mut broker, _tx) = test_broker();
        broker.fan_out(TransportEvent::Connected);
        broker.fan_out(TransportEvent::Message {
            topic: "mao_robotica/status".to_string(),
            payload: b"0,0,0,0,0".to_vec(),
        });

        let (late_tx, mut late_rx) = unbounded_channel();
        broker.handle_client_api(ClientApi::Subscribe {
            id: 7,
            events: late_tx,
        });
        assert_eq!(late_rx.recv().await, Some(TransportEvent::Connected));
        assert!(late_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let (mut broker, _tx) = test_broker();
        let (gone_tx, gone_rx) = unbounded_channel();
        broker.handle_client_api(ClientApi::Subscribe {
            id: 3,
            events: gone_tx,
        });
        drop(gone_rx);

        broker.fan_out(TransportEvent::Reconnecting);
        assert!(broker.subscribers.is_empty());

        broker.handle_client_api(ClientApi::Unsubscribe { id: 3 });
        assert!(broker.subscribers.is_empty());
    }
}
