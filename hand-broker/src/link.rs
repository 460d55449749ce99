use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, NetworkOptions, Packet, QoS,
    Transport,
};
use tokio::{sync::mpsc::UnboundedSender, time::Duration};

use crate::{
    config::{BrokerConfig, BrokerUrl, Scheme},
    BrokerError,
};

// Capacity of the rumqttc request queue between client and event loop
const REQUEST_QUEUE_CAP: usize = 32;

/// [`TransportEvent`] is everything the MQTT session reports upward:
/// lifecycle changes and inbound publishes, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Broker accepted the session (CONNACK)
    Connected,
    /// A new connection attempt is about to start
    Reconnecting,
    /// A live session ended
    Closed,
    /// Connect attempt or live session failed, non fatal
    Error(String),
    Message { topic: String, payload: Vec<u8> },
}

impl TransportEvent {
    /// Lifecycle events change connection state, messages do not
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, TransportEvent::Message { .. })
    }
}

/// Trait to allow different implementations of the outbound half of the
/// broker session. Implementations must not block: a publish is either
/// queued or rejected immediately
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError>;
    fn subscribe(&self, topic: &str) -> Result<(), BrokerError>;
}

/// rumqttc backed [`Publisher`]
#[derive(Clone, Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| {
                log::error!("Unable to queue publish to {topic:}: {e:}");
                BrokerError::Rejected(e.to_string())
            })
    }

    fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| {
                log::error!("Unable to queue subscribe to {topic:}: {e:}");
                BrokerError::Rejected(e.to_string())
            })
    }
}

/// [`MqttLink`] owns the rumqttc event loop. The spawned task polls the
/// loop, translates packets and failures into [`TransportEvent`]s and
/// keeps reconnecting at a fixed interval for as long as the receiving
/// side is alive
pub struct MqttLink {
    _handler: tokio::task::JoinHandle<()>,
}

impl MqttLink {
    pub fn new(
        config: &BrokerConfig,
        sender: UnboundedSender<TransportEvent>,
    ) -> Result<(Self, MqttPublisher), BrokerError> {
        let (client, eventloop) = Self::session(config)?;
        let reconnect = config.reconnect_interval;

        log::info!(
            "Starting MQTT session {} against {}",
            config.client_id,
            config.url
        );
        let _handler = tokio::spawn(async move {
            Self::poll_loop(eventloop, sender, reconnect).await;
            log::warn!("MQTT link task exiting");
        });

        Ok((Self { _handler }, MqttPublisher { client }))
    }

    fn session(config: &BrokerConfig) -> Result<(AsyncClient, EventLoop), BrokerError> {
        let url = BrokerUrl::parse(&config.url)?;

        let mut options = MqttOptions::new(config.client_id.clone(), url.options_host(), url.port);
        options
            .set_clean_session(config.clean_session)
            .set_keep_alive(config.keep_alive);

        match url.scheme {
            Scheme::Wss => {
                options.set_transport(Transport::wss_with_default_config());
            }
            Scheme::Ws => {
                options.set_transport(Transport::Ws);
            }
            Scheme::Tcp => {}
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAP);

        let mut network = NetworkOptions::new();
        // rumqttc only takes whole seconds
        network.set_connection_timeout(config.connect_timeout.as_secs().max(1));
        eventloop.set_network_options(network);

        Ok((client, eventloop))
    }

    async fn poll_loop(
        mut eventloop: EventLoop,
        sender: UnboundedSender<TransportEvent>,
        reconnect: Duration,
    ) {
        let mut session_up = false;
        loop {
            tokio::select! {
                _ = sender.closed() => {
                    log::debug!("Event receiver dropped, stopping MQTT poll loop");
                    break;
                }
                polled = eventloop.poll() => {
                    let events = Self::translate(polled, &mut session_up);
                    // rumqttc dials again on the next poll after a failure
                    let failed = events.iter().any(|e| matches!(e, TransportEvent::Error(_)));
                    for event in events {
                        log::trace!("transport event {event:?}");
                        sender.send(event).ok();
                    }

                    if failed && !sender.is_closed() {
                        tokio::time::sleep(reconnect).await;
                        sender.send(TransportEvent::Reconnecting).ok();
                    }
                }
            }
        }
    }

    fn translate(
        polled: Result<Event, ConnectionError>,
        session_up: &mut bool,
    ) -> Vec<TransportEvent> {
        match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                log::info!("Connected to broker, session present {}", ack.session_present);
                *session_up = true;
                vec![TransportEvent::Connected]
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                vec![TransportEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                }]
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                log::warn!("Broker sent disconnect");
                *session_up = false;
                vec![TransportEvent::Closed]
            }
            Ok(_) => vec![],
            Err(e) => {
                log::error!("MQTT connection error: {e:}");
                let mut events = vec![TransportEvent::Error(e.to_string())];
                if *session_up {
                    *session_up = false;
                    events.push(TransportEvent::Closed);
                }
                events
            }
        }
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self._handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};

    #[test]
    fn translate_connack() {
        let mut up = false;
        let events = MqttLink::translate(
            Ok(Event::Incoming(Packet::ConnAck(ConnAck::new(
                ConnectReturnCode::Success,
                false,
            )))),
            &mut up,
        );
        assert!(up);
        assert_eq!(events, vec![TransportEvent::Connected]);
    }

    #[test]
    fn translate_publish() {
        let mut up = true;
        let publish = Publish::new("mao_robotica/status", QoS::AtMostOnce, "1,0,1,0,0");
        let events = MqttLink::translate(Ok(Event::Incoming(Packet::Publish(publish))), &mut up);
        assert_eq!(
            events,
            vec![TransportEvent::Message {
                topic: "mao_robotica/status".to_string(),
                payload: b"1,0,1,0,0".to_vec(),
            }]
        );
        assert!(events.iter().all(|e| !e.is_lifecycle()));
    }

    #[test]
    fn translate_error_closes_live_session() {
        let mut up = true;
        let events = MqttLink::translate(Err(ConnectionError::RequestsDone), &mut up);
        assert!(!up);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TransportEvent::Error(_)));
        assert_eq!(events[1], TransportEvent::Closed);

        // A failed attempt without a session only reports the error
        let events = MqttLink::translate(Err(ConnectionError::RequestsDone), &mut up);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TransportEvent::Error(_)));
    }

    #[test]
    fn translate_disconnect() {
        let mut up = true;
        let events = MqttLink::translate(Ok(Event::Incoming(Packet::Disconnect)), &mut up);
        assert!(!up);
        assert_eq!(events, vec![TransportEvent::Closed]);
    }

    #[tokio::test]
    async fn publisher_queues_without_blocking() {
        let config = BrokerConfig {
            url: "mqtt://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let (client, _eventloop) = MqttLink::session(&config).expect("session builds");
        let publisher = MqttPublisher { client };
        publisher
            .publish("mao_robotica/servo1", "1")
            .expect("publish queued");
        publisher
            .subscribe("mao_robotica/status")
            .expect("subscribe queued");
    }
}
