//! Stand-in for the hand firmware, for exercising the panel against a live
//! broker: applies servo commands, answers status requests and sends a
//! heartbeat while connected
use clap::Parser;
use hand_broker::{
    BrokerConfig, ClientSubscribe, ClientUnsubscribe, Publisher, ServoState, StatusReport,
    TopicKind, Topics, TransportEvent, SERVO_COUNT,
};
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Simulated robotic hand device")]
struct Args {
    #[arg(long, default_value = "mqtt://localhost:1883")]
    broker: String,

    #[arg(long, default_value = hand_broker::DEFAULT_TOPIC_PREFIX)]
    topic_prefix: String,

    /// Seconds between heartbeats, 0 disables them
    #[arg(long, default_value_t = 3)]
    heartbeat_secs: u64,

    /// Ignore commands, as a device with a jammed servo bus would
    #[arg(long)]
    ignore_commands: bool,
}

/// Servo state as the device sees it
#[derive(Debug, Default)]
struct SimulatedHand {
    states: [ServoState; SERVO_COUNT],
    ignore_commands: bool,
}

impl SimulatedHand {
    /// Returns the report to publish, if the message calls for one
    fn handle(&mut self, kind: TopicKind, payload: &[u8]) -> Option<StatusReport> {
        let command = std::str::from_utf8(payload)
            .ok()
            .and_then(ServoState::from_digit);

        match kind {
            TopicKind::RequestStatus => Some(StatusReport(self.states)),
            TopicKind::Servo(channel) => {
                let state = command?;
                if !self.ignore_commands {
                    let idx = usize::from(channel).checked_sub(1)?;
                    *self.states.get_mut(idx)? = state;
                }
                Some(StatusReport(self.states))
            }
            TopicKind::All => {
                let state = command?;
                if !self.ignore_commands {
                    self.states = [state; SERVO_COUNT];
                }
                Some(StatusReport(self.states))
            }
            TopicKind::Status | TopicKind::Heartbeat => None,
        }
    }
}

fn subscribe_commands(publisher: &dyn Publisher, topics: &Topics) {
    let requested = topics
        .servos()
        .chain([topics.all(), topics.request_status()])
        .map(|t| publisher.subscribe(t))
        .collect::<Result<Vec<_>, _>>();
    if let Err(e) = requested {
        log::error!("Failed to subscribe to command topics {e:}");
    }
}

#[actix::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    log::info!("Initializing simulated hand");
    let topics = Topics::new(&args.topic_prefix);
    let config = BrokerConfig {
        url: args.broker,
        client_id: hand_broker::session_id("sim_mao_robotica_"),
        topics: topics.clone(),
        ..Default::default()
    };

    let (broker_handle, publisher) = hand_broker::broker(&config).await.map_err(|e| {
        log::error!("Error creating broker & handle {e:}");
        e
    })?;

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    broker_handle
        .send(ClientSubscribe {
            id: 0,
            events: events_tx,
        })
        .await
        .map_err(|e| {
            log::error!("Error sending client subscribe request {e:}");
            e
        })??;

    let mut hand = SimulatedHand {
        ignore_commands: args.ignore_commands,
        ..Default::default()
    };
    let mut connected = false;
    let heartbeat_period = Duration::from_secs(args.heartbeat_secs.max(1));
    let mut heartbeat = tokio::time::interval(heartbeat_period);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down simulated hand");
                break;
            }
            _ = heartbeat.tick() => {
                if connected && args.heartbeat_secs > 0 {
                    publisher.publish(topics.heartbeat(), "alive").ok();
                }
            }
            event = events_rx.recv() => {
                let Some(event) = event else {
                    log::warn!("Broker event stream ended");
                    break;
                };
                match event {
                    TransportEvent::Connected => {
                        connected = true;
                        subscribe_commands(&publisher, &topics);
                    }
                    TransportEvent::Closed | TransportEvent::Error(_) => connected = false,
                    TransportEvent::Reconnecting => {}
                    TransportEvent::Message { topic, payload } => {
                        let Some(kind) = topics.classify(&topic) else {
                            continue;
                        };
                        if let Some(report) = hand.handle(kind, &payload) {
                            log::info!("[{topic}] -> status {report}");
                            publisher.publish(topics.status(), &report.to_string()).ok();
                        }
                    }
                }
            }
        }
    }

    broker_handle.send(ClientUnsubscribe { id: 0 }).await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_commands_and_reports() {
        let mut hand = SimulatedHand::default();
        let report = hand.handle(TopicKind::Servo(2), b"1").expect("report");
        assert_eq!(report.to_string(), "0,1,0,0,0");
        let report = hand.handle(TopicKind::All, b"1").expect("report");
        assert_eq!(report.to_string(), "1,1,1,1,1");
        let report = hand.handle(TopicKind::RequestStatus, b"1").expect("report");
        assert_eq!(report.to_string(), "1,1,1,1,1");
    }

    #[test]
    fn ignores_garbage_commands() {
        let mut hand = SimulatedHand::default();
        assert!(hand.handle(TopicKind::Servo(1), b"on").is_none());
        assert!(hand.handle(TopicKind::Servo(9), b"1").is_none());
        assert!(hand.handle(TopicKind::Status, b"1,1,1,1,1").is_none());
    }

    #[test]
    fn jammed_hand_reports_unchanged_state() {
        let mut hand = SimulatedHand {
            ignore_commands: true,
            ..Default::default()
        };
        let report = hand.handle(TopicKind::All, b"1").expect("report");
        assert_eq!(report.to_string(), "0,0,0,0,0");
    }
}
