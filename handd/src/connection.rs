use hand_broker::{BrokerError, Publisher, Topics};

/// Payload sent once per successful connection to make the device push
/// its current status
pub const REQUEST_STATUS_PAYLOAD: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Global connection indicator as drawn by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionView {
    pub state: ConnectionState,
    pub label: &'static str,
}

/// [`ConnectionTracker`] owns the client to broker lifecycle. It only
/// changes state in response to transport notifications and has no
/// terminal state: for the lifetime of the panel it moves between
/// disconnected, connecting and connected as the transport reports
#[derive(Debug)]
pub struct ConnectionTracker {
    state: ConnectionState,
    label: &'static str,
    session_started: bool,
    topics: Topics,
}

impl ConnectionTracker {
    pub fn new(topics: Topics) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            label: "Disconnected",
            session_started: false,
            topics,
        }
    }

    /// Marks the start of the single broker session. Returns false if a
    /// session was already started, in which case nothing changes
    pub fn connect(&mut self) -> bool {
        if self.session_started {
            return false;
        }
        self.session_started = true;
        self.transition(ConnectionState::Connecting, "Connecting...");
        true
    }

    /// Broker accepted the session: subscribe to the device topics and ask
    /// the device for its authoritative state. Every request is attempted
    /// even if an earlier one is rejected; the first error is returned
    pub fn on_connected(&mut self, publisher: &dyn Publisher) -> Result<(), BrokerError> {
        self.transition(ConnectionState::Connected, "Connected");

        let requests = [
            (self.topics.status(), publisher.subscribe(self.topics.status())),
            (
                self.topics.heartbeat(),
                publisher.subscribe(self.topics.heartbeat()),
            ),
            (
                self.topics.request_status(),
                publisher.publish(self.topics.request_status(), REQUEST_STATUS_PAYLOAD),
            ),
        ];

        let mut first_err = None;
        for (topic, res) in requests {
            match res {
                Ok(()) => log::info!("Requested {topic}"),
                Err(e) => {
                    log::error!("Request on {topic} rejected {e:}");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn on_error(&mut self, err: &str) {
        log::error!("Connection error: {err:}");
        self.transition(ConnectionState::Disconnected, "Connection error");
    }

    pub fn on_closed(&mut self) {
        log::warn!("Connection closed");
        self.transition(ConnectionState::Disconnected, "Disconnected");
    }

    pub fn on_reconnecting(&mut self) {
        log::info!("Reconnecting...");
        self.transition(ConnectionState::Connecting, "Reconnecting...");
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn view(&self) -> ConnectionView {
        ConnectionView {
            state: self.state,
            label: self.label,
        }
    }

    fn transition(&mut self, state: ConnectionState, label: &'static str) {
        if self.state != state {
            log::debug!("Connection state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.label = label;
    }
}
