use tokio::time::Duration;
use url::Url;

use crate::{BrokerError, Topics};

pub const DEFAULT_BROKER_URL: &str = "wss://broker.hivemq.com:8884/mqtt";
pub const DEFAULT_CLIENT_PREFIX: &str = "web_mao_robotica_";

/// How the MQTT session reaches the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// MQTT over TLS secured WebSocket
    Wss,
    /// MQTT over plain WebSocket
    Ws,
    /// Plain MQTT over TCP, mostly useful against a local broker
    Tcp,
}

/// Parsed broker endpoint. For websocket schemes rumqttc wants the full
/// url as the host, for TCP only the host name. IPv6 hosts are kept
/// without brackets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: Option<String>,
}

impl BrokerUrl {
    pub fn parse(raw: &str) -> Result<Self, BrokerError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|e| BrokerError::Url(format!("{raw:?}: {e:}")))?;

        let (scheme, default_port) = match url.scheme() {
            "wss" => (Scheme::Wss, 8884),
            "ws" => (Scheme::Ws, 80),
            "mqtt" | "tcp" => (Scheme::Tcp, 1883),
            other => return Err(BrokerError::Url(format!("unsupported scheme {other:?}"))),
        };

        if url.fragment().is_some() {
            return Err(BrokerError::Url(format!("fragment not allowed in {raw:?}")));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BrokerError::Url(format!("missing host in {raw:?}")))?;

        // url drops a port equal to the scheme's well-known one (443, 80)
        let port = url
            .port()
            .or_else(|| {
                let known = url.port_or_known_default()?;
                raw.to_ascii_lowercase()
                    .contains(&format!("{host}:{known}"))
                    .then_some(known)
            })
            .unwrap_or(default_port);

        let path = match scheme {
            Scheme::Tcp => String::new(),
            Scheme::Wss | Scheme::Ws => url.path().to_string(),
        };

        Ok(Self {
            scheme,
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            path,
            query: url.query().map(str::to_string),
        })
    }

    /// Host argument handed to [`rumqttc::MqttOptions::new`]
    pub fn options_host(&self) -> String {
        let scheme = match self.scheme {
            Scheme::Tcp => return self.host.clone(),
            Scheme::Wss => "wss",
            Scheme::Ws => "ws",
        };
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let query = self
            .query
            .as_deref()
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        format!("{scheme}://{host}:{}{}{query}", self.port, self.path)
    }
}

/// Fixed connection parameters for one panel session. None of these are
/// negotiated with the broker at runtime
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub client_id: String,
    pub clean_session: bool,
    pub connect_timeout: Duration,
    pub reconnect_interval: Duration,
    pub keep_alive: Duration,
    pub topics: Topics,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BROKER_URL.to_string(),
            client_id: session_id(DEFAULT_CLIENT_PREFIX),
            clean_session: true,
            connect_timeout: Duration::from_millis(4000),
            reconnect_interval: Duration::from_millis(1000),
            keep_alive: Duration::from_secs(30),
            topics: Topics::default(),
        }
    }
}

/// Random per-session client id: prefix followed by 8 hex digits
pub fn session_id(prefix: &str) -> String {
    format!("{prefix}{:08x}", rand::random::<u32>())
}
