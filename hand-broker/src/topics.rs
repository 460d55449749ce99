use crate::SERVO_COUNT;

pub const DEFAULT_TOPIC_PREFIX: &str = "mao_robotica";

/// What an incoming (or outgoing) topic string means to the hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Single servo command, carries the 1-based channel number
    Servo(u8),
    All,
    Status,
    Heartbeat,
    RequestStatus,
}

/// [`Topics`] is the fixed namespace of broker topics, built once from a
/// prefix at startup and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    servos: [String; SERVO_COUNT],
    all: String,
    status: String,
    heartbeat: String,
    request_status: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            servos: std::array::from_fn(|i| format!("{prefix}/servo{}", i + 1)),
            all: format!("{prefix}/todos"),
            status: format!("{prefix}/status"),
            heartbeat: format!("{prefix}/heartbeat"),
            request_status: format!("{prefix}/request_status"),
        }
    }

    /// Topic for a 1-based servo channel, `None` outside 1..=5
    pub fn servo(&self, channel: u8) -> Option<&str> {
        let idx = usize::from(channel).checked_sub(1)?;
        self.servos.get(idx).map(String::as_str)
    }

    pub fn servos(&self) -> impl Iterator<Item = &str> {
        self.servos.iter().map(String::as_str)
    }

    pub fn all(&self) -> &str {
        &self.all
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn heartbeat(&self) -> &str {
        &self.heartbeat
    }

    pub fn request_status(&self) -> &str {
        &self.request_status
    }

    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        if topic == self.status {
            Some(TopicKind::Status)
        } else if topic == self.heartbeat {
            Some(TopicKind::Heartbeat)
        } else if topic == self.all {
            Some(TopicKind::All)
        } else if topic == self.request_status {
            Some(TopicKind::RequestStatus)
        } else {
            self.servos
                .iter()
                .position(|t| t == topic)
                .map(|i| TopicKind::Servo(i as u8 + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_namespace() {
        let topics = Topics::default();
        assert_eq!(topics.servo(1), Some("mao_robotica/servo1"));
        assert_eq!(topics.servo(5), Some("mao_robotica/servo5"));
        assert_eq!(topics.servo(0), None);
        assert_eq!(topics.servo(6), None);
        assert_eq!(topics.all(), "mao_robotica/todos");
        assert_eq!(topics.status(), "mao_robotica/status");
        assert_eq!(topics.heartbeat(), "mao_robotica/heartbeat");
        assert_eq!(topics.request_status(), "mao_robotica/request_status");
        assert_eq!(topics.servos().count(), 5);
    }

    #[test]
    fn trailing_slash_prefix() {
        let topics = Topics::new("lab/hand/");
        assert_eq!(topics.status(), "lab/hand/status");
    }

    #[test]
    fn classify_topics() {
        let topics = Topics::default();
        assert_eq!(
            topics.classify("mao_robotica/servo3"),
            Some(TopicKind::Servo(3))
        );
        assert_eq!(topics.classify("mao_robotica/todos"), Some(TopicKind::All));
        assert_eq!(
            topics.classify("mao_robotica/status"),
            Some(TopicKind::Status)
        );
        assert_eq!(
            topics.classify("mao_robotica/heartbeat"),
            Some(TopicKind::Heartbeat)
        );
        assert_eq!(
            topics.classify("mao_robotica/request_status"),
            Some(TopicKind::RequestStatus)
        );
        assert_eq!(topics.classify("other/status"), None);
    }
}
