//! Payload codec for the hand topics. Every payload is plain UTF-8 text:
//! servo commands are a single digit, status reports are five comma
//! separated digits in channel order
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::SERVO_COUNT;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Status payload is not valid utf8")]
    Utf8,
    #[error("Expected 5 status tokens, got {0}")]
    TokenCount(usize),
    #[error("Bad status token {token:?} at position {index}")]
    BadToken { index: usize, token: String },
}

/// Binary position of a single servo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ServoState {
    #[default]
    Off,
    On,
}

impl ServoState {
    pub fn from_digit(token: &str) -> Option<Self> {
        match token.trim() {
            "0" => Some(ServoState::Off),
            "1" => Some(ServoState::On),
            _ => None,
        }
    }

    pub fn digit(self) -> &'static str {
        match self {
            ServoState::Off => "0",
            ServoState::On => "1",
        }
    }

    pub fn is_on(self) -> bool {
        self == ServoState::On
    }

    pub fn toggled(self) -> Self {
        match self {
            ServoState::Off => ServoState::On,
            ServoState::On => ServoState::Off,
        }
    }
}

impl From<bool> for ServoState {
    fn from(on: bool) -> Self {
        if on {
            ServoState::On
        } else {
            ServoState::Off
        }
    }
}

impl fmt::Display for ServoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.digit())
    }
}

/// Authoritative snapshot of all five servos as broadcast by the device,
/// index 0 holds channel 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport(pub [ServoState; SERVO_COUNT]);

impl StatusReport {
    pub fn from_payload(payload: &[u8]) -> Result<Self, StatusError> {
        std::str::from_utf8(payload)
            .map_err(|_| StatusError::Utf8)?
            .parse()
    }

    pub fn states(&self) -> &[ServoState; SERVO_COUNT] {
        &self.0
    }
}

impl FromStr for StatusReport {
    type Err = StatusError;

    // No partial results: either all five tokens are valid or nothing is
    // returned
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tokens = raw.trim().split(',').collect::<Vec<_>>();
        if tokens.len() != SERVO_COUNT {
            return Err(StatusError::TokenCount(tokens.len()));
        }

        let mut states = [ServoState::Off; SERVO_COUNT];
        for (index, token) in tokens.iter().enumerate() {
            states[index] = ServoState::from_digit(token).ok_or_else(|| StatusError::BadToken {
                index,
                token: token.to_string(),
            })?;
        }
        Ok(Self(states))
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.iter().map(|s| s.digit()).collect::<Vec<_>>();
        f.write_str(&digits.join(","))
    }
}
