use hand_broker::{ServoState, StatusReport, SERVO_COUNT};
use std::fmt;

/// Servo angles (degrees) per channel when disabled, index 0 is channel 1
pub const ANGLES_OFF: [u16; SERVO_COUNT] = [0, 180, 0, 180, 180];
/// Servo angles (degrees) per channel when enabled
pub const ANGLES_ON: [u16; SERVO_COUNT] = [180, 40, 180, 0, 0];

/// Needle gauges point straight up at this angle
const NEEDLE_ZERO: i16 = 90;

/// 1-based servo channel, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    pub fn new(channel: u8) -> Option<Self> {
        (1..=SERVO_COUNT as u8)
            .contains(&channel)
            .then_some(Self(channel))
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        u8::try_from(idx + 1).ok().and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn all() -> impl Iterator<Item = ChannelId> {
        (1..=SERVO_COUNT as u8).map(ChannelId)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Servo {}", self.0)
    }
}

/// What the presentation layer needs to draw one servo card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoView {
    pub channel: ChannelId,
    pub active: bool,
    pub label: &'static str,
    pub angle: u16,
    pub needle_rotation: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoChannel {
    id: ChannelId,
    state: ServoState,
    angle_off: u16,
    angle_on: u16,
}

impl ServoChannel {
    fn new(id: ChannelId) -> Self {
        Self {
            id,
            state: ServoState::Off,
            angle_off: ANGLES_OFF[id.index()],
            angle_on: ANGLES_ON[id.index()],
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> ServoState {
        self.state
    }

    pub fn angle(&self) -> u16 {
        match self.state {
            ServoState::On => self.angle_on,
            ServoState::Off => self.angle_off,
        }
    }

    pub fn view(&self) -> ServoView {
        let angle = self.angle();
        ServoView {
            channel: self.id,
            active: self.state.is_on(),
            label: if self.state.is_on() {
                "Enabled"
            } else {
                "Disabled"
            },
            angle,
            needle_rotation: angle as i16 - NEEDLE_ZERO,
        }
    }
}

/// All five channels, created at startup in the off state and never
/// removed during a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoBank {
    channels: [ServoChannel; SERVO_COUNT],
}

impl Default for ServoBank {
    fn default() -> Self {
        Self {
            channels: std::array::from_fn(|i| ServoChannel::new(ChannelId(i as u8 + 1))),
        }
    }
}

impl ServoBank {
    pub fn get(&self, channel: ChannelId) -> &ServoChannel {
        &self.channels[channel.index()]
    }

    pub fn set(&mut self, channel: ChannelId, state: ServoState) {
        self.channels[channel.index()].state = state;
    }

    pub fn set_all(&mut self, state: ServoState) {
        self.channels.iter_mut().for_each(|c| c.state = state);
    }

    /// Overwrite every channel from one authoritative report
    pub fn apply(&mut self, report: &StatusReport) {
        self.channels
            .iter_mut()
            .zip(report.states())
            .for_each(|(c, s)| c.state = *s);
    }

    pub fn states(&self) -> [ServoState; SERVO_COUNT] {
        std::array::from_fn(|i| self.channels[i].state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServoChannel> {
        self.channels.iter()
    }

    pub fn views(&self) -> Vec<ServoView> {
        self.channels.iter().map(ServoChannel::view).collect()
    }
}
