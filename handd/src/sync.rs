use hand_broker::{StatusError, StatusReport};

use crate::servo::ServoBank;

/// [`StateSynchronizer`] applies status reports broadcast by the device.
/// This is the only path by which the device corrects optimistic local
/// state, so every accepted report overwrites all five channels at once.
///
/// Parsing is strict: a report with the wrong number of tokens or any
/// token other than `0`/`1` is dropped whole and the prior state stays
#[derive(Debug, Default)]
pub struct StateSynchronizer {
    applied: u64,
    rejected: u64,
}

impl StateSynchronizer {
    pub fn apply_status_message(
        &mut self,
        raw: &[u8],
        servos: &mut ServoBank,
    ) -> Result<StatusReport, StatusError> {
        let report = StatusReport::from_payload(raw).map_err(|e| {
            self.rejected += 1;
            log::error!(
                "Discarding status message {:?}: {e:}",
                String::from_utf8_lossy(raw)
            );
            e
        })?;

        servos.apply(&report);
        self.applied += 1;
        log::debug!("Applied device status {report}");
        Ok(report)
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
