//! Per-link frame counters

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HdlcStatistics {
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Frames addressed to another station
    pub frames_skipped: u64,
    /// Frames dropped for a bad HCS or FCS
    pub check_errors: u64,
    /// I-frames whose send sequence was not the expected one
    pub sequence_errors: u64,
}

impl HdlcStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Share of received frames that were rejected, in percent.
    pub fn error_rate(&self) -> f64 {
        let errors = self.check_errors + self.sequence_errors;
        let total = self.frames_received + self.check_errors;
        if total == 0 {
            0.0
        } else {
            errors as f64 * 100.0 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate() {
        let mut stats = HdlcStatistics::new();
        assert_eq!(stats.error_rate(), 0.0);
        stats.frames_received = 3;
        stats.check_errors = 1;
        assert_eq!(stats.error_rate(), 25.0);
        stats.clear();
        assert_eq!(stats, HdlcStatistics::default());
    }
}
