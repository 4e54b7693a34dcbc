use std::time::Duration;

use crate::Percent;
use crate::model::SourceChannel;

/// Tunables of one cashback flow.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Upper bound on a single submission round-trip.
    pub submit_timeout: Duration,
    /// Cashback rate applied to the amount payable.
    pub cashback_percent: Percent,
    pub source_channel: SourceChannel,
}

impl FlowConfig {
    pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_cashback_percent(mut self, percent: Percent) -> Self {
        self.cashback_percent = percent;
        self
    }

    pub fn with_source_channel(mut self, channel: SourceChannel) -> Self {
        self.source_channel = channel;
        self
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Self::DEFAULT_SUBMIT_TIMEOUT,
            cashback_percent: Percent::from_basis_points(500),
            source_channel: SourceChannel::Qrcode,
        }
    }
}
