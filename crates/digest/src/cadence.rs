use std::fmt;
use std::time::Duration;

use feedpulse_config::DigestConfig;

/// One of the four fixed digest intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    FiveMin,
    Hourly,
    SixHour,
    Daily,
}

impl Cadence {
    pub const ALL: [Cadence; 4] = [
        Cadence::FiveMin,
        Cadence::Hourly,
        Cadence::SixHour,
        Cadence::Daily,
    ];

    /// Stable tag used for watermark keys, CLI arguments, and digest
    /// headers.
    pub fn label(self) -> &'static str {
        match self {
            Cadence::FiveMin => "5min",
            Cadence::Hourly => "1hour",
            Cadence::SixHour => "6hour",
            Cadence::Daily => "24hour",
        }
    }

    pub fn labels() -> [&'static str; 4] {
        Self::ALL.map(Cadence::label)
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == tag)
    }

    /// Human wording of the window, used in the quiet-window message.
    pub fn window_text(self) -> &'static str {
        match self {
            Cadence::FiveMin => "5 minutes",
            Cadence::Hourly => "hour",
            Cadence::SixHour => "6 hours",
            Cadence::Daily => "24 hours",
        }
    }

    pub fn interval(self, config: &DigestConfig) -> Duration {
        let secs = match self {
            Cadence::FiveMin => config.five_min_secs,
            Cadence::Hourly => config.hourly_secs,
            Cadence::SixHour => config.six_hour_secs,
            Cadence::Daily => config.daily_secs,
        };
        Duration::from_secs(secs)
    }

    /// System instruction paired with the rendered events.
    pub fn instruction(self) -> &'static str {
        match self {
            Cadence::FiveMin => {
                "Briefly summarize the key points of the last 5 minutes of Twitter activity."
            }
            Cadence::Hourly => {
                "Summarize the main Twitter activity and trends of the past hour."
            }
            Cadence::SixHour => {
                "Analyze the past 6 hours of Twitter activity, including hot topics and notable interactions."
            }
            Cadence::Daily => {
                "Summarize the past 24 hours of Twitter activity and analyze how the main topics evolved."
            }
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
