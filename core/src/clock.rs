//! Bot clock. Owns the notion of "now" for every handler.
//!
//! RULE: Handlers never read the system time directly.
//! Tests drive a fixed clock and advance it by hand.

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BotClock {
    /// Wall clock in the host's local time zone.
    System,
    /// Frozen at `now` until advanced.
    Fixed { now: NaiveDateTime },
}

impl BotClock {
    pub fn fixed(now: NaiveDateTime) -> Self {
        Self::Fixed { now }
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            Self::System       => Local::now().naive_local(),
            Self::Fixed { now } => *now,
        }
    }

    /// Move a fixed clock forward. No-op on the system clock.
    pub fn advance(&mut self, by: Duration) {
        if let Self::Fixed { now } = self {
            *now += by;
        }
    }

    /// Jump a fixed clock to an absolute time. No-op on the system clock.
    pub fn set(&mut self, to: NaiveDateTime) {
        if let Self::Fixed { now } = self {
            *now = to;
        }
    }
}

/// Render a remaining span as `1h 2m 3s`, dropping leading zero units.
pub fn format_remaining(span: Duration) -> String {
    let total = span.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    #[test]
    fn fixed_clock_only_moves_when_advanced() {
        let mut clock = BotClock::fixed(noon());
        assert_eq!(clock.now(), noon());
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), noon() + Duration::minutes(90));
    }

    #[test]
    fn remaining_time_formats_hours_when_present() {
        assert_eq!(format_remaining(Duration::seconds(3723)), "1h 2m 3s");
        assert_eq!(format_remaining(Duration::seconds(125)), "2m 5s");
        assert_eq!(format_remaining(Duration::seconds(-4)), "0m 0s");
    }
}
