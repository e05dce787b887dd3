//! Run clock: one instant per run, used for ages, artifact names, and
//! `time_utc` fields.

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// File-name stamp format, e.g. `20260301-142530`.
pub const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    started_at: DateTime<Utc>,
}

impl RunClock {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Local-time stamp for artifact names.
    pub fn stamp(&self) -> String {
        self.started_at
            .with_timezone(&Local)
            .format(STAMP_FORMAT)
            .to_string()
    }

    pub fn time_utc(&self) -> String {
        self.started_at.to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    /// Hours elapsed from `then` to the start of the run.
    pub fn age_hours(&self, then: DateTime<Utc>) -> f64 {
        let elapsed = self.started_at - then;
        elapsed.num_milliseconds() as f64 / 3_600_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn stamp_shape() {
        let clock = RunClock::now();
        let stamp = clock.stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "-");
        assert!(stamp.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn time_utc_is_rfc3339() {
        let clock = RunClock::at(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(clock.time_utc(), "2026-03-01T12:00:00.000000+00:00");
    }

    #[test]
    fn age_in_hours() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let clock = RunClock::at(start);
        assert_eq!(clock.age_hours(start - Duration::minutes(90)), 1.5);
        assert_eq!(clock.age_hours(start - Duration::hours(30)), 30.0);
    }
}
