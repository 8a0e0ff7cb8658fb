//! Daily fire times
//!
//! Backed by a `cron` expression so DST transitions are resolved by the
//! cron crate rather than by local arithmetic.

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;

use super::jobs::Trigger;

/// Fires once a day at a fixed wall-clock time
#[derive(Debug, Clone)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
    schedule: Schedule,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> anyhow::Result<Self> {
        if hour > 23 || minute > 59 {
            anyhow::bail!("Invalid schedule time {:02}:{:02}", hour, minute);
        }

        let schedule = Schedule::from_str(&Self::expression_for(hour, minute))?;
        Ok(Self {
            hour,
            minute,
            schedule,
        })
    }

    /// Cron expression (with seconds) for a daily `hour:minute`
    fn expression_for(hour: u32, minute: u32) -> String {
        format!("0 {} {} * * *", minute, hour)
    }

    pub fn expression(&self) -> String {
        Self::expression_for(self.hour, self.minute)
    }

    /// Next fire instant strictly after `now`, in `now`'s time zone
    pub fn upcoming_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(now).next()
    }
}

impl std::fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Trigger for DailySchedule {
    fn next_delay(&self) -> Option<Duration> {
        let now = Local::now();
        let next = self.upcoming_after(&now)?;
        Some((next - now).to_std().unwrap_or(Duration::ZERO))
    }
}
