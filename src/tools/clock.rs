use chrono::{prelude::*, SecondsFormat};

pub static SECONDS_IN_HOUR: u64 = 3600;

pub fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

/// Milliseconds since epoch, the unit of every `created` column
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub trait Clock {
    fn print(&self) -> String;
}

impl<T> Clock for DateTime<T> where T: chrono::TimeZone, T::Offset: std::fmt::Display {
    fn print(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
