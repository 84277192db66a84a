use std::time::SystemTime;

use chrono::{DateTime, Local};

pub fn system_time_to_string(system_time: SystemTime) -> String {
    let datetime: DateTime<Local> = system_time.into();
    // Format the datetime as a string, e.g. "2021-01-01 12:00:00"
    // The default datetime.to_string() call includes fractional seconds
    // and the timezone, which we don't want.
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn now_string() -> String {
    system_time_to_string(SystemTime::now())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn formats_without_fractions_or_zone() {
        let formatted = system_time_to_string(UNIX_EPOCH + Duration::from_millis(1_500));
        assert_eq!(formatted.len(), "2021-01-01 12:00:00".len());
        assert!(!formatted.contains('.'));
    }
}
