use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Dispatch state of one washer. Only the availability tracker writes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WasherAvailability {
    pub provider_id: String,
    pub is_online: bool,
    pub is_busy: bool,
    pub daily_wash_limit: i64,
    pub updated_at: DateTime<Utc>,
}

/// Provider listing entry for the public washer directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WasherProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_online: bool,
    pub is_busy: bool,
    pub daily_wash_limit: i64,
}

/// Daily window in which washers may go online, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub utc_offset_minutes: i32,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(17, 30, 0).unwrap_or(NaiveTime::MIN),
            utc_offset_minutes: 0,
        }
    }
}

impl WorkingHours {
    pub fn parse(start: &str, end: &str, utc_offset_minutes: i32) -> anyhow::Result<Self> {
        let start = parse_time(start)?;
        let end = parse_time(end)?;
        if start >= end {
            return Err(anyhow::anyhow!(
                "working hours start {start} must be before end {end}"
            ));
        }
        Ok(Self {
            start,
            end,
            utc_offset_minutes,
        })
    }

    /// Start inclusive, end exclusive.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.naive_utc() + Duration::minutes(self.utc_offset_minutes as i64);
        let time = local.time();
        time >= self.start && time < self.end
    }

    pub fn to_human_readable(&self) -> String {
        format!(
            "{} to {}",
            self.start.format("%-I:%M %p"),
            self.end.format("%-I:%M %p")
        )
    }
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn utc(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_parse_valid_hours() {
        let hours = WorkingHours::parse("08:00", "17:30", 0).unwrap();
        assert_eq!(hours, WorkingHours::default());
    }

    #[test]
    fn test_parse_invalid_time() {
        assert!(WorkingHours::parse("25:00", "17:30", 0).is_err());
        assert!(WorkingHours::parse("08", "17:30", 0).is_err());
        assert!(WorkingHours::parse("08:00", "17:xx", 0).is_err());
    }

    #[test]
    fn test_parse_rejects_inverted_window() {
        assert!(WorkingHours::parse("18:00", "08:00", 0).is_err());
    }

    #[test]
    fn test_contains_within_window() {
        let hours = WorkingHours::default();
        assert!(hours.contains(utc("2025-06-16 08:00")));
        assert!(hours.contains(utc("2025-06-16 12:15")));
        assert!(hours.contains(utc("2025-06-16 17:29")));
    }

    #[test]
    fn test_contains_outside_window() {
        let hours = WorkingHours::default();
        assert!(!hours.contains(utc("2025-06-16 07:59")));
        assert!(!hours.contains(utc("2025-06-16 17:30")));
        assert!(!hours.contains(utc("2025-06-16 23:00")));
    }

    #[test]
    fn test_contains_applies_utc_offset() {
        // UTC+5:30: 03:00 UTC is 08:30 local
        let hours = WorkingHours::parse("08:00", "17:30", 330).unwrap();
        assert!(hours.contains(utc("2025-06-16 03:00")));
        assert!(!hours.contains(utc("2025-06-16 12:30")));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(
            WorkingHours::default().to_human_readable(),
            "8:00 AM to 5:30 PM"
        );
    }
}
