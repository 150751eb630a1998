// libs/appointment-cell/src/services/slots.rs
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};

pub const FIRST_SLOT_HOUR: u32 = 8;
pub const CLOSING_HOUR: u32 = 20;
pub const SLOT_MINUTES: u32 = 30;

/// Bookable local start times, 08:00 through 19:30.
pub fn time_slots() -> Vec<NaiveTime> {
    let slots_per_hour = 60 / SLOT_MINUTES;
    (0..(CLOSING_HOUR - FIRST_SLOT_HOUR) * slots_per_hour)
        .filter_map(|i| {
            let hour = FIRST_SLOT_HOUR + i / slots_per_hour;
            let minute = (i % slots_per_hour) * SLOT_MINUTES;
            NaiveTime::from_hms_opt(hour, minute, 0)
        })
        .collect()
}

pub fn is_on_slot(instant: DateTime<Utc>, offset: FixedOffset) -> bool {
    let local = instant.with_timezone(&offset).time();
    time_slots().contains(&local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn grid_has_half_hour_slots_from_eight_to_seven_thirty() {
        let slots = time_slots();
        assert_eq!(slots.len(), 24);
        assert_eq!(slots.first().map(|t| t.format("%H:%M").to_string()), Some("08:00".to_string()));
        assert_eq!(slots.last().map(|t| t.format("%H:%M").to_string()), Some("19:30".to_string()));
    }

    #[test]
    fn recognises_slot_instants() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert!(is_on_slot(Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap(), utc));
        assert!(!is_on_slot(Utc.with_ymd_and_hms(2024, 1, 3, 9, 15, 0).unwrap(), utc));
        assert!(!is_on_slot(Utc.with_ymd_and_hms(2024, 1, 3, 20, 0, 0).unwrap(), utc));
        assert!(!is_on_slot(Utc.with_ymd_and_hms(2024, 1, 3, 7, 30, 0).unwrap(), utc));
    }

    #[test]
    fn slot_check_uses_local_offset() {
        let brasilia = FixedOffset::west_opt(3 * 3600).unwrap();
        // 12:00 UTC is 09:00 local.
        assert!(is_on_slot(Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap(), brasilia));
        // 23:00 UTC is 20:00 local, after closing.
        assert!(!is_on_slot(Utc.with_ymd_and_hms(2024, 1, 3, 23, 0, 0).unwrap(), brasilia));
    }
}
