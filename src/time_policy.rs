/// Vote-window time policy
///
/// The voting window for an event ends at 21:00 club-region time on the day
/// before the event starts. The club region is a fixed UTC+9 offset (no DST),
/// so the conversion is total and deterministic.
use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};

const REGION_OFFSET_SECS: i32 = 9 * 3600;
const CLOSE_HOUR: u32 = 21;

fn region() -> FixedOffset {
    // 9 * 3600 is in range, so this cannot fail
    FixedOffset::east_opt(REGION_OFFSET_SECS).unwrap_or_else(|| {
        unreachable!("UTC+9 is a valid fixed offset")
    })
}

/// Compute the instant at which attendance voting closes for an event
/// starting at `start_at`.
///
/// Takes the calendar date of `start_at` in the club region, steps back one
/// calendar day (rolling over months and years), and pins the wall clock to
/// 21:00 in that region.
pub fn compute_vote_close_at(start_at: DateTime<Utc>) -> DateTime<Utc> {
    let local = start_at.with_timezone(&region());
    let start_date = local.date_naive();
    // checked_sub_days only fails outside chrono's representable range,
    // which no store-supplied instant reaches
    let close_date = start_date
        .checked_sub_days(Days::new(1))
        .unwrap_or(start_date);
    let close_time = NaiveTime::from_hms_opt(CLOSE_HOUR, 0, 0)
        .unwrap_or(NaiveTime::MIN);
    let close_naive = close_date.and_time(close_time);

    // A fixed offset maps every naive local time to exactly one instant
    match region().from_local_datetime(&close_naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // Unreachable for a FixedOffset; keep the ambiguous arms total anyway
        chrono::LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        chrono::LocalResult::None => start_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        region()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_close_is_2100_on_previous_region_day() {
        // Event on day D at 19:00 region time closes D-1 at 21:00
        let start = region_dt(2025, 6, 14, 19, 0);
        assert_eq!(compute_vote_close_at(start), region_dt(2025, 6, 13, 21, 0));
    }

    #[test]
    fn test_close_rolls_over_month_boundary() {
        // Region March 1 00:30 closes Feb 28 21:00
        let start = region_dt(2025, 3, 1, 0, 30);
        assert_eq!(compute_vote_close_at(start), region_dt(2025, 2, 28, 21, 0));
    }

    #[test]
    fn test_close_handles_leap_february() {
        let start = region_dt(2024, 3, 1, 0, 30);
        assert_eq!(compute_vote_close_at(start), region_dt(2024, 2, 29, 21, 0));
    }

    #[test]
    fn test_close_rolls_over_year_boundary() {
        let start = region_dt(2026, 1, 1, 9, 0);
        assert_eq!(compute_vote_close_at(start), region_dt(2025, 12, 31, 21, 0));
    }

    #[test]
    fn test_region_day_differs_from_utc_day() {
        // 2025-06-14 23:00 UTC is already June 15 in the region, so the
        // window closes June 14 at 21:00 region time
        let start = Utc.with_ymd_and_hms(2025, 6, 14, 23, 0, 0).unwrap();
        assert_eq!(compute_vote_close_at(start), region_dt(2025, 6, 14, 21, 0));
    }

    #[test]
    fn test_deterministic() {
        let start = region_dt(2025, 9, 20, 10, 0);
        assert_eq!(compute_vote_close_at(start), compute_vote_close_at(start));
    }
}
