use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

/// Fill a sparse set of date-keyed counts into a dense series covering the
/// trailing `window` days ending `today`, oldest first. Missing days are
/// zero. Callers pass the wall-clock date, so the output depends on
/// (input, window, current date).
pub fn fill_daily_counts(
    records: &[(NaiveDate, i64)],
    window: u32,
    today: NaiveDate,
) -> Vec<(NaiveDate, i64)> {
    fill_daily_records(records.iter().cloned(), window, 0, today)
}

/// Multi-field variant: missing days are synthesized from `zero`, which
/// carries the zero-default for every tracked field. If two records share a
/// date, the later one wins.
pub fn fill_daily_records<T, I>(
    records: I,
    window: u32,
    zero: T,
    today: NaiveDate,
) -> Vec<(NaiveDate, T)>
where
    T: Clone,
    I: IntoIterator<Item = (NaiveDate, T)>,
{
    let mut by_date: HashMap<NaiveDate, T> = HashMap::new();
    for (date, value) in records {
        by_date.insert(date, value);
    }

    let mut filled = Vec::with_capacity(window as usize);
    for offset in (0..i64::from(window)).rev() {
        let day = today - Duration::days(offset);
        let value = by_date.remove(&day).unwrap_or_else(|| zero.clone());
        filled.push((day, value));
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_input_yields_a_full_zero_week() {
        let today = day(2026, 3, 10);
        let filled = fill_daily_counts(&[], 7, today);
        assert_eq!(filled.len(), 7);
        assert_eq!(filled[0].0, day(2026, 3, 4));
        assert_eq!(filled[6].0, today);
        assert!(filled.iter().all(|(_, value)| *value == 0));
    }

    #[test]
    fn value_dated_today_lands_unmodified_in_the_last_slot() {
        let today = day(2026, 3, 10);
        let filled = fill_daily_counts(&[(today, 42)], 7, today);
        assert_eq!(filled[6], (today, 42));
        assert!(filled[..6].iter().all(|(_, value)| *value == 0));
    }

    #[test]
    fn output_is_ordered_oldest_to_newest() {
        let today = day(2026, 3, 10);
        let records = vec![(day(2026, 3, 9), 5), (day(2026, 3, 6), 3)];
        let filled = fill_daily_counts(&records, 7, today);
        let dates: Vec<NaiveDate> = filled.iter().map(|(date, _)| *date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert_eq!(filled[5], (day(2026, 3, 9), 5));
        assert_eq!(filled[2], (day(2026, 3, 6), 3));
    }

    #[test]
    fn later_duplicate_date_overwrites_earlier() {
        let today = day(2026, 3, 10);
        let records = vec![(today, 1), (today, 9)];
        let filled = fill_daily_counts(&records, 7, today);
        assert_eq!(filled[6], (today, 9));
    }

    #[test]
    fn dates_outside_the_window_are_dropped() {
        let today = day(2026, 3, 10);
        let records = vec![(day(2026, 3, 1), 7)];
        let filled = fill_daily_counts(&records, 7, today);
        assert!(filled.iter().all(|(_, value)| *value == 0));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct DayShape {
        reads: i64,
        memos: i64,
    }

    #[test]
    fn multi_field_fill_uses_declared_zero_defaults() {
        let today = day(2026, 3, 10);
        let zero = DayShape { reads: 0, memos: 0 };
        let records = vec![(
            day(2026, 3, 9),
            DayShape {
                reads: 4,
                memos: 1,
            },
        )];
        let filled = fill_daily_records(records, 31, zero.clone(), today);
        assert_eq!(filled.len(), 31);
        assert_eq!(filled[0].0, day(2026, 2, 8));
        assert_eq!(
            filled[29].1,
            DayShape {
                reads: 4,
                memos: 1,
            }
        );
        assert_eq!(filled[30].1, zero);
    }
}
