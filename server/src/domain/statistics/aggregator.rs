//! Multi-period statistics aggregation
//!
//! Pure functions: given validated records for one content, produce one
//! `PeriodStatistic` per period. Each period covers the records dated from
//! its bucket start through the aggregation date, so passing period-to-date
//! records yields full-bucket figures and passing a single day's records
//! yields that day's figures in every bucket.

use chrono::{Datelike, Days, NaiveDate};

use super::error::StatisticsError;
use crate::data::types::{PeriodKind, PeriodStatistic, WatchRecord};

/// Canonical date of the bucket containing `date`
///
/// The day itself, the Monday on or before it, the 1st of its month, or
/// Jan 1 of its year.
pub fn bucket_date(period: PeriodKind, date: NaiveDate) -> NaiveDate {
    match period {
        PeriodKind::Daily => date,
        PeriodKind::Weekly => {
            let offset = u64::from(date.weekday().num_days_from_monday());
            date.checked_sub_days(Days::new(offset)).unwrap_or(date)
        }
        PeriodKind::Monthly => date.with_day(1).unwrap_or(date),
        PeriodKind::Yearly => date.with_ordinal(1).unwrap_or(date),
    }
}

/// Earliest date any bucket containing `date` starts on
///
/// A week can begin in the previous year, so this is the earlier of the
/// week and year starts.
pub fn period_to_date_start(date: NaiveDate) -> NaiveDate {
    bucket_date(PeriodKind::Weekly, date).min(bucket_date(PeriodKind::Yearly, date))
}

/// Build the statistics of `content_id` for `watched_date`
///
/// Records for other contents or later dates are ignored. No qualifying
/// record on `watched_date` itself means no statistics at all.
/// `accumulated_views` is stamped onto every row unchanged.
pub fn aggregate(
    content_id: &str,
    watched_date: NaiveDate,
    records: &[WatchRecord],
    accumulated_views: i64,
) -> Result<Vec<PeriodStatistic>, StatisticsError> {
    let relevant: Vec<&WatchRecord> = records
        .iter()
        .filter(|r| r.content_id == content_id && r.watched_date <= watched_date)
        .collect();

    if !relevant.iter().any(|r| r.watched_date == watched_date) {
        return Ok(Vec::new());
    }

    PeriodKind::ALL
        .iter()
        .map(|&period| -> Result<PeriodStatistic, StatisticsError> {
            let start = bucket_date(period, watched_date);
            let overflow = |field| StatisticsError::Overflow {
                content_id: content_id.to_string(),
                period,
                field,
            };
            let mut stat = PeriodStatistic {
                content_id: content_id.to_string(),
                period,
                bucket_date: start,
                view_count: 0,
                watch_time_seconds: 0,
                ad_view_count: 0,
                accumulated_views,
            };
            for record in relevant.iter().filter(|r| r.watched_date >= start) {
                stat.view_count += 1;
                stat.watch_time_seconds = stat
                    .watch_time_seconds
                    .checked_add(record.last_viewed_position)
                    .ok_or_else(|| overflow("watch_time_seconds"))?;
                stat.ad_view_count = stat
                    .ad_view_count
                    .checked_add(record.last_ad_view_count)
                    .ok_or_else(|| overflow("ad_view_count"))?;
            }
            Ok(stat)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(member: &str, date: NaiveDate, position: i64, ads: i64) -> WatchRecord {
        WatchRecord {
            member_id: member.to_string(),
            content_id: "c1".to_string(),
            watched_date: date,
            last_viewed_position: position,
            last_ad_view_count: ads,
        }
    }

    fn by_period(stats: &[PeriodStatistic], period: PeriodKind) -> &PeriodStatistic {
        stats.iter().find(|s| s.period == period).unwrap()
    }

    #[test]
    fn test_bucket_derivation() {
        let thursday = ymd(2024, 3, 14);
        assert_eq!(bucket_date(PeriodKind::Daily, thursday), thursday);
        assert_eq!(bucket_date(PeriodKind::Weekly, thursday), ymd(2024, 3, 11));
        assert_eq!(bucket_date(PeriodKind::Monthly, thursday), ymd(2024, 3, 1));
        assert_eq!(bucket_date(PeriodKind::Yearly, thursday), ymd(2024, 1, 1));
    }

    #[test]
    fn test_bucket_edges() {
        let monday = ymd(2024, 3, 11);
        assert_eq!(bucket_date(PeriodKind::Weekly, monday), monday);
        let sunday = ymd(2024, 3, 17);
        assert_eq!(bucket_date(PeriodKind::Weekly, sunday), monday);
        // Week of 2025-01-02 starts in 2024
        assert_eq!(bucket_date(PeriodKind::Weekly, ymd(2025, 1, 2)), ymd(2024, 12, 30));
        assert_eq!(period_to_date_start(ymd(2025, 1, 2)), ymd(2024, 12, 30));
        assert_eq!(period_to_date_start(ymd(2024, 3, 14)), ymd(2024, 1, 1));
    }

    #[test]
    fn test_single_day_records() {
        let day = ymd(2024, 3, 14);
        let records = vec![
            record("m1", day, 100, 1),
            record("m1", day, 50, 0),
            record("m2", day, 30, 2),
        ];

        let stats = aggregate("c1", day, &records, 5_000).unwrap();
        assert_eq!(stats.len(), 4);
        for stat in &stats {
            // Same-member records are counted individually
            assert_eq!(stat.view_count, 3);
            assert_eq!(stat.watch_time_seconds, 180);
            assert_eq!(stat.ad_view_count, 3);
            assert_eq!(stat.accumulated_views, 5_000);
        }
        assert_eq!(by_period(&stats, PeriodKind::Weekly).bucket_date, ymd(2024, 3, 11));
    }

    #[test]
    fn test_period_to_date_records() {
        let day = ymd(2024, 3, 14);
        let records = vec![
            record("m1", ymd(2024, 1, 5), 10, 0),
            record("m1", ymd(2024, 3, 2), 10, 0),
            record("m1", ymd(2024, 3, 12), 10, 0),
            record("m1", day, 10, 0),
            // After the aggregation date
            record("m1", ymd(2024, 3, 15), 10, 0),
        ];

        let stats = aggregate("c1", day, &records, 0).unwrap();
        assert_eq!(by_period(&stats, PeriodKind::Daily).view_count, 1);
        assert_eq!(by_period(&stats, PeriodKind::Weekly).view_count, 2);
        assert_eq!(by_period(&stats, PeriodKind::Monthly).view_count, 3);
        assert_eq!(by_period(&stats, PeriodKind::Yearly).view_count, 4);
    }

    #[test]
    fn test_no_records_on_date_emits_nothing() {
        let day = ymd(2024, 3, 14);
        assert!(aggregate("c1", day, &[], 10).unwrap().is_empty());

        let earlier_only = vec![record("m1", ymd(2024, 3, 13), 10, 0)];
        assert!(aggregate("c1", day, &earlier_only, 10).unwrap().is_empty());
    }

    #[test]
    fn test_other_contents_ignored() {
        let day = ymd(2024, 3, 14);
        let mut other = record("m1", day, 999, 9);
        other.content_id = "c2".to_string();
        let records = vec![record("m1", day, 10, 0), other];

        let stats = aggregate("c1", day, &records, 0).unwrap();
        assert_eq!(by_period(&stats, PeriodKind::Daily).view_count, 1);
        assert_eq!(by_period(&stats, PeriodKind::Daily).watch_time_seconds, 10);
    }

    #[test]
    fn test_sum_overflow_fails() {
        let day = ymd(2024, 3, 14);
        let records = vec![record("m1", day, i64::MAX, 0), record("m2", day, 1, 0)];
        let err = aggregate("c1", day, &records, 0).unwrap_err();
        assert!(matches!(
            err,
            StatisticsError::Overflow {
                period: PeriodKind::Daily,
                field: "watch_time_seconds",
                ..
            }
        ));

        let records = vec![record("m1", day, 1, i64::MAX), record("m2", day, 1, 1)];
        let err = aggregate("c1", day, &records, 0).unwrap_err();
        assert!(matches!(
            err,
            StatisticsError::Overflow {
                field: "ad_view_count",
                ..
            }
        ));
    }
}
