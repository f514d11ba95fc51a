//! Eligibility validation for raw watch records
//!
//! Only completed sessions with a positive position, a non-negative ad
//! count and resolvable member/content references reach the aggregator.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::data::types::{CompletionStatus, RawWatchRecord, WatchRecord};

/// Why a watch record was skipped
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("watch session is not completed")]
    NotCompleted,
    #[error("last viewed position is not positive")]
    NonPositivePosition,
    #[error("ad view count is negative")]
    NegativeAdViewCount,
    #[error("member does not exist")]
    UnknownMember,
    #[error("content does not exist")]
    UnknownContent,
}

/// Check one record; the first failing rule wins
pub fn validate(raw: RawWatchRecord) -> Result<WatchRecord, ValidationFailure> {
    if raw.completion_status != CompletionStatus::Completed {
        return Err(ValidationFailure::NotCompleted);
    }
    if raw.last_viewed_position <= 0 {
        return Err(ValidationFailure::NonPositivePosition);
    }
    if raw.last_ad_view_count < 0 {
        return Err(ValidationFailure::NegativeAdViewCount);
    }
    if !raw.member_known {
        return Err(ValidationFailure::UnknownMember);
    }
    if !raw.content_known {
        return Err(ValidationFailure::UnknownContent);
    }

    Ok(WatchRecord {
        member_id: raw.member_id,
        content_id: raw.content_id,
        watched_date: raw.watched_date,
        last_viewed_position: raw.last_viewed_position,
        last_ad_view_count: raw.last_ad_view_count,
    })
}

/// Accepted and skipped counts of one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub accepted: usize,
    pub skipped: BTreeMap<ValidationFailure, usize>,
}

impl ValidationReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    fn record_skip(&mut self, reason: ValidationFailure) {
        *self.skipped.entry(reason).or_default() += 1;
    }
}

/// Validate a batch, keeping eligible records and counting the rest
pub fn validate_all(
    raws: impl IntoIterator<Item = RawWatchRecord>,
) -> (Vec<WatchRecord>, ValidationReport) {
    let mut report = ValidationReport::default();
    let mut accepted = Vec::new();

    for raw in raws {
        let id = raw.id;
        match validate(raw) {
            Ok(record) => {
                report.accepted += 1;
                accepted.push(record);
            }
            Err(reason) => {
                tracing::trace!(record_id = id, %reason, "Skipping watch record");
                report.record_skip(reason);
            }
        }
    }

    (accepted, report)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn raw(status: CompletionStatus, position: i64) -> RawWatchRecord {
        RawWatchRecord {
            id: 1,
            member_id: "m1".to_string(),
            content_id: "c1".to_string(),
            watched_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            last_viewed_position: position,
            last_ad_view_count: 2,
            completion_status: status,
            member_known: true,
            content_known: true,
        }
    }

    #[test]
    fn test_completed_record_accepted() {
        let record = validate(raw(CompletionStatus::Completed, 120)).unwrap();
        assert_eq!(record.last_viewed_position, 120);
        assert_eq!(record.last_ad_view_count, 2);
    }

    #[test]
    fn test_each_rule_rejects() {
        assert_eq!(
            validate(raw(CompletionStatus::InProgress, 120)),
            Err(ValidationFailure::NotCompleted)
        );
        assert_eq!(
            validate(raw(CompletionStatus::Paused, 120)),
            Err(ValidationFailure::NotCompleted)
        );
        assert_eq!(
            validate(raw(CompletionStatus::Completed, 0)),
            Err(ValidationFailure::NonPositivePosition)
        );
        assert_eq!(
            validate(RawWatchRecord {
                last_ad_view_count: -1,
                ..raw(CompletionStatus::Completed, 10)
            }),
            Err(ValidationFailure::NegativeAdViewCount)
        );
        assert_eq!(
            validate(RawWatchRecord {
                member_known: false,
                ..raw(CompletionStatus::Completed, 10)
            }),
            Err(ValidationFailure::UnknownMember)
        );
        assert_eq!(
            validate(RawWatchRecord {
                content_known: false,
                ..raw(CompletionStatus::Completed, 10)
            }),
            Err(ValidationFailure::UnknownContent)
        );
    }

    #[test]
    fn test_validate_all_counts_skips() {
        let (records, report) = validate_all(vec![
            raw(CompletionStatus::Completed, 10),
            raw(CompletionStatus::Completed, 20),
            raw(CompletionStatus::Paused, 20),
            raw(CompletionStatus::InProgress, 20),
            raw(CompletionStatus::Completed, -5),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.skipped_total(), 3);
        assert_eq!(report.skipped[&ValidationFailure::NotCompleted], 2);
        assert_eq!(report.skipped[&ValidationFailure::NonPositivePosition], 1);
    }

    #[test]
    fn test_report_serializes_reason_keys() {
        let (_, report) = validate_all(vec![raw(CompletionStatus::Paused, 1)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped"]["not_completed"], 1);
        assert_eq!(json["accepted"], 0);
    }
}
