//! Cumulative settlement calculation
//!
//! Every run recomputes lifetime-to-date revenue from lifetime views and
//! subtracts what earlier settlements already paid out. Amounts are integer
//! minor currency units; overflow and negative increments are errors.

use super::error::SettlementError;
use super::rate::RateResolver;
use crate::data::types::{
    PeriodKind, PeriodStatistic, PreviousSettlementSnapshot, SettlementRate, SettlementResult,
    SettlementType,
};
use crate::utils::time::start_of_day_utc;

/// Resolves rates and computes settlements
#[derive(Clone)]
pub struct SettlementCalculator {
    rates: RateResolver,
}

impl SettlementCalculator {
    pub fn new(rates: RateResolver) -> Self {
        Self { rates }
    }

    /// Settle `content_id` from its DAILY statistic
    ///
    /// `ad_view_count` is the content's lifetime ad views; zero means no ad
    /// revenue and no advertisement rate lookup.
    pub async fn calculate(
        &self,
        content_id: &str,
        daily: &PeriodStatistic,
        ad_view_count: i64,
        previous: &PreviousSettlementSnapshot,
    ) -> Result<SettlementResult, SettlementError> {
        if daily.period != PeriodKind::Daily {
            return Err(SettlementError::NotDaily {
                content_id: content_id.to_string(),
                period: daily.period,
            });
        }
        let as_of = start_of_day_utc(daily.bucket_date);

        let content_rate = self
            .rates
            .resolve(SettlementType::Content, daily.accumulated_views, as_of)
            .await?;
        let ad_rate = if ad_view_count > 0 {
            Some(
                self.rates
                    .resolve(SettlementType::Advertisement, ad_view_count, as_of)
                    .await?,
            )
        } else {
            None
        };

        settle(
            content_id,
            daily,
            ad_view_count,
            &content_rate,
            ad_rate.as_ref(),
            previous,
        )
    }
}

fn revenue(content_id: &str, views: i64, rate: &SettlementRate) -> Result<i64, SettlementError> {
    views
        .checked_mul(rate.rate_value)
        .ok_or_else(|| SettlementError::Overflow {
            content_id: content_id.to_string(),
            views,
            rate_value: rate.rate_value,
        })
}

fn increment(
    content_id: &str,
    settlement_type: SettlementType,
    period_total: i64,
    previous: i64,
) -> Result<i64, SettlementError> {
    match period_total.checked_sub(previous) {
        Some(delta) if delta >= 0 => Ok(delta),
        Some(_) => Err(SettlementError::NegativeIncrementalRevenue {
            content_id: content_id.to_string(),
            settlement_type,
            period_total,
            previous,
        }),
        None => Err(SettlementError::IncrementOverflow {
            content_id: content_id.to_string(),
            settlement_type,
            period_total,
            previous,
        }),
    }
}

/// Settlement from already-resolved rates
pub fn settle(
    content_id: &str,
    daily: &PeriodStatistic,
    ad_view_count: i64,
    content_rate: &SettlementRate,
    ad_rate: Option<&SettlementRate>,
    previous: &PreviousSettlementSnapshot,
) -> Result<SettlementResult, SettlementError> {
    let period_total_content_revenue = revenue(content_id, daily.accumulated_views, content_rate)?;
    let period_total_ad_revenue = match ad_rate {
        Some(rate) => revenue(content_id, ad_view_count, rate)?,
        None => 0,
    };

    let incremental_content_revenue = increment(
        content_id,
        SettlementType::Content,
        period_total_content_revenue,
        previous.previous_total_content_revenue,
    )?;
    let incremental_ad_revenue = increment(
        content_id,
        SettlementType::Advertisement,
        period_total_ad_revenue,
        previous.previous_total_ad_revenue,
    )?;

    Ok(SettlementResult {
        content_id: content_id.to_string(),
        settlement_date: daily.bucket_date,
        accumulated_views: daily.accumulated_views,
        ad_view_count,
        content_rate_id: content_rate.id,
        ad_rate_id: ad_rate.map(|r| r.id),
        period_total_content_revenue,
        period_total_ad_revenue,
        previous_content_revenue: previous.previous_total_content_revenue,
        previous_ad_revenue: previous.previous_total_ad_revenue,
        incremental_content_revenue,
        incremental_ad_revenue,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::data::SqliteService;
    use crate::data::traits::RateRepository;
    use crate::data::types::NewSettlementRate;

    fn daily(accumulated_views: i64) -> PeriodStatistic {
        PeriodStatistic {
            content_id: "c1".to_string(),
            period: PeriodKind::Daily,
            bucket_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            view_count: 1,
            watch_time_seconds: 60,
            ad_view_count: 0,
            accumulated_views,
        }
    }

    fn tier(id: i64, settlement_type: SettlementType, rate_value: i64) -> SettlementRate {
        SettlementRate {
            id,
            settlement_type,
            min_views: 0,
            max_views: None,
            applied_at: None,
            expired_at: None,
            rate_value,
        }
    }

    fn previous(content: i64, ad: i64) -> PreviousSettlementSnapshot {
        PreviousSettlementSnapshot {
            content_id: "c1".to_string(),
            previous_total_content_revenue: content,
            previous_total_ad_revenue: ad,
        }
    }

    #[test]
    fn test_incremental_content_revenue() {
        let content_rate = tier(1, SettlementType::Content, 10);
        let snapshot = previous(90_000, 0);

        let first = settle("c1", &daily(10_000), 0, &content_rate, None, &snapshot).unwrap();
        assert_eq!(first.period_total_content_revenue, 100_000);
        assert_eq!(first.incremental_content_revenue, 10_000);
        assert_eq!(first.incremental_ad_revenue, 0);
        assert_eq!(first.ad_rate_id, None);

        // Same inputs, same result
        let again = settle("c1", &daily(10_000), 0, &content_rate, None, &snapshot).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_ad_revenue() {
        let content_rate = tier(1, SettlementType::Content, 10);
        let ad_rate = tier(2, SettlementType::Advertisement, 3);

        let result = settle(
            "c1",
            &daily(100),
            40,
            &content_rate,
            Some(&ad_rate),
            &previous(500, 60),
        )
        .unwrap();
        assert_eq!(result.period_total_ad_revenue, 120);
        assert_eq!(result.incremental_ad_revenue, 60);
        assert_eq!(result.incremental_content_revenue, 500);
        assert_eq!(result.ad_rate_id, Some(2));
        assert_eq!(result.as_snapshot(), previous(1_000, 120));
    }

    #[test]
    fn test_negative_increment_fails() {
        let content_rate = tier(1, SettlementType::Content, 10);
        let err = settle("c1", &daily(10_000), 0, &content_rate, None, &previous(100_001, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::NegativeIncrementalRevenue {
                settlement_type: SettlementType::Content,
                period_total: 100_000,
                previous: 100_001,
                ..
            }
        ));

        // Ad revenue that vanished is a regression too
        let err = settle("c1", &daily(10), 0, &content_rate, None, &previous(0, 5)).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::NegativeIncrementalRevenue {
                settlement_type: SettlementType::Advertisement,
                ..
            }
        ));
    }

    #[test]
    fn test_overflow_fails() {
        let content_rate = tier(1, SettlementType::Content, i64::MAX);
        let err = settle("c1", &daily(2), 0, &content_rate, None, &previous(0, 0)).unwrap_err();
        assert!(matches!(err, SettlementError::Overflow { views: 2, .. }));

        // A negative paid-out total can push the increment past i64::MAX
        let content_rate = tier(1, SettlementType::Content, 1);
        let err = settle("c1", &daily(i64::MAX), 0, &content_rate, None, &previous(-1, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::IncrementOverflow {
                settlement_type: SettlementType::Content,
                period_total: i64::MAX,
                previous: -1,
                ..
            }
        ));
    }

    async fn calculator_with(rates: &[NewSettlementRate]) -> SettlementCalculator {
        let db = SqliteService::in_memory().await;
        for rate in rates {
            db.insert_rate(rate).await.unwrap();
        }
        SettlementCalculator::new(RateResolver::new(Arc::new(db)))
    }

    fn new_tier(settlement_type: SettlementType, rate_value: i64) -> NewSettlementRate {
        NewSettlementRate {
            settlement_type,
            min_views: 0,
            max_views: None,
            applied_at: None,
            expired_at: None,
            rate_value,
        }
    }

    #[tokio::test]
    async fn test_calculate_resolves_rates() {
        let calculator = calculator_with(&[
            new_tier(SettlementType::Content, 10),
            new_tier(SettlementType::Advertisement, 2),
        ])
        .await;

        let result = calculator
            .calculate("c1", &daily(1_000), 5, &previous(0, 0))
            .await
            .unwrap();
        assert_eq!(result.period_total_content_revenue, 10_000);
        assert_eq!(result.period_total_ad_revenue, 10);
    }

    #[tokio::test]
    async fn test_zero_ad_views_skip_ad_rate() {
        // No advertisement tier at all
        let calculator = calculator_with(&[new_tier(SettlementType::Content, 10)]).await;
        let result = calculator
            .calculate("c1", &daily(1_000), 0, &previous(0, 0))
            .await
            .unwrap();
        assert_eq!(result.period_total_ad_revenue, 0);
        assert_eq!(result.ad_rate_id, None);
    }

    #[tokio::test]
    async fn test_missing_content_rate_fails() {
        let calculator = calculator_with(&[new_tier(SettlementType::Advertisement, 2)]).await;
        let err = calculator
            .calculate("c1", &daily(1_000), 0, &previous(0, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::RateNotFound {
                settlement_type: SettlementType::Content,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_non_daily_statistic_rejected() {
        let calculator = calculator_with(&[new_tier(SettlementType::Content, 10)]).await;
        let mut weekly = daily(1_000);
        weekly.period = PeriodKind::Weekly;
        weekly.bucket_date = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();

        let err = calculator
            .calculate("c1", &weekly, 0, &previous(0, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::NotDaily {
                period: PeriodKind::Weekly,
                ..
            }
        ));
    }
}
