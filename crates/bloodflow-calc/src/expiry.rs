//! 到期風險計算

use bloodflow_core::InventoryUnit;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 到期風險彙總
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirySummary {
    /// 總單位數
    pub total_units: u64,
    /// 批次數
    pub total_records: usize,
    /// 高風險批次數（尚未過期且在門檻內）
    pub high_risk_count: usize,
    /// 高風險單位數
    pub high_risk_units: u64,
    /// 已過期批次數
    pub expired_records: usize,
    /// 已過期單位數
    pub expired_units: u64,
    /// 今日到期
    pub units_expiring_today: u64,
    /// 1 天內到期（含已過期）
    pub units_expiring_1_day: u64,
    /// 3 天內到期（含已過期）
    pub units_expiring_3_days: u64,
    /// 7 天內到期（含已過期）
    pub units_expiring_7_days: u64,
    /// 使用的高風險門檻
    pub threshold_days: i64,
}

/// 附帶風險指標的庫存批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInventoryUnit {
    #[serde(flatten)]
    pub unit: InventoryUnit,
    pub days_to_expiry: i64,
    pub risk_score: f64,
    pub is_high_risk: bool,
}

/// 到期風險計算器
pub struct ExpiryRiskCalculator;

impl ExpiryRiskCalculator {
    /// 距到期天數（負數表示已過期）
    pub fn days_to_expiry(expiry_date: NaiveDate, today: NaiveDate) -> i64 {
        (expiry_date - today).num_days()
    }

    /// 風險分數 = 單位數 / (距到期天數 + 1)
    ///
    /// 分母下限為 1：當日到期與已過期的批次分數即為單位數。
    pub fn risk_score(expiry_date: NaiveDate, units: u32, today: NaiveDate) -> f64 {
        let denominator = (Self::days_to_expiry(expiry_date, today) + 1).max(1);
        f64::from(units) / denominator as f64
    }

    /// 是否為高風險（距到期天數 <= 門檻）
    pub fn is_high_risk(expiry_date: NaiveDate, threshold_days: i64, today: NaiveDate) -> bool {
        Self::days_to_expiry(expiry_date, today) <= threshold_days
    }

    /// 尚未過期且落在門檻內的批次
    pub fn high_risk_units(
        units: &[InventoryUnit],
        threshold_days: i64,
        today: NaiveDate,
    ) -> Vec<InventoryUnit> {
        units
            .iter()
            .filter(|unit| {
                let days = Self::days_to_expiry(unit.expiry_date, today);
                (0..=threshold_days).contains(&days)
            })
            .cloned()
            .collect()
    }

    /// 彙總所有批次的到期風險
    ///
    /// 各區間獨立累計：今日到期的單位同時計入 1/3/7 天區間。
    pub fn summarize(units: &[InventoryUnit], threshold_days: i64, today: NaiveDate) -> ExpirySummary {
        let mut summary = ExpirySummary {
            total_records: units.len(),
            threshold_days,
            ..ExpirySummary::default()
        };

        for unit in units {
            let qty = u64::from(unit.units);
            let days = Self::days_to_expiry(unit.expiry_date, today);

            summary.total_units += qty;

            if days < 0 {
                summary.expired_records += 1;
                summary.expired_units += qty;
            } else if days <= threshold_days {
                summary.high_risk_count += 1;
                summary.high_risk_units += qty;
            }

            if days == 0 {
                summary.units_expiring_today += qty;
            }
            if days <= 1 {
                summary.units_expiring_1_day += qty;
            }
            if days <= 3 {
                summary.units_expiring_3_days += qty;
            }
            if days <= 7 {
                summary.units_expiring_7_days += qty;
            }
        }

        tracing::debug!(
            "到期風險彙總：{} 批次，高風險 {} 批次，已過期 {} 批次",
            summary.total_records,
            summary.high_risk_count,
            summary.expired_records
        );

        summary
    }

    /// 為每個批次計算風險指標
    pub fn score_inventory(
        units: &[InventoryUnit],
        threshold_days: i64,
        today: NaiveDate,
    ) -> Vec<ScoredInventoryUnit> {
        units
            .iter()
            .map(|unit| ScoredInventoryUnit {
                days_to_expiry: Self::days_to_expiry(unit.expiry_date, today),
                risk_score: round_to(Self::risk_score(unit.expiry_date, unit.units, today), 4),
                is_high_risk: Self::is_high_risk(unit.expiry_date, threshold_days, today),
                unit: unit.clone(),
            })
            .collect()
    }
}

/// 四捨五入到指定小數位
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodflow_core::{BloodGroup, Component};
    use chrono::Duration;
    use proptest::prelude::*;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
    }

    fn unit_expiring_in(days: i64, units: u32) -> InventoryUnit {
        InventoryUnit::new(
            "H1".to_string(),
            BloodGroup::OPositive,
            Component::Rbc,
            units,
            today() - Duration::days(30),
            today() + Duration::days(days),
        )
        .unwrap()
    }

    #[rstest]
    #[case(5, 5)]
    #[case(0, 0)]
    #[case(-2, -2)]
    fn test_days_to_expiry(#[case] offset: i64, #[case] expected: i64) {
        let expiry = today() + Duration::days(offset);
        assert_eq!(ExpiryRiskCalculator::days_to_expiry(expiry, today()), expected);
    }

    #[test]
    fn test_risk_score() {
        // 10 單位，4 天後到期：10 / 5 = 2
        let expiry = today() + Duration::days(4);
        assert_eq!(ExpiryRiskCalculator::risk_score(expiry, 10, today()), 2.0);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(-10)]
    fn test_risk_score_of_expired_batch_is_units(#[case] offset: i64) {
        // 分母下限為 1，不會除以 0 或產生負分
        let expiry = today() + Duration::days(offset);
        assert_eq!(ExpiryRiskCalculator::risk_score(expiry, 7, today()), 7.0);
    }

    #[rstest]
    #[case(3, 3, true)]
    #[case(4, 3, false)]
    #[case(-1, 3, true)]
    #[case(0, 0, true)]
    fn test_is_high_risk(#[case] offset: i64, #[case] threshold: i64, #[case] expected: bool) {
        let expiry = today() + Duration::days(offset);
        assert_eq!(
            ExpiryRiskCalculator::is_high_risk(expiry, threshold, today()),
            expected
        );
    }

    #[test]
    fn test_summary_buckets_are_cumulative() {
        let units = vec![
            unit_expiring_in(0, 2),
            unit_expiring_in(1, 3),
            unit_expiring_in(3, 5),
            unit_expiring_in(6, 7),
            unit_expiring_in(20, 11),
            unit_expiring_in(-2, 1),
        ];

        let summary = ExpiryRiskCalculator::summarize(&units, 3, today());

        assert_eq!(summary.total_units, 29);
        assert_eq!(summary.total_records, 6);
        assert_eq!(summary.high_risk_count, 3);
        assert_eq!(summary.high_risk_units, 10);
        assert_eq!(summary.expired_records, 1);
        assert_eq!(summary.expired_units, 1);
        assert_eq!(summary.units_expiring_today, 2);
        assert_eq!(summary.units_expiring_1_day, 6);
        assert_eq!(summary.units_expiring_3_days, 11);
        assert_eq!(summary.units_expiring_7_days, 18);
        assert_eq!(summary.threshold_days, 3);
    }

    #[test]
    fn test_summary_of_empty_inventory() {
        let summary = ExpiryRiskCalculator::summarize(&[], 3, today());
        assert_eq!(summary.total_units, 0);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.threshold_days, 3);
    }

    #[test]
    fn test_high_risk_units_exclude_expired() {
        let units = vec![
            unit_expiring_in(-1, 4),
            unit_expiring_in(2, 6),
            unit_expiring_in(9, 8),
        ];

        let high_risk = ExpiryRiskCalculator::high_risk_units(&units, 3, today());
        assert_eq!(high_risk.len(), 1);
        assert_eq!(high_risk[0].units, 6);
    }

    #[test]
    fn test_score_inventory() {
        let units = vec![unit_expiring_in(2, 10), unit_expiring_in(10, 8)];

        let scored = ExpiryRiskCalculator::score_inventory(&units, 3, today());

        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].days_to_expiry, 2);
        assert_eq!(scored[0].risk_score, 3.3333);
        assert!(scored[0].is_high_risk);
        assert_eq!(scored[1].risk_score, 0.7273);
        assert!(!scored[1].is_high_risk);
    }

    proptest! {
        #[test]
        fn prop_risk_score_decreases_with_days(units in 1u32..500, days in -30i64..365) {
            let sooner = ExpiryRiskCalculator::risk_score(today() + Duration::days(days), units, today());
            let later = ExpiryRiskCalculator::risk_score(today() + Duration::days(days + 1), units, today());
            prop_assert!(later <= sooner);
        }

        #[test]
        fn prop_risk_score_increases_with_units(units in 1u32..500, days in -30i64..365) {
            let expiry = today() + Duration::days(days);
            let fewer = ExpiryRiskCalculator::risk_score(expiry, units, today());
            let more = ExpiryRiskCalculator::risk_score(expiry, units + 1, today());
            prop_assert!(more > fewer);
        }
    }
}
