//! 供需缺口計算

use std::collections::BTreeMap;
use std::sync::Arc;

use bloodflow_core::{
    EngineConfig, ForecastPoint, ForecastStore, InventoryFilter, InventoryStore, InventoryUnit,
    Result, StockKey,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 缺口（庫存低於預測需求）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeficitEntry {
    pub hospital_id: String,
    pub key: StockKey,
    /// 短缺量
    pub magnitude: Decimal,
}

/// 盈餘（庫存超出預測需求且超過門檻）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusEntry {
    pub hospital_id: String,
    pub key: StockKey,
    /// 超出量
    pub magnitude: Decimal,
}

/// 單一醫院的供需結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub deficits: Vec<DeficitEntry>,
    pub surpluses: Vec<SurplusEntry>,
}

impl StockBalance {
    /// 找出指定彙總鍵的盈餘
    pub fn surplus_for(&self, key: StockKey) -> Option<&SurplusEntry> {
        self.surpluses.iter().find(|s| s.key == key)
    }
}

/// 每個彙總鍵的庫存摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub key: StockKey,
    pub total_units: u64,
    pub record_count: usize,
}

/// 供需彙總器
pub struct SupplyDemandAggregator {
    inventory: Arc<dyn InventoryStore>,
    forecasts: Arc<dyn ForecastStore>,
    config: EngineConfig,
}

impl SupplyDemandAggregator {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        forecasts: Arc<dyn ForecastStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inventory,
            forecasts,
            config,
        }
    }

    /// 讀取醫院庫存與預測並計算缺口與盈餘
    pub fn for_hospital(&self, hospital_id: &str, today: NaiveDate) -> Result<StockBalance> {
        let units = self.inventory.get_all(&InventoryFilter::for_hospital(hospital_id))?;
        let forecasts =
            self.forecasts
                .get_latest(hospital_id, today, self.config.forecast_horizon_days)?;

        let balance = Self::compute(hospital_id, &units, &forecasts, self.config.surplus_threshold);

        tracing::debug!(
            "醫院 {}：庫存 {} 批次，預測 {} 筆，缺口 {} 項，盈餘 {} 項",
            hospital_id,
            units.len(),
            forecasts.len(),
            balance.deficits.len(),
            balance.surpluses.len()
        );

        Ok(balance)
    }

    /// 計算缺口與盈餘
    ///
    /// 對每個出現在任一側的彙總鍵，差額 = 庫存總量 - 預測總量：
    /// 差額 < 0 為缺口；差額 > 門檻為盈餘；其餘視為平衡並忽略。
    pub fn compute(
        hospital_id: &str,
        units: &[InventoryUnit],
        forecasts: &[ForecastPoint],
        surplus_threshold: Decimal,
    ) -> StockBalance {
        let mut totals: BTreeMap<StockKey, (Decimal, Decimal)> = BTreeMap::new();

        for unit in units {
            totals.entry(unit.key()).or_default().0 += Decimal::from(unit.units);
        }
        for point in forecasts {
            totals.entry(point.key()).or_default().1 += point.predicted_units;
        }

        let mut balance = StockBalance::default();
        for (key, (on_hand, forecast)) in totals {
            let diff = on_hand - forecast;

            if diff < Decimal::ZERO {
                balance.deficits.push(DeficitEntry {
                    hospital_id: hospital_id.to_string(),
                    key,
                    magnitude: diff.abs(),
                });
            } else if diff > surplus_threshold {
                balance.surpluses.push(SurplusEntry {
                    hospital_id: hospital_id.to_string(),
                    key,
                    magnitude: diff,
                });
            }
        }

        balance
    }

    /// 依彙總鍵統計庫存
    pub fn stock_summary(units: &[InventoryUnit]) -> Vec<StockLine> {
        let mut lines: BTreeMap<StockKey, StockLine> = BTreeMap::new();
        for unit in units {
            let line = lines.entry(unit.key()).or_insert_with(|| StockLine {
                key: unit.key(),
                total_units: 0,
                record_count: 0,
            });
            line.total_units += u64::from(unit.units);
            line.record_count += 1;
        }
        lines.into_values().collect()
    }

    /// 讀取醫院庫存並統計
    pub fn stock_summary_for(&self, hospital_id: &str) -> Result<Vec<StockLine>> {
        let units = self.inventory.get_all(&InventoryFilter::for_hospital(hospital_id))?;
        Ok(Self::stock_summary(&units))
    }
}
