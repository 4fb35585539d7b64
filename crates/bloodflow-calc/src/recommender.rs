//! 調撥建議主計算器

use std::collections::HashMap;
use std::sync::Arc;

use bloodflow_core::{
    BloodflowError, EngineConfig, ForecastStore, Hospital, HospitalDirectory, InventoryFilter,
    InventoryStore, Result, TransferRecommendation,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use crate::balance::{DeficitEntry, StockBalance, SupplyDemandAggregator};
use crate::expiry::ExpiryRiskCalculator;
use crate::geo::{GeospatialLocator, NearbyHospital};
use crate::scoring::UrgencyScorer;
use crate::{RecommendationResult, RecommendationWarning};

/// 調撥建議引擎
pub struct TransferRecommendationEngine {
    /// 醫院目錄
    hospitals: Arc<dyn HospitalDirectory>,

    /// 庫存（唯讀）
    inventory: Arc<dyn InventoryStore>,

    locator: GeospatialLocator,
    aggregator: SupplyDemandAggregator,
    config: EngineConfig,
}

impl TransferRecommendationEngine {
    /// 創建新的調撥建議引擎（設定在此驗證）
    pub fn new(
        hospitals: Arc<dyn HospitalDirectory>,
        inventory: Arc<dyn InventoryStore>,
        forecasts: Arc<dyn ForecastStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            locator: GeospatialLocator::new(Arc::clone(&hospitals)),
            aggregator: SupplyDemandAggregator::new(
                Arc::clone(&inventory),
                forecasts,
                config.clone(),
            ),
            hospitals,
            inventory,
            config,
        })
    }

    /// 產生調撥建議入口
    ///
    /// 未指定醫院時涵蓋全部醫院。單一醫院的失敗只會記為警告，不影響其他醫院。
    /// 結果依緊急度遞減排序（穩定排序，同分保留原順序）。
    pub fn generate(
        &self,
        hospital_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<RecommendationResult> {
        let start_time = std::time::Instant::now();

        let hospitals = match hospital_id {
            Some(id) => vec![self
                .hospitals
                .get_by_id(id)?
                .ok_or_else(|| BloodflowError::NotFound(format!("醫院 {}", id)))?],
            None => self.hospitals.get_all()?,
        };

        tracing::info!("開始產生調撥建議：醫院 {} 家，基準日 {}", hospitals.len(), today);

        // 各醫院獨立計算，rayon 保留輸入順序
        let outcomes: Vec<(&Hospital, Result<HospitalOutcome>)> = hospitals
            .par_iter()
            .map(|hospital| (hospital, self.recommend_for_hospital(hospital, today)))
            .collect();

        let mut result = RecommendationResult::empty();
        result.hospitals_evaluated = hospitals.len();

        for (hospital, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    result.recommendations.extend(outcome.recommendations);
                    result.warnings.extend(outcome.warnings);
                }
                Err(err) => {
                    tracing::warn!("醫院 {} 調撥建議計算失敗，略過: {}", hospital.id, err);
                    result.add_warning(RecommendationWarning::error(
                        hospital.id.clone(),
                        err.to_string(),
                    ));
                }
            }

            if hospital.location.is_none() {
                result.add_warning(RecommendationWarning::info(
                    hospital.id.clone(),
                    "缺少座標，不參與地理配對".to_string(),
                ));
            }
        }

        result
            .recommendations
            .sort_by(|a, b| b.urgency_score.total_cmp(&a.urgency_score));
        result.calculation_time_ms = Some(start_time.elapsed().as_millis());

        tracing::info!(
            "調撥建議完成，耗時 {:?}，建議 {} 筆，警告 {} 筆",
            start_time.elapsed(),
            result.recommendations.len(),
            result.warnings.len()
        );

        Ok(result)
    }

    /// 單一醫院的調撥建議
    ///
    /// 鄰近醫院讀取失敗時只略過該來源並記為警告，其餘來源照常配對。
    fn recommend_for_hospital(&self, hospital: &Hospital, today: NaiveDate) -> Result<HospitalOutcome> {
        let mut outcome = HospitalOutcome::default();
        if hospital.location.is_none() {
            return Ok(outcome);
        }

        let balance = self.aggregator.for_hospital(&hospital.id, today)?;
        if balance.deficits.is_empty() {
            tracing::debug!("醫院 {} 無缺口，跳過", hospital.id);
            return Ok(outcome);
        }

        let nearby = self
            .locator
            .nearby_hospitals(&hospital.id, self.config.radius_km)?;
        if nearby.is_empty() {
            tracing::debug!("醫院 {} 半徑內無其他醫院", hospital.id);
            return Ok(outcome);
        }

        // 同一輪計算中每家鄰近醫院的供需只計算一次；None 表示該來源已失敗
        let mut source_balances: HashMap<String, Option<StockBalance>> = HashMap::new();

        for deficit in &balance.deficits {
            for candidate in &nearby {
                if !source_balances.contains_key(&candidate.hospital_id) {
                    let source_balance =
                        match self.aggregator.for_hospital(&candidate.hospital_id, today) {
                            Ok(source_balance) => Some(source_balance),
                            Err(err) => {
                                outcome.skip_source(hospital, candidate, &err);
                                None
                            }
                        };
                    source_balances.insert(candidate.hospital_id.clone(), source_balance);
                }
                let Some(source_balance) = &source_balances[&candidate.hospital_id] else {
                    continue;
                };

                match self.match_surplus(hospital, deficit, candidate, source_balance, today) {
                    Ok(Some(recommendation)) => outcome.recommendations.push(recommendation),
                    Ok(None) => {}
                    Err(err) => {
                        outcome.skip_source(hospital, candidate, &err);
                        source_balances.insert(candidate.hospital_id.clone(), None);
                    }
                }
            }
        }

        tracing::debug!(
            "醫院 {}：缺口 {} 項，鄰近醫院 {} 家，建議 {} 筆",
            hospital.id,
            balance.deficits.len(),
            nearby.len(),
            outcome.recommendations.len()
        );

        Ok(outcome)
    }

    /// 以鄰近醫院的盈餘配對缺口
    ///
    /// 來源批次取最早到期者；建議單位數不超過缺口、盈餘與該批次數量。
    fn match_surplus(
        &self,
        destination: &Hospital,
        deficit: &DeficitEntry,
        candidate: &NearbyHospital,
        source_balance: &StockBalance,
        today: NaiveDate,
    ) -> Result<Option<TransferRecommendation>> {
        let Some(surplus) = source_balance.surplus_for(deficit.key) else {
            return Ok(None);
        };

        let mut batches = self
            .inventory
            .get_all(&InventoryFilter::for_key(&candidate.hospital_id, deficit.key))?;
        batches.sort_by_key(|batch| batch.expiry_date);
        let Some(earliest) = batches.first() else {
            return Ok(None);
        };

        let units = deficit
            .magnitude
            .min(surplus.magnitude)
            .min(earliest.units.into())
            .trunc()
            .to_u32()
            .unwrap_or(0);
        if units == 0 {
            tracing::debug!(
                "{} → {} {} 建議數量不足 1 單位，略過",
                candidate.hospital_id,
                destination.id,
                deficit.key
            );
            return Ok(None);
        }

        let days_to_expiry = ExpiryRiskCalculator::days_to_expiry(earliest.expiry_date, today);
        let urgency_score = UrgencyScorer::score(
            days_to_expiry,
            candidate.distance_km,
            surplus.magnitude.to_f64().unwrap_or(0.0),
            &self.config,
        );
        let eta_minutes = UrgencyScorer::eta_minutes(candidate.distance_km, self.config.speed_kmh)?;

        Ok(Some(TransferRecommendation {
            source_hospital_id: candidate.hospital_id.clone(),
            source_hospital_name: candidate.name.clone(),
            destination_hospital_id: destination.id.clone(),
            destination_hospital_name: destination.name.clone(),
            blood_group: deficit.key.blood_group,
            component: deficit.key.component,
            units,
            urgency_score,
            distance_km: candidate.distance_km,
            eta_minutes,
            days_to_expiry,
        }))
    }

    /// 設定引用
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 供需彙總器引用
    pub fn aggregator(&self) -> &SupplyDemandAggregator {
        &self.aggregator
    }

    /// 地理查詢器引用
    pub fn locator(&self) -> &GeospatialLocator {
        &self.locator
    }
}

/// 單一醫院的計算結果
#[derive(Debug, Default)]
struct HospitalOutcome {
    recommendations: Vec<TransferRecommendation>,
    warnings: Vec<RecommendationWarning>,
}

impl HospitalOutcome {
    /// 略過讀取失敗的來源醫院
    fn skip_source(&mut self, destination: &Hospital, source: &NearbyHospital, err: &BloodflowError) {
        tracing::warn!(
            "醫院 {} 的鄰近來源 {} 讀取失敗，略過: {}",
            destination.id,
            source.hospital_id,
            err
        );
        self.warnings.push(RecommendationWarning::warning(
            source.hospital_id.clone(),
            format!("作為 {} 的調撥來源時讀取失敗: {}", destination.id, err),
        ));
    }
}
