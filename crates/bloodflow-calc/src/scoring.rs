//! 緊急度評分與到達時間

use bloodflow_core::{BloodflowError, EngineConfig, Result};

use crate::expiry::round_to;

/// 緊急度評分器
pub struct UrgencyScorer;

impl UrgencyScorer {
    /// 計算調撥緊急度
    ///
    /// 三項指標各自以設定上限正規化到 [0, 1] 後加權：
    /// 越接近到期、距離越近、盈餘越多，分數越高。
    /// 權重已在設定驗證時保證總和為 1，因此結果落在 [0, 1]。
    pub fn score(days_to_expiry: i64, distance_km: f64, surplus: f64, config: &EngineConfig) -> f64 {
        let norm_expiry = normalize(days_to_expiry as f64, config.max_days);
        let norm_distance = normalize(distance_km, config.max_distance_km);
        let norm_surplus = normalize(surplus, config.max_surplus);

        let w = &config.weights;
        let score = w.expiry * (1.0 - norm_expiry)
            + w.distance * (1.0 - norm_distance)
            + w.surplus * norm_surplus;

        round_to(score, 3)
    }

    /// 預計到達時間（分鐘）
    pub fn eta_minutes(distance_km: f64, speed_kmh: f64) -> Result<u32> {
        if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
            return Err(BloodflowError::InvalidConfiguration(format!(
                "運送速度必須大於 0: {}",
                speed_kmh
            )));
        }
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(BloodflowError::InvalidRequest(format!(
                "無效的距離: {}",
                distance_km
            )));
        }

        let minutes = (distance_km / speed_kmh * 60.0).round();
        Ok(minutes.min(f64::from(u32::MAX)) as u32)
    }
}

/// 以上限正規化並截斷到 [0, 1]
fn normalize(value: f64, max: f64) -> f64 {
    (value / max).clamp(0.0, 1.0)
}
