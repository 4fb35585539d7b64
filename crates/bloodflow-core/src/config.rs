//! 引擎設定
//!
//! 所有參數由外部提供並明確傳入各元件，邏輯中不讀取全域狀態。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BloodflowError, Result};

/// 權重總和容許誤差
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// 緊急度權重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UrgencyWeights {
    /// 到期權重
    pub expiry: f64,
    /// 距離權重
    pub distance: f64,
    /// 盈餘權重
    pub surplus: f64,
}

impl UrgencyWeights {
    pub fn new(expiry: f64, distance: f64, surplus: f64) -> Self {
        Self {
            expiry,
            distance,
            surplus,
        }
    }

    pub fn sum(&self) -> f64 {
        self.expiry + self.distance + self.surplus
    }
}

impl Default for UrgencyWeights {
    fn default() -> Self {
        Self::new(0.6, 0.2, 0.2)
    }
}

/// 調撥建議與到期風險設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 搜尋半徑（公里）
    pub radius_km: f64,

    /// 盈餘門檻：庫存減預測需求超過此值才視為盈餘
    pub surplus_threshold: Decimal,

    /// 緊急度權重（總和必須為 1）
    pub weights: UrgencyWeights,

    /// 運送速度（公里/小時）
    pub speed_kmh: f64,

    /// 高風險門檻（距到期天數）
    pub expiry_risk_threshold_days: i64,

    /// 預測時界（天）
    pub forecast_horizon_days: u32,

    /// 到期天數正規化上限
    pub max_days: f64,

    /// 距離正規化上限（公里）
    pub max_distance_km: f64,

    /// 盈餘正規化上限
    pub max_surplus: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            radius_km: 50.0,
            surplus_threshold: Decimal::from(5),
            weights: UrgencyWeights::default(),
            speed_kmh: 40.0,
            expiry_risk_threshold_days: 3,
            forecast_horizon_days: 7,
            max_days: 30.0,
            max_distance_km: 100.0,
            max_surplus: 100.0,
        }
    }
}

impl EngineConfig {
    /// 從 JSON 載入設定（未提供的欄位使用預設值），載入後立即驗證
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| BloodflowError::InvalidConfiguration(format!("設定解析失敗: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 建構器模式：設置搜尋半徑
    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    /// 建構器模式：設置盈餘門檻
    pub fn with_surplus_threshold(mut self, threshold: Decimal) -> Self {
        self.surplus_threshold = threshold;
        self
    }

    /// 建構器模式：設置緊急度權重
    pub fn with_weights(mut self, weights: UrgencyWeights) -> Self {
        self.weights = weights;
        self
    }

    /// 建構器模式：設置運送速度
    pub fn with_speed_kmh(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }

    /// 建構器模式：設置高風險門檻
    pub fn with_expiry_risk_threshold_days(mut self, days: i64) -> Self {
        self.expiry_risk_threshold_days = days;
        self
    }

    /// 建構器模式：設置預測時界
    pub fn with_forecast_horizon_days(mut self, days: u32) -> Self {
        self.forecast_horizon_days = days;
        self
    }

    /// 建構器模式：設置正規化上限
    pub fn with_normalization(mut self, max_days: f64, max_distance_km: f64, max_surplus: f64) -> Self {
        self.max_days = max_days;
        self.max_distance_km = max_distance_km;
        self.max_surplus = max_surplus;
        self
    }

    /// 驗證設定
    ///
    /// 權重必須非負且總和為 1，確保緊急度分數落在 [0, 1]。
    pub fn validate(&self) -> Result<()> {
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(invalid(format!("搜尋半徑不得為負: {}", self.radius_km)));
        }
        if self.surplus_threshold < Decimal::ZERO {
            return Err(invalid(format!("盈餘門檻不得為負: {}", self.surplus_threshold)));
        }
        if !self.speed_kmh.is_finite() || self.speed_kmh <= 0.0 {
            return Err(invalid(format!("運送速度必須大於 0: {}", self.speed_kmh)));
        }

        let w = &self.weights;
        for (name, value) in [("expiry", w.expiry), ("distance", w.distance), ("surplus", w.surplus)] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("權重 {} 不得為負: {}", name, value)));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!("權重總和必須為 1，目前為 {}", w.sum())));
        }

        for (name, value) in [
            ("max_days", self.max_days),
            ("max_distance_km", self.max_distance_km),
            ("max_surplus", self.max_surplus),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("正規化上限 {} 必須大於 0: {}", name, value)));
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> BloodflowError {
    BloodflowError::InvalidConfiguration(message)
}
