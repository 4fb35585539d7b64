//! # Blood Transfer Calculation Engine
//!
//! 到期風險、供需缺口、地理配對與調撥核准計算

pub mod allocator;
pub mod balance;
pub mod expiry;
pub mod geo;
pub mod recommender;
pub mod scoring;

// Re-export 主要類型
pub use allocator::{TransferAllocator, TransferRequest};
pub use balance::{DeficitEntry, StockBalance, StockLine, SupplyDemandAggregator, SurplusEntry};
pub use expiry::{ExpiryRiskCalculator, ExpirySummary, ScoredInventoryUnit};
pub use geo::{distance_between, haversine_km, GeospatialLocator, NearbyHospital, EARTH_RADIUS_KM};
pub use recommender::TransferRecommendationEngine;
pub use scoring::UrgencyScorer;

use bloodflow_core::TransferRecommendation;
use serde::{Deserialize, Serialize};

/// 調撥建議計算結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    /// 依緊急度遞減排序的建議
    pub recommendations: Vec<TransferRecommendation>,

    /// 警告信息
    pub warnings: Vec<RecommendationWarning>,

    /// 參與計算的醫院數
    pub hospitals_evaluated: usize,

    /// 計算耗時（毫秒）
    pub calculation_time_ms: Option<u128>,
}

impl RecommendationResult {
    /// 創建空的計算結果
    pub fn empty() -> Self {
        Self {
            recommendations: Vec::new(),
            warnings: Vec::new(),
            hospitals_evaluated: 0,
            calculation_time_ms: None,
        }
    }

    /// 添加警告
    pub fn add_warning(&mut self, warning: RecommendationWarning) {
        self.warnings.push(warning);
    }

    /// 是否有錯誤等級的警告
    pub fn has_errors(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.severity == WarningSeverity::Error)
    }
}

/// 計算警告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationWarning {
    pub hospital_id: String,
    pub message: String,
    pub severity: WarningSeverity,
}

impl RecommendationWarning {
    pub fn new(hospital_id: String, message: String, severity: WarningSeverity) -> Self {
        Self {
            hospital_id,
            message,
            severity,
        }
    }

    pub fn info(hospital_id: String, message: String) -> Self {
        Self::new(hospital_id, message, WarningSeverity::Info)
    }

    pub fn warning(hospital_id: String, message: String) -> Self {
        Self::new(hospital_id, message, WarningSeverity::Warning)
    }

    pub fn error(hospital_id: String, message: String) -> Self {
        Self::new(hospital_id, message, WarningSeverity::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Info,
    Warning,
    Error,
}
