//! # Bloodflow Core
//!
//! 核心資料模型、設定與儲存介面

pub mod config;
pub mod forecast;
pub mod hospital;
pub mod inventory;
pub mod memory;
pub mod store;
pub mod transfer;

// Re-export 主要類型
pub use config::{EngineConfig, UrgencyWeights};
pub use forecast::ForecastPoint;
pub use hospital::{GeoPoint, Hospital};
pub use inventory::{BloodGroup, Component, InventoryFilter, InventoryUnit, StockKey};
pub use memory::{
    MemoryForecastStore, MemoryHospitalDirectory, MemoryInventoryStore, MemoryTransferLedger,
};
pub use store::{
    BatchDepletion, DepletionPlan, ForecastStore, HospitalDirectory, InventoryStore,
    TransferLedger, TransferObserver,
};
pub use transfer::{NewTransfer, Transfer, TransferRecommendation, TransferStatus};

/// 引擎錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum BloodflowError {
    #[error("找不到資源: {0}")]
    NotFound(String),

    #[error(
        "庫存不足：醫院 {hospital_id} {key} 需要 {requested} 單位，可用 {available} 單位"
    )]
    InsufficientInventory {
        hospital_id: String,
        key: StockKey,
        requested: u32,
        available: u32,
    },

    #[error("無效的設定: {0}")]
    InvalidConfiguration(String),

    #[error("無效的請求: {0}")]
    InvalidRequest(String),

    #[error("無效的庫存記錄: {0}")]
    InvalidRecord(String),

    #[error("調撥狀態不可由 {from} 轉換為 {to}")]
    InvalidTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("儲存層錯誤: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, BloodflowError>;
