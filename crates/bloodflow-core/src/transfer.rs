//! 調撥模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{BloodGroup, BloodflowError, Component, Result, StockKey};

/// 調撥狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// 待審核
    Pending,
    /// 已核准（庫存已扣減）
    Approved,
    /// 已完成
    Completed,
    /// 已取消
    Cancelled,
}

impl TransferStatus {
    /// 檢查狀態轉換是否合法
    ///
    /// pending → approved → completed，或 pending → cancelled
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Approved)
                | (TransferStatus::Pending, TransferStatus::Cancelled)
                | (TransferStatus::Approved, TransferStatus::Completed)
        )
    }

    /// 是否為終止狀態
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 調撥建議（排序後輸出，不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecommendation {
    pub source_hospital_id: String,
    pub source_hospital_name: String,
    pub destination_hospital_id: String,
    pub destination_hospital_name: String,
    pub blood_group: BloodGroup,
    pub component: Component,

    /// 建議調撥單位數
    pub units: u32,

    /// 緊急度分數 [0, 1]
    pub urgency_score: f64,

    /// 距離（公里）
    pub distance_km: f64,

    /// 預計到達時間（分鐘）
    pub eta_minutes: u32,

    /// 來源批次距到期天數
    pub days_to_expiry: i64,
}

impl TransferRecommendation {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.blood_group, self.component)
    }
}

/// 待寫入帳本的調撥資料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub source_hospital_id: String,
    pub destination_hospital_id: String,
    pub blood_group: BloodGroup,
    pub component: Component,
    pub units: u32,
    pub urgency_score: Option<f64>,
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<u32>,
    pub status: TransferStatus,
    pub approved_by: Option<String>,
}

/// 調撥記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// 調撥ID
    pub transfer_id: Uuid,
    pub source_hospital_id: String,
    pub destination_hospital_id: String,
    pub blood_group: BloodGroup,
    pub component: Component,
    pub units: u32,
    pub urgency_score: Option<f64>,
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<u32>,
    pub status: TransferStatus,

    /// 核准人
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    /// 由待寫入資料建立記錄
    pub fn from_new(data: NewTransfer, now: DateTime<Utc>) -> Self {
        let approved_at = (data.status == TransferStatus::Approved).then_some(now);
        Self {
            transfer_id: Uuid::new_v4(),
            source_hospital_id: data.source_hospital_id,
            destination_hospital_id: data.destination_hospital_id,
            blood_group: data.blood_group,
            component: data.component,
            units: data.units,
            urgency_score: data.urgency_score,
            distance_km: data.distance_km,
            eta_minutes: data.eta_minutes,
            status: data.status,
            approved_by: data.approved_by,
            approved_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.blood_group, self.component)
    }

    /// 轉換狀態
    pub fn transition_to(&mut self, next: TransferStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BloodflowError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if next == TransferStatus::Approved {
            self.approved_at = Some(now);
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn new_transfer(status: TransferStatus) -> NewTransfer {
        NewTransfer {
            source_hospital_id: "H1".to_string(),
            destination_hospital_id: "H2".to_string(),
            blood_group: BloodGroup::APositive,
            component: Component::Rbc,
            units: 12,
            urgency_score: None,
            distance_km: None,
            eta_minutes: None,
            status,
            approved_by: Some("admin".to_string()),
        }
    }

    #[rstest]
    #[case(TransferStatus::Pending, TransferStatus::Approved, true)]
    #[case(TransferStatus::Pending, TransferStatus::Cancelled, true)]
    #[case(TransferStatus::Approved, TransferStatus::Completed, true)]
    #[case(TransferStatus::Approved, TransferStatus::Cancelled, false)]
    #[case(TransferStatus::Pending, TransferStatus::Completed, false)]
    #[case(TransferStatus::Completed, TransferStatus::Pending, false)]
    #[case(TransferStatus::Cancelled, TransferStatus::Approved, false)]
    fn test_status_transitions(
        #[case] from: TransferStatus,
        #[case] to: TransferStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_approved_transfer_has_approval_time() {
        let now = Utc::now();
        let transfer = Transfer::from_new(new_transfer(TransferStatus::Approved), now);

        assert_eq!(transfer.status, TransferStatus::Approved);
        assert_eq!(transfer.approved_at, Some(now));
        assert_eq!(transfer.created_at, now);
    }

    #[test]
    fn test_pending_flow() {
        let now = Utc::now();
        let mut transfer = Transfer::from_new(new_transfer(TransferStatus::Pending), now);
        assert!(transfer.approved_at.is_none());

        transfer.transition_to(TransferStatus::Approved, now).unwrap();
        transfer.transition_to(TransferStatus::Completed, now).unwrap();
        assert!(transfer.status.is_terminal());

        let err = transfer
            .transition_to(TransferStatus::Cancelled, now)
            .unwrap_err();
        assert!(matches!(err, BloodflowError::InvalidTransition { .. }));
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&TransferStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}
