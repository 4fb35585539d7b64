//! 外部協作者介面
//!
//! 引擎只依賴以下讀寫契約，持久化細節（資料表、遷移）由實作方負責。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    BloodflowError, ForecastPoint, Hospital, InventoryFilter, InventoryUnit, NewTransfer, Result,
    StockKey, Transfer,
};

/// 單一批次的扣減步驟
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchDepletion {
    /// 整批移除（保留原始批次以便回復）
    Remove { original: InventoryUnit },

    /// 部分扣減
    Reduce { id: Uuid, from: u32, to: u32 },
}

impl BatchDepletion {
    /// 此步驟扣減的單位數
    pub fn depleted_units(&self) -> u32 {
        match self {
            BatchDepletion::Remove { original } => original.units,
            BatchDepletion::Reduce { from, to, .. } => from - to,
        }
    }

    pub fn batch_id(&self) -> Uuid {
        match self {
            BatchDepletion::Remove { original } => original.id,
            BatchDepletion::Reduce { id, .. } => *id,
        }
    }
}

/// 一次調撥的扣減計劃（依到期日先進先出）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletionPlan {
    pub hospital_id: String,
    pub key: StockKey,
    pub steps: Vec<BatchDepletion>,
}

impl DepletionPlan {
    /// 計劃扣減的總單位數
    pub fn total_units(&self) -> u32 {
        self.steps.iter().map(BatchDepletion::depleted_units).sum()
    }
}

/// 庫存儲存
pub trait InventoryStore: Send + Sync {
    /// 查詢符合條件的批次
    fn get_all(&self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>>;

    /// 新增批次
    fn insert(&self, unit: InventoryUnit) -> Result<InventoryUnit>;

    /// 更新批次單位數（必須大於 0，歸零的批次應刪除）
    fn update(&self, id: Uuid, units: u32) -> Result<InventoryUnit>;

    /// 刪除批次，回傳是否存在
    fn delete(&self, id: Uuid) -> Result<bool>;

    /// 套用扣減計劃（全有或全無）
    ///
    /// 預設實作逐步呼叫 `delete` / `update`，任一步失敗時回復已完成的步驟。
    /// 具備原生交易的儲存層應覆寫此方法。
    fn apply_depletion(&self, plan: &DepletionPlan) -> Result<()> {
        let mut applied: Vec<&BatchDepletion> = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let outcome = match step {
                BatchDepletion::Remove { original } => {
                    self.delete(original.id).and_then(|existed| {
                        if existed {
                            Ok(())
                        } else {
                            Err(BloodflowError::NotFound(format!("庫存批次 {}", original.id)))
                        }
                    })
                }
                BatchDepletion::Reduce { id, to, .. } => self.update(*id, *to).map(|_| ()),
            };

            if let Err(err) = outcome {
                tracing::warn!(
                    "扣減批次 {} 失敗，回復 {} 個已完成步驟: {}",
                    step.batch_id(),
                    applied.len(),
                    err
                );
                if let Err(revert_err) = revert_steps(self, &applied) {
                    tracing::error!(
                        "醫院 {} {} 扣減回復失敗: {}",
                        plan.hospital_id,
                        plan.key,
                        revert_err
                    );
                }
                return Err(err);
            }
            applied.push(step);
        }

        Ok(())
    }

    /// 回復已套用的扣減計劃
    fn revert_depletion(&self, plan: &DepletionPlan) -> Result<()> {
        let steps: Vec<&BatchDepletion> = plan.steps.iter().collect();
        revert_steps(self, &steps)
    }
}

/// 反向回復扣減步驟
fn revert_steps<S: InventoryStore + ?Sized>(store: &S, steps: &[&BatchDepletion]) -> Result<()> {
    for step in steps.iter().rev() {
        let outcome = match step {
            BatchDepletion::Remove { original } => store.insert(original.clone()).map(|_| ()),
            BatchDepletion::Reduce { id, from, .. } => store.update(*id, *from).map(|_| ()),
        };
        if let Err(err) = outcome {
            tracing::error!("回復批次 {} 失敗: {}", step.batch_id(), err);
            return Err(err);
        }
    }
    Ok(())
}

/// 醫院目錄
pub trait HospitalDirectory: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Hospital>>;

    fn get_all(&self) -> Result<Vec<Hospital>>;
}

/// 預測儲存（由外部預測模型寫入）
pub trait ForecastStore: Send + Sync {
    /// 取得 `[start, start + horizon_days]` 區間（含兩端）的最新預測
    fn get_latest(
        &self,
        hospital_id: &str,
        start: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<ForecastPoint>>;
}

/// 調撥帳本
pub trait TransferLedger: Send + Sync {
    fn create(&self, data: NewTransfer) -> Result<Transfer>;

    fn get(&self, transfer_id: Uuid) -> Result<Option<Transfer>>;

    fn list(&self) -> Result<Vec<Transfer>>;
}

/// 調撥事件觀察者（通知、稽核等副作用）
///
/// 觀察者失敗只記錄日誌，不影響已完成的調撥。
pub trait TransferObserver: Send + Sync {
    fn on_transfer_approved(&self, transfer: &Transfer) -> Result<()>;
}
