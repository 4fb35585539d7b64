//! 記憶體內儲存實作（測試與示範用）

use chrono::{Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::store::{ForecastStore, HospitalDirectory, InventoryStore, TransferLedger};
use crate::{
    BloodflowError, ForecastPoint, Hospital, InventoryFilter, InventoryUnit, NewTransfer, Result,
    Transfer,
};

/// 記憶體庫存
#[derive(Debug, Default)]
pub struct MemoryInventoryStore {
    units: RwLock<Vec<InventoryUnit>>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以既有批次建立
    pub fn with_units(units: Vec<InventoryUnit>) -> Self {
        Self {
            units: RwLock::new(units),
        }
    }

    /// 目前所有批次的快照
    pub fn snapshot(&self) -> Vec<InventoryUnit> {
        self.units.read().clone()
    }
}

impl InventoryStore for MemoryInventoryStore {
    fn get_all(&self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>> {
        Ok(self
            .units
            .read()
            .iter()
            .filter(|unit| filter.matches(unit))
            .cloned()
            .collect())
    }

    fn insert(&self, unit: InventoryUnit) -> Result<InventoryUnit> {
        if unit.units == 0 {
            return Err(BloodflowError::InvalidRecord(format!(
                "批次 {} 單位數必須大於 0",
                unit.id
            )));
        }

        let mut units = self.units.write();
        if units.iter().any(|existing| existing.id == unit.id) {
            return Err(BloodflowError::InvalidRecord(format!("批次 {} 已存在", unit.id)));
        }
        units.push(unit.clone());
        Ok(unit)
    }

    fn update(&self, id: Uuid, new_units: u32) -> Result<InventoryUnit> {
        if new_units == 0 {
            return Err(BloodflowError::InvalidRecord(format!(
                "批次 {} 不可更新為 0 單位，應刪除",
                id
            )));
        }

        let mut units = self.units.write();
        let unit = units
            .iter_mut()
            .find(|unit| unit.id == id)
            .ok_or_else(|| BloodflowError::NotFound(format!("庫存批次 {}", id)))?;
        unit.units = new_units;
        Ok(unit.clone())
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        let mut units = self.units.write();
        let before = units.len();
        units.retain(|unit| unit.id != id);
        Ok(units.len() != before)
    }
}

/// 記憶體醫院目錄
#[derive(Debug, Default)]
pub struct MemoryHospitalDirectory {
    hospitals: RwLock<Vec<Hospital>>,
}

impl MemoryHospitalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hospitals(hospitals: Vec<Hospital>) -> Self {
        Self {
            hospitals: RwLock::new(hospitals),
        }
    }

    /// 新增或取代醫院
    pub fn upsert(&self, hospital: Hospital) {
        let mut hospitals = self.hospitals.write();
        match hospitals.iter_mut().find(|h| h.id == hospital.id) {
            Some(existing) => *existing = hospital,
            None => hospitals.push(hospital),
        }
    }
}

impl HospitalDirectory for MemoryHospitalDirectory {
    fn get_by_id(&self, id: &str) -> Result<Option<Hospital>> {
        Ok(self.hospitals.read().iter().find(|h| h.id == id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Hospital>> {
        Ok(self.hospitals.read().clone())
    }
}

/// 記憶體預測儲存
#[derive(Debug, Default)]
pub struct MemoryForecastStore {
    points: RwLock<Vec<ForecastPoint>>,
}

impl MemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Vec<ForecastPoint>) -> Self {
        Self {
            points: RwLock::new(points),
        }
    }

    pub fn push(&self, point: ForecastPoint) {
        self.points.write().push(point);
    }
}

impl ForecastStore for MemoryForecastStore {
    fn get_latest(
        &self,
        hospital_id: &str,
        start: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<ForecastPoint>> {
        let end = start
            .checked_add_signed(Duration::days(i64::from(horizon_days)))
            .ok_or_else(|| BloodflowError::InvalidRequest("預測時界日期溢出".to_string()))?;

        let mut points: Vec<ForecastPoint> = self
            .points
            .read()
            .iter()
            .filter(|p| p.hospital_id == hospital_id && p.date >= start && p.date <= end)
            .cloned()
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

/// 記憶體調撥帳本
#[derive(Debug, Default)]
pub struct MemoryTransferLedger {
    transfers: RwLock<Vec<Transfer>>,
}

impl MemoryTransferLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferLedger for MemoryTransferLedger {
    fn create(&self, data: NewTransfer) -> Result<Transfer> {
        let transfer = Transfer::from_new(data, Utc::now());
        self.transfers.write().push(transfer.clone());
        Ok(transfer)
    }

    fn get(&self, transfer_id: Uuid) -> Result<Option<Transfer>> {
        Ok(self
            .transfers
            .read()
            .iter()
            .find(|t| t.transfer_id == transfer_id)
            .cloned())
    }

    fn list(&self) -> Result<Vec<Transfer>> {
        Ok(self.transfers.read().clone())
    }
}
