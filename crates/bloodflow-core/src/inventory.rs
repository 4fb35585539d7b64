//! 庫存模型

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{BloodflowError, Result};

/// 血型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    /// 全部血型
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::APositive,
        BloodGroup::ANegative,
        BloodGroup::BPositive,
        BloodGroup::BNegative,
        BloodGroup::AbPositive,
        BloodGroup::AbNegative,
        BloodGroup::OPositive,
        BloodGroup::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = BloodflowError;

    fn from_str(s: &str) -> Result<Self> {
        BloodGroup::ALL
            .iter()
            .copied()
            .find(|group| group.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BloodflowError::InvalidRecord(format!("未知的血型: {}", s)))
    }
}

/// 血液成分
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Component {
    /// 紅血球
    #[serde(rename = "RBC")]
    Rbc,
    /// 血小板
    Platelets,
    /// 血漿
    Plasma,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Rbc, Component::Platelets, Component::Plasma];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Rbc => "RBC",
            Component::Platelets => "Platelets",
            Component::Plasma => "Plasma",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = BloodflowError;

    fn from_str(s: &str) -> Result<Self> {
        Component::ALL
            .iter()
            .copied()
            .find(|component| component.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BloodflowError::InvalidRecord(format!("未知的血液成分: {}", s)))
    }
}

/// 庫存彙總鍵（血型 + 成分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub blood_group: BloodGroup,
    pub component: Component,
}

impl StockKey {
    pub fn new(blood_group: BloodGroup, component: Component) -> Self {
        Self {
            blood_group,
            component,
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.blood_group, self.component)
    }
}

/// 庫存批次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    /// 批次ID
    pub id: Uuid,

    /// 醫院ID
    pub hospital_id: String,

    /// 血型
    pub blood_group: BloodGroup,

    /// 成分
    pub component: Component,

    /// 單位數（恆為正數）
    pub units: u32,

    /// 採集日期
    pub collection_date: NaiveDate,

    /// 到期日期
    pub expiry_date: NaiveDate,
}

impl InventoryUnit {
    /// 創建新的庫存批次
    ///
    /// 單位數必須大於 0，到期日不得早於採集日。
    pub fn new(
        hospital_id: String,
        blood_group: BloodGroup,
        component: Component,
        units: u32,
        collection_date: NaiveDate,
        expiry_date: NaiveDate,
    ) -> Result<Self> {
        if units == 0 {
            return Err(BloodflowError::InvalidRecord(format!(
                "醫院 {} 的 {}/{} 批次單位數必須大於 0",
                hospital_id, blood_group, component
            )));
        }
        if expiry_date < collection_date {
            return Err(BloodflowError::InvalidRecord(format!(
                "到期日 {} 早於採集日 {}",
                expiry_date, collection_date
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            hospital_id,
            blood_group,
            component,
            units,
            collection_date,
            expiry_date,
        })
    }

    /// 建構器模式：指定批次ID
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// 彙總鍵
    pub fn key(&self) -> StockKey {
        StockKey::new(self.blood_group, self.component)
    }
}

/// 庫存查詢條件（所有條件皆為可選，組合使用）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFilter {
    pub hospital_id: Option<String>,
    pub blood_group: Option<BloodGroup>,
    pub component: Option<Component>,
}

impl InventoryFilter {
    /// 不設條件（全部庫存）
    pub fn all() -> Self {
        Self::default()
    }

    /// 指定醫院
    pub fn for_hospital(hospital_id: &str) -> Self {
        Self {
            hospital_id: Some(hospital_id.to_string()),
            ..Self::default()
        }
    }

    /// 指定醫院與彙總鍵
    pub fn for_key(hospital_id: &str, key: StockKey) -> Self {
        Self {
            hospital_id: Some(hospital_id.to_string()),
            blood_group: Some(key.blood_group),
            component: Some(key.component),
        }
    }

    /// 檢查批次是否符合條件
    pub fn matches(&self, unit: &InventoryUnit) -> bool {
        self.hospital_id
            .as_deref()
            .map_or(true, |id| id == unit.hospital_id)
            && self.blood_group.map_or(true, |g| g == unit.blood_group)
            && self.component.map_or(true, |c| c == unit.component)
    }
}
