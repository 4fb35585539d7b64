//! 需求預測模型
//!
//! 預測由外部模型產生，引擎只讀取，不重新推導。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BloodGroup, BloodflowError, Component, Result, StockKey};

/// 單日預測點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 醫院ID
    pub hospital_id: String,

    /// 血型
    pub blood_group: BloodGroup,

    /// 成分
    pub component: Component,

    /// 預測日期
    pub date: NaiveDate,

    /// 預測需求量
    pub predicted_units: Decimal,

    /// 預測下界
    pub lower_bound: Option<Decimal>,

    /// 預測上界
    pub upper_bound: Option<Decimal>,
}

impl ForecastPoint {
    /// 創建新的預測點（預測需求量不得為負）
    pub fn new(
        hospital_id: String,
        blood_group: BloodGroup,
        component: Component,
        date: NaiveDate,
        predicted_units: Decimal,
    ) -> Result<Self> {
        if predicted_units < Decimal::ZERO {
            return Err(BloodflowError::InvalidRecord(format!(
                "預測需求量不得為負: {}",
                predicted_units
            )));
        }

        Ok(Self {
            hospital_id,
            blood_group,
            component,
            date,
            predicted_units,
            lower_bound: None,
            upper_bound: None,
        })
    }

    /// 建構器模式：設置信賴區間
    pub fn with_bounds(mut self, lower: Decimal, upper: Decimal) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }

    /// 彙總鍵
    pub fn key(&self) -> StockKey {
        StockKey::new(self.blood_group, self.component)
    }
}
