//! 醫院模型

use serde::{Deserialize, Serialize};

use crate::{BloodflowError, Result};

/// 經緯度座標
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// 創建座標（緯度 -90..=90，經度 -180..=180）
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(BloodflowError::InvalidRecord(format!("無效的緯度: {}", latitude)));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(BloodflowError::InvalidRecord(format!("無效的經度: {}", longitude)));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// 醫院
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    /// 醫院ID
    pub id: String,

    /// 名稱
    pub name: String,

    /// 座標（缺少時不參與地理配對）
    pub location: Option<GeoPoint>,

    /// 地址
    pub address: Option<String>,

    /// 聯絡人
    pub contact_name: Option<String>,

    /// 聯絡電話
    pub contact_phone: Option<String>,
}

impl Hospital {
    /// 創建新的醫院
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            location: None,
            address: None,
            contact_name: None,
            contact_phone: None,
        }
    }

    /// 建構器模式：設置座標
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// 建構器模式：設置地址
    pub fn with_address(mut self, address: String) -> Self {
        self.address = Some(address);
        self
    }

    /// 建構器模式：設置聯絡資訊
    pub fn with_contact(mut self, name: String, phone: String) -> Self {
        self.contact_name = Some(name);
        self.contact_phone = Some(phone);
        self
    }

    /// 是否可參與地理配對
    pub fn is_geolocated(&self) -> bool {
        self.location.is_some()
    }
}
