//! 地理距離與鄰近醫院查詢

use std::sync::Arc;

use bloodflow_core::{BloodflowError, GeoPoint, HospitalDirectory, Result};
use serde::{Deserialize, Serialize};

use crate::expiry::round_to;

/// 地球半徑（公里）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 大圓距離（Haversine 公式），單位公里
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // 浮點誤差可能讓 a 略大於 1
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// 兩座標間距離
pub fn distance_between(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// 鄰近醫院
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyHospital {
    pub hospital_id: String,
    pub name: String,
    /// 距離（公里，取兩位小數）
    pub distance_km: f64,
    pub location: GeoPoint,
}

/// 鄰近醫院查詢器
pub struct GeospatialLocator {
    directory: Arc<dyn HospitalDirectory>,
}

impl GeospatialLocator {
    pub fn new(directory: Arc<dyn HospitalDirectory>) -> Self {
        Self { directory }
    }

    /// 查詢半徑內的醫院，依距離遞增排序
    ///
    /// 排除來源醫院本身與缺少座標的醫院；來源醫院不存在或沒有座標時回傳空列表。
    pub fn nearby_hospitals(&self, source_id: &str, radius_km: f64) -> Result<Vec<NearbyHospital>> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(BloodflowError::InvalidConfiguration(format!(
                "搜尋半徑不得為負: {}",
                radius_km
            )));
        }

        let origin = match self
            .directory
            .get_by_id(source_id)?
            .and_then(|hospital| hospital.location)
        {
            Some(location) => location,
            None => {
                tracing::debug!("醫院 {} 不存在或缺少座標，無鄰近醫院", source_id);
                return Ok(Vec::new());
            }
        };

        let mut nearby: Vec<NearbyHospital> = self
            .directory
            .get_all()?
            .into_iter()
            .filter(|hospital| hospital.id != source_id)
            .filter_map(|hospital| {
                let location = hospital.location?;
                let distance = distance_between(origin, location);
                (distance <= radius_km).then(|| NearbyHospital {
                    hospital_id: hospital.id,
                    name: hospital.name,
                    distance_km: round_to(distance, 2),
                    location,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        tracing::debug!(
            "醫院 {} 半徑 {} 公里內有 {} 家醫院",
            source_id,
            radius_km,
            nearby.len()
        );

        Ok(nearby)
    }
}
