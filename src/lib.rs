//! # Bloodflow
//!
//! 區域血庫調撥建議與到期風險引擎
//!
//! `BloodBankService` 組合儲存介面、建議引擎與核准執行器，對外提供：
//! - 調撥建議產生
//! - 調撥核准（先進先出扣減）
//! - 到期風險彙總與逐批次風險指標

use std::sync::Arc;

use chrono::NaiveDate;

pub use bloodflow_calc::{
    DeficitEntry, ExpiryRiskCalculator, ExpirySummary, GeospatialLocator, NearbyHospital,
    RecommendationResult, RecommendationWarning, ScoredInventoryUnit, StockBalance, StockLine,
    SupplyDemandAggregator, SurplusEntry, TransferAllocator, TransferRecommendationEngine,
    TransferRequest, UrgencyScorer, WarningSeverity,
};
pub use bloodflow_core::{
    BloodGroup, BloodflowError, Component, EngineConfig, ForecastPoint, ForecastStore, GeoPoint,
    Hospital, HospitalDirectory, InventoryFilter, InventoryStore, InventoryUnit,
    MemoryForecastStore, MemoryHospitalDirectory, MemoryInventoryStore, MemoryTransferLedger,
    Result, StockKey, Transfer, TransferLedger, TransferObserver, TransferRecommendation,
    TransferStatus, UrgencyWeights,
};

/// 血庫服務
pub struct BloodBankService {
    inventory: Arc<dyn InventoryStore>,
    engine: TransferRecommendationEngine,
    allocator: TransferAllocator,
    config: EngineConfig,
}

impl BloodBankService {
    /// 創建服務（設定在此驗證）
    pub fn new(
        hospitals: Arc<dyn HospitalDirectory>,
        inventory: Arc<dyn InventoryStore>,
        forecasts: Arc<dyn ForecastStore>,
        ledger: Arc<dyn TransferLedger>,
        config: EngineConfig,
    ) -> Result<Self> {
        let engine = TransferRecommendationEngine::new(
            hospitals,
            Arc::clone(&inventory),
            forecasts,
            config.clone(),
        )?;
        let allocator = TransferAllocator::new(Arc::clone(&inventory), ledger);

        tracing::info!(
            "血庫服務啟動：半徑 {} 公里，盈餘門檻 {}，預測時界 {} 天",
            config.radius_km,
            config.surplus_threshold,
            config.forecast_horizon_days
        );

        Ok(Self {
            inventory,
            engine,
            allocator,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 註冊調撥核准通知
    pub fn add_observer(&self, observer: Arc<dyn TransferObserver>) {
        self.allocator.add_observer(observer);
    }

    /// 產生調撥建議（未指定醫院時涵蓋全部）
    pub fn generate_recommendations(
        &self,
        hospital_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<RecommendationResult> {
        self.engine.generate(hospital_id, today)
    }

    /// 核准並執行調撥
    pub fn approve_transfer(&self, request: TransferRequest) -> Result<Transfer> {
        self.allocator.approve_transfer(request)
    }

    /// 全部庫存的到期風險彙總
    pub fn expiry_summary(&self, today: NaiveDate) -> Result<ExpirySummary> {
        let units = self.inventory.get_all(&InventoryFilter::all())?;
        Ok(ExpiryRiskCalculator::summarize(
            &units,
            self.config.expiry_risk_threshold_days,
            today,
        ))
    }

    /// 全部庫存附帶風險指標
    pub fn inventory_with_risk_scores(&self, today: NaiveDate) -> Result<Vec<ScoredInventoryUnit>> {
        let units = self.inventory.get_all(&InventoryFilter::all())?;
        Ok(ExpiryRiskCalculator::score_inventory(
            &units,
            self.config.expiry_risk_threshold_days,
            today,
        ))
    }

    /// 尚未過期且在風險門檻內的批次，依到期日排序
    pub fn high_risk_units(&self, today: NaiveDate) -> Result<Vec<InventoryUnit>> {
        let units = self.inventory.get_all(&InventoryFilter::all())?;
        let mut high_risk = ExpiryRiskCalculator::high_risk_units(
            &units,
            self.config.expiry_risk_threshold_days,
            today,
        );
        high_risk.sort_by_key(|unit| unit.expiry_date);
        Ok(high_risk)
    }

    /// 醫院各血型成分的庫存統計
    pub fn stock_summary(&self, hospital_id: &str) -> Result<Vec<StockLine>> {
        self.engine.aggregator().stock_summary_for(hospital_id)
    }

    /// 設定半徑內的鄰近醫院
    pub fn nearby_hospitals(&self, hospital_id: &str) -> Result<Vec<NearbyHospital>> {
        self.engine
            .locator()
            .nearby_hospitals(hospital_id, self.config.radius_km)
    }

    /// 醫院的缺口與盈餘
    pub fn deficits_and_surpluses(
        &self,
        hospital_id: &str,
        today: NaiveDate,
    ) -> Result<StockBalance> {
        self.engine.aggregator().for_hospital(hospital_id, today)
    }
}

/// 以日誌記錄核准事件
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransferObserver;

impl TransferObserver for TracingTransferObserver {
    fn on_transfer_approved(&self, transfer: &Transfer) -> Result<()> {
        tracing::info!(
            transfer_id = %transfer.transfer_id,
            source = %transfer.source_hospital_id,
            destination = %transfer.destination_hospital_id,
            units = transfer.units,
            "調撥已核准"
        );
        Ok(())
    }
}
