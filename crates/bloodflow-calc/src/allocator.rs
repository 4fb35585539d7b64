//! 調撥核准與先進先出扣減

use std::sync::Arc;

use bloodflow_core::{
    BatchDepletion, BloodGroup, BloodflowError, Component, DepletionPlan, InventoryFilter,
    InventoryStore, InventoryUnit, NewTransfer, Result, StockKey, Transfer, TransferLedger,
    TransferObserver, TransferRecommendation, TransferStatus,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// 調撥核准請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_hospital_id: String,
    pub destination_hospital_id: String,
    pub blood_group: BloodGroup,
    pub component: Component,

    /// 核准單位數（不會被下修）
    pub units: u32,

    /// 核准人
    pub approved_by: String,

    pub urgency_score: Option<f64>,
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<u32>,
}

impl TransferRequest {
    pub fn new(
        source_hospital_id: String,
        destination_hospital_id: String,
        key: StockKey,
        units: u32,
        approved_by: String,
    ) -> Self {
        Self {
            source_hospital_id,
            destination_hospital_id,
            blood_group: key.blood_group,
            component: key.component,
            units,
            approved_by,
            urgency_score: None,
            distance_km: None,
            eta_minutes: None,
        }
    }

    /// 由調撥建議建立請求，保留緊急度、距離與到達時間
    pub fn from_recommendation(recommendation: &TransferRecommendation, approved_by: &str) -> Self {
        Self::new(
            recommendation.source_hospital_id.clone(),
            recommendation.destination_hospital_id.clone(),
            recommendation.key(),
            recommendation.units,
            approved_by.to_string(),
        )
        .with_metrics(
            recommendation.urgency_score,
            recommendation.distance_km,
            recommendation.eta_minutes,
        )
    }

    /// 設置建議指標
    pub fn with_metrics(mut self, urgency_score: f64, distance_km: f64, eta_minutes: u32) -> Self {
        self.urgency_score = Some(urgency_score);
        self.distance_km = Some(distance_km);
        self.eta_minutes = Some(eta_minutes);
        self
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.blood_group, self.component)
    }

    fn validate(&self) -> Result<()> {
        if self.units == 0 {
            return Err(BloodflowError::InvalidRequest(
                "調撥單位數必須大於 0".to_string(),
            ));
        }
        if self.source_hospital_id == self.destination_hospital_id {
            return Err(BloodflowError::InvalidRequest(format!(
                "來源與目的醫院相同: {}",
                self.source_hospital_id
            )));
        }
        if self.approved_by.trim().is_empty() {
            return Err(BloodflowError::InvalidRequest("缺少核准人".to_string()));
        }
        Ok(())
    }
}

/// 配置鎖的鍵（來源醫院 + 彙總鍵）
type AllocationKey = (String, StockKey);

/// 調撥核准執行器
///
/// 同一來源醫院的同一血型成分在任何時刻只允許一個核准流程扣減庫存。
pub struct TransferAllocator {
    inventory: Arc<dyn InventoryStore>,
    ledger: Arc<dyn TransferLedger>,
    observers: RwLock<Vec<Arc<dyn TransferObserver>>>,
    /// 每個（醫院, 血型成分）一把鎖，不回收；上限為醫院數 × 24
    locks: DashMap<AllocationKey, Arc<Mutex<()>>>,
}

impl TransferAllocator {
    pub fn new(inventory: Arc<dyn InventoryStore>, ledger: Arc<dyn TransferLedger>) -> Self {
        Self {
            inventory,
            ledger,
            observers: RwLock::new(Vec::new()),
            locks: DashMap::new(),
        }
    }

    /// 註冊核准通知
    pub fn add_observer(&self, observer: Arc<dyn TransferObserver>) {
        self.observers.write().push(observer);
    }

    /// 核准並執行調撥
    ///
    /// 依到期日由早到晚扣減來源庫存後寫入帳本。庫存不足時不做任何異動；
    /// 帳本寫入失敗時回復扣減。
    pub fn approve_transfer(&self, request: TransferRequest) -> Result<Transfer> {
        request.validate()?;

        let key = request.key();
        let lock = self.lock_for(&request.source_hospital_id, key);

        let transfer = {
            let _guard = lock.lock();

            let plan = self.plan_depletion(&request.source_hospital_id, key, request.units)?;
            self.inventory.apply_depletion(&plan)?;

            tracing::debug!(
                "醫院 {} {} 已扣減 {} 單位，涉及 {} 個批次",
                request.source_hospital_id,
                key,
                plan.total_units(),
                plan.steps.len()
            );

            match self.ledger.create(Self::new_transfer(&request)) {
                Ok(transfer) => transfer,
                Err(err) => {
                    tracing::warn!("調撥帳本寫入失敗，回復庫存扣減: {}", err);
                    if let Err(revert_err) = self.inventory.revert_depletion(&plan) {
                        tracing::error!(
                            "醫院 {} {} 庫存回復失敗: {}",
                            request.source_hospital_id,
                            key,
                            revert_err
                        );
                    }
                    return Err(err);
                }
            }
        };

        tracing::info!(
            "調撥 {} 已核准：{} → {} {} {} 單位（核准人 {}）",
            transfer.transfer_id,
            transfer.source_hospital_id,
            transfer.destination_hospital_id,
            key,
            transfer.units,
            request.approved_by
        );

        self.notify(&transfer);

        Ok(transfer)
    }

    /// 建立先進先出扣減計劃（不異動庫存）
    pub fn plan_depletion(
        &self,
        hospital_id: &str,
        key: StockKey,
        requested: u32,
    ) -> Result<DepletionPlan> {
        let mut batches = self
            .inventory
            .get_all(&InventoryFilter::for_key(hospital_id, key))?;

        let available: u64 = batches.iter().map(|b| u64::from(b.units)).sum();
        if batches.is_empty() || available < u64::from(requested) {
            return Err(BloodflowError::InsufficientInventory {
                hospital_id: hospital_id.to_string(),
                key,
                requested,
                available: u32::try_from(available).unwrap_or(u32::MAX),
            });
        }

        batches.sort_by(|a, b| {
            a.expiry_date
                .cmp(&b.expiry_date)
                .then(a.collection_date.cmp(&b.collection_date))
        });

        Ok(DepletionPlan {
            hospital_id: hospital_id.to_string(),
            key,
            steps: Self::fifo_steps(&batches, requested),
        })
    }

    /// 依排序後的批次產生扣減步驟：整批移除，最後一批部分扣減
    fn fifo_steps(batches: &[InventoryUnit], requested: u32) -> Vec<BatchDepletion> {
        let mut remaining = requested;
        let mut steps = Vec::new();

        for batch in batches {
            if remaining == 0 {
                break;
            }
            if batch.units <= remaining {
                remaining -= batch.units;
                steps.push(BatchDepletion::Remove {
                    original: batch.clone(),
                });
            } else {
                steps.push(BatchDepletion::Reduce {
                    id: batch.id,
                    from: batch.units,
                    to: batch.units - remaining,
                });
                remaining = 0;
            }
        }

        steps
    }

    fn new_transfer(request: &TransferRequest) -> NewTransfer {
        NewTransfer {
            source_hospital_id: request.source_hospital_id.clone(),
            destination_hospital_id: request.destination_hospital_id.clone(),
            blood_group: request.blood_group,
            component: request.component,
            units: request.units,
            urgency_score: request.urgency_score,
            distance_km: request.distance_km,
            eta_minutes: request.eta_minutes,
            status: TransferStatus::Approved,
            approved_by: Some(request.approved_by.clone()),
        }
    }

    fn lock_for(&self, hospital_id: &str, key: StockKey) -> Arc<Mutex<()>> {
        self.locks
            .entry((hospital_id.to_string(), key))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn notify(&self, transfer: &Transfer) {
        for observer in self.observers.read().iter() {
            if let Err(err) = observer.on_transfer_approved(transfer) {
                tracing::warn!("調撥 {} 通知失敗: {}", transfer.transfer_id, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodflow_core::{MemoryInventoryStore, MemoryTransferLedger};
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
    }

    fn a_pos_rbc() -> StockKey {
        StockKey::new(BloodGroup::APositive, Component::Rbc)
    }

    fn batch(hospital: &str, key: StockKey, units: u32, expires_in: i64) -> InventoryUnit {
        InventoryUnit::new(
            hospital.to_string(),
            key.blood_group,
            key.component,
            units,
            today() - Duration::days(30),
            today() + Duration::days(expires_in),
        )
        .unwrap()
    }

    fn request(units: u32) -> TransferRequest {
        TransferRequest::new(
            "H1".to_string(),
            "H2".to_string(),
            a_pos_rbc(),
            units,
            "dr.rao".to_string(),
        )
    }

    /// H1 A+/RBC：10 單位（2 天到期）與 8 單位（10 天到期）
    fn scenario() -> (Arc<MemoryInventoryStore>, Arc<MemoryTransferLedger>, TransferAllocator) {
        let inventory = Arc::new(MemoryInventoryStore::with_units(vec![
            batch("H1", a_pos_rbc(), 8, 10),
            batch("H1", a_pos_rbc(), 10, 2),
            batch(
                "H1",
                StockKey::new(BloodGroup::ONegative, Component::Rbc),
                5,
                1,
            ),
        ]));
        let ledger = Arc::new(MemoryTransferLedger::new());
        let allocator = TransferAllocator::new(inventory.clone(), ledger.clone());
        (inventory, ledger, allocator)
    }

    fn units_for(inventory: &MemoryInventoryStore, key: StockKey) -> Vec<u32> {
        let mut batches = inventory
            .get_all(&InventoryFilter::for_key("H1", key))
            .unwrap();
        batches.sort_by_key(|b| b.expiry_date);
        batches.iter().map(|b| b.units).collect()
    }

    #[test]
    fn test_approve_depletes_earliest_expiry_first() {
        let (inventory, ledger, allocator) = scenario();

        let transfer = allocator.approve_transfer(request(12)).unwrap();

        // 10 單位批次整批移除，8 單位批次剩 6
        assert_eq!(units_for(&inventory, a_pos_rbc()), vec![6]);
        assert_eq!(transfer.units, 12);
        assert_eq!(transfer.status, TransferStatus::Approved);
        assert_eq!(transfer.approved_by.as_deref(), Some("dr.rao"));
        assert!(transfer.approved_at.is_some());
        assert_eq!(ledger.list().unwrap().len(), 1);
    }

    #[test]
    fn test_insufficient_inventory_leaves_stock_unchanged() {
        let (inventory, ledger, allocator) = scenario();

        let result = allocator.approve_transfer(request(19));

        match result {
            Err(BloodflowError::InsufficientInventory {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 19);
                assert_eq!(available, 18);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(units_for(&inventory, a_pos_rbc()), vec![10, 8]);
        assert!(ledger.list().unwrap().is_empty());
    }

    #[test]
    fn test_exact_drain_removes_all_batches() {
        let (inventory, _, allocator) = scenario();

        allocator.approve_transfer(request(18)).unwrap();

        assert!(units_for(&inventory, a_pos_rbc()).is_empty());
    }

    #[test]
    fn test_other_keys_are_untouched() {
        let (inventory, _, allocator) = scenario();
        let o_neg = StockKey::new(BloodGroup::ONegative, Component::Rbc);

        allocator.approve_transfer(request(3)).unwrap();

        assert_eq!(units_for(&inventory, o_neg), vec![5]);
        assert_eq!(units_for(&inventory, a_pos_rbc()), vec![7, 8]);
    }

    #[test]
    fn test_no_batches_is_insufficient() {
        let (_, _, allocator) = scenario();
        let mut req = request(1);
        req.source_hospital_id = "H9".to_string();

        let result = allocator.approve_transfer(req);
        assert!(matches!(
            result,
            Err(BloodflowError::InsufficientInventory { available: 0, .. })
        ));
    }

    #[rstest]
    #[case(0, "H2", "dr.rao")]
    #[case(5, "H1", "dr.rao")]
    #[case(5, "H2", "   ")]
    fn test_invalid_requests(#[case] units: u32, #[case] destination: &str, #[case] approver: &str) {
        let (inventory, _, allocator) = scenario();
        let mut req = request(units);
        req.destination_hospital_id = destination.to_string();
        req.approved_by = approver.to_string();

        let result = allocator.approve_transfer(req);

        assert!(matches!(result, Err(BloodflowError::InvalidRequest(_))));
        assert_eq!(units_for(&inventory, a_pos_rbc()), vec![10, 8]);
    }

    #[test]
    fn test_from_recommendation_carries_metrics() {
        let recommendation = TransferRecommendation {
            source_hospital_id: "H1".to_string(),
            source_hospital_name: "Hospital 1".to_string(),
            destination_hospital_id: "H2".to_string(),
            destination_hospital_name: "Hospital 2".to_string(),
            blood_group: BloodGroup::APositive,
            component: Component::Rbc,
            units: 4,
            urgency_score: 0.812,
            distance_km: 12.5,
            eta_minutes: 19,
            days_to_expiry: 2,
        };
        let (_, _, allocator) = scenario();

        let transfer = allocator
            .approve_transfer(TransferRequest::from_recommendation(&recommendation, "ops"))
            .unwrap();

        assert_eq!(transfer.urgency_score, Some(0.812));
        assert_eq!(transfer.distance_km, Some(12.5));
        assert_eq!(transfer.eta_minutes, Some(19));
        assert_eq!(transfer.units, 4);
    }

    struct FailingLedger;

    impl TransferLedger for FailingLedger {
        fn create(&self, _data: NewTransfer) -> Result<Transfer> {
            Err(BloodflowError::Store("ledger unavailable".to_string()))
        }

        fn get(&self, _transfer_id: uuid::Uuid) -> Result<Option<Transfer>> {
            Ok(None)
        }

        fn list(&self) -> Result<Vec<Transfer>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_ledger_failure_reverts_depletion() {
        let inventory = Arc::new(MemoryInventoryStore::with_units(vec![
            batch("H1", a_pos_rbc(), 10, 2),
            batch("H1", a_pos_rbc(), 8, 10),
        ]));
        let allocator = TransferAllocator::new(inventory.clone(), Arc::new(FailingLedger));

        let result = allocator.approve_transfer(request(12));

        assert!(matches!(result, Err(BloodflowError::Store(_))));
        assert_eq!(units_for(&inventory, a_pos_rbc()), vec![10, 8]);
    }

    struct CountingObserver {
        calls: AtomicUsize,
        fail: bool,
    }

    impl TransferObserver for CountingObserver {
        fn on_transfer_approved(&self, _transfer: &Transfer) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BloodflowError::Store("webhook down".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_observers_are_notified_and_failures_ignored() {
        let (_, _, allocator) = scenario();
        let failing = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let healthy = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        allocator.add_observer(failing.clone());
        allocator.add_observer(healthy.clone());

        assert!(allocator.approve_transfer(request(2)).is_ok());
        assert!(allocator.approve_transfer(request(19)).is_err());

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_approvals_never_overdraw() {
        let inventory = Arc::new(MemoryInventoryStore::with_units(vec![
            batch("H1", a_pos_rbc(), 7, 2),
            batch("H1", a_pos_rbc(), 6, 4),
            batch("H1", a_pos_rbc(), 7, 9),
        ]));
        let ledger = Arc::new(MemoryTransferLedger::new());
        let allocator = TransferAllocator::new(inventory.clone(), ledger.clone());

        let successes = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if allocator.approve_transfer(request(3)).is_ok() {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        // 20 單位最多支撐 6 次 3 單位的調撥
        assert_eq!(successes.load(Ordering::SeqCst), 6);
        assert_eq!(units_for(&inventory, a_pos_rbc()).iter().sum::<u32>(), 2);
        assert_eq!(ledger.list().unwrap().len(), 6);
    }

    proptest! {
        #[test]
        fn prop_fifo_depletion(sizes in prop::collection::vec(1u32..20, 1..8), fraction in 0.0f64..=1.0) {
            // 以反向到期順序寫入，確保扣減不依賴插入順序
            let units: Vec<InventoryUnit> = sizes
                .iter()
                .enumerate()
                .rev()
                .map(|(i, qty)| batch("H1", a_pos_rbc(), *qty, i as i64))
                .collect();
            let total: u32 = sizes.iter().sum();
            let requested = ((f64::from(total) * fraction).floor() as u32).max(1);

            let inventory = Arc::new(MemoryInventoryStore::with_units(units));
            let allocator = TransferAllocator::new(inventory.clone(), Arc::new(MemoryTransferLedger::new()));

            allocator.approve_transfer(request(requested)).unwrap();

            let remaining = units_for(&inventory, a_pos_rbc());
            prop_assert_eq!(remaining.iter().sum::<u32>(), total - requested);

            // 剩餘批次必為原序列的後綴，僅第一個可能被部分扣減
            let suffix = &sizes[sizes.len() - remaining.len()..];
            if let Some((first, rest)) = remaining.split_first() {
                prop_assert!(*first <= suffix[0]);
                prop_assert_eq!(rest, &suffix[1..]);
            }
        }
    }
}
