//! 區域調撥示例
//!
//! 執行：`RUST_LOG=debug cargo run --example regional_rebalance`

use std::sync::Arc;

use bloodflow::{
    BloodBankService, BloodGroup, Component, EngineConfig, ForecastPoint, GeoPoint, Hospital,
    InventoryUnit, MemoryForecastStore, MemoryHospitalDirectory, MemoryInventoryStore,
    MemoryTransferLedger, TracingTransferObserver, TransferRequest,
};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== 區域血庫調撥示例 ===\n");

    let today = NaiveDate::from_ymd_opt(2025, 11, 1)
        .ok_or_else(|| anyhow::anyhow!("無效的日期"))?;

    let hospitals = vec![
        Hospital::new("KEM".to_string(), "KEM Hospital".to_string())
            .with_location(GeoPoint::new(19.0029, 72.8417)?)
            .with_contact("Blood Bank Desk".to_string(), "+91-22-2410-7000".to_string()),
        Hospital::new("JJ".to_string(), "JJ Hospital".to_string())
            .with_location(GeoPoint::new(18.9633, 72.8335)?),
        Hospital::new("HINDUJA".to_string(), "Hinduja Hospital".to_string())
            .with_location(GeoPoint::new(19.0330, 72.8380)?),
        Hospital::new("PUNE".to_string(), "Sassoon Pune".to_string())
            .with_location(GeoPoint::new(18.5286, 73.8740)?),
    ];

    let lot = |hospital: &str, group, component, units, expires_in: i64| {
        InventoryUnit::new(
            hospital.to_string(),
            group,
            component,
            units,
            today - Duration::days(20),
            today + Duration::days(expires_in),
        )
    };

    let units = vec![
        lot("KEM", BloodGroup::OPositive, Component::Rbc, 4, 15)?,
        lot("JJ", BloodGroup::OPositive, Component::Rbc, 9, 2)?,
        lot("JJ", BloodGroup::OPositive, Component::Rbc, 18, 12)?,
        lot("HINDUJA", BloodGroup::OPositive, Component::Rbc, 30, 6)?,
        lot("HINDUJA", BloodGroup::ANegative, Component::Platelets, 2, 1)?,
        lot("PUNE", BloodGroup::OPositive, Component::Rbc, 60, 3)?,
    ];

    let forecasts = vec![
        ForecastPoint::new(
            "KEM".to_string(),
            BloodGroup::OPositive,
            Component::Rbc,
            today + Duration::days(1),
            Decimal::from(16),
        )?
        .with_bounds(Decimal::from(12), Decimal::from(20)),
        ForecastPoint::new(
            "HINDUJA".to_string(),
            BloodGroup::ANegative,
            Component::Platelets,
            today,
            Decimal::from(5),
        )?,
    ];

    let inventory = Arc::new(MemoryInventoryStore::with_units(units));
    let service = BloodBankService::new(
        Arc::new(MemoryHospitalDirectory::with_hospitals(hospitals)),
        inventory.clone(),
        Arc::new(MemoryForecastStore::with_points(forecasts)),
        Arc::new(MemoryTransferLedger::new()),
        EngineConfig::default(),
    )?;
    service.add_observer(Arc::new(TracingTransferObserver));

    let summary = service.expiry_summary(today)?;
    println!("到期風險彙總:");
    println!("  - 總單位數: {} ({} 批次)", summary.total_units, summary.total_records);
    println!(
        "  - 高風險: {} 批次 / {} 單位（門檻 {} 天）",
        summary.high_risk_count, summary.high_risk_units, summary.threshold_days
    );
    println!("  - 3 天內到期: {} 單位\n", summary.units_expiring_3_days);

    let result = service.generate_recommendations(None, today)?;
    println!("調撥建議（共 {} 筆）:", result.recommendations.len());
    for rec in &result.recommendations {
        println!(
            "  - {} → {} {}/{} {} 單位 | 緊急度 {:.3} | {:.2} 公里 | 約 {} 分鐘 | {} 天到期",
            rec.source_hospital_name,
            rec.destination_hospital_name,
            rec.blood_group,
            rec.component,
            rec.units,
            rec.urgency_score,
            rec.distance_km,
            rec.eta_minutes,
            rec.days_to_expiry
        );
    }
    for warning in &result.warnings {
        println!("  ! [{:?}] {}: {}", warning.severity, warning.hospital_id, warning.message);
    }

    if let Some(top) = result.recommendations.first() {
        let transfer = service.approve_transfer(TransferRequest::from_recommendation(top, "demo.coordinator"))?;
        println!("\n已核准調撥 {}（{} 單位）", transfer.transfer_id, transfer.units);

        for line in service.stock_summary(&top.source_hospital_id)? {
            println!(
                "  {} 剩餘 {} 單位（{} 批次）",
                line.key, line.total_units, line.record_count
            );
        }
    }

    println!("\n批次剩餘: {}", inventory.snapshot().len());

    Ok(())
}
