// ==========================================
// API 集成测试
// ==========================================
// 职责: 验证状态迁移联动分发与统一结果外壳
// - ACCEPTED/IN_PROGRESS 失败阻断迁移，退回类失败不阻断
// - 物料汇总计数口径
// ==========================================


use roofing_stock::api::{AllocationApi, ErrorKind};
use roofing_stock::config::ConfigManager;
use roofing_stock::db;
use roofing_stock::domain::types::{AllocationStatus, ProjectStatus};
use roofing_stock::engine::AllocationEngine;
use roofing_stock::repository::{
    MaterialCatalogRepository, ProjectMaterialRepository, ProjectRepository,
    WarehouseMaterialRepository,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use crate::test_helpers::{
    create_test_db, seed_material, seed_project, seed_stock, seed_warehouse, stock_quantity,
};

// ==========================================
// 测试辅助函数
// ==========================================

fn setup_env() -> (NamedTempFile, Arc<Mutex<Connection>>, Arc<AllocationApi>) {
    let (temp_file, db_path) = create_test_db().unwrap();

    let conn = Arc::new(Mutex::new(db::open_sqlite_connection(&db_path).unwrap()));
    let catalog_repo = Arc::new(MaterialCatalogRepository::from_connection(conn.clone()));
    let stock_repo = Arc::new(WarehouseMaterialRepository::from_connection(conn.clone()));
    let project_repo = Arc::new(ProjectRepository::from_connection(conn.clone()));
    let project_material_repo = Arc::new(ProjectMaterialRepository::from_connection(conn.clone()));
    let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());

    let engine = Arc::new(AllocationEngine::new(
        catalog_repo,
        stock_repo,
        project_repo,
        project_material_repo,
        config,
    ));
    let api = Arc::new(AllocationApi::new(engine));

    (temp_file, conn, api)
}

fn seed_standard(conn: &Connection) {
    seed_warehouse(conn, "W001", Some(500.0)).unwrap();
    seed_material(conn, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1)).unwrap();
    seed_stock(conn, "W001", "M001", 100).unwrap();
    seed_project(conn, "P001", Some("W001"), 50.0, "corrugated-0.4").unwrap();
}

// ==========================================
// 测试1: 状态迁移联动全流程
// ==========================================

#[test]
fn test_status_change_dispatch_flow() {
    let (_temp_file, conn, api) = setup_env();
    {
        let guard = conn.lock().unwrap();
        seed_standard(&guard);
    }

    // 无物料动作的状态
    let outcome = api.handle_status_change("P001", ProjectStatus::OfferSent);
    assert!(outcome.proceed);

    // ACCEPTED → 预留，库存不变
    let outcome = api.handle_status_change("P001", ProjectStatus::Accepted);
    assert!(outcome.proceed, "{}", outcome.message);
    {
        let guard = conn.lock().unwrap();
        assert_eq!(stock_quantity(&guard, "W001", "M001").unwrap(), 100);
    }

    // IN_PROGRESS → 消耗，库存 100 → 45
    let outcome = api.handle_status_change("P001", ProjectStatus::InProgress);
    assert!(outcome.proceed, "{}", outcome.message);
    {
        let guard = conn.lock().unwrap();
        assert_eq!(stock_quantity(&guard, "W001", "M001").unwrap(), 45);
    }

    // ARCHIVED → 退回，库存恢复
    let outcome = api.handle_status_change("P001", ProjectStatus::Archived);
    assert!(outcome.proceed);
    let guard = conn.lock().unwrap();
    assert_eq!(stock_quantity(&guard, "W001", "M001").unwrap(), 100);
}

// ==========================================
// 测试2: 预留/消耗失败阻断迁移
// ==========================================

#[test]
fn test_blocking_failures_stop_transition() {
    let (_temp_file, conn, api) = setup_env();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(500.0)).unwrap();
        seed_material(&guard, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1))
            .unwrap();
        seed_stock(&guard, "W001", "M001", 10).unwrap();
        seed_project(&guard, "P001", Some("W001"), 50.0, "corrugated-0.4").unwrap();
    }

    // 在库 10 < 需求 55 → 预留失败，迁移必须被阻断
    let outcome = api.handle_status_change("P001", ProjectStatus::Accepted);
    assert!(!outcome.proceed);
    assert_eq!(outcome.error, Some(ErrorKind::InsufficientMaterials));

    // 无预留时消耗 → 阻断
    let outcome = api.handle_status_change("P001", ProjectStatus::InProgress);
    assert!(!outcome.proceed);
    assert_eq!(outcome.error, Some(ErrorKind::NoReservedMaterials));
}

// ==========================================
// 测试3: 退回失败不阻断迁移（尽力而为）
// ==========================================

#[test]
fn test_return_failure_does_not_block_transition() {
    let (_temp_file, _conn, api) = setup_env();

    // 项目不存在: 退回失败，但状态迁移已是既成事实，放行并记录
    let outcome = api.handle_status_change("P-MISSING", ProjectStatus::Rejected);
    assert!(outcome.proceed);
    assert_eq!(outcome.error, Some(ErrorKind::ProjectNotFound));
}

// ==========================================
// 测试4: 物料汇总计数口径
// ==========================================

#[test]
fn test_material_summary_counts() {
    let (_temp_file, conn, api) = setup_env();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(500.0)).unwrap();
        seed_material(&guard, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1))
            .unwrap();
        seed_material(&guard, "M010", "VENTILATION", "vent-standard", 45.0, Some(0.2)).unwrap();
        seed_stock(&guard, "W001", "M001", 100).unwrap();
        seed_stock(&guard, "W001", "M010", 20).unwrap();
        seed_project(&guard, "P001", Some("W001"), 50.0, "corrugated-0.4").unwrap();
        guard
            .execute(
                "UPDATE project SET ventilation_pieces = 4 WHERE project_id = 'P001'",
                [],
            )
            .unwrap();
    }

    assert!(api.reserve("P001").success);
    assert!(api.consume("P001").success);

    let summary = api.material_summary("P001").unwrap();
    assert_eq!(summary.total_materials, 2);
    assert_eq!(summary.consumed_materials, 2);
    assert_eq!(summary.reserved_materials, 0);
    assert_eq!(summary.returned_materials, 0);
    assert_eq!(summary.cancelled_materials, 0);
    assert!(summary
        .materials
        .iter()
        .all(|m| m.status == AllocationStatus::Consumed));

    // 行成本 = 数量 × (目录单价 + 价格调整 0)
    let main = summary
        .materials
        .iter()
        .find(|m| m.material_id == "M001")
        .unwrap();
    assert_eq!(main.quantity, 55);
    assert!((main.line_cost - 55.0 * 120.0).abs() < 1e-9);

    // 退回后计数口径切换
    assert!(api.return_materials("P001", Some("归档")).success);
    let summary = api.material_summary("P001").unwrap();
    assert_eq!(summary.returned_materials, 2);
    assert_eq!(summary.consumed_materials, 0);

    // 汇总对不存在的项目报 PROJECT_NOT_FOUND
    let err = api.material_summary("P-MISSING").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectNotFound);
}

// ==========================================
// 测试5: 已消耗项目重复 ACCEPTED → 跳过预留
// ==========================================

#[test]
fn test_reserve_skipped_when_already_consumed() {
    let (_temp_file, conn, api) = setup_env();
    {
        let guard = conn.lock().unwrap();
        seed_standard(&guard);
    }

    assert!(api.reserve("P001").success);
    assert!(api.consume("P001").success);

    // 已消耗后再次 ACCEPTED: 跳过且不产生新预留
    let outcome = api.handle_status_change("P001", ProjectStatus::Accepted);
    assert!(outcome.proceed);

    let guard = conn.lock().unwrap();
    // 库存保持消耗后数量，没有被重复预留/扣减
    assert_eq!(stock_quantity(&guard, "W001", "M001").unwrap(), 45);
}
