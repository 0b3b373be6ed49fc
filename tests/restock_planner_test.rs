// ==========================================
// 补货规划引擎测试
// ==========================================
// 职责: 验证容积约束补货建议与低库存预警派生
// - 需求目标 → 容积截断 → 下限保底 → 增量建议
// - 容积缺省时返回空建议（咨询性，不报错）
// - 建议按优先级/置信度排序，落库为绝对值覆盖
// ==========================================


use roofing_stock::config::ConfigManager;
use roofing_stock::db;
use roofing_stock::domain::restock::{ProjectUsage, StockWarning};
use roofing_stock::domain::types::RestockPriority;
use roofing_stock::engine::RestockPlanner;
use roofing_stock::repository::{
    MaterialCatalogRepository, ProjectMaterialRepository, WarehouseMaterialRepository,
    WarehouseRepository,
};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use crate::test_helpers::{
    create_test_db, seed_material, seed_project, seed_stock, seed_warehouse, stock_quantity,
};

// ==========================================
// 测试辅助函数
// ==========================================

fn setup_planner() -> (NamedTempFile, Arc<Mutex<Connection>>, RestockPlanner) {
    let (temp_file, db_path) = create_test_db().unwrap();

    let conn = Arc::new(Mutex::new(db::open_sqlite_connection(&db_path).unwrap()));
    let warehouse_repo = Arc::new(WarehouseRepository::from_connection(conn.clone()));
    let stock_repo = Arc::new(WarehouseMaterialRepository::from_connection(conn.clone()));
    let catalog_repo = Arc::new(MaterialCatalogRepository::from_connection(conn.clone()));
    let project_material_repo = Arc::new(ProjectMaterialRepository::from_connection(conn.clone()));
    let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());

    let planner = RestockPlanner::new(
        warehouse_repo,
        stock_repo,
        catalog_repo,
        project_material_repo,
        config,
    );

    (temp_file, conn, planner)
}

fn warning(
    material_id: &str,
    current: i64,
    reserved: i64,
    critical: bool,
    usages: Vec<i64>,
) -> StockWarning {
    StockWarning {
        material_id: material_id.to_string(),
        material_name: material_id.to_string(),
        current_stock: current,
        reserved_for_projects: reserved,
        projected_stock: current - reserved,
        critical_level: critical,
        projects_using: usages
            .into_iter()
            .enumerate()
            .map(|(i, quantity)| ProjectUsage {
                project_id: format!("P{:03}", i + 1),
                quantity,
            })
            .collect(),
    }
}

// ==========================================
// 测试1: 容积截断的需求目标（场景 C）
// ==========================================

#[test]
fn test_capacity_clamped_suggestion() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        // 容积 50 m3；占用 = (223 + 2) × 0.2 = 45 m3 → 余量 5 m3
        seed_warehouse(&guard, "W001", Some(50.0)).unwrap();
        seed_material(&guard, "M-VENT", "VENTILATION", "vent-standard", 45.0, Some(0.2)).unwrap();
        seed_material(&guard, "M-FILL", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.2))
            .unwrap();
        seed_stock(&guard, "W001", "M-VENT", 2).unwrap();
        seed_stock(&guard, "W001", "M-FILL", 223).unwrap();
    }

    // 需求目标: ceil((10×2 + 4) × 1.2) = 29；容积上限: floor(5 / 0.2) = 25
    // 下限: max(10×1.5, 10) = 15 → 最终 25，增量 25 − 2 = 23
    let warnings = vec![warning("M-VENT", 2, 10, true, vec![4, 4])];
    let suggestions = planner.suggest_restock("W001", &warnings).unwrap();

    assert_eq!(suggestions.len(), 1);
    let s = &suggestions[0];
    assert_eq!(s.suggested_stock, 25);
    assert_eq!(s.stock_to_add, 23);
    assert_eq!(s.priority, RestockPriority::Critical);
    // 0.5 + 0.3(critical) + 0.2(有项目在用)，占用率恰为 90% 不触发下调
    assert!((s.confidence - 1.0).abs() < 1e-9);
}

// ==========================================
// 测试2: 容积缺省/仓库不存在 → 空建议
// ==========================================

#[test]
fn test_missing_capacity_yields_empty() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W-NOCAP", None).unwrap();
        seed_material(&guard, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1))
            .unwrap();
        seed_stock(&guard, "W-NOCAP", "M001", 1).unwrap();
    }

    let warnings = vec![warning("M001", 1, 5, true, vec![5])];
    assert!(planner.suggest_restock("W-NOCAP", &warnings).unwrap().is_empty());
    assert!(planner.suggest_restock("W-MISSING", &warnings).unwrap().is_empty());
}

// ==========================================
// 测试3: 排序（critical 在前，组内置信度降序）
// ==========================================

#[test]
fn test_suggestions_sorted_by_priority_then_confidence() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(1000.0)).unwrap();
        for (id, name) in [
            ("M-A", "gutter-125"),
            ("M-B", "ridge-standard"),
            ("M-C", "screws-pack"),
        ] {
            seed_material(&guard, id, "GUTTER", name, 10.0, Some(0.01)).unwrap();
            seed_stock(&guard, "W001", id, 1).unwrap();
        }
    }

    let warnings = vec![
        // warning 级，有项目在用: 0.5 + 0.2 = 0.7
        warning("M-A", 1, 3, false, vec![3]),
        // critical 级，有项目在用: 0.5 + 0.3 + 0.2 = 1.0
        warning("M-B", 1, 3, true, vec![3]),
        // warning 级，无项目在用: 0.5
        warning("M-C", 1, 3, false, vec![]),
    ];
    let suggestions = planner.suggest_restock("W001", &warnings).unwrap();

    assert_eq!(suggestions.len(), 3);
    assert_eq!(suggestions[0].material_id, "M-B");
    assert_eq!(suggestions[0].priority, RestockPriority::Critical);
    assert_eq!(suggestions[1].material_id, "M-A");
    assert_eq!(suggestions[2].material_id, "M-C");
    assert!(suggestions[1].confidence > suggestions[2].confidence);
}

// ==========================================
// 测试3b: 高占用仓库的置信度下调与下限保底
// ==========================================

#[test]
fn test_high_utilization_penalty_and_floor() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        // 容积 50 m3；占用 (95 + 1) × 0.5 = 48 m3 → 占用率 96%
        seed_warehouse(&guard, "W001", Some(50.0)).unwrap();
        seed_material(&guard, "M-FILL", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.5))
            .unwrap();
        seed_material(&guard, "M-VENT", "VENTILATION", "vent-standard", 45.0, Some(0.5)).unwrap();
        seed_stock(&guard, "W001", "M-FILL", 95).unwrap();
        seed_stock(&guard, "W001", "M-VENT", 1).unwrap();
    }

    let warnings = vec![warning("M-VENT", 1, 2, true, vec![2])];
    let suggestions = planner.suggest_restock("W001", &warnings).unwrap();

    assert_eq!(suggestions.len(), 1);
    let s = &suggestions[0];
    // 需求 ceil((2×2 + 2) × 1.2) = 8；容积上限 floor(2/0.5) = 4；
    // 下限 max(2×1.5, 10) = 10 在截断之后保底 → 目标 10
    assert_eq!(s.suggested_stock, 10);
    assert_eq!(s.stock_to_add, 9);
    // 0.5 + 0.3 + 0.2 − 0.2（占用率 > 90%）
    assert!((s.confidence - 0.8).abs() < 1e-9);
}

// ==========================================
// 测试4: 库存已达目标 → 不产出建议
// ==========================================

#[test]
fn test_no_suggestion_when_stock_sufficient() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(1000.0)).unwrap();
        seed_material(&guard, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.01))
            .unwrap();
        seed_stock(&guard, "W001", "M001", 500).unwrap();
    }

    // 目标远低于在库 500 → 无建议
    let warnings = vec![warning("M001", 500, 10, false, vec![4])];
    assert!(planner.suggest_restock("W001", &warnings).unwrap().is_empty());
}

// ==========================================
// 测试5: 建议落库为绝对值覆盖
// ==========================================

#[test]
fn test_apply_suggestions_sets_absolute_quantity() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(1000.0)).unwrap();
        seed_material(&guard, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.01))
            .unwrap();
        seed_material(&guard, "M002", "GUTTER", "gutter-125", 80.0, Some(0.01)).unwrap();
        seed_stock(&guard, "W001", "M001", 2).unwrap();
        // M002 无库存行 → find-or-create
    }

    let warnings = vec![
        warning("M001", 2, 5, true, vec![5]),
        warning("M002", 0, 5, true, vec![5]),
    ];
    let suggestions = planner.suggest_restock("W001", &warnings).unwrap();
    assert_eq!(suggestions.len(), 2);

    let applied = planner.apply_suggestions("W001", &suggestions).unwrap();
    assert_eq!(applied, 2);

    let guard = conn.lock().unwrap();
    for s in &suggestions {
        // set 而非 add: 落库后数量等于建议的绝对目标值
        assert_eq!(
            stock_quantity(&guard, "W001", &s.material_id).unwrap(),
            s.suggested_stock
        );
    }
}

// ==========================================
// 测试6: 低库存预警派生
// ==========================================

#[test]
fn test_low_stock_warnings_derivation() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(1000.0)).unwrap();
        seed_material(&guard, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1))
            .unwrap();
        seed_material(&guard, "M002", "GUTTER", "gutter-125", 80.0, Some(0.01)).unwrap();
        let wm1 = seed_stock(&guard, "W001", "M001", 10).unwrap();
        seed_stock(&guard, "W001", "M002", 100).unwrap();
        seed_project(&guard, "P001", Some("W001"), 50.0, "corrugated-0.4").unwrap();

        // P001 预留 8 件 M001: projected = 10 − 8 = 2 < 阈值 10 → 预警
        guard
            .execute(
                r#"
                INSERT INTO project_material (
                    id, project_id, warehouse_material_id, quantity, status, reserved_at
                ) VALUES ('PM-1', 'P001', ?1, 8, 'RESERVED', datetime('now'))
                "#,
                params![wm1],
            )
            .unwrap();
    }

    let warnings = planner.low_stock_warnings("W001").unwrap();

    // M002 projected = 100，不预警
    assert_eq!(warnings.len(), 1);
    let w = &warnings[0];
    assert_eq!(w.material_id, "M001");
    assert_eq!(w.material_name, "corrugated-0.4");
    assert_eq!(w.current_stock, 10);
    assert_eq!(w.reserved_for_projects, 8);
    assert_eq!(w.projected_stock, 2);
    assert!(!w.critical_level);
    assert_eq!(w.projects_using.len(), 1);
    assert_eq!(w.projects_using[0].project_id, "P001");
    assert_eq!(w.projects_using[0].quantity, 8);
}

// ==========================================
// 测试7: 预留超出在库 → critical 预警
// ==========================================

#[test]
fn test_over_reserved_stock_flagged_critical() {
    let (_temp_file, conn, planner) = setup_planner();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(1000.0)).unwrap();
        seed_material(&guard, "M001", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1))
            .unwrap();
        let wm1 = seed_stock(&guard, "W001", "M001", 5).unwrap();
        seed_project(&guard, "P001", Some("W001"), 50.0, "corrugated-0.4").unwrap();

        guard
            .execute(
                r#"
                INSERT INTO project_material (
                    id, project_id, warehouse_material_id, quantity, status, reserved_at
                ) VALUES ('PM-1', 'P001', ?1, 12, 'RESERVED', datetime('now'))
                "#,
                params![wm1],
            )
            .unwrap();
    }

    let warnings = planner.low_stock_warnings("W001").unwrap();
    assert_eq!(warnings.len(), 1);
    // projected = 5 − 12 = −7 → critical
    assert_eq!(warnings[0].projected_stock, -7);
    assert!(warnings[0].critical_level);
}
