// ==========================================
// 需求计算集成测试
// ==========================================
// 职责: 验证从目录仓储到物料清单的完整计算口径
// - 七个固定角色的数量/损耗/取整
// - 规格为空的角色缺行（不报错）
// ==========================================


use roofing_stock::config::ConfigManager;
use roofing_stock::db;
use roofing_stock::domain::types::MaterialCategory;
use roofing_stock::engine::RequirementCalculator;
use roofing_stock::repository::{MaterialCatalogRepository, ProjectRepository};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use crate::test_helpers::{create_test_db, seed_material, seed_warehouse};

// ==========================================
// 测试辅助函数
// ==========================================

fn setup_env() -> (NamedTempFile, Arc<Mutex<Connection>>) {
    let (temp_file, db_path) = create_test_db().unwrap();
    let conn = Arc::new(Mutex::new(db::open_sqlite_connection(&db_path).unwrap()));
    (temp_file, conn)
}

/// 七类目录 + 完整规格项目
fn seed_full_catalog_and_project(conn: &Connection) {
    seed_warehouse(conn, "W001", Some(500.0)).unwrap();
    seed_material(conn, "M-MAIN", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1)).unwrap();
    seed_material(conn, "M-GUT", "GUTTER", "gutter-125", 80.0, Some(0.02)).unwrap();
    seed_material(conn, "M-RIDGE", "RIDGE", "ridge-standard", 95.0, Some(0.02)).unwrap();
    seed_material(conn, "M-SCR", "SCREWS", "screws-pack", 15.0, Some(0.002)).unwrap();
    seed_material(conn, "M-INS", "INSULATION", "insulation-100", 30.0, Some(0.05)).unwrap();
    seed_material(conn, "M-VENT", "VENTILATION", "vent-standard", 45.0, Some(0.2)).unwrap();
    seed_material(conn, "M-LAB", "LABOR", "labor-rate", 0.15, None).unwrap();

    conn.execute(
        r#"
        INSERT INTO project (
            project_id, project_name, status, roof_area_m2, roof_material,
            gutter_length_m, gutter_type, ridge_length_m, ridge_type,
            insulation_thickness_mm, ventilation_pieces, warehouse_id
        ) VALUES (
            'P-FULL', '完整规格项目', 'OFFER_SENT', 50.0, 'corrugated-0.4',
            20.0, 'gutter-125', 8.0, 'ridge-standard',
            100.0, 4, 'W001'
        )
        "#,
        [],
    )
    .unwrap();
}

// ==========================================
// 测试1: 七角色完整清单
// ==========================================

#[test]
fn test_full_specification_yields_seven_lines() {
    let (_temp_file, conn) = setup_env();
    {
        let guard = conn.lock().unwrap();
        seed_full_catalog_and_project(&guard);
    }

    let catalog_repo = MaterialCatalogRepository::from_connection(conn.clone());
    let project_repo = ProjectRepository::from_connection(conn.clone());
    let config = ConfigManager::from_connection(conn.clone()).unwrap();

    let project = project_repo.find_by_id("P-FULL").unwrap().unwrap();
    let catalog = catalog_repo.list_active().unwrap();
    let calculator = RequirementCalculator::from_config(&config);
    let bom = calculator.compute_bom(&project, &catalog);

    assert_eq!(bom.line_items.len(), 7);

    let quantity_of = |category: MaterialCategory| {
        bom.line_items
            .iter()
            .find(|l| l.category == category)
            .map(|l| l.quantity)
            .unwrap()
    };

    // 主材: ceil(50 × 1.10) = 55
    assert_eq!(quantity_of(MaterialCategory::MainMaterial), 55);
    // 檐沟: ceil(20 × 1.05) = 21
    assert_eq!(quantity_of(MaterialCategory::Gutter), 21);
    // 屋脊: ceil(8 × 1.05) = 9（8.4 向上取整）
    assert_eq!(quantity_of(MaterialCategory::Ridge), 9);
    // 紧固件: ceil(50 × 0.25 × 1.10) = 14（13.75 向上取整）
    assert_eq!(quantity_of(MaterialCategory::Screws), 14);
    // 保温层: ceil(50 × 1.10) = 55
    assert_eq!(quantity_of(MaterialCategory::Insulation), 55);
    // 通风件: 原样 4
    assert_eq!(quantity_of(MaterialCategory::Ventilation), 4);
    // 人工: 固定 1
    assert_eq!(quantity_of(MaterialCategory::Labor), 1);

    // 总成本 = Σ 行成本
    let expected: f64 = bom.line_items.iter().map(|l| l.total_cost).sum();
    assert!((bom.total_cost - expected).abs() < 1e-9);
}

// ==========================================
// 测试2: 场景 D（面积 50，ventilation_pieces = 0）
// ==========================================

#[test]
fn test_scenario_area_only_project() {
    let (_temp_file, conn) = setup_env();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(500.0)).unwrap();
        seed_material(&guard, "M-MAIN", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1))
            .unwrap();
        seed_material(&guard, "M-VENT", "VENTILATION", "vent-standard", 45.0, Some(0.2)).unwrap();
        guard
            .execute(
                r#"
                INSERT INTO project (
                    project_id, project_name, status, roof_area_m2, roof_material,
                    ventilation_pieces, warehouse_id
                ) VALUES ('P001', '场景D', 'OFFER_SENT', 50.0, 'corrugated-0.4', 0, 'W001')
                "#,
                [],
            )
            .unwrap();
    }

    let catalog_repo = MaterialCatalogRepository::from_connection(conn.clone());
    let project_repo = ProjectRepository::from_connection(conn.clone());
    let config = ConfigManager::from_connection(conn.clone()).unwrap();

    let project = project_repo.find_by_id("P001").unwrap().unwrap();
    let catalog = catalog_repo.list_active().unwrap();
    let bom = RequirementCalculator::from_config(&config).compute_bom(&project, &catalog);

    // 主材 55 × 120，通风行整体缺失
    assert_eq!(bom.line_items.len(), 1);
    assert_eq!(bom.line_items[0].quantity, 55);
    assert!((bom.total_cost - 55.0 * 120.0).abs() < 1e-9);
    assert!(bom
        .line_items
        .iter()
        .all(|l| l.category != MaterialCategory::Ventilation));
}

// ==========================================
// 测试3: 配置覆写损耗系数
// ==========================================

#[test]
fn test_waste_factor_config_override() {
    let (_temp_file, conn) = setup_env();
    {
        let guard = conn.lock().unwrap();
        seed_warehouse(&guard, "W001", Some(500.0)).unwrap();
        seed_material(&guard, "M-MAIN", "MAIN_MATERIAL", "corrugated-0.4", 120.0, Some(0.1))
            .unwrap();
        guard
            .execute(
                r#"
                INSERT INTO project (
                    project_id, project_name, status, roof_area_m2, roof_material, warehouse_id
                ) VALUES ('P001', '覆写测试', 'OFFER_SENT', 100.0, 'corrugated-0.4', 'W001')
                "#,
                [],
            )
            .unwrap();
    }

    let catalog_repo = MaterialCatalogRepository::from_connection(conn.clone());
    let project_repo = ProjectRepository::from_connection(conn.clone());
    let config = ConfigManager::from_connection(conn.clone()).unwrap();
    // 损耗系数覆写为 1.2
    config.set_global_config_value("area_waste_factor", "1.2").unwrap();

    let project = project_repo.find_by_id("P001").unwrap().unwrap();
    let catalog = catalog_repo.list_active().unwrap();
    let bom = RequirementCalculator::from_config(&config).compute_bom(&project, &catalog);

    // 100 × 1.2 = 120
    assert_eq!(bom.line_items[0].quantity, 120);
}
