// ==========================================
// 屋面工程材料库存系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供 schema 引导（建表幂等，库存计数器带非负约束）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 说明：
/// - warehouse_material.quantity 带 CHECK (quantity >= 0)，库存计数器永不为负
/// - project_material 对 (project_id, warehouse_material_id) 唯一，
///   同一项目同一库存行至多一条分配记录（审计轨迹，不物理删除）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS material_catalog (
            material_id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            name TEXT NOT NULL,
            label TEXT,
            unit_price REAL NOT NULL DEFAULT 0.0,
            unit TEXT NOT NULL,
            length_m REAL,
            width_m REAL,
            height_m REAL,
            unit_volume_m3 REAL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS warehouse (
            warehouse_id TEXT PRIMARY KEY,
            warehouse_name TEXT NOT NULL,
            location TEXT,
            capacity_m3 REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS warehouse_material (
            id TEXT PRIMARY KEY,
            warehouse_id TEXT NOT NULL REFERENCES warehouse(warehouse_id),
            material_id TEXT NOT NULL REFERENCES material_catalog(material_id),
            quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            price_adjustment REAL NOT NULL DEFAULT 0.0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(warehouse_id, material_id)
        );

        CREATE TABLE IF NOT EXISTS project (
            project_id TEXT PRIMARY KEY,
            project_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'NEW',
            roof_area_m2 REAL NOT NULL DEFAULT 0.0,
            roof_material TEXT,
            gutter_length_m REAL NOT NULL DEFAULT 0.0,
            gutter_type TEXT,
            ridge_length_m REAL NOT NULL DEFAULT 0.0,
            ridge_type TEXT,
            insulation_thickness_mm REAL NOT NULL DEFAULT 0.0,
            ventilation_pieces INTEGER NOT NULL DEFAULT 0,
            warehouse_id TEXT REFERENCES warehouse(warehouse_id),
            materials_consumed INTEGER NOT NULL DEFAULT 0,
            materials_consumed_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS project_material (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(project_id),
            warehouse_material_id TEXT NOT NULL REFERENCES warehouse_material(id),
            quantity INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'RESERVED',
            reserved_at TEXT,
            consumed_at TEXT,
            returned_at TEXT,
            notes TEXT,
            UNIQUE(project_id, warehouse_material_id)
        );

        CREATE INDEX IF NOT EXISTS idx_warehouse_material_wh
            ON warehouse_material(warehouse_id);
        CREATE INDEX IF NOT EXISTS idx_project_material_project
            ON project_material(project_id);
        CREATE INDEX IF NOT EXISTS idx_project_material_wm
            ON project_material(warehouse_material_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
