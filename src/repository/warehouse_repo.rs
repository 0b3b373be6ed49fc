// ==========================================
// 屋面工程材料库存系统 - 仓库仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 仓库主数据（地址/地理编码）由外部维护流程写入，核心只读容积
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::warehouse::Warehouse;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// WarehouseRepository - 仓库仓储
// ==========================================

/// 仓库仓储
/// 职责: 管理 warehouse 表的查询
pub struct WarehouseRepository {
    conn: Arc<Mutex<Connection>>,
}

/// 解析审计时间戳（RFC3339 或 SQLite datetime('now') 格式）
fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|n| Utc.from_utc_datetime(&n))
        })
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

fn map_warehouse(row: &Row<'_>) -> rusqlite::Result<Warehouse> {
    Ok(Warehouse {
        warehouse_id: row.get(0)?,
        warehouse_name: row.get(1)?,
        location: row.get(2)?,
        capacity_m3: row.get(3)?,
        created_at: parse_ts(&row.get::<_, String>(4)?),
        updated_at: parse_ts(&row.get::<_, String>(5)?),
    })
}

impl WarehouseRepository {
    /// 创建新的仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按 ID 查询仓库
    pub fn find_by_id(&self, warehouse_id: &str) -> RepositoryResult<Option<Warehouse>> {
        let conn = self.get_conn()?;
        let warehouse = conn
            .query_row(
                r#"
                SELECT warehouse_id, warehouse_name, location, capacity_m3,
                       created_at, updated_at
                FROM warehouse
                WHERE warehouse_id = ?1
                "#,
                params![warehouse_id],
                map_warehouse,
            )
            .optional()?;
        Ok(warehouse)
    }
}
