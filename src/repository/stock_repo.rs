// ==========================================
// 屋面工程材料库存系统 - 仓库库存仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 预留/消耗/退回对库存行的修改不走本仓储，
//       统一在 allocation_repo 的项目级事务内完成
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::material::WarehouseMaterial;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// WarehouseMaterialRepository - 仓库库存仓储
// ==========================================

/// 仓库库存仓储
/// 职责: 管理 warehouse_material 表（权威库存计数器）的查询与补货写入
pub struct WarehouseMaterialRepository {
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

fn map_warehouse_material(row: &Row<'_>) -> SqliteResult<WarehouseMaterial> {
    Ok(WarehouseMaterial {
        id: row.get(0)?,
        warehouse_id: row.get(1)?,
        material_id: row.get(2)?,
        quantity: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        price_adjustment: row.get(5)?,
        created_at: parse_ts(&row.get::<_, String>(6)?),
        updated_at: parse_ts(&row.get::<_, String>(7)?),
    })
}

const WAREHOUSE_MATERIAL_COLUMNS: &str = r#"
    id, warehouse_id, material_id, quantity, is_active, price_adjustment,
    created_at, updated_at
"#;

impl WarehouseMaterialRepository {
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

    /// 按 ID 查询库存行
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<WarehouseMaterial>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM warehouse_material WHERE id = ?1",
            WAREHOUSE_MATERIAL_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![id], map_warehouse_material)
            .optional()?;
        Ok(row)
    }

    /// 按 (仓库, 物料) 查询库存行
    pub fn find_by_warehouse_and_material(
        &self,
        warehouse_id: &str,
        material_id: &str,
    ) -> RepositoryResult<Option<WarehouseMaterial>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM warehouse_material WHERE warehouse_id = ?1 AND material_id = ?2",
            WAREHOUSE_MATERIAL_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![warehouse_id, material_id], map_warehouse_material)
            .optional()?;
        Ok(row)
    }

    /// 查询仓库全部有效库存行（补货规划器口径）
    pub fn list_active_by_warehouse(
        &self,
        warehouse_id: &str,
    ) -> RepositoryResult<Vec<WarehouseMaterial>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM warehouse_material WHERE warehouse_id = ?1 AND is_active = 1 ORDER BY material_id",
            WAREHOUSE_MATERIAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![warehouse_id], map_warehouse_material)?
            .collect::<SqliteResult<Vec<WarehouseMaterial>>>()?;
        Ok(rows)
    }

    /// 读取库存时点快照（可用性校验输入）
    ///
    /// # 返回
    /// - HashMap<material_id, quantity>：缺行的物料视为 0，由调用方处理
    pub fn stock_snapshot(&self, warehouse_id: &str) -> RepositoryResult<HashMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT material_id, quantity FROM warehouse_material WHERE warehouse_id = ?1",
        )?;
        let mut snapshot = HashMap::new();
        let rows = stmt.query_map(params![warehouse_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (material_id, quantity) = row?;
            snapshot.insert(material_id, quantity);
        }
        Ok(snapshot)
    }

    /// 批量设定库存数量（补货建议落库，绝对值覆盖）
    ///
    /// # 参数
    /// - warehouse_id: 仓库 ID
    /// - targets: (material_id, 目标数量) 列表
    ///
    /// # 返回
    /// - Ok(usize): 实际写入的行数
    ///
    /// # 说明
    /// - 缺行的物料 find-or-create（数量从 0 直接覆盖为目标值）
    /// - 使用事务确保批量原子性
    pub fn set_quantities(
        &self,
        warehouse_id: &str,
        targets: &[(String, i64)],
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut count = 0;
        for (material_id, quantity) in targets {
            if *quantity < 0 {
                return Err(RepositoryError::FieldValueError {
                    field: "quantity".to_string(),
                    message: format!("目标库存不可为负: {}", quantity),
                });
            }
            tx.execute(
                r#"
                INSERT INTO warehouse_material (
                    id, warehouse_id, material_id, quantity, is_active,
                    price_adjustment, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, 1, 0.0, ?5, ?5)
                ON CONFLICT(warehouse_id, material_id)
                DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    warehouse_id,
                    material_id,
                    quantity,
                    now,
                ],
            )?;
            count += 1;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }
}
