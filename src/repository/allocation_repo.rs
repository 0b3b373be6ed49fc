// ==========================================
// 屋面工程材料库存系统 - 项目物料分配仓储
// ==========================================
// 红线: 一个项目一次操作（预留/消耗/退回）= 一个事务，不允许半程写入
// 红线: 消耗的“读-校验-扣减”在事务内完成，与并发消耗串行化，
//       两个项目不可能对同一批库存同时通过充足性校验
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::project::ProjectMaterial;
use crate::domain::types::AllocationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

// ==========================================
// 行级 DTO
// ==========================================

/// 消耗明细行（消耗事务输出）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumedLine {
    pub material_id: String,
    pub material_name: String,
    pub quantity: i64,
    pub remaining_stock: i64, // 扣减后的在库数量
}

/// 退回明细行（退回事务输出）
///
/// 说明：
/// - 原状态 CONSUMED 的行库存已归还，restored_stock 为归还后的在库数量
/// - 原状态 RESERVED 的行从未扣减库存，restored_stock = None
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnedLine {
    pub material_id: String,
    pub material_name: String,
    pub quantity: i64,
    pub status: AllocationStatus, // RETURNED 或 CANCELLED
    pub restored_stock: Option<i64>,
}

/// 分配明细行（展示口径，含目录与库存行信息）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationDetail {
    pub material_id: String,
    pub material_name: String,
    pub unit: String,
    pub quantity: i64,
    pub status: AllocationStatus,
    pub unit_price: f64,
    pub price_adjustment: f64, // 仓库所在地价格调整
    pub reserved_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// ==========================================
// ProjectMaterialRepository - 项目物料分配仓储
// ==========================================

/// 项目物料分配仓储
/// 职责: project_material 审计轨迹 + 项目级原子事务（预留/消耗/退回）
pub struct ProjectMaterialRepository {
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

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|v| parse_ts(&v))
}

fn map_project_material(row: &Row<'_>) -> SqliteResult<ProjectMaterial> {
    let status_str: String = row.get(4)?;
    Ok(ProjectMaterial {
        id: row.get(0)?,
        project_id: row.get(1)?,
        warehouse_material_id: row.get(2)?,
        quantity: row.get(3)?,
        status: AllocationStatus::from_str(&status_str).unwrap_or(AllocationStatus::Reserved), // 默认值
        reserved_at: parse_ts_opt(row.get(5)?),
        consumed_at: parse_ts_opt(row.get(6)?),
        returned_at: parse_ts_opt(row.get(7)?),
        notes: row.get(8)?,
    })
}

const PROJECT_MATERIAL_COLUMNS: &str = r#"
    id, project_id, warehouse_material_id, quantity, status,
    reserved_at, consumed_at, returned_at, notes
"#;

impl ProjectMaterialRepository {
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

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询项目全部分配记录（审计轨迹）
    pub fn find_by_project(&self, project_id: &str) -> RepositoryResult<Vec<ProjectMaterial>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM project_material WHERE project_id = ?1 ORDER BY id",
            PROJECT_MATERIAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id], map_project_material)?
            .collect::<SqliteResult<Vec<ProjectMaterial>>>()?;
        Ok(rows)
    }

    /// 查询项目分配明细（含目录名称/单价与库存行价格调整）
    pub fn find_detail_by_project(
        &self,
        project_id: &str,
    ) -> RepositoryResult<Vec<AllocationDetail>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT mc.material_id, mc.name, mc.unit, pm.quantity, pm.status,
                   mc.unit_price, wm.price_adjustment,
                   pm.reserved_at, pm.consumed_at, pm.returned_at, pm.notes
            FROM project_material pm
            JOIN warehouse_material wm ON wm.id = pm.warehouse_material_id
            JOIN material_catalog mc ON mc.material_id = wm.material_id
            WHERE pm.project_id = ?1
            ORDER BY mc.category, mc.name
            "#,
        )?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                let status_str: String = row.get(4)?;
                Ok(AllocationDetail {
                    material_id: row.get(0)?,
                    material_name: row.get(1)?,
                    unit: row.get(2)?,
                    quantity: row.get(3)?,
                    status: AllocationStatus::from_str(&status_str)
                        .unwrap_or(AllocationStatus::Reserved), // 默认值
                    unit_price: row.get(5)?,
                    price_adjustment: row.get(6)?,
                    reserved_at: parse_ts_opt(row.get(7)?),
                    consumed_at: parse_ts_opt(row.get(8)?),
                    returned_at: parse_ts_opt(row.get(9)?),
                    notes: row.get(10)?,
                })
            })?
            .collect::<SqliteResult<Vec<AllocationDetail>>>()?;
        Ok(rows)
    }

    /// 按仓库汇总未消耗预留量（补货规划器需求信号）
    ///
    /// # 返回
    /// - HashMap<warehouse_material_id, Σ RESERVED 数量>
    pub fn reserved_totals_by_warehouse(
        &self,
        warehouse_id: &str,
    ) -> RepositoryResult<std::collections::HashMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT pm.warehouse_material_id, SUM(pm.quantity)
            FROM project_material pm
            JOIN warehouse_material wm ON wm.id = pm.warehouse_material_id
            WHERE wm.warehouse_id = ?1 AND pm.status = 'RESERVED'
            GROUP BY pm.warehouse_material_id
            "#,
        )?;
        let mut totals = std::collections::HashMap::new();
        let rows = stmt.query_map(params![warehouse_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (wm_id, total) = row?;
            totals.insert(wm_id, total);
        }
        Ok(totals)
    }

    /// 按仓库查询项目用量明细（补货规划器需求信号）
    ///
    /// # 返回
    /// - HashMap<warehouse_material_id, (project_id, 数量) 列表>（RESERVED/CONSUMED 口径）
    pub fn usage_by_warehouse(
        &self,
        warehouse_id: &str,
    ) -> RepositoryResult<std::collections::HashMap<String, Vec<(String, i64)>>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT pm.warehouse_material_id, pm.project_id, pm.quantity
            FROM project_material pm
            JOIN warehouse_material wm ON wm.id = pm.warehouse_material_id
            WHERE wm.warehouse_id = ?1 AND pm.status IN ('RESERVED', 'CONSUMED')
            ORDER BY pm.project_id
            "#,
        )?;
        let mut usage: std::collections::HashMap<String, Vec<(String, i64)>> =
            std::collections::HashMap::new();
        let rows = stmt.query_map(params![warehouse_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (wm_id, project_id, quantity) = row?;
            usage.entry(wm_id).or_default().push((project_id, quantity));
        }
        Ok(usage)
    }

    // ==========================================
    // 预留事务
    // ==========================================

    /// 预留项目物料（一个项目一个事务）
    ///
    /// # 参数
    /// - project_id: 项目 ID
    /// - warehouse_id: 仓库 ID
    /// - lines: (material_id, 数量) 清单行
    ///
    /// # 返回
    /// - Ok(usize): 写入/更新的分配记录数
    ///
    /// # 说明
    /// - 库存行 find-or-create，新建行数量为 0（“已跟踪、暂无库存”）
    /// - 分配记录 upsert：重复预留更新既有行，不产生重复行
    /// - **不扣减库存**（预留是咨询性的，扣减发生在消耗事务）
    /// - 已 CONSUMED 的行不被覆盖
    pub fn reserve_lines(
        &self,
        project_id: &str,
        warehouse_id: &str,
        lines: &[(String, i64)],
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut count = 0;
        for (material_id, quantity) in lines {
            let warehouse_material_id =
                Self::find_or_create_stock_row(&tx, warehouse_id, material_id, &now)?;

            tx.execute(
                r#"
                INSERT INTO project_material (
                    id, project_id, warehouse_material_id, quantity, status,
                    reserved_at, consumed_at, returned_at, notes
                ) VALUES (?1, ?2, ?3, ?4, 'RESERVED', ?5, NULL, NULL, NULL)
                ON CONFLICT(project_id, warehouse_material_id)
                DO UPDATE SET quantity = excluded.quantity,
                              status = 'RESERVED',
                              reserved_at = excluded.reserved_at,
                              consumed_at = NULL,
                              returned_at = NULL,
                              notes = NULL
                WHERE project_material.status != 'CONSUMED'
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    project_id,
                    warehouse_material_id,
                    quantity,
                    now,
                ],
            )?;
            count += 1;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(project_id, lines = count, "物料预留已写入");
        Ok(count)
    }

    /// 库存行 find-or-create（预留事务内使用）
    fn find_or_create_stock_row(
        tx: &Transaction<'_>,
        warehouse_id: &str,
        material_id: &str,
        now: &str,
    ) -> RepositoryResult<String> {
        tx.execute(
            r#"
            INSERT OR IGNORE INTO warehouse_material (
                id, warehouse_id, material_id, quantity, is_active,
                price_adjustment, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, 1, 0.0, ?4, ?4)
            "#,
            params![Uuid::new_v4().to_string(), warehouse_id, material_id, now],
        )?;

        let id: String = tx.query_row(
            "SELECT id FROM warehouse_material WHERE warehouse_id = ?1 AND material_id = ?2",
            params![warehouse_id, material_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ==========================================
    // 消耗事务
    // ==========================================

    /// 消耗项目已预留物料（一个项目一个事务）
    ///
    /// # 返回
    /// - Ok(Vec<ConsumedLine>): 全部扣减成功的明细（空表示无 RESERVED 行）
    /// - Err(StockShortage): 任一行库存不足，整个事务回滚，**不产生部分扣减**
    ///
    /// # 说明
    /// - 事务内重新校验 warehouse_material.quantity >= project_material.quantity：
    ///   预留不扣库存，两个并发接受的项目可能预留了同一批库存，
    ///   后到者在此处被拦截
    /// - 全部通过后扣减库存、置 CONSUMED、更新项目消耗标志，同一事务提交
    pub fn consume_reserved(&self, project_id: &str) -> RepositoryResult<Vec<ConsumedLine>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        // 事务内读取 RESERVED 行与当前库存
        let reserved: Vec<(String, i64, String, i64, String, String)> = {
            let mut stmt = tx.prepare(
                r#"
                SELECT pm.id, pm.quantity, wm.id, wm.quantity, wm.material_id, mc.name
                FROM project_material pm
                JOIN warehouse_material wm ON wm.id = pm.warehouse_material_id
                JOIN material_catalog mc ON mc.material_id = wm.material_id
                WHERE pm.project_id = ?1 AND pm.status = 'RESERVED'
                ORDER BY mc.category, mc.name
                "#,
            )?;
            let rows = stmt
                .query_map(params![project_id], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        if reserved.is_empty() {
            // 无可消耗行，未发生任何写入
            return Ok(Vec::new());
        }

        // 先整体校验，任一不足即回滚（事务 drop 即回滚）
        for (_, required, _, available, _, material_name) in &reserved {
            if available < required {
                return Err(RepositoryError::StockShortage {
                    material_name: material_name.clone(),
                    required: *required,
                    available: *available,
                });
            }
        }

        // 全部通过，逐行扣减并置 CONSUMED
        let mut consumed = Vec::with_capacity(reserved.len());
        for (pm_id, quantity, wm_id, available, material_id, material_name) in &reserved {
            tx.execute(
                "UPDATE warehouse_material SET quantity = quantity - ?1, updated_at = ?2 WHERE id = ?3",
                params![quantity, now, wm_id],
            )?;
            tx.execute(
                "UPDATE project_material SET status = 'CONSUMED', consumed_at = ?1 WHERE id = ?2",
                params![now, pm_id],
            )?;

            consumed.push(ConsumedLine {
                material_id: material_id.clone(),
                material_name: material_name.clone(),
                quantity: *quantity,
                remaining_stock: available - quantity,
            });
        }

        // 消耗标志与扣减同一事务生效
        tx.execute(
            r#"
            UPDATE project
            SET materials_consumed = 1, materials_consumed_at = ?1, updated_at = ?1
            WHERE project_id = ?2
            "#,
            params![now, project_id],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(project_id, lines = consumed.len(), "物料消耗已提交");
        Ok(consumed)
    }

    // ==========================================
    // 退回事务
    // ==========================================

    /// 退回项目物料（一个项目一个事务，幂等）
    ///
    /// # 参数
    /// - project_id: 项目 ID
    /// - reason: 退回原因（写入 notes）
    ///
    /// # 返回
    /// - Ok(Vec<ReturnedLine>): 处理的明细（空表示无未决行，幂等无操作）
    ///
    /// # 说明
    /// - 仅处理 RESERVED/CONSUMED 行；RETURNED/CANCELLED 终态行不在查询范围，
    ///   重复调用不产生二次归还
    /// - CONSUMED → 归还库存并置 RETURNED；RESERVED → 置 CANCELLED（从未扣减，无归还）
    pub fn return_outstanding(
        &self,
        project_id: &str,
        reason: Option<&str>,
    ) -> RepositoryResult<Vec<ReturnedLine>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        let outstanding: Vec<(String, i64, String, i64, String, String, String)> = {
            let mut stmt = tx.prepare(
                r#"
                SELECT pm.id, pm.quantity, wm.id, wm.quantity, wm.material_id, mc.name, pm.status
                FROM project_material pm
                JOIN warehouse_material wm ON wm.id = pm.warehouse_material_id
                JOIN material_catalog mc ON mc.material_id = wm.material_id
                WHERE pm.project_id = ?1 AND pm.status IN ('RESERVED', 'CONSUMED')
                ORDER BY mc.category, mc.name
                "#,
            )?;
            let rows = stmt
                .query_map(params![project_id], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        if outstanding.is_empty() {
            return Ok(Vec::new());
        }

        let mut returned = Vec::with_capacity(outstanding.len());
        for (pm_id, quantity, wm_id, stock, material_id, material_name, status_str) in &outstanding
        {
            let was_consumed = status_str == "CONSUMED";
            if was_consumed {
                // 库存归还只发生在已扣减的行
                tx.execute(
                    "UPDATE warehouse_material SET quantity = quantity + ?1, updated_at = ?2 WHERE id = ?3",
                    params![quantity, now, wm_id],
                )?;
                tx.execute(
                    "UPDATE project_material SET status = 'RETURNED', returned_at = ?1, notes = ?2 WHERE id = ?3",
                    params![now, reason, pm_id],
                )?;
            } else {
                tx.execute(
                    "UPDATE project_material SET status = 'CANCELLED', notes = ?1 WHERE id = ?2",
                    params![reason, pm_id],
                )?;
            }

            returned.push(ReturnedLine {
                material_id: material_id.clone(),
                material_name: material_name.clone(),
                quantity: *quantity,
                status: if was_consumed {
                    AllocationStatus::Returned
                } else {
                    AllocationStatus::Cancelled
                },
                restored_stock: if was_consumed { Some(stock + quantity) } else { None },
            });
        }

        tx.execute(
            r#"
            UPDATE project
            SET materials_consumed = 0, materials_consumed_at = NULL, updated_at = ?1
            WHERE project_id = ?2
            "#,
            params![now, project_id],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(project_id, lines = returned.len(), "物料退回已提交");
        Ok(returned)
    }
}
