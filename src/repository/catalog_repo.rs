// ==========================================
// 屋面工程材料库存系统 - 价格目录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 目录由外部价格维护流程写入，核心只读
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::material::Material;
use crate::domain::types::MaterialCategory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// MaterialCatalogRepository - 价格目录仓储
// ==========================================

/// 价格目录仓储
/// 职责: 管理 material_catalog 表的只读查询
pub struct MaterialCatalogRepository {
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

fn map_material(row: &Row<'_>) -> SqliteResult<Material> {
    let category_str: String = row.get(1)?;
    Ok(Material {
        material_id: row.get(0)?,
        category: MaterialCategory::from_str(&category_str)
            .unwrap_or(MaterialCategory::MainMaterial), // 默认值
        name: row.get(2)?,
        label: row.get(3)?,
        unit_price: row.get(4)?,
        unit: row.get(5)?,
        length_m: row.get(6)?,
        width_m: row.get(7)?,
        height_m: row.get(8)?,
        unit_volume_m3: row.get(9)?,
        is_active: row.get::<_, i64>(10)? != 0,
        created_at: parse_ts(&row.get::<_, String>(11)?),
        updated_at: parse_ts(&row.get::<_, String>(12)?),
    })
}

const MATERIAL_COLUMNS: &str = r#"
    material_id, category, name, label, unit_price, unit,
    length_m, width_m, height_m, unit_volume_m3, is_active,
    created_at, updated_at
"#;

impl MaterialCatalogRepository {
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

    /// 按 ID 查询物料
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<Material>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM material_catalog WHERE material_id = ?1",
            MATERIAL_COLUMNS
        );
        let material = conn
            .query_row(&sql, params![material_id], map_material)
            .optional()?;
        Ok(material)
    }

    /// 查询全部有效物料（需求计算器输入）
    ///
    /// # 返回
    /// - Ok(Vec<Material>): 有效物料列表，按类别、名称排序
    pub fn list_active(&self) -> RepositoryResult<Vec<Material>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM material_catalog WHERE is_active = 1 ORDER BY category, name",
            MATERIAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let materials = stmt
            .query_map([], map_material)?
            .collect::<SqliteResult<Vec<Material>>>()?;
        Ok(materials)
    }

    /// 按类别查询有效物料
    pub fn find_by_category(
        &self,
        category: MaterialCategory,
    ) -> RepositoryResult<Vec<Material>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM material_catalog WHERE is_active = 1 AND category = ?1 ORDER BY name",
            MATERIAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let materials = stmt
            .query_map(params![category.to_db_str()], map_material)?
            .collect::<SqliteResult<Vec<Material>>>()?;
        Ok(materials)
    }
}
