// ==========================================
// 屋面工程材料库存系统 - 项目仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 项目工作流字段归外部系统，核心只写 materials_consumed 标志
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::project::Project;
use crate::domain::types::ProjectStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ProjectRepository - 项目仓储
// ==========================================

/// 项目仓储
/// 职责: 管理 project 表的查询与消耗标志更新
pub struct ProjectRepository {
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

fn map_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    let status_str: String = row.get(2)?;
    Ok(Project {
        project_id: row.get(0)?,
        project_name: row.get(1)?,
        status: ProjectStatus::from_str(&status_str).unwrap_or(ProjectStatus::New), // 默认值
        roof_area_m2: row.get(3)?,
        roof_material: row.get(4)?,
        gutter_length_m: row.get(5)?,
        gutter_type: row.get(6)?,
        ridge_length_m: row.get(7)?,
        ridge_type: row.get(8)?,
        insulation_thickness_mm: row.get(9)?,
        ventilation_pieces: row.get(10)?,
        warehouse_id: row.get(11)?,
        materials_consumed: row.get::<_, i64>(12)? != 0,
        materials_consumed_at: row
            .get::<_, Option<String>>(13)?
            .map(|s| parse_ts(&s)),
        created_at: parse_ts(&row.get::<_, String>(14)?),
        updated_at: parse_ts(&row.get::<_, String>(15)?),
    })
}

const PROJECT_COLUMNS: &str = r#"
    project_id, project_name, status, roof_area_m2, roof_material,
    gutter_length_m, gutter_type, ridge_length_m, ridge_type,
    insulation_thickness_mm, ventilation_pieces, warehouse_id,
    materials_consumed, materials_consumed_at, created_at, updated_at
"#;

impl ProjectRepository {
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

    /// 按 ID 查询项目
    pub fn find_by_id(&self, project_id: &str) -> RepositoryResult<Option<Project>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM project WHERE project_id = ?1", PROJECT_COLUMNS);
        let project = conn
            .query_row(&sql, params![project_id], map_project)
            .optional()?;
        Ok(project)
    }

    /// 插入项目（外部工作流/测试数据入口）
    pub fn insert(&self, project: &Project) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO project (
                project_id, project_name, status, roof_area_m2, roof_material,
                gutter_length_m, gutter_type, ridge_length_m, ridge_type,
                insulation_thickness_mm, ventilation_pieces, warehouse_id,
                materials_consumed, materials_consumed_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                project.project_id,
                project.project_name,
                project.status.to_db_str(),
                project.roof_area_m2,
                project.roof_material,
                project.gutter_length_m,
                project.gutter_type,
                project.ridge_length_m,
                project.ridge_type,
                project.insulation_thickness_mm,
                project.ventilation_pieces,
                project.warehouse_id,
                project.materials_consumed as i64,
                project.materials_consumed_at.map(|t| t.to_rfc3339()),
                project.created_at.to_rfc3339(),
                project.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 更新项目状态（外部工作流入口）
    pub fn update_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE project SET status = ?1, updated_at = ?2 WHERE project_id = ?3",
            params![status.to_db_str(), Utc::now().to_rfc3339(), project_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Project".to_string(),
                id: project_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新消耗标志与时间戳
    ///
    /// # 参数
    /// - project_id: 项目 ID
    /// - consumed: 消耗是否生效（Consume 后 true，Return 后 false）
    pub fn set_materials_consumed(
        &self,
        project_id: &str,
        consumed: bool,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute(
            r#"
            UPDATE project
            SET materials_consumed = ?1,
                materials_consumed_at = CASE WHEN ?1 = 1 THEN ?2 ELSE NULL END,
                updated_at = ?2
            WHERE project_id = ?3
            "#,
            params![consumed as i64, now, project_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Project".to_string(),
                id: project_id.to_string(),
            });
        }
        Ok(())
    }
}
