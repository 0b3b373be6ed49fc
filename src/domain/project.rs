// ==========================================
// 屋面工程材料库存系统 - 项目领域模型
// ==========================================
// 红线: 项目工作流归外部系统所有；核心只读屋面规格字段与所属仓库，
//       只写 materials_consumed 标志与时间戳
// ==========================================

use crate::domain::types::{AllocationStatus, ProjectStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Project - 屋面工程项目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    // ===== 主键 =====
    pub project_id: String,

    // ===== 基础信息 =====
    pub project_name: String,
    pub status: ProjectStatus, // 外部工作流维护

    // ===== 屋面规格（需求计算器输入）=====
    pub roof_area_m2: f64,               // 屋面面积（主材/紧固件/保温层口径）
    pub roof_material: Option<String>,   // 主材选型（目录名子串匹配）
    pub gutter_length_m: f64,            // 檐沟长度
    pub gutter_type: Option<String>,     // 檐沟选型
    pub ridge_length_m: f64,             // 屋脊长度
    pub ridge_type: Option<String>,      // 屋脊选型
    pub insulation_thickness_mm: f64,    // 保温层厚度（0 = 不需要）
    pub ventilation_pieces: i64,         // 通风件数量（原样计入清单）

    // ===== 仓库分配 =====
    pub warehouse_id: Option<String>, // 未分配仓库时预留报 NO_WAREHOUSE

    // ===== 消耗标志（核心唯一可写字段）=====
    pub materials_consumed: bool,
    pub materials_consumed_at: Option<DateTime<Utc>>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// ProjectMaterial - 项目物料分配记录
// ==========================================
// 红线: 审计轨迹，不物理删除；同一 (project, warehouse_material) 至多一行，
//       重复预留更新既有行而非新建
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMaterial {
    pub id: String,                    // 代理主键（UUID）
    pub project_id: String,
    pub warehouse_material_id: String, // 关联库存行
    pub quantity: i64,                 // 预留/消耗数量
    pub status: AllocationStatus,
    pub reserved_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>, // 退回/取消原因
}
