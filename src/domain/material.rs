// ==========================================
// 屋面工程材料库存系统 - 物料领域模型
// ==========================================
// 红线: 目录物料在单次计算内不可变，仅由外部价格目录维护流程修改
// 红线: warehouse_material.quantity 是唯一权威库存计数器，
//       只允许 Consume/Return 两个操作修改
// ==========================================

use crate::domain::types::MaterialCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Material - 目录物料（价格目录条目）
// ==========================================
// 用途: 需求计算器选型与计价、补货规划器计算单位体积
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    // ===== 主键 =====
    pub material_id: String, // 物料唯一标识

    // ===== 基础信息 =====
    pub category: MaterialCategory, // 类别（七个固定角色之一）
    pub name: String,               // 名称（需求计算器按子串匹配选型）
    pub label: Option<String>,      // 展示名
    pub unit_price: f64,            // 单价（LABOR 类别为费率）
    pub unit: String,               // 计量单位（m2/m/件/包）

    // ===== 物理尺寸（用于体积推算，可缺省）=====
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    pub unit_volume_m3: Option<f64>, // 显式单位体积，优先于尺寸推算

    // ===== 状态 =====
    pub is_active: bool, // 失效物料不参与选型与补货

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// WarehouseMaterial - 仓库库存行
// ==========================================
// 红线: quantity 永不为负（schema 层 CHECK + 消耗事务内复核）
// 说明: 行存在但 quantity=0 表示“已跟踪、暂无库存”，
//       与“未跟踪”区分（预留时 find-or-create 产生零库存行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseMaterial {
    pub id: String,               // 代理主键（UUID）
    pub warehouse_id: String,     // 所属仓库
    pub material_id: String,      // 目录物料
    pub quantity: i64,            // 在库数量（权威计数器）
    pub is_active: bool,          // 失效行不计入容积占用与预警
    pub price_adjustment: f64,    // 仓库所在地价格调整（仅展示口径使用）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
