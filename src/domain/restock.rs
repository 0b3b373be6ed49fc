// ==========================================
// 屋面工程材料库存系统 - 补货决策模型
// ==========================================
// 用途: 低库存预警（规划器输入）与补货建议（规划器输出）
// ==========================================

use crate::domain::types::RestockPriority;
use serde::{Deserialize, Serialize};

// ==========================================
// ProjectUsage - 项目用量
// ==========================================
// 用途: 预警中携带的需求信号，平均值参与补货目标计算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectUsage {
    pub project_id: String,
    pub quantity: i64,
}

// ==========================================
// StockWarning - 低库存预警
// ==========================================
// 说明: projected_stock = current_stock - reserved_for_projects，
//       为负或现货为零时 critical_level = true
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockWarning {
    pub material_id: String,
    pub material_name: String,
    pub current_stock: i64,
    pub reserved_for_projects: i64,
    pub projected_stock: i64,
    pub critical_level: bool,
    pub projects_using: Vec<ProjectUsage>,
}

// ==========================================
// StockSuggestion - 补货建议
// ==========================================
// 说明: suggested_stock 是绝对目标值（apply 时直接 set，不是增量）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSuggestion {
    pub material_id: String,
    pub material_name: String,
    pub current_stock: i64,
    pub suggested_stock: i64,
    pub stock_to_add: i64, // suggested_stock - current_stock（> 0 才产出建议）
    pub priority: RestockPriority,
    pub confidence: f64, // [0, 1]
    pub reason: String,
}
