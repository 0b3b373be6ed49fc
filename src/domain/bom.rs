// ==========================================
// 屋面工程材料库存系统 - 物料清单与可用性报告
// ==========================================
// 用途: 需求计算器输出（BOM）与可用性校验器输出（短缺报告）
// ==========================================

use crate::domain::types::MaterialCategory;
use serde::{Deserialize, Serialize};

// ==========================================
// BomLine - 物料清单行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLine {
    pub material_id: String,
    pub category: MaterialCategory,
    pub material_name: String,
    pub quantity: i64,   // 已向上取整
    pub unit: String,
    pub unit_price: f64, // 目录单价（计算时点快照）
    pub total_cost: f64, // quantity × unit_price
}

// ==========================================
// BillOfMaterials - 物料清单
// ==========================================
// 说明: 规格为空/无目录匹配的角色直接缺行，不报错
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub project_id: String,
    pub line_items: Vec<BomLine>,
    pub total_cost: f64,
}

impl BillOfMaterials {
    /// 清单是否为空（项目规格全空时可能出现）
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }
}

// ==========================================
// MaterialShortage - 物料短缺项
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialShortage {
    pub material_id: String,
    pub material_name: String,
    pub required: i64,
    pub available: i64,
    pub shortage: i64, // required - available
}

// ==========================================
// AvailabilityReport - 可用性报告
// ==========================================
// 说明: 基于原始库存计数器的时点快照，不扣减其他项目的未消耗预留
//       （预留是咨询性的，真正的不足在消耗事务内拦截）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub warehouse_id: String,
    pub is_available: bool, // 短缺列表为空时为 true
    pub shortages: Vec<MaterialShortage>,
}
