// ==========================================
// 屋面工程材料库存系统 - 仓库领域模型
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Warehouse - 仓库
// ==========================================
// 说明: capacity_m3 缺省时补货规划器直接返回空建议（咨询性功能，不阻断）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: String,
    pub warehouse_name: String,
    pub location: Option<String>,
    pub capacity_m3: Option<f64>, // 容积上限（立方米）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
