// ==========================================
// 屋面工程材料库存系统 - 补货 API
// ==========================================
// 职责: 低库存预警查询、补货建议计算与落库
// 红线: 咨询性接口，建议计算失败不影响任何项目状态迁移
// ==========================================

use crate::api::error::{ApiError, ApiResult, ErrorKind};
use crate::domain::restock::{StockSuggestion, StockWarning};
use crate::engine::restock::RestockPlanner;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

// ==========================================
// 统一结果外壳
// ==========================================

/// 建议落库结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub success: bool,
    pub message: String,
    pub applied: usize,
    pub error: Option<ErrorKind>,
}

// ==========================================
// RestockApi - 补货 API
// ==========================================

/// 补货API
pub struct RestockApi {
    planner: Arc<RestockPlanner>,
}

impl RestockApi {
    /// 创建新的RestockApi实例
    pub fn new(planner: Arc<RestockPlanner>) -> Self {
        Self { planner }
    }

    /// 查询仓库低库存预警
    pub fn low_stock_warnings(&self, warehouse_id: &str) -> ApiResult<Vec<StockWarning>> {
        self.planner
            .low_stock_warnings(warehouse_id)
            .map_err(ApiError::from)
    }

    /// 计算补货建议（仓库容积缺省时为空列表）
    pub fn suggest_restock(
        &self,
        warehouse_id: &str,
        warnings: &[StockWarning],
    ) -> ApiResult<Vec<StockSuggestion>> {
        self.planner
            .suggest_restock(warehouse_id, warnings)
            .map_err(ApiError::from)
    }

    /// 批量应用补货建议（绝对值覆盖库存数量）
    pub fn apply_suggestions(
        &self,
        warehouse_id: &str,
        suggestions: &[StockSuggestion],
    ) -> ApplyOutcome {
        match self.planner.apply_suggestions(warehouse_id, suggestions) {
            Ok(applied) => ApplyOutcome {
                success: true,
                message: format!("已应用 {} 项补货建议", applied),
                applied,
                error: None,
            },
            Err(e) => {
                let api_err: ApiError = e.into();
                error!(warehouse_id, detail = %api_err, "补货建议落库失败");
                ApplyOutcome {
                    success: false,
                    message: "内部错误，操作未完成".to_string(),
                    applied: 0,
                    error: Some(api_err.kind()),
                }
            }
        }
    }
}
