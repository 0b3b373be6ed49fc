// ==========================================
// 屋面工程材料库存系统 - 物料分配 API
// ==========================================
// 职责: 预留/消耗/退回/汇总的统一结果外壳
// 红线: 变更入口不跨边界抛错 —— 成功/失败统一走 {success, message, error?}，
//       调用方（项目工作流）据此决定是否放行状态迁移
// 红线: 存储级错误详情只进服务端日志，对外只给通用失败消息
// ==========================================

use crate::api::error::{ApiError, ApiResult, ErrorKind};
use crate::domain::bom::AvailabilityReport;
use crate::domain::types::ProjectStatus;
use crate::engine::allocation::{AllocationEngine, MaterialSummary};
use crate::repository::allocation_repo::{ConsumedLine, ReturnedLine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

// ==========================================
// 统一结果外壳
// ==========================================

/// 预留结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveOutcome {
    pub success: bool,
    pub message: String,
    pub error: Option<ErrorKind>,
}

/// 消耗结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeOutcome {
    pub success: bool,
    pub message: String,
    pub consumed: Vec<ConsumedLine>,
    pub error: Option<ErrorKind>,
}

/// 退回结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub success: bool,
    pub message: String,
    pub returned: Vec<ReturnedLine>,
    pub error: Option<ErrorKind>,
}

/// 状态迁移联动结果
///
/// 说明：
/// - proceed = false 时调用方必须拒绝本次状态迁移（预留/消耗失败）
/// - 退回失败不阻断：状态迁移已是既成事实，库存簿记失败只记日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeOutcome {
    pub proceed: bool,
    pub message: String,
    pub error: Option<ErrorKind>,
}

/// 错误 → (分类, 对外消息)
///
/// 业务错误原样给出可读原因；存储级错误收敛为通用消息，详情进日志
fn classify(err: ApiError, operation: &str) -> (ErrorKind, String) {
    let kind = err.kind();
    match kind {
        ErrorKind::UnknownError => {
            error!(operation, detail = %err, "存储级错误");
            (kind, "内部错误，操作未完成".to_string())
        }
        _ => (kind, err.to_string()),
    }
}

// ==========================================
// AllocationApi - 物料分配 API
// ==========================================

/// 物料分配API
///
/// 职责：
/// 1. 预留/消耗/退回入口（统一结果外壳）
/// 2. 项目状态迁移联动分发
/// 3. 项目物料汇总查询
pub struct AllocationApi {
    engine: Arc<AllocationEngine>,
}

impl AllocationApi {
    /// 创建新的AllocationApi实例
    pub fn new(engine: Arc<AllocationEngine>) -> Self {
        Self { engine }
    }

    // ==========================================
    // 变更入口
    // ==========================================

    /// 预留项目物料
    pub fn reserve(&self, project_id: &str) -> ReserveOutcome {
        match self.engine.reserve(project_id) {
            Ok(summary) if summary.skipped => ReserveOutcome {
                success: true,
                message: "物料已消耗，跳过预留".to_string(),
                error: None,
            },
            Ok(summary) => ReserveOutcome {
                success: true,
                message: format!(
                    "已预留 {} 项物料，预估成本 {:.2}",
                    summary.reserved_lines, summary.total_cost
                ),
                error: None,
            },
            Err(e) => {
                let (kind, message) = classify(e.into(), "reserve");
                ReserveOutcome {
                    success: false,
                    message,
                    error: Some(kind),
                }
            }
        }
    }

    /// 消耗项目已预留物料
    pub fn consume(&self, project_id: &str) -> ConsumeOutcome {
        match self.engine.consume(project_id) {
            Ok(consumed) => ConsumeOutcome {
                success: true,
                message: format!("已消耗 {} 项物料", consumed.len()),
                consumed,
                error: None,
            },
            Err(e) => {
                let (kind, message) = classify(e.into(), "consume");
                ConsumeOutcome {
                    success: false,
                    message,
                    consumed: Vec::new(),
                    error: Some(kind),
                }
            }
        }
    }

    /// 退回项目物料
    pub fn return_materials(&self, project_id: &str, reason: Option<&str>) -> ReturnOutcome {
        match self.engine.return_materials(project_id, reason) {
            Ok(returned) if returned.is_empty() => ReturnOutcome {
                success: true,
                message: "无未决物料，退回无操作".to_string(),
                returned,
                error: None,
            },
            Ok(returned) => ReturnOutcome {
                success: true,
                message: format!("已处理 {} 项物料退回", returned.len()),
                returned,
                error: None,
            },
            Err(e) => {
                let (kind, message) = classify(e.into(), "return");
                ReturnOutcome {
                    success: false,
                    message,
                    returned: Vec::new(),
                    error: Some(kind),
                }
            }
        }
    }

    // ==========================================
    // 状态迁移联动
    // ==========================================

    /// 项目状态迁移联动分发
    ///
    /// 分发规则：
    /// - ACCEPTED → 预留（失败阻断迁移）
    /// - IN_PROGRESS → 消耗（失败阻断迁移）
    /// - REJECTED / CANCELLED / ARCHIVED → 退回（失败只记 warn，不阻断）
    /// - 其他状态无物料动作
    pub fn handle_status_change(
        &self,
        project_id: &str,
        new_status: ProjectStatus,
    ) -> StatusChangeOutcome {
        match new_status {
            ProjectStatus::Accepted => {
                let outcome = self.reserve(project_id);
                StatusChangeOutcome {
                    proceed: outcome.success,
                    message: outcome.message,
                    error: outcome.error,
                }
            }
            ProjectStatus::InProgress => {
                let outcome = self.consume(project_id);
                StatusChangeOutcome {
                    proceed: outcome.success,
                    message: outcome.message,
                    error: outcome.error,
                }
            }
            status if status.triggers_return() => {
                let outcome =
                    self.return_materials(project_id, Some(status.to_db_str()));
                if !outcome.success {
                    // 状态迁移已是既成事实，簿记失败不得回滚迁移
                    warn!(
                        project_id,
                        status = %status,
                        error = ?outcome.error,
                        message = %outcome.message,
                        "物料退回失败，状态迁移继续"
                    );
                }
                StatusChangeOutcome {
                    proceed: true,
                    message: outcome.message,
                    error: outcome.error,
                }
            }
            _ => StatusChangeOutcome {
                proceed: true,
                message: "无物料动作".to_string(),
                error: None,
            },
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 项目物料汇总（只读展示口径）
    pub fn material_summary(&self, project_id: &str) -> ApiResult<MaterialSummary> {
        self.engine
            .material_summary(project_id)
            .map_err(ApiError::from)
    }

    /// 校验项目物料可用性（只读，时点快照）
    pub fn check_availability(&self, project_id: &str) -> ApiResult<AvailabilityReport> {
        self.engine
            .check_availability(project_id)
            .map_err(ApiError::from)
    }
}
