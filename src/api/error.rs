// ==========================================
// 屋面工程材料库存系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为用户友好的错误消息
// 红线: 可解释性 —— 所有拒绝必须包含显式原因（物料名、需求量、在库量）
// 红线: 底层存储错误不跨边界外泄，详情只进服务端日志
// ==========================================

use crate::engine::allocation::AllocationError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// ErrorKind - 错误分类（线格式）
// ==========================================

/// 统一结果外壳中的错误分类
///
/// 线格式: SCREAMING_SNAKE_CASE，调用方按此决定是否放行状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ProjectNotFound,
    NoWarehouse,
    InsufficientMaterials, // 预留前可用性校验失败
    InsufficientStock,     // 消耗事务内复核失败
    NoReservedMaterials,
    UnknownError,
}

impl ErrorKind {
    /// 线格式字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProjectNotFound => "PROJECT_NOT_FOUND",
            ErrorKind::NoWarehouse => "NO_WAREHOUSE",
            ErrorKind::InsufficientMaterials => "INSUFFICIENT_MATERIALS",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::NoReservedMaterials => "NO_RESERVED_MATERIALS",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ApiError - API层错误类型
// ==========================================

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 业务规则错误 =====
    #[error("项目不存在: {0}")]
    ProjectNotFound(String),

    #[error("项目未分配仓库: {0}")]
    NoWarehouse(String),

    #[error("物料不足: {0}")]
    InsufficientMaterials(String),

    #[error("库存不足: {material_name} 需要 {required}, 在库 {available}")]
    InsufficientStock {
        material_name: String,
        required: i64,
        available: i64,
    },

    #[error("项目无已预留物料: {0}")]
    NoReservedMaterials(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ===== 数据访问错误 =====
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误分类（统一结果外壳口径）
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::ProjectNotFound(_) => ErrorKind::ProjectNotFound,
            ApiError::NoWarehouse(_) => ErrorKind::NoWarehouse,
            ApiError::InsufficientMaterials(_) => ErrorKind::InsufficientMaterials,
            ApiError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            ApiError::NoReservedMaterials(_) => ErrorKind::NoReservedMaterials,
            _ => ErrorKind::UnknownError,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::InternalError(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::StockShortage {
                material_name,
                required,
                available,
            } => ApiError::InsufficientStock {
                material_name,
                required,
                available,
            },
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::InvalidInput(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidInput(format!("无效的状态转换: from={} to={}", from, to))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 AllocationError 转换
// ==========================================
impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::ProjectNotFound(id) => ApiError::ProjectNotFound(id),
            AllocationError::NoWarehouse(id) => ApiError::NoWarehouse(id),
            AllocationError::InsufficientMaterials { report } => {
                // 短缺明细拼为人类可读消息（物料名 / 需求 / 在库）
                let detail = report
                    .shortages
                    .iter()
                    .map(|s| {
                        format!("{} 需要 {}, 在库 {}", s.material_name, s.required, s.available)
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                ApiError::InsufficientMaterials(detail)
            }
            AllocationError::InsufficientStock {
                material_name,
                required,
                available,
            } => ApiError::InsufficientStock {
                material_name,
                required,
                available,
            },
            AllocationError::NoReservedMaterials(id) => ApiError::NoReservedMaterials(id),
            AllocationError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bom::{AvailabilityReport, MaterialShortage};

    #[test]
    fn test_error_kind_wire_strings() {
        assert_eq!(ErrorKind::ProjectNotFound.as_str(), "PROJECT_NOT_FOUND");
        assert_eq!(ErrorKind::NoWarehouse.as_str(), "NO_WAREHOUSE");
        assert_eq!(ErrorKind::InsufficientMaterials.as_str(), "INSUFFICIENT_MATERIALS");
        assert_eq!(ErrorKind::InsufficientStock.as_str(), "INSUFFICIENT_STOCK");
        assert_eq!(ErrorKind::NoReservedMaterials.as_str(), "NO_RESERVED_MATERIALS");
        assert_eq!(ErrorKind::UnknownError.as_str(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_stock_shortage_conversion() {
        let repo_err = RepositoryError::StockShortage {
            material_name: "corrugated-0.4".to_string(),
            required: 80,
            available: 20,
        };
        let api_err: ApiError = repo_err.into();
        assert_eq!(api_err.kind(), ErrorKind::InsufficientStock);
        let msg = api_err.to_string();
        assert!(msg.contains("corrugated-0.4"));
        assert!(msg.contains("80"));
        assert!(msg.contains("20"));
    }

    #[test]
    fn test_insufficient_materials_message_names_shortages() {
        let err = AllocationError::InsufficientMaterials {
            report: AvailabilityReport {
                warehouse_id: "W001".to_string(),
                is_available: false,
                shortages: vec![MaterialShortage {
                    material_id: "M001".to_string(),
                    material_name: "corrugated-0.4".to_string(),
                    required: 55,
                    available: 10,
                    shortage: 45,
                }],
            },
        };
        let api_err: ApiError = err.into();
        assert_eq!(api_err.kind(), ErrorKind::InsufficientMaterials);
        let msg = api_err.to_string();
        assert!(msg.contains("corrugated-0.4"));
        assert!(msg.contains("55"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_store_error_maps_to_unknown() {
        let repo_err = RepositoryError::DatabaseQueryError("disk I/O error".to_string());
        let api_err: ApiError = repo_err.into();
        assert_eq!(api_err.kind(), ErrorKind::UnknownError);
    }
}
