// ==========================================
// 屋面工程材料库存系统 - API 层
// ==========================================
// 职责: 业务接口，统一结果外壳与错误转换
// ==========================================

pub mod allocation_api;
pub mod error;
pub mod restock_api;

// 重导出核心 API
pub use allocation_api::{
    AllocationApi, ConsumeOutcome, ReserveOutcome, ReturnOutcome, StatusChangeOutcome,
};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use restock_api::{ApplyOutcome, RestockApi};
