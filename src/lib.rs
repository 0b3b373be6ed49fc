// ==========================================
// 屋面工程材料库存系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 屋面工程项目的物料预留/消耗/退回引擎 + 容积约束补货决策
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/schema 引导）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AllocationStatus, MaterialCategory, ProjectStatus, RestockPriority};

// 领域实体
pub use domain::{
    AvailabilityReport, BillOfMaterials, BomLine, Material, MaterialShortage, Project,
    ProjectMaterial, ProjectUsage, StockSuggestion, StockWarning, Warehouse, WarehouseMaterial,
};

// 引擎
pub use engine::{
    AllocationEngine, AvailabilityValidator, RequirementCalculator, RestockPlanner,
};

// API
pub use api::{AllocationApi, ErrorKind, RestockApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "屋面工程材料库存系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
