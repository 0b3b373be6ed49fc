// ==========================================
// 屋面工程材料库存系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod bom;
pub mod material;
pub mod project;
pub mod restock;
pub mod types;
pub mod warehouse;

// 重导出核心类型
pub use bom::{AvailabilityReport, BillOfMaterials, BomLine, MaterialShortage};
pub use material::{Material, WarehouseMaterial};
pub use project::{Project, ProjectMaterial};
pub use restock::{ProjectUsage, StockSuggestion, StockWarning};
pub use types::{AllocationStatus, MaterialCategory, ProjectStatus, RestockPriority};
pub use warehouse::Warehouse;
