// ==========================================
// 屋面工程材料库存系统 - 物料分配引擎
// ==========================================
// 职责: 项目状态迁移驱动的预留/消耗/退回编排
// 红线: 预留不扣库存（咨询性）；扣减只发生在消耗事务内
// 红线: 预留/消耗失败必须阻断状态迁移；退回失败只记日志不阻断
// ==========================================

use crate::config::ConfigManager;
use crate::domain::bom::AvailabilityReport;
use crate::domain::project::Project;
use crate::domain::types::AllocationStatus;
use crate::engine::availability::AvailabilityValidator;
use crate::engine::requirement::RequirementCalculator;
use crate::repository::allocation_repo::{ConsumedLine, ReturnedLine};
use crate::repository::error::RepositoryError;
use crate::repository::{
    MaterialCatalogRepository, ProjectMaterialRepository, ProjectRepository,
    WarehouseMaterialRepository,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

// ==========================================
// AllocationError - 分配引擎错误
// ==========================================

/// 分配引擎错误类型
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("项目不存在: {0}")]
    ProjectNotFound(String),

    #[error("项目未分配仓库: {0}")]
    NoWarehouse(String),

    /// 预留前可用性校验失败（未写入任何分配记录）
    #[error("物料不足，无法预留")]
    InsufficientMaterials { report: AvailabilityReport },

    /// 消耗事务内复核失败（整个事务已回滚）
    #[error("库存不足: {material_name} 需要 {required}, 在库 {available}")]
    InsufficientStock {
        material_name: String,
        required: i64,
        available: i64,
    },

    #[error("项目无已预留物料: {0}")]
    NoReservedMaterials(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type AllocationResult<T> = Result<T, AllocationError>;

// ==========================================
// 结果 DTO
// ==========================================

/// 预留结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSummary {
    pub project_id: String,
    pub reserved_lines: usize,
    pub total_cost: f64,
    pub skipped: bool, // 已消耗项目跳过预留
}

/// 项目物料汇总行（展示口径）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryLine {
    pub material_id: String,
    pub material_name: String,
    pub unit: String,
    pub quantity: i64,
    pub status: AllocationStatus,
    pub line_cost: f64, // quantity × (目录单价 + 仓库价格调整)
    pub notes: Option<String>,
}

/// 项目物料汇总（只读展示口径）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSummary {
    pub project_id: String,
    pub total_materials: usize,
    pub reserved_materials: usize,
    pub consumed_materials: usize,
    pub returned_materials: usize,
    pub cancelled_materials: usize,
    pub materials: Vec<SummaryLine>,
}

// ==========================================
// AllocationEngine - 物料分配引擎
// ==========================================

/// 物料分配引擎
///
/// 职责：
/// 1. 预留：清单计算 → 可用性校验 → 分配记录 upsert（不扣库存）
/// 2. 消耗：事务内复核库存并扣减，置 CONSUMED
/// 3. 退回：已消耗行归还库存置 RETURNED，仅预留行置 CANCELLED
/// 4. 汇总：项目分配记录只读展示
pub struct AllocationEngine {
    catalog_repo: Arc<MaterialCatalogRepository>,
    stock_repo: Arc<WarehouseMaterialRepository>,
    project_repo: Arc<ProjectRepository>,
    project_material_repo: Arc<ProjectMaterialRepository>,
    config: Arc<ConfigManager>,
    validator: AvailabilityValidator,
}

impl AllocationEngine {
    /// 创建新的分配引擎实例
    pub fn new(
        catalog_repo: Arc<MaterialCatalogRepository>,
        stock_repo: Arc<WarehouseMaterialRepository>,
        project_repo: Arc<ProjectRepository>,
        project_material_repo: Arc<ProjectMaterialRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            catalog_repo,
            stock_repo,
            project_repo,
            project_material_repo,
            config,
            validator: AvailabilityValidator::new(),
        }
    }

    /// 加载项目（统一 ProjectNotFound 口径）
    fn load_project(&self, project_id: &str) -> AllocationResult<Project> {
        self.project_repo
            .find_by_id(project_id)?
            .ok_or_else(|| AllocationError::ProjectNotFound(project_id.to_string()))
    }

    // ==========================================
    // 可用性校验
    // ==========================================

    /// 校验项目物料可用性（只读，时点快照）
    #[instrument(skip(self))]
    pub fn check_availability(&self, project_id: &str) -> AllocationResult<AvailabilityReport> {
        let project = self.load_project(project_id)?;
        let warehouse_id = project
            .warehouse_id
            .clone()
            .ok_or_else(|| AllocationError::NoWarehouse(project_id.to_string()))?;

        let catalog = self.catalog_repo.list_active()?;
        let calculator = RequirementCalculator::from_config(&self.config);
        let bom = calculator.compute_bom(&project, &catalog);

        let snapshot = self.stock_repo.stock_snapshot(&warehouse_id)?;
        Ok(self.validator.evaluate(&bom, &snapshot, &warehouse_id))
    }

    // ==========================================
    // 预留
    // ==========================================

    /// 预留项目物料（项目进入“已接受”状态时触发）
    ///
    /// # 返回
    /// - Ok(ReserveSummary): 预留成功（或已消耗跳过）
    /// - Err(InsufficientMaterials): 可用性校验失败，**未写入任何分配记录**
    ///
    /// # 说明
    /// - 不扣减库存；两个并发接受的项目可能对同一批库存都预留成功，
    ///   后到者在消耗事务内被拦截
    #[instrument(skip(self))]
    pub fn reserve(&self, project_id: &str) -> AllocationResult<ReserveSummary> {
        let project = self.load_project(project_id)?;

        // 已消耗项目不重复预留
        if project.materials_consumed {
            info!(project_id, "物料已消耗，跳过预留");
            return Ok(ReserveSummary {
                project_id: project_id.to_string(),
                reserved_lines: 0,
                total_cost: 0.0,
                skipped: true,
            });
        }

        let warehouse_id = project
            .warehouse_id
            .clone()
            .ok_or_else(|| AllocationError::NoWarehouse(project_id.to_string()))?;

        let catalog = self.catalog_repo.list_active()?;
        let calculator = RequirementCalculator::from_config(&self.config);
        let bom = calculator.compute_bom(&project, &catalog);

        // 先校验后写入：不足时不得创建/更新任何分配记录
        let snapshot = self.stock_repo.stock_snapshot(&warehouse_id)?;
        let report = self.validator.evaluate(&bom, &snapshot, &warehouse_id);
        if !report.is_available {
            return Err(AllocationError::InsufficientMaterials { report });
        }

        let lines: Vec<(String, i64)> = bom
            .line_items
            .iter()
            .map(|l| (l.material_id.clone(), l.quantity))
            .collect();
        let reserved_lines =
            self.project_material_repo
                .reserve_lines(project_id, &warehouse_id, &lines)?;

        info!(project_id, reserved_lines, total_cost = bom.total_cost, "物料预留完成");
        Ok(ReserveSummary {
            project_id: project_id.to_string(),
            reserved_lines,
            total_cost: bom.total_cost,
            skipped: false,
        })
    }

    // ==========================================
    // 消耗
    // ==========================================

    /// 消耗项目已预留物料（项目进入“施工中”状态时触发）
    ///
    /// # 返回
    /// - Ok(Vec<ConsumedLine>): 全部扣减成功
    /// - Err(NoReservedMaterials): 无 RESERVED 行可消耗
    /// - Err(InsufficientStock): 任一行不足，事务整体回滚，无部分扣减
    #[instrument(skip(self))]
    pub fn consume(&self, project_id: &str) -> AllocationResult<Vec<ConsumedLine>> {
        // 项目存在性先行校验，区分 PROJECT_NOT_FOUND 与 NO_RESERVED_MATERIALS
        self.load_project(project_id)?;

        let consumed = match self.project_material_repo.consume_reserved(project_id) {
            Ok(lines) => lines,
            Err(RepositoryError::StockShortage {
                material_name,
                required,
                available,
            }) => {
                return Err(AllocationError::InsufficientStock {
                    material_name,
                    required,
                    available,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if consumed.is_empty() {
            return Err(AllocationError::NoReservedMaterials(project_id.to_string()));
        }

        info!(project_id, lines = consumed.len(), "物料消耗完成");
        Ok(consumed)
    }

    // ==========================================
    // 退回
    // ==========================================

    /// 退回项目物料（项目被拒绝/取消/归档时触发，幂等）
    ///
    /// # 返回
    /// - Ok(Vec<ReturnedLine>): 处理明细（空 = 无未决行，幂等无操作）
    #[instrument(skip(self))]
    pub fn return_materials(
        &self,
        project_id: &str,
        reason: Option<&str>,
    ) -> AllocationResult<Vec<ReturnedLine>> {
        self.load_project(project_id)?;

        let returned = self
            .project_material_repo
            .return_outstanding(project_id, reason)?;

        info!(project_id, lines = returned.len(), "物料退回完成");
        Ok(returned)
    }

    // ==========================================
    // 汇总
    // ==========================================

    /// 项目物料汇总（只读展示口径）
    #[instrument(skip(self))]
    pub fn material_summary(&self, project_id: &str) -> AllocationResult<MaterialSummary> {
        self.load_project(project_id)?;

        let details = self.project_material_repo.find_detail_by_project(project_id)?;

        let mut summary = MaterialSummary {
            project_id: project_id.to_string(),
            total_materials: details.len(),
            reserved_materials: 0,
            consumed_materials: 0,
            returned_materials: 0,
            cancelled_materials: 0,
            materials: Vec::with_capacity(details.len()),
        };

        for detail in details {
            match detail.status {
                AllocationStatus::Reserved => summary.reserved_materials += 1,
                AllocationStatus::Consumed => summary.consumed_materials += 1,
                AllocationStatus::Returned => summary.returned_materials += 1,
                AllocationStatus::Cancelled => summary.cancelled_materials += 1,
            }
            summary.materials.push(SummaryLine {
                material_id: detail.material_id,
                material_name: detail.material_name,
                unit: detail.unit,
                quantity: detail.quantity,
                status: detail.status,
                line_cost: detail.quantity as f64
                    * (detail.unit_price + detail.price_adjustment),
                notes: detail.notes,
            });
        }

        Ok(summary)
    }
}
