// ==========================================
// 屋面工程材料库存系统 - 补货规划引擎
// ==========================================
// 职责: 低库存预警派生 + 容积约束下的补货建议
// 红线: 咨询性功能，不在项目状态迁移关键路径上；
//       仓库容积缺省时返回空建议而非报错
// ==========================================

use crate::config::ConfigManager;
use crate::domain::material::Material;
use crate::domain::restock::{ProjectUsage, StockSuggestion, StockWarning};
use crate::domain::types::RestockPriority;
use crate::repository::error::RepositoryResult;
use crate::repository::{
    MaterialCatalogRepository, ProjectMaterialRepository, WarehouseMaterialRepository,
    WarehouseRepository,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

// ===== 建议公式常量 =====

/// 预留需求放大倍数（demand = reserved × 2 + avg_usage）
const RESERVE_DEMAND_MULTIPLIER: f64 = 2.0;

/// 需求安全余量（target = demand × (1 + 0.2)）
const DEMAND_SAFETY_FACTOR: f64 = 0.2;

/// 目标下限的预留倍数（target ≥ reserved × 1.5）
const RESERVE_FLOOR_MULTIPLIER: f64 = 1.5;

/// 目标下限的绝对最小值
const MIN_TARGET_STOCK: i64 = 10;

/// 高容积占用阈值（超过时置信度下调）
const HIGH_UTILIZATION_THRESHOLD: f64 = 0.90;

// ===== 置信度权重 =====

const CONFIDENCE_BASE: f64 = 0.5;
const CONFIDENCE_CRITICAL_BONUS: f64 = 0.3;
const CONFIDENCE_USAGE_BONUS: f64 = 0.2;
const CONFIDENCE_HIGH_UTILIZATION_PENALTY: f64 = 0.2;

// ==========================================
// RestockPlanner - 补货规划引擎
// ==========================================

/// 补货规划引擎
///
/// 职责：
/// 1. 从仓库库存与未消耗预留派生低库存预警
/// 2. 预警 + 容积余量 → 按优先级/置信度排序的补货建议
/// 3. 建议批量落库（绝对值覆盖）
pub struct RestockPlanner {
    warehouse_repo: Arc<WarehouseRepository>,
    stock_repo: Arc<WarehouseMaterialRepository>,
    catalog_repo: Arc<MaterialCatalogRepository>,
    project_material_repo: Arc<ProjectMaterialRepository>,
    config: Arc<ConfigManager>,
}

impl RestockPlanner {
    /// 创建新的补货规划引擎实例
    pub fn new(
        warehouse_repo: Arc<WarehouseRepository>,
        stock_repo: Arc<WarehouseMaterialRepository>,
        catalog_repo: Arc<MaterialCatalogRepository>,
        project_material_repo: Arc<ProjectMaterialRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            warehouse_repo,
            stock_repo,
            catalog_repo,
            project_material_repo,
            config,
        }
    }

    /// 物料单位体积（m3）
    ///
    /// 优先级: 显式 unit_volume_m3 → 长×宽×高 → 配置回退值
    fn unit_volume(&self, material: &Material) -> f64 {
        if let Some(v) = material.unit_volume_m3 {
            if v > 0.0 {
                return v;
            }
        }
        if let (Some(l), Some(w), Some(h)) =
            (material.length_m, material.width_m, material.height_m)
        {
            let v = l * w * h;
            if v > 0.0 {
                return v;
            }
        }
        self.config.default_unit_volume_m3()
    }

    // ==========================================
    // 低库存预警
    // ==========================================

    /// 从仓库库存派生低库存预警（规划器触发信号）
    ///
    /// # 说明
    /// - projected = 在库数量 − 未消耗预留量
    /// - projected < 阈值 时产出预警；projected < 0 或在库为零时 critical
    #[instrument(skip(self))]
    pub fn low_stock_warnings(&self, warehouse_id: &str) -> RepositoryResult<Vec<StockWarning>> {
        let rows = self.stock_repo.list_active_by_warehouse(warehouse_id)?;
        let reserved_totals = self
            .project_material_repo
            .reserved_totals_by_warehouse(warehouse_id)?;
        let usage = self.project_material_repo.usage_by_warehouse(warehouse_id)?;
        let threshold = self.config.low_stock_threshold();

        let catalog_names: HashMap<String, String> = self
            .catalog_repo
            .list_active()?
            .into_iter()
            .map(|m| (m.material_id.clone(), m.name))
            .collect();

        let mut warnings = Vec::new();
        for row in rows {
            let reserved = reserved_totals.get(&row.id).copied().unwrap_or(0);
            let projected = row.quantity - reserved;
            if projected >= threshold {
                continue;
            }

            let projects_using: Vec<ProjectUsage> = usage
                .get(&row.id)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(project_id, quantity)| ProjectUsage {
                            project_id: project_id.clone(),
                            quantity: *quantity,
                        })
                        .collect()
                })
                .unwrap_or_default();

            warnings.push(StockWarning {
                material_id: row.material_id.clone(),
                material_name: catalog_names
                    .get(&row.material_id)
                    .cloned()
                    .unwrap_or_else(|| row.material_id.clone()),
                current_stock: row.quantity,
                reserved_for_projects: reserved,
                projected_stock: projected,
                critical_level: projected < 0 || row.quantity == 0,
                projects_using,
            });
        }

        debug!(warehouse_id, count = warnings.len(), "低库存预警派生完成");
        Ok(warnings)
    }

    // ==========================================
    // 补货建议
    // ==========================================

    /// 计算补货建议（容积约束 + 需求加权）
    ///
    /// # 参数
    /// - warehouse_id: 仓库 ID
    /// - warnings: 低库存预警（需求信号）
    ///
    /// # 返回
    /// - Vec<StockSuggestion>: 按优先级（critical 在前）、置信度降序排序
    ///
    /// # 说明
    /// - 仓库不存在或容积缺省/非正时返回空列表（咨询性，不报错）
    /// - suggested_stock 是绝对目标值，apply 时直接覆盖
    #[instrument(skip(self, warnings), fields(warnings_count = warnings.len()))]
    pub fn suggest_restock(
        &self,
        warehouse_id: &str,
        warnings: &[StockWarning],
    ) -> RepositoryResult<Vec<StockSuggestion>> {
        let warehouse = match self.warehouse_repo.find_by_id(warehouse_id)? {
            Some(w) => w,
            None => {
                warn!(warehouse_id, "仓库不存在，补货建议为空");
                return Ok(Vec::new());
            }
        };
        let total_capacity = match warehouse.capacity_m3 {
            Some(c) if c > 0.0 => c,
            _ => {
                warn!(warehouse_id, "仓库容积缺省，补货建议为空");
                return Ok(Vec::new());
            }
        };

        // 当前容积占用（有效库存行 × 单位体积）
        let stock_rows = self.stock_repo.list_active_by_warehouse(warehouse_id)?;
        let catalog: HashMap<String, Material> = self
            .catalog_repo
            .list_active()?
            .into_iter()
            .map(|m| (m.material_id.clone(), m))
            .collect();

        let used_capacity: f64 = stock_rows
            .iter()
            .filter_map(|row| {
                catalog
                    .get(&row.material_id)
                    .map(|m| row.quantity as f64 * self.unit_volume(m))
            })
            .sum();
        let available_capacity = (total_capacity - used_capacity).max(0.0);
        let utilization = used_capacity / total_capacity;

        let mut suggestions = Vec::new();
        for warning in warnings {
            let material = match catalog.get(&warning.material_id) {
                Some(m) => m,
                None => {
                    warn!(material_id = %warning.material_id, "目录无此物料，跳过建议");
                    continue;
                }
            };
            let unit_volume = self.unit_volume(material);

            // 1) 需求目标：预留 × 2 + 项目平均用量，再加安全余量
            let avg_usage = if warning.projects_using.is_empty() {
                0.0
            } else {
                warning.projects_using.iter().map(|u| u.quantity as f64).sum::<f64>()
                    / warning.projects_using.len() as f64
            };
            let demand =
                warning.reserved_for_projects as f64 * RESERVE_DEMAND_MULTIPLIER + avg_usage;
            let mut target = (demand + DEMAND_SAFETY_FACTOR * demand).ceil() as i64;

            // 2) 容积上限截断（浮点商加容差再取整，5.0/0.2 不得落到 24）
            let capacity_limit = (available_capacity / unit_volume + 1e-6).floor() as i64;
            target = target.min(capacity_limit);

            // 3) 下限保底
            let floor = (warning.reserved_for_projects as f64 * RESERVE_FLOOR_MULTIPLIER)
                .ceil() as i64;
            target = target.max(floor.max(MIN_TARGET_STOCK));

            // 4) 增量为正才产出建议
            let stock_to_add = target - warning.current_stock;
            if stock_to_add <= 0 {
                continue;
            }

            let priority = if warning.critical_level {
                RestockPriority::Critical
            } else {
                RestockPriority::Warning
            };

            let mut confidence = CONFIDENCE_BASE;
            if warning.critical_level {
                confidence += CONFIDENCE_CRITICAL_BONUS;
            }
            if !warning.projects_using.is_empty() {
                confidence += CONFIDENCE_USAGE_BONUS;
            }
            // 占用率恰在阈值上不触发下调（浮点和的尾差不得误判）
            if utilization > HIGH_UTILIZATION_THRESHOLD + 1e-9 {
                confidence -= CONFIDENCE_HIGH_UTILIZATION_PENALTY;
            }
            confidence = confidence.clamp(0.0, 1.0);

            suggestions.push(StockSuggestion {
                material_id: warning.material_id.clone(),
                material_name: warning.material_name.clone(),
                current_stock: warning.current_stock,
                suggested_stock: target,
                stock_to_add,
                priority,
                confidence,
                reason: format!(
                    "预留 {} 件、{} 个项目在用，目标库存 {}（容积余量 {:.1} m3）",
                    warning.reserved_for_projects,
                    warning.projects_using.len(),
                    target,
                    available_capacity,
                ),
            });
        }

        // critical 在前，组内置信度降序
        suggestions.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        });

        Ok(suggestions)
    }

    // ==========================================
    // 建议落库
    // ==========================================

    /// 批量应用补货建议（绝对值覆盖 warehouse_material.quantity）
    ///
    /// # 返回
    /// - Ok(usize): 实际写入的行数
    #[instrument(skip(self, suggestions), fields(count = suggestions.len()))]
    pub fn apply_suggestions(
        &self,
        warehouse_id: &str,
        suggestions: &[StockSuggestion],
    ) -> RepositoryResult<usize> {
        let targets: Vec<(String, i64)> = suggestions
            .iter()
            .map(|s| (s.material_id.clone(), s.suggested_stock))
            .collect();
        self.stock_repo.set_quantities(warehouse_id, &targets)
    }
}
