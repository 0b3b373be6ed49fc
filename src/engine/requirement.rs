// ==========================================
// 屋面工程材料库存系统 - 需求计算引擎
// ==========================================
// 职责: 项目屋面规格 + 价格目录 → 物料清单（BOM）
// 红线: 纯函数，无副作用；同一输入必得同一清单
// 红线: 角色规格为空或目录无匹配时缺行，不报错（记录 debug 日志）
// ==========================================

use crate::config::ConfigManager;
use crate::domain::bom::{BillOfMaterials, BomLine};
use crate::domain::material::Material;
use crate::domain::project::Project;
use crate::domain::types::MaterialCategory;
use tracing::debug;

// ==========================================
// RequirementCalculator - 需求计算引擎
// ==========================================

/// 需求计算引擎
///
/// 损耗口径：
/// - 面积类（主材/紧固件/保温层）：面积 × 损耗系数 1.10
/// - 长度类（檐沟/屋脊）：长度 × 损耗系数 1.05
/// - 通风件：项目件数原样计入
/// - 人工：固定 1 单位（目录价为费率，不按面积相乘）
/// - 数量先向上取整再计价
pub struct RequirementCalculator {
    area_waste_factor: f64,
    length_waste_factor: f64,
    screws_per_m2: f64,
}

impl RequirementCalculator {
    /// 使用默认损耗系数构造
    pub fn new() -> Self {
        Self {
            area_waste_factor: crate::config::config_manager::DEFAULT_AREA_WASTE_FACTOR,
            length_waste_factor: crate::config::config_manager::DEFAULT_LENGTH_WASTE_FACTOR,
            screws_per_m2: crate::config::config_manager::DEFAULT_SCREWS_PER_M2,
        }
    }

    /// 从配置管理器读取损耗系数构造
    pub fn from_config(config: &ConfigManager) -> Self {
        Self {
            area_waste_factor: config.area_waste_factor(),
            length_waste_factor: config.length_waste_factor(),
            screws_per_m2: config.screws_per_m2(),
        }
    }

    /// 计算项目物料清单
    ///
    /// # 参数
    /// - project: 项目（只读屋面规格字段）
    /// - catalog: 有效目录物料列表
    ///
    /// # 返回
    /// - BillOfMaterials: 七个固定角色逐一产出清单行，缺规格/无匹配的角色缺行
    pub fn compute_bom(&self, project: &Project, catalog: &[Material]) -> BillOfMaterials {
        let mut line_items = Vec::new();

        for category in MaterialCategory::ALL {
            if let Some(line) = self.compute_role_line(project, catalog, category) {
                line_items.push(line);
            }
        }

        let total_cost = line_items.iter().map(|l| l.total_cost).sum();
        BillOfMaterials {
            project_id: project.project_id.clone(),
            line_items,
            total_cost,
        }
    }

    /// 计算单一角色的清单行
    fn compute_role_line(
        &self,
        project: &Project,
        catalog: &[Material],
        category: MaterialCategory,
    ) -> Option<BomLine> {
        // 角色数量与选型口径
        let (quantity, variant): (Option<i64>, Option<String>) = match category {
            MaterialCategory::MainMaterial => (
                self.area_quantity(project.roof_area_m2),
                project.roof_material.clone(),
            ),
            MaterialCategory::Gutter => (
                self.length_quantity(project.gutter_length_m),
                project.gutter_type.clone(),
            ),
            MaterialCategory::Ridge => (
                self.length_quantity(project.ridge_length_m),
                project.ridge_type.clone(),
            ),
            MaterialCategory::Screws => (
                self.area_quantity(project.roof_area_m2 * self.screws_per_m2),
                None,
            ),
            MaterialCategory::Insulation => {
                if project.insulation_thickness_mm > 0.0 {
                    (
                        self.area_quantity(project.roof_area_m2),
                        Some(format_thickness(project.insulation_thickness_mm)),
                    )
                } else {
                    (None, None)
                }
            }
            MaterialCategory::Ventilation => {
                if project.ventilation_pieces > 0 {
                    (Some(project.ventilation_pieces), None)
                } else {
                    (None, None)
                }
            }
            // 人工固定 1 单位，目录价为费率
            MaterialCategory::Labor => (Some(1), None),
        };

        let quantity = match quantity {
            Some(q) if q > 0 => q,
            _ => {
                debug!(
                    project_id = %project.project_id,
                    category = %category,
                    "角色规格为空，清单缺行"
                );
                return None;
            }
        };

        let material = match select_material(catalog, category, variant.as_deref()) {
            Some(m) => m,
            None => {
                debug!(
                    project_id = %project.project_id,
                    category = %category,
                    variant = variant.as_deref().unwrap_or(""),
                    "目录无匹配物料，清单缺行"
                );
                return None;
            }
        };

        Some(BomLine {
            material_id: material.material_id.clone(),
            category,
            material_name: material.name.clone(),
            quantity,
            unit: material.unit.clone(),
            unit_price: material.unit_price,
            total_cost: quantity as f64 * material.unit_price,
        })
    }

    /// 面积类数量：面积 × 损耗系数，向上取整
    fn area_quantity(&self, area: f64) -> Option<i64> {
        if area > 0.0 {
            Some(ceil_whole(area * self.area_waste_factor))
        } else {
            None
        }
    }

    /// 长度类数量：长度 × 损耗系数，向上取整
    fn length_quantity(&self, length: f64) -> Option<i64> {
        if length > 0.0 {
            Some(ceil_whole(length * self.length_waste_factor))
        } else {
            None
        }
    }
}

/// 带容差的向上取整
///
/// 浮点乘积的尾差不得推高整单位（50 × 1.10 必须是 55，不是 56）
fn ceil_whole(value: f64) -> i64 {
    let rounded = value.round();
    if (value - rounded).abs() < 1e-9 {
        rounded as i64
    } else {
        value.ceil() as i64
    }
}

impl Default for RequirementCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// 目录选型：类别匹配 + 名称不区分大小写的子串匹配
///
/// 说明：
/// - 无选型字段的角色（紧固件/通风件/人工）取该类别第一个有效条目
/// - variant 为空白时同样取第一个有效条目
fn select_material<'a>(
    catalog: &'a [Material],
    category: MaterialCategory,
    variant: Option<&str>,
) -> Option<&'a Material> {
    let mut candidates = catalog
        .iter()
        .filter(|m| m.is_active && m.category == category);

    match variant.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => {
            let needle = v.to_lowercase();
            candidates.find(|m| m.name.to_lowercase().contains(&needle))
        }
        None => candidates.next(),
    }
}

/// 保温层厚度转目录匹配串（100.0mm → "100"）
fn format_thickness(thickness_mm: f64) -> String {
    if thickness_mm.fract() == 0.0 {
        format!("{}", thickness_mm as i64)
    } else {
        format!("{}", thickness_mm)
    }
}
