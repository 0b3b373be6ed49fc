// ==========================================
// 屋面工程材料库存系统 - 可用性校验引擎
// ==========================================
// 职责: 物料清单 vs 库存时点快照 → 短缺报告
// 红线: 只读校验，不修改任何计数器
// 说明: 快照读的是原始库存，不扣减其他项目的未消耗预留 ——
//       预留是咨询性的，真正的不足在消耗事务内拦截
// ==========================================

use crate::domain::bom::{AvailabilityReport, BillOfMaterials, MaterialShortage};
use std::collections::HashMap;

// ==========================================
// AvailabilityValidator - 可用性校验引擎
// ==========================================
pub struct AvailabilityValidator {
    // 无状态引擎，不需要注入依赖
}

impl AvailabilityValidator {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    /// 校验清单可用性
    ///
    /// # 参数
    /// - bom: 物料清单
    /// - stock: 库存快照 (material_id → 在库数量)，缺行视为 0
    /// - warehouse_id: 快照所属仓库
    ///
    /// # 返回
    /// - AvailabilityReport: 短缺列表为空时 is_available = true
    pub fn evaluate(
        &self,
        bom: &BillOfMaterials,
        stock: &HashMap<String, i64>,
        warehouse_id: &str,
    ) -> AvailabilityReport {
        let mut shortages = Vec::new();

        for line in &bom.line_items {
            let available = stock.get(&line.material_id).copied().unwrap_or(0);
            if available < line.quantity {
                shortages.push(MaterialShortage {
                    material_id: line.material_id.clone(),
                    material_name: line.material_name.clone(),
                    required: line.quantity,
                    available,
                    shortage: line.quantity - available,
                });
            }
        }

        AvailabilityReport {
            warehouse_id: warehouse_id.to_string(),
            is_available: shortages.is_empty(),
            shortages,
        }
    }
}

impl Default for AvailabilityValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bom::BomLine;
    use crate::domain::types::MaterialCategory;

    fn bom_with(lines: Vec<(&str, i64)>) -> BillOfMaterials {
        let line_items: Vec<BomLine> = lines
            .into_iter()
            .map(|(id, qty)| BomLine {
                material_id: id.to_string(),
                category: MaterialCategory::MainMaterial,
                material_name: format!("物料-{}", id),
                quantity: qty,
                unit: "m2".to_string(),
                unit_price: 100.0,
                total_cost: qty as f64 * 100.0,
            })
            .collect();
        let total_cost = line_items.iter().map(|l| l.total_cost).sum();
        BillOfMaterials {
            project_id: "P001".to_string(),
            line_items,
            total_cost,
        }
    }

    #[test]
    fn test_all_available() {
        let bom = bom_with(vec![("M001", 55)]);
        let stock = HashMap::from([("M001".to_string(), 100)]);
        let report = AvailabilityValidator::new().evaluate(&bom, &stock, "W001");

        assert!(report.is_available);
        assert!(report.shortages.is_empty());
    }

    #[test]
    fn test_shortage_reported() {
        let bom = bom_with(vec![("M001", 80), ("M002", 10)]);
        let stock = HashMap::from([("M001".to_string(), 30), ("M002".to_string(), 10)]);
        let report = AvailabilityValidator::new().evaluate(&bom, &stock, "W001");

        assert!(!report.is_available);
        assert_eq!(report.shortages.len(), 1);
        assert_eq!(report.shortages[0].material_id, "M001");
        assert_eq!(report.shortages[0].required, 80);
        assert_eq!(report.shortages[0].available, 30);
        assert_eq!(report.shortages[0].shortage, 50);
    }

    #[test]
    fn test_missing_stock_row_counts_as_zero() {
        let bom = bom_with(vec![("M001", 5)]);
        let stock = HashMap::new();
        let report = AvailabilityValidator::new().evaluate(&bom, &stock, "W001");

        assert!(!report.is_available);
        assert_eq!(report.shortages[0].available, 0);
        assert_eq!(report.shortages[0].shortage, 5);
    }
}
