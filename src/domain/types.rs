// ==========================================
// 屋面工程材料库存系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 物料类别 (Material Category)
// ==========================================
// 七个固定角色，需求计算器逐一匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialCategory {
    MainMaterial, // 主材（屋面板材）
    Gutter,       // 檐沟
    Ridge,        // 屋脊
    Screws,       // 紧固件
    Insulation,   // 保温层
    Ventilation,  // 通风件
    Labor,        // 人工（目录价为费率，不按面积相乘）
}

impl fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl MaterialCategory {
    /// 全部类别（需求计算器按此顺序产出清单行）
    pub const ALL: [MaterialCategory; 7] = [
        MaterialCategory::MainMaterial,
        MaterialCategory::Gutter,
        MaterialCategory::Ridge,
        MaterialCategory::Screws,
        MaterialCategory::Insulation,
        MaterialCategory::Ventilation,
        MaterialCategory::Labor,
    ];

    /// 从字符串解析类别
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MAIN_MATERIAL" => Some(MaterialCategory::MainMaterial),
            "GUTTER" => Some(MaterialCategory::Gutter),
            "RIDGE" => Some(MaterialCategory::Ridge),
            "SCREWS" => Some(MaterialCategory::Screws),
            "INSULATION" => Some(MaterialCategory::Insulation),
            "VENTILATION" => Some(MaterialCategory::Ventilation),
            "LABOR" => Some(MaterialCategory::Labor),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MaterialCategory::MainMaterial => "MAIN_MATERIAL",
            MaterialCategory::Gutter => "GUTTER",
            MaterialCategory::Ridge => "RIDGE",
            MaterialCategory::Screws => "SCREWS",
            MaterialCategory::Insulation => "INSULATION",
            MaterialCategory::Ventilation => "VENTILATION",
            MaterialCategory::Labor => "LABOR",
        }
    }
}

// ==========================================
// 分配状态 (Allocation Status)
// ==========================================
// 红线: RETURNED/CANCELLED 为终态，Consume/Return 不得再迁移
// 迁移路径: RESERVED → CONSUMED → RETURNED 或 RESERVED → CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    Reserved,  // 已预留（未扣减库存）
    Consumed,  // 已消耗（库存已扣减）
    Returned,  // 已退回（库存已归还，终态）
    Cancelled, // 已取消（从未扣减库存，终态）
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl AllocationStatus {
    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, AllocationStatus::Returned | AllocationStatus::Cancelled)
    }

    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "RESERVED" => Some(AllocationStatus::Reserved),
            "CONSUMED" => Some(AllocationStatus::Consumed),
            "RETURNED" => Some(AllocationStatus::Returned),
            "CANCELLED" => Some(AllocationStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AllocationStatus::Reserved => "RESERVED",
            AllocationStatus::Consumed => "CONSUMED",
            AllocationStatus::Returned => "RETURNED",
            AllocationStatus::Cancelled => "CANCELLED",
        }
    }
}

// ==========================================
// 项目状态 (Project Status)
// ==========================================
// 项目工作流归外部系统所有；引擎只关心三类触发:
// - ACCEPTED → Reserve
// - IN_PROGRESS → Consume
// - REJECTED/CANCELLED/ARCHIVED → Return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    New,        // 新建
    OfferSent,  // 报价已发出
    Accepted,   // 已接受（触发预留）
    InProgress, // 施工中（触发消耗）
    Done,       // 完工
    Rejected,   // 已拒绝（触发退回）
    Cancelled,  // 已取消（触发退回）
    Archived,   // 已归档（触发退回）
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ProjectStatus {
    /// 该状态是否触发物料退回
    pub fn triggers_return(&self) -> bool {
        matches!(
            self,
            ProjectStatus::Rejected | ProjectStatus::Cancelled | ProjectStatus::Archived
        )
    }

    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NEW" => Some(ProjectStatus::New),
            "OFFER_SENT" => Some(ProjectStatus::OfferSent),
            "ACCEPTED" => Some(ProjectStatus::Accepted),
            "IN_PROGRESS" => Some(ProjectStatus::InProgress),
            "DONE" => Some(ProjectStatus::Done),
            "REJECTED" => Some(ProjectStatus::Rejected),
            "CANCELLED" => Some(ProjectStatus::Cancelled),
            "ARCHIVED" => Some(ProjectStatus::Archived),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProjectStatus::New => "NEW",
            ProjectStatus::OfferSent => "OFFER_SENT",
            ProjectStatus::Accepted => "ACCEPTED",
            ProjectStatus::InProgress => "IN_PROGRESS",
            ProjectStatus::Done => "DONE",
            ProjectStatus::Rejected => "REJECTED",
            ProjectStatus::Cancelled => "CANCELLED",
            ProjectStatus::Archived => "ARCHIVED",
        }
    }
}

// ==========================================
// 补货优先级 (Restock Priority)
// ==========================================
// 顺序: Warning < Critical（排序时 Critical 在前）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestockPriority {
    Warning,  // 预警
    Critical, // 紧急
}

impl fmt::Display for RestockPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestockPriority::Warning => write!(f, "WARNING"),
            RestockPriority::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_status_terminal() {
        assert!(!AllocationStatus::Reserved.is_terminal());
        assert!(!AllocationStatus::Consumed.is_terminal());
        assert!(AllocationStatus::Returned.is_terminal());
        assert!(AllocationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            AllocationStatus::Reserved,
            AllocationStatus::Consumed,
            AllocationStatus::Returned,
            AllocationStatus::Cancelled,
        ] {
            assert_eq!(AllocationStatus::from_str(status.to_db_str()), Some(status));
        }
    }

    #[test]
    fn test_project_status_return_trigger() {
        assert!(ProjectStatus::Rejected.triggers_return());
        assert!(ProjectStatus::Cancelled.triggers_return());
        assert!(ProjectStatus::Archived.triggers_return());
        assert!(!ProjectStatus::Accepted.triggers_return());
        assert!(!ProjectStatus::InProgress.triggers_return());
    }

    #[test]
    fn test_restock_priority_ordering() {
        assert!(RestockPriority::Critical > RestockPriority::Warning);
    }
}
