// ==========================================
// 屋面工程材料库存系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 说明: 全部配置键带代码默认值，空库可直接运行
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ===== 默认值 =====

/// 面积类物料损耗系数（主材/紧固件/保温层，10% 损耗）
pub const DEFAULT_AREA_WASTE_FACTOR: f64 = 1.10;

/// 长度类物料损耗系数（檐沟/屋脊，5% 损耗）
pub const DEFAULT_LENGTH_WASTE_FACTOR: f64 = 1.05;

/// 每平方米紧固件密度（包/m2，损耗系数之前应用）
pub const DEFAULT_SCREWS_PER_M2: f64 = 0.25;

/// 无尺寸物料的单位体积回退值（m3）
pub const DEFAULT_UNIT_VOLUME_M3: f64 = 0.01;

/// 低库存预警阈值（predicted < 阈值时产出预警）
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取浮点配置，解析失败或缺失时取默认值
    fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_config_value(key)
            .ok()
            .flatten()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(default)
    }

    /// 读取整数配置，解析失败或缺失时取默认值
    fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_config_value(key)
            .ok()
            .flatten()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(default)
    }

    /// 写入 global scope 配置（测试/运维入口）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    // ==========================================
    // 业务配置项
    // ==========================================

    /// 面积类损耗系数（主材/紧固件/保温层）
    pub fn area_waste_factor(&self) -> f64 {
        self.get_f64_or("area_waste_factor", DEFAULT_AREA_WASTE_FACTOR)
    }

    /// 长度类损耗系数（檐沟/屋脊）
    pub fn length_waste_factor(&self) -> f64 {
        self.get_f64_or("length_waste_factor", DEFAULT_LENGTH_WASTE_FACTOR)
    }

    /// 每平方米紧固件密度
    pub fn screws_per_m2(&self) -> f64 {
        self.get_f64_or("screws_per_m2", DEFAULT_SCREWS_PER_M2)
    }

    /// 无尺寸物料的单位体积回退值
    pub fn default_unit_volume_m3(&self) -> f64 {
        self.get_f64_or("default_unit_volume_m3", DEFAULT_UNIT_VOLUME_M3)
    }

    /// 低库存预警阈值
    pub fn low_stock_threshold(&self) -> i64 {
        self.get_i64_or("low_stock_threshold", DEFAULT_LOW_STOCK_THRESHOLD)
    }
}
