use crate::storage::index_log::{IndexLogConfig, LogSyncPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// geostar 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoStarConfig {
    /// 索引参数
    pub tree: TreeConfig,

    /// 存储配置
    pub storage: StorageConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

/// 索引参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// 每个节点的最大条目数 M
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 记录数据文件路径
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// 索引日志
    pub index_log: IndexLogSettings,
}

/// 索引日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexLogSettings {
    /// 是否写索引日志
    #[serde(default = "default_index_log_enabled")]
    pub enabled: bool,

    /// 索引日志文件路径
    #[serde(default = "default_index_log_filename")]
    pub filename: PathBuf,

    /// 同步策略：always, everysec, no
    #[serde(default = "default_sync_policy")]
    pub sync_policy: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别：trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 日志输出：stdout, file
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志文件路径（当 output = file 时）
    pub log_file: Option<PathBuf>,
}

// ============================================================================
// 默认值函数
// ============================================================================

fn default_max_entries() -> usize {
    4
}

fn default_data_file() -> PathBuf {
    PathBuf::from("datafile.dat")
}

fn default_index_log_enabled() -> bool {
    true
}

fn default_index_log_filename() -> PathBuf {
    PathBuf::from("indexfile.idx")
}

fn default_sync_policy() -> String {
    "everysec".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

// ============================================================================
// 实现
// ============================================================================

impl Default for GeoStarConfig {
    fn default() -> Self {
        Self {
            tree: TreeConfig {
                max_entries: default_max_entries(),
            },
            storage: StorageConfig {
                data_file: default_data_file(),
                index_log: IndexLogSettings {
                    enabled: default_index_log_enabled(),
                    filename: default_index_log_filename(),
                    sync_policy: default_sync_policy(),
                },
            },
            logging: LoggingConfig {
                level: default_log_level(),
                output: default_log_output(),
                log_file: None,
            },
        }
    }
}

impl GeoStarConfig {
    /// 从文件加载配置
    ///
    /// 配置加载顺序（优先级从低到高）：
    /// 1. 默认配置（内嵌的 default.toml）
    /// 2. 用户配置文件（可选）
    /// 3. 环境变量（GEOSTAR__ 前缀，使用双下划线分隔嵌套）
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use geostar::config::GeoStarConfig;
    ///
    /// // 加载配置（如果文件不存在，使用默认配置）
    /// let config = GeoStarConfig::from_file("geostar.toml").unwrap();
    /// ```
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("GEOSTAR").separator("__"))
            .build()
            .map_err(|e| format!("Failed to load config: {}", e))?;

        Ok(settings
            .try_deserialize()
            .map_err(|e| format!("Failed to parse config: {}", e))?)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        std::fs::write(path, toml_string)
            .map_err(|e| format!("Failed to write config file: {}", e))?;
        Ok(())
    }

    /// 验证配置
    ///
    /// 检查节点容量、同步策略、日志级别和日志输出是否合法
    pub fn validate(&self) -> Result<(), String> {
        if self.tree.max_entries < 2 {
            return Err(format!(
                "Invalid max_entries: {}. A node must hold at least 2 entries",
                self.tree.max_entries
            ));
        }

        self.sync_policy()?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "Invalid log level: '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ))
            }
        }

        match self.logging.output.as_str() {
            "stdout" => {}
            "file" if self.logging.log_file.is_none() => {
                return Err("Log output is 'file' but log_file path is not specified".to_string());
            }
            "file" => {}
            other => {
                return Err(format!(
                    "Invalid log output: '{}'. Must be one of: stdout, file",
                    other
                ))
            }
        }

        Ok(())
    }

    /// 解析后的索引日志同步策略
    pub fn sync_policy(&self) -> Result<LogSyncPolicy, String> {
        self.storage.index_log.sync_policy.parse()
    }

    /// 转换为索引日志写入器的配置
    pub fn index_log_config(&self) -> Result<IndexLogConfig, String> {
        Ok(IndexLogConfig::new(self.storage.index_log.filename.clone())
            .set_sync_policy(self.sync_policy()?)
            .with_enabled(self.storage.index_log.enabled))
    }

    /// 打印配置摘要
    pub fn print_summary(&self) {
        println!("📋 geostar configuration:");
        println!("   Max Entries: {}", self.tree.max_entries);
        println!("   Data File:   {}", self.storage.data_file.display());
        println!(
            "   Index Log:   {}",
            if self.storage.index_log.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        if self.storage.index_log.enabled {
            println!(
                "   Log File:    {}",
                self.storage.index_log.filename.display()
            );
            println!("   Sync Policy: {}", self.storage.index_log.sync_policy);
        }
        println!("   Log Level:   {}", self.logging.level);
        println!("   Log Output:  {}", self.logging.output);
        if let Some(ref log_file) = self.logging.log_file {
            println!("   Log File:    {}", log_file.display());
        }
        println!();
    }
}
