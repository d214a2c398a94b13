//! 配置管理模块
//!
//! 支持命令行参数与环境变量两种来源，环境变量优先级更高
//! （先解析命令行，再用环境变量覆盖同名配置项）。

use clap::Parser;

/// 开发环境兜底密钥，生产环境必须通过 SECRET_KEY 覆盖
pub const DEFAULT_SECRET_KEY: &str = "your-secret-key-change-this-in-production";

/// 命令行参数
///
/// 与环境变量的对应关系：
/// - `-a` <-> RUN_ADDRESS
/// - `-d` <-> DATABASE_URI
/// - `-r` <-> ACCRUAL_SYSTEM_ADDRESS
#[derive(Debug, Parser)]
#[command(name = "loyalty-service", about = "积分累积服务")]
struct Flags {
    /// 服务监听地址
    #[arg(short = 'a', default_value = ":8080")]
    address: String,

    /// PostgreSQL 连接串
    #[arg(short = 'd', default_value = "")]
    database_uri: String,

    /// 积分计算系统地址
    #[arg(short = 'r', default_value = "")]
    accrual_address: String,
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct Config {
    pub run_address: String,
    pub database_uri: String,
    pub accrual_address: String,
    pub secret_key: String,
    /// 日志级别（LOG_LEVEL，默认 info）
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Config {
    /// 从命令行参数和环境变量加载配置
    pub fn load() -> Self {
        Self::from_flags(Flags::parse())
    }

    fn from_flags(flags: Flags) -> Self {
        let mut config = Self {
            run_address: flags.address,
            database_uri: flags.database_uri,
            accrual_address: flags.accrual_address,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        };
        config.apply_env();
        config
    }

    /// 环境变量覆盖（env 优先于命令行）
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("RUN_ADDRESS") {
            self.run_address = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URI") {
            self.database_uri = v;
        }
        if let Ok(v) = std::env::var("ACCRUAL_SYSTEM_ADDRESS") {
            self.accrual_address = v;
        }
        if let Ok(v) = std::env::var("SECRET_KEY") {
            self.secret_key = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("LOG_FORMAT") {
            self.log_format = v;
        }
    }

    /// 获取服务监听地址
    ///
    /// `:8080` 这种仅含端口的写法补全为 `0.0.0.0:8080`。
    pub fn listen_addr(&self) -> String {
        if self.run_address.starts_with(':') {
            format!("0.0.0.0{}", self.run_address)
        } else {
            self.run_address.clone()
        }
    }

    /// 获取积分计算系统的完整地址
    ///
    /// 配置值未携带协议时补全 http:// 前缀。
    pub fn accrual_base_url(&self) -> String {
        if self.accrual_address.starts_with("http://") || self.accrual_address.starts_with("https://")
        {
            self.accrual_address.clone()
        } else {
            format!("http://{}", self.accrual_address)
        }
    }

    /// 是否仍在使用不安全的默认密钥
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}
