//! 服务器配置，启动时从环境变量读取一次

use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub max_login_attempts: u32,
    pub login_lockout_secs: u64,
    pub totp_skew_steps: u32,
    pub security_log_capacity: usize,
    pub session_ttl_secs: u64,
    pub seed_accounts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            max_login_attempts: 3,
            login_lockout_secs: 300,
            totp_skew_steps: 1,
            security_log_capacity: 1000,
            session_ttl_secs: 3600,
            seed_accounts: false,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        // 端口与地址配置错误时拒绝启动
        let port = match std::env::var("PORT") {
            Ok(v) => v.parse::<u16>().map_err(|e| format!("端口解析失败: {}", e))?,
            Err(_) => defaults.port,
        };
        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(v) => v.parse::<IpAddr>().map_err(|e| format!("监听地址解析失败: {}", e))?,
            Err(_) => defaults.bind_addr,
        };

        Ok(Self {
            bind_addr,
            port,
            max_login_attempts: env_or("MAX_LOGIN_ATTEMPTS", defaults.max_login_attempts).max(1),
            login_lockout_secs: env_or("LOGIN_LOCKOUT_SECS", defaults.login_lockout_secs),
            totp_skew_steps: env_or("TOTP_SKEW_STEPS", defaults.totp_skew_steps),
            security_log_capacity: env_or("SECURITY_LOG_CAPACITY", defaults.security_log_capacity),
            session_ttl_secs: env_or("SESSION_TTL_SECS", defaults.session_ttl_secs),
            seed_accounts: env_flag("LOTTERY_SEED_ACCOUNTS"),
        })
    }
}
