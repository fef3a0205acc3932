use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::audit::SecurityLog;
use crate::core::draws::DrawStore;
use crate::core::lottery::LotteryService;
use crate::core::security::LoginGuard;
use crate::core::session::SessionManager;
use crate::core::users::{AccountError, Registration, RegistrationValidator, Role, User, UserDirectory};

/// 服务器状态
#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub users: UserDirectory,
    // 号码存储与开奖服务共享同一个 DrawStore
    pub lottery: LotteryService,
    pub sessions: SessionManager,
    // 按客户端地址统计登录失败次数
    pub login_guard: LoginGuard,
    pub security_log: SecurityLog,
    pub validator: Arc<RegistrationValidator>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Result<Self, String> {
        let validator = RegistrationValidator::new().map_err(|e| format!("注册校验器初始化失败: {}", e))?;
        let users = UserDirectory::new();
        let lottery = LotteryService::new(users.clone(), DrawStore::new());
        Ok(Self {
            sessions: SessionManager::new(config.session_ttl_secs),
            login_guard: LoginGuard::new(config.max_login_attempts, config.login_lockout_secs),
            security_log: SecurityLog::new(config.security_log_capacity),
            validator: Arc::new(validator),
            users,
            lottery,
            config,
        })
    }

    /// 创建演示账户：一个管理员和一个普通用户
    pub async fn seed_default_accounts(&self) -> Result<(User, User), AccountError> {
        let admin = self.users.create(&seed_form("admin@email.com", "Alice", "Jones", "Admin1!"), Role::Admin).await?;
        let user = self.users.create(&seed_form("user@email.com", "Bob", "Billy", "User1!"), Role::User).await?;
        info!("已创建演示账户: {} / {}", admin.email, user.email);
        Ok((admin, user))
    }
}

fn seed_form(email: &str, firstname: &str, lastname: &str, password: &str) -> Registration {
    Registration {
        email: email.to_string(),
        firstname: firstname.to_string(),
        lastname: lastname.to_string(),
        phone: "019-123-4567".to_string(),
        password: password.to_string(),
        confirm_password: password.to_string(),
    }
}
