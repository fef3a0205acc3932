//! 安全日志
//!
//! 记录注册、登录、登出与越权访问等安全事件。事件同时写入 tracing（target = "security"）
//! 与内存环形缓冲区，后者供管理员查看最近的记录。

use std::collections::VecDeque;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::core::users::{Role, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    Registration,
    LoginSucceeded,
    LoginFailed,
    InvalidTotp,
    AttemptsExceeded,
    Logout,
    UnauthorisedAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub timestamp: u64,
    pub kind: SecurityEventKind,
    pub user_id: Option<UserId>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub client: String,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind, client: &str) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp() as u64,
            kind,
            user_id: None,
            email: None,
            role: None,
            client: client.to_string(),
        }
    }

    pub fn user(mut self, user_id: UserId, email: &str, role: Role) -> Self {
        self.user_id = Some(user_id);
        self.email = Some(email.to_string());
        self.role = Some(role);
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    fn title(&self) -> &'static str {
        match self.kind {
            SecurityEventKind::Registration => "User Registration",
            SecurityEventKind::LoginSucceeded => "Log In",
            SecurityEventKind::LoginFailed => "Login Failed",
            SecurityEventKind::InvalidTotp => "Login Failed (2FA token invalid)",
            SecurityEventKind::AttemptsExceeded => "Login Failed (exceeded login attempts)",
            SecurityEventKind::Logout => "Log Out",
            SecurityEventKind::UnauthorisedAccess => "SECURITY - Unauthorised access attempt",
        }
    }

    /// 形如 `10/18/2026 09:15:02 AM : Log In [2, bob@email.com, 127.0.0.1:5000]`
    pub fn line(&self) -> String {
        let when = chrono::DateTime::<chrono::Utc>::from_timestamp(self.timestamp as i64, 0)
            .map(|t| t.format("%m/%d/%Y %I:%M:%S %p").to_string())
            .unwrap_or_else(|| self.timestamp.to_string());

        let mut fields: Vec<String> = Vec::new();
        if let Some(id) = self.user_id {
            fields.push(id.to_string());
        }
        if let Some(email) = &self.email {
            fields.push(email.clone());
        }
        if let Some(role) = self.role.filter(|_| self.kind == SecurityEventKind::UnauthorisedAccess) {
            fields.push(format!("{:?}", role).to_lowercase());
        }
        fields.push(self.client.clone());

        format!("{} : {} [{}]", when, self.title(), fields.join(", "))
    }
}

#[derive(Clone)]
pub struct SecurityLog {
    entries: Arc<RwLock<VecDeque<SecurityEvent>>>,
    capacity: usize,
}

impl SecurityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, event: SecurityEvent) {
        warn!(target: "security", "{}", event.line());

        let mut entries = self.entries.write().await;
        entries.push_back(event);
        // 超出容量时丢弃最旧的记录
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// 最近的 n 条记录，最新的在前
    pub async fn recent(&self, n: usize) -> Vec<SecurityEvent> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(n).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
