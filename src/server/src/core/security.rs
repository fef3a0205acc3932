//! 基础安全机制
//!
//! 密码哈希（Argon2）与登录失败次数限制。

use std::collections::HashMap;
use std::sync::Arc;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::SaltString;
use rand::rngs::OsRng;
use tokio::sync::RwLock;

use crate::core::users::AccountError;

fn hash_password_sync(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AccountError::PasswordHash)
}

fn verify_password_sync(password: &str, hash: &str) -> Result<bool, AccountError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AccountError::PasswordHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 使用 Argon2 哈希密码（在阻塞线程池中执行）
pub async fn hash_password(password: &str) -> Result<String, AccountError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_sync(&password))
        .await
        .map_err(|_| AccountError::PasswordHash)?
}

/// 校验密码（在阻塞线程池中执行）
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AccountError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_password_sync(&password, &hash))
        .await
        .map_err(|_| AccountError::PasswordHash)?
}

/// 单个客户端的登录失败计数，从第一次失败起 `window_secs` 内有效
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginAttempts {
    failures: u32,
    first_failure_at: u64,
}

impl LoginAttempts {
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn exhausted(&self, max_attempts: u32) -> bool {
        self.failures >= max_attempts
    }

    pub fn remaining(&self, max_attempts: u32) -> u32 {
        max_attempts.saturating_sub(self.failures)
    }

    pub fn expired(&self, now: u64, window_secs: u64) -> bool {
        now >= self.first_failure_at.saturating_add(window_secs)
    }

    /// 记录一次失败，返回剩余次数
    pub fn record_failure(&mut self, max_attempts: u32, now: u64) -> u32 {
        if self.failures == 0 {
            self.first_failure_at = now;
        }
        self.failures = self.failures.saturating_add(1);
        self.remaining(max_attempts)
    }
}

/// 登录限流：按客户端标识维护失败次数，超过窗口后自动解除
#[derive(Clone)]
pub struct LoginGuard {
    attempts: Arc<RwLock<HashMap<String, LoginAttempts>>>,
    max_attempts: u32,
    window_secs: u64,
}

impl LoginGuard {
    pub fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window_secs,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn attempts(&self, client_id: &str, now: u64) -> LoginAttempts {
        self.attempts
            .read()
            .await
            .get(client_id)
            .filter(|a| !a.expired(now, self.window_secs))
            .copied()
            .unwrap_or_default()
    }

    /// 失败次数已用完时拒绝
    pub async fn check(&self, client_id: &str, now: u64) -> Result<(), AccountError> {
        if self.attempts(client_id, now).await.exhausted(self.max_attempts) {
            return Err(AccountError::AttemptsExceeded);
        }
        Ok(())
    }

    pub async fn record_failure(&self, client_id: &str, now: u64) -> u32 {
        let mut attempts = self.attempts.write().await;
        let entry = attempts.entry(client_id.to_string()).or_default();
        if entry.expired(now, self.window_secs) {
            *entry = LoginAttempts::default();
        }
        entry.record_failure(self.max_attempts, now)
    }

    pub async fn reset(&self, client_id: &str) {
        self.attempts.write().await.remove(client_id);
    }

    /// 清理过期的计数
    pub async fn cleanup_expired(&self, now: u64) {
        let window_secs = self.window_secs;
        self.attempts.write().await.retain(|_, a| !a.expired(now, window_secs));
    }

    pub async fn len(&self) -> usize {
        self.attempts.read().await.len()
    }
}
