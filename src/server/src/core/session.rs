//! 登录会话管理
//!
//! 登录成功后签发随机令牌，客户端以 `Authorization: Bearer <token>` 携带。

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::users::{Role, User, UserId};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user_id: UserId,
    pub email: String,
    pub firstname: String,
    pub role: Role,
    pub created_at: u64,
    pub expires_at: u64,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<HashMap<String, AuthSession>>>,
    ttl_secs: u64,
}

impl SessionManager {
    pub fn new(ttl_secs: u64) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), ttl_secs }
    }

    pub async fn issue(&self, user: &User, now: u64) -> AuthSession {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);

        let session = AuthSession {
            token: token.clone(),
            user_id: user.id,
            email: user.email.clone(),
            firstname: user.firstname.clone(),
            role: user.role,
            created_at: now,
            expires_at: now.saturating_add(self.ttl_secs),
        };
        self.inner.write().await.insert(token, session.clone());
        session
    }

    /// 查询会话；已过期的会话会被移除
    pub async fn get(&self, token: &str, now: u64) -> Option<AuthSession> {
        let session = self.inner.read().await.get(token).cloned()?;
        if now >= session.expires_at {
            self.inner.write().await.remove(token);
            return None;
        }
        Some(session)
    }

    pub async fn revoke(&self, token: &str) -> Option<AuthSession> {
        self.inner.write().await.remove(token)
    }

    pub async fn cleanup_expired(&self, now: u64) {
        self.inner.write().await.retain(|_, s| now < s.expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys::generate_key;

    fn user() -> User {
        User {
            id: 7,
            email: "bob@email.com".to_string(),
            firstname: "Bob".to_string(),
            lastname: "Billy".to_string(),
            phone: "019-123-4567".to_string(),
            role: Role::User,
            password_hash: String::new(),
            pin_key: String::new(),
            draw_key: generate_key(),
            registered_on: 0,
            last_logged_in: None,
            current_logged_in: None,
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let mgr = SessionManager::new(60);
        let s = mgr.issue(&user(), 1000).await;
        assert_eq!(s.user_id, 7);
        assert_eq!(s.expires_at, 1060);
        assert!(s.token.len() >= 43);

        assert_eq!(mgr.get(&s.token, 1059).await.map(|x| x.user_id), Some(7));
        assert!(mgr.get("unknown", 1000).await.is_none());

        assert!(mgr.revoke(&s.token).await.is_some());
        assert!(mgr.get(&s.token, 1000).await.is_none());
    }

    #[tokio::test]
    async fn test_session_expiry() {
        let mgr = SessionManager::new(60);
        let a = mgr.issue(&user(), 1000).await;
        let b = mgr.issue(&user(), 2000).await;
        assert_ne!(a.token, b.token);
        assert!(mgr.get(&a.token, 1060).await.is_none());

        mgr.cleanup_expired(2059).await;
        assert!(mgr.get(&b.token, 2059).await.is_some());
    }
}
