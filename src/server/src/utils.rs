use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, Rejection};

use crate::core::audit::{SecurityEvent, SecurityEventKind};
use crate::core::session::AuthSession;
use crate::core::users::Role;
use crate::errors::ApiError;
use crate::state::ServerState;
use crate::types::now_secs;

pub fn with_state(state: Arc<ServerState>) -> impl Filter<Extract = (Arc<ServerState>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}

/// 客户端标识（远端地址），测试请求没有地址时为 "unknown"
pub fn with_client() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::addr::remote().map(|addr: Option<SocketAddr>| {
        addr.map(|a| a.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
    })
}

fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// 需要登录
pub fn with_auth(state: Arc<ServerState>) -> impl Filter<Extract = (AuthSession,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: Arc<ServerState>| async move {
            let token = bearer_token(header.as_deref()).ok_or_else(|| warp::reject::custom(ApiError::Unauthorized))?;
            state
                .sessions
                .get(token, now_secs())
                .await
                .ok_or_else(|| warp::reject::custom(ApiError::Unauthorized))
        })
}

/// 需要登录且角色匹配；角色不符时记录越权访问
pub fn with_role(state: Arc<ServerState>, role: Role) -> impl Filter<Extract = (AuthSession,), Error = Rejection> + Clone {
    with_auth(Arc::clone(&state))
        .and(with_client())
        .and(with_state(state))
        .and_then(move |session: AuthSession, client: String, state: Arc<ServerState>| async move {
            if session.role == role {
                return Ok(session);
            }
            state
                .security_log
                .record(
                    SecurityEvent::new(SecurityEventKind::UnauthorisedAccess, &client)
                        .user(session.user_id, &session.email, session.role),
                )
                .await;
            Err(warp::reject::custom(ApiError::Forbidden))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("  Bearer   abc ")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }
}
