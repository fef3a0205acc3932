use std::sync::Arc;
use tracing::{info, warn};
use warp::{Filter, Rejection, Reply};

use crate::core::audit::{SecurityEvent, SecurityEventKind};
use crate::core::session::AuthSession;
use crate::core::totp;
use crate::core::users::{AccountError, Registration, Role};
use crate::errors::{error_reply, ApiError};
use crate::state::ServerState;
use crate::types::{now_secs, reply_ok, AccountResponse, GreetingResponse, LoginRequest, LoginResponse, RegisterResponse};
use crate::utils::{with_auth, with_client, with_role, with_state};

const TOTP_ISSUER: &str = "Lottery Web App";

pub(crate) async fn register(state: Arc<ServerState>, form: Registration, client: String) -> Result<warp::reply::Response, Rejection> {
    if let Err(e) = state.validator.validate(&form) {
        return Ok(error_reply(&ApiError::from(e)));
    }
    let user = match state.users.create(&form, Role::User).await {
        Ok(u) => u,
        Err(e) => return Ok(error_reply(&ApiError::from(e))),
    };
    state
        .security_log
        .record(SecurityEvent::new(SecurityEventKind::Registration, &client).user(user.id, &user.email, user.role))
        .await;
    info!("新用户注册: {}", user.id);
    let response = RegisterResponse {
        user_id: user.id,
        email: user.email.clone(),
        provisioning_uri: totp::provisioning_uri(&user.pin_key, &user.email, TOTP_ISSUER),
        pin_key: user.pin_key,
    };
    Ok(reply_ok(response))
}

pub(crate) async fn login(state: Arc<ServerState>, req: LoginRequest, client: String) -> Result<warp::reply::Response, Rejection> {
    let now = now_secs();
    state.login_guard.cleanup_expired(now).await;
    if let Err(e) = state.login_guard.check(&client, now).await {
        state
            .security_log
            .record(SecurityEvent::new(SecurityEventKind::AttemptsExceeded, &client).email(&req.email))
            .await;
        return Ok(error_reply(&ApiError::from(e)));
    }

    let user = match state.users.check_password(&req.email, &req.password).await {
        Some(u) => u,
        None => {
            let attempts_left = state.login_guard.record_failure(&client, now).await;
            state
                .security_log
                .record(SecurityEvent::new(SecurityEventKind::LoginFailed, &client).email(&req.email))
                .await;
            return Ok(error_reply(&ApiError::from(AccountError::BadCredentials { attempts_left })));
        }
    };

    if !totp::verify(&user.pin_key, &req.pin, now, state.config.totp_skew_steps) {
        let attempts_left = state.login_guard.record_failure(&client, now).await;
        state
            .security_log
            .record(SecurityEvent::new(SecurityEventKind::InvalidTotp, &client).user(user.id, &user.email, user.role))
            .await;
        return Ok(error_reply(&ApiError::from(AccountError::InvalidTotp { attempts_left })));
    }

    state.login_guard.reset(&client).await;
    let user = state.users.record_login(user.id, now).await.unwrap_or(user);
    state.sessions.cleanup_expired(now).await;
    let session = state.sessions.issue(&user, now).await;
    state
        .security_log
        .record(SecurityEvent::new(SecurityEventKind::LoginSucceeded, &client).user(user.id, &user.email, user.role))
        .await;

    let redirect = match user.role {
        Role::Admin => "/admin",
        Role::User => "/profile",
    };
    Ok(reply_ok(LoginResponse {
        token: session.token,
        role: session.role,
        expires_at: session.expires_at,
        redirect: redirect.to_string(),
        last_logged_in: user.last_logged_in,
    }))
}

pub(crate) async fn logout(state: Arc<ServerState>, session: AuthSession, client: String) -> Result<impl Reply, Rejection> {
    if state.sessions.revoke(&session.token).await.is_none() {
        warn!("会话已失效: 用户 {}", session.user_id);
    }
    state
        .security_log
        .record(SecurityEvent::new(SecurityEventKind::Logout, &client).user(session.user_id, &session.email, session.role))
        .await;
    Ok(reply_ok(()))
}

pub(crate) async fn account(state: Arc<ServerState>, session: AuthSession) -> Result<warp::reply::Response, Rejection> {
    match state.users.get(session.user_id).await {
        Some(user) => Ok(reply_ok(AccountResponse::from(&user))),
        None => Ok(error_reply(&ApiError::Unauthorized)),
    }
}

pub(crate) async fn profile(session: AuthSession) -> Result<impl Reply, Rejection> {
    Ok(reply_ok(GreetingResponse { name: session.firstname }))
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let register_route = {
        let state = Arc::clone(&state);
        warp::path!("register")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_client())
            .and(with_state(state))
            .and_then(|form: Registration, client: String, state: Arc<ServerState>| async move { register(state, form, client).await })
            .boxed()
    };
    let login_route = {
        let state = Arc::clone(&state);
        warp::path!("login")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_client())
            .and(with_state(state))
            .and_then(|req: LoginRequest, client: String, state: Arc<ServerState>| async move { login(state, req, client).await })
            .boxed()
    };
    let logout_route = {
        let state = Arc::clone(&state);
        warp::path!("logout")
            .and(warp::post())
            .and(with_auth(Arc::clone(&state)))
            .and(with_client())
            .and(with_state(state))
            .and_then(|session: AuthSession, client: String, state: Arc<ServerState>| async move { logout(state, session, client).await })
            .boxed()
    };
    let account_route = {
        let state = Arc::clone(&state);
        warp::path!("account")
            .and(warp::get())
            .and(with_auth(Arc::clone(&state)))
            .and(with_state(state))
            .and_then(|session: AuthSession, state: Arc<ServerState>| async move { account(state, session).await })
            .boxed()
    };
    let profile_route = {
        let state = Arc::clone(&state);
        warp::path!("profile")
            .and(warp::get())
            .and(with_role(state, Role::User))
            .and_then(|session: AuthSession| async move { profile(session).await })
            .boxed()
    };

    register_route
        .or(login_route)
        .or(logout_route)
        .or(account_route)
        .or(profile_route)
        .boxed()
}
