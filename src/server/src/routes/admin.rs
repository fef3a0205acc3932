use std::sync::Arc;
use tracing::info;
use warp::{Filter, Rejection, Reply};

use crate::core::lottery::ServiceError;
use crate::core::matcher::LotteryError;
use crate::core::session::AuthSession;
use crate::core::users::Role;
use crate::errors::{error_reply, ApiError};
use crate::state::ServerState;
use crate::types::{
    reply_ok, AccountResponse, ApiResponse, DrawRequest, GreetingResponse, LogsResponse, RunLotteryResponse,
    WinningDrawResponse,
};
use crate::utils::{with_role, with_state};

const RECENT_LOG_ENTRIES: usize = 10;
const NO_VALID_WINNING_DRAW: &str = "No valid winning draw exists. Please add new winning draw.";

pub(crate) async fn admin_home(session: AuthSession) -> Result<impl Reply, Rejection> {
    Ok(reply_ok(GreetingResponse { name: session.firstname }))
}

pub(crate) async fn view_all_users(state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let users: Vec<AccountResponse> = state
        .users
        .read()
        .await
        .with_role(Role::User)
        .iter()
        .map(AccountResponse::from)
        .collect();
    Ok(reply_ok(users))
}

pub(crate) async fn create_winning_draw(state: Arc<ServerState>, session: AuthSession, req: DrawRequest) -> Result<warp::reply::Response, Rejection> {
    match state.lottery.create_winning_draw(session.user_id, &req.numbers).await {
        Ok(draw) => Ok(reply_ok(WinningDrawResponse { draw, message: "New winning draw added.".to_string() })),
        Err(e) => Ok(error_reply(&ApiError::from(e))),
    }
}

pub(crate) async fn view_winning_draw(state: Arc<ServerState>) -> Result<warp::reply::Response, Rejection> {
    match state.lottery.current_winning_draw().await {
        Ok(view) => Ok(reply_ok(view)),
        Err(ServiceError::Lottery(LotteryError::NoActiveWinningDraw)) => {
            Ok(warp::reply::json(&ApiResponse::<()>::error(NO_VALID_WINNING_DRAW.to_string())).into_response())
        }
        Err(e) => Ok(error_reply(&ApiError::from(e))),
    }
}

pub(crate) async fn run_lottery(state: Arc<ServerState>, session: AuthSession) -> Result<warp::reply::Response, Rejection> {
    match state.lottery.run_lottery().await {
        Ok(outcome) => {
            info!(
                "管理员 {} 完成第 {} 轮开奖: {} 注参与, {} 注中奖",
                session.user_id,
                outcome.round,
                outcome.played,
                outcome.winners.len()
            );
            let message = outcome.winners.is_empty().then(|| "No winners.".to_string());
            Ok(reply_ok(RunLotteryResponse { outcome, message }))
        }
        Err(e) => Ok(error_reply(&ApiError::from(e))),
    }
}

pub(crate) async fn logs(state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let entries = state
        .security_log
        .recent(RECENT_LOG_ENTRIES)
        .await
        .iter()
        .map(|e| e.line())
        .collect();
    Ok(reply_ok(LogsResponse { entries }))
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let admin_home_route = {
        let state = Arc::clone(&state);
        warp::path!("admin")
            .and(warp::get())
            .and(with_role(state, Role::Admin))
            .and_then(|session: AuthSession| async move { admin_home(session).await })
            .boxed()
    };
    let users_route = {
        let state = Arc::clone(&state);
        warp::path!("admin" / "users")
            .and(warp::get())
            .and(with_role(Arc::clone(&state), Role::Admin))
            .and(with_state(state))
            .and_then(|_session: AuthSession, state: Arc<ServerState>| async move { view_all_users(state).await })
            .boxed()
    };
    let create_winning_route = {
        let state = Arc::clone(&state);
        warp::path!("admin" / "winning-draw")
            .and(warp::post())
            .and(with_role(Arc::clone(&state), Role::Admin))
            .and(warp::body::json())
            .and(with_state(state))
            .and_then(|session: AuthSession, req: DrawRequest, state: Arc<ServerState>| async move {
                create_winning_draw(state, session, req).await
            })
            .boxed()
    };
    let view_winning_route = {
        let state = Arc::clone(&state);
        warp::path!("admin" / "winning-draw")
            .and(warp::get())
            .and(with_role(Arc::clone(&state), Role::Admin))
            .and(with_state(state))
            .and_then(|_session: AuthSession, state: Arc<ServerState>| async move { view_winning_draw(state).await })
            .boxed()
    };
    let run_lottery_route = {
        let state = Arc::clone(&state);
        warp::path!("admin" / "run-lottery")
            .and(warp::post())
            .and(with_role(Arc::clone(&state), Role::Admin))
            .and(with_state(state))
            .and_then(|session: AuthSession, state: Arc<ServerState>| async move { run_lottery(state, session).await })
            .boxed()
    };
    let logs_route = {
        let state = Arc::clone(&state);
        warp::path!("admin" / "logs")
            .and(warp::get())
            .and(with_role(Arc::clone(&state), Role::Admin))
            .and(with_state(state))
            .and_then(|_session: AuthSession, state: Arc<ServerState>| async move { logs(state).await })
            .boxed()
    };

    admin_home_route
        .or(users_route)
        .or(create_winning_route)
        .or(view_winning_route)
        .or(run_lottery_route)
        .or(logs_route)
        .boxed()
}
