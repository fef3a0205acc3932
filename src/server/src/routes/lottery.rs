use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::core::session::AuthSession;
use crate::core::users::Role;
use crate::errors::{error_reply, ApiError};
use crate::state::ServerState;
use crate::types::{reply_ok, DrawListResponse, DrawRequest, PlayAgainResponse};
use crate::utils::{with_role, with_state};

const NEXT_ROUND_PENDING: &str = "Next round of lottery yet to play. Check you have submitted draws.";

pub(crate) async fn add_draw(state: Arc<ServerState>, session: AuthSession, req: DrawRequest) -> Result<warp::reply::Response, Rejection> {
    match state.lottery.submit_draw(session.user_id, &req.numbers).await {
        Ok(view) => Ok(reply_ok(view)),
        Err(e) => Ok(error_reply(&ApiError::from(e))),
    }
}

/// 查看尚未开奖的号码
pub(crate) async fn view_draws(state: Arc<ServerState>, session: AuthSession) -> Result<warp::reply::Response, Rejection> {
    match state.lottery.user_draws(session.user_id, false).await {
        Ok(draws) => {
            let message = draws.is_empty().then(|| "No playable draws.".to_string());
            Ok(reply_ok(DrawListResponse { draws, message }))
        }
        Err(e) => Ok(error_reply(&ApiError::from(e))),
    }
}

/// 查看已开奖的号码及是否中奖
pub(crate) async fn check_draws(state: Arc<ServerState>, session: AuthSession) -> Result<warp::reply::Response, Rejection> {
    match state.lottery.user_draws(session.user_id, true).await {
        Ok(draws) => {
            let message = draws.is_empty().then(|| NEXT_ROUND_PENDING.to_string());
            Ok(reply_ok(DrawListResponse { draws, message }))
        }
        Err(e) => Ok(error_reply(&ApiError::from(e))),
    }
}

pub(crate) async fn play_again(state: Arc<ServerState>, session: AuthSession) -> Result<impl Reply, Rejection> {
    let removed = state.lottery.play_again(session.user_id).await;
    Ok(reply_ok(PlayAgainResponse { removed }))
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let add_draw_route = {
        let state = Arc::clone(&state);
        warp::path!("lottery" / "draws")
            .and(warp::post())
            .and(with_role(Arc::clone(&state), Role::User))
            .and(warp::body::json())
            .and(with_state(state))
            .and_then(|session: AuthSession, req: DrawRequest, state: Arc<ServerState>| async move { add_draw(state, session, req).await })
            .boxed()
    };
    let view_draws_route = {
        let state = Arc::clone(&state);
        warp::path!("lottery" / "draws")
            .and(warp::get())
            .and(with_role(Arc::clone(&state), Role::User))
            .and(with_state(state))
            .and_then(|session: AuthSession, state: Arc<ServerState>| async move { view_draws(state, session).await })
            .boxed()
    };
    let check_draws_route = {
        let state = Arc::clone(&state);
        warp::path!("lottery" / "results")
            .and(warp::get())
            .and(with_role(Arc::clone(&state), Role::User))
            .and(with_state(state))
            .and_then(|session: AuthSession, state: Arc<ServerState>| async move { check_draws(state, session).await })
            .boxed()
    };
    let play_again_route = {
        let state = Arc::clone(&state);
        warp::path!("lottery" / "play-again")
            .and(warp::post())
            .and(with_role(Arc::clone(&state), Role::User))
            .and(with_state(state))
            .and_then(|session: AuthSession, state: Arc<ServerState>| async move { play_again(state, session).await })
            .boxed()
    };

    add_draw_route
        .or(view_draws_route)
        .or(check_draws_route)
        .or(play_again_route)
        .boxed()
}
