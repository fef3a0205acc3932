//! 路由模块

pub mod health;
pub mod users;
pub mod lottery;
pub mod admin;

use std::sync::Arc;
use warp::{Filter, Reply};

use crate::errors::handle_rejection;
use crate::state::ServerState;

pub fn create_routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let app = health::routes()
        .or(users::routes(Arc::clone(&state)))
        .or(lottery::routes(Arc::clone(&state)))
        .or(admin::routes(state))
        .boxed();

    app.recover(handle_rejection)
        .with(warp::cors().allow_any_origin())
        .boxed()
}
