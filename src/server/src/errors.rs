use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Rejection, Reply};
use tracing::error;

use crate::core::draw_codec::DrawError;
use crate::core::lottery::ServiceError;
use crate::core::matcher::LotteryError;
use crate::core::users::AccountError;
use crate::types::ApiResponse;
use warp::reject::Reject;

/// HTTP 边界上的错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Please log in to access this page")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl Reject for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Account(e) => match e {
                AccountError::EmailTaken => StatusCode::CONFLICT,
                AccountError::Invalid(_) => StatusCode::BAD_REQUEST,
                AccountError::BadCredentials { .. } | AccountError::InvalidTotp { .. } => StatusCode::UNAUTHORIZED,
                AccountError::AttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
                AccountError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Service(e) => match e {
                ServiceError::Draw(DrawError::InvalidNumberRange) => StatusCode::BAD_REQUEST,
                ServiceError::Draw(_) => StatusCode::INTERNAL_SERVER_ERROR,
                // 开奖条件不满足属于业务提示，不是请求错误
                ServiceError::Lottery(LotteryError::NoActiveWinningDraw)
                | ServiceError::Lottery(LotteryError::NoCandidates) => StatusCode::OK,
                ServiceError::Lottery(LotteryError::WinningDrawUnreadable) => StatusCode::INTERNAL_SERVER_ERROR,
                ServiceError::UnknownUser(_) => StatusCode::UNAUTHORIZED,
            },
        }
    }
}

/// 错误响应
pub fn error_reply(err: &ApiError) -> warp::reply::Response {
    let status = err.status();
    if status.is_server_error() {
        error!("请求处理失败: {}", err);
    }
    let body = warp::reply::json(&ApiResponse::<()>::error(err.to_string()));
    warp::reply::with_status(body, status).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(api) = err.find::<ApiError>() {
        (api.status(), api.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::BAD_REQUEST, "Payload too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        error!("未处理的错误: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };
    let response = ApiResponse::<()>::error(message);
    Ok(warp::reply::with_status(warp::reply::json(&response), code))
}
