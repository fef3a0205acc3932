use serde::{Serialize, Deserialize};
use warp::Reply;

use crate::core::lottery::{DrawView, LotteryOutcome};
use crate::core::users::{Role, User, UserId};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    pub fn error(err: String) -> Self {
        Self { success: false, data: None, error: Some(err) }
    }
}

/// 成功响应（200）
pub fn reply_ok<T: Serialize>(data: T) -> warp::reply::Response {
    warp::reply::json(&ApiResponse::success(data)).into_response()
}

// 账户相关类型
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub email: String,
    pub pin_key: String,
    pub provisioning_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub expires_at: u64,
    pub redirect: String,
    pub last_logged_in: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountResponse {
    pub id: UserId,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub phone: String,
}

impl From<&User> for AccountResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GreetingResponse {
    pub name: String,
}

// 号码相关类型
#[derive(Debug, Serialize, Deserialize)]
pub struct DrawRequest {
    pub numbers: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DrawListResponse {
    pub draws: Vec<DrawView>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayAgainResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WinningDrawResponse {
    pub draw: DrawView,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunLotteryResponse {
    #[serde(flatten)]
    pub outcome: LotteryOutcome,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogsResponse {
    pub entries: Vec<String>,
}

// 工具函数
pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp() as u64
}
