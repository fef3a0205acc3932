//! 核心业务逻辑模块

pub mod keys;
pub mod draw_codec;
pub mod draws;
pub mod matcher;
pub mod lottery;

// 账户与安全
pub mod users;
pub mod totp;
pub mod security;
pub mod session;
pub mod audit;
