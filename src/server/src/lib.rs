//! 彩票抽奖服务：号码加密存储、开奖匹配与账户安全

pub mod config;
pub mod core;
pub mod errors;
pub mod routes;
pub mod state;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;
