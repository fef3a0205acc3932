//! 抽奖业务服务
//!
//! 组合用户目录、号码编解码与存储，提供用户投注、管理员设置中奖号码与开奖等操作。

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::draw_codec::{decode, encode, DrawError, DrawNumbers};
use crate::core::draws::{Draw, DrawId, DrawStore};
use crate::core::matcher::{self, CandidateFailure, Keyring, LotteryError, WinnerRecord};
use crate::core::users::{UserDirectory, UserId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Lottery(#[from] LotteryError),
    #[error("Unknown user {0}")]
    UnknownUser(UserId),
}

/// 解密后的号码视图
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawView {
    pub id: DrawId,
    pub numbers: DrawNumbers,
    pub played: bool,
    pub matches_master: bool,
    pub round: u32,
}

impl DrawView {
    fn from_draw(draw: &Draw, numbers: DrawNumbers) -> Self {
        Self {
            id: draw.id,
            numbers,
            played: draw.played,
            matches_master: draw.matches_master,
            round: draw.round,
        }
    }
}

/// 一次开奖的汇总
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LotteryOutcome {
    pub round: u32,
    pub winning_numbers: DrawNumbers,
    pub winners: Vec<WinnerRecord>,
    pub failures: Vec<CandidateFailure>,
    pub played: usize,
}

#[derive(Clone)]
pub struct LotteryService {
    users: UserDirectory,
    draws: DrawStore,
}

impl LotteryService {
    pub fn new(users: UserDirectory, draws: DrawStore) -> Self {
        Self { users, draws }
    }

    pub fn draws(&self) -> &DrawStore {
        &self.draws
    }

    /// 用户提交一注号码
    pub async fn submit_draw(&self, user_id: UserId, numbers: &[i64]) -> Result<DrawView, ServiceError> {
        let numbers = DrawNumbers::new(numbers)?;
        let user = self.users.get(user_id).await.ok_or(ServiceError::UnknownUser(user_id))?;
        let payload = encode(&numbers, &user.draw_key)?;
        let draw = self.draws.insert_user_draw(user_id, payload).await;
        info!("用户 {} 提交号码 {}", user_id, draw.id);
        Ok(DrawView::from_draw(&draw, numbers))
    }

    /// 用户的号码（played 指定已开奖或未开奖），无法解密的记录跳过
    pub async fn user_draws(&self, user_id: UserId, played: bool) -> Result<Vec<DrawView>, ServiceError> {
        let user = self.users.get(user_id).await.ok_or(ServiceError::UnknownUser(user_id))?;
        let views = self
            .draws
            .draws_for_user(user_id, played)
            .await
            .iter()
            .filter_map(|d| match decode(&d.payload, &user.draw_key) {
                Ok(numbers) => Some(DrawView::from_draw(d, numbers)),
                Err(e) => {
                    warn!("用户 {} 的号码 {} 解密失败，跳过: {}", user_id, d.id, e);
                    None
                }
            })
            .collect();
        Ok(views)
    }

    pub async fn play_again(&self, user_id: UserId) -> usize {
        self.draws.delete_played_for_user(user_id).await
    }

    /// 管理员设置新的中奖号码，使用管理员自己的密钥加密
    pub async fn create_winning_draw(&self, admin_id: UserId, numbers: &[i64]) -> Result<DrawView, ServiceError> {
        let numbers = DrawNumbers::new(numbers)?;
        let admin = self.users.get(admin_id).await.ok_or(ServiceError::UnknownUser(admin_id))?;
        let payload = encode(&numbers, &admin.draw_key)?;
        let draw = self.draws.replace_master(admin_id, payload).await;
        info!("管理员 {} 设置第 {} 轮中奖号码", admin_id, draw.round);
        Ok(DrawView::from_draw(&draw, numbers))
    }

    /// 当前未开奖的中奖号码
    pub async fn current_winning_draw(&self) -> Result<DrawView, ServiceError> {
        let draw = self
            .draws
            .find_master_unplayed()
            .await
            .ok_or(LotteryError::NoActiveWinningDraw)?;
        let users = self.users.read().await;
        let key = users
            .key_for(draw.owner.key_holder())
            .ok_or(LotteryError::WinningDrawUnreadable)?;
        let numbers = decode(&draw.payload, key).map_err(|_| LotteryError::WinningDrawUnreadable)?;
        Ok(DrawView::from_draw(&draw, numbers))
    }

    /// 开奖：在存储写锁内完成匹配并写回
    pub async fn run_lottery(&self) -> Result<LotteryOutcome, ServiceError> {
        let users = self.users.read().await;
        let outcome = self.draws.with_exclusive(|winning, candidates| {
            match matcher::run(winning, candidates, &*users) {
                Ok(run) => {
                    let outcome = LotteryOutcome {
                        round: run.winning.round,
                        winning_numbers: run.winning_numbers,
                        winners: run.winners,
                        failures: run.failures,
                        played: run.candidates.len(),
                    };
                    let mut updated = run.candidates;
                    updated.push(run.winning);
                    (updated, Ok(outcome))
                }
                Err(e) => (Vec::new(), Err(e)),
            }
        }).await?;
        Ok(outcome)
    }
}
