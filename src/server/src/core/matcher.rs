//! 开奖匹配
//!
//! 以中奖号码为准，逐条解密未开奖的用户号码并比对。号码比较区分顺序：
//! 六个号码须按相同顺序完全一致才算中奖。每条号码用其归属用户的密钥解密，
//! 中奖号码用创建它的管理员的密钥解密，比较的是解密后的明文。

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::draw_codec::{decode, DrawError, DrawNumbers};
use crate::core::draws::{Draw, DrawId};
use crate::core::keys::DrawKey;
use crate::core::users::UserId;

/// 按用户查询密钥与邮箱
pub trait Keyring {
    fn key_for(&self, user_id: UserId) -> Option<&DrawKey>;
    fn email_for(&self, user_id: UserId) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LotteryError {
    #[error("Current winning draw expired. Add new winning draw for next round.")]
    NoActiveWinningDraw,
    #[error("No user draws entered.")]
    NoCandidates,
    #[error("Current winning draw could not be decrypted")]
    WinningDrawUnreadable,
}

/// 中奖记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub round: u32,
    pub numbers: DrawNumbers,
    pub user_id: UserId,
    pub email: String,
}

/// 无法处理的候选号码
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub draw_id: DrawId,
    pub user_id: Option<UserId>,
    pub reason: String,
}

/// 一次开奖的结果
#[derive(Debug, Clone)]
pub struct LotteryRun {
    pub winning: Draw,
    pub winning_numbers: DrawNumbers,
    pub winners: Vec<WinnerRecord>,
    pub candidates: Vec<Draw>,
    pub failures: Vec<CandidateFailure>,
}

fn decode_with(draw: &Draw, keys: &impl Keyring) -> Result<DrawNumbers, DrawError> {
    let key = keys
        .key_for(draw.owner.key_holder())
        .ok_or(DrawError::DecryptionError)?;
    decode(&draw.payload, key)
}

/// 执行开奖。前置条件不满足时不做任何修改。
pub fn run(
    winning: Option<Draw>,
    candidates: Vec<Draw>,
    keys: &impl Keyring,
) -> Result<LotteryRun, LotteryError> {
    let mut winning = match winning {
        Some(draw) if draw.is_active_master() => draw,
        _ => return Err(LotteryError::NoActiveWinningDraw),
    };
    if candidates.is_empty() {
        return Err(LotteryError::NoCandidates);
    }
    let winning_numbers = decode_with(&winning, keys).map_err(|e| {
        warn!("中奖号码 {} 解密失败: {}", winning.id, e);
        LotteryError::WinningDrawUnreadable
    })?;

    // commit point
    winning.played = true;
    let round = winning.round;

    let mut winners = Vec::new();
    let mut failures = Vec::new();
    let mut updated = Vec::with_capacity(candidates.len());

    for mut draw in candidates {
        match decode_with(&draw, keys) {
            Ok(numbers) if numbers == winning_numbers => {
                let user_id = draw.owner.key_holder();
                winners.push(WinnerRecord {
                    round,
                    numbers,
                    user_id,
                    email: keys.email_for(user_id).unwrap_or_default().to_string(),
                });
                draw.matches_master = true;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("号码 {} 解密失败，跳过: {}", draw.id, e);
                failures.push(CandidateFailure {
                    draw_id: draw.id,
                    user_id: draw.owner.user_id(),
                    reason: e.to_string(),
                });
            }
        }
        draw.played = true;
        draw.round = round;
        updated.push(draw);
    }

    info!(
        "第 {} 轮开奖完成: 候选 {} 条, 中奖 {} 条, 失败 {} 条",
        round,
        updated.len(),
        winners.len(),
        failures.len()
    );

    Ok(LotteryRun {
        winning,
        winning_numbers,
        winners,
        candidates: updated,
        failures,
    })
}
