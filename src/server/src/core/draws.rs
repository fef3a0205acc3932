//! 抽奖记录与存储
//!
//! 中奖号码（master draw）保存在单独的槽位中，任意时刻至多存在一个；
//! 新建中奖号码会替换旧的，轮次加一。

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::draw_codec::Ciphertext;
use crate::core::users::UserId;

pub type DrawId = u64;

/// 号码归属
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOwner {
    /// 用户提交的号码
    User(UserId),
    /// 管理员创建的中奖号码，不属于任何用户；keyed_by 为加密所用密钥的持有者
    Master { keyed_by: UserId },
}

impl DrawOwner {
    /// 解密所需密钥的持有者
    pub fn key_holder(&self) -> UserId {
        match *self {
            DrawOwner::User(id) => id,
            DrawOwner::Master { keyed_by } => keyed_by,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match *self {
            DrawOwner::User(id) => Some(id),
            DrawOwner::Master { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub id: DrawId,
    pub owner: DrawOwner,
    pub payload: Ciphertext,
    pub master: bool,
    pub played: bool,
    pub matches_master: bool,
    pub round: u32,
}

impl Draw {
    pub fn is_active_master(&self) -> bool {
        self.master && !self.played
    }
}

#[derive(Default)]
struct DrawTable {
    next_id: DrawId,
    master: Option<Draw>,
    user_draws: BTreeMap<DrawId, Draw>,
}

impl DrawTable {
    fn allocate_id(&mut self) -> DrawId {
        self.next_id += 1;
        self.next_id
    }
}

/// 内存中的抽奖记录存储
#[derive(Clone, Default)]
pub struct DrawStore {
    inner: Arc<RwLock<DrawTable>>,
}

impl DrawStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未开奖的中奖号码
    pub async fn find_master_unplayed(&self) -> Option<Draw> {
        let g = self.inner.read().await;
        g.master.as_ref().filter(|d| !d.played).cloned()
    }

    /// 所有未开奖的用户号码，按提交顺序
    pub async fn find_candidates_unplayed(&self) -> Vec<Draw> {
        let g = self.inner.read().await;
        g.user_draws.values().filter(|d| !d.played).cloned().collect()
    }

    /// 保存（插入或按 id 覆盖）
    pub async fn save(&self, draw: Draw) {
        let mut g = self.inner.write().await;
        Self::save_locked(&mut g, draw);
    }

    fn save_locked(table: &mut DrawTable, draw: Draw) {
        if draw.master {
            table.master = Some(draw);
        } else {
            table.user_draws.insert(draw.id, draw);
        }
    }

    pub async fn delete(&self, id: DrawId) -> Option<Draw> {
        let mut g = self.inner.write().await;
        if g.master.as_ref().map_or(false, |m| m.id == id) {
            return g.master.take();
        }
        g.user_draws.remove(&id)
    }

    /// 新增一条用户号码
    pub async fn insert_user_draw(&self, user_id: UserId, payload: Ciphertext) -> Draw {
        let mut g = self.inner.write().await;
        let draw = Draw {
            id: g.allocate_id(),
            owner: DrawOwner::User(user_id),
            payload,
            master: false,
            played: false,
            matches_master: false,
            round: 0,
        };
        g.user_draws.insert(draw.id, draw.clone());
        draw
    }

    /// 替换中奖号码，返回新记录；轮次为上一条中奖号码轮次加一，首次为 1
    pub async fn replace_master(&self, keyed_by: UserId, payload: Ciphertext) -> Draw {
        let mut g = self.inner.write().await;
        let round = g.master.as_ref().map_or(1, |m| m.round + 1);
        let draw = Draw {
            id: g.allocate_id(),
            owner: DrawOwner::Master { keyed_by },
            payload,
            master: true,
            played: false,
            matches_master: false,
            round,
        };
        g.master = Some(draw.clone());
        draw
    }

    pub async fn draws_for_user(&self, user_id: UserId, played: bool) -> Vec<Draw> {
        let g = self.inner.read().await;
        g.user_draws
            .values()
            .filter(|d| d.owner == DrawOwner::User(user_id) && d.played == played)
            .cloned()
            .collect()
    }

    /// 删除用户已开奖的号码，返回删除数量
    pub async fn delete_played_for_user(&self, user_id: UserId) -> usize {
        let mut g = self.inner.write().await;
        let before = g.user_draws.len();
        g.user_draws.retain(|_, d| !(d.owner == DrawOwner::User(user_id) && d.played));
        before - g.user_draws.len()
    }

    /// 在写锁内执行一次完整的读取-修改-写回，保证同一时刻只有一次开奖
    pub async fn with_exclusive<T>(&self, f: impl FnOnce(Option<Draw>, Vec<Draw>) -> (Vec<Draw>, T)) -> T {
        let mut g = self.inner.write().await;
        let master = g.master.as_ref().filter(|d| !d.played).cloned();
        let candidates: Vec<Draw> = g.user_draws.values().filter(|d| !d.played).cloned().collect();
        let (updated, out) = f(master, candidates);
        for draw in updated {
            Self::save_locked(&mut g, draw);
        }
        out
    }
}
