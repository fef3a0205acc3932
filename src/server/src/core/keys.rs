//! 抽奖号码密钥管理
//!
//! 每个用户在创建时生成一把独立的对称密钥，用于加密其提交的号码。
//! 密钥创建后不可更新、不可撤销。

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

/// AES-256 密钥长度
pub const DRAW_KEY_LEN: usize = 32;

/// 用户的号码加密密钥
#[derive(Clone, PartialEq, Eq)]
pub struct DrawKey([u8; DRAW_KEY_LEN]);

impl DrawKey {
    pub fn from_bytes(bytes: [u8; DRAW_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DRAW_KEY_LEN] {
        &self.0
    }
}

// 日志中不输出密钥内容
impl fmt::Debug for DrawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DrawKey(<redacted>)")
    }
}

/// 从操作系统 CSPRNG 生成新密钥
pub fn generate_key() -> DrawKey {
    let mut bytes = [0u8; DRAW_KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    DrawKey(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let k1 = generate_key();
        let k2 = generate_key();
        assert_ne!(k1, k2);
        assert_eq!(k1.as_bytes().len(), DRAW_KEY_LEN);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = DrawKey::from_bytes([7u8; DRAW_KEY_LEN]);
        let printed = format!("{:?}", key);
        assert!(!printed.contains('7'));
        assert!(printed.contains("redacted"));
    }
}
