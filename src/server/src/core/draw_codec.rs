//! 抽奖号码编解码
//!
//! 明文为六个号码按提交顺序、以单个空格拼接的字符串（如 `"1 2 3 4 5 6"`）。
//! 密文格式：`nonce(12字节) || AES-256-GCM 密文与认证标签`，每次加密使用新的随机 nonce。

use std::fmt;

use aes_gcm::{Aes256Gcm, KeyInit, aead::{Aead, AeadCore, Nonce}};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::core::keys::DrawKey;

/// 每注号码个数
pub const DRAW_SIZE: usize = 6;
/// 号码下限（含）
pub const MIN_NUMBER: i64 = 1;
/// 号码上限（含）
pub const MAX_NUMBER: i64 = 60;

const NONCE_LEN: usize = 12;

/// 号码相关错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("A draw must contain exactly 6 numbers between 1 and 60")]
    InvalidNumberRange,
    #[error("Draw could not be decrypted")]
    DecryptionError,
    #[error("Draw could not be encrypted")]
    EncryptionError,
}

/// 经过校验的一注号码，保留提交顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>")]
pub struct DrawNumbers([u8; DRAW_SIZE]);

impl DrawNumbers {
    pub fn new(values: &[i64]) -> Result<Self, DrawError> {
        if values.len() != DRAW_SIZE {
            return Err(DrawError::InvalidNumberRange);
        }
        let mut numbers = [0u8; DRAW_SIZE];
        for (slot, &value) in numbers.iter_mut().zip(values) {
            if !(MIN_NUMBER..=MAX_NUMBER).contains(&value) {
                return Err(DrawError::InvalidNumberRange);
            }
            *slot = value as u8;
        }
        Ok(Self(numbers))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    fn parse_plaintext(text: &str) -> Result<Self, DrawError> {
        let values = text
            .split_whitespace()
            .map(|part| part.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DrawError::DecryptionError)?;
        Self::new(&values).map_err(|_| DrawError::DecryptionError)
    }
}

impl TryFrom<Vec<i64>> for DrawNumbers {
    type Error = DrawError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Self::new(&values)
    }
}

impl fmt::Display for DrawNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        f.write_str(&parts.join(" "))
    }
}

/// 不透明的加密号码
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext(Vec<u8>);

impl Ciphertext {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

/// 使用用户密钥加密号码
pub fn encode(numbers: &DrawNumbers, key: &DrawKey) -> Result<Ciphertext, DrawError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| DrawError::EncryptionError)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, numbers.to_string().as_bytes())
        .map_err(|_| DrawError::EncryptionError)?;

    let mut payload = nonce.to_vec();
    payload.extend_from_slice(&sealed);
    Ok(Ciphertext(payload))
}

/// 使用用户密钥解密号码
pub fn decode(ciphertext: &Ciphertext, key: &DrawKey) -> Result<DrawNumbers, DrawError> {
    if ciphertext.0.len() <= NONCE_LEN {
        return Err(DrawError::DecryptionError);
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| DrawError::DecryptionError)?;

    let (nonce, sealed) = ciphertext.0.split_at(NONCE_LEN);
    let nonce = Nonce::<Aes256Gcm>::from_slice(nonce);

    let plaintext = cipher
        .decrypt(nonce, sealed)
        .map_err(|_| DrawError::DecryptionError)?;
    let text = String::from_utf8(plaintext).map_err(|_| DrawError::DecryptionError)?;

    DrawNumbers::parse_plaintext(&text)
}
