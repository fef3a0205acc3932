//! 基于时间的一次性口令（RFC 6238）
//!
//! HMAC-SHA1、30 秒步长、6 位数字，密钥以无填充的 RFC 4648 base32 保存。

use base32::Alphabet;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;

pub const TOTP_STEP_SECS: u64 = 30;
pub const TOTP_DIGITS: u32 = 6;
const SECRET_LEN: usize = 20;
const ALPHABET: Alphabet = Alphabet::RFC4648 { padding: false };

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TotpError {
    #[error("TOTP secret is not valid base32")]
    InvalidSecret,
}

/// 生成新的 base32 密钥（32 个字符）
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut bytes);
    base32::encode(ALPHABET, &bytes)
}

fn hotp(key: &[u8], counter: u64) -> Result<u32, TotpError> {
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
        .map_err(|_| TotpError::InvalidSecret)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // dynamic truncation
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    Ok(binary % 10u32.pow(TOTP_DIGITS))
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    let cleaned: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect::<String>()
        .to_ascii_uppercase();
    match base32::decode(ALPHABET, &cleaned) {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(TotpError::InvalidSecret),
    }
}

/// 指定时刻的口令
pub fn code_at(secret: &str, unix_secs: u64) -> Result<String, TotpError> {
    let key = decode_secret(secret)?;
    let code = hotp(&key, unix_secs / TOTP_STEP_SECS)?;
    Ok(format!("{:0width$}", code, width = TOTP_DIGITS as usize))
}

/// 校验口令，允许前后 `skew` 个步长的时钟偏差
pub fn verify(secret: &str, code: &str, unix_secs: u64, skew: u32) -> bool {
    let code = code.trim();
    if code.len() != TOTP_DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let key = match decode_secret(secret) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let counter = unix_secs / TOTP_STEP_SECS;
    let skew = skew as u64;
    (counter.saturating_sub(skew)..=counter.saturating_add(skew)).any(|c| {
        hotp(&key, c)
            .map(|expected| format!("{:0width$}", expected, width = TOTP_DIGITS as usize) == code)
            .unwrap_or(false)
    })
}

/// 认证器应用使用的 otpauth URI
pub fn provisioning_uri(secret: &str, account: &str, issuer: &str) -> String {
    let issuer = issuer.replace(' ', "%20");
    let account = account.replace(' ', "%20");
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&digits={digits}&period={period}",
        issuer = issuer,
        account = account,
        secret = secret,
        digits = TOTP_DIGITS,
        period = TOTP_STEP_SECS,
    )
}
