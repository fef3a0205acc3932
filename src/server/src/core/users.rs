//! 用户目录
//!
//! 注册、查询与登录时间维护。每个用户在创建时获得一把号码密钥和一个 TOTP 密钥。

use std::collections::BTreeMap;
use std::sync::Arc;
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::core::keys::{generate_key, DrawKey};
use crate::core::matcher::Keyring;
use crate::core::security::{hash_password, verify_password};
use crate::core::totp;

pub type UserId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub phone: String,
    pub role: Role,
    pub password_hash: String,
    pub pin_key: String,
    pub draw_key: DrawKey,
    pub registered_on: u64,
    pub last_logged_in: Option<u64>,
    pub current_logged_in: Option<u64>,
}

/// 账户相关错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Email address already exists!")]
    EmailTaken,
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("{}", bad_credentials_message(.attempts_left))]
    BadCredentials { attempts_left: u32 },
    #[error("Invalid 2FA token")]
    InvalidTotp { attempts_left: u32 },
    #[error("Incorrect logins exceeded")]
    AttemptsExceeded,
    #[error("Password could not be processed")]
    PasswordHash,
}

fn bad_credentials_message(attempts_left: &u32) -> String {
    match *attempts_left {
        0 => "Login failed, no more attempts left".to_string(),
        1 => "Incorrect login details, try again. 1 login attempt left".to_string(),
        n => format!("Incorrect login details, try again. {} login attempts left", n),
    }
}

/// 注册表单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

const NAME_RULE: &str =
    "must not contain any of these: * ? ! ^ + % & / ( ) = } ] [ { $ # @ < > '";

/// 注册表单校验器
pub struct RegistrationValidator {
    schema: JSONSchema,
}

impl RegistrationValidator {
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        static SCHEMA_JSON: once_cell::sync::Lazy<serde_json::Value> = once_cell::sync::Lazy::new(|| {
            let name = serde_json::json!({
                "type": "string",
                "minLength": 1,
                "maxLength": 100,
                "pattern": r"^[^*?!+^%&/()=}\]\[{$#@<>']+$"
            });
            serde_json::json!({
                "type": "object",
                "properties": {
                    "email": {
                        "type": "string",
                        "maxLength": 100,
                        "pattern": r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
                    },
                    "firstname": name,
                    "lastname": name,
                    "phone": {
                        "type": "string",
                        "pattern": r"^\d{3}-\d{3}-\d{4}$"
                    },
                    "password": {
                        "type": "string",
                        "minLength": 6,
                        "maxLength": 12
                    },
                    "confirm_password": {
                        "type": "string"
                    }
                },
                "required": ["email", "firstname", "lastname", "phone", "password", "confirm_password"]
            })
        });

        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&*SCHEMA_JSON)
            .map_err(|e| Box::<dyn std::error::Error + Send + Sync>::from(e.to_string()))?;

        Ok(Self { schema })
    }

    pub fn validate(&self, form: &Registration) -> Result<(), AccountError> {
        let value = serde_json::to_value(form)
            .map_err(|e| AccountError::Invalid(vec![format!("Invalid form: {}", e)]))?;

        let mut messages: Vec<String> = Vec::new();
        let mut push = |m: String| {
            if !messages.contains(&m) {
                messages.push(m);
            }
        };

        if let Err(errors) = self.schema.validate(&value) {
            for e in errors {
                let message = match e.instance_path.to_string().as_str() {
                    "/email" => "Must be a valid email address".to_string(),
                    "/firstname" => format!("First name {}", NAME_RULE),
                    "/lastname" => format!("Last name {}", NAME_RULE),
                    "/phone" => "Enter phone number in this format: xxx-xxx-xxxx".to_string(),
                    "/password" => "Password must be between 6 and 12 characters".to_string(),
                    _ => e.to_string(),
                };
                push(message);
            }
        }

        if form.firstname.trim().is_empty() {
            push("First name is required".to_string());
        }
        if form.lastname.trim().is_empty() {
            push("Last name is required".to_string());
        }

        let password = &form.password;
        let complex = password.chars().any(|c| c.is_ascii_lowercase())
            && password.chars().any(|c| c.is_ascii_uppercase())
            && password.chars().any(|c| c.is_ascii_digit())
            && password.chars().any(|c| !c.is_ascii_alphanumeric());
        if !complex {
            push("Password must contain at least one upper and lower case character, one digit and one special character".to_string());
        }
        if form.password != form.confirm_password {
            push("The password doesn't match".to_string());
        }

        if messages.is_empty() { Ok(()) } else { Err(AccountError::Invalid(messages)) }
    }
}

#[derive(Default)]
pub struct UserTable {
    next_id: UserId,
    by_id: BTreeMap<UserId, User>,
}

impl UserTable {
    pub fn get(&self, id: UserId) -> Option<&User> {
        self.by_id.get(&id)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.by_id.values().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn with_role(&self, role: Role) -> Vec<User> {
        self.by_id.values().filter(|u| u.role == role).cloned().collect()
    }
}

impl Keyring for UserTable {
    fn key_for(&self, user_id: UserId) -> Option<&DrawKey> {
        self.by_id.get(&user_id).map(|u| &u.draw_key)
    }

    fn email_for(&self, user_id: UserId) -> Option<&str> {
        self.by_id.get(&user_id).map(|u| u.email.as_str())
    }
}

/// 用户目录
#[derive(Clone, Default)]
pub struct UserDirectory {
    inner: Arc<RwLock<UserTable>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, UserTable> {
        self.inner.read().await
    }

    pub async fn get(&self, id: UserId) -> Option<User> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.inner.read().await.find_by_email(email).cloned()
    }

    /// 创建用户：哈希密码、生成号码密钥与 TOTP 密钥。表单须已校验。
    pub async fn create(&self, form: &Registration, role: Role) -> Result<User, AccountError> {
        let password_hash = hash_password(&form.password).await?;

        let mut g = self.inner.write().await;
        if g.find_by_email(&form.email).is_some() {
            return Err(AccountError::EmailTaken);
        }
        g.next_id += 1;
        let user = User {
            id: g.next_id,
            email: form.email.clone(),
            firstname: form.firstname.clone(),
            lastname: form.lastname.clone(),
            phone: form.phone.clone(),
            role,
            password_hash,
            pin_key: totp::generate_secret(),
            draw_key: generate_key(),
            registered_on: chrono::Utc::now().timestamp() as u64,
            last_logged_in: None,
            current_logged_in: None,
        };
        g.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    /// 校验邮箱与密码，不修改状态
    pub async fn check_password(&self, email: &str, password: &str) -> Option<User> {
        let user = self.find_by_email(email).await?;
        match verify_password(password, &user.password_hash).await {
            Ok(true) => Some(user),
            _ => None,
        }
    }

    /// 登录成功后更新登录时间
    pub async fn record_login(&self, id: UserId, now: u64) -> Option<User> {
        let mut g = self.inner.write().await;
        let user = g.by_id.get_mut(&id)?;
        user.last_logged_in = user.current_logged_in;
        user.current_logged_in = Some(now);
        Some(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            firstname: "Bob".to_string(),
            lastname: "Billy".to_string(),
            phone: "0191-123-456".to_string(),
            password: "User1!".to_string(),
            confirm_password: "User1!".to_string(),
        }
    }

    fn valid_form(email: &str) -> Registration {
        Registration { phone: "019-123-4567".to_string(), ..form(email) }
    }

    #[test]
    fn test_validator_accepts_valid_form() {
        let validator = RegistrationValidator::new().unwrap();
        assert!(validator.validate(&valid_form("bob@email.com")).is_ok());
    }

    #[test]
    fn test_validator_reports_each_field() {
        let validator = RegistrationValidator::new().unwrap();
        let bad = Registration {
            email: "not-an-email".to_string(),
            firstname: "B<b>".to_string(),
            lastname: "ok".to_string(),
            phone: "0191-123-456".to_string(),
            password: "short".to_string(),
            confirm_password: "other".to_string(),
        };
        let Err(AccountError::Invalid(messages)) = validator.validate(&bad) else {
            panic!("expected validation failure");
        };
        assert!(messages.iter().any(|m| m.contains("valid email")));
        assert!(messages.iter().any(|m| m.starts_with("First name")));
        assert!(messages.iter().any(|m| m.contains("xxx-xxx-xxxx")));
        assert!(messages.iter().any(|m| m.contains("between 6 and 12")));
        assert!(messages.iter().any(|m| m.contains("doesn't match")));
        assert!(!messages.iter().any(|m| m.starts_with("Last name")));
    }

    #[test]
    fn test_validator_rejects_blank_names() {
        let validator = RegistrationValidator::new().unwrap();
        let blank = Registration {
            firstname: "   ".to_string(),
            lastname: " ".to_string(),
            ..valid_form("bob@email.com")
        };
        let Err(AccountError::Invalid(messages)) = validator.validate(&blank) else {
            panic!("expected validation failure");
        };
        assert!(messages.contains(&"First name is required".to_string()));
        assert!(messages.contains(&"Last name is required".to_string()));
    }

    #[test]
    fn test_validator_requires_complex_password() {
        let validator = RegistrationValidator::new().unwrap();
        let weak = Registration {
            password: "abcdef".to_string(),
            confirm_password: "abcdef".to_string(),
            ..valid_form("a@b.com")
        };
        assert!(matches!(validator.validate(&weak), Err(AccountError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_create_and_duplicate_email() {
        let dir = UserDirectory::new();
        let u1 = dir.create(&valid_form("bob@email.com"), Role::User).await.unwrap();
        let u2 = dir.create(&valid_form("alice@email.com"), Role::Admin).await.unwrap();
        assert_ne!(u1.id, u2.id);
        assert_ne!(u1.draw_key, u2.draw_key);
        assert_eq!(u1.pin_key.len(), 32);

        let dup = dir.create(&valid_form("BOB@email.com"), Role::User).await;
        assert_eq!(dup.unwrap_err(), AccountError::EmailTaken);

        let table = dir.read().await;
        assert_eq!(table.with_role(Role::User).len(), 1);
        assert_eq!(table.email_for(u2.id), Some("alice@email.com"));
        assert!(table.key_for(999).is_none());
    }

    #[tokio::test]
    async fn test_check_password_and_record_login() {
        let dir = UserDirectory::new();
        let user = dir.create(&valid_form("bob@email.com"), Role::User).await.unwrap();

        assert!(dir.check_password("bob@email.com", "User1!").await.is_some());
        assert!(dir.check_password("bob@email.com", "wrong").await.is_none());
        assert!(dir.check_password("nobody@email.com", "User1!").await.is_none());

        dir.record_login(user.id, 100).await.unwrap();
        let after = dir.record_login(user.id, 200).await.unwrap();
        assert_eq!(after.last_logged_in, Some(100));
        assert_eq!(after.current_logged_in, Some(200));
    }

    #[test]
    fn test_bad_credentials_message() {
        assert!(AccountError::BadCredentials { attempts_left: 2 }.to_string().contains("2 login attempts left"));
        assert!(AccountError::BadCredentials { attempts_left: 1 }.to_string().contains("1 login attempt left"));
        assert!(AccountError::BadCredentials { attempts_left: 0 }.to_string().contains("no more attempts"));
    }
}
