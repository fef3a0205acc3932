use serde_json::{json, Value};

use super::test_helpers::{mk_state, read_body, session_for, user_by_email};
use crate::core::audit::SecurityEventKind;
use crate::core::totp;
use crate::core::users::Registration;
use crate::routes::{admin, lottery, users};
use crate::types::{now_secs, DrawRequest, LoginRequest};

fn registration(email: &str) -> Registration {
    Registration {
        email: email.to_string(),
        firstname: "Carol".to_string(),
        lastname: "Smith".to_string(),
        phone: "019-555-0000".to_string(),
        password: "Carol1!".to_string(),
        confirm_password: "Carol1!".to_string(),
    }
}

fn login_req(email: &str, password: &str, pin: &str) -> LoginRequest {
    LoginRequest { email: email.to_string(), password: password.to_string(), pin: pin.to_string() }
}

fn draw(numbers: &[i64]) -> DrawRequest {
    DrawRequest { numbers: numbers.to_vec() }
}

#[tokio::test]
async fn test_register_creates_user() {
    let state = mk_state().await;
    let resp = users::register(state.clone(), registration("carol@email.com"), "10.0.0.1".into()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 200);
    assert!(body.success);
    let data = body.data.unwrap();
    assert_eq!(data["email"], "carol@email.com");
    assert_eq!(data["pin_key"].as_str().unwrap().len(), 32);
    assert!(data["provisioning_uri"].as_str().unwrap().starts_with("otpauth://totp/"));

    let events = state.security_log.recent(1).await;
    assert_eq!(events[0].kind, SecurityEventKind::Registration);
}

#[tokio::test]
async fn test_register_rejects_duplicate_and_invalid() {
    let state = mk_state().await;
    let resp = users::register(state.clone(), registration("user@email.com"), "c".into()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 409);
    assert_eq!(body.error.as_deref(), Some("Email address already exists!"));

    let mut form = registration("dave@email.com");
    form.phone = "12345".to_string();
    form.confirm_password = "Other1!".to_string();
    let resp = users::register(state.clone(), form, "c".into()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 400);
    assert!(!body.success);
    assert!(state.users.find_by_email("dave@email.com").await.is_none());
}

#[tokio::test]
async fn test_login_with_totp() {
    let state = mk_state().await;
    let bob = user_by_email(&state, "user@email.com").await;
    let code = totp::code_at(&bob.pin_key, now_secs()).unwrap();

    let resp = users::login(state.clone(), login_req("user@email.com", "User1!", &code), "10.0.0.2".into()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 200);
    let data = body.data.unwrap();
    assert_eq!(data["role"], "user");
    assert_eq!(data["redirect"], "/profile");

    let token = data["token"].as_str().unwrap();
    let session = state.sessions.get(token, now_secs()).await.unwrap();
    assert_eq!(session.user_id, bob.id);
    assert!(state.users.get(bob.id).await.unwrap().current_logged_in.is_some());
}

#[tokio::test]
async fn test_login_attempts_exhausted() {
    let state = mk_state().await;
    let client = "10.0.0.3".to_string();

    let resp = users::login(state.clone(), login_req("user@email.com", "wrong", "000000"), client.clone()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 401);
    assert_eq!(body.error.as_deref(), Some("Incorrect login details, try again. 2 login attempts left"));

    // 密码正确但口令错误，同样计入失败次数
    let bob = user_by_email(&state, "user@email.com").await;
    let good = totp::code_at(&bob.pin_key, now_secs()).unwrap();
    let bad = if good == "000000" { "111111" } else { "000000" };
    let resp = users::login(state.clone(), login_req("user@email.com", "User1!", bad), client.clone()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 401);
    assert_eq!(body.error.as_deref(), Some("Invalid 2FA token"));

    let resp = users::login(state.clone(), login_req("nobody@email.com", "User1!", &good), client.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    assert_eq!(body.error.as_deref(), Some("Login failed, no more attempts left"));

    let resp = users::login(state.clone(), login_req("user@email.com", "User1!", &good), client.clone()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 429);
    assert_eq!(body.error.as_deref(), Some("Incorrect logins exceeded"));

    // 其他客户端不受影响
    let resp = users::login(state.clone(), login_req("user@email.com", "User1!", &good), "10.0.0.4".into()).await.unwrap();
    let (status, _) = read_body::<Value>(resp).await;
    assert_eq!(status, 200);

    // 锁定窗口过后恢复
    let later = now_secs() + state.config.login_lockout_secs;
    assert!(state.login_guard.check(&client, later).await.is_ok());
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let state = mk_state().await;
    let session = session_for(&state, "user@email.com").await;
    let token = session.token.clone();
    let resp = users::logout(state.clone(), session, "c".into()).await.unwrap();
    let (status, _) = read_body::<Value>(resp).await;
    assert_eq!(status, 200);
    assert!(state.sessions.get(&token, now_secs()).await.is_none());
    assert_eq!(state.security_log.recent(1).await[0].kind, SecurityEventKind::Logout);
}

#[tokio::test]
async fn test_user_draw_handlers() {
    let state = mk_state().await;
    let session = session_for(&state, "user@email.com").await;

    let resp = lottery::add_draw(state.clone(), session.clone(), draw(&[1, 2, 3, 4, 5, 61])).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 400);
    assert!(!body.success);

    let resp = lottery::add_draw(state.clone(), session.clone(), draw(&[5, 10, 15, 20, 25, 30])).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 200);
    assert_eq!(body.data.unwrap()["numbers"], json!([5, 10, 15, 20, 25, 30]));

    let resp = lottery::view_draws(state.clone(), session.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    let data = body.data.unwrap();
    assert_eq!(data["draws"].as_array().unwrap().len(), 1);
    assert!(data["message"].is_null());

    let resp = lottery::check_draws(state.clone(), session.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    assert_eq!(
        body.data.unwrap()["message"],
        "Next round of lottery yet to play. Check you have submitted draws."
    );
}

#[tokio::test]
async fn test_admin_lottery_conditions() {
    let state = mk_state().await;
    let admin_session = session_for(&state, "admin@email.com").await;

    let resp = admin::view_winning_draw(state.clone()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 200);
    assert_eq!(body.error.as_deref(), Some("No valid winning draw exists. Please add new winning draw."));

    let resp = admin::run_lottery(state.clone(), admin_session.clone()).await.unwrap();
    let (status, body) = read_body::<Value>(resp).await;
    assert_eq!(status, 200);
    assert!(!body.success);
    assert_eq!(
        body.error.as_deref(),
        Some("Current winning draw expired. Add new winning draw for next round.")
    );

    let resp = admin::create_winning_draw(state.clone(), admin_session.clone(), draw(&[1, 2, 3, 4, 5, 6])).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    assert_eq!(body.data.unwrap()["draw"]["round"], 1);

    let resp = admin::run_lottery(state.clone(), admin_session.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    assert_eq!(body.error.as_deref(), Some("No user draws entered."));

    let resp = admin::view_winning_draw(state.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    assert_eq!(body.data.unwrap()["numbers"], json!([1, 2, 3, 4, 5, 6]));
}

#[tokio::test]
async fn test_run_lottery_reports_winner() {
    let state = mk_state().await;
    let admin_session = session_for(&state, "admin@email.com").await;
    let user_session = session_for(&state, "user@email.com").await;

    admin::create_winning_draw(state.clone(), admin_session.clone(), draw(&[1, 2, 3, 4, 5, 6])).await.unwrap();
    lottery::add_draw(state.clone(), user_session.clone(), draw(&[1, 2, 3, 4, 5, 6])).await.unwrap();
    lottery::add_draw(state.clone(), user_session.clone(), draw(&[6, 5, 4, 3, 2, 1])).await.unwrap();

    let resp = admin::run_lottery(state.clone(), admin_session.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    let data = body.data.unwrap();
    assert_eq!(data["round"], 1);
    assert_eq!(data["played"], 2);
    assert_eq!(data["winners"].as_array().unwrap().len(), 1);
    assert_eq!(data["winners"][0]["email"], "user@email.com");
    assert!(data["message"].is_null());

    let resp = lottery::check_draws(state.clone(), user_session.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    let draws = body.data.unwrap()["draws"].as_array().unwrap().clone();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws.iter().filter(|d| d["matches_master"] == true).count(), 1);

    let resp = lottery::play_again(state.clone(), user_session.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    assert_eq!(body.data.unwrap()["removed"], 2);
}

#[tokio::test]
async fn test_admin_users_and_logs() {
    let state = mk_state().await;
    users::register(state.clone(), registration("carol@email.com"), "10.0.0.9".into()).await.unwrap();

    let resp = admin::view_all_users(state.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    let list = body.data.unwrap();
    let emails: Vec<&str> = list.as_array().unwrap().iter().map(|u| u["email"].as_str().unwrap()).collect();
    assert!(emails.contains(&"user@email.com"));
    assert!(emails.contains(&"carol@email.com"));
    assert!(!emails.contains(&"admin@email.com"));

    let resp = admin::logs(state.clone()).await.unwrap();
    let (_, body) = read_body::<Value>(resp).await;
    let entries = body.data.unwrap()["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].as_str().unwrap().contains("User Registration"));
}
