mod common;

use axum::http::StatusCode;
use castline::{
    auth::{RegisterRequest, Session},
    client::{Api, ClientError},
    gate::DB_UNAVAILABLE,
    users::{Role, UserEnvelope, UsersEnvelope},
};
use common::{harness, serve_file_backed};
use serde_json::{json, Value};

#[tokio::test]
async fn register_then_login_and_logout() {
    let h = harness().await;
    let account = h.register("Dana", "director").await;

    let res = h.server.post("/auth/login")
        .json(&json!({ "email": "  DANA@castline.test", "password": "hunter2hunter2" }))
        .await;
    res.assert_status_ok();
    let Session { user, token } = res.json();
    assert_eq!(user.id, account.id);
    assert_eq!(user.role, Role::Director);
    assert_ne!(token, account.token);

    h.server.post("/auth/logout").authorization_bearer(&token).await.assert_status(StatusCode::NO_CONTENT);
    h.server.get("/users/me").authorization_bearer(&token).await.assert_status(StatusCode::UNAUTHORIZED);

    let UserEnvelope { user } = h.server.get("/users/me").authorization_bearer(&account.token).await.json();
    assert_eq!(user.display_name, "Dana");
}

#[tokio::test]
async fn wrong_password_is_a_generic_401() {
    let h = harness().await;
    h.register("Dana", "director").await;

    for (email, password) in [("dana@castline.test", "wrongwrong"), ("nobody@castline.test", "hunter2hunter2")] {
        let res = h.server.post("/auth/login").json(&json!({ "email": email, "password": password })).await;
        res.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = res.json();
        assert_eq!(body["message"], "invalid email or password");
    }
}

#[tokio::test]
async fn registration_rules() {
    let h = harness().await;
    h.register("Dana", "director").await;

    let register = |email: &'static str, password: &'static str, role: &'static str| {
        h.server.post("/auth/register").json(&json!({
            "email": email,
            "password": password,
            "displayName": "Someone",
            "role": role,
        }))
    };

    register("dana@castline.test", "longenough", "talent").await.assert_status(StatusCode::CONFLICT);
    register("new@castline.test", "short", "talent").await.assert_status(StatusCode::BAD_REQUEST);
    register("boss@castline.test", "longenough", "admin").await.assert_status(StatusCode::FORBIDDEN);
    register("not-an-email", "longenough", "talent").await.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn explore_filters_by_role_and_name() {
    let h = harness().await;
    let writer = h.register("Wren", "writer").await;
    h.register("Theo", "talent").await;
    h.register("Tara", "talent").await;
    h.register("Dana", "director").await;

    let UsersEnvelope { users } = h.server.get("/users")
        .add_query_param("role", "talent")
        .authorization_bearer(&writer.token)
        .await
        .json();
    let names: Vec<_> = users.iter().map(|u| u.display_name.as_str()).collect();
    assert_eq!(names, ["Tara", "Theo"]);

    let UsersEnvelope { users } = h.server.get("/users")
        .add_query_param("q", "DAN")
        .authorization_bearer(&writer.token)
        .await
        .json();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, Role::Director);

    let UsersEnvelope { users } = h.server.get("/users").authorization_bearer(&writer.token).await.json();
    assert!(users.iter().all(|u| u.id != writer.id));
    assert_eq!(users.len(), 3);
}

#[tokio::test]
async fn gate_rejects_while_the_store_is_down() {
    let h = harness().await;
    let account = h.register("Dana", "director").await;

    h.db.set_ready(false);

    let res = h.server.get("/messages/conversations").authorization_bearer(&account.token).await;
    res.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json();
    assert_eq!(body["message"], DB_UNAVAILABLE);

    h.server.post("/auth/login")
        .json(&json!({ "email": "dana@castline.test", "password": "hunter2hunter2" }))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let health: Value = h.server.get("/health").await.json();
    assert_eq!(health["database"], "disconnected");

    h.db.set_ready(true);
    h.server.get("/messages/conversations")
        .authorization_bearer(&account.token)
        .await
        .assert_status_ok();
    let health: Value = h.server.get("/health").await.json();
    assert_eq!(health["database"], "connected");
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let h = harness().await;
    let writer = h.register("Wren", "writer").await;
    h.register("Dana_Lee", "director").await;
    h.register("Danalee", "talent").await;

    let UsersEnvelope { users } = h.server.get("/users")
        .add_query_param("q", "a_l")
        .authorization_bearer(&writer.token)
        .await
        .json();
    let names: Vec<_> = users.iter().map(|u| u.display_name.as_str()).collect();
    assert_eq!(names, ["Dana_Lee"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_signups_get_one_account() {
    let (base, _dir) = serve_file_backed().await;

    let mut signups = tokio::task::JoinSet::new();
    for n in 0..10 {
        let base = base.clone();
        signups.spawn(async move {
            Api::new(base).register(&RegisterRequest {
                email: "dana@castline.test".to_owned(),
                password: "hunter2hunter2".to_owned(),
                display_name: format!("Dana {n}"),
                role: Role::Director,
            }).await
        });
    }

    let (mut created, mut conflicts) = (0, 0);
    while let Some(result) = signups.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(ClientError::Status { status, .. }) if status == StatusCode::CONFLICT => conflicts += 1,
            Err(e) => panic!("unexpected sign-up failure: {e}"),
        }
    }
    assert_eq!((created, conflicts), (1, 9));
}

