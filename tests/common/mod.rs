#![allow(dead_code)]

use axum_test::TestServer;
use castline::{app, auth::{RegisterRequest, Session}, client::Api, users::Role, AppState, Config, Db};
use serde_json::json;

pub struct Harness {
    pub server: TestServer,
    pub db: Db,
}

pub async fn harness() -> Harness {
    let db = Db::memory().await.unwrap();
    let server = TestServer::new(app(AppState::new(db.clone(), Config::default()))).unwrap();
    Harness { server, db }
}

/// Serves the app over a real socket on a SQLite file, so writers contend
/// for the database lock the way they do in production.
pub async fn serve_file_backed() -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        database_url: format!("sqlite://{}", dir.path().join("castline.db").display()),
        ..Config::default()
    };
    let db = Db::connect_lazy(&config).unwrap();
    db.migrate().await.unwrap();
    db.set_ready(true);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(AppState::new(db, config))).await.unwrap();
    });
    (format!("http://{addr}"), dir)
}

pub async fn api_account(base: &str, name: &str, role: Role) -> (Api, String) {
    let mut api = Api::new(base);
    let session = api.register(&RegisterRequest {
        email: format!("{}@castline.test", name.to_lowercase()),
        password: "hunter2hunter2".to_owned(),
        display_name: name.to_owned(),
        role,
    }).await.unwrap();
    (api, session.user.id)
}

pub struct Account {
    pub id: String,
    pub token: String,
}

impl Harness {
    pub async fn register(&self, name: &str, role: &str) -> Account {
        let res = self.server.post("/auth/register")
            .json(&json!({
                "email": format!("{}@castline.test", name.to_lowercase()),
                "password": "hunter2hunter2",
                "displayName": name,
                "role": role,
            }))
            .await;
        res.assert_status(axum::http::StatusCode::CREATED);
        let Session { user, token } = res.json();
        Account { id: user.id, token }
    }
}
