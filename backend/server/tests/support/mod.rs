#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use reqwest::{header::LOCATION, redirect::Policy, Client, Response, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;

use dribdat::{
    build_router,
    config::Config,
    database::Database,
    error::AppError,
    mailer::{Mailer, OutgoingMail},
    models::{now, Event, NewEvent},
    oauth::{IdentityProvider, OAuthIdentity},
    remote::{RemoteProject, RemoteSource},
    state::AppState,
};

#[derive(Default)]
pub struct RecordingMailer(Mutex<Vec<OutgoingMail>>);

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        self.0.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Answers every README url with the same page.
pub struct FakeRemote;

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn fetch(&self, url: &str) -> Result<Option<RemoteProject>, AppError> {
        if url.contains("missing") {
            return Ok(None);
        }
        Ok(Some(RemoteProject {
            kind: "GitHub".to_string(),
            name: "Robot".to_string(),
            summary: Some("A robot that waters plants".to_string()),
            description: "# Robot\n\nWaters the plants while you hack.".to_string(),
            source_url: Some(url.to_string()),
            ..Default::default()
        }))
    }
}

pub struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn name(&self) -> String {
        "GitHub".to_string()
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        format!("https://id.example.org/authorize?state={state}&redirect_uri={redirect_uri}")
    }

    async fn exchange(&self, code: &str, _redirect_uri: &str) -> Result<OAuthIdentity, AppError> {
        if code != "good" {
            return Err(AppError::Remote("bad code".to_string()));
        }
        Ok(OAuthIdentity {
            sso_id: "gh-1".to_string(),
            username: "Grace Hopper".to_string(),
            email: "grace@example.org".to_string(),
            webpage_url: None,
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub state: Arc<AppState>,
    pub mailer: Arc<RecordingMailer>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Config::for_tests()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::with_parts(
        config,
        Database::open_in_memory().unwrap(),
        mailer.clone(),
        Arc::new(FakeRemote),
        Some(Arc::new(FakeIdentity) as Arc<dyn IdentityProvider>),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: new_client(),
        state,
        mailer,
    }
}

/// Keeps cookies, does not follow redirects.
pub fn new_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap()
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn flash_messages(page: &Value) -> Vec<String> {
    page["flashes"]
        .as_array()
        .map(|flashes| {
            flashes
                .iter()
                .filter_map(|f| f["message"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .unwrap()
    }

    /// GETs a page that must render, returning its view model.
    pub async fn page(&self, path: &str) -> Value {
        let response = self.get(path).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        response.json().await.unwrap()
    }

    pub async fn register(&self, username: &str, password: &str) -> Response {
        let email = format!("{username}@example.org");
        self.post(
            "/register/",
            &[
                ("username", username),
                ("email", &email),
                ("password", password),
                ("confirm", password),
            ],
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.post("/login/", &[("username", username), ("password", password)])
            .await
    }

    pub async fn logout(&self) {
        self.get("/logout/").await;
    }

    /// A running event, starting an hour ago.
    pub async fn running_event(&self, name: &str) -> Event {
        let name = name.to_string();
        self.state
            .db
            .with_conn(|conn| {
                Event::insert(
                    conn,
                    NewEvent {
                        name,
                        starts_at: now() - Duration::hours(1),
                        ends_at: now() + Duration::days(1),
                        ..Default::default()
                    },
                )
            })
            .await
            .unwrap()
    }

    /// Starts a project in the event, returning its id.
    pub async fn new_project(&self, event_id: i64, form: &[(&str, &str)]) -> i64 {
        let response = self
            .post(&format!("/project/event/{event_id}/project/new"), form)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        location(&response)
            .trim_start_matches("/project/")
            .parse()
            .unwrap()
    }
}
