//! Documentation of dribdat, a hackathon and event management server.
//!
//! Organizers plan events, participants register, start or join projects,
//! and post progress updates ("dribs") to a project log. Every project save
//! is kept as a version, so the log can show and restore earlier states.
//!
//!
//!
//! # General Infrastructure
//! - Single axum server, SQLite database file next to it
//! - Pages answer with JSON view models; a frontend renders them
//! - Cookie sessions signed with `DRIBDAT_SECRET`, stored in the `sessions` table
//! - Optional single sign-on through Slack, Azure or GitHub
//! - Project pages can pull their description from a GitHub, GitLab or raw markdown README
//!
//!
//!
//! # Notes
//!
//! ## Versions
//! A project is snapshotted on creation and on every save. Activities remember
//! the latest version at the time they were logged, which is what preview and
//! revert look up. Reverting saves the restored state as a new version.
//!
//! ## Score
//! The score is recomputed from the filled-in fields, team size and post count
//! whenever the project is saved or someone joins, leaves or posts.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run the server against a local database.
//! ```sh
//! DATABASE_URL=dribdat.db DRIBDAT_SECRET=change-me RUST_PORT=5000 RUST_LOG=info \
//!     cargo run --bin dribdat
//! ```
//!
//! Maintenance tasks.
//! ```sh
//! cargo run --bin dribdat-process -- migrate
//! cargo run --bin dribdat-process -- sync
//! cargo run --bin dribdat-process -- promote admin
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    middleware,
    routing::{get, post},
    Router,
};
use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod aggregation;
pub mod config;
pub mod database;
pub mod error;
pub mod forms;
pub mod mailer;
pub mod models;
pub mod oauth;
pub mod presets;
pub mod remote;
pub mod routes;
pub mod session;
pub mod stages;
pub mod state;
pub mod utils;
pub mod versioning;

use config::Config;
use routes::{admin, auth, project, public};
use state::AppState;

fn project_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}", get(project::project_view))
        .route("/{id}/posted", get(project::project_view_posted))
        .route(
            "/{id}/edit",
            get(project::project_edit_page).post(project::project_edit),
        )
        .route(
            "/{id}/details",
            get(project::project_details_page).post(project::project_details),
        )
        .route(
            "/{id}/boost",
            get(project::project_boost_page).post(project::project_boost),
        )
        .route(
            "/{id}/post",
            get(project::project_post_page).post(project::project_post),
        )
        .route(
            "/{id}/comment",
            get(project::project_comment_page).post(project::project_comment),
        )
        .route("/{id}/unpost/{activity_id}", get(project::post_delete))
        .route("/{id}/preview/{activity_id}", get(project::post_preview))
        .route("/{id}/revert/{activity_id}", get(project::revert))
        .route(
            "/{id}/star/me",
            get(project::project_star).post(project::project_star),
        )
        .route("/{id}/star", post(project::project_star_user))
        .route(
            "/{id}/unstar/me",
            get(project::project_unstar_me).post(project::project_unstar_me),
        )
        .route("/{id}/unstar/{user_id}", get(project::project_unstar))
        .route("/{id}/autoupdate", get(project::project_autoupdate))
        .route(
            "/event/{event_id}/project/new",
            get(project::project_new_page).post(project::project_new),
        )
        .route(
            "/new/{event_id}",
            get(project::project_new_page).post(project::project_new),
        )
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(admin::users))
        .route("/user/{id}/toggle", post(admin::user_toggle))
        .route("/events", get(admin::events))
        .route("/event/{id}", post(admin::event_edit))
        .route("/event/{id}/current", post(admin::event_current))
        .route(
            "/categories",
            get(admin::categories).post(admin::category_create),
        )
        .route("/category/{id}/delete", post(admin::category_delete))
}

/// Every route, behind the session layer.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(public::home))
        .route("/dashboard/", get(public::dashboard))
        .route("/about/", get(public::about))
        .route("/favicon.ico", get(public::favicon))
        .route("/hackathon.json", get(public::hackathon_json))
        .route("/dribs", get(public::dribs))
        .route("/user/profile", get(auth::profile_page).post(auth::profile))
        .route("/user/{username}", get(public::user_page))
        .route("/user/{username}/post", get(public::user_post))
        .route("/event/start", get(public::event_start))
        .route(
            "/event/new",
            get(public::event_new_page).post(public::event_new),
        )
        .route("/event/{id}", get(public::event_page))
        .route("/event/{id}/participants", get(public::event_participants))
        .route("/event/{id}/stages", get(public::event_stages))
        .route("/event/{id}/instruction", get(public::event_instruction))
        .route("/event/{id}/categories", get(public::event_categories))
        .route("/event/{id}/print", get(public::event_print))
        .route("/login/", get(auth::login_page).post(auth::login))
        .route("/register/", get(auth::register_page).post(auth::register))
        .route("/logout/", get(auth::logout))
        .route("/activate/{userhash}", get(auth::activate))
        .route("/oauth/login", get(auth::oauth_login))
        .route("/oauth/callback", get(auth::oauth_callback))
        .nest("/project", project_routes())
        .nest("/admin", admin_routes())
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
