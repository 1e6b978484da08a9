mod support;

use reqwest::StatusCode;

use dribdat::{config::Config, mailer::ACTIVATION_SUBJECT, models::User};
use support::{flash_messages, location, new_client, spawn_app, spawn_app_with};

#[tokio::test]
async fn first_account_is_admin() {
    let app = spawn_app().await;

    let response = app.register("ada", "secret1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let home = app.page("/").await;
    assert_eq!(
        flash_messages(&home),
        vec!["Administrative user created - have fun!"]
    );
    assert_eq!(home["current_user"]["username"], "ada");
    assert_eq!(home["current_user"]["is_admin"], true);

    // flashes are shown once
    let again = app.page("/").await;
    assert!(flash_messages(&again).is_empty());
}

#[tokio::test]
async fn registration_rejects_bad_input() {
    let app = spawn_app().await;
    app.register("ada", "secret1").await;
    app.logout().await;

    let response = app
        .post(
            "/register/",
            &[
                ("username", "bob"),
                ("email", "bob@example.org"),
                ("password", "secret1"),
                ("confirm", "secret2"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: serde_json::Value = response.json().await.unwrap();
    assert_eq!(page["view"], "register");
    assert!(flash_messages(&page).contains(&"Passwords must match".to_string()));

    let response = app
        .post(
            "/register/",
            &[
                ("username", "other"),
                ("email", "ada@example.org"),
                ("password", "secret1"),
                ("confirm", "secret1"),
            ],
        )
        .await;
    let page: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        flash_messages(&page),
        vec!["A user account with this email already exists"]
    );

    let response = app.register("bob", "secret1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let home = app.page("/").await;
    assert_eq!(
        flash_messages(&home),
        vec!["Thank you for registering. You can now log in and submit projects."]
    );
    assert_eq!(home["current_user"]["is_admin"], false);
}

#[tokio::test]
async fn registration_can_be_disabled() {
    let mut config = Config::for_tests();
    config.not_register = true;
    let app = spawn_app_with(config).await;

    let response = app.get("/register/").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login/");

    let login = app.page("/login/").await;
    assert_eq!(
        flash_messages(&login),
        vec!["Registration currently not possible."]
    );
}

#[tokio::test]
async fn login_and_logout() {
    let app = spawn_app().await;
    app.register("ada", "secret1").await;
    app.logout().await;
    let home = app.page("/").await;
    assert_eq!(flash_messages(&home), vec!["You are logged out."]);
    assert!(home["current_user"].is_null());

    let page: serde_json::Value = app.login("nobody", "secret1").await.json().await.unwrap();
    assert_eq!(flash_messages(&page), vec!["Unknown user"]);

    let page: serde_json::Value = app.login("ada", "wrong-pass").await.json().await.unwrap();
    assert_eq!(flash_messages(&page), vec!["Invalid password"]);

    let response = app
        .post(
            "/login/?next=/about/",
            &[("username", "ada"), ("password", "secret1")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/about/");

    let about = app.page("/about/").await;
    assert_eq!(flash_messages(&about), vec!["You are logged in."]);
    assert_eq!(about["current_user"]["username"], "ada");
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let app = spawn_app().await;
    app.register("ada", "secret1").await;
    app.logout().await;

    let response = app
        .post(
            "/login/?next=https://evil.example.org/",
            &[("username", "ada"), ("password", "secret1")],
        )
        .await;
    assert_eq!(location(&response), "/");

    app.logout().await;
    let response = app
        .post(
            "/login/?next=/%5Cevil.example.org/",
            &[("username", "ada"), ("password", "secret1")],
        )
        .await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn pages_behind_login_redirect() {
    let app = spawn_app().await;

    let response = app.get("/user/profile").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login/?next=/user/profile");
}

#[tokio::test]
async fn profile_update() {
    let app = spawn_app().await;
    app.register("ada", "secret1").await;

    let response = app
        .post(
            "/user/profile",
            &[
                ("username", "ada"),
                ("email", "ada@example.org"),
                ("webpage_url", "https://github.com/ada"),
                ("my_story", "Counting machines"),
                ("password", ""),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let profile = app.page("/user/profile").await;
    assert!(flash_messages(&profile).contains(&"Profile updated.".to_string()));
    assert_eq!(profile["user"]["my_story"], "Counting machines");
    assert_eq!(profile["user"]["cardtype"], "github");

    // blank password keeps the old one
    app.logout().await;
    let response = app.login("ada", "secret1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn password_change_takes_effect() {
    let app = spawn_app().await;
    app.register("ada", "secret1").await;
    let response = app
        .post(
            "/user/profile",
            &[
                ("username", "ada"),
                ("email", "ada@example.org"),
                ("password", "secret2"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    app.logout().await;

    let page: serde_json::Value = app.login("ada", "secret1").await.json().await.unwrap();
    assert_eq!(flash_messages(&page), vec!["Invalid password"]);

    // hashing runs outside the database lock, pages keep answering meanwhile
    let (login, about) = tokio::join!(app.login("ada", "secret2"), app.get("/about/"));
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert_eq!(about.status(), StatusCode::OK);
}

#[tokio::test]
async fn approval_requires_activation() {
    let mut config = Config::for_tests();
    config.user_approve = true;
    let app = spawn_app_with(config).await;

    app.register("ada", "secret1").await;
    app.logout().await;

    let response = app.register("bob", "secret1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let home = app.page("/").await;
    assert_eq!(
        flash_messages(&home),
        vec!["Thank you for registering. Please check your e-mail to activate your account."]
    );
    assert!(home["current_user"].is_null());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, ACTIVATION_SUBJECT);
    assert_eq!(sent[0].recipients, vec!["bob@example.org"]);

    let page: serde_json::Value = app.login("bob", "secret1").await.json().await.unwrap();
    assert_eq!(flash_messages(&page), vec!["User not activated"]);

    let hash = app
        .state
        .db
        .with_conn(|conn| User::by_username(conn, "bob"))
        .await
        .unwrap()
        .and_then(|u| u.activation_hash)
        .unwrap();
    assert!(sent[0].body.contains(&format!("/activate/{hash}")));

    let response = app.get(&format!("/activate/{hash}")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let home = app.page("/").await;
    assert_eq!(
        flash_messages(&home),
        vec!["Welcome! Your user account has been activated."]
    );
    assert_eq!(home["current_user"]["username"], "bob");

    app.get(&format!("/activate/{hash}")).await;
    let home = app.page("/").await;
    assert_eq!(
        flash_messages(&home),
        vec!["Activation not found. Try again, or ask an organizer."]
    );
}

#[tokio::test]
async fn single_sign_on() {
    let app = spawn_app().await;

    let response = app.get("/oauth/login").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("https://id.example.org/authorize"));
    let state = target
        .split("state=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap()
        .to_string();

    let response = app
        .get(&format!("/oauth/callback?code=good&state={state}"))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let home = app.page("/").await;
    assert_eq!(flash_messages(&home), vec!["You are logged in."]);
    assert_eq!(home["current_user"]["username"], "grace_hopper");
    assert_eq!(home["oauth_provider"], "GitHub");
}

#[tokio::test]
async fn single_sign_on_checks_state() {
    let app = spawn_app().await;
    app.get("/oauth/login").await;

    // a different browser has no pending state
    let stranger = new_client();
    let response = stranger
        .get(app.url("/oauth/callback?code=good&state=guess"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login/");

    let response = app.get("/oauth/callback?code=good&state=guess").await;
    assert_eq!(location(&response), "/login/");
    let login = app.page("/login/").await;
    assert_eq!(
        flash_messages(&login),
        vec!["Could not sign in, please try again."]
    );
}

#[tokio::test]
async fn sign_on_ids_do_not_activate() {
    let app = spawn_app().await;
    let response = app.get("/oauth/login").await;
    let state = location(&response)
        .split("state=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap()
        .to_string();
    app.get(&format!("/oauth/callback?code=good&state={state}"))
        .await;

    let stranger = new_client();
    let response = stranger
        .get(app.url("/activate/gh-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let home: serde_json::Value = stranger
        .get(app.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(home["current_user"].is_null());
    assert_eq!(
        flash_messages(&home),
        vec!["Activation not found. Try again, or ask an organizer."]
    );
}
