mod support;

use reqwest::StatusCode;
use serde_json::Value;

use dribdat::{
    models::{Activity, ActivityType, Event, User},
    versioning::VersionTracker,
};
use support::{flash_messages, location, spawn_app, TestApp};

const LONG_TEXT: &str =
    "A watering robot for the office plants, built from spare parts and a Raspberry Pi.";

async fn activities(app: &TestApp, project_id: i64) -> Vec<Activity> {
    app.state
        .db
        .with_conn(|conn| Activity::for_project(conn, project_id))
        .await
        .unwrap()
}

async fn user_id(app: &TestApp, username: &str) -> i64 {
    app.state
        .db
        .with_conn(|conn| User::by_username(conn, username))
        .await
        .unwrap()
        .unwrap()
        .id
}

/// Registers and logs in, discarding the welcome flashes.
async fn signup(app: &TestApp, username: &str) {
    let response = app.register(username, "secret1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    app.page("/").await;
}

/// Expects a redirect and returns the target with the page it points to.
async fn follow(app: &TestApp, response: reqwest::Response) -> (String, Value) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    let page = app.page(&target).await;
    (target, page)
}

#[tokio::test]
async fn start_edit_and_revert() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;

    let id = app
        .new_project(
            event.id,
            &[("name", "Hello"), ("summary", "Greets people"), ("longtext", "Hello")],
        )
        .await;

    let page = app.page(&format!("/project/{id}")).await;
    assert_eq!(flash_messages(&page), vec!["Invite your team to Join this page!"]);
    assert_eq!(page["view"], "project");
    assert_eq!(page["project"]["name"], "Hello");
    assert_eq!(page["project"]["progress"], 5);
    assert_eq!(page["current_event"]["name"], "Spring Hack");
    assert_eq!(page["project_starred"], true);
    assert_eq!(page["allow_edit"], true);
    assert_eq!(page["allow_post"], true);
    assert_eq!(page["project_team"][0]["username"], "ada");
    assert!(page["project_image_url"]
        .as_str()
        .unwrap()
        .ends_with("/static/img/badge-black.png"));

    for text in ["Fixme", "Final"] {
        let response = app
            .post(&format!("/project/{id}/edit"), &[("name", "Hello"), ("longtext", text)])
            .await;
        let (target, page) = follow(&app, response).await;
        assert_eq!(target, format!("/project/{id}"));
        assert_eq!(flash_messages(&page), vec!["Project updated."]);
        assert_eq!(page["project"]["longtext"], text);
        assert_eq!(page["project"]["summary"], "Greets people");
    }

    let log = activities(&app, id).await;
    let created = log.iter().find(|a| a.name == ActivityType::Create).unwrap();
    assert_eq!(created.project_version, Some(1));
    let first_update = log.iter().find(|a| a.name == ActivityType::Update).unwrap();
    assert_eq!(first_update.project_version, Some(2));

    let preview = app
        .page(&format!("/project/{id}/preview/{}", first_update.id))
        .await;
    assert_eq!(
        flash_messages(&preview),
        vec!["This is an archived version of the project"]
    );
    assert_eq!(preview["project"]["longtext"], "Fixme");
    assert_eq!(preview["archived"], true);

    let response = app
        .get(&format!("/project/{id}/revert/{}", created.id))
        .await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(
        flash_messages(&page),
        vec!["Could not revert: this is the earliest version."]
    );
    assert_eq!(page["project"]["longtext"], "Final");

    let response = app
        .get(&format!("/project/{id}/revert/{}", first_update.id))
        .await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["Project data has been reverted."]);
    assert_eq!(page["project"]["longtext"], "Fixme");

    let versions = app
        .state
        .db
        .with_conn(|conn| VersionTracker::count(conn, id))
        .await
        .unwrap();
    assert_eq!(versions, 4);
}

#[tokio::test]
async fn duplicate_project_names_are_refused() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;
    let id = app.new_project(event.id, &[("name", "Robot")]).await;
    app.page(&format!("/project/{id}")).await;

    let response = app
        .post(
            &format!("/project/new/{}", event.id),
            &[("name", "robot")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["view"], "project_new");
    assert_eq!(
        flash_messages(&page),
        vec!["A project with this name already exists."]
    );
}

#[tokio::test]
async fn categories_must_belong_to_the_event() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;
    let other = app.running_event("Autumn Hack").await;
    let id = app.new_project(event.id, &[("name", "Robot")]).await;
    app.page(&format!("/project/{id}")).await;

    let other_id = other.id.to_string();
    app.post(
        "/admin/categories",
        &[("name", "Elsewhere"), ("event_id", &other_id)],
    )
    .await;
    let categories = app.page("/admin/categories").await;
    let foreign = categories["categories"][0]["id"].as_i64().unwrap().to_string();

    for category_id in ["999", foreign.as_str()] {
        let response = app
            .post(
                &format!("/project/{id}/edit"),
                &[("name", "Robot"), ("category_id", category_id)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let page: Value = response.json().await.unwrap();
        assert_eq!(page["view"], "project_edit");
        assert_eq!(
            flash_messages(&page),
            vec!["Please choose one of the categories of this event."]
        );
    }

    let page = app.page(&format!("/project/{id}")).await;
    assert!(page["project"]["category_id"].is_null());

    let response = app
        .post(
            &format!("/project/new/{}", event.id),
            &[("name", "Lamp"), ("category_id", "999")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["view"], "project_new");
    assert_eq!(
        flash_messages(&page),
        vec!["Please choose one of the categories of this event."]
    );
}

#[tokio::test]
async fn posting_promotes_when_ready() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;
    let id = app.new_project(event.id, &[("name", "Robot")]).await;
    app.page(&format!("/project/{id}")).await;

    let response = app
        .post(
            &format!("/project/{id}/post"),
            &[("note", "Started soldering"), ("has_progress", "y")],
        )
        .await;
    let (target, page) = follow(&app, response).await;
    assert_eq!(target, format!("/project/{id}/posted"));
    assert_eq!(
        flash_messages(&page),
        vec![
            "Your project did not meet stage requirements.",
            "Thanks for your Post in the project Log!"
        ]
    );
    assert_eq!(page["project"]["progress"], 5);

    app.post(&format!("/project/{id}/edit"), &[("name", "Robot"), ("longtext", LONG_TEXT)])
        .await;
    app.page(&format!("/project/{id}")).await;

    let response = app
        .post(
            &format!("/project/{id}/post"),
            &[("note", "It waters!"), ("has_progress", "y")],
        )
        .await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page)[0], "Your project has been promoted!");
    assert_eq!(page["project"]["progress"], 10);
    assert_eq!(page["stage"]["name"], "Sketching");

    let dribs = app.page("/dribs?limit=1").await;
    assert_eq!(dribs["data"]["total"], 2);
    assert_eq!(dribs["data"]["items"][0]["content"], "It waters!");
    assert_eq!(dribs["data"]["has_next"], true);

    let response = app.get("/user/ada/post").await;
    assert_eq!(location(&response), format!("/project/{id}/post"));
}

#[tokio::test]
async fn join_and_leave_team() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;
    let id = app.new_project(event.id, &[("name", "Robot")]).await;
    app.logout().await;
    signup(&app, "bob").await;

    let response = app.get(&format!("/project/{id}/edit")).await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(
        flash_messages(&page),
        vec!["You do not have access to edit this project."]
    );
    assert_eq!(page["allow_edit"], false);

    let response = app.get(&format!("/project/{id}/star/me")).await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["Welcome to the team!"]);
    assert_eq!(page["project_starred"], true);
    assert_eq!(page["project_team"].as_array().unwrap().len(), 2);
    assert_eq!(page["allow_edit"], true);

    // joining twice changes nothing
    app.get(&format!("/project/{id}/star/me")).await;
    let stars = activities(&app, id)
        .await
        .iter()
        .filter(|a| a.name == ActivityType::Star)
        .count();
    assert_eq!(stars, 2);

    let response = app.get(&format!("/project/{id}/boost")).await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(
        flash_messages(&page),
        vec!["Welcome to the team!", "You do not have access to boost this project."]
    );

    let response = app.get(&format!("/project/{id}/unstar/me")).await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["You have left the project"]);
    assert_eq!(page["project_starred"], false);

    let response = app
        .post(&format!("/project/{id}/star"), &[("username", "bob")])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_team_and_boosts() {
    let app = spawn_app().await;
    app.register("bob", "secret1").await;
    app.logout().await;
    // bob was first, so bob is the admin
    app.register("ada", "secret1").await;
    let event = app.running_event("Spring Hack").await;
    let id = app.new_project(event.id, &[("name", "Robot")]).await;
    app.logout().await;
    app.login("bob", "secret1").await;
    app.page("/").await;

    let response = app
        .post(&format!("/project/{id}/star"), &[("username", "ghost")])
        .await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(
        flash_messages(&page),
        vec!["User [ghost] not found. Please try again."]
    );

    let response = app
        .post(&format!("/project/{id}/star"), &[("username", "bob")])
        .await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["Added bob to the team!"]);

    let ada = user_id(&app, "ada").await;
    let response = app.get(&format!("/project/{id}/unstar/{ada}")).await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["User ada has left the project"]);
    assert_eq!(page["project_team"][0]["username"], "bob");

    let response = app
        .post(&format!("/project/{id}/boost"), &[("boost_type", "---")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(flash_messages(&page), vec!["Please select a boost."]);

    let response = app
        .post(
            &format!("/project/{id}/boost"),
            &[("boost_type", "Data wizards"), ("note", "Great charts")],
        )
        .await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["Thanks for your boost!"]);

    let boost = activities(&app, id)
        .await
        .into_iter()
        .find(|a| a.name == ActivityType::Boost)
        .unwrap();
    assert_eq!(boost.action.as_deref(), Some("Data wizards"));
    assert_eq!(boost.content.as_deref(), Some("Great charts"));
}

#[tokio::test]
async fn comments_and_deleting_posts() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;
    let id = app.new_project(event.id, &[("name", "Robot")]).await;
    app.logout().await;
    signup(&app, "bob").await;

    let response = app
        .post(&format!("/project/{id}/comment"), &[("note", "Nice idea")])
        .await;
    assert_eq!(location(&response), format!("/project/{id}/posted"));

    let review = activities(&app, id)
        .await
        .into_iter()
        .find(|a| a.name == ActivityType::Review)
        .unwrap();
    assert_eq!(review.action.as_deref(), Some("post"));

    let create = activities(&app, id)
        .await
        .into_iter()
        .find(|a| a.name == ActivityType::Create)
        .unwrap();
    let response = app
        .get(&format!("/project/{id}/unpost/{}", create.id))
        .await;
    let (_, page) = follow(&app, response).await;
    assert!(flash_messages(&page).contains(&"You may only delete your own posts.".to_string()));

    let response = app
        .get(&format!("/project/{id}/unpost/{}", review.id))
        .await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["The post has been deleted."]);
    assert!(activities(&app, id)
        .await
        .iter()
        .all(|a| a.name != ActivityType::Review));
}

#[tokio::test]
async fn locked_event_refuses_new_projects() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let mut event = app.running_event("Spring Hack").await;
    event.lock_starting = true;
    let saved = event.clone();
    app.state
        .db
        .with_conn(move |conn| saved.save(conn))
        .await
        .unwrap();

    let response = app
        .post(
            &format!("/project/event/{}/project/new", event.id),
            &[("name", "Robot")],
        )
        .await;
    let (target, page) = follow(&app, response).await;
    assert_eq!(target, format!("/event/{}", event.id));
    assert_eq!(
        flash_messages(&page),
        vec!["Starting a new project is disabled for this event."]
    );
    assert_eq!(page["project_count"], 0);
}

#[tokio::test]
async fn autoupdate_pulls_readme() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;

    let id = app
        .new_project(
            event.id,
            &[("name", "Robot"), ("autotext_url", "https://github.com/example/robot")],
        )
        .await;
    let page = app.page(&format!("/project/{id}")).await;
    assert_eq!(
        flash_messages(&page),
        vec!["Invite your team to Join this page!", "Project data synced from GitHub"]
    );
    assert_eq!(page["project"]["summary"], "A robot that waters plants");
    assert!(page["project"]["autotext"]
        .as_str()
        .unwrap()
        .contains("Waters the plants"));

    let sync = activities(&app, id)
        .await
        .into_iter()
        .find(|a| a.action.as_deref() == Some("sync"))
        .unwrap();
    assert!(sync.content.unwrap().ends_with("bytes"));

    let other = app
        .new_project(
            event.id,
            &[("name", "Lamp"), ("autotext_url", "https://example.org/missing.md")],
        )
        .await;
    let page = app.page(&format!("/project/{other}")).await;
    assert!(flash_messages(&page)
        .contains(&"Could not sync: check that the remote site contains a README.".to_string()));

    // without a remote url there is nothing to sync
    let plain = app.new_project(event.id, &[("name", "Plain")]).await;
    app.page(&format!("/project/{plain}")).await;
    let response = app.get(&format!("/project/{plain}/autoupdate")).await;
    let (_, page) = follow(&app, response).await;
    assert_eq!(flash_messages(&page), vec!["You may not sync this project."]);
}

#[tokio::test]
async fn event_page_orders_by_score() {
    let app = spawn_app().await;
    signup(&app, "ada").await;
    let event = app.running_event("Spring Hack").await;
    app.new_project(event.id, &[("name", "alpha")]).await;
    app.new_project(
        event.id,
        &[("name", "Beta"), ("summary", "The better one"), ("longtext", LONG_TEXT)],
    )
    .await;

    let page = app.page(&format!("/event/{}", event.id)).await;
    assert_eq!(page["project_count"], 2);
    assert_eq!(page["projects"][0]["name"], "Beta");
    assert_eq!(page["projects"][1]["name"], "alpha");

    let stored = app
        .state
        .db
        .with_conn(|conn| Event::get(conn, event.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "Spring Hack");
}
