mod common;

use axum::http::StatusCode;
use common::TestApp;
use intranet_accounts::ProfileUpdate;
use intranet_types::Role;
use serde_json::json;

#[tokio::test]
async fn calendar_merges_meetings_and_on_call_dates() {
    let app = TestApp::new();
    let (_, root) = app.account("root@example.com", Role::Superuser);
    let (_, viewer) = app.account("view@example.com", Role::Viewer);

    let meeting = json!({
        "title": "Budget review",
        "start": "2025-03-04T10:00:00",
        "end": "2025-03-04T11:00:00",
        "location": "Room 2",
        "needs_drinks": true
    });
    let (status, _) = app
        .json("POST", "/api/meetings", Some(&viewer), meeting.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .json("POST", "/api/meetings", Some(&root), meeting)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["creator"], "root@example.com");

    let (status, _) = app
        .json(
            "POST",
            "/api/on-call-dates",
            Some(&root),
            json!({ "date": "2025-03-05", "slot": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, holiday) = app
        .json(
            "POST",
            "/api/on-call-dates",
            Some(&root),
            json!({ "date": "2025-03-06", "slot": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, entries) = app.get("/api/calendar", &viewer).await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 3);

    assert_eq!(entries[0]["title"], "Budget review");
    assert_eq!(entries[0]["start"], "2025-03-04T10:00:00Z");
    assert_eq!(entries[0]["needs_drinks"], true);

    assert_eq!(entries[1]["title"], "ON-CALL 2");
    assert_eq!(entries[1]["start"], "2025-03-05T10:00:00");
    assert_eq!(entries[1]["end"], "2025-03-05T13:00:00");
    assert_eq!(entries[1]["type"], "on_call");
    assert_eq!(entries[1]["all_day"], false);

    assert_eq!(entries[2]["id"], format!("g-{}", holiday["id"]));
    assert_eq!(entries[2]["title"], "HOLIDAY");
    assert_eq!(entries[2]["end"], "2025-03-06T23:59:00");
    assert_eq!(entries[2]["type"], "holiday");
    assert_eq!(entries[2]["all_day"], true);
}

#[tokio::test]
async fn meeting_validation_and_updates() {
    let app = TestApp::new();
    let (_, editor) = app.account("ed@example.com", Role::Editor);

    let (status, _) = app
        .json(
            "POST",
            "/api/meetings",
            Some(&editor),
            json!({ "title": "Backwards", "start": "2025-03-04T11:00", "end": "2025-03-04T10:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json("POST", "/api/meetings", Some(&editor), json!({ "title": "No times" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, created) = app
        .json(
            "POST",
            "/api/meetings",
            Some(&editor),
            json!({ "title": "Sync", "start": "2025-03-04T10:00", "end": "2025-03-04T10:30" }),
        )
        .await;
    let uri = format!("/api/meetings/{}", created["id"]);

    let (status, _) = app
        .json("PUT", &uri, Some(&editor), json!({ "end": "2025-03-04T09:00" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .json("PUT", &uri, Some(&editor), json!({ "location": "Room 5" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["location"], "Room 5");
    assert_eq!(updated["title"], "Sync");

    let (status, _) = app.delete(&uri, &editor).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&uri, &editor).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn on_call_dates_are_for_site_admins() {
    let app = TestApp::new();
    let (admin_user, admin) = app.account("admin@example.com", Role::Editor);
    app.set_profile(
        admin_user.id,
        ProfileUpdate {
            sector: Some("Administracion".into()),
            ..ProfileUpdate::default()
        },
    );
    let (_, editor) = app.account("ed@example.com", Role::Editor);

    let body = json!({ "date": "2025-07-01", "slot": 1 });
    let (status, _) = app
        .json("POST", "/api/on-call-dates", Some(&editor), body.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .json("POST", "/api/on-call-dates", Some(&admin), body.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .json("POST", "/api/on-call-dates", Some(&admin), body)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            "POST",
            "/api/on-call-dates",
            Some(&admin),
            json!({ "date": "2025-07-02", "slot": 6 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = app.get("/api/on-call-dates", &editor).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let uri = format!("/api/on-call-dates/{}", created["id"]);
    let (status, _) = app.delete(&uri, &editor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn events_respect_branch_visibility() {
    let app = TestApp::new();
    let (_, root) = app.account("root@example.com", Role::Superuser);
    let (salta_user, salta) = app.account("salta@example.com", Role::Viewer);
    app.set_profile(
        salta_user.id,
        ProfileUpdate {
            branch: Some("Salta".into()),
            ..ProfileUpdate::default()
        },
    );
    let (hidden_user, hidden) = app.account("hidden@example.com", Role::Viewer);
    app.set_profile(
        hidden_user.id,
        ProfileUpdate {
            branch: Some("Salta".into()),
            ..ProfileUpdate::default()
        },
    );

    let create = |title: &str, venue: &str, starts_at: &str, hidden: serde_json::Value| {
        json!({
            "title": title,
            "venue": venue,
            "starts_at": starts_at,
            "hidden_from_users": hidden
        })
    };
    for body in [
        create("Company party", "Julia Tours", "2099-12-20T20:00", json!([])),
        create("Salta lunch", "Salta", "2099-06-01T13:00", json!([hidden_user.id.to_string()])),
        create("Cordoba trip", "Cordoba", "2099-07-01T09:00", json!([])),
        create("Old party", "Julia Tours", "2000-01-01T20:00", json!([])),
    ] {
        let (status, _) = app.json("POST", "/api/events", Some(&root), body).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let titles = |body: &serde_json::Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, all) = app.get("/api/events", &root).await;
    assert_eq!(titles(&all), ["Salta lunch", "Cordoba trip", "Company party"]);

    let (_, for_salta) = app.get("/api/events", &salta).await;
    assert_eq!(titles(&for_salta), ["Salta lunch", "Company party"]);
    assert_eq!(for_salta[0]["is_registered"], false);

    let (_, for_hidden) = app.get("/api/events", &hidden).await;
    assert_eq!(titles(&for_hidden), ["Company party"]);
}

#[tokio::test]
async fn registrations_are_upserted() {
    let app = TestApp::new();
    let (_, editor) = app.account("ed@example.com", Role::Editor);
    let (_, viewer) = app.account("view@example.com", Role::Viewer);

    let (_, event) = app
        .json(
            "POST",
            "/api/events",
            Some(&editor),
            json!({
                "title": "Summer party",
                "venue": "Julia Tours",
                "starts_at": "2099-01-15T21:00:00Z",
                "form_schema": { "fields": [{ "name": "diet", "type": "text" }] }
            }),
        )
        .await;
    let id = event["id"].as_i64().unwrap();
    let registration_uri = format!("/api/events/{}/registration", id);

    let (status, none) = app.get(&registration_uri, &viewer).await;
    assert_eq!(status, StatusCode::OK);
    assert!(none.is_null());

    let (status, first) = app
        .json(
            "POST",
            &registration_uri,
            Some(&viewer),
            json!({ "participates": true, "answers": { "diet": "vegan" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["participates"], true);

    let (_, second) = app
        .json(
            "POST",
            &registration_uri,
            Some(&viewer),
            json!({ "user_notes": "cannot make it" }),
        )
        .await;
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["participates"], false);

    let (_, listing) = app.get("/api/events", &viewer).await;
    assert_eq!(listing[0]["is_registered"], true);

    let list_uri = format!("/api/events/{}/registrations", id);
    let (status, _) = app.get(&list_uri, &viewer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, all) = app.get(&list_uri, &editor).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, _) = app
        .json("POST", "/api/events/999/registration", Some(&viewer), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/events/999/registrations", &editor).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_an_event_removes_its_banner() {
    let app = TestApp::new();
    let (_, editor) = app.account("ed@example.com", Role::Editor);
    let banner = app.upload_dir.path().join("1_abc_banner.png");
    std::fs::write(&banner, b"png").unwrap();

    let (_, event) = app
        .json(
            "POST",
            "/api/events",
            Some(&editor),
            json!({
                "title": "Launch",
                "venue": "Julia Tours",
                "starts_at": "2099-01-15T21:00",
                "banner_image": "1_abc_banner.png"
            }),
        )
        .await;
    let uri = format!("/api/events/{}", event["id"]);

    let (status, _) = app.delete(&uri, &editor).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!banner.exists());

    let (status, _) = app.get(&uri, &editor).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn banner_given_as_upload_url_keeps_the_file() {
    let app = TestApp::new();
    let (_, editor) = app.account("ed@example.com", Role::Editor);
    let banner = app.upload_dir.path().join("1_abc_banner.png");
    std::fs::write(&banner, b"png").unwrap();

    let (status, event) = app
        .json(
            "POST",
            "/api/events",
            Some(&editor),
            json!({
                "title": "Launch",
                "venue": "Julia Tours",
                "starts_at": "2099-01-15T21:00",
                "banner_image": "1_abc_banner.png"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/events/{}", event["id"]);

    let (status, updated) = app
        .json(
            "PUT",
            &uri,
            Some(&editor),
            json!({ "banner_image": "/uploads/1_abc_banner.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["banner_image"], "1_abc_banner.png");
    assert!(banner.exists());

    let replacement = app.upload_dir.path().join("1_def_banner.png");
    std::fs::write(&replacement, b"png").unwrap();
    let (_, updated) = app
        .json(
            "PUT",
            &uri,
            Some(&editor),
            json!({ "banner_image": "/uploads/1_def_banner.png" }),
        )
        .await;
    assert_eq!(updated["banner_image"], "1_def_banner.png");
    assert!(!banner.exists());
    assert!(replacement.exists());
}
