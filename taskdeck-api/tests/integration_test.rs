/// Integration tests for the TaskDeck API
///
/// These tests drive the full router against PostgreSQL:
/// - Registration, login and refresh-token rotation
/// - The project authorization gate
/// - Task workflow with comments, mentions and notifications
/// - The pagination header and the error envelope
///
/// Run with: cargo test -p taskdeck-api --test integration_test -- --ignored

mod common;

use axum::http::{Method, StatusCode};
use common::TestContext;
use serde_json::{json, Value};

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_register_login_and_me() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.user().await;

    let me = ctx.get("/api/account/me", &user).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], user.email);
    assert!(me.body.get("passwordHash").is_none());

    let check = ctx.get("/api/account/check-auth", &user).await;
    assert_eq!(check.body["authenticated"], true);
    assert_eq!(check.body["isAdmin"], false);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_email_is_conflict() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.user().await;

    let response = ctx
        .send(
            Method::POST,
            "/api/account/register",
            None,
            None,
            Some(json!({
                "email": user.email.to_uppercase(),
                "password": common::TEST_PASSWORD,
                "firstName": "Again",
                "lastName": "Tester",
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body["message"].is_string());
    assert!(response.body["timestamp"].is_string());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_weak_password_returns_field_errors() {
    let ctx = TestContext::new().await.unwrap();

    let response = ctx
        .send(
            Method::POST,
            "/api/account/register",
            None,
            None,
            Some(json!({
                "email": "weak@example.com",
                "password": "short",
                "firstName": "Weak",
                "lastName": "Password",
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["errors"]["password"].is_array());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_refresh_rotates_and_detects_replay() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.user().await;
    let old_cookie = format!("refresh_token={}", user.refresh_token);

    let rotated = ctx
        .send(Method::POST, "/api/account/refresh", None, Some(&old_cookie), None)
        .await;
    assert_eq!(rotated.status, StatusCode::OK, "{}", rotated.body);
    let new_token = rotated.cookie("refresh_token").unwrap();
    assert_ne!(new_token, user.refresh_token);
    assert!(rotated.body["accessToken"].is_string());

    let replay = ctx
        .send(Method::POST, "/api/account/refresh", None, Some(&old_cookie), None)
        .await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
    assert_eq!(replay.cookie("refresh_token").as_deref(), Some(""));

    // The replay ended the whole session
    let new_cookie = format!("refresh_token={new_token}");
    let after = ctx
        .send(Method::POST, "/api/account/refresh", None, Some(&new_cookie), None)
        .await;
    assert_eq!(after.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_refresh_without_cookie_is_bad_request() {
    let ctx = TestContext::new().await.unwrap();

    let response = ctx
        .send(Method::POST, "/api/account/refresh", None, None, None)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Refresh token is missing");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_private_project_gate() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let outsider = ctx.user().await;
    let admin = ctx.admin().await;

    let project = ctx.project(&owner, "Private").await;
    let uri = format!("/api/project/{project}");

    assert_eq!(ctx.get(&uri, &owner).await.status, StatusCode::OK);
    assert_eq!(ctx.get(&uri, &outsider).await.status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.get(&uri, &admin).await.status, StatusCode::OK);

    // Membership opens a private project to the new member
    let added = ctx
        .post(
            &format!("{uri}/member"),
            &owner,
            json!({ "accountId": outsider.id, "role": "Member" }),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED, "{}", added.body);

    let fetched = ctx.get(&uri, &outsider).await;
    assert_eq!(fetched.status, StatusCode::OK, "{}", fetched.body);
    assert_eq!(fetched.body["id"], project.to_string());

    let role = ctx.get(&format!("{uri}/role"), &outsider).await;
    assert_eq!(role.status, StatusCode::OK);
    assert_eq!(role.body["role"], "Member");
    assert_eq!(role.body["active"], true);
    assert_eq!(role.body["isCreator"], false);

    let owner_role = ctx.get(&format!("{uri}/role"), &owner).await;
    assert_eq!(owner_role.body["role"], "Owner");
    assert_eq!(owner_role.body["isCreator"], true);

    let missing = ctx
        .get(&format!("/api/project/{}", uuid::Uuid::new_v4()), &owner)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_project_list_sets_pagination_header() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;

    for _ in 0..3 {
        ctx.project(&owner, "Private").await;
    }

    let response = ctx.get("/api/project?page=1&pageSize=2", &owner).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().map(Vec::len), Some(2));

    let header = response.headers.get("x-pagination").unwrap().to_str().unwrap();
    let meta: Value = serde_json::from_str(header).unwrap();
    assert_eq!(meta["pageSize"], 2);
    assert_eq!(meta["currentPage"], 1);
    assert_eq!(meta["totalCount"], 3);
    assert_eq!(meta["totalPage"], 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_archive_freezes_project_until_unarchived() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let project = ctx.project(&owner, "Private").await;

    let archived = ctx
        .patch(&format!("/api/project/{project}/status"), &owner, json!({ "status": "Archived" }))
        .await;
    assert_eq!(archived.status, StatusCode::OK, "{}", archived.body);

    let task = ctx
        .post(&format!("/api/project/{project}/task"), &owner, json!({ "title": "Frozen" }))
        .await;
    assert_eq!(task.status, StatusCode::FORBIDDEN);

    let unarchived = ctx
        .patch(&format!("/api/project/unarchive/{project}"), &owner, json!({}))
        .await;
    assert_eq!(unarchived.status, StatusCode::OK);
    assert_eq!(unarchived.body["status"], "Active");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_task_workflow_with_mentions() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let teammate = ctx.user().await;
    let project = ctx.project(&owner, "Team").await;

    let added = ctx
        .post(
            &format!("/api/project/{project}/member"),
            &owner,
            json!({ "accountId": teammate.id, "role": "Member" }),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED, "{}", added.body);

    let task = ctx
        .post(
            &format!("/api/project/{project}/task"),
            &owner,
            json!({ "title": "Write release notes", "assigneeId": teammate.id }),
        )
        .await;
    assert_eq!(task.status, StatusCode::CREATED, "{}", task.body);
    let task_id = task.body["id"].as_str().unwrap().to_string();

    // Assignee may move the task along
    let moved = ctx
        .patch(
            &format!("/api/project/{project}/task/{task_id}/status"),
            &teammate,
            json!({ "status": "InProgress" }),
        )
        .await;
    assert_eq!(moved.status, StatusCode::OK, "{}", moved.body);
    assert_eq!(moved.body["status"], "InProgress");

    let comment = ctx
        .post(
            &format!("/api/project/{project}/task/{task_id}/comment"),
            &owner,
            json!({ "content": "Please include the migration steps", "mentions": [teammate.id] }),
        )
        .await;
    assert_eq!(comment.status, StatusCode::CREATED, "{}", comment.body);

    let mentions = ctx.get("/api/mention?unreadOnly=true", &teammate).await;
    assert_eq!(mentions.status, StatusCode::OK);
    assert_eq!(mentions.body.as_array().map(Vec::len), Some(1));

    let mention_id = mentions.body[0]["id"].as_str().unwrap().to_string();
    let read = ctx
        .patch(&format!("/api/mention/{mention_id}/read"), &teammate, json!({}))
        .await;
    assert_eq!(read.status, StatusCode::OK, "{}", read.body);
    assert_eq!(read.body["id"], mention_id);
    assert_eq!(read.body["isRead"], true);
    assert_eq!(read.body["taskId"], task_id);
    assert_eq!(read.body["projectId"], project.to_string());
    assert_eq!(read.body["mentionedBy"], owner.id.to_string());

    let unread_mentions = ctx.get("/api/mention?unreadOnly=true", &teammate).await;
    assert_eq!(unread_mentions.body.as_array().map(Vec::len), Some(0));

    let unread = ctx.get("/api/notification/unread-count", &teammate).await;
    assert!(unread.body["count"].as_i64().unwrap() >= 1);

    let activity = ctx.get(&format!("/api/project/{project}/activity"), &owner).await;
    assert_eq!(activity.status, StatusCode::OK);
    let kinds: Vec<&str> = activity
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|entry| entry["type"].as_str())
        .collect();
    assert!(kinds.contains(&"CommentAdded"));
    assert!(kinds.contains(&"TaskStatusChanged"));
}
