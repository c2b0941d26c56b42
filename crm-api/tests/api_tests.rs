/// End-to-end tests through the router
///
/// Requires PostgreSQL in `DATABASE_URL`; see `common/mod.rs`.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{token_from_email, TestContext, PASSWORD};
use crm_shared::auth::tokens::OneTimeToken;
use crm_shared::models::user::{Role, User};
use serde_json::json;

macro_rules! context {
    () => {
        match TestContext::new().await {
            Some(ctx) => ctx,
            None => return,
        }
    };
}

#[tokio::test]
async fn test_register_verify_login_flow() {
    let ctx = context!();
    let email = ctx.unique_email("Flow");

    let (status, body) = ctx
        .post(
            "/auth/register",
            None,
            json!({"name": "Flow", "email": email.to_uppercase(), "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["email"], email.to_lowercase());
    assert_eq!(body["role"], "user");
    assert_eq!(body["is_verified"], false);
    assert!(body.get("hashed_password").is_none());

    let login = json!({"email": email, "password": PASSWORD});
    let (status, body) = ctx.post("/auth/login", None, login.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Please verify your email");

    let mail = ctx.wait_for_email(&email.to_lowercase(), "Verify your email").await;
    assert!(mail.body.contains("http://crm.test/auth/verify-email?token="));
    let token = token_from_email(&mail);

    let (status, body) = ctx
        .request(Method::GET, &format!("/auth/verify-email?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Email verified successfully");

    let (status, body) = ctx
        .request(Method::POST, &format!("/auth/verify-email?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid token");

    let (status, body) = ctx
        .post("/auth/login", None, json!({"email": email, "password": "wrong-password"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = ctx.post("/auth/login", None, login).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "bearer");
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let (status, me) = ctx.get("/me", &access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email.to_lowercase());
    assert_eq!(me["is_verified"], true);
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let ctx = context!();
    let email = ctx.unique_email("dup");
    let body = json!({"name": "Dup", "email": email, "password": PASSWORD});

    let (status, _) = ctx.post("/auth/register", None, body).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx
        .post(
            "/auth/register",
            None,
            json!({"name": "Dup again", "email": email.to_uppercase(), "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already registered");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_register_cannot_choose_role() {
    let ctx = context!();
    let (status, body) = ctx
        .post(
            "/auth/register",
            None,
            json!({"name": "Eve", "email": ctx.unique_email("eve"), "password": PASSWORD, "role": "admin"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn test_register_validation() {
    let ctx = context!();
    let (status, body) = ctx
        .post("/auth/register", None, json!({"name": "V", "email": "not-an-email", "password": "short"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let ctx = context!();
    let alice = ctx.create_user(Role::User).await;
    let email = alice.user.email.clone();

    let (status, body) = ctx
        .post("/auth/forgot_password", None, json!({"email": ctx.unique_email("nobody")}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, _) = ctx.post("/auth/forgot_password", None, json!({"email": email})).await;
    assert_eq!(status, StatusCode::OK);

    let mail = ctx.wait_for_email(&email, "Reset your password").await;
    let token = token_from_email(&mail);

    let new_password = "a-brand-new-password";
    let (status, body) = ctx
        .post("/auth/reset-password", None, json!({"token": token, "new_password": new_password}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = ctx
        .post("/auth/reset-password", None, json!({"token": token, "new_password": new_password}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid token");

    let (status, _) = ctx.post("/auth/login", None, json!({"email": email, "password": PASSWORD})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .post("/auth/login", None, json!({"email": email, "password": new_password}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_reset_token_rejected() {
    let ctx = context!();
    let bob = ctx.create_user(Role::User).await;

    let reset = OneTimeToken::generate();
    User::set_password_reset_token(&ctx.db, bob.id(), &reset.digest, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let (status, _) = ctx
        .post(
            "/auth/reset-password",
            None,
            json!({"token": reset.plaintext, "new_password": "another-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_and_bad_tokens_are_401() {
    let ctx = context!();

    let (status, body) = ctx.request(Method::GET, "/contacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authenticated");

    let (status, body) = ctx.get("/contacts", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Could not validate credentials");
}

#[tokio::test]
async fn test_contacts_are_owner_scoped() {
    let ctx = context!();
    let alice = ctx.create_user(Role::User).await;
    let mallory = ctx.create_user(Role::User).await;
    let admin = ctx.create_user(Role::Admin).await;

    let (status, contact) = ctx
        .post(
            "/contacts",
            Some(&alice.token),
            json!({"name": "Private Person", "email": "pp@example.com", "status": "new", "source": "referral"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{contact}");
    assert_eq!(contact["owner_id"], alice.id());
    let uri = format!("/contacts/{}", contact["id"]);

    let (status, _) = ctx.get(&uri, &mallory.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx
        .request(Method::PUT, &uri, Some(&mallory.token), Some(json!({"name": "Hijacked"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.request(Method::DELETE, &uri, Some(&mallory.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listing) = ctx.get("/contacts", &mallory.token).await;
    assert_eq!(listing["total"], 0);

    let (status, seen) = ctx.get(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["name"], "Private Person");

    let (status, updated) = ctx
        .request(Method::PUT, &uri, Some(&alice.token), Some(json!({"status": "won"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "won");
    assert_eq!(updated["name"], "Private Person");

    let (status, body) = ctx.request(Method::DELETE, &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"detail": "Contact deleted"}));
    let (status, _) = ctx.get(&uri, &alice.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_leads_and_tasks_are_owner_scoped() {
    let ctx = context!();
    let alice = ctx.create_user(Role::User).await;
    let mallory = ctx.create_user(Role::User).await;
    let admin = ctx.create_user(Role::Admin).await;

    for (collection, create, rename, deleted) in [
        ("/leads", json!({"name": "Secret lead", "notes": "warm"}), json!({"name": "Hijacked"}), "Lead deleted"),
        ("/tasks", json!({"head": "Secret task"}), json!({"head": "Hijacked"}), "Task deleted"),
    ] {
        let (status, record) = ctx.post(collection, Some(&alice.token), create).await;
        assert_eq!(status, StatusCode::CREATED, "{record}");
        assert_eq!(record["owner_id"], alice.id());
        let uri = format!("{collection}/{}", record["id"]);

        let (status, _) = ctx.get(&uri, &mallory.token).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        let (status, _) = ctx
            .request(Method::PUT, &uri, Some(&mallory.token), Some(rename.clone()))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        let (status, _) = ctx.request(Method::DELETE, &uri, Some(&mallory.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");

        let (_, listing) = ctx.get(collection, &mallory.token).await;
        assert_eq!(listing["total"], 0, "{collection}");
        let (_, listing) = ctx.get(collection, &admin.token).await;
        assert_eq!(listing["total"], 0, "admin listings stay owner-scoped");

        let (status, unchanged) = ctx.get(&uri, &alice.token).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!unchanged.to_string().contains("Hijacked"));

        let (status, updated) = ctx
            .request(Method::PUT, &uri, Some(&admin.token), Some(rename))
            .await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(updated["owner_id"], alice.id());

        let (status, body) = ctx.request(Method::DELETE, &uri, Some(&admin.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"detail": deleted}));
        let (status, _) = ctx.get(&uri, &alice.token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_lead_search_covers_name_and_notes() {
    let ctx = context!();
    let owner = ctx.create_user(Role::User).await;
    let stranger = ctx.create_user(Role::User).await;

    for lead in [
        json!({"name": "Harbor Freight", "status": "new"}),
        json!({"name": "Quiet deal", "notes": "met at the harbor expo", "status": "contacted"}),
        json!({"name": "Unrelated"}),
        json!({"name": "Other", "notes": "nothing to see"}),
    ] {
        let (status, body) = ctx.post("/leads", Some(&owner.token), lead).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
    ctx.post("/leads", Some(&stranger.token), json!({"name": "Harbor Lights"}))
        .await;

    let (status, page) = ctx.get("/leads?q=HARBOR", &owner.token).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["total"], 2);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items[0]["name"], "Harbor Freight");
    assert_eq!(items[1]["name"], "Quiet deal");

    let (_, page) = ctx.get("/leads?q=harbor&status=contacted", &owner.token).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["name"], "Quiet deal");

    let (_, page) = ctx.get("/leads?q=%20%20", &owner.token).await;
    assert_eq!(page["total"], 4, "blank search is ignored");
}

#[tokio::test]
async fn test_task_search_covers_head_and_description() {
    let ctx = context!();
    let owner = ctx.create_user(Role::User).await;

    for task in [
        json!({"head": "Fix login"}),
        json!({"head": "Review copy", "description": "the login page wording", "team_id": 9}),
        json!({"head": "Lunch"}),
    ] {
        let (status, body) = ctx.post("/tasks", Some(&owner.token), task).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, page) = ctx.get("/tasks?q=login&limit=1", &owner.token).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["head"], "Fix login");

    let (_, page) = ctx.get("/tasks?q=login&skip=1&limit=1", &owner.token).await;
    assert_eq!(page["items"][0]["head"], "Review copy");

    let (_, page) = ctx.get("/tasks?q=login&team_id=9", &owner.token).await;
    assert_eq!(page["total"], 1);

    let (_, page) = ctx.get("/tasks?q=dinner", &owner.token).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_contact_search_ranks_and_pages() {
    let ctx = context!();
    let owner = ctx.create_user(Role::User).await;

    let mut names = vec!["Acme".to_string()];
    names.extend((1..12).map(|i| format!("Acme Industrial Holdings {i}")));
    names.push("Globex".to_string());
    for name in &names {
        let (status, _) = ctx.post("/contacts", Some(&owner.token), json!({"name": name})).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = ctx.get("/contacts?q=acme&skip=0&limit=5", &owner.token).await;
    assert_eq!(status, StatusCode::OK);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(page["total"], 12);
    assert_eq!(items[0]["name"], "Acme");

    let (_, page) = ctx.get("/contacts?q=acme&skip=10&limit=5", &owner.token).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let (_, page) = ctx.get("/contacts?q=%25", &owner.token).await;
    assert_eq!(page["total"], 0, "wildcards must match literally");

    let (_, page) = ctx.get("/contacts?limit=100", &owner.token).await;
    assert_eq!(page["total"], 13);
}

#[tokio::test]
async fn test_sort_policies() {
    let ctx = context!();
    let user = ctx.create_user(Role::User).await;
    let admin = ctx.create_user(Role::Admin).await;

    for name in ["Charlie", "Alpha", "Bravo"] {
        ctx.post("/leads", Some(&user.token), json!({"name": name})).await;
    }

    let (status, page) = ctx.get("/leads?sort_by=name&sort_order=DESC", &user.token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Charlie", "Bravo", "Alpha"]);

    let (status, page) = ctx.get("/leads?sort_by=owner_id;DROP", &user.token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Charlie", "Alpha", "Bravo"], "unknown field falls back to id order");

    let (status, body) = ctx.get("/admin/users?sort_by=hashed_password", &admin.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid sort field");
}

#[tokio::test]
async fn test_paging_bounds() {
    let ctx = context!();
    let user = ctx.create_user(Role::User).await;

    let (status, _) = ctx.get("/tasks?limit=0", &user.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = ctx.get("/tasks?skip=-1", &user.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = ctx.get("/tasks?skip=ten", &user.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_crud() {
    let ctx = context!();
    let user = ctx.create_user(Role::User).await;

    let (status, task) = ctx
        .post("/tasks", Some(&user.token), json!({"head": "Call back", "team_id": 3}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    assert_eq!(task["status"], "todo");
    let uri = format!("/tasks/{}", task["id"]);

    let (status, task) = ctx
        .request(Method::PUT, &uri, Some(&user.token), Some(json!({"status": "inprogress"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "inprogress");

    let (_, page) = ctx.get("/tasks?status=inprogress&team_id=3", &user.token).await;
    assert_eq!(page["total"], 1);
    let (_, page) = ctx.get("/tasks?status=todo", &user.token).await;
    assert_eq!(page["total"], 0);

    let (status, body) = ctx.request(Method::DELETE, &uri, Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Task deleted");
}

#[tokio::test]
async fn test_lead_date_filters() {
    let ctx = context!();
    let user = ctx.create_user(Role::User).await;

    for (name, created_at) in [
        ("March", "2024-03-15T12:00:00Z"),
        ("April first", "2024-04-01T23:30:00Z"),
        ("April second", "2024-04-02T00:00:00Z"),
    ] {
        let (status, _) = ctx
            .post("/leads", Some(&user.token), json!({"name": name, "created_at": created_at}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, page) = ctx.get("/leads?created_before=2024-04-01", &user.token).await;
    assert_eq!(page["total"], 2, "the whole boundary day is included");

    let (status, page) = ctx
        .get("/leads?created_before=2024-04-01T10:00:00", &user.token)
        .await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["total"], 2, "a timestamp bound covers its whole day");

    let (_, page) = ctx
        .get("/leads?created_after=2024-04-01T23:30:00Z", &user.token)
        .await;
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn test_delete_me_cascades() {
    let ctx = context!();
    let user = ctx.create_user(Role::User).await;

    ctx.post("/contacts", Some(&user.token), json!({"name": "C"})).await;
    ctx.post("/leads", Some(&user.token), json!({"name": "L"})).await;
    ctx.post("/tasks", Some(&user.token), json!({"head": "T"})).await;

    let (status, _) = ctx.request(Method::DELETE, "/me", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for table in ["contacts", "leads", "tasks"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE owner_id = $1"))
            .bind(user.id())
            .fetch_one(&ctx.db)
            .await
            .unwrap();
        assert_eq!(count, 0, "{table}");
    }

    let (status, _) = ctx.get("/me", &user.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_me_cannot_change_role() {
    let ctx = context!();
    let user = ctx.create_user(Role::User).await;

    let (status, body) = ctx
        .request(
            Method::PATCH,
            "/me",
            Some(&user.token),
            Some(json!({"name": "Renamed", "role": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn test_admin_user_management() {
    let ctx = context!();
    let admin = ctx.create_user(Role::Admin).await;
    let user = ctx.create_user(Role::User).await;

    let (status, body) = ctx.get("/admin/users", &user.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You do not have permission to perform this action");

    let (status, page) = ctx
        .get(&format!("/admin/users?q={}&role=user", user.user.email), &admin.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], user.id());

    let uri = format!("/admin/users/{}", user.id());
    let (status, body) = ctx
        .request(Method::PATCH, &uri, Some(&admin.token), Some(json!({"role": "manager"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "manager");

    let (status, _) = ctx.request(Method::DELETE, &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = ctx.get(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}
