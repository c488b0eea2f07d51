/// End-to-end flows through the full router and a real database.

mod common;

use axum::http::{Method, StatusCode};
use common::{unique, TestContext};
use serde_json::json;

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_register_login_and_me() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.user().await;

    let (status, body) = ctx.send(Method::GET, "/users/me", Some(&user.token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], user.id);
    assert_eq!(body["data"]["username"], user.username.as_str());
    assert!(body["data"].get("password").is_none());
    assert!(body["data"]["profile_image"].is_null());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_registration_conflicts() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.user().await;

    let (status, _) = ctx
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "username": user.username,
                "email": format!("{}@example.org", unique("other")),
                "password": "password1",
                "full_name": "Copy",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_wrong_password_is_unauthorized() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.user().await;

    let (status, body) = ctx
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username_or_email": user.username, "password": "password2" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_team_owner_has_access_and_stranger_does_not() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let stranger = ctx.user().await;
    let team_id = ctx.team(&owner).await;

    let uri = format!("/teams/{}", team_id);
    let (status, body) = ctx.send(Method::GET, &uri, Some(&owner.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], team_id);

    let (status, body) = ctx.send(Method::GET, &uri, Some(&stranger.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["data"].is_null());

    let (status, body) = ctx
        .send(Method::GET, &format!("{}/member-count", uri), Some(&owner.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_join_request_then_accept() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let joiner = ctx.user().await;
    let team_id = ctx.team(&owner).await;

    let (status, body) = ctx
        .send(Method::POST, &format!("/teams/{}/request-join", team_id), Some(&joiner.token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["is_active"], false);

    // Pending members have no access yet.
    let (status, _) = ctx
        .send(Method::GET, &format!("/teams/{}", team_id), Some(&joiner.token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("/teams/{}/accept", team_id),
            Some(&owner.token),
            Some(json!({ "user_id": joiner.id, "team_role_id": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["is_active"], true);

    let (status, _) = ctx
        .send(Method::GET, &format!("/teams/{}", team_id), Some(&joiner.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Members cannot manage membership.
    let (status, _) = ctx
        .send(Method::GET, &format!("/teams/{}/pending-members", team_id), Some(&joiner.token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_product_update_replaces_categories() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let team_id = ctx.team(&owner).await;
    let categories = format!("/teams/{}/product_category", team_id);

    let mut category_ids = Vec::new();
    for name in ["Dry goods", "Frozen", "Fresh"] {
        let (status, body) = ctx
            .send(Method::POST, &categories, Some(&owner.token), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        category_ids.push(body["data"]["id"].as_i64().unwrap());
    }

    let products = format!("/teams/{}/products", team_id);
    let (status, body) = ctx
        .send(
            Method::POST,
            &products,
            Some(&owner.token),
            Some(json!({
                "name": "Rice",
                "uom": "kg",
                "price": 1250,
                "category_ids": [category_ids[0], category_ids[1]],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let product_id = body["data"]["id"].as_i64().unwrap();
    let code = body["data"]["code"].as_str().unwrap().to_string();
    assert!(code.starts_with('P'));

    let product = format!("{}/{}", products, product_id);
    let (status, _) = ctx
        .send(
            Method::PUT,
            &product,
            Some(&owner.token),
            Some(json!({
                "code": code,
                "name": "Rice",
                "uom": "kg",
                "price": 1300,
                "category_ids": [category_ids[2]],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.send(Method::GET, &product, Some(&owner.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let linked: Vec<i64> = body["data"]["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(linked, vec![category_ids[2]]);
    assert_eq!(body["data"]["price"], 1300);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_foreign_category_is_rejected() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let team_id = ctx.team(&owner).await;
    let other_team = ctx.team(&owner).await;

    let (_, body) = ctx
        .send(
            Method::POST,
            &format!("/teams/{}/product_category", other_team),
            Some(&owner.token),
            Some(json!({ "name": "Elsewhere" })),
        )
        .await;
    let foreign = body["data"]["id"].as_i64().unwrap();

    let (status, _) = ctx
        .send(
            Method::POST,
            &format!("/teams/{}/products", team_id),
            Some(&owner.token),
            Some(json!({ "name": "Tea", "uom": "box", "price": 500, "category_ids": [foreign] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = ctx
        .send(Method::GET, &format!("/teams/{}/products", team_id), Some(&owner.token), None)
        .await;
    assert_eq!(body["meta"]["total_rows"], 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_sequence_endpoints() {
    let ctx = TestContext::new().await.unwrap();
    let owner = ctx.user().await;
    let team_id = ctx.team(&owner).await;
    let base = format!("/teams/{}/sequences/PO", team_id);

    for expected in 1..=3 {
        let (status, body) = ctx
            .send(Method::POST, &format!("{}/next?entity_id=7", base), Some(&owner.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["value"], expected);
    }

    let (status, _) = ctx
        .send(Method::POST, &format!("{}/reset?entity_id=7", base), Some(&owner.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx
        .send(Method::POST, &format!("{}/next?entity_id=7", base), Some(&owner.token), None)
        .await;
    assert_eq!(body["data"]["value"], 1);

    let (status, _) = ctx
        .send(Method::POST, &format!("/teams/{}/sequences/XX/next", team_id), Some(&owner.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
