mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{spawn, OTHER_SITE, SITE};
use site_cms::authz::Role;

#[tokio::test]
async fn publishers_create_categories_per_site() -> Result<()> {
    let app = spawn().await?;
    let (_, manager) = app.login_as(Role::PostsManager, SITE).await?;
    let (_, writer) = app.login_as(Role::PostsWriter, SITE).await?;

    let (status, _, _) = app
        .send(Method::POST, "/api/categories", Some(&writer), Some(json!({"name": "Sports"})))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send(Method::POST, "/api/categories", Some(&manager), Some(json!({"name": "Local Sports"})))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    assert_eq!(body["slug"], json!("local-sports"));
    assert_eq!(body["siteId"], json!(SITE));

    let (status, _, _) = app
        .send(Method::POST, "/api/categories", Some(&manager), Some(json!({"name": "Local sports"})))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = app.send(Method::GET, "/api/categories", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _, body) = app
        .send(Method::GET, &format!("/api/categories?siteId={OTHER_SITE}"), None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    Ok(())
}
