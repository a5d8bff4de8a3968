mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};

use common::{send_request, spawn, SITE};
use site_cms::authz::Role;

fn location(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn anonymous_admin_ui_goes_to_super_admin_login() -> Result<()> {
    let app = spawn().await?;

    for path in ["/admin", "/admin/posts", "/admin/users"] {
        let (status, headers, _) = app.send(Method::GET, path, None, None).await?;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&headers), Some("/admin/login"), "{path}");
    }

    let (status, _, _) = app.send(Method::GET, "/admin/login", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = app.send(Method::GET, "/login", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logged_in_users_are_sent_to_their_portal() -> Result<()> {
    let app = spawn().await?;
    let (_, root) = app.login_as(Role::SuperAdmin, SITE).await?;
    let (_, editor) = app.login_as(Role::PostsEditor, SITE).await?;

    let (status, headers, _) = app.send(Method::GET, "/login", Some(&root), None).await?;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&headers), Some("/admin/dashboard"));

    let (status, headers, _) = app.send(Method::GET, "/admin/login", Some(&editor), None).await?;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&headers), Some("/admin/posts"));
    Ok(())
}

#[tokio::test]
async fn staff_are_kept_out_of_super_admin_sections() -> Result<()> {
    let app = spawn().await?;
    let (_, editor) = app.login_as(Role::PostsEditor, SITE).await?;
    let (_, root) = app.login_as(Role::SuperAdmin, SITE).await?;

    for path in ["/admin/dashboard", "/admin/settings/general", "/admin/categories"] {
        let (status, headers, _) = app.send(Method::GET, path, Some(&editor), None).await?;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&headers), Some("/admin/posts"), "{path}");

        let (status, _, _) = app.send(Method::GET, path, Some(&root), None).await?;
        assert_eq!(status, StatusCode::OK, "{path}");
    }

    let (status, _, body) = app.send(Method::GET, "/admin/posts", Some(&editor), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], serde_json::json!("POSTS_EDITOR"));
    Ok(())
}

#[tokio::test]
async fn session_cookie_is_honoured_by_the_gate() -> Result<()> {
    let app = spawn().await?;
    let (_, editor) = app.login_as(Role::PostsEditor, SITE).await?;

    let req = Request::builder()
        .uri("/admin/posts")
        .header(header::COOKIE, format!("admin_session={editor}"))
        .body(Body::empty())?;
    let (status, _, _) = send_request(&app.app, req).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn cache_headers_follow_path_category() -> Result<()> {
    let app = spawn().await?;

    let (_, headers, _) = app.send(Method::GET, "/api/posts", None, None).await?;
    let cache = headers.get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok());
    assert!(cache.unwrap_or_default().starts_with("public"), "{cache:?}");

    let (_, headers, _) = app.send(Method::GET, "/admin/login", None, None).await?;
    let cache = headers.get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok());
    assert!(cache.unwrap_or_default().starts_with("no-store"), "{cache:?}");
    assert_eq!(
        headers.get(header::X_FRAME_OPTIONS).and_then(|v| v.to_str().ok()),
        Some("DENY")
    );
    Ok(())
}
