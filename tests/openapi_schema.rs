use serde_json::Value;

#[test]
fn openapi_documents_post_fields_and_bearer_auth() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = site_cms::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let props = v
        .get("components")
        .and_then(Value::as_object)
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .and_then(|s| s.get("Post"))
        .and_then(Value::as_object)
        .and_then(|t| t.get("properties"))
        .and_then(Value::as_object)
        .expect("components.schemas.Post.properties must exist");

    let keys = ["siteId", "authorId", "published", "featured", "editingPolicy", "shortDesc"];
    for k in &keys {
        assert!(props.contains_key(*k), "OpenAPI Post schema missing '{}'", k);
    }

    let schemes = v
        .pointer("/components/securitySchemes/bearerAuth")
        .expect("bearerAuth security scheme must exist");
    assert_eq!(schemes.get("scheme").and_then(Value::as_str), Some("bearer"));

    let paths = v.get("paths").and_then(Value::as_object).expect("paths must exist");
    for path in ["/api/posts", "/api/posts/{slug}", "/api/posts/featured", "/api/admins/{id}"] {
        assert!(paths.contains_key(path), "OpenAPI missing path '{}'", path);
    }
    assert!(paths["/api/posts/{slug}"].get("patch").is_some());

    Ok(())
}
