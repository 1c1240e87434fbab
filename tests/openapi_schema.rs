use serde_json::Value;

#[test]
fn openapi_documents_token_lifecycle() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = globoo_auth::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let props = v
        .pointer("/components/schemas/AuthResponse/properties")
        .and_then(Value::as_object)
        .expect("components.schemas.AuthResponse.properties must exist");
    for k in ["access_token", "refresh_token", "token_type", "expires_in", "user"] {
        assert!(props.contains_key(k), "OpenAPI AuthResponse schema missing '{}'", k);
    }

    let role = v
        .pointer("/components/schemas/Role/enum")
        .and_then(Value::as_array)
        .expect("Role must be an enum");
    assert_eq!(role.len(), 3);

    assert!(v.pointer("/paths/~1api~1auth~1refresh/post").is_some());
    assert!(v.pointer("/paths/~1api~1users~1{id}~1role/put/security").is_some());

    Ok(())
}
