use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::register,
		routes::auth::login,
		routes::auth::refresh,
		routes::auth::logout,
		routes::auth::me,
		routes::users::update_role,
		routes::users::delete_user,
		routes::health::health
	),
	components(
		schemas(
			authz::Role,
			models::user::User,
			models::user::UserProfile,
			models::user::AuthResponse,
			models::user::TokenPair,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::RefreshRequest,
			models::user::RoleUpdateRequest,
			routes::auth::MessageResponse,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Auth", description = "Login, token rotation and logout"),
		(name = "Users", description = "Role administration"),
		(name = "Health", description = "Liveness")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	// Served as plain JSON so Swagger UI fetches exactly what we built.
	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else { return; };

	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else { return; };

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));
	if let Some(schemes) = schemes.as_object_mut() {
		schemes.entry("bearerAuth").or_insert_with(|| {
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			})
		});
	}
}

fn add_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(item) = item.as_object_mut() else { continue; };
		for operation in item.values_mut() {
			apply_request_example(operation);
			apply_response_examples(operation);
		}
	}
}

fn apply_request_example(operation: &mut Value) {
	let Some(app_json) = operation
		.pointer_mut("/requestBody/content/application~1json")
		.and_then(Value::as_object_mut)
	else {
		return;
	};

	let reference = app_json
		.get("schema")
		.and_then(|schema| schema.get("$ref"))
		.and_then(Value::as_str)
		.map(str::to_string);

	let example = match reference.as_deref() {
		Some("#/components/schemas/LoginRequest") => Some(json!({
			"email": "ana@globoo.com.br",
			"password": "correct horse battery"
		})),
		Some("#/components/schemas/RegisterRequest") => Some(json!({
			"name": "Ana Souza",
			"email": "ana@globoo.com.br",
			"password": "correct horse battery"
		})),
		Some("#/components/schemas/RefreshRequest") => Some(json!({
			"refresh_token": "3f1c2a9e-0000-4000-8000-000000000000.9b0c..."
		})),
		Some("#/components/schemas/RoleUpdateRequest") => Some(json!({ "role": "admin" })),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}

fn apply_response_examples(operation: &mut Value) {
	let Some(responses) = operation.get_mut("responses").and_then(Value::as_object_mut) else { return; };

	for response in responses.values_mut() {
		let Some(app_json) = response
			.pointer_mut("/content/application~1json")
			.and_then(Value::as_object_mut)
		else {
			continue;
		};

		let reference = app_json
			.get("schema")
			.and_then(|schema| schema.get("$ref"))
			.and_then(Value::as_str)
			.map(str::to_string);

		let example = match reference.as_deref() {
			Some("#/components/schemas/AuthResponse") => Some(json!({
				"access_token": "eyJhbGciOiJIUzI1Ni...",
				"refresh_token": "3f1c2a9e-0000-4000-8000-000000000000.9b0c...",
				"token_type": "Bearer",
				"expires_in": 86400,
				"user": {
					"id": "3f1c2a9e-0000-4000-8000-000000000000",
					"name": "Ana Souza",
					"email": "ana@globoo.com.br",
					"role": "assistant"
				}
			})),
			Some("#/components/schemas/TokenPair") => Some(json!({
				"access_token": "eyJhbGciOiJIUzI1Ni...",
				"refresh_token": "3f1c2a9e-0000-4000-8000-000000000000.41d7...",
				"token_type": "Bearer",
				"expires_in": 86400
			})),
			_ => None,
		};

		if let Some(example) = example {
			app_json.insert("example".to_string(), example);
		}
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bearer_scheme_and_auth_paths_are_documented() {
		let doc = serde_json::to_value(build_openapi(8000).unwrap()).unwrap();

		assert_eq!(doc["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");
		for path in ["/api/auth/login", "/api/auth/refresh", "/api/auth/logout", "/api/users/{id}/role"] {
			assert!(doc["paths"].get(path).is_some(), "missing {path}");
		}
		assert_eq!(doc["servers"][0]["url"], "http://localhost:8000");
	}
}
