use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{EditingPolicy, Role, RolePermissions};
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::posts::list_posts,
		routes::posts::get_post,
		routes::posts::create_post,
		routes::posts::update_post,
		routes::posts::delete_post,
		routes::posts::featured_posts,
		routes::posts::latest_posts,
		routes::categories::list_categories,
		routes::categories::create_category,
		routes::admins::list_admins,
		routes::admins::create_admin,
		routes::admins::update_admin,
		routes::admins::delete_admin
	),
	components(
		schemas(
			Role,
			RolePermissions,
			EditingPolicy,
			models::admin::Admin,
			models::admin::AuthResponse,
			models::admin::LoginRequest,
			models::admin::SessionResponse,
			models::admin::AdminCreateRequest,
			models::admin::AdminUpdateRequest,
			models::post::Post,
			models::post::PostCreateRequest,
			models::post::PostUpdateRequest,
			models::post::Pagination,
			models::post::PostListResponse,
			models::category::Category,
			models::category::CategoryCreateRequest,
			routes::auth::MessageResponse,
			routes::health::HealthResponse
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Service health"),
		(name = "Auth", description = "Admin sessions"),
		(name = "Posts", description = "Tenant-scoped posts"),
		(name = "Categories", description = "Tenant-scoped categories"),
		(name = "Admins", description = "Admin user management")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = ApiDoc::openapi();

	let server_url = format!("http://localhost:{port}");
	let servers = doc.servers.get_or_insert_with(Vec::new);
	if !servers.iter().any(|s| s.url == server_url) {
		servers.push(Server::new(server_url));
	}

	Ok(doc)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);

	let json_route = {
		let doc = Arc::clone(&doc);
		get(move || {
			let doc = Arc::clone(&doc);
			async move { Json((*doc).clone()) }
		})
	};

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}
