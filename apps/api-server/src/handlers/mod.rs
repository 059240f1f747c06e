//! HTTP handlers and route configuration.

mod auth;
mod health;
mod posts;
mod views;

#[cfg(test)]
mod tests;

use actix_web::web;

use crate::middleware::error::{json_error_handler, query_error_handler};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .service(
            web::scope("/api")
                // Public routes
                .route("/health", web::get().to(health::health_check))
                // Auth routes
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/login", web::post().to(auth::login))
                        .route("/me", web::get().to(auth::me)),
                )
                // Post routes; "/create" must be registered before "/{key}"
                .service(
                    web::scope("/posts")
                        .route("", web::get().to(posts::list_posts))
                        .route("/create", web::post().to(posts::create_post))
                        .route("/{key}", web::get().to(posts::post_detail))
                        .service(
                            web::resource("/{key}/edit")
                                .route(web::put().to(posts::update_post))
                                .route(web::patch().to(posts::update_post)),
                        )
                        .route("/{key}/delete", web::delete().to(posts::delete_post)),
                ),
        );
}
