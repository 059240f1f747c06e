use std::sync::Arc;

use actix_web::http::{StatusCode, header};
use actix_web::middleware::NormalizePath;
use actix_web::{App, test, web};
use serde_json::{Value, json};
use uuid::Uuid;

use quill_core::domain::User;
use quill_core::policy::DeletePolicy;
use quill_core::ports::{BaseRepository, PasswordService, TokenService};
use quill_infra::{Argon2PasswordService, JwtConfig, JwtTokenService};

use super::configure_routes;
use crate::config::PostSettings;
use crate::state::AppState;

struct Harness {
    state: AppState,
    tokens: Arc<dyn TokenService>,
    passwords: Arc<dyn PasswordService>,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(PostSettings::default())
    }

    fn with_settings(settings: PostSettings) -> Self {
        Self {
            state: AppState::in_memory(settings),
            tokens: Arc::new(JwtTokenService::new(JwtConfig {
                secret: "test-secret".to_string(),
                expiration_hours: 1,
                issuer: "quill-test".to_string(),
            })),
            passwords: Arc::new(Argon2PasswordService::with_params(8 * 1024, 1, 1).unwrap()),
        }
    }

    /// Store a user directly and return a bearer header value for them.
    async fn user(&self, first: &str, last: &str) -> (Uuid, String) {
        let user = User::new(
            format!("{}@example.com", first.to_lowercase()),
            "unused".to_string(),
            first.to_string(),
            last.to_string(),
        );
        let user = self.state.users.save(user).await.unwrap();
        let token = self.tokens.generate_token(user.id, &user.email).unwrap();
        (user.id, format!("Bearer {token}"))
    }
}

macro_rules! app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .wrap(NormalizePath::trim())
                .app_data(web::Data::new($h.state.clone()))
                .app_data(web::Data::new($h.tokens.clone()))
                .app_data(web::Data::new($h.passwords.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

fn post_body(title: &str, content: &str) -> Value {
    json!({
        "title": title,
        "content": content,
        "publish": "2024-05-01T12:00:00Z",
    })
}

macro_rules! create {
    ($app:expr, $auth:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/posts/create")
            .insert_header((header::AUTHORIZATION, $auth.clone()))
            .set_json($body)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        body
    }};
}

fn keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    keys
}

#[actix_rt::test]
async fn test_owner_scenario() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;
    let (_, bob) = h.user("Bob", "Baker").await;

    let created = create!(app, alice, post_body("Hello", "World"));
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/posts/{id}/edit"))
        .insert_header((header::AUTHORIZATION, bob))
        .set_json(json!({ "title": "X" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/posts/{id}/edit"))
        .insert_header((header::AUTHORIZATION, alice))
        .set_json(json!({ "title": "X" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/api/posts/{id}"))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["title"], "X");
    assert_eq!(detail["content"], "World");
}

#[actix_rt::test]
async fn test_create_requires_authentication() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/posts/create")
        .set_json(post_body("Hello", "World"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/posts/create")
        .insert_header((header::AUTHORIZATION, "Bearer not-a-token"))
        .set_json(post_body("Hello", "World"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_create_ignores_supplied_owner() {
    let h = Harness::new();
    let app = app!(h);
    let (alice_id, alice) = h.user("Alice", "Archer").await;
    let (bob_id, _) = h.user("Bob", "Baker").await;

    let mut body = post_body("Mine", "All mine");
    body["user"] = json!(bob_id);
    let created = create!(app, alice, body);

    assert_eq!(
        keys(&created),
        ["content", "id", "publish", "title"].map(String::from)
    );

    let req = test::TestRequest::get().uri("/api/posts").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list[0]["user"], json!(alice_id));
}

#[actix_rt::test]
async fn test_create_validation() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;

    let req = test::TestRequest::post()
        .uri("/api/posts/create")
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({ "title": "  " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(resp).await;
    assert_eq!(problem["title"], "Validation Failed");
    assert_eq!(problem["status"], 400);

    let req = test::TestRequest::post()
        .uri("/api/posts/create")
        .insert_header((header::AUTHORIZATION, alice))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(r#"{"title": "Hello", "publish": "yesterday"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(resp).await;
    assert_eq!(problem["title"], "Bad Request");
}

#[actix_rt::test]
async fn test_detail_shape_and_not_found() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;
    let created = create!(app, alice, post_body("Hello World", "Body"));

    let req = test::TestRequest::get()
        .uri(&format!("/api/posts/{}", created["id"].as_str().unwrap()))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        keys(&detail),
        ["content", "id", "publish", "slug", "title"].map(String::from)
    );
    assert_eq!(detail["slug"], "hello-world");

    let req = test::TestRequest::get()
        .uri("/api/posts/hello-world")
        .to_request();
    let by_slug: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(by_slug["id"], created["id"]);

    let req = test::TestRequest::get()
        .uri(&format!("/api/posts/{}", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let problem: Value = test::read_body_json(resp).await;
    assert_eq!(problem["title"], "Not Found");
}

#[actix_rt::test]
async fn test_duplicate_titles_get_distinct_slugs() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;

    create!(app, alice, post_body("Same", "one"));
    create!(app, alice, post_body("Same", "two"));

    let req = test::TestRequest::get().uri("/api/posts").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    let mut slugs: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap().to_string())
        .collect();
    slugs.sort();

    assert_eq!(slugs, ["same", "same-2"]);
}

#[actix_rt::test]
async fn test_list_and_search() {
    let h = Harness::new();
    let app = app!(h);
    let (_, ada) = h.user("Ada", "Lovelace").await;
    let (_, alan) = h.user("Alan", "Turing").await;

    create!(app, ada, post_body("Analytical Engine", "Notes"));
    create!(app, alan, post_body("Computing Machinery", "Imitation game"));

    let req = test::TestRequest::get().uri("/api/posts/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("X-Total-Count").unwrap(), "2");
    let all: Value = test::read_body_json(resp).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(
        keys(&all[0]),
        ["content", "id", "publish", "slug", "title", "user"].map(String::from)
    );

    for (q, expected) in [
        ("ENGINE", "Analytical Engine"),
        ("imitation", "Computing Machinery"),
        ("lovelace", "Analytical Engine"),
        ("tur", "Computing Machinery"),
    ] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/posts?q={q}"))
            .to_request();
        let found: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.as_array().unwrap().len(), 1, "q={q}");
        assert_eq!(found[0]["title"], expected, "q={q}");
    }

    let req = test::TestRequest::get()
        .uri("/api/posts?q=babbage")
        .to_request();
    let none: Value = test::call_and_read_body_json(&app, req).await;
    assert!(none.as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn test_search_hit_on_several_fields_is_not_duplicated() {
    let h = Harness::new();
    let app = app!(h);
    let (_, grace) = h.user("Grace", "Hopper").await;

    create!(app, grace, post_body("Grace notes", "Grace under pressure"));

    let req = test::TestRequest::get()
        .uri("/api/posts?q=grace")
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn test_pagination() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;

    for n in 1..=5 {
        create!(
            app,
            alice,
            json!({
                "title": format!("Post {n}"),
                "content": "body",
                "publish": format!("2024-05-0{n}T00:00:00Z"),
            })
        );
    }

    let req = test::TestRequest::get()
        .uri("/api/posts?page=2&page_size=2")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("X-Total-Count").unwrap(), "5");
    let page: Value = test::read_body_json(resp).await;
    let titles: Vec<_> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Post 3", "Post 2"]);

    let req = test::TestRequest::get()
        .uri("/api/posts?page=0")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/posts?page=abc")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_page_far_past_the_end_is_empty() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;
    create!(app, alice, post_body("Only", "one"));

    for uri in [
        "/api/posts?page=9223372036854775809&page_size=2",
        "/api/posts?page=18446744073709551615",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert_eq!(resp.headers().get("X-Total-Count").unwrap(), "1");
        let body: Value = test::read_body_json(resp).await;
        assert!(body.as_array().unwrap().is_empty(), "{uri}");
    }
}

#[actix_rt::test]
async fn test_search_terms() {
    let h = Harness::new();
    let app = app!(h);
    let (_, ada) = h.user("Ada", "Lovelace").await;

    create!(app, ada, post_body("Rust async runtimes", "Tokio and friends"));
    create!(app, ada, post_body("Rust macros", "Declarative and procedural"));

    let titles = |body: Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap().to_string())
            .collect()
    };

    let req = test::TestRequest::get()
        .uri("/api/posts?search=rust%20TOKIO")
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(titles(found), ["Rust async runtimes"]);

    // Author names are only searched by `q`.
    let req = test::TestRequest::get()
        .uri("/api/posts?search=lovelace")
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert!(titles(found).is_empty());

    let req = test::TestRequest::get()
        .uri("/api/posts?q=lovelace&search=macros")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("X-Total-Count").unwrap(), "1");
    let found: Value = test::read_body_json(resp).await;
    assert_eq!(titles(found), ["Rust macros"]);
}

#[actix_rt::test]
async fn test_patch_rejects_explicit_null() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;
    let created = create!(app, alice, post_body("Hello", "World"));
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/posts/{id}/edit"))
        .insert_header((header::AUTHORIZATION, alice))
        .set_json(json!({ "title": null }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(resp).await;
    assert_eq!(problem["detail"], "title: This field may not be null.");

    let req = test::TestRequest::get()
        .uri(&format!("/api/posts/{id}"))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["title"], "Hello");
}

#[actix_rt::test]
async fn test_update_checks() {
    let h = Harness::new();
    let app = app!(h);
    let (alice_id, alice) = h.user("Alice", "Archer").await;
    let created = create!(app, alice, post_body("Hello", "World"));
    let id = created["id"].as_str().unwrap().to_string();

    // Missing post wins over everything else.
    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{}/edit", Uuid::new_v4()))
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(post_body("A", "B"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    // Anonymous callers never pass the ownership policy.
    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{id}/edit"))
        .set_json(post_body("A", "B"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    // PUT needs every field.
    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{id}/edit"))
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .set_json(json!({ "title": "Only title" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{id}/edit"))
        .insert_header((header::AUTHORIZATION, alice))
        .set_json(json!({
            "title": "Replaced",
            "content": "Everything",
            "publish": "2025-01-01T00:00:00Z",
            "user": Uuid::new_v4(),
        }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["title"], "Replaced");
    assert_eq!(updated["publish"], "2025-01-01T00:00:00Z");

    let post = h
        .state
        .posts
        .find_by_id(id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.user_id, alice_id);
    assert_eq!(post.slug, "hello");
}

#[actix_rt::test]
async fn test_delete_by_owner() {
    let h = Harness::new();
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;
    let (_, bob) = h.user("Bob", "Baker").await;
    let created = create!(app, alice, post_body("Hello", "World"));
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}/delete"))
        .insert_header((header::AUTHORIZATION, bob))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}/delete"))
        .insert_header((header::AUTHORIZATION, alice.clone()))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api/posts/{id}"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}/delete"))
        .insert_header((header::AUTHORIZATION, alice))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_rt::test]
async fn test_open_delete_policy() {
    let h = Harness::with_settings(PostSettings {
        delete_policy: DeletePolicy::Open,
        ..PostSettings::default()
    });
    let app = app!(h);
    let (_, alice) = h.user("Alice", "Archer").await;
    let created = create!(app, alice, post_body("Hello", "World"));

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/posts/{}/delete",
            created["id"].as_str().unwrap()
        ))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );
}

#[actix_rt::test]
async fn test_register_login_me() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "Ada@Example.com",
            "password": "correct horse",
            "first_name": "Ada",
            "last_name": "Lovelace",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "email": "ada@example.com", "password": "another one" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CONFLICT
    );

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "wrong pass" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "correct horse" }))
        .to_request();
    let auth: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(auth["token_type"], "Bearer");
    let token = auth["access_token"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["last_name"], "Lovelace");
}

#[actix_rt::test]
async fn test_health_in_memory() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let health: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(health["status"], "ok");
    assert_eq!(health["storage"], "in-memory");
}
