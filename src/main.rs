use std::sync::Arc;

use axum::{
    http::Method, middleware, Router
};
use clap::Parser;
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use model::{store::SqliteStore, ModelController};
use routes::mw_auth;
use server::Args;
use tokio::net::TcpListener;
use tools::{auth::TokenVerifier, image_source::StorageImageSource, log::{init_tracing, log_info, LogServiceType}, recognition::load_face_detector};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
pub use self::error::{Result, Error};

mod model;
mod routes;
mod error;
mod tools;
mod server;
mod domain;


#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = server::initialize_config(&args).await?;
    init_tracing(&loaded.config.log_level);

    log_info(LogServiceType::Register, "Starting facetrail server".to_string());
    log_info(LogServiceType::Register, format!("LocalPath: {:?}", loaded.local_path));
    if loaded.secret_generated {
        log_info(LogServiceType::Register, "Generated a new token secret".to_string());
    }

    let store = SqliteStore::open(&loaded.database_path()).await?;
    let detector = load_face_detector(&loaded.models_path(), loaded.config.faces.min_detection_confidence);
    let images = StorageImageSource::new(loaded.images_path());
    let mc = ModelController::new(store, detector, Arc::new(images), loaded.config.faces.clone());
    let verifier = TokenVerifier::new(&loaded.token_secret()?);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", loaded.config.port)).await?;
    log_info(LogServiceType::Register, format!("->> LISTENING on {:?}", listener.local_addr()));

    axum::serve(listener, app(mc, verifier)).await?;

	Ok(())
}


fn app(mc: ModelController, verifier: TokenVerifier) -> Router {
    let cors: CorsLayer = CorsLayer::new()
    .allow_methods(vec![Method::GET, Method::PATCH, Method::HEAD, Method::OPTIONS, Method::POST])
    .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
    // allow requests from any origin
    .allow_origin(Any);

    Router::new()
        .nest("/ping", routes::ping::routes())
        .nest("/faces", routes::faces::routes(mc.clone()))
        .nest("/photos", routes::photos::routes(mc))
        .layer(middleware::from_fn_with_state(verifier, mw_auth::mw_token_resolver))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `call`, `oneshot`, and `ready`

    use crate::model::test_support::{add_face, add_photo, controller};

    const SECRET: &str = "test-secret";

    async fn test_app() -> (Router, ModelController) {
        let mc = controller().await;
        (app(mc.clone(), TokenVerifier::new(SECRET)), mc)
    }

    fn bearer(user_id: &str) -> String {
        format!("Bearer {}", TokenVerifier::new(SECRET).sign(user_id).unwrap())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn json() {
        let (app, _) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(http::Method::GET)
                    .uri("/ping")
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .header(http::header::ORIGIN, "http://localhost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*",
        );
        let body = body_json(response).await;
        assert_eq!(body, json!({ "result": {"success": true} }));
    }

    #[tokio::test]
    async fn not_found() {
        let (app, _) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn faces_need_a_token() {
        let (app, _) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/faces/persons")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "NO_AUTH");
        assert!(body["error"]["req_uuid"].is_string());
    }

    #[tokio::test]
    async fn bad_token_is_rejected() {
        let (app, _) = test_app().await;
        let forged = format!("Bearer {}", TokenVerifier::new("other").sign("u1").unwrap());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/photos/people")
                    .header(http::header::AUTHORIZATION, forged)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn foreign_photo_is_not_found() {
        let (app, mc) = test_app().await;
        add_photo(&mc, "p1", "u1", None).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/faces/photo/p1")
                    .header(http::header::AUTHORIZATION, bearer("u2"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn assign_person_cascades() {
        let (app, mc) = test_app().await;
        add_photo(&mc, "p1", "u1", None).await;
        add_photo(&mc, "p2", "u1", None).await;
        add_face(&mc, "d1", "p1", vec![0.0, 0.0, 0.0, 0.0]).await;
        add_face(&mc, "d2", "p2", vec![0.3, 0.0, 0.0, 0.0]).await;

        let response = app.clone()
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri("/faces/assign-person")
                    .header(http::header::AUTHORIZATION, bearer("u1"))
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(
                        serde_json::to_vec(&json!({"descriptorIds": ["d1"], "personName": "Maria"})).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["person"]["name"], "Maria");
        assert_eq!(body["updated"], 1);
        assert_eq!(body["totalPhotoTagsUpdated"], 2);
        assert_eq!(body["autoAssignment"]["newlyAssigned"], 1);
        assert_eq!(body["autoAssignment"]["assignedDescriptorIds"], json!(["d2"]));
        assert_eq!(body["autoAssignment"]["assignedPhotos"][0]["id"], "p2");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/photos/people")
                    .header(http::header::AUTHORIZATION, bearer("u1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!(["Maria"]));
    }

    #[tokio::test]
    async fn empty_name_is_invalid() {
        let (app, _) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri("/faces/assign-person")
                    .header(http::header::AUTHORIZATION, bearer("u1"))
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(
                        serde_json::to_vec(&json!({"descriptorIds": [], "personName": "  "})).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cluster_without_body() {
        let (app, mc) = test_app().await;
        add_photo(&mc, "p1", "u1", None).await;
        add_face(&mc, "a", "p1", vec![0.0, 0.0]).await;
        add_face(&mc, "b", "p1", vec![0.1, 0.0]).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri("/faces/cluster")
                    .header(http::header::AUTHORIZATION, bearer("u1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["clusters"], 1);
        assert_eq!(body["groups"][0]["id"], "cluster-0");
        assert_eq!(body["groups"][0]["count"], 2);
        assert_eq!(body["groups"][0]["faces"][1]["photo"]["id"], "p1");
    }
}
