use crate::questions::{ask_question, delete_question, list_questions};
use crate::sse::live_stream;
use crate::startup::AppState;
use crate::votes::{get_aggregate, get_bar, vote};
use axum::{
    Router,
    extract::Extension,
    http::{
        StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::{Html, IntoResponse},
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn stylesheet() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/css")],
        include_str!("../static/styles.css"),
    )
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/styles.css", get(stylesheet))
        .route("/bar", get(get_bar))
        .route("/aggregate", get(get_aggregate))
        .route("/vote", post(vote))
        .route(
            "/question",
            get(list_questions)
                .post(ask_question)
                .delete(delete_question),
        )
        .route("/sse", get(live_stream))
        .layer(Extension(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_methods([
                    axum::http::Method::POST,
                    axum::http::Method::GET,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([CONTENT_TYPE, ACCEPT]),
        )
        .fallback(handler_404)
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::EventCategory;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, Response},
    };
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form(method: Method, uri: &str, ip: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-real-ip", ip)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_vote_and_revote_over_http() {
        let app = router(AppState::in_memory());

        let response = send(&app, form(Method::POST, "/vote", "1.1.1.1", "confidence=80")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Total votes: 1"));

        send(&app, form(Method::POST, "/vote", "2.2.2.2", "confidence=40")).await;
        let response = send(&app, form(Method::POST, "/vote", "1.1.1.1", "confidence=20")).await;
        let html = body_text(response).await;
        assert!(html.contains("Total votes: 2"));
        assert!(html.contains("width: 30%;"));

        let response = send(&app, get_request("/aggregate")).await;
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["mean"], 30.0);
    }

    #[tokio::test]
    async fn test_bad_votes_are_client_errors() {
        let app = router(AppState::in_memory());

        for body in ["confidence=100.01", "confidence=-0.01", "confidence=abc", ""] {
            let response = send(&app, form(Method::POST, "/vote", "1.1.1.1", body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        }

        let response = send(&app, get_request("/bar")).await;
        assert!(body_text(response).await.contains("Total votes: 0"));
    }

    #[tokio::test]
    async fn test_question_lifecycle_over_http() {
        let state = AppState::in_memory();
        let mut viewer = state.broadcaster.subscribe();
        let app = router(state);

        let response = send(&app, form(Method::POST, "/question", "1.1.1.1", "question=ping")).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = send(&app, get_request("/question?page=1")).await;
        assert!(body_text(response).await.contains(": ping</p>"));

        let response = send(&app, form(Method::DELETE, "/question", "1.1.1.1", "question=ping")).await;
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["removed"], 1);

        let response = send(&app, get_request("/question")).await;
        assert_eq!(body_text(response).await, "");

        assert_eq!(viewer.recv().await.unwrap().category, EventCategory::Question);
        assert_eq!(
            viewer.recv().await.unwrap().category,
            EventCategory::DeleteQuestion
        );
    }

    #[tokio::test]
    async fn test_question_validation() {
        let app = router(AppState::in_memory());

        let response = send(&app, form(Method::POST, "/question", "1.1.1.1", "question=")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        for uri in ["/question?page=0", "/question?page=two"] {
            let response = send(&app, get_request(uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
        }
    }

    #[tokio::test]
    async fn test_live_stream_starts_with_snapshot() {
        let state = AppState::in_memory();
        state.aggregator.submit_vote("9.9.9.9", 64.0).await.unwrap();
        let app = router(state.clone());

        let response = send(&app, get_request("/sse")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(state.broadcaster.subscriber_count(), 1);

        // Shutting down ends the stream, so the whole body can be read.
        state.broadcaster.shutdown();
        let body = body_text(response).await;
        assert!(body.starts_with("event: vote\n"));
        assert!(body.contains("Total votes: 1"));
        assert_eq!(state.broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_live_stream_releases_subscription() {
        let state = AppState::in_memory();
        let app = router(state.clone());

        let response = send(&app, get_request("/sse")).await;
        assert_eq!(state.broadcaster.subscriber_count(), 1);

        drop(response);
        assert_eq!(state.broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = router(AppState::in_memory());
        let response = send(&app, get_request("/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
