use crate::error::AppError;
use crate::render;
use crate::startup::AppState;
use axum::{
    Form, Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionForm {
    #[serde(default)]
    pub question: String,
}

pub async fn list_questions(
    Extension(app_state): Extension<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = match query.page.as_deref() {
        None => 1,
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|e| AppError::InvalidInput(format!("Error parsing page: {e}")))?,
    };

    let questions = app_state.questions.list(page).await?;

    Ok(Html(render::question_page(&questions, page)))
}

pub async fn ask_question(
    Extension(app_state): Extension<AppState>,
    Form(payload): Form<QuestionForm>,
) -> Result<impl IntoResponse, AppError> {
    app_state.questions.ask(&payload.question).await?;

    Ok(StatusCode::ACCEPTED)
}

pub async fn delete_question(
    Extension(app_state): Extension<AppState>,
    Form(payload): Form<QuestionForm>,
) -> Result<impl IntoResponse, AppError> {
    let removed = app_state.questions.delete(&payload.question).await?;

    Ok((StatusCode::OK, Json(json!({ "removed": removed }))))
}
