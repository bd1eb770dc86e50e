use crate::aggregator::parse_confidence;
use crate::error::AppError;
use crate::identity::ClientIdentity;
use crate::render;
use crate::startup::AppState;
use axum::{
    Form, Json,
    extract::Extension,
    response::{Html, IntoResponse},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct VoteForm {
    #[serde(default)]
    pub confidence: String,
}

/// Current bar as an HTML fragment.
pub async fn get_bar(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let state = app_state.aggregator.aggregate().await?;
    Ok(Html(render::bar(&state)))
}

pub async fn get_aggregate(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let state = app_state.aggregator.aggregate().await?;
    Ok(Json(state))
}

/// Records the caller's confidence vote and answers with the updated bar.
pub async fn vote(
    Extension(app_state): Extension<AppState>,
    ClientIdentity(identity): ClientIdentity,
    Form(payload): Form<VoteForm>,
) -> Result<impl IntoResponse, AppError> {
    let value = parse_confidence(&payload.confidence)?;

    let state = app_state.aggregator.submit_vote(&identity, value).await?;

    Ok(Html(render::bar(&state)))
}
