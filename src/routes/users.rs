use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{auth, error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Credentials {
    username: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<Credentials>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user = auth::register_user(&state, &form.username, &form.password).await?;
    let token = auth::mint_token(&state.token_key, &user.username)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "username": user.username,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(form): Json<Credentials>,
) -> Result<Json<Value>, AppError> {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".into(),
        ));
    }
    let user = auth::authenticate_user(&state, &form.username, &form.password).await?;
    let token = auth::mint_token(&state.token_key, &user.username)?;
    Ok(Json(json!({
        "success": true,
        "token": token,
        "username": user.username,
    })))
}
