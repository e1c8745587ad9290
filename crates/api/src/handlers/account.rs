use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

use market_core::model::{PublicProfile, User};
use services::{AccountProfile, AccountServiceError};

use crate::auth::AuthUser;
use crate::context::ApiState;
use crate::envelope::ok;
use crate::error::ApiError;
use crate::handlers::ApiResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignType {
    #[default]
    Local,
    Sso,
}

#[derive(Debug, Deserialize)]
pub struct SignBody {
    #[serde(rename = "type", default)]
    pub kind: SignType,
    pub email: Option<String>,
    pub password: Option<String>,
    pub provider: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckBody {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub registered: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(alias = "avatar")]
    pub picture: Option<String>,
}

/// `POST /sign`
pub async fn sign(
    State(state): State<ApiState>,
    body: Result<Json<SignBody>, JsonRejection>,
) -> ApiResult<SignResponse> {
    let Json(body) = body?;
    if body.kind == SignType::Sso {
        // no identity provider is configured
        tracing::debug!(
            provider = body.provider.as_deref(),
            has_token = body.token.is_some(),
            "sso sign-in refused"
        );
        return Err(ApiError::Unauthorized("Invalid sso provider".into()));
    }

    let (Some(email), Some(password)) = (body.email.as_deref(), body.password.as_deref()) else {
        return Err(ApiError::BadRequest("email and password are required".into()));
    };
    let user = state
        .services
        .accounts()
        .authenticate(email, password)
        .await?;
    let token = state.tokens.issue(user.id)?;
    tracing::info!(user_id = %user.id, "signed in");
    Ok(ok(SignResponse { token }))
}

/// `POST /user/check`
pub async fn check(
    State(state): State<ApiState>,
    body: Result<Json<CheckBody>, JsonRejection>,
) -> ApiResult<CheckResponse> {
    let Json(body) = body?;
    let registered = state.services.accounts().check(&body.email).await?;
    Ok(ok(CheckResponse { registered }))
}

/// `POST /user/register`
pub async fn register(
    State(state): State<ApiState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> ApiResult<User> {
    let Json(body) = body?;
    let user = state
        .services
        .accounts()
        .register(&body.name, &body.email, &body.password, body.picture)
        .await?;
    Ok(ok(user))
}

/// `GET /user/profile`
pub async fn profile(
    State(state): State<ApiState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<AccountProfile> {
    match state.services.accounts().profile(user_id).await {
        Ok(profile) => Ok(ok(profile)),
        Err(AccountServiceError::UserNotFound) => {
            Err(ApiError::NotFound("Profile not found".into()))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /profile/{userIdentifier}`
pub async fn public_profile(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
) -> ApiResult<PublicProfile> {
    let profile = state.services.catalog().public_profile(&identifier).await?;
    Ok(ok(profile))
}
