use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::address::sanitize_profile_id;
use crate::models::premium::{
    AutoLinkView, PremiumLinkView, ProfilePremiumView, RejectionView, UserStatusView,
};
use crate::state::AppState;

use super::{HttpError, parse_wallet};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{wallet}/status", get(get_status))
        .route("/{wallet}/profiles/{profile_id}", get(get_profile_premium))
        .route("/{wallet}/rejection", get(get_rejection))
        .route("/{wallet}/link", post(link_profile).delete(unlink_profile))
        .route("/{wallet}/auto-link", post(auto_link))
}

async fn get_status(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UserStatusView>, HttpError> {
    let wallet = parse_wallet(&wallet)?;
    let report = state.status.get_user_status(&wallet).await?;
    Ok(Json(UserStatusView::new(wallet.to_string(), report)))
}

async fn get_profile_premium(
    Path((wallet, profile_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ProfilePremiumView>, HttpError> {
    let wallet = parse_wallet(&wallet)?;
    let profile_id = parse_profile_id(&profile_id)?;
    let is_premium = state.status.is_profile_premium(&wallet, &profile_id).await?;
    Ok(Json(ProfilePremiumView {
        wallet_address: wallet.to_string(),
        profile_id,
        is_premium,
    }))
}

async fn get_rejection(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RejectionView>, HttpError> {
    let wallet = parse_wallet(&wallet)?;
    let message = state.status.get_premium_rejection_message(&wallet).await?;
    Ok(Json(RejectionView {
        wallet_address: wallet.to_string(),
        message,
    }))
}

async fn link_profile(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<LinkRequest>,
) -> Result<(StatusCode, Json<PremiumLinkView>), HttpError> {
    let wallet = parse_wallet(&wallet)?;
    let profile_id = parse_profile_id(&payload.profile_id)?;
    let link = state.linking.link_profile(&wallet, &profile_id).await?;
    Ok((StatusCode::CREATED, Json(PremiumLinkView::from(&link))))
}

async fn auto_link(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AutoLinkView>, HttpError> {
    let wallet = parse_wallet(&wallet)?;
    let link = state.linking.auto_link_first_profile(&wallet).await?;
    Ok(Json(AutoLinkView {
        wallet_address: wallet.to_string(),
        link: link.as_ref().map(PremiumLinkView::from),
    }))
}

async fn unlink_profile(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    let wallet = parse_wallet(&wallet)?;
    state.linking.unlink_profile(&wallet).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_profile_id(raw: &str) -> Result<String, HttpError> {
    sanitize_profile_id(raw).ok_or_else(|| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            "Profile id must be a non-empty identifier".to_string(),
        )
    })
}

#[derive(Debug, Deserialize)]
struct LinkRequest {
    profile_id: String,
}
