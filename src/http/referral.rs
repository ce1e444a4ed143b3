use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::config::MAX_TREE_DEPTH;
use crate::error::PremiumError;
use crate::models::referral::{ReferralTreeView, RewardBalancesView};
use crate::state::AppState;

use super::{HttpError, parse_wallet};

const DEFAULT_TREE_DEPTH: u32 = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{wallet}/tree", get(get_tree))
        .route("/{wallet}/rewards", get(get_rewards))
}

#[derive(Debug, Deserialize)]
struct TreeQuery {
    depth: Option<u32>,
}

async fn get_tree(
    Path(wallet): Path<String>,
    Query(query): Query<TreeQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReferralTreeView>, HttpError> {
    let wallet = parse_wallet(&wallet)?;
    let depth = query.depth.unwrap_or(DEFAULT_TREE_DEPTH);
    if depth > MAX_TREE_DEPTH {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("Tree depth must be between 0 and {MAX_TREE_DEPTH}"),
        ));
    }
    let tree = state.referral.build_tree(&wallet, depth).await?;
    Ok(Json(ReferralTreeView::from(&tree)))
}

async fn get_rewards(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RewardBalancesView>, HttpError> {
    let wallet = parse_wallet(&wallet)?;
    let rewards = state
        .gateway
        .get_reward_balances(&wallet)
        .await
        .map_err(PremiumError::from)?;
    Ok(Json(RewardBalancesView::new(&wallet, rewards)))
}
