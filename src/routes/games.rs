use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{dto::game::GameSummary, error::AppError, services::game_service, state::SharedState};

/// Session discovery endpoints for lobby clients.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games))
        .route("/games/{id}", get(get_game))
}

#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    responses((status = 200, description = "Joinable sessions", body = [GameSummary]))
)]
/// Return every session currently known to the registry.
pub async fn list_games(State(state): State<SharedState>) -> Json<Vec<GameSummary>> {
    Json(game_service::available_games(&state))
}

#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session summary", body = GameSummary),
        (status = 404, description = "Unknown session id")
    )
)]
/// Return the summary of a single session.
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameSummary>, AppError> {
    let Some(session) = state.sessions().get(&id) else {
        return Err(AppError::NotFound(format!("game session `{id}` not found")));
    };

    Ok(Json(GameSummary {
        id: session.id().to_string(),
        name: session.name().to_string(),
        in_progress: session.is_in_progress(),
        player_count: session.player_count(),
    }))
}
