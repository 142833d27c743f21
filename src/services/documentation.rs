use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Rally Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::games::list_games,
        crate::routes::games::get_game,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::GameSummary,
            crate::dto::ws::ClientAction,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::GameStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Session discovery endpoints"),
        (name = "players", description = "WebSocket operations for player clients"),
    )
)]
pub struct ApiDoc;
