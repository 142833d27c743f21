/// OpenAPI documentation generation.
pub mod documentation;
/// Core session engine orchestration: joins, starts, answers, timers.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
