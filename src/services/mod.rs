/// Moderator operations: navigation, score edits, session lifecycle.
pub mod admin_service;
/// Audio cue capability and its SSE-backed implementation.
pub mod audio;
/// Signal intake and point awards.
pub mod buzzer_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Read-only views for the displays.
pub mod public_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Per-round statistics and CSV export.
pub mod statistics;
/// Countdown scheduling.
pub mod timer_service;
/// WebSocket signal gateway handling.
pub mod websocket_service;
