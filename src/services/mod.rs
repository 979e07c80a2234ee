/// Best-effort event delivery to session groups.
pub mod broadcast;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Identity collaborator for attaching user ids to joins.
pub mod identity;
/// Timer-driven phase transitions and session reclamation.
pub mod orchestrator;
/// Inbound sprint operations over the registry.
pub mod sprint_service;
/// Result store connection supervision.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
