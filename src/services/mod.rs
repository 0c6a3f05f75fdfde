/// Joinable room listing.
pub mod directory_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Ordered session change feeds and callback subscriptions.
pub mod session_feed;
/// Session lifecycle operations: create, join, move.
pub mod session_service;
/// Server-Sent Events bridge for session feeds.
pub mod sse_service;
