use crate::metrics::Metrics;
use angle_render::AngleRenderer;
use persona_chat::ChatService;
use std::sync::Arc;

/// Shared handles passed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<AngleRenderer>,
    pub chat: Arc<ChatService>,
    pub metrics: Arc<Metrics>,
}
