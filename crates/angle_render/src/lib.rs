//! Multi-angle rendering of a single source image.
//!
//! One run renders the subject from every azimuth preset at the current
//! elevation and distance. Views are submitted to an external render service
//! with bounded concurrency; queued jobs are polled until they resolve. Every
//! run is stamped with an epoch, and results from a superseded run are dropped
//! instead of being applied.
//!
//! ```text
//! AngleRenderer ─ start_run ─▶ RunBoard::begin (epoch + 1, all views queued)
//!        │
//!        └─ run_bounded(ceiling) ─▶ ViewTask ─▶ submit_view ─┬─ inline images
//!                                                           └─ job id ─▶ poll_job
//! ```

pub mod api;
pub mod board;
pub mod config;
pub mod display;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod orchestrator;
pub mod poll;
pub mod presets;
pub mod prompt;
pub mod runner;
pub mod submit;
pub mod view;

pub use api::{HttpRenderApi, RenderApi, RenderEndpoints, SubmitRequest};
pub use board::{AngleResult, RunBoard, RunPhase, RunSnapshot, RunToken, ViewStatus};
pub use config::{PollConfig, RenderConfig, RenderParams};
pub use display::displayed_index;
pub use error::RenderError;
pub use metrics::RenderMetrics;
pub use orchestrator::{AngleRenderer, RunHandle, RunRequest};
pub use prompt::build_prompt;
pub use submit::{Rendered, Submission};
pub use view::AngleView;

use base64::Engine;

/// Encodes raw upload bytes as a data URL the render service accepts.
pub fn image_data_url(bytes: &[u8], mime: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_from_bytes() {
        assert_eq!(image_data_url(b"ABC", "image/jpeg"), "data:image/jpeg;base64,QUJD");
    }
}
