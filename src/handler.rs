//! Serverless trigger entry point
//!
//! The scheduled-event surface: the hosting platform calls this once a
//! day with an opaque event payload, which is ignored. The run always
//! covers yesterday UTC. Errors propagate to the caller so the platform's
//! own failure tracking surfaces them.

use serde::Serialize;
use tracing::info;

use crate::error::EtlResult;
use crate::pipeline::{Pipeline, PipelineOptions, RunSummary};
use crate::window::ProcessingWindow;

/// Success payload returned to the hosting platform.
#[derive(Debug, Serialize)]
pub struct HandlerResponse {
    pub status: &'static str,
    pub summary: RunSummary,
}

/// Run the pipeline for yesterday UTC in response to a scheduled event.
pub async fn handle_scheduled_event(
    pipeline: &Pipeline,
    event: serde_json::Value,
) -> EtlResult<HandlerResponse> {
    info!(event = %event, "Scheduled event received");

    let window = ProcessingWindow::yesterday_utc();
    let summary = pipeline.run(window, PipelineOptions::default()).await?;

    Ok(HandlerResponse {
        status: "success",
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_serializes_with_status() {
        use crate::pipeline::Stage;
        use std::collections::BTreeMap;

        let window = ProcessingWindow::parse("2024-03-05").unwrap();
        let response = HandlerResponse {
            status: "success",
            summary: RunSummary {
                window_start: window.start(),
                window_end: window.end(),
                source_rows: 0,
                dimensions: Default::default(),
                facts: Default::default(),
                mart_rows: BTreeMap::new(),
                export: None,
                stage: Stage::Done,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json["summary"]["window_start"].is_string());
    }
}
