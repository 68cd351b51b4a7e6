use serde::Serialize;

use crate::pipeline::PipelineOutput;

// ── Response types ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub status: &'static str,
    pub data: PipelineOutput,
}
