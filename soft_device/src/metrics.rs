//! Read-only observability snapshot of the per-stage record counters.

use crate::stage::StageCounters;

/// Counters for every stage of the pipeline, taken at a point in time.
/// Counters are monotonic across draws; they are advisory and never feed
/// back into scheduling.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    pub vertex_shader: StageCounters,
    pub primitive_assembler: StageCounters,
    pub rasterizer: StageCounters,
    pub pixel_shader: StageCounters,
    pub output_merger: StageCounters,
}
