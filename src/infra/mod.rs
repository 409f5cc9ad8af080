// ============================================================
// Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   checkpoint.rs — model record save/load via Burn's
//                   CompactRecorder plus JSON persistence of
//                   task configurations, so inference can
//                   rebuild exactly what training produced
//
//   metrics.rs    — the per-epoch metric callbacks
//                   (reset → accumulate → finalize) and the
//                   CSV epoch log

/// Model record + config persistence
pub mod checkpoint;

/// Task metrics and the epoch CSV logger
pub mod metrics;
