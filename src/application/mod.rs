// ============================================================
// Application Layer — Task Assemblers
// ============================================================
// The public construction entry points: each task type has a
// `from_data` that takes a raw data source plus a model
// directory and produces a ready-to-train task object —
// ingested and split data, resolved model and tokenizer,
// architecture policy applied, loss and metrics attached.
//
// Rules for this layer:
//   - no tensor math (that's ml)
//   - no file-format parsing (that's data)
//   - only orchestration of the other layers

// Summarization task assembly + conveniences
pub mod summarization;

// Language-modeling task assembly (causal / masked)
pub mod language_modeling;

// Result display: one switch over the task category
pub mod display;
