// ============================================================
// Data Pipeline
// ============================================================
// Everything from a raw data source to model-ready tensor
// batches. The pipeline flows in this order:
//
//   source (records / .xlsx / .csv / .jsonl)
//       │
//       ▼
//   ingest            → content-type dispatch, one Record shape
//       │
//       ▼
//   preprocessor      → whitespace / control-char cleanup
//       │
//       ▼
//   chunker           → (LM only) windows over long documents
//       │
//       ▼
//   splitter          → validity column or seeded random split
//       │
//       ▼
//   dataset           → implements Burn's Dataset trait
//       │
//       ▼
//   batcher           → tokenizes at batch time into tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Each module is responsible for exactly one step.

/// Content-type dispatch over spreadsheet / CSV / JSONL readers
pub mod ingest;

/// Cleans and normalises raw text fields
pub mod preprocessor;

/// Splits long documents into overlapping word windows
pub mod chunker;

/// Validity-column or seeded random train/validation split
pub mod splitter;

/// Implements Burn's Dataset trait over raw task items
pub mod dataset;

/// Language-modeling label strategies (causal shift, masking)
pub mod lm_strategy;

/// Implements Burn's Batcher trait: tokenize + pad at batch time
pub mod batcher;
