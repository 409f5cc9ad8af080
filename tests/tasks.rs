// End-to-end scenarios over the task assemblers, on the
// ndarray backend with tiny fixture checkpoints.

mod support;

use burn::data::dataloader::batcher::Batcher;
use std::io::Write;

use text_tune::application::language_modeling::{LanguageModelTask, LmOptions};
use text_tune::application::summarization::{SummarizationTask, SummarizerOptions};
use text_tune::data::ingest::DataSource;
use text_tune::domain::arch::{ArchFamily, LmKind};
use text_tune::domain::record::Record;
use text_tune::error::TaskError;
use text_tune::ml::resolver::ResolverConfig;
use text_tune::ml::trainer::FitConfig;

type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
type InnerBackend = burn::backend::NdArray;

fn device() -> burn::backend::ndarray::NdArrayDevice {
    Default::default()
}

fn quiet() -> ResolverConfig {
    ResolverConfig { quiet: true }
}

fn summary_records() -> Vec<Record> {
    [
        ("the big dog ran fast every night", "dog ran fast"),
        ("the cat sat on the mat all summer", "cat sat on mat"),
        ("city lights make people happy at night", "city lights make happy"),
        ("summer days are long and warm", "summer days are warm"),
    ]
    .into_iter()
    .map(|(text, summary)| Record::from_pairs([("text", text), ("summary", summary)]))
    .collect()
}

fn text_records() -> Vec<Record> {
    [
        "the big dog ran fast",
        "the cat sat on the mat",
        "city lights make people happy",
        "summer days are long and warm",
        "the capital of france is paris",
        "a short story about animals",
    ]
    .into_iter()
    .map(|text| Record::from_pairs([("text", text)]))
    .collect()
}

fn fast_fit(batch_size: usize) -> FitConfig {
    FitConfig {
        epochs: 1,
        batch_size,
        lr: 1e-3,
        freeze_epochs: 0,
        seed: 42,
    }
}

// ─── Scenario 1: summarization pipeline shapes ────────────────────────────────

#[test]
fn summarization_batches_have_configured_shapes() {
    let fixture = support::seq2seq_model_dir();
    let options = SummarizerOptions {
        max_length: 16,
        max_target_length: 8,
        fit: fast_fit(2),
        ..SummarizerOptions::default()
    };

    let task = SummarizationTask::<TrainBackend>::from_data(
        DataSource::Records(summary_records()),
        fixture.path(),
        options,
        quiet(),
        &device(),
    )
    .unwrap();

    assert_eq!(task.arch, ArchFamily::Bart);
    assert_eq!(task.train_items().len() + task.valid_items().len(), 4);

    let items = task.train_items().to_vec();
    let batch_size = items.len();
    let batch = task.batcher::<InnerBackend>(device()).batch(items, &device());

    assert_eq!(batch.source_ids.dims(), [batch_size, 16]);
    assert_eq!(batch.source_mask.dims(), [batch_size, 16]);
    assert_eq!(batch.decoder_input_ids.dims(), [batch_size, 8]);
    assert_eq!(batch.labels.dims(), [batch_size, 8]);
}

#[test]
fn summarization_gen_kwargs_filtered_from_checkpoint_defaults() {
    let fixture = support::seq2seq_model_dir();
    let task = SummarizationTask::<TrainBackend>::from_data(
        DataSource::Records(summary_records()),
        fixture.path(),
        SummarizerOptions {
            fit: fast_fit(2),
            ..SummarizerOptions::default()
        },
        quiet(),
        &device(),
    )
    .unwrap();

    // checkpoint defaults survive only where the generate
    // routine accepts them; num_beams et al are silently gone
    let kwargs = task.gen_kwargs();
    assert_eq!(kwargs.usize_value("max_length"), Some(24));
    assert_eq!(kwargs.usize_value("min_length"), Some(2));
    assert!(!kwargs.contains("num_beams"));
    assert!(!kwargs.contains("early_stopping"));
    assert!(!kwargs.contains("length_penalty"));
}

#[test]
fn summarize_returns_one_result_per_input() {
    let fixture = support::seq2seq_model_dir();
    let task = SummarizationTask::<TrainBackend>::from_data(
        DataSource::Records(summary_records()),
        fixture.path(),
        SummarizerOptions {
            max_length: 16,
            max_target_length: 8,
            fit: fast_fit(2),
            ..SummarizerOptions::default()
        },
        quiet(),
        &device(),
    )
    .unwrap();

    let results = task
        .summarize(&["the cat sat on the mat", "summer days are warm"], None)
        .unwrap();
    assert_eq!(results.len(), 2);
}

// ─── Scenario 2: pad-token fixup ──────────────────────────────────────────────

#[test]
fn masked_lm_without_pad_token_gets_one_registered() {
    let fixture = support::masked_model_dir_without_pad();
    let original_vocab = fixture.vocab_size;

    let task = LanguageModelTask::<TrainBackend>::from_data(
        DataSource::Records(text_records()),
        fixture.path(),
        LmKind::Masked,
        LmOptions {
            max_length: 16,
            fit: fast_fit(2),
            ..LmOptions::default()
        },
        quiet(),
        &device(),
    )
    .unwrap();

    let pad_id = task.tokenizer().pad_id().expect("pad token was registered");
    assert_eq!(task.tokenizer().token_to_id("<pad>"), Some(pad_id));
    assert_eq!(task.spec().pad_token_id, Some(pad_id));

    // the embedding table grew to cover the new vocabulary entry
    assert_eq!(task.tokenizer().vocab_size(), original_vocab + 1);
    assert_eq!(task.model().vocab_size(), original_vocab + 1);
}

// ─── Scenario 3: mask filling ─────────────────────────────────────────────────

#[test]
fn fill_mask_returns_k_candidates_with_only_the_mask_replaced() {
    let fixture = support::masked_model_dir_without_pad();
    let task = LanguageModelTask::<TrainBackend>::from_data(
        DataSource::Records(text_records()),
        fixture.path(),
        LmKind::Masked,
        LmOptions {
            max_length: 16,
            fit: fast_fit(2),
            ..LmOptions::default()
        },
        quiet(),
        &device(),
    )
    .unwrap();

    let candidates = task
        .fill_mask("The capital of France is [MASK].", 3)
        .unwrap();

    assert_eq!(candidates.len(), 3);
    for candidate in &candidates {
        assert!(!candidate.contains("[MASK]"), "mask survives in '{candidate}'");
        assert!(
            candidate.starts_with("The capital of France is"),
            "prefix altered in '{candidate}'"
        );
        assert!(candidate.ends_with('.'), "suffix altered in '{candidate}'");
    }
}

#[test]
fn fill_mask_without_mask_token_in_input_is_invalid() {
    let fixture = support::masked_model_dir_without_pad();
    let task = LanguageModelTask::<TrainBackend>::from_data(
        DataSource::Records(text_records()),
        fixture.path(),
        LmKind::Masked,
        LmOptions {
            fit: fast_fit(2),
            ..LmOptions::default()
        },
        quiet(),
        &device(),
    )
    .unwrap();

    let err = task.fill_mask("no mask here", 3).unwrap_err();
    assert!(matches!(err, TaskError::Invalid(_)));
}

// ─── Resolution failures ──────────────────────────────────────────────────────

#[test]
fn summarization_rejects_a_masked_lm_checkpoint() {
    let fixture = support::masked_model_dir_without_pad();
    let err = SummarizationTask::<TrainBackend>::from_data(
        DataSource::Records(summary_records()),
        fixture.path(),
        SummarizerOptions::default(),
        quiet(),
        &device(),
    )
    .unwrap_err();
    assert!(matches!(err, TaskError::Resolution { .. }));
}

#[test]
fn missing_model_directory_is_a_resolution_error() {
    let err = SummarizationTask::<TrainBackend>::from_data(
        DataSource::Records(summary_records()),
        "no/such/model/dir",
        SummarizerOptions::default(),
        quiet(),
        &device(),
    )
    .unwrap_err();
    assert!(matches!(err, TaskError::Resolution { .. }));
}

#[test]
fn unsupported_source_content_type_is_rejected() {
    let fixture = support::seq2seq_model_dir();
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "text,summary").unwrap();

    let err = SummarizationTask::<TrainBackend>::from_data(
        DataSource::Path(file.path().to_path_buf()),
        fixture.path(),
        SummarizerOptions::default(),
        quiet(),
        &device(),
    )
    .unwrap_err();
    assert!(matches!(err, TaskError::UnsupportedFormat { .. }));
}

// ─── Validity-column split through the assembler ──────────────────────────────

#[test]
fn validity_column_drives_the_split() {
    let fixture = support::causal_model_dir();
    let mut records = text_records();
    records[1].insert("is_valid", true);
    records[4].insert("is_valid", true);

    let task = LanguageModelTask::<TrainBackend>::from_data(
        DataSource::Records(records),
        fixture.path(),
        LmKind::Causal,
        LmOptions {
            max_length: 16,
            fit: fast_fit(2),
            ..LmOptions::default()
        },
        quiet(),
        &device(),
    )
    .unwrap();

    assert_eq!(task.train_items().len(), 4);
    assert_eq!(task.valid_items().len(), 2);
    assert!(task
        .valid_items()
        .iter()
        .any(|item| item.text.contains("capital of france")));
}

// ─── Fit smoke test: causal LM, one epoch ─────────────────────────────────────

#[test]
fn causal_lm_fit_writes_checkpoint_and_metrics() {
    let fixture = support::causal_model_dir();
    let checkpoints = tempfile::tempdir().unwrap();

    let task = LanguageModelTask::<TrainBackend>::from_data(
        DataSource::Records(text_records()),
        fixture.path(),
        LmKind::Causal,
        LmOptions {
            max_length: 12,
            fit: fast_fit(3),
            ..LmOptions::default()
        },
        quiet(),
        &device(),
    )
    .unwrap();

    // gpt2-style tokenizer ships no pad token; the fixup runs
    assert!(task.tokenizer().pad_id().is_some());

    let task = task.fit(checkpoints.path()).unwrap();
    assert!(task.model().is_causal());

    assert!(checkpoints.path().join("model_epoch_1.mpk.gz").exists());
    assert!(checkpoints.path().join("latest_epoch.json").exists());
    assert!(checkpoints.path().join("task_config.json").exists());

    let metrics = std::fs::read_to_string(checkpoints.path().join("metrics.csv")).unwrap();
    let lines: Vec<&str> = metrics.lines().collect();
    assert_eq!(lines[0], "epoch,train_loss,val_loss,lm_accuracy,perplexity");
    assert_eq!(lines.len(), 2, "one epoch logged: {metrics}");
}
