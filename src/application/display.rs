// ============================================================
// Result Display
// ============================================================
// Renders text / target / prediction triples for a handful of
// validation items. The language-modeling renderer is selected
// by the task category stored on the task object — one explicit
// switch over {causal view, masked view}, nothing dispatched on
// runtime types.
//
//   causal view — whole sequences decoded; the target and the
//     prediction cover exactly the positions that carried real
//     labels
//   masked view — token-by-token: every predicted position is
//     shown bracketed, as the mask in the input, the original
//     token in the target, and the model's choice in the
//     prediction

use crate::domain::arch::{IGNORE_INDEX, LmKind};
use crate::ml::tokenizer::TokenizerAdapter;

const TRUNCATE_AT: usize = 120;

#[derive(Debug, Clone)]
pub struct ResultRow {
    pub text:       String,
    pub target:     String,
    pub prediction: String,
}

/// Print rows in a labeled block per item.
pub fn print_rows(rows: &[ResultRow]) {
    for (index, row) in rows.iter().enumerate() {
        println!("── result {} ──────────────────────────────", index + 1);
        println!("  text:       {}", truncate_chars(&row.text, TRUNCATE_AT));
        println!("  target:     {}", truncate_chars(&row.target, TRUNCATE_AT));
        println!("  prediction: {}", truncate_chars(&row.prediction, TRUNCATE_AT));
    }
}

/// Build one display row for a language-modeling sample. The
/// single switch over the task category lives here.
pub fn lm_row(
    kind: LmKind,
    tokenizer: &TokenizerAdapter,
    input_ids: &[i64],
    pred_ids: &[i64],
    target_ids: &[i64],
    pad_id: u32,
) -> ResultRow {
    match kind {
        LmKind::Causal => causal_row(tokenizer, input_ids, pred_ids, target_ids, pad_id),
        LmKind::Masked => masked_row(tokenizer, input_ids, pred_ids, target_ids, pad_id),
    }
}

fn causal_row(
    tokenizer: &TokenizerAdapter,
    input_ids: &[i64],
    pred_ids: &[i64],
    target_ids: &[i64],
    pad_id: u32,
) -> ResultRow {
    let decode = |ids: Vec<u32>| tokenizer.decode(&ids, true).unwrap_or_default();

    let text: Vec<u32> = input_ids
        .iter()
        .map(|&id| id.max(0) as u32)
        .filter(|&id| id != pad_id)
        .collect();
    let labeled = |values: &[i64]| -> Vec<u32> {
        values
            .iter()
            .zip(target_ids.iter())
            .filter(|(_, &t)| t != IGNORE_INDEX as i64)
            .map(|(&v, _)| v.max(0) as u32)
            .collect()
    };

    ResultRow {
        text: decode(text),
        target: decode(labeled(target_ids)),
        prediction: decode(labeled(pred_ids)),
    }
}

fn masked_row(
    tokenizer: &TokenizerAdapter,
    input_ids: &[i64],
    pred_ids: &[i64],
    target_ids: &[i64],
    pad_id: u32,
) -> ResultRow {
    let token = |id: i64| tokenizer.id_to_token(id.max(0) as u32).unwrap_or_default();

    let mut text = Vec::new();
    let mut target = Vec::new();
    let mut prediction = Vec::new();

    for (position, &input_id) in input_ids.iter().enumerate() {
        if input_id.max(0) as u32 == pad_id {
            continue;
        }
        let predicted_here = target_ids[position] != IGNORE_INDEX as i64;
        if predicted_here {
            text.push(format!("[{}]", token(input_id)));
            target.push(format!("[{}]", token(target_ids[position])));
            prediction.push(format!("[{}]", token(pred_ids[position])));
        } else {
            let plain = token(input_id);
            text.push(plain.clone());
            target.push(plain.clone());
            prediction.push(plain);
        }
    }

    ResultRow {
        text: text.join(" "),
        target: target.join(" "),
        prediction: prediction.join(" "),
    }
}

/// Truncate to at most `limit` characters with an ellipsis.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{truncated}…")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefgh", 3), "abc…");
    }
}
