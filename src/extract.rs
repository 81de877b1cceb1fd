//! Recovery of form structure from the `FB_PUBLIC_LOAD_DATA_` payload embedded in the page markup.
//!
//! The payload is an unversioned third-party format: every index step is best-effort,
//! and any shape mismatch degrades to "this entry contributes nothing" rather than an error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::QuestionRecord;

/// The embedded assignment, captured up to the first closing script marker.
/// The literal spans lines and nests brackets arbitrarily.
static PAYLOAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)var\s+FB_PUBLIC_LOAD_DATA_\s*=\s*(\[.*?\]);</script>").expect("payload pattern compiles"));

/// Escaped sequences the page embeds inside the literal. It is JavaScript-string-escaped,
/// not valid JSON as-is.
const UNESCAPES: [(&str, &str); 5] = [("\\\\n", "\n"), ("\\\\u003c", "<"), ("\\\\u003e", ">"), ("\\\\u0026", "&"), ("\\\\\"", "\"")];

/// Failure to recover the embedded payload.
/// Recoverable: [`extract_questions`] degrades to an empty question list.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
	#[error("FB_PUBLIC_LOAD_DATA_ not found in page HTML")]
	NotFound,
	#[error("embedded payload is not parseable: {0}")]
	MalformedPayload(#[from] serde_json::Error),
}

/// Extract question records from a rendered form page.
/// Never raises: extraction failure is surfaced as a warning and an empty list.
pub fn extract_questions(html: &str) -> Vec<QuestionRecord> {
	match try_extract(html) {
		Ok(records) => records,
		Err(e) => {
			tracing::warn!("form extraction failed: {e}");
			Vec::new()
		}
	}
}

/// Fallible extraction, for callers that want the failure reason.
pub fn try_extract(html: &str) -> Result<Vec<QuestionRecord>, ExtractionError> {
	let captured = PAYLOAD_RE.captures(html).and_then(|c| c.get(1)).ok_or(ExtractionError::NotFound)?;
	let cleaned = clean_payload(captured.as_str());
	let data: Value = serde_json::from_str(&cleaned)?;
	Ok(collect_records(&data))
}

fn clean_payload(raw: &str) -> String {
	let mut cleaned = raw.to_string();
	for (escaped, plain) in UNESCAPES {
		cleaned = cleaned.replace(escaped, plain);
	}
	// C0 control characters are never legal in JSON strings
	cleaned.retain(|c| !matches!(c, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{1F}' | '\u{7F}'));
	cleaned
}

/// Best-effort index into an array value. Any shape mismatch yields None.
fn idx(value: &Value, i: usize) -> Option<&Value> {
	value.as_array()?.get(i)
}

/// Question entries live at data[1][1].
fn collect_records(data: &Value) -> Vec<QuestionRecord> {
	let mut records = Vec::new();
	let Some(entries) = idx(data, 1).and_then(|v| idx(v, 1)).and_then(Value::as_array) else {
		return records;
	};

	for entry in entries {
		let Some(fields) = entry.as_array() else { continue };
		if fields.len() < 2 {
			continue;
		}
		let Some(text) = fields[1].as_str() else { continue };
		let text = text.trim();
		if text.is_empty() {
			continue;
		}
		records.push(QuestionRecord::new(text, collect_options(fields.get(4))));
	}

	records
}

/// Options hide at entry[4][block][1][item][0]. A missing or misshapen slot
/// means the question takes free text.
fn collect_options(slot: Option<&Value>) -> Vec<String> {
	let mut options = Vec::new();
	let Some(blocks) = slot.and_then(Value::as_array) else {
		return options;
	};
	for block in blocks {
		let Some(items) = idx(block, 1).and_then(Value::as_array) else { continue };
		for item in items {
			if let Some(label) = idx(item, 0).and_then(Value::as_str) {
				options.push(label.to_string());
			}
		}
	}
	options
}

#[cfg(test)]
mod tests {
	use super::*;

	const CHOICE_PAGE: &str = r#"<html><script>var FB_PUBLIC_LOAD_DATA_ = [0,[0,[[0,"Color?",null,2,[[0,[["Red"],["Blue"]]]]]]]];</script></html>"#;

	#[test]
	fn extracts_a_choice_question() {
		let records = extract_questions(CHOICE_PAGE);
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].question_text, "Color?");
		assert_eq!(records[0].options, vec!["Red", "Blue"]);
		assert!(records[0].answer.is_none());
	}

	#[test]
	fn extraction_is_idempotent() {
		let first = extract_questions(CHOICE_PAGE);
		let second = extract_questions(CHOICE_PAGE);
		assert_eq!(first.len(), second.len());
		for (a, b) in first.iter().zip(second.iter()) {
			assert_eq!(a.question_text, b.question_text);
			assert_eq!(a.options, b.options);
		}
	}

	#[test]
	fn missing_marker_is_not_found() {
		let html = "<html><body>nothing here</body></html>";
		assert!(matches!(try_extract(html), Err(ExtractionError::NotFound)));
		assert!(extract_questions(html).is_empty());
	}

	#[test]
	fn malformed_literal_yields_empty_without_panicking() {
		let html = r#"<script>var FB_PUBLIC_LOAD_DATA_ = [0,[0,[[0,"broken];</script>"#;
		assert!(matches!(try_extract(html), Err(ExtractionError::MalformedPayload(_))));
		assert!(extract_questions(html).is_empty());
	}

	#[test]
	fn literal_spans_lines_and_nested_brackets() {
		let html = "<script>var FB_PUBLIC_LOAD_DATA_ = [0,\n[0,[[0,\"Pick [one]?\",null,2,\n[[0,[[\"A [x]\"],[\"B\"]]]]]]]];</script>";
		let records = extract_questions(html);
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].question_text, "Pick [one]?");
		assert_eq!(records[0].options, vec!["A [x]", "B"]);
	}

	#[test]
	fn unescapes_embedded_sequences() {
		let html = "<script>var FB_PUBLIC_LOAD_DATA_ = [0,[0,[[0,\"a \\\\u003c b?\",null,2]]]];</script>";
		let records = extract_questions(html);
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].question_text, "a < b?");
	}

	#[test]
	fn strips_control_characters() {
		let html = "<script>var FB_PUBLIC_LOAD_DATA_ = [0,[0,[[0,\"ok?\u{01}\",null,2]]]];</script>";
		let records = extract_questions(html);
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].question_text, "ok?");
	}

	#[test]
	fn drops_entries_without_usable_text() {
		// non-string text, empty-after-trim text, and too-short entries all vanish
		let html = r#"<script>var FB_PUBLIC_LOAD_DATA_ = [0,[0,[[0,7,null],[0,"   ",null],[0],[0,"Kept?",null,2]]]];</script>"#;
		let records = extract_questions(html);
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].question_text, "Kept?");
		assert!(records[0].options.is_empty());
	}

	#[test]
	fn misshapen_option_slot_contributes_nothing() {
		// entry[4] present but not the expected nesting
		let html = r#"<script>var FB_PUBLIC_LOAD_DATA_ = [0,[0,[[0,"Q?",null,2,[[0,"flat"],[0,[[7],["Real"]]]]]]]];</script>"#;
		let records = extract_questions(html);
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].options, vec!["Real"]);
	}

	#[test]
	fn unexpected_outer_shape_yields_empty() {
		let html = r#"<script>var FB_PUBLIC_LOAD_DATA_ = [0,"not the nested path"];</script>"#;
		assert!(extract_questions(html).is_empty());
	}

	#[test]
	fn question_text_is_trimmed() {
		let html = "<script>var FB_PUBLIC_LOAD_DATA_ = [0,[0,[[0,\"  padded?  \",null,2]]]];</script>";
		let records = extract_questions(html);
		assert_eq!(records[0].question_text, "padded?");
	}
}
