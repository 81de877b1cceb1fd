use ask_llm::{Client as LlmClient, Conversation, Model, Role};
use color_eyre::{Result, eyre::eyre};
use v_utils::elog;

use crate::{QuestionRecord, config::AppConfig, matching::similarity_ratio};

/// Prompt for a choice question. The "exact text" contract is best-effort;
/// the matcher downstream manufactures the real guarantee.
fn choice_prompt(question_text: &str, options: &[String]) -> String {
	let quoted = options.iter().map(|o| format!("\"{o}\"")).collect::<Vec<_>>().join(", ");
	format!(
		r#"Question: {question_text}

These are the EXACT options (choose only one):
{quoted}

Instructions:
1. Choose exactly ONE option from the list above
2. Return ONLY the exact text of the chosen option, nothing else
3. Do not add any explanation, just the option text
4. Do not add quotation marks around the option
5. Do not answer identity questions like "What is your name?", "Rollno", "PRN/GRN", "Email", "Mobile No", "Address", "DOB" etc

Answer:"#
	)
}

fn free_text_prompt(question_text: &str) -> String {
	format!(
		r#"Question: {question_text}

Please provide a brief and direct answer to this question.
Keep your answer concise (1-2 sentences maximum).

Answer:"#
	)
}

/// Populate `answer` on every record, in order.
/// A failed generation is recorded as an error-tagged answer string; the batch never aborts.
pub async fn generate_answers(records: &mut [QuestionRecord], config: &AppConfig) {
	for record in records.iter_mut() {
		let (prompt, max_tokens) = if record.is_choice() {
			(choice_prompt(&record.question_text, &record.options), 128)
		} else {
			(free_text_prompt(&record.question_text), 256)
		};

		match complete_with_retry(&prompt, max_tokens, config).await {
			Ok(text) => {
				let answer = if record.is_choice() { reconcile_answer(&text, &record.options).unwrap_or(text) } else { text };
				record.answer = Some(answer);
			}
			Err(e) => {
				elog!("Failed to generate answer for \"{}\": {e}", record.question_text);
				record.answer = Some(format!("Error: {e}"));
			}
		}
	}
}

/// One completion with bounded retry on transient API errors
async fn complete_with_retry(prompt: &str, max_tokens: u32, config: &AppConfig) -> Result<String> {
	let mut conv = Conversation::new();
	conv.add(Role::User, prompt.to_string());

	let retries = config.api_retries.max(1);
	let mut attempt = 0u32;
	loop {
		attempt += 1;
		let client = LlmClient::new().model(Model::Medium).max_tokens(max_tokens as usize);
		match client.conversation(&conv).await {
			Ok(response) => {
				tracing::debug!("LLM raw response: {}", response.text);
				return Ok(response.text.trim().to_string());
			}
			Err(e) => {
				if attempt >= retries {
					return Err(eyre!("LLM request failed after {retries} attempt(s): {e}"));
				}
				elog!("LLM request failed (attempt {attempt}/{retries}): {e}");
				tokio::time::sleep(std::time::Duration::from_millis(config.api_retry_delay_ms * attempt as u64)).await;
			}
		}
	}
}

/// Snap a free-text answer onto one of the enumerated options, byte-for-byte.
/// Case-insensitive equality keeps the original option casing; otherwise the
/// highest-similarity option wins. None only when no options exist.
pub fn reconcile_answer(answer: &str, options: &[String]) -> Option<String> {
	if options.is_empty() {
		return None;
	}

	let answer_lower = answer.to_lowercase();
	for option in options {
		if option.to_lowercase() == answer_lower {
			return Some(option.clone());
		}
	}

	let mut best_idx = 0;
	let mut best_score = -1.0f64;
	for (i, option) in options.iter().enumerate() {
		let score = similarity_ratio(&option.to_lowercase(), &answer_lower);
		if score > best_score {
			best_score = score;
			best_idx = i;
		}
	}
	Some(options[best_idx].clone())
}
