//! Form workflow: extract questions, generate answers, drive the fill pass.

#[cfg(feature = "xdg")]
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::Page;
use color_eyre::{
	Result,
	eyre::{bail, eyre},
};
#[cfg(feature = "xdg")]
use v_utils::xdg_state_dir;
use v_utils::{
	elog,
	io::{ConfirmResult, confirmation},
	log,
};

use crate::{
	QuestionRecord,
	config::AppConfig,
	dom::FormBackend,
	extract, llm,
	matching::{self, MatchTier},
};

/// Outcome of a fill pass
#[derive(Debug, Default)]
pub struct FillReport {
	/// Questions whose control was clicked or filled
	pub filled: usize,
	/// (question index, reason) for questions skipped without a side effect
	pub skipped: Vec<(usize, String)>,
}

/// Handle a loaded form page end to end: extract, answer, confirm, fill.
/// Returns Ok(true) if at least one control was filled.
pub async fn handle_form_page(page: &Page, config: &AppConfig, session_id: &str) -> Result<bool> {
	#[cfg(feature = "xdg")]
	if let Err(e) = save_page_html(page, session_id).await {
		elog!("Failed to save form page HTML: {e}");
	}

	let found = page.wait_for_form(Duration::from_secs(config.element_wait_secs)).await?;
	if found == 0 {
		elog!("No question containers appeared within {}s", config.element_wait_secs);
	}

	let html = page.page_html().await?;
	let mut records = extract::extract_questions(&html);
	if records.is_empty() {
		log!("No questions extracted from the form.");
		return Ok(false);
	}
	log!("Extracted {} question(s) from the form.", records.len());

	llm::generate_answers(&mut records, config).await;

	// Show the full Q/A transcript before touching the live form
	for (i, record) in records.iter().enumerate() {
		let type_marker = if record.is_choice() { "[choice]" } else { "[text]" };
		let header = format!("--- Question {} {} ---", i + 1, type_marker);
		tracing::info!("{}", header);
		eprintln!("{}", header);

		let record_str = record.to_string();
		tracing::info!("{}", record_str);
		eprint!("{}", record_str);

		if let Some(answer) = record.answer() {
			eprintln!("Answer: {}", answer);
		}
		eprintln!();
	}

	if !config.auto_fill && confirmation(&format!("Fill {} answer(s) into the form?", records.len())).flush().await != ConfirmResult::Yes {
		log!("Cancelled by user");
		return Ok(false);
	}

	let report = fill_form(page, &records).await?;
	log!("Filled {} question(s), skipped {}.", report.filled, report.skipped.len());
	for (idx, reason) in &report.skipped {
		log!("  - question {}: {}", idx + 1, reason);
	}

	#[cfg(feature = "xdg")]
	if let Err(e) = save_screenshot(page, session_id).await {
		elog!("Failed to save screenshot: {e}");
	}

	Ok(report.filled > 0)
}

/// Drive the answered records onto the live form, in order.
/// Record order models the live container order; a single question's failure
/// never aborts the remaining questions.
pub async fn fill_form<B: FormBackend>(backend: &B, records: &[QuestionRecord]) -> Result<FillReport> {
	let container_count = backend.container_count().await?;
	if container_count == 0 {
		bail!("Could not locate question containers in the form");
	}
	if container_count != records.len() {
		elog!("Form has {container_count} question container(s) but {} record(s) were extracted; answers may misalign", records.len());
	}

	let mut report = FillReport::default();
	for (idx, record) in records.iter().enumerate() {
		if idx >= container_count {
			break;
		}
		let Some(answer) = record.answer().map(|a| a.trim().to_string()) else {
			report.skipped.push((idx, "no generated answer".to_string()));
			continue;
		};

		let outcome = if record.is_choice() { fill_choice(backend, idx, record, &answer).await } else { fill_free_text(backend, idx, &answer).await };

		match outcome {
			Ok(true) => report.filled += 1,
			Ok(false) => report.skipped.push((idx, "no matching element in container".to_string())),
			Err(e) => {
				elog!("Failed to fill question {}: {e}", idx + 1);
				report.skipped.push((idx, e.to_string()));
			}
		}
	}
	Ok(report)
}

async fn fill_choice<B: FormBackend>(backend: &B, idx: usize, record: &QuestionRecord, answer: &str) -> Result<bool> {
	let labels = backend.option_labels(idx).await?;
	let Some(selection) = matching::resolve_choice(answer, &labels, &record.options) else {
		return Ok(false);
	};

	match selection.tier {
		MatchTier::FirstFallback => log!("No confident match for \"{answer}\" on question {}; selecting the first option", idx + 1),
		tier => tracing::debug!("question {}: answer matched widget {} via {:?}", idx + 1, selection.index, tier),
	}

	backend.click_option(idx, selection.index).await?;
	Ok(true)
}

async fn fill_free_text<B: FormBackend>(backend: &B, idx: usize, answer: &str) -> Result<bool> {
	let filled = backend.fill_text(idx, answer).await?;
	if !filled {
		log!("No text input found for question {}; leaving it unfilled", idx + 1);
	}
	Ok(filled)
}

/// Wait for the page URL to change (e.g. manual 2FA completion)
pub async fn wait_for_page_change(page: &Page) -> Result<()> {
	let initial_url = page.url().await.map_err(|e| eyre!("Failed to get URL: {}", e))?;

	loop {
		tokio::time::sleep(Duration::from_millis(500)).await;

		let current_url = page.url().await.map_err(|e| eyre!("Failed to get URL: {}", e))?;

		if current_url != initial_url {
			// Let the new page settle
			tokio::time::sleep(Duration::from_secs(1)).await;
			return Ok(());
		}
	}
}

/// Save the current page's HTML to disk for debugging
/// Uses the page URL as the filename label
#[cfg(feature = "xdg")]
pub async fn save_page_html(page: &Page, session_id: &str) -> Result<PathBuf> {
	let html_dir = xdg_state_dir!("persist_htmls").join(session_id);
	std::fs::create_dir_all(&html_dir).map_err(|e| eyre!("Failed to create HTML dir: {}", e))?;

	let url = page.url().await.ok().flatten().unwrap_or_default();
	let label = url.replace("https://", "").replace("http://", "");

	let html = page.page_html().await?;

	let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs();
	let safe_label: String = label.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();

	let filename = format!("{}_{}.html", timestamp, safe_label);
	let filepath = html_dir.join(&filename);

	std::fs::write(&filepath, &html).map_err(|e| eyre!("Failed to write HTML file: {}", e))?;

	log!("Saved page HTML to: {}", filepath.display());
	Ok(filepath)
}

/// Capture a full-page screenshot of the filled form
#[cfg(feature = "xdg")]
pub async fn save_screenshot(page: &Page, session_id: &str) -> Result<PathBuf> {
	use chromiumoxide::page::ScreenshotParams;

	let dir = xdg_state_dir!("screenshots").join(session_id);
	std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create screenshot dir: {}", e))?;

	let bytes = page.screenshot(ScreenshotParams::builder().full_page(true).build()).await.map_err(|e| eyre!("Failed to capture screenshot: {}", e))?;

	let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs();
	let filepath = dir.join(format!("{timestamp}.png"));
	std::fs::write(&filepath, &bytes).map_err(|e| eyre!("Failed to write screenshot: {}", e))?;

	log!("Saved screenshot to: {}", filepath.display());
	Ok(filepath)
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;

	/// Scripted backend: one entry per container, with the labels its widgets expose.
	/// Containers without widgets may expose a text input instead.
	#[derive(Default)]
	struct MockBackend {
		widget_labels: Vec<Vec<String>>,
		has_text_input: Vec<bool>,
		fail_labels_on: Option<usize>,
		clicks: Mutex<Vec<(usize, usize)>>,
		fills: Mutex<Vec<(usize, String)>>,
	}

	impl FormBackend for MockBackend {
		async fn page_html(&self) -> Result<String> {
			Ok(String::new())
		}

		async fn container_count(&self) -> Result<usize> {
			Ok(self.widget_labels.len())
		}

		async fn option_labels(&self, container_idx: usize) -> Result<Vec<String>> {
			if self.fail_labels_on == Some(container_idx) {
				bail!("container {} went stale", container_idx);
			}
			Ok(self.widget_labels[container_idx].clone())
		}

		async fn click_option(&self, container_idx: usize, option_idx: usize) -> Result<()> {
			self.clicks.lock().unwrap().push((container_idx, option_idx));
			Ok(())
		}

		async fn fill_text(&self, container_idx: usize, text: &str) -> Result<bool> {
			if !self.has_text_input.get(container_idx).copied().unwrap_or(false) {
				return Ok(false);
			}
			self.fills.lock().unwrap().push((container_idx, text.to_string()));
			Ok(true)
		}
	}

	fn strings(items: &[&str]) -> Vec<String> {
		items.iter().map(|s| s.to_string()).collect()
	}

	fn answered(text: &str, options: &[&str], answer: &str) -> QuestionRecord {
		let mut record = QuestionRecord::new(text, strings(options));
		record.answer = Some(answer.to_string());
		record
	}

	#[tokio::test]
	async fn fills_choice_and_text_questions_in_order() {
		let backend = MockBackend {
			widget_labels: vec![strings(&["Red", "Blue"]), vec![]],
			has_text_input: vec![false, true],
			..Default::default()
		};
		let records = vec![answered("Color?", &["Red", "Blue"], "blue"), answered("Why?", &[], "Because.")];

		let report = fill_form(&backend, &records).await.unwrap();

		assert_eq!(report.filled, 2);
		assert!(report.skipped.is_empty());
		assert_eq!(*backend.clicks.lock().unwrap(), vec![(0, 1)]);
		assert_eq!(*backend.fills.lock().unwrap(), vec![(1, "Because.".to_string())]);
	}

	#[tokio::test]
	async fn extra_records_are_truncated() {
		let backend = MockBackend {
			widget_labels: vec![strings(&["Yes", "No"])],
			has_text_input: vec![false],
			..Default::default()
		};
		let records = vec![answered("First?", &["Yes", "No"], "yes"), answered("Ghost?", &["Yes", "No"], "no")];

		let report = fill_form(&backend, &records).await.unwrap();

		assert_eq!(report.filled, 1);
		assert_eq!(*backend.clicks.lock().unwrap(), vec![(0, 0)]);
	}

	#[tokio::test]
	async fn one_failure_does_not_stop_the_rest() {
		let backend = MockBackend {
			widget_labels: vec![strings(&["A", "B"]), strings(&["C", "D"])],
			has_text_input: vec![false, false],
			fail_labels_on: Some(0),
			..Default::default()
		};
		let records = vec![answered("Broken?", &["A", "B"], "a"), answered("Fine?", &["C", "D"], "d")];

		let report = fill_form(&backend, &records).await.unwrap();

		assert_eq!(report.filled, 1);
		assert_eq!(report.skipped.len(), 1);
		assert_eq!(report.skipped[0].0, 0);
		assert_eq!(*backend.clicks.lock().unwrap(), vec![(1, 1)]);
	}

	#[tokio::test]
	async fn unanswered_records_are_reported_not_filled() {
		let backend = MockBackend {
			widget_labels: vec![strings(&["A", "B"])],
			has_text_input: vec![false],
			..Default::default()
		};
		let records = vec![QuestionRecord::new("Silent?", strings(&["A", "B"]))];

		let report = fill_form(&backend, &records).await.unwrap();

		assert_eq!(report.filled, 0);
		assert_eq!(report.skipped, vec![(0, "no generated answer".to_string())]);
		assert!(backend.clicks.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn text_question_without_input_is_skipped_softly() {
		let backend = MockBackend {
			widget_labels: vec![vec![]],
			has_text_input: vec![false],
			..Default::default()
		};
		let records = vec![answered("Why?", &[], "Because.")];

		let report = fill_form(&backend, &records).await.unwrap();

		assert_eq!(report.filled, 0);
		assert_eq!(report.skipped.len(), 1);
	}

	#[tokio::test]
	async fn no_containers_is_an_error() {
		let backend = MockBackend::default();
		let records = vec![answered("Any?", &["A"], "a")];
		assert!(fill_form(&backend, &records).await.is_err());
	}

	#[tokio::test]
	async fn unmatched_choice_answer_falls_back_to_first_widget() {
		let backend = MockBackend {
			widget_labels: vec![strings(&["Red", "Blue"])],
			has_text_input: vec![false],
			..Default::default()
		};
		let records = vec![answered("Color?", &["Red", "Blue"], "crimson")];

		let report = fill_form(&backend, &records).await.unwrap();

		assert_eq!(report.filled, 1);
		assert_eq!(*backend.clicks.lock().unwrap(), vec![(0, 0)]);
	}
}
