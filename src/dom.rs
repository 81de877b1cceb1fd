//! DOM access for a rendered Google Form.
//!
//! [`FormBackend`] is the single capability set the fill driver needs; the
//! chromiumoxide implementation drives it with evaluated JavaScript, returning
//! JSON-stringified results.

use std::time::Duration;

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};

/// Shared JS helpers: container lookup and the widget-selector strategy chain.
/// Label harvesting and clicking must walk widgets in the same order.
const FORM_QUERY_JS: &str = r#"
	function questionContainers() {
		let containers = document.querySelectorAll("div.freebirdFormviewerViewItemsItemItem");
		if (containers.length === 0) {
			containers = document.querySelectorAll("div[role='listitem']");
		}
		return Array.from(containers);
	}

	function optionWidgets(container) {
		const strategies = [
			"div[role='radio']",
			"label",
			"div.appsMaterialWizToggleRadiogroupRadioButtonContainer",
			".docssharedWizToggleLabeledLabelWrapper"
		];
		for (const selector of strategies) {
			const widgets = container.querySelectorAll(selector);
			if (widgets.length > 0) return Array.from(widgets);
		}
		return [];
	}

	function widgetText(widget) {
		let text = (widget.textContent || "").trim();
		if (!text) {
			for (const child of widget.querySelectorAll("div")) {
				const childText = (child.textContent || "").trim();
				if (childText) { text = childText; break; }
			}
		}
		if (!text) {
			text = widget.getAttribute("aria-label") || "";
		}
		return text;
	}
"#;

/// What a form-filling backend must expose. Both a raw devtools-protocol page
/// and any higher-level automation layer are variants of this interface.
#[allow(async_fn_in_trait)]
pub trait FormBackend {
	/// Rendered page source, for extraction
	async fn page_html(&self) -> Result<String>;

	/// Number of question containers currently in the DOM
	async fn container_count(&self) -> Result<usize>;

	/// Visible text of each selectable widget inside the given container, position-aligned.
	/// A widget with no recoverable text contributes an empty string.
	async fn option_labels(&self, container_idx: usize) -> Result<Vec<String>>;

	/// Click the nth selectable widget inside the given container
	async fn click_option(&self, container_idx: usize, option_idx: usize) -> Result<()>;

	/// Write into the first text-like input of the container, preferring typed text
	/// inputs over textareas over generic inputs. Returns false when none resolves.
	async fn fill_text(&self, container_idx: usize, text: &str) -> Result<bool>;

	/// Poll until at least one question container exists, up to `timeout`.
	/// Returns the container count, which is 0 if the wait timed out.
	async fn wait_for_form(&self, timeout: Duration) -> Result<usize> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			let count = self.container_count().await?;
			if count > 0 {
				return Ok(count);
			}
			if tokio::time::Instant::now() >= deadline {
				return Ok(0);
			}
			tokio::time::sleep(Duration::from_millis(500)).await;
		}
	}
}

impl FormBackend for Page {
	async fn page_html(&self) -> Result<String> {
		let result = self.evaluate("document.documentElement.outerHTML").await.map_err(|e| eyre!("Failed to get page HTML: {}", e))?;
		Ok(result.value().and_then(|v| v.as_str()).unwrap_or_default().to_string())
	}

	async fn container_count(&self) -> Result<usize> {
		let script = format!("(function() {{ {FORM_QUERY_JS} return questionContainers().length; }})()");
		let result = self.evaluate(script).await.map_err(|e| eyre!("Failed to count question containers: {}", e))?;
		Ok(result.value().and_then(|v| v.as_u64()).unwrap_or(0) as usize)
	}

	async fn option_labels(&self, container_idx: usize) -> Result<Vec<String>> {
		let script = format!(
			r#"
			(function() {{
				{FORM_QUERY_JS}
				const container = questionContainers()[{container_idx}];
				if (!container) return "[]";
				return JSON.stringify(optionWidgets(container).map(widgetText));
			}})()
			"#
		);
		let result = self.evaluate(script).await.map_err(|e| eyre!("Failed to collect option labels: {}", e))?;
		let json_str = result.value().and_then(|v| v.as_str()).unwrap_or("[]");
		let labels: Vec<String> = serde_json::from_str(json_str).map_err(|e| eyre!("Failed to parse option labels: {}", e))?;
		Ok(labels)
	}

	async fn click_option(&self, container_idx: usize, option_idx: usize) -> Result<()> {
		let script = format!(
			r#"
			(function() {{
				{FORM_QUERY_JS}
				const container = questionContainers()[{container_idx}];
				if (!container) return false;
				const widgets = optionWidgets(container);
				if ({option_idx} >= widgets.length) return false;
				widgets[{option_idx}].click();
				return true;
			}})()
			"#
		);
		let result = self.evaluate(script).await.map_err(|e| eyre!("Failed to click option: {}", e))?;
		if result.value().and_then(|v| v.as_bool()) != Some(true) {
			return Err(eyre!("Failed to find option widget {} in container {}", option_idx, container_idx));
		}
		Ok(())
	}

	async fn fill_text(&self, container_idx: usize, text: &str) -> Result<bool> {
		let escaped = text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n").replace('\r', "\\r");
		let script = format!(
			r#"
			(function() {{
				{FORM_QUERY_JS}
				const container = questionContainers()[{container_idx}];
				if (!container) return false;
				const input = container.querySelector("input[type='text']") || container.querySelector("textarea") || container.querySelector("input");
				if (!input) return false;
				input.value = "{escaped}";
				input.dispatchEvent(new Event('input', {{ bubbles: true }}));
				input.dispatchEvent(new Event('change', {{ bubbles: true }}));
				return true;
			}})()
			"#
		);
		let result = self.evaluate(script).await.map_err(|e| eyre!("Failed to fill text input: {}", e))?;
		Ok(result.value().and_then(|v| v.as_bool()) == Some(true))
	}
}
