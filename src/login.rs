use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use v_utils::log;

use crate::config::AppConfig;

/// Outcome of the Google sign-in flow
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoginOutcome {
	Success,
	/// A 2-Step Verification interstitial appeared; completion is manual
	TwoFactor,
	Failed,
}

/// Drive the Google account sign-in form.
/// Assumes the page is already at the sign-in URL; never automates 2FA.
pub async fn login_google(page: &Page, config: &AppConfig) -> Result<LoginOutcome> {
	log!("Entering email...");
	if !fill_and_advance(page, "input[type='email'], input[name='identifier']", &config.email, "#identifierNext").await? {
		return Ok(LoginOutcome::Failed);
	}
	tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

	log!("Entering password...");
	if !fill_and_advance(page, "input[type='password'], input[name='Passwd']", &config.password, "#passwordNext").await? {
		return Ok(LoginOutcome::Failed);
	}
	// Wait for the sign-in round trip to settle
	tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

	let current_url = page.url().await.ok().flatten().unwrap_or_default();
	log!("Current URL after login: {}", current_url);

	if !current_url.contains("accounts.google.com/signin") {
		return Ok(LoginOutcome::Success);
	}
	if detect_two_factor(page).await? {
		return Ok(LoginOutcome::TwoFactor);
	}
	Ok(LoginOutcome::Failed)
}

/// Set a field's value and advance, preferring the step's Next button and
/// falling back to submitting the enclosing form
async fn fill_and_advance(page: &Page, input_selector: &str, value: &str, next_selector: &str) -> Result<bool> {
	let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
	let script = format!(
		r#"
		(function() {{
			const field = document.querySelector("{input_selector}");
			if (!field) return false;
			field.focus();
			field.value = "{escaped}";
			field.dispatchEvent(new Event('input', {{ bubbles: true }}));

			const next = document.querySelector("{next_selector}");
			if (next) {{
				next.click();
				return true;
			}}
			const form = field.closest('form');
			if (form) {{
				form.submit();
				return true;
			}}
			return false;
		}})()
		"#
	);

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to drive sign-in form: {}", e))?;
	Ok(result.value().and_then(|v| v.as_bool()) == Some(true))
}

/// Check for the 2-Step Verification interstitial
async fn detect_two_factor(page: &Page) -> Result<bool> {
	let script = r#"
		(function() {
			const text = document.body ? document.body.innerText : '';
			return text.includes('2-Step Verification') || text.toLowerCase().includes('verification');
		})()
	"#;

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to check for verification prompt: {}", e))?;
	Ok(result.value().and_then(|v| v.as_bool()) == Some(true))
}
