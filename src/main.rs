use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use clap::Parser;
use color_eyre::{
	Result,
	eyre::{bail, eyre},
};
use futures::StreamExt;
use v_utils::{elog, log};

use form_headless::{
	config::AppConfig,
	is_form_url,
	login::{self, LoginOutcome},
	runner,
};

#[derive(Debug, Parser)]
#[command(name = "form_headless")]
#[command(about = "Automated Google Form filling with LLM-generated answers", long_about = None)]
struct Args {
	/// Run with visible browser window (non-headless mode)
	#[arg(long)]
	visible: bool,

	/// Google account email
	#[arg(short, long)]
	email: String,

	/// Google account password
	#[arg(short, long)]
	password: String,

	/// Google Form URL to fill
	#[arg(short, long)]
	form_url: String,

	/// Fill the form without asking for confirmation first
	#[arg(long)]
	auto_fill: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	let args = Args::parse();

	if !is_form_url(&args.form_url) {
		bail!("Not a Google Form URL: {}", args.form_url);
	}

	let config = AppConfig {
		email: args.email.clone(),
		password: args.password.clone(),
		auto_fill: args.auto_fill,
		visible: args.visible,
		..AppConfig::default()
	};

	log!("Starting Google Form automation...");
	log!("Visible mode: {}", config.visible);

	let browser_config = if config.visible {
		BrowserConfig::builder()
			.with_head() // Visible browser with UI
			.build()
			.map_err(|e| eyre!("Failed to build browser config: {}", e))?
	} else {
		BrowserConfig::builder()
			.build() // Headless mode
			.map_err(|e| eyre!("Failed to build browser config: {}", e))?
	};

	let (mut browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| eyre!("Failed to launch browser: {}", e))?;

	// Consume browser events so the session doesn't hang
	let handle = tokio::spawn(async move {
		while let Some(_event) = handler.next().await {}
	});

	let page = browser.new_page("about:blank").await.map_err(|e| eyre!("Failed to create new page: {}", e))?;

	let session_id = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs().to_string();

	// The browser session is the one scoped resource: whatever the workflow
	// does, release it before surfacing the result.
	let result = run_workflow(&page, &args.form_url, &config, &session_id).await;

	drop(page);
	if let Err(e) = browser.close().await {
		elog!("Failed to close browser: {e}");
	}
	drop(browser);
	handle.abort();

	result
}

async fn run_workflow(page: &Page, form_url: &str, config: &AppConfig, session_id: &str) -> Result<()> {
	log!("Signing into Google account...");
	page.goto("https://accounts.google.com/signin").await.map_err(|e| eyre!("Failed to navigate to sign-in page: {}", e))?;
	tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

	match login::login_google(page, config).await? {
		LoginOutcome::Success => log!("Login successful."),
		LoginOutcome::TwoFactor => {
			if !config.visible {
				bail!("Two-factor verification required; re-run with --visible to complete it manually");
			}
			log!("Two-factor verification detected. Complete it in the browser window...");
			runner::wait_for_page_change(page).await?;
		}
		LoginOutcome::Failed => bail!("Login failed; check the account credentials"),
	}

	log!("Navigating to form: {}", form_url);
	page.goto(form_url).await.map_err(|e| eyre!("Failed to navigate to form: {}", e))?;
	tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;

	let filled = runner::handle_form_page(page, config, session_id).await?;
	if filled {
		log!("Form filled. Review the answers in the open form before submitting.");
	} else {
		log!("Nothing was filled.");
	}

	if config.visible {
		log!("Browser is visible. Press Ctrl+C to exit...");
		tokio::signal::ctrl_c().await?;
	}

	Ok(())
}
