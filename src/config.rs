use v_utils::macros::{MyConfigPrimitives, Settings};

#[derive(Clone, Debug, MyConfigPrimitives, Settings)]
pub struct AppConfig {
	pub email: String,
	pub password: String,
	/// Fill the form without asking for confirmation first
	#[serde(default)]
	pub auto_fill: bool,
	/// Number of retries for transient API errors (500, rate limit, etc) (default: 3)
	#[serde(default = "default_api_retries")]
	pub api_retries: u32,
	/// Base delay in ms between API retries, multiplied by attempt number (default: 1000)
	#[serde(default = "default_api_retry_delay_ms")]
	pub api_retry_delay_ms: u64,
	/// Seconds to wait for question containers to appear after navigation (default: 15)
	#[serde(default = "default_element_wait_secs")]
	pub element_wait_secs: u64,
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	pub visible: bool,
}

fn default_api_retries() -> u32 {
	3
}

fn default_api_retry_delay_ms() -> u64 {
	1000
}

fn default_element_wait_secs() -> u64 {
	15
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			email: String::new(),
			password: String::new(),
			auto_fill: false,
			api_retries: default_api_retries(),
			api_retry_delay_ms: default_api_retry_delay_ms(),
			element_wait_secs: default_element_wait_secs(),
			visible: false,
		}
	}
}
