use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod dom;
pub mod extract;
pub mod llm;
pub mod login;
pub mod matching;
pub mod runner;

/// Detects if a URL points at a Google Form
pub fn is_form_url(url: &str) -> bool {
	url.contains("docs.google.com/forms")
}

/// A single form question recovered from the embedded payload
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuestionRecord {
	/// The question text/prompt
	pub question_text: String,
	/// Enumerated option labels; empty for free-text questions.
	/// Order is significant: it mirrors the on-page widget order.
	pub options: Vec<String>,
	/// Generated answer; None until the answer step runs
	#[serde(default)]
	pub answer: Option<String>,
}

impl QuestionRecord {
	pub fn new(question_text: impl Into<String>, options: Vec<String>) -> Self {
		Self {
			question_text: question_text.into(),
			options,
			answer: None,
		}
	}

	/// Returns true if this question carries enumerated options
	pub fn is_choice(&self) -> bool {
		!self.options.is_empty()
	}

	/// Generated answer text, if the answer step produced one
	pub fn answer(&self) -> Option<&str> {
		self.answer.as_deref()
	}
}

impl fmt::Display for QuestionRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.question_text)?;
		writeln!(f)?;
		if self.options.is_empty() {
			match self.answer.as_deref() {
				Some(answer) if !answer.is_empty() => writeln!(f, "[{}]", answer)?,
				_ => writeln!(f, "[____________________]")?,
			}
		} else {
			for (i, option) in self.options.iter().enumerate() {
				let marker = if self.answer.as_deref() == Some(option.as_str()) { "(x)" } else { "( )" };
				writeln!(f, "{} {}. {}", marker, i + 1, option)?;
			}
		}
		Ok(())
	}
}
