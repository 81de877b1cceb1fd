//! Answer-to-option matching: text normalization, similarity scoring, and the
//! tiered cascade that snaps a free-text model answer onto a concrete widget.
//!
//! The generation collaborator gives no guarantee its answer matches an option
//! verbatim; that guarantee is manufactured here.

/// Lowercase and strip every character that is neither a word character nor whitespace
pub fn normalize(text: &str) -> String {
	text.to_lowercase().chars().filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace()).collect::<String>().trim().to_string()
}

/// Similarity ratio in [0, 1]: twice the longest-common-subsequence length over the summed lengths.
/// Two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();
	if a.is_empty() && b.is_empty() {
		return 1.0;
	}
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}

	// Two-row LCS table
	let mut prev = vec![0usize; b.len() + 1];
	let mut curr = vec![0usize; b.len() + 1];
	for i in 0..a.len() {
		for j in 0..b.len() {
			curr[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
		}
		std::mem::swap(&mut prev, &mut curr);
	}

	2.0 * prev[b.len()] as f64 / (a.len() + b.len()) as f64
}

/// Similarity floor for matches against live widget text
const LABEL_SIMILARITY_FLOOR: f64 = 0.6;
/// Lower floor for positional matches against the scraped options list,
/// which carries weaker identity guarantees
const OPTION_SIMILARITY_FLOOR: f64 = 0.5;

/// The confidence tier that produced a selection
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchTier {
	/// Normalized answer equals a live widget label
	Exact,
	/// Normalized answer and a live label contain one another
	Substring,
	/// Normalized answer equals a scraped option; resolved by position
	OptionExact,
	/// Containment against a scraped option; resolved by position
	OptionSubstring,
	/// Best similarity against live labels cleared the floor
	Similarity,
	/// Best similarity against scraped options cleared the (lower) floor
	OptionSimilarity,
	/// Nothing matched; the first widget was selected so the question is never left unanswered
	FirstFallback,
}

impl MatchTier {
	pub fn is_fallback(&self) -> bool {
		matches!(self, MatchTier::FirstFallback)
	}
}

/// A resolved selection: which widget to click, and how confident the match was
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Selection {
	pub index: usize,
	pub tier: MatchTier,
}

/// Resolve a free-text answer to one of the live widgets.
///
/// `widget_labels` is position-aligned with the on-page widgets; a widget whose
/// text could not be recovered contributes an empty string and stays matchable
/// through the positional `options` tiers. Returns None only when no widget exists.
pub fn resolve_choice(answer: &str, widget_labels: &[String], options: &[String]) -> Option<Selection> {
	if widget_labels.is_empty() {
		return None;
	}

	let answer = normalize(answer);
	let labels: Vec<String> = widget_labels.iter().map(|l| normalize(l)).collect();

	// Tier 1: exact normalized match against live widget text
	for (i, label) in labels.iter().enumerate() {
		if !label.is_empty() && *label == answer {
			return Some(Selection { index: i, tier: MatchTier::Exact });
		}
	}

	// Tier 2: substring containment, either direction, first in iteration order.
	// An empty answer would be contained in everything, so it skips straight past.
	if !answer.is_empty() {
		for (i, label) in labels.iter().enumerate() {
			if !label.is_empty() && (answer.contains(label.as_str()) || label.contains(answer.as_str())) {
				return Some(Selection { index: i, tier: MatchTier::Substring });
			}
		}
	}

	// Tier 3: cross-check against the scraped options list, resolving to the widget
	// at the same positional index. Covers widgets whose live text came back empty.
	let normalized_options: Vec<String> = options.iter().map(|o| normalize(o)).collect();
	for (i, option) in normalized_options.iter().enumerate() {
		if !option.is_empty() && *option == answer && i < widget_labels.len() {
			return Some(Selection { index: i, tier: MatchTier::OptionExact });
		}
	}
	if !answer.is_empty() {
		for (i, option) in normalized_options.iter().enumerate() {
			if !option.is_empty() && (option.contains(answer.as_str()) || answer.contains(option.as_str())) && i < widget_labels.len() {
				return Some(Selection { index: i, tier: MatchTier::OptionSubstring });
			}
		}
	}

	// Tier 4: similarity scoring, live labels first, then options by position
	let mut best: Option<(usize, f64)> = None;
	for (i, label) in labels.iter().enumerate() {
		if label.is_empty() {
			continue;
		}
		let score = similarity_ratio(label, &answer);
		if score > LABEL_SIMILARITY_FLOOR && best.is_none_or(|(_, s)| score > s) {
			best = Some((i, score));
		}
	}
	if let Some((index, _)) = best {
		return Some(Selection { index, tier: MatchTier::Similarity });
	}

	let mut best: Option<(usize, f64)> = None;
	for (i, option) in normalized_options.iter().enumerate() {
		if i >= widget_labels.len() {
			break;
		}
		let score = similarity_ratio(option, &answer);
		if score > OPTION_SIMILARITY_FLOOR && best.is_none_or(|(_, s)| score > s) {
			best = Some((i, score));
		}
	}
	if let Some((index, _)) = best {
		return Some(Selection { index, tier: MatchTier::OptionSimilarity });
	}

	// Tier 5: a choice question is never left unanswered
	Some(Selection { index: 0, tier: MatchTier::FirstFallback })
}
