use std::num::IntErrorKind;

use thiserror::Error;

/// Why an order specification was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
	#[error("order is empty; list at least one document position")]
	Empty,
	#[error("'{token}' is not a whole number (position {position} in the order)")]
	Parse { token: String, position: usize },
	#[error("document {index} does not exist; choose positions between 1 and {size}")]
	Range { index: String, size: usize },
}

/// Resolve a comma-separated list of 1-based document positions into
/// 0-based indices into a working set of `working_set_size` documents.
///
/// The result keeps the user's order verbatim: positions may repeat (the
/// document is merged again) or be left out (the document is skipped).
pub fn resolve(order_text: &str, working_set_size: usize) -> Result<Vec<usize>, OrderError> {
	if order_text.trim().is_empty() {
		return Err(OrderError::Empty);
	}

	order_text
		.split(',')
		.enumerate()
		.map(|(i, raw)| {
			let token = raw.trim();
			let out_of_range = || OrderError::Range {
				index: token.to_string(),
				size: working_set_size,
			};
			match token.parse::<i64>() {
				Ok(n) => usize::try_from(n)
					.ok()
					.filter(|n| (1..=working_set_size).contains(n))
					.map(|n| n - 1)
					.ok_or_else(out_of_range),
				// Whole numbers too large for any working set.
				Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
					Err(out_of_range())
				}
				Err(_) => Err(OrderError::Parse {
					token: token.to_string(),
					position: i + 1,
				}),
			}
		})
		.collect()
}

/// The identity order `1,2,...,n` offered for a freshly populated working set.
pub fn default_order(working_set_size: usize) -> String {
	(1..=working_set_size)
		.map(|i| i.to_string())
		.collect::<Vec<_>>()
		.join(",")
}
