//! Recursive character splitting.
//!
//! Text is cut on the coarsest separator it contains, the pieces are packed greedily into chunks
//! of at most `chunk_size` characters, and any piece that is still too long is split again with the
//! next finer separator. Consecutive chunks share up to `chunk_overlap` characters of trailing
//! pieces. Lengths count Unicode scalar values.

use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub chunk_size: usize,
	pub chunk_overlap: usize,
	/// Coarsest first. An empty separator splits into single characters.
	pub separators: Vec<String>,
}
impl ChunkingConfig {
	pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
		Self { chunk_size, chunk_overlap, ..Default::default() }
	}
}
impl Default for ChunkingConfig {
	fn default() -> Self {
		Self {
			chunk_size: DEFAULT_CHUNK_SIZE,
			chunk_overlap: DEFAULT_CHUNK_OVERLAP,
			separators: DEFAULT_SEPARATORS.iter().map(|sep| sep.to_string()).collect(),
		}
	}
}

/// Splits `text` into trimmed, non-empty chunks in document order.
pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<String> {
	let separators = cfg.separators.iter().map(String::as_str).collect::<Vec<_>>();

	split_recursive(text, &separators, cfg)
}

fn split_recursive(text: &str, separators: &[&str], cfg: &ChunkingConfig) -> Vec<String> {
	let mut separator = separators.last().copied().unwrap_or("");
	let mut finer: &[&str] = &[];

	for (idx, candidate) in separators.iter().enumerate() {
		if candidate.is_empty() {
			separator = candidate;

			break;
		}
		if text.contains(candidate) {
			separator = candidate;
			finer = &separators[idx + 1..];

			break;
		}
	}

	let mut chunks = Vec::new();
	let mut pending = Vec::new();

	for piece in split_keeping_separator(text, separator) {
		if char_len(piece) < cfg.chunk_size {
			pending.push(piece);

			continue;
		}
		if !pending.is_empty() {
			chunks.extend(merge_pieces(&pending, cfg));
			pending.clear();
		}

		if finer.is_empty() {
			push_trimmed(&mut chunks, piece);
		} else {
			chunks.extend(split_recursive(piece, finer, cfg));
		}
	}

	if !pending.is_empty() {
		chunks.extend(merge_pieces(&pending, cfg));
	}

	chunks
}

/// Splits before every occurrence of `separator`, so each piece after the first starts with it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
	if separator.is_empty() {
		return text.char_indices().map(|(idx, ch)| &text[idx..idx + ch.len_utf8()]).collect();
	}

	let mut pieces = Vec::new();
	let mut start = 0;

	for (idx, _) in text.match_indices(separator) {
		if idx > start {
			pieces.push(&text[start..idx]);

			start = idx;
		}
	}

	pieces.push(&text[start..]);
	pieces.retain(|piece| !piece.is_empty());

	pieces
}

fn merge_pieces(pieces: &[&str], cfg: &ChunkingConfig) -> Vec<String> {
	let mut chunks = Vec::new();
	let mut window: VecDeque<(&str, usize)> = VecDeque::new();
	let mut total = 0_usize;

	for piece in pieces {
		let len = char_len(piece);

		if total + len > cfg.chunk_size && !window.is_empty() {
			if total > cfg.chunk_size {
				tracing::warn!(
					chunk_len = total,
					chunk_size = cfg.chunk_size,
					"Created a chunk longer than the configured size."
				);
			}

			push_trimmed(&mut chunks, &join(&window));

			while total > cfg.chunk_overlap || (total + len > cfg.chunk_size && total > 0) {
				let Some((_, dropped)) = window.pop_front() else {
					break;
				};

				total -= dropped;
			}
		}

		window.push_back((piece, len));

		total += len;
	}

	push_trimmed(&mut chunks, &join(&window));

	chunks
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
	window.iter().map(|(piece, _)| *piece).collect()
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
	let trimmed = text.trim();

	if !trimmed.is_empty() {
		chunks.push(trimmed.to_string());
	}
}

fn char_len(text: &str) -> usize {
	text.chars().count()
}
