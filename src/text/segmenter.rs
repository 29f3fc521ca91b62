//! Sentence segmentation for streaming LLM output
//!
//! Splits generated text into speakable sentences so that TTS can start on
//! the first complete sentence while the rest of the response is still
//! streaming. Pure and stateless: the turn engine re-runs it over the
//! accumulated text after every chunk.

/// Minimum length for a standalone sentence, in characters.
///
/// Candidates shorter than this are merged with their neighbors so that TTS
/// never receives fragments like "Ok." as separate utterances.
pub const MIN_SENTENCE_CHARS: usize = 20;

/// Collapse all runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into an ordered list of sentences.
///
/// Sentences end at `.`, `!` or `?`. A candidate shorter than
/// [`MIN_SENTENCE_CHARS`] is not emitted on its own: it is held and prefixed
/// onto the next candidate (including the very first candidate, so no text is
/// ever dropped). A short trailing remainder is appended to the previous
/// sentence, or emitted as-is when there is no previous sentence. Text with
/// no terminator at all comes back as a single element; empty or
/// all-whitespace input comes back as an empty list.
pub fn segment(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut sentences: Vec<String> = Vec::new();
    let mut held = String::new();
    let mut cursor = 0usize;

    for (i, c) in normalized.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let mut candidate = normalized[cursor..end].trim().to_string();
            cursor = end;

            if candidate.is_empty() {
                continue;
            }
            if !held.is_empty() {
                candidate = format!("{} {}", held, candidate);
                held.clear();
            }
            if candidate.chars().count() < MIN_SENTENCE_CHARS {
                held = candidate;
            } else {
                sentences.push(candidate);
            }
        }
    }

    let mut tail = normalized[cursor..].trim().to_string();
    if !held.is_empty() {
        tail = if tail.is_empty() {
            held
        } else {
            format!("{} {}", held, tail)
        };
    }

    if !tail.is_empty() {
        if tail.chars().count() < MIN_SENTENCE_CHARS {
            match sentences.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(&tail);
                }
                None => sentences.push(tail),
            }
        } else {
            sentences.push(tail);
        }
    }

    sentences
}
