//! Sentence-aligned premise windows under a token budget.

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text after `.`, `?` or `!` followed by whitespace.
///
/// Joining the result with single spaces gives back the input.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '?' | '!') {
            continue;
        }
        if let Some(&(next, ws)) = chars.peek() {
            if ws.is_whitespace() {
                let sentence = text[start..i + c.len_utf8()].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Greedily pack sentences into windows of at most `max_tokens` tokens as
/// measured by `count`.
///
/// A window is flushed when appending the next sentence would exceed the
/// budget; a sentence over budget on its own still forms a window.
pub fn pack_windows<F>(sentences: &[&str], max_tokens: usize, mut count: F) -> anyhow::Result<Vec<String>>
where
    F: FnMut(&str) -> anyhow::Result<usize>,
{
    let mut windows = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        if current.is_empty() {
            current.push_str(sentence);
            continue;
        }
        let candidate = format!("{current} {sentence}");
        if count(&candidate)? > max_tokens {
            windows.push(std::mem::replace(&mut current, sentence.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        windows.push(current);
    }
    Ok(windows)
}

/// At most `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let text = normalize_whitespace("  First one.  Second?\nThird!   e.g.this stays  ");
        assert_eq!(text, "First one. Second? Third! e.g.this stays");
        let sentences = split_sentences(&text);
        assert_eq!(sentences, ["First one.", "Second?", "Third!", "e.g.this stays"]);
        assert_eq!(sentences.join(" "), text);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("ünïcödé", 3), "ünï");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("", 5), "");
    }
}
