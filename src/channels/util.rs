//! Shared helpers for the Discord channel: response chunking and
//! bot-mention handling.

/// Discord's per-message character limit.
pub const MESSAGE_LIMIT: usize = 2000;
/// Chunk body size used when a response has to be split.
pub const CHUNK_LIMIT: usize = 1900;
/// Prefix carried by every chunk after the first.
pub const CONTINUATION_MARKER: &str = "(continued) ";

/// Split an over-long response into ordered send-ready chunks.
///
/// Text at or under [`MESSAGE_LIMIT`] characters goes out as a single message.
/// Anything longer is cut into bodies of at most [`CHUNK_LIMIT`] characters,
/// preferring newline boundaries; chunks after the first are prefixed with
/// [`CONTINUATION_MARKER`]. Every character of the input survives, so
/// stripping the markers and concatenating the bodies reproduces the
/// original text exactly.
pub fn split_response(text: &str) -> Vec<String> {
    if text.chars().count() <= MESSAGE_LIMIT {
        return vec![text.to_string()];
    }

    let mut chunks = split_exact(text, CHUNK_LIMIT);
    for chunk in chunks.iter_mut().skip(1) {
        chunk.insert_str(0, CONTINUATION_MARKER);
    }
    chunks
}

/// Cut `text` into pieces of at most `max_chars` characters without losing
/// any character. Prefers cutting just after the last newline inside the
/// window; hard-cuts at the window edge otherwise.
fn split_exact(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    loop {
        let mut window_end = None;
        let mut last_newline = None;
        for (count, (idx, ch)) in rest.char_indices().enumerate() {
            if count == max_chars {
                window_end = Some(idx);
                break;
            }
            if ch == '\n' {
                last_newline = Some(idx + 1);
            }
        }

        match window_end {
            None => {
                if !rest.is_empty() {
                    chunks.push(rest.to_string());
                }
                return chunks;
            }
            Some(idx) => {
                let cut = last_newline.unwrap_or(idx);
                chunks.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
        }
    }
}

/// Index of the onboarding target among position-sorted text channels,
/// given `(name, postable)` pairs: "general" when the bot can post there,
/// otherwise the first channel it can post to.
pub fn welcome_channel_index(channels: &[(&str, bool)]) -> Option<usize> {
    channels
        .iter()
        .position(|(name, postable)| *postable && *name == "general")
        .or_else(|| channels.iter().position(|(_, postable)| *postable))
}

/// Whether the raw message body itself mentions the bot.
///
/// Detection is on the content's mention tokens, not the gateway's mention
/// list: a reply to one of the bot's messages carries the bot in its mention
/// list without the author ever typing the mention, and must not trigger.
pub fn mentions_directly(content: &str, bot_id: u64) -> bool {
    content.contains(&format!("<@{}>", bot_id)) || content.contains(&format!("<@!{}>", bot_id))
}

/// Remove every bot self-mention token from the body and trim the remainder.
pub fn strip_bot_mentions(content: &str, bot_id: u64) -> String {
    content
        .replace(&format!("<@!{}>", bot_id), "")
        .replace(&format!("<@{}>", bot_id), "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: &[String]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                if i == 0 {
                    chunk.as_str()
                } else {
                    chunk
                        .strip_prefix(CONTINUATION_MARKER)
                        .expect("continuation chunk missing marker")
                }
            })
            .collect()
    }

    #[test]
    fn short_text_is_untouched() {
        let text = "hello\nworld";
        assert_eq!(split_response(text), vec![text.to_string()]);

        let at_limit: String = "a".repeat(MESSAGE_LIMIT);
        assert_eq!(split_response(&at_limit).len(), 1);
    }

    #[test]
    fn long_text_splits_into_bounded_chunks() {
        let text = "x".repeat(5000);
        let chunks = split_response(&text);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            let body = if i == 0 {
                chunk.as_str()
            } else {
                chunk.strip_prefix(CONTINUATION_MARKER).unwrap()
            };
            assert!(body.chars().count() <= CHUNK_LIMIT);
        }
    }

    #[test]
    fn only_continuation_chunks_carry_the_marker() {
        let text = "y".repeat(4100);
        let chunks = split_response(&text);
        assert!(!chunks[0].starts_with(CONTINUATION_MARKER));
        for chunk in &chunks[1..] {
            assert!(chunk.starts_with(CONTINUATION_MARKER));
        }
    }

    #[test]
    fn concatenated_bodies_reconstruct_the_original_exactly() {
        let mut text = String::new();
        for i in 0..400 {
            text.push_str(&format!("line {} with some padding text\n", i));
        }
        text.push_str("no trailing newline");

        let chunks = split_response(&text);
        assert!(chunks.len() > 1);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn reconstruction_survives_text_without_newlines() {
        let text = "z".repeat(4321);
        let chunks = split_response(&text);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld 🦀 ".repeat(300);
        let chunks = split_response(&text);
        assert!(chunks.len() > 1);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn welcome_target_prefers_a_postable_general() {
        let channels = [("random", true), ("general", true)];
        assert_eq!(welcome_channel_index(&channels), Some(1));
    }

    #[test]
    fn locked_general_falls_back_to_the_first_postable_channel() {
        let channels = [("lobby", false), ("general", false), ("chat", true)];
        assert_eq!(welcome_channel_index(&channels), Some(2));
    }

    #[test]
    fn no_postable_channel_means_no_welcome_target() {
        let channels = [("general", false), ("chat", false)];
        assert_eq!(welcome_channel_index(&channels), None);
    }

    #[test]
    fn direct_mention_detection() {
        let bot = 1234;
        assert!(mentions_directly("<@1234> hi", bot));
        assert!(mentions_directly("hi <@!1234>", bot));
        // Reply-quoting puts the bot in the mention list, not in the body:
        // without a typed token this must not trigger.
        assert!(!mentions_directly("just replying to the bot", bot));
        assert!(!mentions_directly("<@9999> someone else", bot));
    }

    #[test]
    fn stripping_removes_every_token_and_trims() {
        let bot = 42;
        assert_eq!(strip_bot_mentions("<@42> hello <@!42> there", bot), "hello  there");
        assert_eq!(strip_bot_mentions("  <@42>  ", bot), "");
        assert_eq!(strip_bot_mentions("<@42>", bot), "");
        assert_eq!(strip_bot_mentions("no mention here", bot), "no mention here");
    }
}
