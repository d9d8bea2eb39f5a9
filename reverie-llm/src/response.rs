//! Tolerant parsing of `Thought process:` / `Speech:` replies.

/// Used when a reply has no thought section.
pub const NO_THOUGHT: &str = "No thought process provided.";
/// Used when a reply has no speech section.
pub const NO_SPEECH: &str = "No speech provided.";

const THOUGHT_LABEL: &str = "thought process:";
const SPEECH_LABEL: &str = "speech:";

/// The two sections of a dialogue reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledReply {
    /// Private reasoning, never shown to the other agent.
    pub thought: String,
    /// Words actually spoken.
    pub speech: String,
}

/// Split a model reply into thought and speech.
///
/// - A leading `Response:` or `<name> responds:` line is dropped.
/// - Labels match case-insensitively and may be wrapped in markdown emphasis.
/// - The thought runs from its label to the first blank line after some
///   content, or to the speech label.
/// - The speech runs from its label to the end of the reply.
/// - A missing or empty section gets a placeholder sentence.
#[must_use]
pub fn parse_labeled_reply(text: &str) -> LabeledReply {
    let lines = strip_preamble(text);

    let mut thought: Vec<&str> = Vec::new();
    let mut speech: Vec<&str> = Vec::new();
    let mut section = Section::None;

    for line in lines {
        if let Some(rest) = after_label(line, SPEECH_LABEL) {
            section = Section::Speech;
            push_nonempty(&mut speech, rest);
            continue;
        }
        if section != Section::Speech {
            if let Some(rest) = after_label(line, THOUGHT_LABEL) {
                section = Section::Thought;
                thought.clear();
                push_nonempty(&mut thought, rest);
                continue;
            }
        }
        match section {
            Section::Thought => {
                if line.trim().is_empty() {
                    if !thought.is_empty() {
                        section = Section::None;
                    }
                } else {
                    thought.push(line.trim());
                }
            }
            Section::Speech => speech.push(line),
            Section::None => {}
        }
    }

    LabeledReply {
        thought: or_placeholder(&thought.join("\n"), NO_THOUGHT),
        speech: or_placeholder(&speech.join("\n"), NO_SPEECH),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Thought,
    Speech,
}

/// Lines of `text` without a leading response preamble.
fn strip_preamble(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    let Some(first) = lines.first().copied() else {
        return lines;
    };
    let lower = first.trim().to_ascii_lowercase();

    let cut = if lower.starts_with("response:") {
        Some("response:".len())
    } else if lower.ends_with("responds:") && after_label(first, THOUGHT_LABEL).is_none() {
        Some(lower.len())
    } else {
        None
    };

    if let Some(cut) = cut {
        let rest = first.trim().get(cut..).unwrap_or("").trim();
        if rest.is_empty() {
            lines.remove(0);
        } else {
            lines[0] = rest;
        }
    }
    lines
}

/// The text after `label` if `line` starts with it (ASCII case-insensitive,
/// ignoring markdown emphasis and heading marks).
fn after_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let trimmed = line.trim().trim_start_matches(['*', '#', '_', ' ']);
    let head = trimmed.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    Some(trimmed[label.len()..].trim_start_matches(['*', '_']).trim())
}

fn push_nonempty<'a>(acc: &mut Vec<&'a str>, s: &'a str) {
    if !s.is_empty() {
        acc.push(s);
    }
}

fn or_placeholder(s: &str, placeholder: &str) -> String {
    let s = s.trim();
    if s.is_empty() {
        placeholder.to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_reply() {
        let r = parse_labeled_reply(
            "Thought process:\nShe sounds stressed.\nI should help.\n\nSpeech:\nLet's split the work.",
        );
        assert_eq!(r.thought, "She sounds stressed.\nI should help.");
        assert_eq!(r.speech, "Let's split the work.");
    }

    #[test]
    fn preamble_and_case_are_ignored() {
        let r = parse_labeled_reply("Bo responds:\nTHOUGHT PROCESS: tired\n\nspeech: Fine.");
        assert_eq!(r.thought, "tired");
        assert_eq!(r.speech, "Fine.");

        let r = parse_labeled_reply("Response: Thought process: hm\nSpeech: ok");
        assert_eq!(r.thought, "hm");
        assert_eq!(r.speech, "ok");
    }

    #[test]
    fn thought_stops_at_speech_label_without_blank_line() {
        let r = parse_labeled_reply("Thought process: quick\nSpeech: Hello\nthere");
        assert_eq!(r.thought, "quick");
        assert_eq!(r.speech, "Hello\nthere");
    }

    #[test]
    fn markdown_labels() {
        let r = parse_labeled_reply("**Thought process:** careful\n\n**Speech:** Hi.");
        assert_eq!(r.thought, "careful");
        assert_eq!(r.speech, "Hi.");
    }

    #[test]
    fn missing_sections_get_placeholders() {
        let r = parse_labeled_reply("just some words");
        assert_eq!(r.thought, NO_THOUGHT);
        assert_eq!(r.speech, NO_SPEECH);

        let r = parse_labeled_reply("Speech: only this");
        assert_eq!(r.thought, NO_THOUGHT);
        assert_eq!(r.speech, "only this");

        assert_eq!(parse_labeled_reply("").speech, NO_SPEECH);
    }

    #[test]
    fn speech_keeps_internal_blank_lines() {
        let r = parse_labeled_reply("Speech:\nFirst.\n\nSecond.");
        assert_eq!(r.speech, "First.\n\nSecond.");
    }
}
