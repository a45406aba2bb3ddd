use once_cell::sync::Lazy;
use regex::Regex;

/// Telegram hard limit for one message.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Literal token the model emits when no clarification is needed. The
/// markers below are part of the prompt contract and must stay bit-exact.
pub const SKIP_INTERVIEW_MARKER: &str = "[SKIP_INTERVIEW]";

static SUBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[SUBJECT:\s*([^\]]+)\]").unwrap());
static SUBJECT_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?\[SUBJECT:[^\]]+\]").unwrap());
static OPTIONS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[ВАРИАНТЫ:\s*([^\]]+)\]").unwrap());
static OPTIONS_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?\[ВАРИАНТЫ:[^\]]+\]").unwrap());

pub fn should_skip_interview(text: &str) -> bool {
    text.contains(SKIP_INTERVIEW_MARKER)
}

/// `[SUBJECT: algebra]` anywhere in the solve response.
pub fn extract_subject(text: &str) -> Option<String> {
    SUBJECT_RE
        .captures(text)
        .map(|captures| captures[1].trim().to_string())
}

pub fn remove_subject_tag(text: &str) -> String {
    SUBJECT_TAG_RE.replace_all(text, "").trim().to_string()
}

/// `[ВАРИАНТЫ: a | b | c]` — pipe-separated multiple-choice answers embedded
/// in the interview question. Returns the text with the tag stripped.
pub fn extract_interview_options(text: &str) -> (String, Option<Vec<String>>) {
    let Some(captures) = OPTIONS_RE.captures(text) else {
        return (text.to_string(), None);
    };

    let options = captures[1]
        .split('|')
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty())
        .collect::<Vec<_>>();

    let clean = OPTIONS_TAG_RE.replace_all(text, "").trim().to_string();

    if options.is_empty() {
        (clean, None)
    } else {
        (clean, Some(options))
    }
}

/// Splits a long answer into Telegram-sized chunks, preferring paragraph
/// boundaries, then lines, then a hard character split.
pub fn split_message(text: &str, max_length: usize) -> Vec<String> {
    if char_len(text) <= max_length {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        if char_len(paragraph) > max_length {
            flush(&mut chunks, &mut current);
            for line in paragraph.split('\n') {
                if char_len(line) > max_length {
                    flush(&mut chunks, &mut current);
                    chunks.extend(char_chunks(line, max_length));
                } else {
                    append(&mut chunks, &mut current, line, "\n", max_length);
                }
            }
        } else {
            append(&mut chunks, &mut current, paragraph, "\n\n", max_length);
        }
    }

    flush(&mut chunks, &mut current);

    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn append(chunks: &mut Vec<String>, current: &mut String, part: &str, separator: &str, max_length: usize) {
    if !current.is_empty() && char_len(current) + char_len(separator) + char_len(part) > max_length {
        flush(chunks, current);
    }

    if current.is_empty() {
        current.push_str(part);
    } else {
        current.push_str(separator);
        current.push_str(part);
    }
}

fn char_chunks(s: &str, max_length: usize) -> Vec<String> {
    let chars = s.chars().collect::<Vec<_>>();
    chars
        .chunks(max_length)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_marker_is_detected_anywhere() {
        assert!(should_skip_interview("[SKIP_INTERVIEW]"));
        assert!(should_skip_interview("Всё понятно.\n[SKIP_INTERVIEW]"));
        assert!(!should_skip_interview("Какой у тебя класс?"));
    }

    #[test]
    fn subject_tag_is_extracted_and_stripped() {
        let answer = "Ответ: 4.\n\n[SUBJECT: математика]";
        assert_eq!(extract_subject(answer).as_deref(), Some("математика"));
        assert_eq!(remove_subject_tag(answer), "Ответ: 4.");
    }

    #[test]
    fn subject_tag_in_the_middle_is_also_stripped() {
        let answer = "До.[SUBJECT: физика] После.";
        assert_eq!(extract_subject(answer).as_deref(), Some("физика"));
        assert_eq!(remove_subject_tag(answer), "До. После.");
    }

    #[test]
    fn missing_subject_leaves_text_unchanged() {
        assert_eq!(extract_subject("Просто ответ"), None);
        assert_eq!(remove_subject_tag("Просто ответ"), "Просто ответ");
    }

    #[test]
    fn interview_options_are_parsed() {
        let text = "Какой у тебя класс?\n[ВАРИАНТЫ: 9 класс | 10 класс | 11 класс]";
        let (clean, options) = extract_interview_options(text);
        assert_eq!(clean, "Какой у тебя класс?");
        assert_eq!(
            options,
            Some(vec!["9 класс".to_string(), "10 класс".to_string(), "11 класс".to_string()])
        );
    }

    #[test]
    fn text_without_options_passes_through() {
        let (clean, options) = extract_interview_options("Уточни условие задачи.");
        assert_eq!(clean, "Уточни условие задачи.");
        assert_eq!(options, None);
    }

    #[test]
    fn short_messages_are_not_split() {
        assert_eq!(split_message("привет", 4096), vec!["привет".to_string()]);
    }

    #[test]
    fn long_messages_split_at_paragraphs_within_limit() {
        let text = format!("{}\n\n{}\n\n{}", "а".repeat(30), "б".repeat(30), "в".repeat(30));
        let chunks = split_message(&text, 40);

        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 40));
        assert!(chunks[0].starts_with('а'));
    }

    #[test]
    fn oversized_line_is_hard_split() {
        let text = "х".repeat(100);
        let chunks = split_message(&text, 40);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 40);
        assert_eq!(chunks[2].chars().count(), 20);
    }
}
