//! Heuristic cleaner for text extracted from textbook pages.
//!
//! [`TextNormalizer::normalize`] runs the passes in [`passes`] in a fixed
//! order. Later passes see the output of earlier ones, so the order is part of
//! the behaviour: noise stripping runs before bullet detection, for example,
//! which means only `-` bullets survive to be extracted.

use crate::types::{Segment, SegmentKind};

/// Result of cleaning one document. `cleaned` and `narrative` are the final
/// intermediate buffers, kept for inspection; only `segments` is embedded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub segments: Vec<Segment>,
    pub cleaned: String,
    pub narrative: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Ordered segments: metadata, then list items, then narrative sentences.
    pub fn clean(&self, raw_text: &str) -> Vec<Segment> {
        self.normalize(raw_text).segments
    }

    pub fn normalize(&self, raw_text: &str) -> Normalized {
        let mut segments = Vec::new();

        let mut cleaned = passes::collapse_whitespace(raw_text);
        segments.extend(passes::extract_isbn(&cleaned));
        // The author line is delimited by a line break, which only the raw text still has.
        segments.extend(passes::extract_author(raw_text));

        cleaned = passes::strip_arabic(&cleaned);
        cleaned = passes::strip_noise(&cleaned);
        cleaned = passes::strip_leading_punctuation(&cleaned);
        cleaned = passes::collapse_repeated_words(&cleaned);

        segments.extend(passes::extract_list_items(&cleaned));

        let narrative = passes::strip_metadata_spans(&passes::strip_list_spans(&cleaned));
        segments.extend(passes::split_sentences(&narrative));

        Normalized {
            segments,
            cleaned: passes::drop_punctuation_lines(&cleaned, false),
            narrative: passes::drop_punctuation_lines(&narrative, true),
        }
    }
}

pub mod passes {
    use regex::Regex;
    use std::sync::OnceLock;

    use crate::types::{Segment, SegmentKind};

    /// `\x81` is how one legacy PDF extractor emits its bullet glyph.
    pub const BULLETS: [char; 3] = ['\u{81}', '•', '-'];

    fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
        cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
    }

    pub fn collapse_whitespace(text: &str) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        cached(&RE, r"\s+").replace_all(text, " ").trim().to_string()
    }

    pub fn extract_isbn(text: &str) -> Option<Segment> {
        static RE: OnceLock<Regex> = OnceLock::new();
        cached(&RE, r"(?i)ISBN[\s:\-]*([\d\-]+)")
            .captures(text)
            .map(|c| Segment::new(SegmentKind::Metadata, format!("ISBN: {}", &c[1])))
    }

    /// Text after the `Center` marker up to the next line break.
    pub fn extract_author(text: &str) -> Option<Segment> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let caps = cached(&RE, r"(?i)Center\s*(.*?)\n").captures(text)?;
        let name = caps[1].trim();
        if name.is_empty() {
            return None;
        }
        Some(Segment::new(SegmentKind::Metadata, format!("Author: {name}")))
    }

    pub fn strip_arabic(text: &str) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        cached(&RE, r"[\x{0600}-\x{06FF}]+").replace_all(text, "").into_owned()
    }

    /// Layout-file stems, page numbers, clock times, URLs, then anything
    /// outside the character whitelist.
    pub fn strip_noise(text: &str) -> String {
        static INDB: OnceLock<Regex> = OnceLock::new();
        static PAGE_NUMBER: OnceLock<Regex> = OnceLock::new();
        static CLOCK: OnceLock<Regex> = OnceLock::new();
        static URL: OnceLock<Regex> = OnceLock::new();
        static OUTSIDE_WHITELIST: OnceLock<Regex> = OnceLock::new();

        let text = cached(&INDB, r"WC\d?[_\w]+\.indb").replace_all(text, "");
        let text = cached(&PAGE_NUMBER, r"\b\d{1,2}\b").replace_all(&text, "");
        let text = cached(&CLOCK, r"PM|AM|[0-9]{1,2}:[0-9]{2}").replace_all(&text, "");
        let text = cached(&URL, r"www\.[^\s]+|http[^\s]+").replace_all(&text, "");
        let text = cached(&OUTSIDE_WHITELIST, r"[^\w\s.,:!/'\-]").replace_all(&text, "");
        text.into_owned()
    }

    pub fn strip_leading_punctuation(text: &str) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        cached(&RE, r"^[.,!?'\-]").replace(text, "").into_owned()
    }

    /// `"the the cat"` -> `"the cat"`. Exact, case-sensitive matches of whole
    /// words separated only by whitespace; scanning resumes after each
    /// collapsed pair, so `"a a a"` becomes `"a a"`.
    pub fn collapse_repeated_words(text: &str) -> String {
        static WORD: OnceLock<Regex> = OnceLock::new();
        let words: Vec<_> = cached(&WORD, r"\w+").find_iter(text).collect();

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut i = 0;
        while i < words.len() {
            let word = words[i];
            if let Some(next) = words.get(i + 1) {
                let gap = &text[word.end()..next.start()];
                let whitespace_gap = !gap.is_empty() && gap.chars().all(char::is_whitespace);
                if whitespace_gap && next.as_str() == word.as_str() {
                    out.push_str(&text[cursor..word.end()]);
                    cursor = next.end();
                    i += 2;
                    continue;
                }
            }
            i += 1;
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Each bullet glyph opens an item that runs to the next glyph or the end.
    /// Adjacent glyphs yield an empty item, which is kept.
    pub fn extract_list_items(text: &str) -> Vec<Segment> {
        let mut items = Vec::new();
        let Some(first) = text.find(&BULLETS[..]) else { return items };
        let mut rest = &text[first..];
        while let Some(glyph) = rest.chars().next() {
            let body = &rest[glyph.len_utf8()..];
            let (item, tail) = match body.find(&BULLETS[..]) {
                Some(n) => (&body[..n], &body[n..]),
                None => (body, ""),
            };
            items.push(Segment::new(SegmentKind::ListItem, item.trim()));
            rest = tail;
        }
        items
    }

    /// Everything before the first bullet glyph.
    pub fn strip_list_spans(text: &str) -> String {
        let head = match text.find(&BULLETS[..]) {
            Some(n) => &text[..n],
            None => text,
        };
        head.trim().to_string()
    }

    /// Removes ISBN spans and the `Center` marker itself. The author text that
    /// follows the marker is left in place.
    pub fn strip_metadata_spans(text: &str) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        cached(&RE, r"(?i)ISBN[\s:\-]*[\d\-]+|Center\s*").replace_all(text, "").trim().to_string()
    }

    /// Splits after `.`, `!` or `?` followed by whitespace.
    pub fn split_sentences(text: &str) -> Vec<Segment> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut push = |s: &str| {
            let s = s.trim();
            if !s.is_empty() {
                sentences.push(Segment::new(SegmentKind::Narrative, s));
            }
        };
        for m in cached(&RE, r"[.!?]\s+").find_iter(text) {
            // terminators are single-byte ASCII
            push(&text[start..=m.start()]);
            start = m.end();
        }
        push(&text[start..]);
        sentences
    }

    /// Drops lines that hold a single punctuation mark and nothing else.
    pub fn drop_punctuation_lines(text: &str, trim_start: bool) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = cached(&RE, r"^\s*[.,!?'\-]\s*$");
        text.split('\n')
            .filter(|line| !re.is_match(line))
            .map(|line| if trim_start { line.trim_start() } else { line })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Kinds that reach the embedding step.
pub const EMBEDDED_KINDS: [SegmentKind; 3] =
    [SegmentKind::Metadata, SegmentKind::ListItem, SegmentKind::Narrative];
