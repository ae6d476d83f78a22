//! Inline emote ranges and offset-safe splicing

use std::collections::BTreeMap;

/// Inclusive byte span of the original message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmoteRange {
    pub start: usize,
    pub end: usize,
}

impl EmoteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Emote id -> spans where the emote appears
pub type InlineEmotes = BTreeMap<String, Vec<EmoteRange>>;

/// Parse a Twitch `emotes` tag (`25:0-4,12-16/1902:6-10`)
///
/// Twitch indexes by Unicode code point; the result is converted to byte
/// offsets into `text`. Malformed or out-of-bounds entries are dropped.
pub fn parse_emote_ranges(tag: &str, text: &str) -> InlineEmotes {
    // byte offset of every code point, plus one past the end
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut emotes = InlineEmotes::new();
    for entry in tag.split('/').filter(|e| !e.is_empty()) {
        let Some((id, spans)) = entry.split_once(':') else {
            tracing::debug!(entry = %entry, "Skipping malformed emote entry");
            continue;
        };

        let ranges: Vec<EmoteRange> = spans
            .split(',')
            .filter_map(|span| {
                let (start, end) = span.split_once('-')?;
                let start: usize = start.trim().parse().ok()?;
                let end: usize = end.trim().parse().ok()?;
                if start > end {
                    return None;
                }
                let start_byte = *offsets.get(start)?;
                let end_byte = offsets.get(end + 1)?.checked_sub(1)?;
                Some(EmoteRange::new(start_byte, end_byte))
            })
            .collect();

        if !ranges.is_empty() {
            emotes.entry(id.to_string()).or_default().extend(ranges);
        }
    }
    emotes
}

/// Flatten ranges into substitution order: descending start offset
///
/// Spans outside `text`, not on char boundaries, or overlapping a span
/// already accepted are dropped.
pub fn plan_ranges<'a>(text: &str, emotes: &'a InlineEmotes) -> Vec<(EmoteRange, &'a str)> {
    let mut all: Vec<(EmoteRange, &str)> = emotes
        .iter()
        .flat_map(|(id, ranges)| ranges.iter().map(move |r| (*r, id.as_str())))
        .collect();
    all.sort_by(|a, b| b.0.cmp(&a.0));

    let mut limit = text.len();
    all.into_iter()
        .filter(|(range, id)| {
            let valid = range.start <= range.end
                && range.end < limit
                && text.is_char_boundary(range.start)
                && text.is_char_boundary(range.end + 1);
            if valid {
                limit = range.start;
            } else {
                tracing::debug!(
                    emote_id = %id,
                    start = range.start,
                    end = range.end,
                    "Skipping invalid or overlapping emote range"
                );
            }
            valid
        })
        .collect()
}

/// Replace each span of `text` with its replacement
///
/// `replacements` must be ordered by descending start and non-overlapping,
/// as produced by [`plan_ranges`], so earlier splices never shift offsets of
/// spans still to be processed.
pub fn splice_descending(text: &str, replacements: &[(EmoteRange, String)]) -> String {
    let mut out = text.to_string();
    for (range, replacement) in replacements {
        out.replace_range(range.start..=range.end, replacement);
    }
    out
}
