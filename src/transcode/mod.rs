//! Message transcoding: badges and inline emotes to Discord emoji

mod ranges;
mod transcoder;
mod types;

pub use ranges::{EmoteRange, InlineEmotes, parse_emote_ranges, plan_ranges, splice_descending};
pub use transcoder::Transcoder;
pub use types::{BadgeRef, RenderedMessage};
