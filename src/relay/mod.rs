//! Relay dispatch from source chat events to the destination

mod dispatcher;
mod sink;
mod types;

pub use dispatcher::RelayDispatcher;
pub use sink::{ChannelDirectory, MessageSink};
pub use types::{
    ChatEvent, DEFAULT_COLOR, MessageContext, RelayOutcome, normalize_channel, parse_color,
};
