mod settings;

pub use settings::{
    DiscordConfig, RelayConfig, Settings, TwitchConfig, load_settings, parse_settings,
};
