//! Built-in notification channels.

mod translated;
mod voice;
mod webhook;

pub use translated::{TranslatedTextChannel, KANNADA_TEMPLATE};
pub use voice::VoiceChannel;
pub use webhook::WebhookChannel;
