//! Herdsync notifications.
//!
//! An abnormal label is fanned out to every configured
//! [`NotificationChannel`]. Channels are independent: one failing, hanging or
//! panicking never stops the others and never fails the sync run.

mod channel;
pub mod channels;
mod dispatcher;
mod error;

pub use channel::{AlertMessage, NotificationChannel};
pub use channels::{TranslatedTextChannel, VoiceChannel, WebhookChannel};
pub use dispatcher::NotificationDispatcher;
pub use error::{NotifyError, NotifyResult};
