//! Facebook Messenger send adapter.

pub mod creds;
pub mod retry;
pub mod sender;

pub use creds::MessengerCredentials;
pub use retry::RetryPolicy;
pub use sender::MessengerSender;
