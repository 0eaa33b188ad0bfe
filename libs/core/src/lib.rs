//! SOS messenger core contracts and value types.
//!
//! This crate holds the data exchanged between the webhook ingress, the dialogue
//! actions, and the Messenger send API: the inbound event envelope, the outbound
//! message shapes, the static guideline catalog, and the HTTP adapter that posts
//! messages to the Graph API.
pub mod egress;
pub mod guidelines;
pub mod platforms;
pub mod testkit;
pub mod types;

pub use egress::*;
pub use guidelines::{EmergencyCategory, GuidelineCard};
pub use platforms::messenger::{MessengerCredentials, MessengerSender, RetryPolicy};
pub use types::*;
