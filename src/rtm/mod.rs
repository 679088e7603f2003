//! RTM transport - HTTP API client, typed wire events, and the websocket loop.

pub mod api;
pub mod event;
pub mod socket;

pub use api::{BotIdentity, ReferencedMessage, RtmApi, RtmError};
pub use event::{ChannelKind, InboundMessage, RtmEvent};
pub use socket::{OutboundMessage, RtmLoop};
