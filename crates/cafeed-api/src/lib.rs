// cafeed-api: wire protocol and auto-reconnecting feed connection

pub mod auth;
pub mod connection;
pub mod error;
pub mod event;
pub mod protocol;

pub use auth::{StaticToken, TokenProvider};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, ReconnectConfig};
pub use error::Error;
pub use event::{CaEvent, CaPayload, MentionStats, TokenMention, TweetInfo, UserInfo};
pub use protocol::{
    ClientMessage, ErrorCode, FilterGroups, MentionThresholds, QualityThresholds, ServerMessage,
    SubscriptionFilter,
};
