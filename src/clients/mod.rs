// External feed clients

pub mod messages;
pub mod pump_ws;

// Re-export client types
pub use messages::{classify, parse_new_token, parse_trade, FrameKind, NewTokenFrame, TradeFrame};
pub use pump_ws::{
    ConnectionState, FeedCommand, FrameHandler, StopHandle, StreamClient, StreamSettings, StreamStats,
};
