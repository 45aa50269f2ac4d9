//! Coinbase Advanced Trade websocket feed.
//!
//! - `decode_frame` turns a raw text frame into a `FeedMessage`.
//! - `FeedConnection` keeps one authenticated subscription alive, reconnecting
//!   after transport failures until it is closed.
//! - `OrderBookFeed` routes the decoded stream into a `BookRegistry`.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::ApiCredentials;
//! use connector_coinbase::{FeedConnection, OrderBookFeed};
//! use connector_core::ConnectorConfig;
//!
//! let connection = FeedConnection::new(ConnectorConfig::default(), ApiCredentials::from_env()?);
//! let feed = OrderBookFeed::new(connection)?;
//! let mut views = feed.subscribe_views();
//!
//! feed.start().await?;
//! while let Ok(view) = views.recv().await {
//!     println!("{}", view);
//! }
//! feed.close().await;
//! ```

mod book_feed;
mod connection;
mod parser;
mod subscribe;
mod ws_transport;

pub use book_feed::OrderBookFeed;
pub use connection::{FeedConnection, TimestampFn};
pub use parser::decode_frame;
pub use subscribe::SubscribeRequest;
pub use ws_transport::WsTransport;
