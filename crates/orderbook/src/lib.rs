//! Local order book mirror for level2 market data.
//!
//! `OrderBook` keeps one product's bids and asks in `BTreeMap`s keyed by
//! `Decimal` price, so best-price lookups are O(log n) and no precision is lost.
//! `BookRegistry` owns one book per configured product and routes decoded feed
//! events to them.
//!
//! # Example
//!
//! ```rust
//! use model::{PriceLevel, Side};
//! use orderbook::OrderBook;
//! use rust_decimal_macros::dec;
//!
//! let mut book = OrderBook::new("BTC-USD");
//!
//! book.apply_snapshot(&[
//!     PriceLevel::new(Side::Bid, dec!(100.00), dec!(1.5)),
//!     PriceLevel::new(Side::Ask, dec!(101.00), dec!(2.0)),
//! ]);
//!
//! assert_eq!(book.best_bid().unwrap().price, dec!(100.00));
//! assert_eq!(book.best_ask().unwrap().price, dec!(101.00));
//! assert_eq!(book.sequence(), 1);
//! ```

mod book;
mod error;
mod gap;
mod registry;

pub use book::OrderBook;
pub use error::OrderBookError;
pub use gap::{GapDetector, NoGapDetection, SequenceGap, SequenceGapDetector};
pub use model::{LevelUpdate, PriceLevel, Side};
pub use registry::{BookRegistry, BookView, RouteOutcome};
