//! Product -> order book registry and event routing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use model::{FeedEvent, FeedMessage, PriceLevel};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::book::OrderBook;
use crate::error::OrderBookError;
use crate::gap::{GapDetector, NoGapDetection};

/// Read-only top-of-book view of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookView {
    pub instrument: String,
    pub sequence: u64,
    pub best_bid: Option<PriceLevel>,
    pub best_ask: Option<PriceLevel>,
}

impl BookView {
    fn of(book: &OrderBook) -> Self {
        Self {
            instrument: book.instrument().to_string(),
            sequence: book.sequence(),
            best_bid: book.best_bid().ok(),
            best_ask: book.best_ask().ok(),
        }
    }

    /// Whether best prices or quantities differ from `other`.
    pub fn top_changed(&self, other: &BookView) -> bool {
        self.best_bid != other.best_bid || self.best_ask != other.best_ask
    }
}

impl fmt::Display for BookView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instrument)?;
        match &self.best_bid {
            Some(level) => write!(f, " bid: {} @ {}", level.quantity, level.price)?,
            None => write!(f, " bid: -")?,
        }
        match &self.best_ask {
            Some(level) => write!(f, "\task: {} @ {}", level.quantity, level.price),
            None => write!(f, "\task: -"),
        }
    }
}

/// What `route` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The event was applied; `sequence` is the book's counter afterwards.
    Applied { instrument: String, sequence: u64 },
    /// Subscription or heartbeat, no book touched.
    Ignored,
}

/// Owns one `OrderBook` per configured product.
///
/// The set of products is fixed at construction. Each book sits behind its
/// own lock and a batch is applied under a single write guard, so readers
/// never see a half-applied batch.
pub struct BookRegistry {
    books: HashMap<String, RwLock<OrderBook>>,
    gap_detector: Mutex<Box<dyn GapDetector>>,
    gaps_detected: AtomicU64,
}

impl BookRegistry {
    /// Build a registry with an empty book for each product.
    ///
    /// # Errors
    /// `OrderBookError::NoInstruments` if `instruments` is empty.
    pub fn new<I, S>(instruments: I) -> Result<Self, OrderBookError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let books: HashMap<String, RwLock<OrderBook>> = instruments
            .into_iter()
            .map(Into::into)
            .map(|instrument: String| (instrument.clone(), RwLock::new(OrderBook::new(instrument))))
            .collect();

        if books.is_empty() {
            return Err(OrderBookError::NoInstruments);
        }

        Ok(Self {
            books,
            gap_detector: Mutex::new(Box::new(NoGapDetection)),
            gaps_detected: AtomicU64::new(0),
        })
    }

    /// Replace the gap detector.
    pub fn with_gap_detector(self, detector: impl GapDetector + 'static) -> Self {
        *self.gap_detector.lock() = Box::new(detector);
        self
    }

    /// Configured products, sorted.
    pub fn instruments(&self) -> Vec<String> {
        let mut instruments: Vec<String> = self.books.keys().cloned().collect();
        instruments.sort();
        instruments
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.books.contains_key(instrument)
    }

    /// Number of gaps reported by the detector so far.
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected.load(Ordering::Relaxed)
    }

    /// Route a single event to its book.
    ///
    /// # Errors
    /// `OrderBookError::UnknownInstrument` if the event names a product that
    /// was never configured. No book is modified in that case.
    pub fn route(&self, event: &FeedEvent) -> Result<RouteOutcome, OrderBookError> {
        self.route_with_sequence(event, None)
    }

    /// Route every event of a decoded frame, in order.
    ///
    /// All products are checked before anything is applied, so a frame naming
    /// an unknown product leaves every book untouched.
    pub fn route_message(&self, message: &FeedMessage) -> Result<Vec<RouteOutcome>, OrderBookError> {
        if let Some(unknown) = message
            .events
            .iter()
            .filter_map(FeedEvent::instrument)
            .find(|instrument| !self.contains(instrument))
        {
            return Err(OrderBookError::UnknownInstrument(unknown.to_string()));
        }

        message
            .events
            .iter()
            .map(|event| self.route_with_sequence(event, message.sequence_num))
            .collect()
    }

    fn route_with_sequence(
        &self,
        event: &FeedEvent,
        upstream_sequence: Option<u64>,
    ) -> Result<RouteOutcome, OrderBookError> {
        let instrument = match event.instrument() {
            Some(instrument) => instrument,
            None => return Ok(RouteOutcome::Ignored),
        };

        let book = self
            .books
            .get(instrument)
            .ok_or_else(|| OrderBookError::UnknownInstrument(instrument.to_string()))?;

        if let Some(gap) = self.gap_detector.lock().observe(instrument, upstream_sequence) {
            self.gaps_detected.fetch_add(1, Ordering::Relaxed);
            warn!(
                product = %gap.instrument,
                expected = gap.expected,
                actual = gap.actual,
                "upstream sequence gap"
            );
        }

        let mut book = book.write();
        match event {
            FeedEvent::Snapshot { levels, .. } => book.apply_snapshot(levels),
            // The first batch always builds the book, whatever its type.
            FeedEvent::Update { changes, .. } if book.sequence() == 0 => {
                let levels: Vec<PriceLevel> = changes.iter().copied().map(PriceLevel::from).collect();
                book.apply_snapshot(&levels);
            }
            FeedEvent::Update { changes, .. } => book.apply_update(changes),
            FeedEvent::Subscription { .. } | FeedEvent::Heartbeat => {}
        }

        debug!(product = %instrument, sequence = book.sequence(), "batch applied");

        Ok(RouteOutcome::Applied {
            instrument: instrument.to_string(),
            sequence: book.sequence(),
        })
    }

    /// Top-of-book view for `instrument`.
    pub fn snapshot(&self, instrument: &str) -> Result<BookView, OrderBookError> {
        self.with_book(instrument, BookView::of)
    }

    /// Run `f` against a read-locked book.
    pub fn with_book<R>(
        &self,
        instrument: &str,
        f: impl FnOnce(&OrderBook) -> R,
    ) -> Result<R, OrderBookError> {
        let book = self
            .books
            .get(instrument)
            .ok_or_else(|| OrderBookError::UnknownInstrument(instrument.to_string()))?;
        let guard = book.read();
        Ok(f(&guard))
    }
}

impl fmt::Debug for BookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookRegistry")
            .field("instruments", &self.instruments())
            .field("gaps_detected", &self.gaps_detected())
            .finish()
    }
}
