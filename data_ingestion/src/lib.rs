pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod finnhub;
pub mod logger;
pub mod tiingo;
pub mod timestamp;
pub mod yahoo;

pub use cache::{CacheHit, Memoizer, TtlCache};
pub use error::DataIngestionError;
pub use fetcher::{Candle, EarningsCalendar, Headline, MarketData, NewsSource, Quote, normalize_ticker};
