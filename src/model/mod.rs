pub mod clock;
pub mod record;

pub use clock::MonotonicClock;
pub use record::{build_records, MatchRecord, ParsedMatch, HEADER};
