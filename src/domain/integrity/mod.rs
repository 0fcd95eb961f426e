// Gap/duplicate detection over stored candles.
pub mod scanner;
// Re-fetch or flat-fill repair for a scanned range.
pub mod repair;
