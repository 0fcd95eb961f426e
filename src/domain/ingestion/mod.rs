// Backfiller: one-shot ingest operations per data stream.
pub mod engine;
// Forever-loop driver with overlap re-fetch, distinct from a one-shot ingest.
pub mod scheduler;
