mod client;
mod retry;

pub use client::{FetchMode, SheetsClient, SheetsClientOptions, TextFetcher};
pub use retry::{with_retry, FetchFailure, RetryPolicy};
