pub mod deposit_fetcher;
pub mod errors;
pub mod fallback;
pub mod provider;
pub mod raw;
pub mod signing_key_fetcher;
