pub mod config;
pub mod deposit;
pub mod signing_keys;

#[cfg(test)]
pub(crate) mod test_utils;
