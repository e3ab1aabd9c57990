pub mod blockchain;
pub mod deposit;
pub mod errors;
pub mod integrity;

#[cfg(test)]
pub(crate) mod test_utils;
