pub mod block;
pub mod constants;
pub mod deposit_data;
pub mod deposit_event;
pub mod deposit_message;
pub mod deposit_tree;
pub mod event_group;
pub mod fork_data;
pub mod misc;
pub mod pubkey;
pub mod signature;
pub mod signing_data;
pub mod signing_key_event;
