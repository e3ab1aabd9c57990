pub mod deposit_root;
pub mod verify_cache;
