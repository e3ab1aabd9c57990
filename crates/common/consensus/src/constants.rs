use alloy_primitives::{aliases::B32, fixed_bytes};

pub const DEPOSIT_CONTRACT_TREE_DEPTH: usize = 32;

/// The deposit contract refuses deposits once this many have been made.
pub const MAX_DEPOSIT_COUNT: u64 = (1 << DEPOSIT_CONTRACT_TREE_DEPTH) - 1;

pub const DOMAIN_DEPOSIT: B32 = fixed_bytes!("03000000");

pub const GENESIS_FORK_VERSION_MAINNET: B32 = fixed_bytes!("00000000");
pub const GENESIS_FORK_VERSION_PRATER: B32 = fixed_bytes!("00001020");
pub const GENESIS_FORK_VERSION_HOLESKY: B32 = fixed_bytes!("01017000");

pub const CHAIN_ID_MAINNET: u64 = 1;
pub const CHAIN_ID_GOERLI: u64 = 5;
pub const CHAIN_ID_HOLESKY: u64 = 17000;

pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_ROPOP";

/// Genesis fork version used for the deposit signature domain on a given chain.
pub fn genesis_fork_version(chain_id: u64) -> Option<B32> {
    match chain_id {
        CHAIN_ID_MAINNET => Some(GENESIS_FORK_VERSION_MAINNET),
        CHAIN_ID_GOERLI => Some(GENESIS_FORK_VERSION_PRATER),
        CHAIN_ID_HOLESKY => Some(GENESIS_FORK_VERSION_HOLESKY),
        _ => None,
    }
}

/// Block at which the deposit contract was deployed on a given chain.
pub fn deposit_contract_deployment_block(chain_id: u64) -> Option<u64> {
    match chain_id {
        CHAIN_ID_MAINNET => Some(11_052_984),
        CHAIN_ID_GOERLI => Some(4_367_322),
        CHAIN_ID_HOLESKY => Some(0),
        _ => None,
    }
}
