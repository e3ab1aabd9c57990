use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use alloy_primitives::{Address, Bytes, B256};
use anyhow::anyhow;
use guardian_chain::{
    deposit_fetcher::format_deposit_event,
    errors::FetchError,
    provider::{BlockProvider, DepositLogSource, DepositRootReader, SigningKeyLogSource},
    raw::{RawDepositLog, RawSigningKeyLog},
};
use guardian_consensus::{
    block::{BlockHeader, BlockTag},
    constants::{CHAIN_ID_HOLESKY, GENESIS_FORK_VERSION_HOLESKY},
    deposit_tree::DepositTree,
};
use guardian_storage::{
    errors::StoreError,
    kv::{KeyValueStore, WriteBatch},
    mem_store::MemStore,
};

use crate::config::RegistryConfig;

pub fn block_hash(number: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xbb;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::from(bytes)
}

fn block_number(hash: B256) -> Option<u64> {
    (hash[0] == 0xbb).then(|| u64::from_be_bytes(hash[24..].try_into().unwrap_or([0; 8])))
}

pub fn header(number: u64) -> BlockHeader {
    BlockHeader {
        number,
        hash: block_hash(number),
    }
}

pub fn deposit_log(index: u64, block_number: u64) -> RawDepositLog {
    let mut pubkey = vec![0xaa; 48];
    pubkey[..8].copy_from_slice(&index.to_le_bytes());
    RawDepositLog {
        pubkey: Bytes::from(pubkey),
        withdrawal_credentials: Bytes::from(vec![0x01; 32]),
        amount: Bytes::from(32_000_000_000u64.to_le_bytes().to_vec()),
        signature: Bytes::from(vec![0xbb; 96]),
        index: Bytes::from(index.to_le_bytes().to_vec()),
        tx: B256::repeat_byte(0x02),
        block_number,
        block_hash: block_hash(block_number),
        log_index: 0,
    }
}

pub fn signing_key_log(key_byte: u8, block_number: u64, module: Address) -> RawSigningKeyLog {
    RawSigningKeyLog {
        operator_index: 1,
        pubkey: Bytes::from(vec![key_byte; 48]),
        module_address: module,
        log_index: 0,
        block_number,
        block_hash: block_hash(block_number),
    }
}

pub fn test_config() -> RegistryConfig {
    RegistryConfig {
        fetch_step: 50,
        fetch_retry_delay_secs: 0,
        deployment_block: Some(0),
        staking_module_deployment_block: Some(0),
        ..Default::default()
    }
}

/// In-memory chain: a head, a finalized block and the logs mined so far.
#[derive(Debug)]
pub struct FakeChain {
    pub head: Mutex<u64>,
    pub finalized: Mutex<u64>,
    pub deposits: Mutex<Vec<RawDepositLog>>,
    pub signing_keys: Mutex<Vec<RawSigningKeyLog>>,
    pub modules: Vec<Address>,
    /// Blocks whose deposit logs the node does not return.
    pub withheld: Mutex<Vec<u64>>,
}

impl FakeChain {
    pub fn new(head: u64, deposit_blocks: &[u64]) -> Self {
        let deposits = deposit_blocks
            .iter()
            .enumerate()
            .map(|(index, block)| deposit_log(index as u64, *block))
            .collect();
        Self {
            head: Mutex::new(head),
            finalized: Mutex::new(head.saturating_sub(64)),
            deposits: Mutex::new(deposits),
            signing_keys: Mutex::new(Vec::new()),
            modules: Vec::new(),
            withheld: Mutex::new(Vec::new()),
        }
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
        *self.finalized.lock().unwrap() = head.saturating_sub(64);
    }

    fn resolve(&self, tag: BlockTag) -> anyhow::Result<u64> {
        match tag {
            BlockTag::Latest => Ok(*self.head.lock().unwrap()),
            BlockTag::Finalized => Ok(*self.finalized.lock().unwrap()),
            BlockTag::Number(number) => Ok(number),
            BlockTag::Hash(hash) => block_number(hash).ok_or_else(|| anyhow!("unknown block {hash}")),
        }
    }
}

impl BlockProvider for FakeChain {
    async fn block(&self, tag: BlockTag) -> anyhow::Result<BlockHeader> {
        self.resolve(tag).map(header)
    }

    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(CHAIN_ID_HOLESKY)
    }
}

impl DepositRootReader for FakeChain {
    async fn deposit_root(&self, tag: BlockTag) -> anyhow::Result<B256> {
        let number = self.resolve(tag)?;
        let mut tree = DepositTree::new();
        for log in self.deposits.lock().unwrap().iter() {
            if log.block_number > number {
                break;
            }
            let event = format_deposit_event(log, GENESIS_FORK_VERSION_HOLESKY)?;
            tree.insert(event.deposit_data_root, event.deposit_count);
        }
        Ok(tree.get_root())
    }
}

impl DepositLogSource for FakeChain {
    async fn deposit_logs(
        &self,
        start_block: u64,
        end_block: u64,
    ) -> Result<Vec<RawDepositLog>, FetchError> {
        let withheld = self.withheld.lock().unwrap().clone();
        Ok(self
            .deposits
            .lock()
            .unwrap()
            .iter()
            .filter(|log| (start_block..=end_block).contains(&log.block_number))
            .filter(|log| !withheld.contains(&log.block_number))
            .cloned()
            .collect())
    }
}

impl SigningKeyLogSource for FakeChain {
    async fn signing_key_logs(
        &self,
        start_block: u64,
        end_block: u64,
        modules: &[Address],
    ) -> Result<Vec<RawSigningKeyLog>, FetchError> {
        Ok(self
            .signing_keys
            .lock()
            .unwrap()
            .iter()
            .filter(|log| (start_block..=end_block).contains(&log.block_number))
            .filter(|log| modules.contains(&log.module_address))
            .cloned()
            .collect())
    }

    async fn staking_module_addresses(&self, _tag: BlockTag) -> anyhow::Result<Vec<Address>> {
        Ok(self.modules.clone())
    }
}

/// Memory store whose writes can be switched off.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key)
    }

    fn range(&self, from: &[u8], to: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.inner.range(from, to)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        self.inner.write_batch(batch)
    }
}
