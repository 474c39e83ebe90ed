// Blockchain: ordered, append-only sequence of blocks, loaded from and persisted to disk.
use std::fs;
use std::path::PathBuf;

use crate::block::{genesis_prev_hash, hash_has_leading_zeros, Block};
use crate::diploma::DiplomaRecord;
use crate::error::AppError;

pub struct Blockchain {
    chain: Vec<Block>,
    dir: PathBuf,
    current_id: u64,
    pub difficulty: u32,
}

/// Material required to mint the genesis block when the chain directory is empty.
pub struct GenesisMaterial {
    pub diploma_data: DiplomaRecord,
    pub public_key_pem: String,
    pub difficulty: u32,
}

impl Blockchain {
    /// Loads every `Block_*.json` file from `dir`, sorted by numeric id, and
    /// verifies hash/link invariants as it goes. If the directory is empty and
    /// `genesis` is `None`, returns `ServerError` ("uninitialized"). If empty
    /// and `genesis` is supplied, mines and persists block 0.
    pub fn open(dir: impl Into<PathBuf>, genesis: Option<GenesisMaterial>) -> Result<Blockchain, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| AppError::ServerError(format!("cannot create chain dir: {e}")))?;

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| AppError::ServerError(e.to_string()))? {
            let entry = entry.map_err(|e| AppError::ServerError(e.to_string()))?;
            if let Some(id) = parse_block_id(&entry.file_name().to_string_lossy()) {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        if ids.is_empty() {
            let Some(genesis) = genesis else {
                return Err(AppError::ServerError("blockchain directory is empty and no genesis material was supplied".to_string()));
            };
            let mut blockchain = Blockchain {
                chain: Vec::new(),
                dir,
                current_id: 0,
                difficulty: genesis.difficulty,
            };
            let mut block = Block::new(0, genesis.diploma_data, genesis.public_key_pem, genesis_prev_hash(), genesis.difficulty)?;
            block.mine();
            blockchain.persist(&block)?;
            blockchain.chain.push(block);
            blockchain.current_id = 1;
            return Ok(blockchain);
        }

        let mut chain = Vec::with_capacity(ids.len());
        let mut difficulty = 4;
        for id in &ids {
            let path = dir.join(block_file_name(*id));
            let bytes = fs::read(&path).map_err(|e| AppError::ServerError(format!("cannot read {}: {e}", path.display())))?;
            let block = Block::from_json(&bytes)?;

            if block.calculate_hash() != block.hash {
                return Err(AppError::ServerError(format!("block {id} hash does not match its stored fields")));
            }
            let expected_prev = chain.last().map(|b: &Block| b.hash.clone()).unwrap_or_else(genesis_prev_hash);
            if block.prev_hash != expected_prev {
                return Err(AppError::ServerError(format!("block {id} prev_hash does not link to its predecessor")));
            }
            if !hash_has_leading_zeros(&block.hash, block.difficulty) {
                return Err(AppError::ServerError(format!("block {id} hash does not satisfy its own difficulty")));
            }
            if !block.verify_diploma() {
                return Err(AppError::ServerError(format!("block {id} diploma signature does not verify")));
            }
            difficulty = block.difficulty;
            chain.push(block);
        }

        let current_id = chain.len() as u64;
        Ok(Blockchain {
            chain,
            dir,
            current_id,
            difficulty,
        })
    }

    fn persist(&self, block: &Block) -> Result<(), AppError> {
        let path = self.dir.join(block.file_name());
        let json = block.to_json_pretty()?;
        fs::write(&path, json).map_err(|e| AppError::ServerError(format!("cannot persist {}: {e}", path.display())))
    }

    /// Appends a block that must already be sealed. Persists to disk before
    /// the in-memory list is updated, so files remain the source of truth.
    pub fn append(&mut self, block: Block) -> Result<(), AppError> {
        if block.id != self.current_id {
            return Err(AppError::ChainRejected(format!(
                "block id {} does not match expected next id {}",
                block.id, self.current_id
            )));
        }
        let expected_prev = self.chain.last().map(|b| b.hash.clone()).unwrap_or_else(genesis_prev_hash);
        if block.prev_hash != expected_prev {
            return Err(AppError::ChainRejected("prev_hash does not link to chain head".to_string()));
        }
        if !block.meets_difficulty() {
            return Err(AppError::ChainRejected("hash does not satisfy required difficulty".to_string()));
        }
        if !block.verify_diploma() {
            return Err(AppError::ChainRejected("diploma signature does not verify".to_string()));
        }

        self.persist(&block)?;
        self.chain.push(block);
        self.current_id += 1;
        Ok(())
    }

    /// Validates the four chain invariants over `[start, end]` inclusive.
    pub fn validate(&self, start: u64, end: u64) -> Result<bool, AppError> {
        if self.chain.is_empty() {
            return Err(AppError::BadRequest("chain is empty".to_string()));
        }
        let max = self.chain.len() as u64 - 1;
        if start > end || end > max {
            return Err(AppError::BadRequest(format!("range [{start},{end}] is out of bounds (chain has {} blocks)", self.chain.len())));
        }
        for i in start..=end {
            let block = &self.chain[i as usize];
            let expected_prev = if i == 0 { genesis_prev_hash() } else { self.chain[(i - 1) as usize].hash.clone() };
            if block.prev_hash != expected_prev {
                return Ok(false);
            }
            if block.calculate_hash() != block.hash {
                return Ok(false);
            }
            if !hash_has_leading_zeros(&block.hash, block.difficulty) {
                return Ok(false);
            }
            if !block.verify_diploma() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn get(&self, id: u64) -> Result<&Block, AppError> {
        self.chain
            .get(id as usize)
            .ok_or_else(|| AppError::NotFound(format!("no block with id {id}")))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn current_id(&self) -> u64 {
        self.current_id
    }

    pub fn last_hash(&self) -> String {
        self.chain.last().map(|b| b.hash.clone()).unwrap_or_else(genesis_prev_hash)
    }
}

fn block_file_name(id: u64) -> String {
    format!("Block_{id:05}.json")
}

fn parse_block_id(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_prefix("Block_")?.strip_suffix(".json")?;
    stem.parse().ok()
}
