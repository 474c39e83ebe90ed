// Single guarded state object: chain, task queue, and reward ledger behind one
// lock, so SUBMIT_SOLUTION's {append, pop, head-rewrite, reward credit}
// sequence is atomic with respect to every other client.
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{self, User};
use crate::block::Block;
use crate::chain::{Blockchain, GenesisMaterial};
use crate::diploma::DiplomaRecord;
use crate::error::{AppError, AppResult};
use crate::mining::{MiningTask, TaskQueue};
use crate::rewards::RewardLedger;

pub struct MineGrant {
    pub block_id: u64,
    pub nonce_start: u64,
    pub nonce_end: u64,
    pub hash_info: String,
    pub difficulty: u32,
}

pub struct SolutionAccepted {
    pub block_id: u64,
    pub prev_hash: String,
    pub new_hash: String,
    pub reward: u64,
}

struct Inner {
    chain: Blockchain,
    queue: TaskQueue,
    rewards: RewardLedger,
}

pub struct ServerState {
    inner: Mutex<Inner>,
    users_path: PathBuf,
    nonce_range_size: u64,
}

impl ServerState {
    pub fn open(data_dir: PathBuf, genesis: Option<GenesisMaterial>, nonce_range_size: u64) -> AppResult<ServerState> {
        let chain = Blockchain::open(&data_dir, genesis)?;
        let rewards = RewardLedger::open(data_dir.join("rewards.json"))?;
        Ok(ServerState {
            inner: Mutex::new(Inner {
                chain,
                queue: TaskQueue::new(),
                rewards,
            }),
            users_path: data_dir.join("users.json"),
            nonce_range_size,
        })
    }

    pub fn authenticate(&self, username: &str, password: &str) -> AppResult<User> {
        auth::authenticate(&self.users_path, username, password)
    }

    pub fn view_block(&self, id: u64) -> AppResult<Block> {
        let inner = self.inner.lock().expect("state mutex poisoned");
        inner.chain.get(id).map(|b| b.clone())
    }

    pub fn list_queue_len(&self) -> usize {
        let inner = self.inner.lock().expect("state mutex poisoned");
        inner.queue.len()
    }

    /// ADD_BLOCK: verifies the diploma signature, projects `id`/`prev_hash`
    /// against an empty queue (placeholders are used otherwise and rewritten
    /// when the task reaches the head), and enqueues a pending `MiningTask`.
    pub fn add_block(&self, diploma_data: DiplomaRecord, public_key_pem: String) -> AppResult<u64> {
        let mut inner = self.inner.lock().expect("state mutex poisoned");
        let now = now_unix();

        let (id, prev_hash) = if inner.queue.is_empty() {
            (inner.chain.current_id(), inner.chain.last_hash())
        } else {
            (0, crate::block::genesis_prev_hash())
        };

        let block = Block::new(id, diploma_data, public_key_pem, prev_hash, inner.chain.difficulty)?;
        let block_id = block.id;
        inner.queue.enqueue(MiningTask::new(block, now));
        Ok(block_id)
    }

    /// MINE: allocates the next nonce range on the head task to `username`.
    pub fn mine(&self, username: &str) -> AppResult<MineGrant> {
        let mut inner = self.inner.lock().expect("state mutex poisoned");
        let now = now_unix();
        let range_size = self.nonce_range_size;
        let task = inner.queue.head_mut().ok_or(AppError::NoTasks)?;
        let (start, end) = task.assign_to_miner(username, range_size, now);
        Ok(MineGrant {
            block_id: task.block.id,
            nonce_start: start,
            nonce_end: end,
            hash_info: task.block.hash_info(),
            difficulty: task.block.difficulty,
        })
    }

    /// SUBMIT_SOLUTION: validates the nonce/hash against the head task and the
    /// miner's assigned range, seals and appends the block on success, then
    /// re-links the new head and credits the reward ledger — all under the
    /// same lock acquisition.
    pub fn submit_solution(&self, username: &str, nonce: u64, hash: &str) -> AppResult<SolutionAccepted> {
        let mut inner = self.inner.lock().expect("state mutex poisoned");

        let range = {
            let task = inner.queue.head().ok_or(AppError::NoTasks)?;
            task.get_miner_range(username).ok_or(AppError::NonceOutOfRange)?
        };
        if nonce < range.0 || nonce > range.1 {
            return Err(AppError::NonceOutOfRange);
        }

        let mut sealed_block = {
            let task = inner.queue.head().expect("checked above");
            let mut candidate = task.block.clone();
            candidate.nonce = nonce;
            candidate
        };
        let recomputed = sealed_block.calculate_hash();
        if recomputed != hash {
            return Err(AppError::HashMismatch);
        }
        sealed_block.hash = recomputed;
        if !sealed_block.meets_difficulty() {
            return Err(AppError::DifficultyNotMet);
        }

        let block_id = sealed_block.id;
        let prev_hash = sealed_block.prev_hash.clone();
        let new_hash = sealed_block.hash.clone();
        inner.chain.append(sealed_block)?;
        inner.queue.pop_head();

        if !inner.queue.is_empty() {
            let new_id = inner.chain.current_id();
            let new_prev_hash = inner.chain.last_hash();
            inner.queue.relink_new_head(new_id, new_prev_hash);
        }

        let reward = inner.rewards.credit(username, 1)?;

        Ok(SolutionAccepted {
            block_id,
            prev_hash,
            new_hash,
            reward,
        })
    }
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
