// Mining-task queue: FIFO of pending blocks, per-task nonce-range allocation,
// and head re-linking when the head task is sealed. The concurrency core.
use std::collections::{HashMap, VecDeque};

use crate::block::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Mining,
    Done,
}

pub struct MiningTask {
    pub block: Block,
    pub status: TaskStatus,
    pub created_at: u64,
    pub started_at: Option<u64>,
    /// miner username -> inclusive [start, end] nonce range.
    assigned_ranges: HashMap<String, (u64, u64)>,
    base_nonce: u64,
}

impl MiningTask {
    pub fn new(block: Block, now: u64) -> MiningTask {
        MiningTask {
            block,
            status: TaskStatus::Pending,
            created_at: now,
            started_at: None,
            assigned_ranges: HashMap::new(),
            base_nonce: 0,
        }
    }

    /// Maximum `end` across all assigned ranges, or `base_nonce` if none yet.
    pub fn current_max_nonce(&self) -> u64 {
        self.assigned_ranges
            .values()
            .map(|&(_, end)| end)
            .max()
            .unwrap_or(self.base_nonce)
    }

    pub fn get_miner_range(&self, miner: &str) -> Option<(u64, u64)> {
        self.assigned_ranges.get(miner).copied()
    }

    /// Allocates the next non-overlapping range of `range_size` nonces to
    /// `miner`, transitioning `pending` -> `mining` on first assignment.
    /// A miner that already holds a range for this task gets that same range
    /// back rather than a second, overlapping one.
    pub fn assign_to_miner(&mut self, miner: &str, range_size: u64, now: u64) -> (u64, u64) {
        if let Some(existing) = self.assigned_ranges.get(miner) {
            return *existing;
        }
        let start = self.current_max_nonce() + 1;
        let end = start + range_size - 1;
        self.assigned_ranges.insert(miner.to_string(), (start, end));
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Mining;
            self.started_at = Some(now);
        }
        (start, end)
    }

    /// All ranges issued so far, pairwise-disjoint by construction.
    pub fn assigned_ranges(&self) -> impl Iterator<Item = (&String, &(u64, u64))> {
        self.assigned_ranges.iter()
    }
}

#[derive(Default)]
pub struct TaskQueue {
    tasks: VecDeque<MiningTask>,
}

impl TaskQueue {
    pub fn new() -> TaskQueue {
        TaskQueue { tasks: VecDeque::new() }
    }

    pub fn enqueue(&mut self, task: MiningTask) {
        self.tasks.push_back(task);
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// The head task, if the queue is non-empty and its status is `pending` or
    /// `mining` — the explicit membership test a prior implementation got
    /// wrong with an always-true predicate.
    pub fn head(&self) -> Option<&MiningTask> {
        self.tasks.front().filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Mining))
    }

    pub fn head_mut(&mut self) -> Option<&mut MiningTask> {
        self.tasks
            .front_mut()
            .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Mining))
    }

    pub fn pop_head(&mut self) -> Option<MiningTask> {
        self.tasks.pop_front()
    }

    /// After the old head is sealed and popped, rewrite the new head's
    /// `id`/`prev_hash` to link onto the just-sealed block, and recompute its
    /// hash. The timestamp is left untouched (it was set at enqueue time) and
    /// existing nonce allocations on the new head are left in place — any
    /// in-flight solution computed against the old fields will now fail
    /// `HashMismatch`, which is the correct behavior.
    pub fn relink_new_head(&mut self, new_id: u64, new_prev_hash: String) {
        if let Some(task) = self.tasks.front_mut() {
            task.block.id = new_id;
            task.block.prev_hash = new_prev_hash;
            task.block.hash = task.block.calculate_hash();
        }
    }
}
