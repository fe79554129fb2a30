//! Positions ordered by health, lowest first

use crate::health::PositionHealth;
use olive::{AccountId, Wad};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Default)]
pub struct HealthQueue {
    queue: PriorityQueue<AccountId, Reverse<Wad>>,
    positions: HashMap<AccountId, PositionHealth>,
}

impl HealthQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a position
    pub fn push(&mut self, health: PositionHealth) {
        let account = health.account;
        let priority = Reverse(health.hf);
        if self.queue.change_priority(&account, priority).is_none() {
            self.queue.push(account, priority);
        }
        self.positions.insert(account, health);
    }

    /// Least healthy position
    pub fn peek(&self) -> Option<&PositionHealth> {
        self.queue
            .peek()
            .and_then(|(account, _)| self.positions.get(account))
    }

    /// Every position with hf < 1, least healthy first
    pub fn get_liquidatable(&self) -> Vec<PositionHealth> {
        let mut out: Vec<PositionHealth> = self
            .positions
            .values()
            .filter(|p| p.is_liquidatable())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.hf.cmp(&b.hf).then(a.account.cmp(&b.account)));
        out
    }

    pub fn remove(&mut self, account: &AccountId) -> Option<PositionHealth> {
        self.queue.remove(account);
        self.positions.remove(account)
    }

    /// Drop every position not in `keep`
    pub fn retain(&mut self, keep: &[AccountId]) {
        let stale: Vec<AccountId> = self
            .positions
            .keys()
            .filter(|a| !keep.contains(a))
            .copied()
            .collect();
        for account in stale {
            self.remove(&account);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
