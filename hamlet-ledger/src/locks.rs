use std::collections::HashMap;
use std::sync::Arc;

use hamlet_core::AccountName;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

/// Per-account mutual exclusion for check-then-mutate sequences.
///
/// Slots are created on demand and dropped again once the last guard or
/// waiter for an account lets go, so the table only holds accounts that are
/// currently in use.
#[derive(Debug, Default)]
pub struct AccountLocks {
    slots: Mutex<HashMap<AccountName, Arc<Mutex<()>>>>,
}

/// Holds one or two account locks until dropped.
#[must_use = "the accounts are unlocked as soon as the guard is dropped"]
pub struct AccountGuard<'a> {
    locks: &'a AccountLocks,
    held: Vec<(AccountName, ArcMutexGuard<RawMutex, ()>)>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, account: &AccountName) -> AccountGuard<'_> {
        let guard = self.slot(account).lock_arc();
        AccountGuard {
            locks: self,
            held: vec![(account.clone(), guard)],
        }
    }

    /// Lock both accounts in name order. Locking the same account twice
    /// takes a single lock.
    pub fn lock_pair(&self, first: &AccountName, second: &AccountName) -> AccountGuard<'_> {
        if first == second {
            return self.lock(first);
        }
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let low_guard = self.slot(low).lock_arc();
        let high_guard = self.slot(high).lock_arc();
        AccountGuard {
            locks: self,
            held: vec![(low.clone(), low_guard), (high.clone(), high_guard)],
        }
    }

    /// Number of accounts with a live slot.
    pub fn tracked(&self) -> usize {
        self.slots.lock().len()
    }

    fn slot(&self, account: &AccountName) -> Arc<Mutex<()>> {
        self.slots
            .lock()
            .entry(account.clone())
            .or_default()
            .clone()
    }

    /// Forget slots that only the table still references. Every clone is
    /// taken under the table lock, so a count of one cannot race a new holder.
    fn release(&self, accounts: impl IntoIterator<Item = AccountName>) {
        let mut slots = self.slots.lock();
        for account in accounts {
            if slots
                .get(&account)
                .is_some_and(|slot| Arc::strong_count(slot) == 1)
            {
                slots.remove(&account);
            }
        }
    }
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        let accounts: Vec<AccountName> = self
            .held
            .drain(..)
            .rev()
            .map(|(account, guard)| {
                drop(guard);
                account
            })
            .collect();
        self.locks.release(accounts);
    }
}
