//! Account balances and fee transfers
//!
//! The module only needs `transfer` and `balance`; [`CacheLedger`] stages
//! transfers the same way [`tss_store::CacheStore`] stages writes, so a
//! failed command never moves funds.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Single-denomination token amount
pub type Amount = u64;

/// Account address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module account holding fees of pending signings
    pub fn escrow() -> Self {
        Self::new("tss")
    }

    /// Account whose balance funds member rewards
    pub fn fee_collector() -> Self {
        Self::new("fee_collector")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Balance collaborator
pub trait Ledger {
    fn balance(&self, account: &Address) -> Amount;

    fn set_balance(&mut self, account: &Address, amount: Amount);

    /// Move `amount` from `from` to `to`, failing when `from` cannot cover it
    /// or `to` would overflow
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let available = self.balance(from);
        if available < amount {
            return Err(Error::InsufficientFunds {
                account: from.clone(),
                needed: amount,
                available,
            });
        }
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| Error::BalanceOverflow {
                account: to.clone(),
                amount,
            })?;
        self.set_balance(from, available - amount);
        self.set_balance(to, credited);
        Ok(())
    }
}

/// In-memory balances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryLedger {
    balances: BTreeMap<Address, Amount>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances(balances: impl IntoIterator<Item = (Address, Amount)>) -> Self {
        Self {
            balances: balances.into_iter().collect(),
        }
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }
}

impl Ledger for InMemoryLedger {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn set_balance(&mut self, account: &Address, amount: Amount) {
        if amount == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.clone(), amount);
        }
    }
}

/// Balance changes staged on top of a parent ledger
pub struct CacheLedger<'p, L: Ledger + ?Sized> {
    parent: &'p mut L,
    staged: BTreeMap<Address, Amount>,
}

impl<'p, L: Ledger + ?Sized> CacheLedger<'p, L> {
    pub fn new(parent: &'p mut L) -> Self {
        Self {
            parent,
            staged: BTreeMap::new(),
        }
    }

    /// Write staged balances through to the parent
    pub fn commit(self) {
        debug!(accounts = self.staged.len(), "committing cache ledger");
        for (account, amount) in self.staged {
            self.parent.set_balance(&account, amount);
        }
    }
}

impl<'p, L: Ledger + ?Sized> Ledger for CacheLedger<'p, L> {
    fn balance(&self, account: &Address) -> Amount {
        match self.staged.get(account) {
            Some(amount) => *amount,
            None => self.parent.balance(account),
        }
    }

    fn set_balance(&mut self, account: &Address, amount: Amount) {
        self.staged.insert(account.clone(), amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer() {
        let alice = Address::new("alice");
        let bob = Address::new("bob");
        let mut ledger = InMemoryLedger::with_balances([(alice.clone(), 100)]);

        ledger.transfer(&alice, &bob, 40).unwrap();
        assert_eq!(ledger.balance(&alice), 60);
        assert_eq!(ledger.balance(&bob), 40);

        let err = ledger.transfer(&alice, &bob, 61).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientFunds {
                account: alice.clone(),
                needed: 61,
                available: 60
            }
        );
        assert_eq!(ledger.balance(&alice), 60);

        // zero amounts always succeed
        ledger.transfer(&bob, &alice, 0).unwrap();
    }

    #[test]
    fn test_transfer_rejects_credit_overflow() {
        let alice = Address::new("alice");
        let whale = Address::new("whale");
        let mut ledger =
            InMemoryLedger::with_balances([(alice.clone(), 10), (whale.clone(), Amount::MAX - 5)]);

        let err = ledger.transfer(&alice, &whale, 6).unwrap_err();
        assert_eq!(
            err,
            Error::BalanceOverflow {
                account: whale.clone(),
                amount: 6
            }
        );
        assert_eq!(ledger.balance(&alice), 10);
        assert_eq!(ledger.balance(&whale), Amount::MAX - 5);

        ledger.transfer(&alice, &whale, 5).unwrap();
        assert_eq!(ledger.balance(&whale), Amount::MAX);
    }

    #[test]
    fn test_cache_ledger_commit_and_discard() {
        let alice = Address::new("alice");
        let bob = Address::new("bob");
        let mut ledger = InMemoryLedger::with_balances([(alice.clone(), 10)]);

        {
            let mut cache = CacheLedger::new(&mut ledger);
            cache.transfer(&alice, &bob, 10).unwrap();
            assert_eq!(cache.balance(&bob), 10);
        }
        assert_eq!(ledger.balance(&alice), 10);

        let mut cache = CacheLedger::new(&mut ledger);
        cache.transfer(&alice, &bob, 3).unwrap();
        cache.commit();
        assert_eq!(ledger.balance(&alice), 7);
        assert_eq!(ledger.balance(&bob), 3);
    }
}
