use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ItemId, LedgerError, LedgerResult, LocationId};

use crate::clock;
use crate::transaction::{Action, InventoryTransaction};

/// Current balance for exactly one (item, location) pair.
///
/// Never created by callers: engines materialize it with a zero count the
/// first time a transaction touches the pair, and never delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub count: i64,
    pub last_updated: DateTime<Utc>,
}

impl Inventory {
    /// A zero-count balance for a pair no transaction has touched yet.
    pub fn empty(item_id: ItemId, location_id: LocationId) -> Self {
        Self {
            item_id,
            location_id,
            count: 0,
            last_updated: clock::now(),
        }
    }

    /// Apply one movement, stamping both the transaction and the balance with
    /// the current time.
    pub fn apply_transaction(&mut self, txn: &mut InventoryTransaction) -> LedgerResult<()> {
        self.apply_transaction_at(txn, clock::now())
    }

    /// Same as [`apply_transaction`](Self::apply_transaction) with an explicit
    /// moment of application.
    ///
    /// `at` is cut to ledger precision. Removals are not floored at zero. On
    /// `InvalidAction` neither value is modified.
    pub fn apply_transaction_at(
        &mut self,
        txn: &mut InventoryTransaction,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.count = next_count(self.count, &txn.action, txn.count)?;
        let at = clock::truncate(at);
        txn.timestamp = at;
        self.last_updated = at;
        Ok(())
    }
}

fn next_count(current: i64, action: &Action, count: i64) -> LedgerResult<i64> {
    // Balances use two's-complement 64-bit arithmetic end to end.
    match action {
        Action::Add => Ok(current.wrapping_add(count)),
        Action::Remove => Ok(current.wrapping_sub(count)),
        Action::Recount => Ok(count),
        Action::Unknown(other) => Err(LedgerError::InvalidAction(other.clone())),
    }
}

/// Fold a pair's transaction history, in creation order, starting from zero.
///
/// This is the value the pair's [`Inventory::count`] must equal at any instant.
pub fn balance_from_history<'a, I>(history: I) -> LedgerResult<i64>
where
    I: IntoIterator<Item = &'a InventoryTransaction>,
{
    history
        .into_iter()
        .try_fold(0i64, |balance, txn| next_count(balance, &txn.action, txn.count))
}
