#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Savepoint, TransactionBehavior};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
}

/// Backend scope of one mutating operation.
///
/// Outside an explicit transaction the operation owns an immediate
/// transaction. Inside one it runs under a savepoint, so a failure undoes
/// only its own writes and the caller's transaction stays open. Dropping the
/// scope without [`WriteScope::commit`] rolls it back.
pub(super) enum WriteScope<'conn> {
    Transaction(Transaction<'conn>),
    Savepoint(Savepoint<'conn>),
}

impl<'conn> WriteScope<'conn> {
    pub(super) fn open(
        conn: &'conn mut Connection,
        state: TransactionState,
    ) -> Result<Self, StoreError> {
        Ok(match state {
            TransactionState::Idle => Self::Transaction(
                conn.transaction_with_behavior(TransactionBehavior::Immediate)?,
            ),
            TransactionState::Active => Self::Savepoint(conn.savepoint()?),
        })
    }

    pub(super) fn commit(self) -> Result<(), StoreError> {
        match self {
            Self::Transaction(tx) => tx.commit()?,
            Self::Savepoint(sp) => sp.commit()?,
        }
        Ok(())
    }
}

impl std::ops::Deref for WriteScope<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Transaction(tx) => &**tx,
            Self::Savepoint(sp) => &**sp,
        }
    }
}

impl SqliteStore {
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction
    }

    /// The state check comes before the session check, so unbalanced calls
    /// fail the same way whether or not a login happened.
    pub fn begin_transaction(&mut self) -> Result<(), StoreError> {
        if self.transaction == TransactionState::Active {
            return Err(StoreError::TransactionState("a transaction is already open"));
        }
        self.ensure_session()?;
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.transaction = TransactionState::Active;
        tracing::debug!("transaction begun");
        Ok(())
    }

    pub fn commit_transaction(&mut self) -> Result<(), StoreError> {
        if self.transaction == TransactionState::Idle {
            return Err(StoreError::TransactionState("no transaction is open"));
        }
        self.ensure_session()?;
        self.conn.execute_batch("COMMIT")?;
        self.transaction = TransactionState::Idle;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Rolls back the open transaction and drops the session caches, which
    /// may hold state written inside it.
    pub fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        if self.transaction == TransactionState::Idle {
            return Err(StoreError::TransactionState("no transaction is open"));
        }
        self.ensure_session()?;
        self.conn.execute_batch("ROLLBACK")?;
        self.transaction = TransactionState::Idle;
        if let Some(session) = self.session.as_mut() {
            session.clear_caches();
        }
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    pub fn set_transaction_timeout(&mut self, _seconds: u64) -> Result<(), StoreError> {
        Err(StoreError::NotSupported("transaction timeouts".to_string()))
    }
}
