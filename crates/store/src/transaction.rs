use async_trait::async_trait;
use domain::{Order, Record};

use crate::{RecordId, Result};

/// How a backend executes the steps of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Steps run inside a real transaction; the record read inside a scope is
    /// locked until the scope ends.
    #[default]
    Transactional,

    /// Steps run one by one without atomicity or locking.
    ///
    /// Only for backends that cannot offer transactions. Concurrent orders
    /// against the same record can oversell in this mode.
    Sequential,
}

impl TransactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMode::Transactional => "transactional",
            TransactionMode::Sequential => "sequential",
        }
    }
}

impl std::str::FromStr for TransactionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transactional" | "on" | "true" => Ok(TransactionMode::Transactional),
            "sequential" | "off" | "false" => Ok(TransactionMode::Sequential),
            other => Err(format!("unknown transaction mode '{other}'")),
        }
    }
}

/// Source of transactional scopes.
#[async_trait]
pub trait TransactionContext: Send + Sync {
    type Scope: TransactionScope;

    /// Opens a new scope.
    async fn begin(&self) -> Result<Self::Scope>;

    /// The mode scopes from this context run in.
    fn transaction_mode(&self) -> TransactionMode;
}

/// A unit of work against the store.
///
/// `commit` and `abort` consume the scope. Dropping a scope that was neither
/// committed nor aborted rolls it back, so the underlying connection or lock
/// is released on every exit path.
#[async_trait]
pub trait TransactionScope: Send {
    /// Reads a record and holds it for the rest of the scope.
    async fn find_record_for_update(&mut self, id: RecordId) -> Result<Option<Record>>;

    /// Inserts an order as part of this scope.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Decrements a record's stock as part of this scope.
    async fn decrement_qty(&mut self, id: RecordId, delta: u32) -> Result<()>;

    /// Makes every write of the scope visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write of the scope.
    async fn abort(self) -> Result<()>;
}
