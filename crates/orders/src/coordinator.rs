//! Order transaction coordinator.

use std::time::Instant;

use common::{OrderId, RecordId};
use domain::Order;
use serde::{Deserialize, Serialize};
use store::{OrderRepository, StoreError, TransactionContext, TransactionMode, TransactionScope};

use crate::error::{OrderError, Result};

/// Outcome of a successful order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order: Order,
    /// Stock held by the record before this order was taken.
    pub available_quantity: u32,
}

/// Creates orders against record stock as one atomic unit.
///
/// Concurrent orders against the same record are serialized by the store's
/// scope, so together they can never take more than the record held.
pub struct OrderTransactionCoordinator<S>
where
    S: TransactionContext + OrderRepository,
{
    store: S,
}

impl<S> OrderTransactionCoordinator<S>
where
    S: TransactionContext + OrderRepository,
{
    /// Creates a new coordinator.
    pub fn new(store: S) -> Self {
        if store.transaction_mode() == TransactionMode::Sequential {
            tracing::warn!(
                "order coordinator running without transactions; concurrent orders may oversell"
            );
        }
        Self { store }
    }

    /// Places an order for `quantity` units of a record.
    ///
    /// Steps, all inside one scope: lock the record, check stock, insert a
    /// pending order, decrement stock, commit. Non-positive quantities are
    /// rejected before any scope is opened.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, record_id: RecordId, quantity: i64) -> Result<OrderResult> {
        if quantity <= 0 {
            return Err(reject(OrderError::Validation(format!(
                "quantity must be a positive integer, got {quantity}"
            ))));
        }
        let quantity = u32::try_from(quantity).map_err(|_| {
            reject(OrderError::Validation(format!(
                "quantity {quantity} exceeds the maximum of {}",
                u32::MAX
            )))
        })?;

        let started = Instant::now();
        let mut scope = self
            .store
            .begin()
            .await
            .map_err(|e| reject(e.into()))?;

        let result = place_order(&mut scope, record_id, quantity).await;
        let outcome = match result {
            Ok(placed) => scope.commit().await.map(|_| placed).map_err(OrderError::from),
            Err(e) => {
                if let Err(abort_err) = scope.abort().await {
                    tracing::warn!(error = %abort_err, "failed to abort order scope");
                }
                Err(e)
            }
        };

        metrics::histogram!("order_transaction_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(placed) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %placed.order.id,
                    quantity,
                    available = placed.available_quantity,
                    "order created"
                );
                Ok(placed)
            }
            Err(e) => Err(reject(e)),
        }
    }

    /// Retrieves an order by id.
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order not found: {id}")))
    }

    /// Lists every order, newest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.find_all().await?)
    }
}

async fn place_order<T: TransactionScope>(
    scope: &mut T,
    record_id: RecordId,
    quantity: u32,
) -> Result<OrderResult> {
    let record = scope
        .find_record_for_update(record_id)
        .await?
        .ok_or_else(|| OrderError::NotFound(format!("Record not found: {record_id}")))?;

    if quantity > record.qty {
        return Err(OrderError::InsufficientStock {
            available: record.qty,
            requested: quantity,
        });
    }

    let order = Order::pending(record_id, quantity);
    scope.insert_order(&order).await?;
    scope
        .decrement_qty(record_id, quantity)
        .await
        .map_err(|e| match e {
            StoreError::StockUnderflow {
                available,
                requested,
                ..
            } => OrderError::InsufficientStock {
                available,
                requested,
            },
            other => OrderError::Internal(other),
        })?;

    Ok(OrderResult {
        order,
        available_quantity: record.qty,
    })
}

fn reject(err: OrderError) -> OrderError {
    let reason = match &err {
        OrderError::Validation(_) => "validation",
        OrderError::NotFound(_) => "not_found",
        OrderError::InsufficientStock { .. } => "insufficient_stock",
        OrderError::Internal(_) => "internal",
    };
    metrics::counter!("orders_rejected_total", "reason" => reason).increment(1);
    tracing::debug!(reason, error = %err, "order rejected");
    err
}
