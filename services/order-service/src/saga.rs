use domain::{CartEntry, Order, OrderLineItem, PaymentStatus, PricedLine};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cart::CartStore;
use crate::catalog::CatalogReader;
use crate::error::CheckoutError;
use crate::health::AdmissionGate;
use crate::payment_client::{PaymentClientError, PaymentGateway};
use crate::repository::OrderRepository;

/// Checkout orchestration across the local order store and the remote
/// payment service. Effects are ordered so that money is never deducted
/// without an order row, and every attempt that reaches the local write
/// leaves an auditable order in a terminal state:
///
/// 1. admission gate (remote known-down -> reject up front)
/// 2. cart read + catalog re-pricing, joined with the balance fetch
/// 3. affordability check (no order row written on failure)
/// 4. order + line items committed locally, status PENDING
/// 5. remote payment call
/// 6. reconcile to PAID or FAILED; the FAILED write happens before the
///    payment error is re-raised
/// 7. cart cleared only after PAID
pub struct CheckoutSaga {
    catalog: Arc<dyn CatalogReader>,
    cart: Arc<dyn CartStore>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentGateway>,
    gate: Arc<dyn AdmissionGate>,
}

impl CheckoutSaga {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        cart: Arc<dyn CartStore>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentGateway>,
        gate: Arc<dyn AdmissionGate>,
    ) -> Self {
        Self {
            catalog,
            cart,
            orders,
            payments,
            gate,
        }
    }

    pub async fn buy(
        &self,
        user_id: Option<Uuid>,
        session_id: &str,
    ) -> Result<Order, CheckoutError> {
        if !self.gate.is_available() {
            warn!("Checkout rejected: payment service gate is closed");
            return Err(CheckoutError::ServiceUnavailable);
        }

        let user_id = user_id.ok_or(CheckoutError::UserNotFound)?;

        // Balance fetch and cart pricing are independent reads
        let (balance, lines) = tokio::join!(
            self.payments.get_balance(user_id),
            self.price_cart(session_id)
        );

        let lines = lines?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let total: f64 = lines.iter().map(PricedLine::subtotal).sum();

        let balance = balance.map_err(map_balance_error)?;
        if balance < total {
            info!(
                %user_id,
                balance,
                total,
                "Checkout rejected: insufficient balance"
            );
            return Err(CheckoutError::InsufficientBalance);
        }

        // Durability checkpoint: from here on the order exists no matter
        // what the payment call does
        let (mut order, items) = Order::create(user_id, lines)?;
        self.orders.create_with_items(&order, &items).await?;
        info!(order_id = %order.id, total, "Order persisted, invoking payment service");

        let description = format!("Payment for order {}", order.id);
        match self
            .payments
            .create_payment(order.id, user_id, total, &description)
            .await
        {
            Ok(payment) if payment.status == PaymentStatus::Completed => {
                order.mark_paid(payment.id)?;
                self.orders.update_status(&order).await?;
                info!(order_id = %order.id, payment_id = %payment.id, "Order paid");

                // The cart is best-effort session state; a failed clear
                // must not fail a paid order
                if let Err(e) = self.cart.clear(session_id).await {
                    warn!(order_id = %order.id, "Failed to clear cart: {}", e);
                }

                Ok(order)
            }
            Ok(payment) => {
                let reason = payment
                    .failure_reason
                    .unwrap_or_else(|| "payment was not completed".to_string());
                self.fail_order(&mut order, &reason).await?;
                Err(CheckoutError::PaymentFailed(reason))
            }
            Err(e) => {
                let reason = e.to_string();
                self.fail_order(&mut order, &reason).await?;
                Err(CheckoutError::PaymentFailed(reason))
            }
        }
    }

    /// Orders for the acting user
    pub async fn get_orders(&self, user_id: Option<Uuid>) -> Result<Vec<Order>, CheckoutError> {
        let user_id = user_id.ok_or(CheckoutError::UserNotFound)?;
        self.orders.find_by_user(user_id).await
    }

    /// A single order, scoped to the acting user. An order that exists
    /// but belongs to someone else is AccessDenied, not NotFound.
    pub async fn get_order(
        &self,
        user_id: Option<Uuid>,
        order_id: Uuid,
    ) -> Result<(Order, Vec<OrderLineItem>), CheckoutError> {
        let user_id = user_id.ok_or(CheckoutError::UserNotFound)?;

        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if order.user_id != user_id {
            return Err(CheckoutError::AccessDenied);
        }

        let items = self.orders.find_items(order_id).await?;
        Ok((order, items))
    }

    /// Read the cart and re-price every orderable entry from the
    /// catalog. Non-positive counts are dropped silently; entries whose
    /// item has vanished from the catalog are dropped too.
    async fn price_cart(&self, session_id: &str) -> Result<Vec<PricedLine>, CheckoutError> {
        let entries = self.cart.read_all(session_id).await?;

        let mut lines = Vec::new();
        for entry in entries.into_iter().filter(CartEntry::is_orderable) {
            match self.catalog.find_by_id(entry.item_id).await? {
                Some(item) => lines.push(PricedLine {
                    item_id: entry.item_id,
                    title: item.title,
                    unit_price: item.price,
                    count: entry.count,
                }),
                None => {
                    warn!(
                        item_id = %entry.item_id,
                        "Cart entry no longer in catalog, dropping"
                    );
                }
            }
        }

        Ok(lines)
    }

    /// Reconcile the order to FAILED before the payment error is
    /// re-raised, so the attempt stays auditable even if the caller
    /// abandons the request.
    async fn fail_order(&self, order: &mut Order, reason: &str) -> Result<(), CheckoutError> {
        error!(order_id = %order.id, reason, "Payment step failed, marking order FAILED");
        order.mark_failed()?;
        if let Err(e) = self.orders.update_status(order).await {
            // The payment failure must not vanish from the logs just
            // because the reconciling write failed too
            error!(
                order_id = %order.id,
                payment_failure = reason,
                "Failed to persist FAILED status: {}",
                e
            );
            return Err(e);
        }
        Ok(())
    }
}

/// A balance check that cannot reach the remote service means the
/// dependency is down; a remote-reported error is a payment failure.
fn map_balance_error(e: PaymentClientError) -> CheckoutError {
    match e {
        PaymentClientError::Timeout
        | PaymentClientError::Connection(_)
        | PaymentClientError::CircuitOpen => CheckoutError::ServiceUnavailable,
        other => CheckoutError::PaymentFailed(other.to_string()),
    }
}
