use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of an order. PENDING is the durable checkpoint written before
/// the remote payment call; the saga's reconciliation step moves it to
/// exactly one of PAID or FAILED. Orders are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, OrderError> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "FAILED" => Ok(OrderStatus::Failed),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// A cart entry priced from the catalog at checkout time. Input to
/// `Order::create`; the title and unit price become the immutable
/// line-item snapshot.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub item_id: Uuid,
    pub title: String,
    pub unit_price: f64,
    pub count: i64,
}

impl PricedLine {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * self.count as f64
    }
}

/// Price/title snapshot taken at order creation, decoupled from the live
/// catalog so historical orders stay stable when prices change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub title: String,
    pub unit_price: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_sum: f64,
    pub status: OrderStatus,
    pub payment_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a PENDING order with its line-item snapshots from priced
    /// cart lines. Total is computed here, never taken from the cart.
    pub fn create(
        user_id: Uuid,
        lines: Vec<PricedLine>,
    ) -> Result<(Self, Vec<OrderLineItem>), OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        for line in &lines {
            if line.count <= 0 {
                return Err(OrderError::InvalidCount);
            }
            if line.unit_price < 0.0 {
                return Err(OrderError::InvalidPrice);
            }
        }

        let order_id = Uuid::new_v4();
        let total_sum = lines.iter().map(PricedLine::subtotal).sum();
        let now = Utc::now();

        let items = lines
            .into_iter()
            .map(|line| OrderLineItem {
                id: Uuid::new_v4(),
                order_id,
                title: line.title,
                unit_price: line.unit_price,
                count: line.count,
            })
            .collect();

        let order = Self {
            id: order_id,
            user_id,
            total_sum,
            status: OrderStatus::Pending,
            payment_ref: None,
            created_at: now,
            updated_at: now,
        };

        Ok((order, items))
    }

    /// Reconcile to PAID after the remote payment completed.
    pub fn mark_paid(&mut self, payment_ref: Uuid) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidStatus {
                current: self.status.as_str(),
                operation: "mark_paid",
            });
        }
        self.status = OrderStatus::Paid;
        self.payment_ref = Some(payment_ref);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Reconcile to FAILED after the payment step errored for any reason.
    pub fn mark_failed(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidStatus {
                current: self.status.as_str(),
                operation: "mark_failed",
            });
        }
        self.status = OrderStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order must have at least one line")]
    NoLines,

    #[error("Invalid line count")]
    InvalidCount,

    #[error("Invalid line price")]
    InvalidPrice,

    #[error("Invalid order status '{current}' for operation '{operation}'")]
    InvalidStatus {
        current: &'static str,
        operation: &'static str,
    },

    #[error("Unknown order status '{0}'")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: f64, count: i64) -> PricedLine {
        PricedLine {
            item_id: Uuid::new_v4(),
            title: "Widget".to_string(),
            unit_price: price,
            count,
        }
    }

    #[test]
    fn test_create_order_computes_total() {
        let user_id = Uuid::new_v4();
        let (order, items) =
            Order::create(user_id, vec![line(100.0, 2), line(10.0, 3)]).unwrap();

        assert_eq!(order.user_id, user_id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_sum, 230.0);
        assert!(order.payment_ref.is_none());
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.order_id == order.id));
    }

    #[test]
    fn test_create_order_no_lines() {
        let result = Order::create(Uuid::new_v4(), vec![]);
        assert!(matches!(result, Err(OrderError::NoLines)));
    }

    #[test]
    fn test_create_order_invalid_count() {
        let result = Order::create(Uuid::new_v4(), vec![line(10.0, 0)]);
        assert!(matches!(result, Err(OrderError::InvalidCount)));
    }

    #[test]
    fn test_mark_paid() {
        let (mut order, _) = Order::create(Uuid::new_v4(), vec![line(10.0, 1)]).unwrap();
        let payment_ref = Uuid::new_v4();

        order.mark_paid(payment_ref).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.payment_ref, Some(payment_ref));
    }

    #[test]
    fn test_mark_failed() {
        let (mut order, _) = Order::create(Uuid::new_v4(), vec![line(10.0, 1)]).unwrap();

        order.mark_failed().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[test]
    fn test_terminal_status_is_immutable() {
        let (mut order, _) = Order::create(Uuid::new_v4(), vec![line(10.0, 1)]).unwrap();
        order.mark_paid(Uuid::new_v4()).unwrap();

        let result = order.mark_failed();
        assert!(matches!(result, Err(OrderError::InvalidStatus { .. })));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Failed] {
            assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::parse("SHIPPED").is_err());
    }
}
