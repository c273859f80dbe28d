use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of a payment attempt. Created PENDING; moves exactly once to
/// COMPLETED or FAILED, or to CANCELLED only while still PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PaymentError> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(PaymentError::UnknownStatus(other.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub description: String,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn create(
        order_id: Uuid,
        user_id: Uuid,
        amount: f64,
        description: String,
    ) -> Result<Self, PaymentError> {
        if amount <= 0.0 {
            return Err(PaymentError::InvalidAmount);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            order_id,
            user_id,
            amount,
            description,
            status: PaymentStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// The balance deduction succeeded.
    pub fn complete(&mut self) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Completed, "complete")?;
        Ok(())
    }

    /// The balance deduction failed or threw; reason is recorded.
    pub fn fail(&mut self, reason: String) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Failed, "fail")?;
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Explicit cancellation, only allowed while PENDING.
    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Cancelled, "cancel")
    }

    fn transition(
        &mut self,
        to: PaymentStatus,
        operation: &'static str,
    ) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Pending {
            return Err(PaymentError::InvalidOperation {
                current: self.status.as_str(),
                operation,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment amount must be positive")]
    InvalidAmount,

    #[error("Invalid operation '{operation}' on payment in status '{current}'")]
    InvalidOperation {
        current: &'static str,
        operation: &'static str,
    },

    #[error("Unknown payment status '{0}'")]
    UnknownStatus(String),
}
