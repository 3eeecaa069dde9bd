//! Overdue-order and expiring-reservation digest.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    InProduction,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, OrderStatus::Shipped | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer: String,
    pub due_date: NaiveDate,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub lot_id: String,
    pub customer: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueOrder {
    pub order: Order,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub as_of: DateTime<Utc>,
    /// Oldest due date first.
    pub overdue: Vec<OverdueOrder>,
    /// Soonest expiry first.
    pub expiring: Vec<Reservation>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.expiring.is_empty()
    }

    /// Plain-text body, or `None` when there is nothing to send.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut out = format!("Digest for {}\n", self.as_of.format("%Y-%m-%d %H:%M UTC"));

        if !self.overdue.is_empty() {
            let _ = writeln!(out, "\nOverdue orders ({}):", self.overdue.len());
            for o in &self.overdue {
                let _ = writeln!(
                    out,
                    "- {} for {}: due {} ({} days overdue)",
                    o.order.id, o.order.customer, o.order.due_date, o.days_overdue
                );
            }
        }

        if !self.expiring.is_empty() {
            let _ = writeln!(out, "\nReservations expiring soon ({}):", self.expiring.len());
            for r in &self.expiring {
                let _ = writeln!(
                    out,
                    "- {} on lot {} for {}: expires {}",
                    r.id,
                    r.lot_id,
                    r.customer,
                    r.expires_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }

        Some(out)
    }
}

/// Collect open orders due before `as_of` and reservations expiring within
/// `horizon` of it.
pub fn build_digest(
    as_of: DateTime<Utc>,
    horizon: Duration,
    orders: &[Order],
    reservations: &[Reservation],
) -> Digest {
    let today = as_of.date_naive();
    let until = as_of + horizon;

    let mut overdue: Vec<OverdueOrder> = orders
        .iter()
        .filter(|o| o.status.is_open() && o.due_date < today)
        .map(|o| OverdueOrder {
            days_overdue: (today - o.due_date).num_days(),
            order: o.clone(),
        })
        .collect();
    overdue.sort_by(|a, b| {
        a.order
            .due_date
            .cmp(&b.order.due_date)
            .then_with(|| a.order.id.cmp(&b.order.id))
    });

    let mut expiring: Vec<Reservation> = reservations
        .iter()
        .filter(|r| r.expires_at >= as_of && r.expires_at <= until)
        .cloned()
        .collect();
    expiring.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.id.cmp(&b.id)));

    tracing::debug!(
        overdue = overdue.len(),
        expiring = expiring.len(),
        "digest built"
    );

    Digest {
        as_of,
        overdue,
        expiring,
    }
}
