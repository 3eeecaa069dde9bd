//! `fabricsync-reports`: batch rollups over typed rows.
//!
//! Pure aggregation functions (no IO): the daily inventory snapshot, the
//! overdue/expiring digest and demand reconciliation.

pub mod digest;
pub mod reconcile;
pub mod snapshot;

use thiserror::Error;

pub use digest::{build_digest, Digest, Order, OrderStatus, OverdueOrder, Reservation};
pub use reconcile::{reconcile_demand, stock_from_snapshot, Demand, ReconciliationLine, StockLevel};
pub use snapshot::{take_daily_snapshot, DailySnapshot, ItemTotals, Lot, LotStatus, Totals};

/// Rejected input rows.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    #[error("lot {lot}: meters must be a finite non-negative number, got {meters}")]
    InvalidMeters { lot: String, meters: f64 },
}
