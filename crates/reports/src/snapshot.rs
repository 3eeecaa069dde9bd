//! Daily inventory snapshot.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Available,
    Reserved,
    Quarantined,
    Consumed,
}

impl LotStatus {
    /// Whether lots in this status still sit in the warehouse.
    pub fn is_on_hand(&self) -> bool {
        !matches!(self, LotStatus::Consumed)
    }
}

/// One fabric lot (a single roll).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: String,
    pub catalog_item_id: String,
    pub meters: f64,
    pub status: LotStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub meters: f64,
    pub rolls: u32,
}

impl Totals {
    fn add(&mut self, meters: f64) {
        self.meters += meters;
        self.rolls += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTotals {
    pub catalog_item_id: String,
    /// Excludes consumed lots.
    pub on_hand: Totals,
    pub by_status: BTreeMap<LotStatus, Totals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub on_hand: Totals,
    pub by_status: BTreeMap<LotStatus, Totals>,
    /// Ordered by catalog item id.
    pub by_item: Vec<ItemTotals>,
}

impl DailySnapshot {
    pub fn status(&self, status: LotStatus) -> Totals {
        self.by_status.get(&status).copied().unwrap_or_default()
    }
}

/// Roll up `lots` into the snapshot for `date`.
///
/// Consumed lots are counted under their status but left out of on-hand
/// totals.
pub fn take_daily_snapshot(date: NaiveDate, lots: &[Lot]) -> Result<DailySnapshot, ReportError> {
    let mut on_hand = Totals::default();
    let mut by_status: BTreeMap<LotStatus, Totals> = BTreeMap::new();
    let mut by_item: BTreeMap<&str, ItemTotals> = BTreeMap::new();

    for lot in lots {
        if !lot.meters.is_finite() || lot.meters < 0.0 {
            return Err(ReportError::InvalidMeters {
                lot: lot.id.clone(),
                meters: lot.meters,
            });
        }

        by_status.entry(lot.status).or_default().add(lot.meters);

        let item = by_item
            .entry(lot.catalog_item_id.as_str())
            .or_insert_with(|| ItemTotals {
                catalog_item_id: lot.catalog_item_id.clone(),
                on_hand: Totals::default(),
                by_status: BTreeMap::new(),
            });
        item.by_status.entry(lot.status).or_default().add(lot.meters);

        if lot.status.is_on_hand() {
            on_hand.add(lot.meters);
            item.on_hand.add(lot.meters);
        }
    }

    tracing::info!(
        %date,
        lots = lots.len(),
        items = by_item.len(),
        on_hand_meters = on_hand.meters,
        "daily snapshot taken"
    );

    Ok(DailySnapshot {
        date,
        on_hand,
        by_status,
        by_item: by_item.into_values().collect(),
    })
}
