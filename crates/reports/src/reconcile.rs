//! Demand reconciliation: demanded meters vs. available stock per item.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::{DailySnapshot, LotStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub catalog_item_id: String,
    pub meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub catalog_item_id: String,
    pub meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationLine {
    pub catalog_item_id: String,
    pub demanded: f64,
    pub available: f64,
    /// `demanded - available`, never negative.
    pub shortfall: f64,
}

/// Available (unreserved) meters per item from a snapshot.
pub fn stock_from_snapshot(snapshot: &DailySnapshot) -> Vec<StockLevel> {
    snapshot
        .by_item
        .iter()
        .map(|item| StockLevel {
            catalog_item_id: item.catalog_item_id.clone(),
            meters: item
                .by_status
                .get(&LotStatus::Available)
                .map(|t| t.meters)
                .unwrap_or(0.0),
        })
        .collect()
}

/// One line per demanded item, largest shortfall first (ties by item id).
///
/// Multiple demand or stock rows for the same item are summed; items with
/// stock but no demand are left out.
pub fn reconcile_demand(demand: &[Demand], stock: &[StockLevel]) -> Vec<ReconciliationLine> {
    let mut demanded: BTreeMap<&str, f64> = BTreeMap::new();
    for d in demand {
        *demanded.entry(d.catalog_item_id.as_str()).or_default() += d.meters;
    }

    let mut available: BTreeMap<&str, f64> = BTreeMap::new();
    for s in stock {
        *available.entry(s.catalog_item_id.as_str()).or_default() += s.meters;
    }

    let mut lines: Vec<ReconciliationLine> = demanded
        .into_iter()
        .map(|(item, demanded)| {
            let available = available.get(item).copied().unwrap_or(0.0);
            ReconciliationLine {
                catalog_item_id: item.to_string(),
                demanded,
                available,
                shortfall: (demanded - available).max(0.0),
            }
        })
        .collect();

    lines.sort_by(|a, b| {
        b.shortfall
            .total_cmp(&a.shortfall)
            .then_with(|| a.catalog_item_id.cmp(&b.catalog_item_id))
    });

    let short = lines.iter().filter(|l| l.shortfall > 0.0).count();
    tracing::debug!(items = lines.len(), short, "demand reconciled");

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{take_daily_snapshot, Lot};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn demand(item: &str, meters: f64) -> Demand {
        Demand {
            catalog_item_id: item.into(),
            meters,
        }
    }

    fn stock(item: &str, meters: f64) -> StockLevel {
        StockLevel {
            catalog_item_id: item.into(),
            meters,
        }
    }

    #[test]
    fn largest_shortfall_first() {
        let lines = reconcile_demand(
            &[
                demand("denim", 100.0),
                demand("linen", 30.0),
                demand("denim", 20.0),
                demand("silk", 10.0),
            ],
            &[stock("denim", 70.0), stock("linen", 50.0), stock("wool", 400.0)],
        );

        let summary: Vec<_> = lines
            .iter()
            .map(|l| (l.catalog_item_id.as_str(), l.demanded, l.available, l.shortfall))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("denim", 120.0, 70.0, 50.0),
                ("silk", 10.0, 0.0, 10.0),
                ("linen", 30.0, 50.0, 0.0),
            ]
        );
    }

    #[test]
    fn stock_comes_from_available_lots_only() {
        let lots = vec![
            Lot {
                id: "L1".into(),
                catalog_item_id: "denim".into(),
                meters: 40.0,
                status: LotStatus::Available,
            },
            Lot {
                id: "L2".into(),
                catalog_item_id: "denim".into(),
                meters: 60.0,
                status: LotStatus::Reserved,
            },
        ];
        let snapshot = take_daily_snapshot(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(), &lots).unwrap();

        let lines = reconcile_demand(&[demand("denim", 50.0)], &stock_from_snapshot(&snapshot));
        assert_eq!(lines[0].available, 40.0);
        assert_eq!(lines[0].shortfall, 10.0);
    }

    proptest! {
        /// Property: shortfalls are never negative and come out sorted
        /// largest first.
        #[test]
        fn shortfalls_sorted_and_non_negative(
            demand_rows in prop::collection::vec((0usize..5, 0.0f64..500.0), 0..20),
            stock_rows in prop::collection::vec((0usize..5, 0.0f64..500.0), 0..20),
        ) {
            let items = ["a", "b", "c", "d", "e"];
            let demand: Vec<_> = demand_rows.iter().map(|(i, m)| demand(items[*i], *m)).collect();
            let stock: Vec<_> = stock_rows.iter().map(|(i, m)| stock(items[*i], *m)).collect();

            let lines = reconcile_demand(&demand, &stock);

            for line in &lines {
                prop_assert!(line.shortfall >= 0.0);
            }
            for pair in lines.windows(2) {
                prop_assert!(pair[0].shortfall >= pair[1].shortfall);
            }
        }
    }
}
