//! Applying resolutions to produce a merged record.

use std::collections::BTreeSet;

use crate::conflict::{analyze, ConflictAnalysis, ResolutionMap, Side};
use crate::error::{DomainError, DomainResult};
use crate::record::Record;

/// Merge `local` and `server` according to `resolutions`.
///
/// Every field starts from the server value. Explicit entries in
/// `resolutions` win; otherwise auto-mergeable fields take their winning side.
/// A winning side that lacks the field removes it from the result.
///
/// Fails with [`DomainError::UnresolvedConflicts`] if any true conflict has no
/// entry in `resolutions`.
pub fn apply_resolutions(
    original: &Record,
    local: &Record,
    server: &Record,
    resolutions: &ResolutionMap,
) -> DomainResult<Record> {
    let analysis = analyze(original, local, server);
    apply_with_analysis(&analysis, local, server, resolutions)
}

/// Same as [`apply_resolutions`] for callers that already hold the analysis.
pub fn apply_with_analysis(
    analysis: &ConflictAnalysis,
    local: &Record,
    server: &Record,
    resolutions: &ResolutionMap,
) -> DomainResult<Record> {
    let unresolved = analysis.unresolved(resolutions);
    if !unresolved.is_empty() {
        return Err(DomainError::UnresolvedConflicts(unresolved));
    }

    let fields: BTreeSet<&String> = local.keys().chain(server.keys()).collect();
    let mut merged = server.clone();

    for field in fields {
        let side = resolutions
            .get(field.as_str())
            .copied()
            .or_else(|| analysis.auto_resolution(field))
            .unwrap_or(Side::Server);

        let winner = match side {
            Side::Local => local.get(field.as_str()),
            Side::Server => server.get(field.as_str()),
        };

        match winner {
            Some(value) => {
                merged.insert(field.clone(), value.clone());
            }
            None => {
                merged.remove(field.as_str());
            }
        }
    }

    Ok(merged)
}

/// Merge without operator input; `None` when a true conflict exists.
pub fn auto_merge(original: &Record, local: &Record, server: &Record) -> Option<Record> {
    let analysis = analyze(original, local, server);
    if analysis.has_conflicts() {
        return None;
    }
    apply_with_analysis(&analysis, local, server, &ResolutionMap::new()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::record_from_value;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn rec(v: Value) -> Record {
        record_from_value(v).unwrap()
    }

    #[test]
    fn resolving_conflict_to_local_takes_local_value() {
        let original = rec(json!({"status": "A"}));
        let local = rec(json!({"status": "B"}));
        let server = rec(json!({"status": "C"}));

        let mut resolutions = ResolutionMap::new();
        resolutions.insert("status".into(), Side::Local);

        let merged = apply_resolutions(&original, &local, &server, &resolutions).unwrap();
        assert_eq!(merged.get("status"), Some(&json!("B")));
    }

    #[test]
    fn missing_resolution_blocks_merge() {
        let original = rec(json!({"status": "A", "qty": 1}));
        let local = rec(json!({"status": "B", "qty": 2}));
        let server = rec(json!({"status": "C", "qty": 3}));

        let mut resolutions = ResolutionMap::new();
        resolutions.insert("qty".into(), Side::Server);

        let err = apply_resolutions(&original, &local, &server, &resolutions).unwrap_err();
        assert_eq!(err, DomainError::UnresolvedConflicts(vec!["status".into()]));
    }

    #[test]
    fn auto_merge_combines_one_sided_changes() {
        let original = rec(json!({"qty": 5, "location": "A-1", "note": "x"}));
        let local = rec(json!({"qty": 10, "location": "A-1", "note": "x"}));
        let server = rec(json!({"qty": 5, "location": "B-7", "note": "x", "updated_by": "ana"}));

        let merged = auto_merge(&original, &local, &server).unwrap();
        assert_eq!(
            Value::Object(merged),
            json!({"qty": 10, "location": "B-7", "note": "x", "updated_by": "ana"})
        );
    }

    #[test]
    fn auto_merge_refuses_true_conflicts() {
        let original = rec(json!({"qty": 5}));
        assert!(auto_merge(&original, &rec(json!({"qty": 6})), &rec(json!({"qty": 7}))).is_none());
    }

    #[test]
    fn local_removal_wins_when_server_untouched() {
        let original = rec(json!({"note": "fragile", "qty": 1}));
        let local = rec(json!({"qty": 1}));
        let server = rec(json!({"note": "fragile", "qty": 1}));

        let merged = auto_merge(&original, &local, &server).unwrap();
        assert!(!merged.contains_key("note"));
    }

    #[test]
    fn explicit_choice_overrides_auto_winner() {
        let original = rec(json!({"qty": 5}));
        let local = rec(json!({"qty": 10}));
        let server = rec(json!({"qty": 5}));

        let mut resolutions = ResolutionMap::new();
        resolutions.insert("qty".into(), Side::Server);

        let merged = apply_resolutions(&original, &local, &server, &resolutions).unwrap();
        assert_eq!(merged.get("qty"), Some(&json!(5)));
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        prop::collection::btree_map("[a-e]", 0i64..3, 0..5).prop_map(|m| {
            m.into_iter().map(|(k, v)| (k, json!(v))).collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: with every conflict resolved, each merged value comes
        /// from either local or server for that field.
        #[test]
        fn merged_values_come_from_local_or_server(
            original in arb_record(),
            local in arb_record(),
            server in arb_record(),
            picks in prop::collection::vec(any::<bool>(), 5),
        ) {
            let analysis = analyze(&original, &local, &server);
            let resolutions: ResolutionMap = analysis
                .conflicts
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let side = if picks[i % picks.len()] { Side::Local } else { Side::Server };
                    (c.field.clone(), side)
                })
                .collect();

            let merged = apply_with_analysis(&analysis, &local, &server, &resolutions).unwrap();

            for (field, value) in &merged {
                let from_local = local.get(field) == Some(value);
                let from_server = server.get(field) == Some(value);
                prop_assert!(from_local || from_server, "field {} has foreign value", field);
            }
        }
    }
}
