use tracing::debug;

use crate::store::{StoreResult, WeatherStore};

/// Bounds the current-weather history kept per location.
#[derive(Debug, Clone, Copy)]
pub struct RetentionTrimmer {
    keep: usize,
}

impl RetentionTrimmer {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    /// Delete every snapshot beyond the `keep` newest. Returns how many were removed.
    pub fn trim(&self, store: &WeatherStore, location_id: i64) -> StoreResult<usize> {
        let ids = store.snapshot_ids_newest_first(location_id)?;
        let Some(stale) = ids.get(self.keep..) else {
            return Ok(0);
        };

        let removed = store.delete_snapshots(stale)?;
        if removed > 0 {
            debug!(location_id, removed, keep = self.keep, "trimmed old snapshots");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_conditions;
    use chrono::{Duration, TimeZone, Utc};

    fn store_with_snapshots(count: i64) -> (WeatherStore, i64) {
        let store = WeatherStore::in_memory().unwrap();
        let loc = store.insert_location("Kandy", "Central Province", 7.29, 80.63).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        for i in 0..count {
            store
                .insert_snapshot(
                    loc.id,
                    &sample_conditions(20.0 + i as f64),
                    start + Duration::minutes(20 * i),
                )
                .unwrap();
        }
        (store, loc.id)
    }

    #[test]
    fn below_the_bound_is_a_noop() {
        let (store, id) = store_with_snapshots(10);

        assert_eq!(RetentionTrimmer::new(10).trim(&store, id).unwrap(), 0);
        assert_eq!(store.snapshot_ids_newest_first(id).unwrap().len(), 10);
    }

    #[test]
    fn keeps_only_the_newest() {
        let (store, id) = store_with_snapshots(14);
        let trimmer = RetentionTrimmer::new(10);

        assert_eq!(trimmer.trim(&store, id).unwrap(), 4);
        assert_eq!(trimmer.trim(&store, id).unwrap(), 0);

        let kept = store.snapshots_newest_first(id).unwrap();
        let temps: Vec<f64> = kept.iter().map(|s| s.conditions.temperature_c).collect();
        let expected: Vec<f64> = (4..14).rev().map(|i| 20.0 + i as f64).collect();
        assert_eq!(temps, expected);
    }

    #[test]
    fn only_touches_the_given_location() {
        let (store, id) = store_with_snapshots(12);
        let other = store.insert_location("Galle", "", 6.05, 80.22).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        for i in 0..3 {
            store
                .insert_snapshot(other.id, &sample_conditions(28.0), start + Duration::hours(i))
                .unwrap();
        }

        RetentionTrimmer::new(2).trim(&store, id).unwrap();

        assert_eq!(store.snapshot_ids_newest_first(id).unwrap().len(), 2);
        assert_eq!(store.snapshot_ids_newest_first(other.id).unwrap().len(), 3);
    }
}
