//! Built-in list of tracked Sri Lankan cities.

use tracing::info;

use crate::store::{StoreResult, WeatherStore};

#[derive(Debug, Clone, Copy)]
pub struct SeedCity {
    pub name: &'static str,
    pub province: &'static str,
    pub lat: f64,
    pub lon: f64,
}

const fn city(name: &'static str, province: &'static str, lat: f64, lon: f64) -> SeedCity {
    SeedCity {
        name,
        province,
        lat,
        lon,
    }
}

pub const SRI_LANKAN_CITIES: &[SeedCity] = &[
    city("Colombo", "Western Province", 6.9271, 79.8612),
    city("Kandy", "Central Province", 7.2906, 80.6337),
    city("Galle", "Southern Province", 6.0535, 80.2210),
    city("Jaffna", "Northern Province", 9.6615, 80.0255),
    city("Trincomalee", "Eastern Province", 8.5874, 81.2152),
    city("Ratnapura", "Sabaragamuwa Province", 6.6828, 80.3992),
    city("Nuwara Eliya", "Central Province", 6.9497, 80.7891),
    city("Badulla", "Uva Province", 6.9934, 81.0550),
    city("Anuradhapura", "North Central Province", 8.3114, 80.4037),
    city("Matara", "Southern Province", 5.9549, 80.5550),
    city("Negombo", "Western Province", 7.2008, 79.8737),
    city("Batticaloa", "Eastern Province", 7.7310, 81.6747),
    city("Hikkaduwa", "Southern Province", 6.1395, 80.1063),
    city("Ella", "Uva Province", 6.8667, 81.0466),
    city("Sigiriya", "Central Province", 7.9570, 80.7603),
    city("Diyatalawa", "Uva Province", 6.8167, 80.9667),
    city("Vavuniya", "Northern Province", 8.7514, 80.4971),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub existing: usize,
}

/// Insert every built-in city that is not stored yet.
pub fn seed_locations(store: &WeatherStore) -> StoreResult<SeedReport> {
    let mut report = SeedReport::default();

    for c in SRI_LANKAN_CITIES {
        let (_, created) = store.get_or_create_location(c.name, c.province, c.lat, c.lon)?;
        if created {
            report.created += 1;
        } else {
            report.existing += 1;
        }
    }

    info!(created = report.created, existing = report.existing, "seeded locations");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_idempotent() {
        let store = WeatherStore::in_memory().unwrap();

        let first = seed_locations(&store).unwrap();
        assert_eq!(first.created, SRI_LANKAN_CITIES.len());
        assert_eq!(first.existing, 0);

        let second = seed_locations(&store).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.existing, SRI_LANKAN_CITIES.len());

        assert_eq!(store.list_locations().unwrap().len(), 17);
    }

    #[test]
    fn seeded_cities_carry_coordinates() {
        let store = WeatherStore::in_memory().unwrap();
        seed_locations(&store).unwrap();

        let colombo = store.location_by_name("colombo").unwrap().unwrap();
        assert_eq!(colombo.region, "Western Province");
        assert!(colombo.has_coordinates());
    }
}
