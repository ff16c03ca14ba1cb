//! Built-in culture profiles seeded at startup.

use anyhow::{Context, Result};

use crate::models::RangeProfile;
use crate::store::ProfileLookup;

// ---

/// (name, pH, EC in mS/cm, water temperature in °C)
type ProfileSeed = (&'static str, (f64, f64), (f64, f64), (f64, f64));

const SEEDS: [ProfileSeed; 14] = [
    ("Lettuce", (5.5, 6.5), (0.8, 1.2), (15.0, 20.0)),
    ("Basil", (5.5, 6.5), (1.0, 1.6), (18.0, 24.0)),
    ("Strawberry", (5.5, 6.5), (1.2, 1.8), (16.0, 22.0)),
    ("Tomato", (5.5, 6.5), (2.0, 3.5), (18.0, 24.0)),
    ("Cucumber", (5.5, 6.0), (1.7, 2.5), (18.0, 24.0)),
    ("Pepper", (5.5, 6.5), (1.8, 2.5), (18.0, 25.0)),
    ("Spinach", (6.0, 7.0), (1.2, 1.8), (15.0, 20.0)),
    ("Arugula", (6.0, 7.0), (0.8, 1.2), (16.0, 22.0)),
    ("Mint", (6.0, 7.0), (1.8, 2.4), (18.0, 25.0)),
    ("Parsley", (5.5, 6.5), (0.8, 1.8), (16.0, 22.0)),
    ("Cilantro", (6.0, 6.8), (1.2, 1.8), (16.0, 24.0)),
    ("Microgreens", (5.5, 6.5), (0.6, 1.0), (18.0, 22.0)),
    ("Kale", (5.5, 6.5), (1.2, 1.5), (16.0, 22.0)),
    ("Bok Choy", (6.0, 7.0), (1.0, 1.5), (16.0, 22.0)),
];

/// The built-in profiles, validated.
pub fn builtin() -> Result<Vec<RangeProfile>> {
    // ---
    SEEDS
        .iter()
        .map(|(name, ph, ec, temp)| {
            RangeProfile::new(*name, *ph, *ec, *temp)
                .with_context(|| format!("built-in profile {name} is invalid"))
        })
        .collect()
}

/// Upsert every built-in profile. Returns how many were written.
pub async fn seed(lookup: &dyn ProfileLookup) -> Result<usize> {
    // ---
    let profiles = builtin()?;
    for profile in &profiles {
        lookup
            .upsert(profile)
            .await
            .with_context(|| format!("failed to seed culture profile {}", profile.name()))?;
    }
    tracing::info!("Seeded {} culture profiles", profiles.len());
    Ok(profiles.len())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Channel;
    use crate::store::MemoryStore;

    #[test]
    fn test_builtin_profiles_are_valid_and_unique() {
        // ---
        let profiles = builtin().unwrap();
        assert_eq!(profiles.len(), SEEDS.len());

        let mut names: Vec<&str> = profiles.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), profiles.len());
    }

    #[test]
    fn test_lettuce_ranges() {
        // ---
        let profiles = builtin().unwrap();
        let lettuce = profiles.iter().find(|p| p.name() == "Lettuce").unwrap();
        assert_eq!(lettuce.band(Channel::Ph).min, 5.5);
        assert_eq!(lettuce.band(Channel::Ec).max, 1.2);
        assert_eq!(lettuce.band(Channel::WaterTemp).max, 20.0);
    }

    #[test]
    fn test_seed_makes_profiles_resolvable() {
        // ---
        let store = MemoryStore::new();
        let written = tokio_test::block_on(seed(&store)).unwrap();
        assert_eq!(written, SEEDS.len());

        let farm = store.add_farm("North", 1, Some("Basil")).unwrap();
        let reservoir = store.add_reservoir(farm, "Tank A").unwrap();
        let profile = tokio_test::block_on(store.find_for_reservoir(reservoir))
            .unwrap()
            .unwrap();
        assert_eq!(profile.name(), "Basil");
    }
}
