//! Vehicle identity resolution.
//!
//! Trip telemetry carries display names, not canonical ids. The registry is
//! a lookup map keyed by normalized name, rebuilt from the vehicle table on
//! every dataset build so renamed vehicles never resolve against stale state.

use std::collections::HashMap;

use uuid::Uuid;

/// Normalizes a display name for lookup: lowercased, trimmed, internal
/// whitespace collapsed to single spaces.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display-name → canonical-id lookup for the vehicle fleet.
#[derive(Debug, Clone, Default)]
pub struct VehicleRegistry {
    by_normalized_name: HashMap<String, Uuid>,
}

impl VehicleRegistry {
    /// Builds a registry from `(canonical id, display name)` pairs. Entries
    /// whose name normalizes to the empty string are ignored.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, S)>,
        S: AsRef<str>,
    {
        let mut by_normalized_name = HashMap::new();
        for (id, name) in entries {
            let normalized = normalize_name(name.as_ref());
            if !normalized.is_empty() {
                by_normalized_name.insert(normalized, id);
            }
        }
        Self { by_normalized_name }
    }

    /// Resolves a display name to its canonical vehicle id.
    #[must_use]
    pub fn resolve(&self, display_name: &str) -> Option<Uuid> {
        self.by_normalized_name
            .get(&normalize_name(display_name))
            .copied()
    }

    /// Returns the number of registered vehicles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_normalized_name.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_normalized_name.is_empty()
    }
}
