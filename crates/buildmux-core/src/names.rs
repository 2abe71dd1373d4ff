//! Name-insensitive comparison for project paths, tools versions, target
//! names, and item/metadata names.
//!
//! A single ASCII-lowercase fold is used as the invariant casing rule; this
//! is a deliberate simplification of locale-aware casing in favor of a
//! comparison that is reproducible across machines and cache entries.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A string compared, hashed, and ordered case-insensitively.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CiString(String);

impl CiString {
    /// Wrap a string for case-insensitive comparison.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the original, un-folded string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn folded(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for CiString {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CiString {}

impl Hash for CiString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}

impl PartialOrd for CiString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CiString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(&other.folded())
    }
}

impl From<&str> for CiString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CiString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for CiString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered set of name/value pairs compared, hashed, and looked up
/// case-insensitively on the name, independent of insertion order.
///
/// Two `GlobalProperties` with the same pairs in a different order compare
/// equal and hash equal: both operations go through a canonical
/// [`BTreeMap`] keyed by [`CiString`].
#[derive(Debug, Clone, Default)]
pub struct GlobalProperties {
    entries: Vec<(String, String)>,
}

impl GlobalProperties {
    /// An empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a property by name (case-insensitive).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            slot.1 = value.into();
        } else {
            self.entries.push((name, value.into()));
        }
    }

    /// Look up a property by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Number of distinct properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this property set has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn canonical(&self) -> BTreeMap<CiString, &str> {
        self.entries
            .iter()
            .map(|(k, v)| (CiString::new(k.clone()), v.as_str()))
            .collect()
    }
}

impl FromIterator<(String, String)> for GlobalProperties {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

impl PartialEq for GlobalProperties {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for GlobalProperties {}

impl Hash for GlobalProperties {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl serde::Serialize for GlobalProperties {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for GlobalProperties {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<(String, String)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn global_properties_equality_is_order_independent(
            pairs in proptest::collection::vec(("[a-zA-Z]{1,8}", "[a-zA-Z0-9]{0,8}"), 0..8)
        ) {
            let mut forward = GlobalProperties::new();
            for (k, v) in &pairs {
                forward.insert(k.clone(), v.clone());
            }
            let mut reversed = GlobalProperties::new();
            for (k, v) in pairs.iter().rev() {
                reversed.insert(k.clone(), v.clone());
            }
            prop_assert_eq!(forward, reversed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci_string_equality_ignores_case() {
        assert_eq!(CiString::new("Debug"), CiString::new("DEBUG"));
        assert_ne!(CiString::new("Debug"), CiString::new("Release"));
    }

    #[test]
    fn ci_string_ordering_is_case_insensitive() {
        let mut names = vec![CiString::new("Zeta"), CiString::new("alpha")];
        names.sort();
        assert_eq!(names[0].as_str(), "alpha");
    }

    #[test]
    fn global_properties_equal_regardless_of_order() {
        let mut a = GlobalProperties::new();
        a.insert("Configuration", "Debug");
        a.insert("Platform", "x64");

        let mut b = GlobalProperties::new();
        b.insert("platform", "x64");
        b.insert("configuration", "Debug");

        assert_eq!(a, b);

        let mut hasher_a = std::collections::hash_map::DefaultHasher::new();
        a.hash(&mut hasher_a);
        let mut hasher_b = std::collections::hash_map::DefaultHasher::new();
        b.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
    }

    #[test]
    fn global_properties_lookup_is_case_insensitive() {
        let mut props = GlobalProperties::new();
        props.insert("Configuration", "Release");
        assert_eq!(props.get("CONFIGURATION"), Some("Release"));
    }

    #[test]
    fn differing_values_break_equality() {
        let mut a = GlobalProperties::new();
        a.insert("Configuration", "Debug");
        let mut b = GlobalProperties::new();
        b.insert("Configuration", "Release");
        assert_ne!(a, b);
    }
}
