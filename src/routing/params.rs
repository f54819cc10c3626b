//! Captured path parameters.

/// Ordered mapping from parameter name to its decoded value.
///
/// A name may be present without a value when an optional segment did not
/// participate in the match. Positional parameters (wildcards, unnamed
/// regex groups) use the names `"0"`, `"1"`, ...
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Option<String>)>,
}

impl Params {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded value of `name`, if it was captured.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Whether `name` is present, with or without a value.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    /// Set `name` to `value`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert_raw(name.into(), Some(value.into()));
    }

    /// Iterate over the parameters that carry a value, in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (key.as_str(), v)))
    }

    /// Number of names present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert_raw(&mut self, name: String, value: Option<String>) {
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Count of consecutive positional names starting at `"0"`.
    fn positional_len(&self) -> usize {
        let mut count = 0;
        while self.contains(&count.to_string()) {
            count += 1;
        }
        count
    }

    /// Overlay `self` on top of `parent`.
    ///
    /// When both sides carry positional parameters, the child's positional
    /// run is shifted past the parent's so neither set is lost.
    pub(crate) fn merged_over(self, parent: &Params) -> Params {
        let mut merged = parent.clone();

        if !self.contains("0") || !parent.contains("0") {
            for (name, value) in self.entries {
                merged.insert_raw(name, value);
            }
            return merged;
        }

        let offset = parent.positional_len();
        let run = self.positional_len();
        for (name, value) in self.entries {
            let name = match name.parse::<usize>() {
                Ok(index) if index < run => (index + offset).to_string(),
                _ => name,
            };
            merged.insert_raw(name, value);
        }
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}
