//! Global reference tracking
//!
//! Generated code may reference free host identifiers (`Object`, `require`,
//! names appearing in foreign code, ...). Every generator returns the set of
//! such references it emitted next to its tree, and the sets are unioned on the
//! way up to the run coordinator.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Set of free identifiers referenced by generated code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GlobalRefs(BTreeSet<String>);

impl GlobalRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(name: impl Into<String>) -> Self {
        let mut refs = Self::new();
        refs.insert(name);
        refs
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    pub fn extend(&mut self, other: &GlobalRefs) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn union(mut self, other: &GlobalRefs) -> Self {
        self.extend(other);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    /// Subset of names the filter considers dangerous
    pub fn dangerous(&self, filter: &DangerousFilter) -> GlobalRefs {
        GlobalRefs(
            self.0
                .iter()
                .filter(|name| filter.is_dangerous(name))
                .cloned()
                .collect(),
        )
    }
}

impl fmt::Display for GlobalRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for GlobalRefs {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        GlobalRefs(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a GlobalRefs {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A generated value together with the global refs it introduced
#[derive(Debug, Clone, PartialEq)]
pub struct WithGlobals<T> {
    pub value: T,
    pub globals: GlobalRefs,
}

impl<T> WithGlobals<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            globals: GlobalRefs::new(),
        }
    }

    pub fn with(value: T, globals: GlobalRefs) -> Self {
        Self { value, globals }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WithGlobals<U> {
        WithGlobals {
            value: f(self.value),
            globals: self.globals,
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> WithGlobals<U>) -> WithGlobals<U> {
        let next = f(self.value);
        WithGlobals {
            value: next.value,
            globals: self.globals.union(&next.globals),
        }
    }

    /// Take the value out, moving its refs into an accumulator
    pub fn unwrap_into(self, acc: &mut GlobalRefs) -> T {
        acc.extend(&self.globals);
        self.value
    }

    /// Lift an optional result; an absent value contributes no refs
    pub fn option(value: Option<WithGlobals<T>>) -> WithGlobals<Option<T>> {
        match value {
            Some(inner) => inner.map(Some),
            None => WithGlobals::new(None),
        }
    }

    pub fn list(items: impl IntoIterator<Item = WithGlobals<T>>) -> WithGlobals<Vec<T>> {
        let mut globals = GlobalRefs::new();
        let value = items
            .into_iter()
            .map(|item| item.unwrap_into(&mut globals))
            .collect();
        WithGlobals { value, globals }
    }
}

/// Which global refs generators record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRefTracking {
    /// Record every free identifier
    All,
    /// Record only names the dangerous filter accepts
    #[default]
    Dangerous,
}

impl GlobalRefTracking {
    pub fn should_track(self, name: &str, filter: &DangerousFilter) -> bool {
        match self {
            GlobalRefTracking::All => true,
            GlobalRefTracking::Dangerous => filter.is_dangerous(name),
        }
    }
}

/// Predicate deciding whether a global name may clash with generated names
///
/// The emitter assumes the predicate is pure. An impure predicate can make
/// the second pass disagree with the first, which is reported as an error.
#[derive(Clone)]
pub struct DangerousFilter(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl DangerousFilter {
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        DangerousFilter(Arc::new(predicate))
    }

    pub fn is_dangerous(&self, name: &str) -> bool {
        (self.0)(name)
    }
}

impl Default for DangerousFilter {
    /// Names that look generated (`$` prefix) plus the identifiers with
    /// special meaning inside function bodies
    fn default() -> Self {
        DangerousFilter::new(|name| {
            name.starts_with('$') || name == "arguments" || name == "eval"
        })
    }
}

impl fmt::Debug for DangerousFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DangerousFilter(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let filter = DangerousFilter::default();
        assert!(filter.is_dangerous("$c_Foo"));
        assert!(filter.is_dangerous("eval"));
        assert!(filter.is_dangerous("arguments"));
        assert!(!filter.is_dangerous("Object"));
        assert!(!filter.is_dangerous("require"));
    }

    #[test]
    fn test_dangerous_subset() {
        let refs: GlobalRefs = ["Object", "$x", "eval"].into_iter().collect();
        let dangerous = refs.dangerous(&DangerousFilter::default());
        let expected: GlobalRefs = ["$x", "eval"].into_iter().collect();
        assert_eq!(dangerous, expected);
    }

    #[test]
    fn test_option_absent_contributes_nothing() {
        let absent: WithGlobals<Option<i32>> = WithGlobals::option(None);
        assert!(absent.globals.is_empty());
        let present = WithGlobals::option(Some(WithGlobals::with(1, GlobalRefs::single("a"))));
        assert_eq!(present.value, Some(1));
        assert!(present.globals.contains("a"));
    }

    #[test]
    fn test_list_unions_refs() {
        let items = vec![
            WithGlobals::with(1, GlobalRefs::single("a")),
            WithGlobals::new(2),
            WithGlobals::with(3, GlobalRefs::single("b")),
        ];
        let merged = WithGlobals::list(items);
        assert_eq!(merged.value, vec![1, 2, 3]);
        let expected: GlobalRefs = ["a", "b"].into_iter().collect();
        assert_eq!(merged.globals, expected);
    }

    #[test]
    fn test_tracking_modes() {
        let filter = DangerousFilter::default();
        assert!(GlobalRefTracking::All.should_track("Object", &filter));
        assert!(!GlobalRefTracking::Dangerous.should_track("Object", &filter));
        assert!(GlobalRefTracking::Dangerous.should_track("$a", &filter));
    }
}
