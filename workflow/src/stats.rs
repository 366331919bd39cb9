//!
//! Counters keyed by a fixed enum, shared by every item a workflow processes.
//!
//! Stats from independent workflow instances (one per input shard) are
//! combined with `Metric::merge`.
//!
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use strum::IntoEnumIterator;

/// Anything that can be combined with another instance of itself.
pub trait Metric {
    /// Combine two metrics, modifying self in place and consuming `other`.
    fn merge(&mut self, other: Self);
}

/// The key of a counter. Implemented by fieldless enums deriving
/// `strum_macros::EnumIter` and `strum_macros::IntoStaticStr`.
pub trait StatKey: Copy + Eq + IntoEnumIterator + Into<&'static str> {
    /// Position of this key in `Self::iter()`.
    fn index(self) -> usize;

    fn name(self) -> &'static str {
        self.into()
    }
}

/// One `i64` counter per variant of `K`, all starting at zero.
#[derive(Clone, PartialEq, Eq)]
pub struct Stats<K> {
    counts: Vec<i64>,
    phantom: PhantomData<K>,
}

impl<K: StatKey> Default for Stats<K> {
    fn default() -> Self {
        Stats {
            counts: vec![0; K::iter().count()],
            phantom: PhantomData,
        }
    }
}

impl<K: StatKey> Stats<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: K) {
        self.counts[key.index()] += 1;
    }

    pub fn increment_by(&mut self, key: K, val: impl Into<i64>) {
        self.counts[key.index()] += val.into();
    }

    pub fn get(&self, key: K) -> i64 {
        self.counts[key.index()]
    }

    /// Every counter in declaration order, including those still at zero.
    pub fn iter(&self) -> impl Iterator<Item = (K, i64)> + '_ {
        K::iter().map(|k| (k, self.get(k)))
    }

    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }
}

impl<K: StatKey> Metric for Stats<K> {
    fn merge(&mut self, other: Self) {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
    }
}

impl<K: StatKey> std::iter::Sum for Stats<K> {
    fn sum<I: Iterator<Item = Stats<K>>>(iter: I) -> Stats<K> {
        iter.fold(Stats::default(), |mut acc, s| {
            acc.merge(s);
            acc
        })
    }
}

impl<K: StatKey> fmt::Debug for Stats<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k.name(), v)))
            .finish()
    }
}

impl<K: StatKey> fmt::Display for Stats<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.iter() {
            writeln!(f, "{}\t{v}", k.name())?;
        }
        Ok(())
    }
}

impl<K: StatKey> Serialize for Stats<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k.name(), &v)?;
        }
        map.end()
    }
}

impl<'de, K: StatKey> Deserialize<'de> for Stats<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, i64>::deserialize(deserializer)?;
        let mut stats = Stats::default();
        for (name, count) in raw {
            let key = K::iter()
                .find(|k| k.name() == name)
                .ok_or_else(|| D::Error::custom(format!("unknown counter '{name}'")))?;
            stats.counts[key.index()] = count;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use strum_macros::{EnumIter, IntoStaticStr};

    #[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, IntoStaticStr)]
    #[strum(serialize_all = "snake_case")]
    enum Count {
        TooShort,
        Ambiguous,
    }

    impl StatKey for Count {
        fn index(self) -> usize {
            self as usize
        }
    }

    #[test]
    fn test_increment_and_names() {
        let mut s = Stats::<Count>::new();
        assert_eq!(s.total(), 0);
        s.increment(Count::Ambiguous);
        s.increment_by(Count::Ambiguous, 2);
        s.increment(Count::TooShort);
        assert_eq!(s.get(Count::Ambiguous), 3);
        assert_eq!(s.get(Count::TooShort), 1);
        assert_eq!(s.to_string(), "too_short\t1\nambiguous\t3\n");
    }

    #[test]
    fn test_json() {
        let mut s = Stats::<Count>::new();
        s.increment(Count::TooShort);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"too_short":1,"ambiguous":0}"#);
        let back: Stats<Count> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert!(serde_json::from_str::<Stats<Count>>(r#"{"bogus":1}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_test_merge_adds(a in 0i64..1000, b in 0i64..1000, c in 0i64..1000) {
            let mut x = Stats::<Count>::new();
            x.increment_by(Count::TooShort, a);
            let mut y = Stats::<Count>::new();
            y.increment_by(Count::TooShort, b);
            y.increment_by(Count::Ambiguous, c);
            let summed: Stats<Count> = vec![x.clone(), y.clone()].into_iter().sum();
            x.merge(y);
            prop_assert_eq!(x.get(Count::TooShort), a + b);
            prop_assert_eq!(x.get(Count::Ambiguous), c);
            prop_assert_eq!(summed, x);
        }
    }
}
