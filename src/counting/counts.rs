//! 分方向计数表
//! Per-class counters split by direction, seeded with explicit zeros

use super::crossing::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `{ "incoming": {class: n}, "outgoing": {class: n} }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionCounts {
    pub incoming: BTreeMap<String, u64>,
    pub outgoing: BTreeMap<String, u64>,
}

impl DirectionCounts {
    /// 为每个目标类别预置0
    pub fn with_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = Self::default();
        for class in classes {
            let class = class.as_ref().to_string();
            counts.incoming.insert(class.clone(), 0);
            counts.outgoing.insert(class, 0);
        }
        counts
    }

    fn table(&self, direction: Direction) -> &BTreeMap<String, u64> {
        match direction {
            Direction::Incoming => &self.incoming,
            Direction::Outgoing => &self.outgoing,
        }
    }

    fn table_mut(&mut self, direction: Direction) -> &mut BTreeMap<String, u64> {
        match direction {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing => &mut self.outgoing,
        }
    }

    /// Absent classes read as zero.
    pub fn get(&self, direction: Direction, class: &str) -> u64 {
        self.table(direction).get(class).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, direction: Direction, class: &str) -> u64 {
        let slot = self.table_mut(direction).entry(class.to_string()).or_insert(0);
        *slot += 1;
        *slot
    }

    pub fn total(&self, direction: Direction) -> u64 {
        self.table(direction).values().sum()
    }

    pub fn grand_total(&self) -> u64 {
        Direction::ALL.iter().map(|d| self.total(*d)).sum()
    }

    /// Non-zero entries only, e.g. `incoming car=1 | outgoing bus=2`.
    pub fn summary_line(&self) -> String {
        Direction::ALL
            .iter()
            .map(|d| {
                let parts: Vec<String> = self
                    .table(*d)
                    .iter()
                    .filter(|(_, n)| **n > 0)
                    .map(|(class, n)| format!("{}={}", class, n))
                    .collect();
                format!("{} {}", d, parts.join(" "))
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_zeros() {
        let counts = DirectionCounts::with_classes(["car", "bus", "truck"]);
        for d in Direction::ALL {
            assert_eq!(counts.get(d, "car"), 0);
            assert_eq!(counts.get(d, "truck"), 0);
        }
        assert_eq!(counts.incoming.len(), 3);
        assert_eq!(counts.grand_total(), 0);
    }

    #[test]
    fn test_absent_class_reads_zero() {
        let counts = DirectionCounts::with_classes(["car"]);
        assert_eq!(counts.get(Direction::Incoming, "bicycle"), 0);
        assert!(!counts.incoming.contains_key("bicycle"));
    }

    #[test]
    fn test_increment() {
        let mut counts = DirectionCounts::with_classes(["car"]);
        assert_eq!(counts.increment(Direction::Outgoing, "car"), 1);
        assert_eq!(counts.increment(Direction::Outgoing, "car"), 2);
        assert_eq!(counts.increment(Direction::Incoming, "bus"), 1);
        assert_eq!(counts.get(Direction::Outgoing, "car"), 2);
        assert_eq!(counts.get(Direction::Incoming, "car"), 0);
        assert_eq!(counts.total(Direction::Outgoing), 2);
        assert_eq!(counts.grand_total(), 3);
        assert_eq!(counts.summary_line(), "incoming bus=1 | outgoing car=2");
    }

    #[test]
    fn test_json_shape() {
        let mut counts = DirectionCounts::with_classes(["car"]);
        counts.increment(Direction::Incoming, "car");
        let value = serde_json::to_value(&counts).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"incoming": {"car": 1}, "outgoing": {"car": 0}})
        );
    }
}
