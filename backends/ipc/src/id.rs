//! Request identifiers.
//!
//! Ids have the shape `<cmd prefix><n>-req<m>`. Both numbers come from one
//! process-wide counter, so two transports built with the same command prefix
//! still never hand out the same id.

use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 { COUNTER.fetch_add(1, Ordering::Relaxed) + 1 }

/// Generates ids for one transport.
#[derive(Debug, Clone)]
pub struct RequestIdGenerator {
    prefix: String,
}

impl RequestIdGenerator {
    /// Creates a generator whose ids start with `cmd_prefix`.
    pub fn new(cmd_prefix: &str) -> Self {
        Self { prefix: format!("{}{}", cmd_prefix, next_sequence()) }
    }

    /// The per-transport prefix, e.g. `clightning3`.
    pub fn prefix(&self) -> &str { &self.prefix }

    /// A fresh id.
    pub fn next_id(&self) -> String { format!("{}-req{}", self.prefix, next_sequence()) }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_id_shape() {
        let ids = RequestIdGenerator::new("clightning");
        assert!(ids.prefix().starts_with("clightning"));
        assert!(ids.prefix()["clightning".len()..].parse::<u64>().is_ok());

        let id = ids.next_id();
        let (prefix, counter) = id.split_once("-req").expect("separator");
        assert_eq!(prefix, ids.prefix());
        assert!(counter.parse::<u64>().is_ok());
    }

    #[test]
    fn test_ids_unique_across_generators() {
        let a = RequestIdGenerator::new("cl");
        let b = RequestIdGenerator::new("cl");
        assert_ne!(a.prefix(), b.prefix());

        let seen: HashSet<String> =
            (0..100).flat_map(|_| [a.next_id(), b.next_id()]).collect();
        assert_eq!(seen.len(), 200);
    }
}
