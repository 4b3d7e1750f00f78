//! Deterministic seed derivation.
//!
//! Every random decision draws from a string seed derived from the call's
//! root seed and the position of the row being generated, so identical
//! inputs always produce identical rows regardless of what else ran before.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use seedsmith_plan::Count;

/// One step in a generation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Model or relation field name.
    Model(String),
    Index(usize),
}

/// Position of a row or batch inside a generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SeedPath(Vec<PathSegment>);

impl SeedPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn model(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Model(name.into()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Index(index));
        next
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for SeedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            match segment {
                PathSegment::Model(name) => f.write_str(&escape_segment(name))?,
                PathSegment::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

/// Seed string for `path` under `root`, e.g. `root/0/Team/1/players/2`.
pub fn derive_seed(root: &str, path: &SeedPath) -> String {
    if path.segments().is_empty() {
        root.to_string()
    } else {
        format!("{root}/{path}")
    }
}

/// Seed for one field of a row.
pub fn field_seed(row_seed: &str, field: &str) -> String {
    format!("{row_seed}/{}", escape_segment(field))
}

/// Seed for a retry of a field whose first value collided.
pub fn attempt_seed(field_seed: &str, attempt: usize) -> String {
    format!("{field_seed}/{attempt}")
}

/// Random generator keyed by a seed string.
pub fn seeded_rng(seed: &str) -> ChaCha8Rng {
    let digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
    ChaCha8Rng::from_seed(digest)
}

/// First 64 bits of the seed's generator, handy for simple picks.
pub fn seed_u64(seed: &str) -> u64 {
    seeded_rng(seed).random()
}

/// Index in `0..len` chosen by the seed; `len` must be non-zero.
pub fn seeded_index(seed: &str, len: usize) -> usize {
    seeded_rng(seed).random_range(0..len)
}

/// Number of rows a count asks for; ranges are inclusive and resolved from the seed.
pub fn resolve_count(count: &Count, seed: &str) -> usize {
    match *count {
        Count::Fixed(value) => value as usize,
        Count::Range { min, max } if min >= max => min as usize,
        Count::Range { min, max } => seeded_rng(seed).random_range(min..=max) as usize,
    }
}

// `%` and `/` are percent-escaped; names starting with a digit get a `%_`
// prefix so they never read as an index segment.
fn escape_segment(name: &str) -> String {
    let escaped = name.replace('%', "%25").replace('/', "%2F");
    if escaped.starts_with(|c: char| c.is_ascii_digit()) {
        format!("%_{escaped}")
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_paths() {
        let path = SeedPath::root()
            .index(0)
            .model("teams")
            .index(1)
            .model("players")
            .index(2);
        assert_eq!(derive_seed("root", &path), "root/0/teams/1/players/2");
        assert_eq!(derive_seed("root", &SeedPath::root()), "root");
    }

    #[test]
    fn distinct_paths_give_distinct_seeds() {
        let by_index = SeedPath::root().index(0);
        let by_name = SeedPath::root().model("0");
        assert_ne!(derive_seed("s", &by_index), derive_seed("s", &by_name));

        let nested = SeedPath::root().model("a").model("b");
        let slashed = SeedPath::root().model("a/b");
        assert_ne!(derive_seed("s", &nested), derive_seed("s", &slashed));

        let escaped = SeedPath::root().model("%2Fx");
        let digit = SeedPath::root().model("2Fx");
        assert_ne!(derive_seed("s", &escaped), derive_seed("s", &digit));
    }

    #[test]
    fn rng_is_stable_per_seed() {
        assert_eq!(seed_u64("root/0/Team/0"), seed_u64("root/0/Team/0"));
        assert_ne!(seed_u64("root/0/Team/0"), seed_u64("root/0/Team/1"));
    }

    #[test]
    fn count_ranges_stay_inclusive() {
        for idx in 0..50 {
            let seed = format!("count/{idx}");
            let count = resolve_count(&Count::Range { min: 2, max: 4 }, &seed);
            assert!((2..=4).contains(&count));
            assert_eq!(count, resolve_count(&Count::Range { min: 2, max: 4 }, &seed));
        }
        assert_eq!(resolve_count(&Count::Fixed(3), "any"), 3);
    }
}
