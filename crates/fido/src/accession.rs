//! Reversible sanitization of protein accessions for the solver grammar.

use fnv::FnvHashMap;
use std::collections::BTreeSet;

/// Characters the solver input grammar reserves as separators.
const RESERVED: &[char] = &[' ', '\t', ',', '{', '}'];

/// Total, injective mapping between raw protein accessions and solver-safe
/// tokens, built once per adapter invocation from the union of all
/// accessions across all runs and immutable afterwards.
///
/// Two one-directional maps kept in sync by a single insertion operation;
/// uniqueness is enforced at insertion time.
#[derive(Debug, Default)]
pub struct AccessionMap {
    forward: FnvHashMap<String, String>,
    reverse: FnvHashMap<String, String>,
}

impl AccessionMap {
    /// Build the map over the distinct accessions in `accessions`.
    ///
    /// Each token is the longest prefix of the raw accession preceding any
    /// reserved character, plus an underscore and a 1-based sequence number
    /// in sorted-set iteration order, so tokens stay unique even when
    /// prefixes collide or are empty.
    pub fn build<'a, I>(accessions: I) -> AccessionMap
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = accessions.into_iter().collect();
        let mut map = AccessionMap::default();
        for (ix, raw) in distinct.into_iter().enumerate() {
            let prefix = match raw.find(RESERVED) {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            map.insert(raw.to_string(), format!("{}_{}", prefix, ix + 1));
        }
        map
    }

    fn insert(&mut self, raw: String, token: String) {
        let prev = self.reverse.insert(token.clone(), raw.clone());
        assert!(prev.is_none(), "token `{}` assigned twice", token);
        let prev = self.forward.insert(raw, token);
        assert!(prev.is_none(), "accession sanitized twice");
    }

    /// Raw accession → solver-safe token.
    pub fn sanitize(&self, raw: &str) -> Option<&str> {
        self.forward.get(raw).map(String::as_str)
    }

    /// Solver-safe token → raw accession.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        self.reverse.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let accessions = ["sp|P12345|ALBU_HUMAN", "GP:AJ271067_1", "DECOY_sp|Q99536"];
        let map = AccessionMap::build(accessions.iter().copied());
        assert_eq!(map.len(), 3);
        for raw in accessions {
            let token = map.sanitize(raw).unwrap();
            assert_eq!(map.resolve(token), Some(raw));
            assert!(!token.contains(RESERVED));
        }
    }

    #[test]
    fn colliding_prefixes_stay_distinct() {
        let map = AccessionMap::build(["X,1", "X 2"]);
        let a = map.sanitize("X,1").unwrap();
        let b = map.sanitize("X 2").unwrap();
        assert_ne!(a, b);
        assert_eq!(map.resolve(a), Some("X,1"));
        assert_eq!(map.resolve(b), Some("X 2"));
    }

    #[test]
    fn empty_prefix_still_unique() {
        let map = AccessionMap::build([" leading space", "{brace"]);
        assert_eq!(map.sanitize(" leading space"), Some("_1"));
        assert_eq!(map.sanitize("{brace"), Some("_2"));
    }

    #[test]
    fn unknown_token_resolves_to_none() {
        let map = AccessionMap::build(["ACC"]);
        assert_eq!(map.resolve("ACC_2"), None);
    }
}
