//! A bitset over symbol ids.

use super::SymbolId;

/// A dense set of symbols, sized to one grammar's symbol count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenSet {
    bits: Vec<u64>,
}

impl TokenSet {
    pub fn new(symbol_count: usize) -> Self {
        Self {
            bits: vec![0; symbol_count.div_ceil(64)],
        }
    }

    pub fn insert(&mut self, symbol: SymbolId) {
        let i = symbol.index();
        if let Some(word) = self.bits.get_mut(i / 64) {
            *word |= 1 << (i % 64);
        }
    }

    pub fn contains(&self, symbol: SymbolId) -> bool {
        let i = symbol.index();
        self.bits
            .get(i / 64)
            .is_some_and(|word| word & (1 << (i % 64)) != 0)
    }

    /// Union `other` into `self`; true if anything changed.
    pub fn union_with(&mut self, other: &TokenSet) -> bool {
        let mut changed = false;
        for (dst, src) in self.bits.iter_mut().zip(&other.bits) {
            let next = *dst | *src;
            if next != *dst {
                *dst = next;
                changed = true;
            }
        }
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.bits.iter().enumerate().flat_map(|(wi, word)| {
            (0..64)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| SymbolId((wi * 64 + bit) as u16))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains_iter() {
        let mut set = TokenSet::new(130);
        set.insert(SymbolId(0));
        set.insert(SymbolId(63));
        set.insert(SymbolId(64));
        set.insert(SymbolId(129));
        assert!(set.contains(SymbolId(0)));
        assert!(set.contains(SymbolId(129)));
        assert!(!set.contains(SymbolId(1)));
        let all: Vec<_> = set.iter().collect();
        assert_eq!(
            all,
            vec![SymbolId(0), SymbolId(63), SymbolId(64), SymbolId(129)]
        );
    }

    #[test]
    fn test_union_reports_change() {
        let mut a = TokenSet::new(10);
        let mut b = TokenSet::new(10);
        b.insert(SymbolId(3));
        assert!(a.union_with(&b));
        assert!(!a.union_with(&b));
        assert!(a.contains(SymbolId(3)));
    }
}
