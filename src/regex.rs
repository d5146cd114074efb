//! ECMAScript 5 regex case-insensitivity primitives.
//!
//! `Canonicalize` (21.2.2.8.2) folds a code point to its single-scalar
//! upper-case form for case-insensitive matching; the equivalence class of
//! a code point is everything that folds to the same canonical, including
//! the canonical itself. ASCII never becomes equivalent to non-ASCII, so
//! e.g. `ſ` does not join the `s`/`S` class.

use crate::convert::{with_default_mapper, CaseMapper};
use crate::page::{build_canonical_page, build_class_page};

impl CaseMapper {
    /// The canonical (upper-case folded) form of `code_point`, or the code
    /// point itself when it has no single-scalar upper mapping.
    pub fn regexp_canonicalize(&self, code_point: char) -> char {
        self.canonical
            .borrow_mut()
            .lookup(code_point as u32, |page_index| {
                build_canonical_page(self.tables(), page_index)
            })
            .unwrap_or(code_point)
    }

    /// Every code point case-equivalent to `code_point`, canonical first,
    /// or `None` when the code point is only equivalent to itself.
    pub fn regexp_equivalence_class(&self, code_point: char) -> Option<Vec<char>> {
        let class = self
            .classes
            .borrow_mut()
            .lookup(code_point as u32, |page_index| {
                build_class_page(self.tables(), page_index)
            })?;
        Some(class.iter().filter_map(|&member| char::from_u32(member)).collect())
    }
}

/// Canonicalize a code point using the built-in tables.
pub fn regexp_canonicalize(code_point: char) -> char {
    with_default_mapper(|mapper| mapper.regexp_canonicalize(code_point))
}

/// Equivalence class of a code point using the built-in tables.
pub fn regexp_equivalence_class(code_point: char) -> Option<Vec<char>> {
    with_default_mapper(|mapper| mapper.regexp_equivalence_class(code_point))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_fixtures() {
        assert_eq!(regexp_canonicalize('!'), '!');
        assert_eq!(regexp_canonicalize('s'), 'S');
        assert_eq!(regexp_canonicalize('S'), 'S');
        assert_eq!(regexp_canonicalize('ς'), 'Σ');
        assert_eq!(regexp_canonicalize('σ'), 'Σ');
        assert_eq!(regexp_canonicalize('Σ'), 'Σ');
    }

    #[test]
    fn test_equivalence_class_fixtures() {
        assert_eq!(regexp_equivalence_class('!'), None);
        assert_eq!(regexp_equivalence_class('s'), Some(vec!['S', 's']));
        assert_eq!(regexp_equivalence_class('S'), Some(vec!['S', 's']));
        for member in ['ς', 'σ', 'Σ'] {
            assert_eq!(
                regexp_equivalence_class(member),
                Some(vec!['Σ', 'ς', 'σ']),
                "class of {member}"
            );
        }
    }

    #[test]
    fn test_singletons_even_with_multi_scalar_expansion() {
        // ß expands to "SS" at the string level but has no single-scalar
        // upper mapping, so it canonicalizes to itself and stays alone.
        assert_eq!(regexp_canonicalize('ß'), 'ß');
        assert_eq!(regexp_equivalence_class('ß'), None);
    }

    #[test]
    fn test_ascii_boundary_blocks_long_s() {
        assert_eq!(regexp_equivalence_class('ſ'), None);
        assert_eq!(regexp_equivalence_class('ı'), None);
        // The canonical table itself is unfiltered.
        assert_eq!(regexp_canonicalize('ſ'), 'S');
        assert_eq!(regexp_canonicalize('ı'), 'I');
    }

    #[test]
    fn test_class_is_stable_across_calls() {
        let first = regexp_equivalence_class('k');
        let second = regexp_equivalence_class('k');
        assert_eq!(first, second);
        assert_eq!(first, Some(vec!['K', 'k']));
    }
}
