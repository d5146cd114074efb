//! String-level case conversion.
//!
//! A [`CaseMapper`] owns the four lazy page caches (upper, lower, regex
//! canonical, regex equivalence) over one table set. Conversion streams the
//! input's code points, leaves unchanged runs untouched until a mapping
//! fires, and only then starts copying into an output buffer, so an input
//! that maps to itself comes back borrowed without a single allocation.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use crate::bytecode::Direction;
use crate::cache::PageCache;
use crate::page::{build_string_page, CaseMapping};
use crate::tables::CaseTables;

/// Case-conversion handle: one table set plus its page caches.
///
/// The caches use interior mutability, so a mapper is cheap to call through
/// a shared reference but is deliberately not `Sync`; give each thread its
/// own (the crate-level functions do exactly that).
pub struct CaseMapper {
    tables: Cow<'static, CaseTables>,
    upper: RefCell<PageCache<CaseMapping>>,
    lower: RefCell<PageCache<CaseMapping>>,
    pub(crate) canonical: RefCell<PageCache<char>>,
    pub(crate) classes: RefCell<PageCache<Rc<[u32]>>>,
}

impl CaseMapper {
    /// A mapper over the built-in tables.
    pub fn new() -> CaseMapper {
        CaseMapper::over(Cow::Borrowed(CaseTables::builtin()))
    }

    /// A mapper over caller-supplied tables (see
    /// [`CaseTables::from_programs`]).
    pub fn with_tables(tables: CaseTables) -> CaseMapper {
        CaseMapper::over(Cow::Owned(tables))
    }

    fn over(tables: Cow<'static, CaseTables>) -> CaseMapper {
        CaseMapper {
            tables,
            upper: RefCell::new(PageCache::new()),
            lower: RefCell::new(PageCache::new()),
            canonical: RefCell::new(PageCache::new()),
            classes: RefCell::new(PageCache::new()),
        }
    }

    pub(crate) fn tables(&self) -> &CaseTables {
        &self.tables
    }

    /// Upper-case `input`, borrowing it back unchanged when no code point
    /// has an upper mapping.
    pub fn to_uppercase<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.convert(input, Direction::Upper)
    }

    /// Lower-case `input`, borrowing it back unchanged when no code point
    /// has a lower mapping.
    pub fn to_lowercase<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.convert(input, Direction::Lower)
    }

    fn convert<'a>(&self, input: &'a str, direction: Direction) -> Cow<'a, str> {
        let cache = match direction {
            Direction::Upper => &self.upper,
            Direction::Lower => &self.lower,
        };
        let mut cache = cache.borrow_mut();

        let mut output: Option<String> = None;
        // Byte index where the pending unchanged run began.
        let mut run_start = 0;

        for (index, ch) in input.char_indices() {
            let mapping = cache.lookup(ch as u32, |page_index| {
                build_string_page(self.tables(), direction, page_index)
            });
            let Some(mapping) = mapping else { continue };

            let buffer = output.get_or_insert_with(|| String::with_capacity(input.len()));
            buffer.push_str(&input[run_start..index]);
            for &mapped in mapping.chars() {
                buffer.push(mapped);
            }
            run_start = index + ch.len_utf8();
        }

        match output {
            None => Cow::Borrowed(input),
            Some(mut buffer) => {
                buffer.push_str(&input[run_start..]);
                Cow::Owned(buffer)
            }
        }
    }
}

impl Default for CaseMapper {
    fn default() -> CaseMapper {
        CaseMapper::new()
    }
}

thread_local! {
    static DEFAULT_MAPPER: CaseMapper = CaseMapper::new();
}

/// Run `operation` against this thread's shared mapper.
pub(crate) fn with_default_mapper<T>(operation: impl FnOnce(&CaseMapper) -> T) -> T {
    DEFAULT_MAPPER.with(|mapper| operation(mapper))
}

/// Upper-case a string using the built-in tables.
pub fn to_uppercase(input: &str) -> Cow<'_, str> {
    with_default_mapper(|mapper| mapper.to_uppercase(input))
}

/// Lower-case a string using the built-in tables.
pub fn to_lowercase(input: &str) -> Cow<'_, str> {
    with_default_mapper(|mapper| mapper.to_lowercase(input))
}
