//! Lazy per-table page cache.
//!
//! Pages are built on first touch and kept forever; there is no eviction.
//! A one-entry hot slot short-circuits the map for the common case of
//! consecutive look-ups landing in the same 256-code-point block. Absent
//! blocks are remembered too, so an unmapped script costs one build per
//! block, not one per character.

use std::collections::HashMap;
use std::rc::Rc;

use crate::page::{Page, PAGE_MASK, PAGE_SHIFT};

type PageSlot<E> = Option<Rc<Page<E>>>;

#[derive(Debug)]
pub struct PageCache<E> {
    pages: HashMap<u32, PageSlot<E>>,
    hot: Option<(u32, PageSlot<E>)>,
}

impl<E> Default for PageCache<E> {
    fn default() -> PageCache<E> {
        PageCache { pages: HashMap::new(), hot: None }
    }
}

impl<E: Clone> PageCache<E> {
    pub fn new() -> PageCache<E> {
        PageCache::default()
    }

    /// Entry for `code_point`, building the owning page through `build` if
    /// this is the first touch of its block.
    pub fn lookup<F>(&mut self, code_point: u32, build: F) -> Option<E>
    where
        F: FnOnce(u32) -> Option<Box<Page<E>>>,
    {
        let page_index = code_point >> PAGE_SHIFT;
        let hot_hit = matches!(&self.hot, Some((index, _)) if *index == page_index);
        if !hot_hit {
            let slot = self
                .pages
                .entry(page_index)
                .or_insert_with(|| build(page_index).map(Rc::from));
            self.hot = Some((page_index, slot.clone()));
        }

        let (_, slot) = self.hot.as_ref()?;
        let page = slot.as_ref()?;
        page[(code_point & PAGE_MASK) as usize].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PAGE_LEN;

    fn page_of_indices() -> Option<Box<Page<u32>>> {
        Some(Box::new(std::array::from_fn(|index| Some(index as u32))))
    }

    #[test]
    fn test_build_happens_once_per_block() {
        let mut cache = PageCache::new();
        let mut builds = 0;
        for code_point in [0x41, 0x42, 0x43, 0x41] {
            let entry = cache.lookup(code_point, |_| {
                builds += 1;
                page_of_indices()
            });
            assert_eq!(entry, Some(code_point & PAGE_MASK));
        }
        assert_eq!(builds, 1);
    }

    #[test]
    fn test_absent_block_is_cached() {
        let mut cache: PageCache<u32> = PageCache::new();
        let mut builds = 0;
        for _ in 0..3 {
            let entry = cache.lookup(0x3041, |_| {
                builds += 1;
                None
            });
            assert_eq!(entry, None);
        }
        assert_eq!(builds, 1);
    }

    #[test]
    fn test_hot_slot_survives_block_changes() {
        use std::cell::Cell;

        let mut cache = PageCache::new();
        let builds = Cell::new(0);
        let touch = |cache: &mut PageCache<u32>, code_point: u32| {
            cache.lookup(code_point, |_| {
                builds.set(builds.get() + 1);
                page_of_indices()
            })
        };
        // Alternate between two blocks; each is built exactly once even
        // though the hot slot keeps flipping.
        for _ in 0..4 {
            assert_eq!(touch(&mut cache, 0x20), Some(0x20));
            assert_eq!(touch(&mut cache, 0x120), Some(0x20));
        }
        assert_eq!(builds.get(), 2);
        assert_eq!(touch(&mut cache, PAGE_LEN as u32 - 1), Some(PAGE_MASK));
        assert_eq!(builds.get(), 2);
    }
}
