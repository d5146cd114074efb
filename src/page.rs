//! Page materialisation: turning linear program emissions into 256-entry
//! random-access blocks.
//!
//! A page covers one aligned block of 256 code points. Builders replay the
//! relevant program(s) through the interpreter, ignore emissions below the
//! block, stop at the first emission above it, and record the in-range ones
//! according to the table kind's entry policy. A block that ends up with no
//! entries at all is reported as absent (`None`) so the cache can remember
//! that cheaply.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::bytecode::{CaseProgram, Direction};
use crate::interpreter;
use crate::tables::CaseTables;

/// Code point bits below the page index.
pub const PAGE_SHIFT: u32 = 8;
/// Low-bit mask selecting the slot inside a page.
pub const PAGE_MASK: u32 = 0xFF;
/// Slots per page.
pub const PAGE_LEN: usize = 256;

/// A materialised page: one optional entry per code point in the block.
pub type Page<E> = [Option<E>; PAGE_LEN];

/// The expansion of one code point under a case mapping: one to three
/// scalars, stored inline so page entries never allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaseMapping {
    len: u8,
    scalars: [char; 3],
}

impl CaseMapping {
    fn single(ch: char) -> CaseMapping {
        CaseMapping { len: 1, scalars: [ch, '\0', '\0'] }
    }

    fn set_first(&mut self, ch: char) {
        self.scalars[0] = ch;
    }

    fn append(&mut self, ch: char) {
        if (self.len as usize) < self.scalars.len() {
            self.scalars[self.len as usize] = ch;
            self.len += 1;
        }
    }

    /// The mapped scalars, in output order.
    pub fn chars(&self) -> &[char] {
        &self.scalars[..self.len as usize]
    }
}

fn empty_page<E>() -> Box<Page<E>> {
    Box::new(std::array::from_fn(|_| None))
}

fn entry_count<E>(page: &Page<E>) -> usize {
    page.iter().filter(|slot| slot.is_some()).count()
}

/// Replay `program`, visiting only the emissions whose source lands in
/// `[min, max]`, and stopping as soon as one overshoots the block.
fn scan_block<F>(program: &CaseProgram, direction: Direction, min: u32, max: u32, mut visit: F)
where
    F: FnMut(u32, u32),
{
    interpreter::run(program, direction, |from, to| {
        if from > max {
            return false;
        }
        if from >= min {
            visit(from, to);
        }
        true
    });
}

/// Build the page of string mappings for one direction.
///
/// The upper table layers four programs: `TO_UPPER` and `S1` both place the
/// first scalar of an entry, then `S2` and `S3` append to entries that
/// already exist. The lower table is a single overwrite-only program.
pub fn build_string_page(
    tables: &CaseTables,
    direction: Direction,
    page_index: u32,
) -> Option<Box<Page<CaseMapping>>> {
    let min = page_index << PAGE_SHIFT;
    let max = min | PAGE_MASK;
    let mut page = empty_page::<CaseMapping>();

    {
        let mut place_first = |from: u32, to: u32| {
            let Some(ch) = char::from_u32(to) else { return };
            match &mut page[(from & PAGE_MASK) as usize] {
                Some(entry) => entry.set_first(ch),
                slot => *slot = Some(CaseMapping::single(ch)),
            }
        };
        match direction {
            Direction::Upper => {
                scan_block(tables.to_upper(), direction, min, max, &mut place_first);
                scan_block(tables.suffix1(), direction, min, max, &mut place_first);
            }
            Direction::Lower => {
                scan_block(tables.to_lower(), direction, min, max, &mut place_first);
            }
        }
    }

    if direction == Direction::Upper {
        for suffix in [tables.suffix2(), tables.suffix3()] {
            scan_block(suffix, direction, min, max, |from, to| {
                let Some(ch) = char::from_u32(to) else { return };
                match &mut page[(from & PAGE_MASK) as usize] {
                    Some(entry) => entry.append(ch),
                    None => {
                        // A suffix scalar without a first scalar cannot
                        // come from validated tables; drop it.
                        debug!("ignoring suffix emission for unmapped {from:#x}");
                    }
                }
            });
        }
    }

    let count = entry_count(&page);
    if count == 0 {
        return None;
    }
    debug!("built {direction} string page {page_index:#x}: {count} entries");
    Some(page)
}

/// Build the regex-canonical page: the single-scalar upper mapping of each
/// code point, straight off `TO_UPPER`.
pub fn build_canonical_page(tables: &CaseTables, page_index: u32) -> Option<Box<Page<char>>> {
    let min = page_index << PAGE_SHIFT;
    let max = min | PAGE_MASK;
    let mut page = empty_page::<char>();

    scan_block(tables.to_upper(), Direction::Upper, min, max, |from, to| {
        if let Some(ch) = char::from_u32(to) {
            page[(from & PAGE_MASK) as usize] = Some(ch);
        }
    });

    let count = entry_count(&page);
    if count == 0 {
        return None;
    }
    debug!("built canonical page {page_index:#x}: {count} entries");
    Some(page)
}

/// An equivalence edge may not cross the ASCII boundary (ECMAScript 5,
/// 21.2.2.8.2 step 3g): ASCII code points never become case-equivalent to
/// non-ASCII ones, in either direction.
fn crosses_ascii_boundary(from: u32, to: u32) -> bool {
    (from <= 0x7F) != (to <= 0x7F)
}

/// Build the case-insensitive equivalence-class page.
///
/// Pass 1 collects the canonical of every in-block source and seeds each
/// class with its canonical. Unclaimed slots then join the class keyed by
/// their own code point, which is a fresh singleton unless the code point
/// is itself a canonical discovered in pass 1. Pass 2 replays the whole
/// program to pull in sibling sources from other blocks. Classes that
/// remain singletons compact away to `None`.
pub fn build_class_page(tables: &CaseTables, page_index: u32) -> Option<Box<Page<Rc<[u32]>>>> {
    let min = page_index << PAGE_SHIFT;
    let max = min | PAGE_MASK;

    let mut classes: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut slot_keys: [Option<u32>; PAGE_LEN] = [None; PAGE_LEN];

    scan_block(tables.to_upper(), Direction::Upper, min, max, |from, to| {
        if crosses_ascii_boundary(from, to) {
            return;
        }
        if char::from_u32(from).is_none() || char::from_u32(to).is_none() {
            return;
        }
        classes.entry(to).or_insert_with(|| vec![to]).push(from);
        slot_keys[(from & PAGE_MASK) as usize] = Some(to);
    });

    for (index, slot) in slot_keys.iter_mut().enumerate() {
        if slot.is_some() {
            continue;
        }
        let code_point = min + index as u32;
        if char::from_u32(code_point).is_none() {
            continue;
        }
        classes.entry(code_point).or_insert_with(|| vec![code_point]);
        *slot = Some(code_point);
    }

    interpreter::run(tables.to_upper(), Direction::Upper, |from, to| {
        if !crosses_ascii_boundary(from, to) && char::from_u32(from).is_some() {
            if let Some(members) = classes.get_mut(&to) {
                members.push(from);
            }
        }
        true
    });

    let shared: HashMap<u32, Rc<[u32]>> = classes
        .into_iter()
        .map(|(key, mut members)| {
            let mut seen = Vec::with_capacity(members.len());
            members.retain(|&code_point| {
                if seen.contains(&code_point) {
                    false
                } else {
                    seen.push(code_point);
                    true
                }
            });
            (key, Rc::from(members))
        })
        .collect();

    let mut page = empty_page::<Rc<[u32]>>();
    for (index, slot) in slot_keys.iter().enumerate() {
        let Some(key) = slot else { continue };
        let Some(class) = shared.get(key) else { continue };
        if class.len() > 1 {
            page[index] = Some(Rc::clone(class));
        }
    }

    let count = entry_count(&page);
    if count == 0 {
        return None;
    }
    debug!("built equivalence page {page_index:#x}: {count} entries");
    Some(page)
}
