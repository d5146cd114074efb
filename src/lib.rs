//! Unicode case conversion over compact case-mapping bytecode.
//!
//! Case data is stored as five tiny byte programs (`TO_UPPER`, three
//! multi-scalar suffix tables, `TO_LOWER`) replayed by a stack-less
//! interpreter that emits `(from, to)` code-point mappings in ascending
//! order. A lazy page cache materialises 256-code-point blocks of those
//! emissions on demand, and the public APIs sit on top of the cache:
//!
//! - **String conversion**: [`to_uppercase`] / [`to_lowercase`], with a
//!   borrowed return when nothing in the input changes.
//! - **ECMAScript 5 regex folding**: [`regexp_canonicalize`] /
//!   [`regexp_equivalence_class`].
//!
//! The free functions run against one mapper per thread; callers that want
//! to own the caches (or bring their own tables) use [`CaseMapper`]
//! directly.
//!
//! # Example
//!
//! ```rust
//! use casevm::{regexp_equivalence_class, to_uppercase};
//!
//! assert_eq!(to_uppercase("Schloß"), "SCHLOSS");
//! assert_eq!(
//!     regexp_equivalence_class('σ'),
//!     Some(vec!['Σ', 'ς', 'σ'])
//! );
//! ```

pub mod bytecode;
pub mod cache;
pub mod convert;
pub mod interpreter;
pub mod page;
pub mod regex;
pub mod tables;

pub use bytecode::{
    BytecodeError, CaseProgram, Direction, Instruction, ProgramWriter, CODE_POINT_LIMIT,
    COMMON_OFFSETS, EMIT_R_BIAS,
};
pub use convert::{to_lowercase, to_uppercase, CaseMapper};
pub use page::CaseMapping;
pub use regex::{regexp_canonicalize, regexp_equivalence_class};
pub use tables::CaseTables;
