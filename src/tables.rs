//! The five case-mapping programs and their generation.
//!
//! A table set holds `TO_UPPER` (single-scalar upper mappings), `S1`/`S2`/
//! `S3` (the 1st/2nd/3rd scalars of multi-scalar upper mappings, so
//! "ß" → "SS" contributes S to `S1` and S to `S2`), and `TO_LOWER`
//! (single-scalar lower mappings). The programs are generated once, on
//! first use, from the Unicode case data the standard library ships, and
//! validated before anything is allowed to interpret them.

use std::sync::LazyLock;

use log::debug;

use crate::bytecode::{CaseProgram, Direction, ProgramWriter, Result, CODE_POINT_LIMIT};

/// The five programs backing every case table.
#[derive(Clone, Debug)]
pub struct CaseTables {
    to_upper: CaseProgram,
    suffix1: CaseProgram,
    suffix2: CaseProgram,
    suffix3: CaseProgram,
    to_lower: CaseProgram,
}

impl CaseTables {
    /// The process-wide tables, generated and validated on first access.
    pub fn builtin() -> &'static CaseTables {
        static TABLES: LazyLock<CaseTables> = LazyLock::new(|| {
            CaseTables::generate().expect("generated case tables failed validation")
        });
        &TABLES
    }

    /// Generate the programs from the standard library's Unicode case
    /// mappings: one ascending scan over every scalar value.
    pub fn generate() -> Result<CaseTables> {
        let mut to_upper = ProgramWriter::new(Direction::Upper);
        let mut suffix1 = ProgramWriter::new(Direction::Upper);
        let mut suffix2 = ProgramWriter::new(Direction::Upper);
        let mut suffix3 = ProgramWriter::new(Direction::Upper);
        let mut to_lower = ProgramWriter::new(Direction::Lower);

        for code_point in 0..CODE_POINT_LIMIT {
            let Some(ch) = char::from_u32(code_point) else {
                continue;
            };

            let mut upper = [0u32; 3];
            let mut upper_len = 0;
            for mapped in ch.to_uppercase() {
                if upper_len < upper.len() {
                    upper[upper_len] = mapped as u32;
                }
                upper_len += 1;
            }
            if upper_len == 1 {
                if upper[0] != code_point {
                    to_upper.push_mapping(code_point, upper[0])?;
                }
            } else {
                suffix1.push_mapping(code_point, upper[0])?;
                suffix2.push_mapping(code_point, upper[1])?;
                if upper_len > 2 {
                    suffix3.push_mapping(code_point, upper[2])?;
                }
            }

            // Lower mappings are single-scalar by contract; U+0130 is the
            // one multi-scalar expansion and truncates to its leading 'i'.
            let lower_first = ch.to_lowercase().next().unwrap_or(ch);
            if lower_first != ch {
                to_lower.push_mapping(code_point, lower_first as u32)?;
            }
        }

        let tables = CaseTables {
            to_upper: to_upper.finish(),
            suffix1: suffix1.finish(),
            suffix2: suffix2.finish(),
            suffix3: suffix3.finish(),
            to_lower: to_lower.finish(),
        };
        tables.validate()?;
        debug!(
            "generated case tables: to_upper={}B s1={}B s2={}B s3={}B to_lower={}B",
            tables.to_upper.len(),
            tables.suffix1.len(),
            tables.suffix2.len(),
            tables.suffix3.len(),
            tables.to_lower.len(),
        );
        Ok(tables)
    }

    /// Assemble a table set from caller-supplied programs, validating each
    /// one up front.
    pub fn from_programs(
        to_upper: CaseProgram,
        suffix1: CaseProgram,
        suffix2: CaseProgram,
        suffix3: CaseProgram,
        to_lower: CaseProgram,
    ) -> Result<CaseTables> {
        let tables = CaseTables { to_upper, suffix1, suffix2, suffix3, to_lower };
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<()> {
        self.to_upper.validate(Direction::Upper)?;
        self.suffix1.validate(Direction::Upper)?;
        self.suffix2.validate(Direction::Upper)?;
        self.suffix3.validate(Direction::Upper)?;
        self.to_lower.validate(Direction::Lower)?;
        Ok(())
    }

    pub fn to_upper(&self) -> &CaseProgram {
        &self.to_upper
    }

    pub fn suffix1(&self) -> &CaseProgram {
        &self.suffix1
    }

    pub fn suffix2(&self) -> &CaseProgram {
        &self.suffix2
    }

    pub fn suffix3(&self) -> &CaseProgram {
        &self.suffix3
    }

    pub fn to_lower(&self) -> &CaseProgram {
        &self.to_lower
    }
}
