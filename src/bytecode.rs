//! Case-mapping bytecode: the instruction set, program container, and writer.
//!
//! A case table is a compact byte program that the interpreter replays to
//! enumerate `(from, to)` code-point mappings in ascending `from` order.
//! Each byte is exactly one instruction; the high two bits select the
//! operation and the low six bits carry an operand or packed fields:
//!
//! | Byte (MSB→LSB) | Operation | Effect |
//! |----------------|-----------|--------|
//! | `00 aaaaaa`    | EXTEND    | `X ← (X<<6) \| a` |
//! | `010 nn mmm`   | EMIT_L    | repeat `max(X,1)` times: emit `(L, L + offset[m])`; `L += n+1` |
//! | `011 nn mmm`   | EMIT_R    | repeat `max(X,1)` times: `R += m-2`; emit `(L, R)`; `L += n+1` |
//! | `10 aaaaaa`    | ADD_L     | `L ← L + ((X<<6) \| a)` |
//! | `11 aaaaaa`    | LOAD_R    | `R ← (X<<6) \| a` |
//!
//! `offset[m]` indexes [`COMMON_OFFSETS`], negated for the upper-case
//! direction. Every instruction except `EXTEND` resets the `X` accumulator
//! to zero, so multi-byte operands are spelled as a chain of `EXTEND`s
//! followed by the instruction that consumes them.

use thiserror::Error;

/// Offsets reachable by a single `EMIT_L`, chosen for the distances that
/// dominate the Unicode case-mapping data (1 for alternating pairs, 32 for
/// ASCII and Cyrillic, 26 for Deseret, and so on).
pub const COMMON_OFFSETS: [u32; 8] = [1, 2, 8, 16, 26, 32, 48, 80];

/// Bias subtracted from the 3-bit field of `EMIT_R`, so a single byte can
/// nudge `R` by any delta in `[-2, 5]`.
pub const EMIT_R_BIAS: u8 = 2;

/// One past the highest Unicode code point.
pub const CODE_POINT_LIMIT: u32 = 0x11_0000;

/// Bit-layout constants for instruction bytes.
pub mod layout {
    /// High-2-bit opcode values.
    pub const OP_EXTEND: u8 = 0b00;
    pub const OP_EMIT: u8 = 0b01;
    pub const OP_ADD_LEFT: u8 = 0b10;
    pub const OP_LOAD_RIGHT: u8 = 0b11;

    /// Bit 5 distinguishes `EMIT_R` from `EMIT_L` inside the emit opcode.
    pub const EMIT_RIGHT_FLAG: u8 = 0b0010_0000;

    /// Low six bits of an operand-carrying instruction.
    pub const OPERAND_MASK: u8 = 0b0011_1111;
    /// Operand payload width per instruction byte.
    pub const OPERAND_BITS: u32 = 6;

    /// `nn` field of an emit byte (bits 4..=3).
    pub const ADVANCE_MASK: u8 = 0b11;
    pub const ADVANCE_SHIFT: u8 = 3;
    /// `mmm` field of an emit byte (bits 2..=0).
    pub const SELECTOR_MASK: u8 = 0b111;
}

/// Which way a program maps case, and therefore which sign the
/// [`COMMON_OFFSETS`] table is applied with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum Direction {
    /// Lower-case source, upper-case target; offsets are negated.
    #[strum(serialize = "upper")]
    Upper,
    /// Upper-case source, lower-case target; offsets are positive.
    #[strum(serialize = "lower")]
    Lower,
}

impl Direction {
    /// Signed `EMIT_L` offset for a 3-bit selector.
    pub fn fixed_offset(self, selector: u8) -> i32 {
        let magnitude = COMMON_OFFSETS[(selector & layout::SELECTOR_MASK) as usize] as i32;
        match self {
            Direction::Upper => -magnitude,
            Direction::Lower => magnitude,
        }
    }

    /// Selector that reproduces `delta` in this direction, if any.
    fn offset_selector(self, delta: i64) -> Option<u8> {
        (0..COMMON_OFFSETS.len() as u8).find(|&m| i64::from(self.fixed_offset(m)) == delta)
    }
}

/// A decoded instruction. Decoding is total: all 256 byte values name a
/// valid instruction, so programs are malformed only semantically (the
/// checks in [`CaseProgram::validate`]), never syntactically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Instruction {
    /// Shift a 6-bit chunk into the operand accumulator.
    #[strum(serialize = "EXTEND")]
    Extend { operand: u8 },
    /// Emit mappings at a fixed offset from the running source point.
    #[strum(serialize = "EMIT_L")]
    EmitLeft { advance: u8, selector: u8 },
    /// Emit mappings against the explicit target register.
    #[strum(serialize = "EMIT_R")]
    EmitRight { advance: u8, selector: u8 },
    /// Advance the running source point.
    #[strum(serialize = "ADD_L")]
    AddLeft { operand: u8 },
    /// Replace the target register.
    #[strum(serialize = "LOAD_R")]
    LoadRight { operand: u8 },
}

impl Instruction {
    /// Decode a single instruction byte.
    pub fn decode(byte: u8) -> Instruction {
        let operand = byte & layout::OPERAND_MASK;
        match byte >> 6 {
            layout::OP_EXTEND => Instruction::Extend { operand },
            layout::OP_EMIT => {
                let advance = (byte >> layout::ADVANCE_SHIFT) & layout::ADVANCE_MASK;
                let selector = byte & layout::SELECTOR_MASK;
                if byte & layout::EMIT_RIGHT_FLAG == 0 {
                    Instruction::EmitLeft { advance, selector }
                } else {
                    Instruction::EmitRight { advance, selector }
                }
            }
            layout::OP_ADD_LEFT => Instruction::AddLeft { operand },
            _ => Instruction::LoadRight { operand },
        }
    }

    /// Encode back to the single instruction byte.
    pub fn encode(self) -> u8 {
        match self {
            Instruction::Extend { operand } => operand & layout::OPERAND_MASK,
            Instruction::EmitLeft { advance, selector } => {
                (layout::OP_EMIT << 6)
                    | ((advance & layout::ADVANCE_MASK) << layout::ADVANCE_SHIFT)
                    | (selector & layout::SELECTOR_MASK)
            }
            Instruction::EmitRight { advance, selector } => {
                (layout::OP_EMIT << 6)
                    | layout::EMIT_RIGHT_FLAG
                    | ((advance & layout::ADVANCE_MASK) << layout::ADVANCE_SHIFT)
                    | (selector & layout::SELECTOR_MASK)
            }
            Instruction::AddLeft { operand } => {
                (layout::OP_ADD_LEFT << 6) | (operand & layout::OPERAND_MASK)
            }
            Instruction::LoadRight { operand } => {
                (layout::OP_LOAD_RIGHT << 6) | (operand & layout::OPERAND_MASK)
            }
        }
    }
}

/// Errors surfaced by the program writer and by validation of
/// externally supplied programs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytecodeError {
    /// A mapping endpoint escapes the Unicode range.
    #[error("mapping endpoint out of Unicode range: {from:#x} -> {to:#x}")]
    MappingOutOfRange { from: u32, to: u32 },

    /// Mapping sources must be emitted in non-decreasing order.
    #[error("mapping source {next:#x} emitted after {prev:#x}")]
    NonMonotonic { prev: u32, next: u32 },

    /// The program ends in the middle of an `EXTEND` operand chain.
    #[error("program ends with a pending EXTEND operand")]
    TrailingExtend,
}

/// Result type for bytecode operations.
pub type Result<T> = std::result::Result<T, BytecodeError>;

/// An immutable case-mapping program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaseProgram {
    bytes: Vec<u8>,
}

impl CaseProgram {
    /// Wrap raw instruction bytes. No validation happens here; call
    /// [`CaseProgram::validate`] before trusting bytes from outside.
    pub fn new(bytes: Vec<u8>) -> CaseProgram {
        CaseProgram { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decoded instruction stream.
    pub fn instructions(&self) -> impl Iterator<Item = Instruction> + '_ {
        self.bytes.iter().map(|&byte| Instruction::decode(byte))
    }

    /// Simulate the register machine and reject programs that would emit
    /// out-of-range endpoints, emit sources out of order, or end with a
    /// half-accumulated operand.
    ///
    /// # Arguments
    ///
    /// * `direction` - The direction the program will be interpreted with;
    ///   it decides the sign of `EMIT_L` offsets and therefore the emitted
    ///   targets.
    pub fn validate(&self, direction: Direction) -> Result<()> {
        let mut extend: u32 = 0;
        let mut pending_extend = false;
        let mut left: u32 = 0;
        let mut right: u32 = 0;
        let mut prev_from: Option<u32> = None;

        let mut check = |from: u32, to: u32, prev: &mut Option<u32>| -> Result<()> {
            if from >= CODE_POINT_LIMIT || to >= CODE_POINT_LIMIT {
                return Err(BytecodeError::MappingOutOfRange { from, to });
            }
            if let Some(prev_from) = *prev {
                if from < prev_from {
                    return Err(BytecodeError::NonMonotonic { prev: prev_from, next: from });
                }
            }
            *prev = Some(from);
            Ok(())
        };

        for instruction in self.instructions() {
            match instruction {
                Instruction::Extend { operand } => {
                    extend = extend.wrapping_shl(layout::OPERAND_BITS) | u32::from(operand);
                    pending_extend = true;
                    continue;
                }
                Instruction::EmitLeft { advance, selector } => {
                    let offset = direction.fixed_offset(selector);
                    for _ in 0..extend.max(1) {
                        check(left, left.wrapping_add_signed(offset), &mut prev_from)?;
                        left = left.wrapping_add(u32::from(advance) + 1);
                    }
                }
                Instruction::EmitRight { advance, selector } => {
                    let delta = i32::from(selector) - i32::from(EMIT_R_BIAS);
                    for _ in 0..extend.max(1) {
                        right = right.wrapping_add_signed(delta);
                        check(left, right, &mut prev_from)?;
                        left = left.wrapping_add(u32::from(advance) + 1);
                    }
                }
                Instruction::AddLeft { operand } => {
                    left = left.wrapping_add(
                        extend.wrapping_shl(layout::OPERAND_BITS) | u32::from(operand),
                    );
                }
                Instruction::LoadRight { operand } => {
                    right = extend.wrapping_shl(layout::OPERAND_BITS) | u32::from(operand);
                }
            }
            extend = 0;
            pending_extend = false;
        }

        if pending_extend {
            return Err(BytecodeError::TrailingExtend);
        }
        Ok(())
    }
}

/// Encodes an ascending stream of `(from, to)` mappings into a program.
///
/// The writer mirrors the `L`/`R` registers the interpreter will rebuild,
/// so each mapping costs at most a handful of bytes: a gap advance, then
/// either a one-byte `EMIT_L` when the delta is a common offset, or an
/// `EMIT_R` (with a `LOAD_R` reload when the target register is too far
/// from the wanted value).
#[derive(Debug)]
pub struct ProgramWriter {
    direction: Direction,
    bytes: Vec<u8>,
    left: u32,
    right: u32,
    last_from: Option<u32>,
}

impl ProgramWriter {
    pub fn new(direction: Direction) -> ProgramWriter {
        ProgramWriter {
            direction,
            bytes: Vec::new(),
            left: 0,
            right: 0,
            last_from: None,
        }
    }

    /// Append one mapping. Sources must arrive in strictly ascending order.
    pub fn push_mapping(&mut self, from: u32, to: u32) -> Result<()> {
        if from >= CODE_POINT_LIMIT || to >= CODE_POINT_LIMIT {
            return Err(BytecodeError::MappingOutOfRange { from, to });
        }
        if from < self.left {
            return Err(BytecodeError::NonMonotonic {
                prev: self.last_from.unwrap_or(self.left),
                next: from,
            });
        }

        let gap = from - self.left;
        if gap > 0 {
            self.push_operand(gap, |operand| Instruction::AddLeft { operand });
        }

        let delta = i64::from(to) - i64::from(from);
        if let Some(selector) = self.direction.offset_selector(delta) {
            self.push(Instruction::EmitLeft { advance: 0, selector });
        } else {
            let slack = i64::from(to) - i64::from(self.right) + i64::from(EMIT_R_BIAS);
            if (0..=i64::from(layout::SELECTOR_MASK)).contains(&slack) {
                self.push(Instruction::EmitRight { advance: 0, selector: slack as u8 });
            } else {
                self.push_operand(to, |operand| Instruction::LoadRight { operand });
                self.push(Instruction::EmitRight { advance: 0, selector: EMIT_R_BIAS });
            }
            self.right = to;
        }

        // The emit advanced L past the source it covered.
        self.left = from + 1;
        self.last_from = Some(from);
        Ok(())
    }

    pub fn finish(self) -> CaseProgram {
        CaseProgram::new(self.bytes)
    }

    fn push(&mut self, instruction: Instruction) {
        self.bytes.push(instruction.encode());
    }

    /// Spell `value` as an `EXTEND` chain feeding `consumer`'s low six bits.
    fn push_operand(&mut self, value: u32, consumer: impl FnOnce(u8) -> Instruction) {
        let mut chunks = [0u8; 6];
        let mut count = 0;
        let mut rest = value;
        loop {
            chunks[count] = (rest & u32::from(layout::OPERAND_MASK)) as u8;
            count += 1;
            rest >>= layout::OPERAND_BITS;
            if rest == 0 {
                break;
            }
        }
        for index in (1..count).rev() {
            self.push(Instruction::Extend { operand: chunks[index] });
        }
        self.push(consumer(chunks[0]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encode_roundtrip_all_bytes() {
        for byte in 0..=u8::MAX {
            let instruction = Instruction::decode(byte);
            assert_eq!(instruction.encode(), byte, "byte {byte:#04x} did not round-trip");
        }
    }

    #[test]
    fn test_decode_field_extraction() {
        assert_eq!(Instruction::decode(0x00), Instruction::Extend { operand: 0 });
        assert_eq!(Instruction::decode(0x3F), Instruction::Extend { operand: 63 });
        assert_eq!(Instruction::decode(0x45), Instruction::EmitLeft { advance: 0, selector: 5 });
        assert_eq!(Instruction::decode(0x5D), Instruction::EmitLeft { advance: 3, selector: 5 });
        assert_eq!(Instruction::decode(0x62), Instruction::EmitRight { advance: 0, selector: 2 });
        assert_eq!(Instruction::decode(0x6B), Instruction::EmitRight { advance: 1, selector: 3 });
        assert_eq!(Instruction::decode(0xA1), Instruction::AddLeft { operand: 33 });
        assert_eq!(Instruction::decode(0xD3), Instruction::LoadRight { operand: 19 });
    }

    #[test]
    fn test_instruction_display_names() {
        assert_eq!(Instruction::decode(0x00).to_string(), "EXTEND");
        assert_eq!(Instruction::decode(0x45).to_string(), "EMIT_L");
        assert_eq!(Instruction::decode(0x62).to_string(), "EMIT_R");
        assert_eq!(Instruction::decode(0x81).to_string(), "ADD_L");
        assert_eq!(Instruction::decode(0xC0).to_string(), "LOAD_R");
    }

    #[test]
    fn test_direction_offsets() {
        assert_eq!(Direction::Upper.fixed_offset(5), -32);
        assert_eq!(Direction::Lower.fixed_offset(5), 32);
        assert_eq!(Direction::Upper.fixed_offset(0), -1);
        assert_eq!(Direction::Lower.fixed_offset(7), 80);
    }

    #[test]
    fn test_writer_common_offset_mapping() {
        // 'a' -> 'A' is a gap of 0x61 then an offset of -32.
        let mut writer = ProgramWriter::new(Direction::Upper);
        writer.push_mapping(0x61, 0x41).unwrap();
        let program = writer.finish();
        assert_eq!(program.as_bytes(), &[0x01, 0xA1, 0x45]);
        program.validate(Direction::Upper).unwrap();
    }

    #[test]
    fn test_writer_load_right_mapping() {
        // U+00DF -> 'S' has no common offset; the target goes through R.
        let mut writer = ProgramWriter::new(Direction::Upper);
        writer.push_mapping(0xDF, 0x53).unwrap();
        let program = writer.finish();
        assert_eq!(program.as_bytes(), &[0x03, 0x9F, 0x01, 0xD3, 0x62]);
        program.validate(Direction::Upper).unwrap();
    }

    #[test]
    fn test_writer_reuses_target_register() {
        let mut writer = ProgramWriter::new(Direction::Upper);
        writer.push_mapping(0x100, 0x200).unwrap();
        writer.push_mapping(0x102, 0x201).unwrap();
        let program = writer.finish();
        // Second mapping nudges R by +1 instead of reloading it.
        assert_eq!(
            program.as_bytes(),
            &[0x04, 0x80, 0x08, 0xC0, 0x62, 0x81, 0x63]
        );
    }

    #[test]
    fn test_writer_rejects_descending_sources() {
        let mut writer = ProgramWriter::new(Direction::Lower);
        writer.push_mapping(0x100, 0x101).unwrap();
        assert_eq!(
            writer.push_mapping(0xFF, 0x100),
            Err(BytecodeError::NonMonotonic { prev: 0x100, next: 0xFF })
        );
        // Re-emitting the same source is rejected too.
        assert!(matches!(
            writer.push_mapping(0x100, 0x102),
            Err(BytecodeError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn test_writer_rejects_out_of_range() {
        let mut writer = ProgramWriter::new(Direction::Lower);
        assert_eq!(
            writer.push_mapping(CODE_POINT_LIMIT, 0),
            Err(BytecodeError::MappingOutOfRange { from: CODE_POINT_LIMIT, to: 0 })
        );
        assert_eq!(
            writer.push_mapping(0, CODE_POINT_LIMIT),
            Err(BytecodeError::MappingOutOfRange { from: 0, to: CODE_POINT_LIMIT })
        );
    }

    #[test]
    fn test_validate_trailing_extend() {
        let program = CaseProgram::new(vec![0x01]);
        assert_eq!(program.validate(Direction::Lower), Err(BytecodeError::TrailingExtend));
        // A zero operand still counts as a half-finished chain.
        let program = CaseProgram::new(vec![0x40, 0x00]);
        assert_eq!(program.validate(Direction::Lower), Err(BytecodeError::TrailingExtend));
    }

    #[test]
    fn test_validate_out_of_range_target() {
        // Advance L to 0x110000 and emit.
        let program = CaseProgram::new(vec![0x04, 0x10, 0x00, 0x80, 0x40]);
        assert!(matches!(
            program.validate(Direction::Lower),
            Err(BytecodeError::MappingOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_wrapped_source_order() {
        // Emit at 5, then wrap L all the way around to 0 and emit again.
        let program = CaseProgram::new(vec![
            0x85, 0x40, 0x03, 0x3F, 0x3F, 0x3F, 0x3F, 0xBA, 0x40,
        ]);
        assert_eq!(
            program.validate(Direction::Lower),
            Err(BytecodeError::NonMonotonic { prev: 5, next: 0 })
        );
    }

    #[test]
    fn test_validate_accepts_writer_output() {
        let mut writer = ProgramWriter::new(Direction::Lower);
        for (from, to) in [(0x41, 0x61), (0x100, 0x101), (0x10400, 0x10428)] {
            writer.push_mapping(from, to).unwrap();
        }
        writer.finish().validate(Direction::Lower).unwrap();
    }
}
