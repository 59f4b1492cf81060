//! TBI header: file preset, column layout and comment/skip conventions.

use std::fmt;

/// Flag bit in the `format` field marking zero-based, half-open coordinates
/// (UCSC/BED style). Without it records use one-based, closed coordinates.
pub const ZERO_BASED_FLAG: i32 = 0x10000;

/// File presets recognized by tabix (low 16 bits of the `format` field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbiFormat {
    /// Generic tab-delimited file (BED, GFF, ...)
    Generic,
    /// SAM format; the end is derived from the CIGAR
    Sam,
    /// VCF format; the end is derived from REF/INFO:END
    Vcf,
    /// Preset code this reader does not know; columns are read as generic
    Other(u16),
}

impl TbiFormat {
    /// Split a raw preset code out of the `format` field
    fn from_code(code: u16) -> Self {
        match code {
            0 => TbiFormat::Generic,
            1 => TbiFormat::Sam,
            2 => TbiFormat::Vcf,
            other => TbiFormat::Other(other),
        }
    }

    /// Whether the preset computes the record end itself instead of reading
    /// an end column.
    pub fn derives_end(self) -> bool {
        matches!(self, TbiFormat::Sam | TbiFormat::Vcf)
    }
}

/// Coordinate convention of the indexed records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    /// One-based, closed intervals (VCF, GFF, SAM)
    OneBasedClosed,
    /// Zero-based, half-open intervals (BED)
    ZeroBasedHalfOpen,
}

/// Column numbers exactly as encoded in the index.
///
/// Tabix stores one-based column numbers; `0` in `end` means the column is
/// absent. Use [`TbiHeader::resolved_columns`] for zero-based field indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnNumbers {
    /// Column holding the reference sequence name
    pub reference: i32,
    /// Column holding the start coordinate
    pub start: i32,
    /// Column holding the end coordinate
    pub end: i32,
}

/// Zero-based field indices into a tab-split record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// Field holding the reference sequence name
    pub reference: Option<usize>,
    /// Field holding the start coordinate
    pub start: Option<usize>,
    /// Field holding the end coordinate, if the format has one
    pub end: Option<usize>,
}

fn zero_based_field(column: i32) -> Option<usize> {
    if column > 0 {
        Some((column - 1) as usize)
    } else {
        None
    }
}

/// Header block of a TBI index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbiHeader {
    /// Raw `format` field (preset in the low 16 bits, flags above)
    pub(crate) format_flags: i32,
    pub(crate) columns: ColumnNumbers,
    pub(crate) meta_char: char,
    pub(crate) skip_lines: i32,
    pub(crate) sequence_names: Vec<String>,
}

impl TbiHeader {
    /// Raw `format` field
    pub fn format_flags(&self) -> i32 {
        self.format_flags
    }

    /// File preset
    pub fn format(&self) -> TbiFormat {
        TbiFormat::from_code((self.format_flags & 0xFFFF) as u16)
    }

    /// Coordinate convention of the records
    pub fn coordinate_system(&self) -> CoordinateSystem {
        if self.format_flags & ZERO_BASED_FLAG != 0 {
            CoordinateSystem::ZeroBasedHalfOpen
        } else {
            CoordinateSystem::OneBasedClosed
        }
    }

    /// Column numbers as encoded
    pub fn column_numbers(&self) -> ColumnNumbers {
        self.columns
    }

    /// Zero-based field indices, with the end column resolved against the preset
    pub fn resolved_columns(&self) -> ResolvedColumns {
        let end = if self.format().derives_end() {
            None
        } else {
            zero_based_field(self.columns.end)
        };
        ResolvedColumns {
            reference: zero_based_field(self.columns.reference),
            start: zero_based_field(self.columns.start),
            end,
        }
    }

    /// Character that starts comment/header lines
    pub fn meta_char(&self) -> char {
        self.meta_char
    }

    /// Number of leading lines to skip unconditionally
    pub fn skip_lines(&self) -> i32 {
        self.skip_lines
    }

    /// Reference sequence names in file order
    pub fn sequence_names(&self) -> &[String] {
        &self.sequence_names
    }

    /// Whether a line is a header/comment line under this index's conventions
    pub fn is_comment_line(&self, line: &str) -> bool {
        line.starts_with(self.meta_char)
    }
}

impl fmt::Display for TbiFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TbiFormat::Generic => write!(f, "generic"),
            TbiFormat::Sam => write!(f, "SAM"),
            TbiFormat::Vcf => write!(f, "VCF"),
            TbiFormat::Other(code) => write!(f, "preset {}", code),
        }
    }
}
