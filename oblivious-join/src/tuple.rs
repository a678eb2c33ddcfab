//! The augmented tuple: a fixed-width record carrying both a payload and the
//! multiplicity/alignment metadata the join phases thread through it.

/// Compile-time arity of the payload. Mirrors `MAX_ATTRIBUTES` from the
/// configuration surface; a table's schema may use fewer columns than this,
/// but never more.
pub const MAX_ATTRIBUTES: usize = 16;

/// Valid `join_attr` values lie in `[JOIN_ATTR_MIN, JOIN_ATTR_MAX]`. The four
/// sentinels below sit just outside that interval and must never be produced
/// by ordinary arithmetic on a valid value.
pub const JOIN_ATTR_MIN: i32 = -1_073_741_820;
pub const JOIN_ATTR_MAX: i32 = 1_073_741_820;
pub const JOIN_ATTR_NEG_INF: i32 = -1_073_741_821;
pub const JOIN_ATTR_POS_INF: i32 = 1_073_741_821;

/// Sentinel `join_attr` for SORT_PADDING rows. Deliberately not `i32::MAX`:
/// see DESIGN.md's O2 note on the divergence from the reference source.
pub const JOIN_ATTR_SORT_PADDING: i32 = i32::MIN / 2;

/// Sentinel `original_index` for SORT_PADDING rows.
pub const ORIGINAL_INDEX_SORT_PADDING: u32 = u32::MAX;

/// Role of a row within a combined (parent + child) working table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// A real input tuple.
    Source = 0,
    /// The lower boundary marker synthesized from a parent tuple.
    Start = 1,
    /// The upper boundary marker synthesized from a parent tuple.
    End = 2,
    /// Introduced by a sort to pad a table to a convenient size; stripped
    /// before any user-facing result.
    SortPadding = 3,
    /// Introduced by distribute-and-expand; overwritten before Phase 3 ends.
    DistPadding = 4,
}

impl FieldType {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => FieldType::Source,
            1 => FieldType::Start,
            2 => FieldType::End,
            3 => FieldType::SortPadding,
            _ => FieldType::DistPadding,
        }
    }
}

/// Open/closed discipline for a boundary marker's endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EqualityType {
    /// Closed endpoint.
    Eq = 0,
    /// Open endpoint.
    Neq = 1,
    /// Not a boundary marker.
    None = 2,
}

impl EqualityType {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => EqualityType::Eq,
            1 => EqualityType::Neq,
            _ => EqualityType::None,
        }
    }
}

/// An augmented tuple as described in the data model. All scratch fields are
/// present even between the phases that use them; callers never observe a
/// field that "doesn't exist" for a given `field_type`.
#[derive(Debug, Clone, Copy)]
pub struct Tuple {
    pub field_type: FieldType,
    pub equality_type: EqualityType,
    pub join_attr: i32,
    pub original_index: u32,

    // Persistent multiplicity/alignment metadata.
    pub local_mult: i64,
    pub final_mult: i64,
    pub foreign_sum: i64,

    // Scratch, reused across phases.
    pub local_cumsum: i64,
    pub local_interval: i64,
    pub foreign_interval: i64,
    pub local_weight: i64,

    // Scratch, used by expansion and alignment.
    pub copy_index: i64,
    pub alignment_key: i64,
    pub dst_idx: i64,
    pub index: i64,

    pub attributes: [i64; MAX_ATTRIBUTES],

    /// Consumed only by the confidentiality collaborator; never read by any
    /// comparator, window, update or transform operator.
    pub is_encrypted: bool,
    pub nonce: u64,
}

impl Tuple {
    /// A zeroed SOURCE tuple with no boundary role and `local_mult = 1`,
    /// suitable as the starting point for a leaf-table row.
    pub fn new_source(original_index: u32, attributes: [i64; MAX_ATTRIBUTES]) -> Self {
        Tuple {
            field_type: FieldType::Source,
            equality_type: EqualityType::None,
            join_attr: 0,
            original_index,
            local_mult: 1,
            final_mult: 0,
            foreign_sum: 0,
            local_cumsum: 0,
            local_interval: 0,
            foreign_interval: 0,
            local_weight: 0,
            copy_index: 0,
            alignment_key: 0,
            dst_idx: 0,
            index: 0,
            attributes,
            is_encrypted: false,
            nonce: 0,
        }
    }

    /// Relative ordering precedence used by the JOIN_ATTR comparator's
    /// tie-break, per the entry-type precedence table: `(END,NEQ) =
    /// (START,EQ) = 1 < SOURCE = 2 < (END,EQ) = (START,NEQ) = 3`. Only
    /// meaningful for SOURCE/START/END rows; callers filter padding rows out
    /// via `join_attr`'s sentinel value before this matters.
    pub fn precedence(&self) -> u8 {
        match (self.field_type, self.equality_type) {
            (FieldType::End, EqualityType::Neq) => 1,
            (FieldType::Start, EqualityType::Eq) => 1,
            (FieldType::Source, _) => 2,
            (FieldType::End, EqualityType::Eq) => 3,
            (FieldType::Start, EqualityType::Neq) => 3,
            _ => 2,
        }
    }

    pub fn is_source(&self) -> bool {
        self.field_type == FieldType::Source
    }

    pub fn is_start(&self) -> bool {
        self.field_type == FieldType::Start
    }

    pub fn is_end(&self) -> bool {
        self.field_type == FieldType::End
    }

    pub fn is_sort_padding(&self) -> bool {
        self.field_type == FieldType::SortPadding
    }

    pub fn is_dist_padding(&self) -> bool {
        self.field_type == FieldType::DistPadding
    }

    /// True when `join_attr` already sits in the sentinel neighborhood
    /// (at or beyond `JOIN_ATTR_NEG_INF`/`JOIN_ATTR_POS_INF`), i.e. adding a
    /// further deviation would be unsafe. `to_start`/`to_end` consult this
    /// before stretching the range.
    pub fn in_sentinel_neighborhood(&self) -> bool {
        self.join_attr <= JOIN_ATTR_NEG_INF || self.join_attr >= JOIN_ATTR_POS_INF
    }

    /// Byte length of the `attributes` payload, for callers sizing
    /// plaintext buffers ahead of the confidentiality collaborator.
    pub fn attribute_byte_len() -> usize {
        MAX_ATTRIBUTES * std::mem::size_of::<i64>()
    }
}
