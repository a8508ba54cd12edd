//! Layout element arena.
//!
//! All nodes of a parsed layout live in one arena; calls store arena
//! indexes rather than owning their targets, so cyclic call graphs need
//! no reference counting.

use jarpack_codec::BhsdCodec;

/// Index of an element within its arena.
pub type ElemId = usize;

/// The size letter of an integral read: 1, 2, 4 or 0 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UintType {
    /// `B`: one byte
    B,
    /// `H`: two bytes
    H,
    /// `I`: four bytes
    I,
    /// `V`: no bytes
    V,
}

impl UintType {
    /// Parse a size letter.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Self::B),
            'H' => Some(Self::H),
            'I' => Some(Self::I),
            'V' => Some(Self::V),
            _ => None,
        }
    }

    /// Bytes consumed by this size.
    pub const fn byte_len(self) -> usize {
        match self {
            Self::B => 1,
            Self::H => 2,
            Self::I => 4,
            Self::V => 0,
        }
    }
}

/// What an integral element means beyond its raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegralKind {
    /// Unsigned value (`B`, `H`, `I`, `V`)
    Plain,
    /// Sign-extended value (`SB`, `SH`, `SI`)
    Signed,
    /// Flag word (`FB`, `FH`, `FI`)
    Flag,
    /// Bytecode index (`P*`): renumbered to an instruction index
    Bci,
    /// Bytecode index relative to the previous `P` (`PO*`)
    BciOffset,
    /// Offset from the previous `P` (`O*`)
    Offset,
    /// Signed offset from the previous `P` (`OS*`)
    SignedOffset,
}

impl IntegralKind {
    /// Whether values of this kind are positions needing renumbering.
    pub const fn is_label(self) -> bool {
        matches!(self, Self::Bci | Self::BciOffset | Self::Offset | Self::SignedOffset)
    }

    /// Whether values of this kind are relative to the previous `P`.
    pub const fn is_relative(self) -> bool {
        matches!(self, Self::BciOffset | Self::Offset | Self::SignedOffset)
    }
}

/// The target kind of a reference element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// `KI`: integer constant
    KInt,
    /// `KJ`: long constant
    KLong,
    /// `KF`: float constant
    KFloat,
    /// `KD`: double constant
    KDouble,
    /// `KS`: string constant
    KString,
    /// `KQ`: constant of the enclosing field's type
    KQuery,
    /// `RC`: class
    RClass,
    /// `RS`: signature
    RSignature,
    /// `RD`: name-and-type
    RDescr,
    /// `RF`: field
    RField,
    /// `RM`: method
    RMethod,
    /// `RI`: interface method
    RIMethod,
    /// `RU`: UTF-8
    RUtf8,
    /// `RQ`: any constant
    RQuery,
}

/// One case of a union element.
#[derive(Debug, Clone)]
pub struct UnionCase {
    /// Tag values selecting this case
    pub values: Vec<i32>,
    /// The case body
    pub body: Vec<ElemId>,
}

/// A parsed layout element.
#[derive(Debug, Clone)]
pub enum LayoutElement {
    /// An integral read contributing one band
    Integral {
        /// The layout tag, e.g. `"PH"`
        tag: String,
        /// Its meaning
        kind: IntegralKind,
        /// Its width
        uint: UintType,
        /// The band this element streams into
        band: usize,
    },
    /// A reference read contributing one band
    Reference {
        /// The layout tag, e.g. `"RUNH"`
        tag: String,
        /// The reference kind
        kind: RefKind,
        /// Whether zero means "absent"
        nullable: bool,
        /// Width of the transmitted form in the payload
        uint: UintType,
        /// The band this element streams into
        band: usize,
    },
    /// A counted repetition of a body
    Replication {
        /// The count tag, e.g. `"NH"`
        tag: String,
        /// Width of the count in the payload
        uint: UintType,
        /// Band carrying the counts
        count_band: usize,
        /// The replicated body
        body: Vec<ElemId>,
    },
    /// A tagged union
    Union {
        /// The tag element's layout tag, e.g. `"TB"`
        tag: String,
        /// Whether the tag is sign-extended
        signed: bool,
        /// Width of the tag in the payload
        uint: UintType,
        /// Band carrying the tags
        tag_band: usize,
        /// The labelled cases
        cases: Vec<UnionCase>,
        /// The default body
        default_body: Vec<ElemId>,
    },
    /// A call to a callable
    Call {
        /// The relative index as written in the layout
        index: i32,
        /// The resolved arena id of the target callable
        target: ElemId,
    },
    /// A reusable body, entered through calls
    Callable {
        /// The body
        body: Vec<ElemId>,
        /// Whether any negative-index call reaches this callable
        backwards: bool,
        /// Contiguous rank among backwards callables
        backwards_index: Option<usize>,
    },
}

/// The arena of one parsed layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutArena {
    /// All elements, call targets by index
    pub elements: Vec<LayoutElement>,
    /// The top-level element sequence
    pub top: Vec<ElemId>,
    /// All callables in declaration order
    pub callables: Vec<ElemId>,
    /// Number of bands the layout contributes
    pub band_count: usize,
}

impl LayoutArena {
    /// Number of backwards callables.
    pub fn backwards_callable_count(&self) -> usize {
        self.callables
            .iter()
            .filter(|&&id| {
                matches!(self.elements[id], LayoutElement::Callable { backwards: true, .. })
            })
            .count()
    }
}

/// The band codec implied by a layout tag: any `O` takes `BRANCH5`,
/// then `P` takes `BCI5`, then a plain `S` takes `SIGNED5`, then `B`
/// takes `BYTE1`, everything else `UNSIGNED5`.
pub(crate) fn codec_for_tag(tag: &str) -> BhsdCodec {
    if tag.contains('O') {
        return BhsdCodec::BRANCH5;
    }
    if tag.contains('P') {
        return BhsdCodec::BCI5;
    }
    if tag.contains('S') && !tag.contains("KS") && !tag.contains("RS") {
        return BhsdCodec::SIGNED5;
    }
    if tag.contains('B') {
        return BhsdCodec::BYTE1;
    }
    BhsdCodec::UNSIGNED5
}
