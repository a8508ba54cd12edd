//! Typed references into the constant pool.
//!
//! A reference is an arena handle, not an index: the transmitted index of
//! an entry exists only after finalisation.

macro_rules! cp_ref {
    ($(#[$doc:meta] $name:ident),* $(,)?) => {
        $(
            #[$doc]
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub(crate) u32);

            impl $name {
                pub(crate) const fn idx(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

cp_ref! {
    /// Reference to a CONSTANT_Utf8 entry
    Utf8Ref,
    /// Reference to a CONSTANT_Integer entry
    IntRef,
    /// Reference to a CONSTANT_Float entry
    FloatRef,
    /// Reference to a CONSTANT_Long entry
    LongRef,
    /// Reference to a CONSTANT_Double entry
    DoubleRef,
    /// Reference to a CONSTANT_String entry
    StringRef,
    /// Reference to a CONSTANT_Class entry
    ClassRef,
    /// Reference to a signature entry
    SigRef,
    /// Reference to a name-and-type entry
    DescrRef,
    /// Reference to a field entry
    FieldRef,
    /// Reference to a method entry
    MethodRef,
    /// Reference to an interface-method entry
    IMethodRef,
}

/// A reference to any loadable constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstRef {
    /// An integer constant
    Int(IntRef),
    /// A float constant
    Float(FloatRef),
    /// A long constant
    Long(LongRef),
    /// A double constant
    Double(DoubleRef),
    /// A string constant
    Str(StringRef),
    /// A class constant
    Class(ClassRef),
}
