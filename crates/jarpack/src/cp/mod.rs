//! The segment constant pool: deduplicated entries with indexes assigned
//! once at finalisation.
//!
//! While classes are shredded the pool only hands out opaque typed
//! references; [`ConstantPool::finalise`] sorts every kind by its stable
//! key and produces a [`ResolvedPool`] whose indexes are contiguous per
//! kind and read-only for the rest of the segment.

mod entry;
mod pool;

pub use entry::{
    ClassRef, ConstRef, DescrRef, DoubleRef, FieldRef, FloatRef, IMethodRef, IntRef, LongRef,
    MethodRef, SigRef, StringRef, Utf8Ref,
};
pub(crate) use pool::MemberEntry;
pub use pool::{ConstantPool, ResolvedPool};
