//! Constant-pool building and finalisation.

use std::collections::HashMap;

use crate::cp::entry::{
    ClassRef, ConstRef, DescrRef, DoubleRef, FieldRef, FloatRef, IMethodRef, IntRef, LongRef,
    MethodRef, SigRef, StringRef, Utf8Ref,
};
use crate::visitor::CpValue;

/// A class entry: its name and the inner-class predicate computed from it.
#[derive(Debug, Clone)]
pub(crate) struct ClassEntry {
    pub name: Utf8Ref,
    pub is_inner: bool,
}

/// A signature entry: the form string with class names elided, plus the
/// classes in elision order.
#[derive(Debug, Clone)]
pub(crate) struct SignatureEntry {
    pub form: Utf8Ref,
    pub classes: Vec<ClassRef>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DescrEntry {
    pub name: Utf8Ref,
    pub sig: SigRef,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MemberEntry {
    pub class: ClassRef,
    pub descr: DescrRef,
}

/// The growing constant pool of one segment.
#[derive(Debug, Default)]
pub struct ConstantPool {
    utf8: Vec<String>,
    utf8_map: HashMap<String, Utf8Ref>,
    ints: Vec<i32>,
    int_map: HashMap<i32, IntRef>,
    floats: Vec<u32>,
    float_map: HashMap<u32, FloatRef>,
    longs: Vec<i64>,
    long_map: HashMap<i64, LongRef>,
    doubles: Vec<u64>,
    double_map: HashMap<u64, DoubleRef>,
    strings: Vec<Utf8Ref>,
    string_map: HashMap<Utf8Ref, StringRef>,
    classes: Vec<ClassEntry>,
    class_map: HashMap<Utf8Ref, ClassRef>,
    signatures: Vec<SignatureEntry>,
    signature_map: HashMap<String, SigRef>,
    descrs: Vec<DescrEntry>,
    descr_map: HashMap<(Utf8Ref, SigRef), DescrRef>,
    fields: Vec<MemberEntry>,
    field_map: HashMap<(ClassRef, DescrRef), FieldRef>,
    methods: Vec<MemberEntry>,
    method_map: HashMap<(ClassRef, DescrRef), MethodRef>,
    imethods: Vec<MemberEntry>,
    imethod_map: HashMap<(ClassRef, DescrRef), IMethodRef>,
}

impl ConstantPool {
    /// A fresh pool. The empty string is always present: it anchors the
    /// UTF-8 prefix encoding.
    pub fn new() -> Self {
        let mut pool = Self::default();
        pool.add_utf8("");
        pool
    }

    /// Intern a UTF-8 string.
    pub fn add_utf8(&mut self, s: &str) -> Utf8Ref {
        if let Some(&r) = self.utf8_map.get(s) {
            return r;
        }
        let r = Utf8Ref(self.utf8.len() as u32);
        self.utf8.push(s.to_string());
        self.utf8_map.insert(s.to_string(), r);
        r
    }

    /// Intern an integer constant.
    pub fn add_int(&mut self, v: i32) -> IntRef {
        if let Some(&r) = self.int_map.get(&v) {
            return r;
        }
        let r = IntRef(self.ints.len() as u32);
        self.ints.push(v);
        self.int_map.insert(v, r);
        r
    }

    /// Intern a float constant. Deduplication is by bit pattern, so NaNs
    /// collapse deterministically.
    pub fn add_float(&mut self, v: f32) -> FloatRef {
        let bits = v.to_bits();
        if let Some(&r) = self.float_map.get(&bits) {
            return r;
        }
        let r = FloatRef(self.floats.len() as u32);
        self.floats.push(bits);
        self.float_map.insert(bits, r);
        r
    }

    /// Intern a long constant.
    pub fn add_long(&mut self, v: i64) -> LongRef {
        if let Some(&r) = self.long_map.get(&v) {
            return r;
        }
        let r = LongRef(self.longs.len() as u32);
        self.longs.push(v);
        self.long_map.insert(v, r);
        r
    }

    /// Intern a double constant, by bit pattern.
    pub fn add_double(&mut self, v: f64) -> DoubleRef {
        let bits = v.to_bits();
        if let Some(&r) = self.double_map.get(&bits) {
            return r;
        }
        let r = DoubleRef(self.doubles.len() as u32);
        self.doubles.push(bits);
        self.double_map.insert(bits, r);
        r
    }

    /// Intern a string constant.
    pub fn add_string(&mut self, s: &str) -> StringRef {
        let utf8 = self.add_utf8(s);
        if let Some(&r) = self.string_map.get(&utf8) {
            return r;
        }
        let r = StringRef(self.strings.len() as u32);
        self.strings.push(utf8);
        self.string_map.insert(utf8, r);
        r
    }

    /// Intern a class entry by internal name.
    pub fn add_class(&mut self, name: &str) -> ClassRef {
        let utf8 = self.add_utf8(name);
        if let Some(&r) = self.class_map.get(&utf8) {
            return r;
        }
        let r = ClassRef(self.classes.len() as u32);
        // The inner-class predicate: any byte at or below '-'
        let is_inner = name.bytes().any(|b| b <= 0x2D);
        self.classes.push(ClassEntry { name: utf8, is_inner });
        self.class_map.insert(utf8, r);
        r
    }

    /// Intern a signature (a field or method descriptor, possibly
    /// generic). Class names between `L` and the terminating `;`/`<` are
    /// elided into the form and registered as class entries.
    pub fn add_signature(&mut self, signature: &str) -> SigRef {
        if let Some(&r) = self.signature_map.get(signature) {
            return r;
        }
        let mut form = String::with_capacity(signature.len());
        let mut classes = Vec::new();
        let mut class_name = String::new();
        let mut in_class = false;
        for c in signature.chars() {
            if in_class {
                if c == ';' || c == '<' {
                    classes.push(self.add_class(&class_name));
                    class_name.clear();
                    in_class = false;
                    form.push(c);
                } else {
                    class_name.push(c);
                }
            } else {
                form.push(c);
                if c == 'L' {
                    in_class = true;
                }
            }
        }
        if in_class {
            // Unterminated class name; keep it as a class anyway
            classes.push(self.add_class(&class_name));
        }
        let form = self.add_utf8(&form);
        let r = SigRef(self.signatures.len() as u32);
        self.signatures.push(SignatureEntry { form, classes });
        self.signature_map.insert(signature.to_string(), r);
        r
    }

    /// Intern a name-and-type entry.
    pub fn add_descr(&mut self, name: &str, desc: &str) -> DescrRef {
        let name = self.add_utf8(name);
        let sig = self.add_signature(desc);
        if let Some(&r) = self.descr_map.get(&(name, sig)) {
            return r;
        }
        let r = DescrRef(self.descrs.len() as u32);
        self.descrs.push(DescrEntry { name, sig });
        self.descr_map.insert((name, sig), r);
        r
    }

    /// Intern a field reference.
    pub fn add_field(&mut self, owner: &str, name: &str, desc: &str) -> FieldRef {
        let class = self.add_class(owner);
        let descr = self.add_descr(name, desc);
        if let Some(&r) = self.field_map.get(&(class, descr)) {
            return r;
        }
        let r = FieldRef(self.fields.len() as u32);
        self.fields.push(MemberEntry { class, descr });
        self.field_map.insert((class, descr), r);
        r
    }

    /// Intern a method reference.
    pub fn add_method(&mut self, owner: &str, name: &str, desc: &str) -> MethodRef {
        let class = self.add_class(owner);
        let descr = self.add_descr(name, desc);
        if let Some(&r) = self.method_map.get(&(class, descr)) {
            return r;
        }
        let r = MethodRef(self.methods.len() as u32);
        self.methods.push(MemberEntry { class, descr });
        self.method_map.insert((class, descr), r);
        r
    }

    /// Intern an interface-method reference.
    pub fn add_imethod(&mut self, owner: &str, name: &str, desc: &str) -> IMethodRef {
        let class = self.add_class(owner);
        let descr = self.add_descr(name, desc);
        if let Some(&r) = self.imethod_map.get(&(class, descr)) {
            return r;
        }
        let r = IMethodRef(self.imethods.len() as u32);
        self.imethods.push(MemberEntry { class, descr });
        self.imethod_map.insert((class, descr), r);
        r
    }

    /// Intern a loadable constant.
    pub fn add_const(&mut self, value: &CpValue) -> ConstRef {
        match value {
            CpValue::Int(v) => ConstRef::Int(self.add_int(*v)),
            CpValue::Float(v) => ConstRef::Float(self.add_float(*v)),
            CpValue::Long(v) => ConstRef::Long(self.add_long(*v)),
            CpValue::Double(v) => ConstRef::Double(self.add_double(*v)),
            CpValue::Str(s) => ConstRef::Str(self.add_string(s)),
            CpValue::Class(name) => ConstRef::Class(self.add_class(name)),
        }
    }

    /// The interned string behind a UTF-8 reference.
    pub fn utf8_str(&self, r: Utf8Ref) -> &str {
        &self.utf8[r.idx()]
    }

    /// The internal name behind a class reference.
    pub fn class_name(&self, r: ClassRef) -> &str {
        self.utf8_str(self.classes[r.idx()].name)
    }

    /// Whether a class entry's name marks it as an inner class.
    pub fn is_inner_class(&self, r: ClassRef) -> bool {
        self.classes[r.idx()].is_inner
    }

    /// The classes a signature entry references.
    pub fn signature_classes(&self, r: SigRef) -> &[ClassRef] {
        &self.signatures[r.idx()].classes
    }

    /// The signature of a name-and-type entry.
    pub fn descr_sig(&self, r: DescrRef) -> SigRef {
        self.descrs[r.idx()].sig
    }

    /// Assign indexes: sort each kind by its stable key and freeze.
    pub fn finalise(self) -> ResolvedPool {
        let utf8_order = sorted_by(self.utf8.len(), |i| &self.utf8[i]);
        let utf8_pos = positions(&utf8_order);

        let int_order = sorted_by(self.ints.len(), |i| self.ints[i]);
        let int_pos = positions(&int_order);
        let float_order = sorted_by(self.floats.len(), |i| self.floats[i]);
        let float_pos = positions(&float_order);
        let long_order = sorted_by(self.longs.len(), |i| self.longs[i]);
        let long_pos = positions(&long_order);
        let double_order = sorted_by(self.doubles.len(), |i| self.doubles[i]);
        let double_pos = positions(&double_order);

        let string_order = sorted_by(self.strings.len(), |i| utf8_pos[self.strings[i].idx()]);
        let string_pos = positions(&string_order);

        let class_order =
            sorted_by(self.classes.len(), |i| utf8_pos[self.classes[i].name.idx()]);
        let class_pos = positions(&class_order);

        let sig_order = sorted_by(self.signatures.len(), |i| {
            let entry = &self.signatures[i];
            let classes: Vec<u32> =
                entry.classes.iter().map(|c| class_pos[c.idx()]).collect();
            (utf8_pos[entry.form.idx()], classes)
        });
        let sig_pos = positions(&sig_order);

        let descr_order = sorted_by(self.descrs.len(), |i| {
            let entry = &self.descrs[i];
            (sig_pos[entry.sig.idx()], utf8_pos[entry.name.idx()])
        });
        let descr_pos = positions(&descr_order);

        let field_order = member_order(&self.fields, &class_pos, &descr_pos);
        let field_pos = positions(&field_order);
        let method_order = member_order(&self.methods, &class_pos, &descr_pos);
        let method_pos = positions(&method_order);
        let imethod_order = member_order(&self.imethods, &class_pos, &descr_pos);
        let imethod_pos = positions(&imethod_order);

        let field_sub = member_subindexes(&self.fields, &field_order);
        let method_sub = member_subindexes(&self.methods, &method_order);

        // Rank of each <init> method within its class's constructors
        let init_utf8 = self.utf8_map.get("<init>").copied();
        let mut init_sub = vec![0u32; self.methods.len()];
        let mut init_counts: HashMap<ClassRef, u32> = HashMap::new();
        for &orig in &method_order {
            let entry = &self.methods[orig];
            if init_utf8 == Some(self.descrs[entry.descr.idx()].name) {
                let n = init_counts.entry(entry.class).or_insert(0);
                init_sub[orig] = *n;
                *n += 1;
            }
        }

        ResolvedPool {
            pool: self,
            utf8_order,
            utf8_pos,
            int_order,
            int_pos,
            float_order,
            float_pos,
            long_order,
            long_pos,
            double_order,
            double_pos,
            string_order,
            string_pos,
            class_order,
            class_pos,
            sig_order,
            sig_pos,
            descr_order,
            descr_pos,
            field_order,
            field_pos,
            method_order,
            method_pos,
            imethod_order,
            imethod_pos,
            field_sub,
            method_sub,
            init_sub,
        }
    }
}

fn sorted_by<K: Ord>(len: usize, key: impl Fn(usize) -> K) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.sort_by_key(|&i| key(i));
    order
}

fn member_order(members: &[MemberEntry], class_pos: &[u32], descr_pos: &[u32]) -> Vec<usize> {
    sorted_by(members.len(), |i| {
        let entry = &members[i];
        (class_pos[entry.class.idx()], descr_pos[entry.descr.idx()])
    })
}

fn positions(order: &[usize]) -> Vec<u32> {
    let mut pos = vec![0u32; order.len()];
    for (sorted, &orig) in order.iter().enumerate() {
        pos[orig] = sorted as u32;
    }
    pos
}

/// Rank of each member within the members of its own class, in sorted
/// order. The packed bytecode's self/super reference bands index these
/// sub-lists.
fn member_subindexes(members: &[MemberEntry], order: &[usize]) -> Vec<u32> {
    let mut sub = vec![0u32; members.len()];
    let mut counts: HashMap<ClassRef, u32> = HashMap::new();
    for &orig in order {
        let n = counts.entry(members[orig].class).or_insert(0);
        sub[orig] = *n;
        *n += 1;
    }
    sub
}

/// A finalised pool: every reference resolves to a contiguous per-kind
/// index, stable for the rest of the segment.
#[derive(Debug)]
pub struct ResolvedPool {
    pool: ConstantPool,
    pub(crate) utf8_order: Vec<usize>,
    utf8_pos: Vec<u32>,
    pub(crate) int_order: Vec<usize>,
    int_pos: Vec<u32>,
    pub(crate) float_order: Vec<usize>,
    float_pos: Vec<u32>,
    pub(crate) long_order: Vec<usize>,
    long_pos: Vec<u32>,
    pub(crate) double_order: Vec<usize>,
    double_pos: Vec<u32>,
    pub(crate) string_order: Vec<usize>,
    string_pos: Vec<u32>,
    pub(crate) class_order: Vec<usize>,
    class_pos: Vec<u32>,
    pub(crate) sig_order: Vec<usize>,
    sig_pos: Vec<u32>,
    pub(crate) descr_order: Vec<usize>,
    descr_pos: Vec<u32>,
    pub(crate) field_order: Vec<usize>,
    field_pos: Vec<u32>,
    pub(crate) method_order: Vec<usize>,
    method_pos: Vec<u32>,
    pub(crate) imethod_order: Vec<usize>,
    imethod_pos: Vec<u32>,
    field_sub: Vec<u32>,
    method_sub: Vec<u32>,
    init_sub: Vec<u32>,
}

impl ResolvedPool {
    /// The underlying entry data.
    pub(crate) fn raw(&self) -> &ConstantPool {
        &self.pool
    }

    /// Transmitted index of a UTF-8 entry.
    pub fn utf8_index(&self, r: Utf8Ref) -> i32 {
        self.utf8_pos[r.idx()] as i32
    }

    /// Transmitted index of an integer entry.
    pub fn int_index(&self, r: IntRef) -> i32 {
        self.int_pos[r.idx()] as i32
    }

    /// Transmitted index of a float entry.
    pub fn float_index(&self, r: FloatRef) -> i32 {
        self.float_pos[r.idx()] as i32
    }

    /// Transmitted index of a long entry.
    pub fn long_index(&self, r: LongRef) -> i32 {
        self.long_pos[r.idx()] as i32
    }

    /// Transmitted index of a double entry.
    pub fn double_index(&self, r: DoubleRef) -> i32 {
        self.double_pos[r.idx()] as i32
    }

    /// Transmitted index of a string entry.
    pub fn string_index(&self, r: StringRef) -> i32 {
        self.string_pos[r.idx()] as i32
    }

    /// Transmitted index of a class entry.
    pub fn class_index(&self, r: ClassRef) -> i32 {
        self.class_pos[r.idx()] as i32
    }

    /// Transmitted index of a signature entry.
    pub fn sig_index(&self, r: SigRef) -> i32 {
        self.sig_pos[r.idx()] as i32
    }

    /// Transmitted index of a name-and-type entry.
    pub fn descr_index(&self, r: DescrRef) -> i32 {
        self.descr_pos[r.idx()] as i32
    }

    /// Transmitted index of a field entry.
    pub fn field_index(&self, r: FieldRef) -> i32 {
        self.field_pos[r.idx()] as i32
    }

    /// Transmitted index of a method entry.
    pub fn method_index(&self, r: MethodRef) -> i32 {
        self.method_pos[r.idx()] as i32
    }

    /// Transmitted index of an interface-method entry.
    pub fn imethod_index(&self, r: IMethodRef) -> i32 {
        self.imethod_pos[r.idx()] as i32
    }

    /// Rank of a field among its own class's field entries.
    pub fn field_subindex(&self, r: FieldRef) -> i32 {
        self.field_sub[r.idx()] as i32
    }

    /// Rank of a method among its own class's method entries.
    pub fn method_subindex(&self, r: MethodRef) -> i32 {
        self.method_sub[r.idx()] as i32
    }

    /// Rank of a constructor among its class's `<init>` methods.
    pub fn init_subindex(&self, r: MethodRef) -> i32 {
        self.init_sub[r.idx()] as i32
    }

    /// Per-kind entry counts, in header emission order: Utf8, Int, Float,
    /// Long, Double, String, Class, Signature, Descr, Field, Method,
    /// IMethod.
    pub fn counts(&self) -> [usize; 12] {
        [
            self.pool.utf8.len(),
            self.pool.ints.len(),
            self.pool.floats.len(),
            self.pool.longs.len(),
            self.pool.doubles.len(),
            self.pool.strings.len(),
            self.pool.classes.len(),
            self.pool.signatures.len(),
            self.pool.descrs.len(),
            self.pool.fields.len(),
            self.pool.methods.len(),
            self.pool.imethods.len(),
        ]
    }

    /// Whether any numeric entries exist (drives the cp-numbers header
    /// bit).
    pub fn has_numbers(&self) -> bool {
        !self.pool.ints.is_empty()
            || !self.pool.floats.is_empty()
            || !self.pool.longs.is_empty()
            || !self.pool.doubles.is_empty()
    }

    pub(crate) fn utf8_at(&self, orig: usize) -> &str {
        &self.pool.utf8[orig]
    }

    pub(crate) fn int_at(&self, orig: usize) -> i32 {
        self.pool.ints[orig]
    }

    pub(crate) fn float_bits_at(&self, orig: usize) -> u32 {
        self.pool.floats[orig]
    }

    pub(crate) fn long_at(&self, orig: usize) -> i64 {
        self.pool.longs[orig]
    }

    pub(crate) fn double_bits_at(&self, orig: usize) -> u64 {
        self.pool.doubles[orig]
    }

    pub(crate) fn string_utf8_at(&self, orig: usize) -> Utf8Ref {
        self.pool.strings[orig]
    }

    pub(crate) fn class_at(&self, orig: usize) -> &ClassEntry {
        &self.pool.classes[orig]
    }

    pub(crate) fn signature_at(&self, orig: usize) -> &SignatureEntry {
        &self.pool.signatures[orig]
    }

    pub(crate) fn descr_at(&self, orig: usize) -> DescrEntry {
        self.pool.descrs[orig]
    }

    pub(crate) fn field_at(&self, orig: usize) -> MemberEntry {
        self.pool.fields[orig]
    }

    pub(crate) fn method_at(&self, orig: usize) -> MemberEntry {
        self.pool.methods[orig]
    }

    pub(crate) fn imethod_at(&self, orig: usize) -> MemberEntry {
        self.pool.imethods[orig]
    }

    /// Transmitted index of a loadable constant within its own kind.
    pub fn const_index(&self, r: ConstRef) -> i32 {
        match r {
            ConstRef::Int(r) => self.int_index(r),
            ConstRef::Float(r) => self.float_index(r),
            ConstRef::Long(r) => self.long_index(r),
            ConstRef::Double(r) => self.double_index(r),
            ConstRef::Str(r) => self.string_index(r),
            ConstRef::Class(r) => self.class_index(r),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_dedup_returns_same_ref() {
        let mut pool = ConstantPool::new();
        let a = pool.add_utf8("hello");
        let b = pool.add_utf8("hello");
        assert_eq!(a, b);

        let c1 = pool.add_class("java/lang/Object");
        let c2 = pool.add_class("java/lang/Object");
        assert_eq!(c1, c2);

        let f1 = pool.add_field("A", "x", "I");
        let f2 = pool.add_field("A", "x", "I");
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_utf8_sorted_lexicographically_with_empty_first() {
        let mut pool = ConstantPool::new();
        let zebra = pool.add_utf8("zebra");
        let apple = pool.add_utf8("apple");
        let resolved = pool.finalise();
        assert_eq!(resolved.utf8_index(Utf8Ref(0)), 0, "empty string first");
        assert!(resolved.utf8_index(apple) < resolved.utf8_index(zebra));
    }

    #[test]
    fn test_indexes_contiguous_per_kind() {
        let mut pool = ConstantPool::new();
        let refs = [
            pool.add_class("b/B"),
            pool.add_class("a/A"),
            pool.add_class("c/C"),
        ];
        let resolved = pool.finalise();
        let mut indexes: Vec<i32> = refs.iter().map(|&r| resolved.class_index(r)).collect();
        indexes.sort_unstable();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_signature_elides_class_names() {
        let mut pool = ConstantPool::new();
        let sig = pool.add_signature("(ILjava/lang/String;)V");
        let class = pool.add_class("java/lang/String");
        let resolved = pool.finalise();
        let entry = resolved.signature_at(sig.idx());
        assert_eq!(resolved.raw().utf8_str(entry.form), "(IL;)V");
        assert_eq!(entry.classes, vec![class]);
    }

    #[test]
    fn test_generic_signature_elision() {
        let mut pool = ConstantPool::new();
        let sig = pool.add_signature("Ljava/util/List<Ljava/lang/String;>;");
        let resolved = pool.finalise();
        let entry = resolved.signature_at(sig.idx());
        assert_eq!(resolved.raw().utf8_str(entry.form), "L<L;>;");
        assert_eq!(entry.classes.len(), 2);
    }

    #[test]
    fn test_inner_class_predicate() {
        let mut pool = ConstantPool::new();
        let outer = pool.add_class("com/example/Outer");
        let inner = pool.add_class("com/example/Outer$Inner");
        assert!(!pool.is_inner_class(outer));
        assert!(pool.is_inner_class(inner));
    }

    #[test]
    fn test_member_ordering_by_class_then_descr() {
        let mut pool = ConstantPool::new();
        let b_field = pool.add_field("B", "x", "I");
        let a_field = pool.add_field("A", "y", "I");
        let a_field2 = pool.add_field("A", "a", "I");
        let resolved = pool.finalise();
        assert!(resolved.field_index(a_field2) < resolved.field_index(b_field));
        assert!(resolved.field_index(a_field) < resolved.field_index(b_field));
    }

    #[test]
    fn test_member_subindexes() {
        let mut pool = ConstantPool::new();
        let f1 = pool.add_field("A", "x", "I");
        let f2 = pool.add_field("A", "y", "I");
        let f3 = pool.add_field("B", "z", "I");
        let resolved = pool.finalise();
        let mut a_subs = vec![resolved.field_subindex(f1), resolved.field_subindex(f2)];
        a_subs.sort_unstable();
        assert_eq!(a_subs, vec![0, 1]);
        assert_eq!(resolved.field_subindex(f3), 0, "first member of B");
    }

    #[test]
    fn test_init_subindexes() {
        let mut pool = ConstantPool::new();
        let ctor1 = pool.add_method("A", "<init>", "()V");
        let ctor2 = pool.add_method("A", "<init>", "(I)V");
        let plain = pool.add_method("A", "run", "()V");
        let resolved = pool.finalise();
        let mut ctors = vec![resolved.init_subindex(ctor1), resolved.init_subindex(ctor2)];
        ctors.sort_unstable();
        assert_eq!(ctors, vec![0, 1]);
        assert_eq!(resolved.init_subindex(plain), 0);
    }

    #[test]
    fn test_float_bit_pattern_dedup() {
        let mut pool = ConstantPool::new();
        let nan1 = pool.add_float(f32::NAN);
        let nan2 = pool.add_float(f32::NAN);
        assert_eq!(nan1, nan2);
        let pos = pool.add_float(0.0);
        let neg = pool.add_float(-0.0);
        assert_ne!(pos, neg, "signed zeros are distinct bit patterns");
    }

    #[test]
    fn test_stable_indexes_across_identical_builds() {
        let build = || {
            let mut pool = ConstantPool::new();
            pool.add_class("x/Alpha");
            pool.add_signature("(JLx/Beta;)V");
            pool.add_method("x/Alpha", "go", "()V");
            let gamma = pool.add_class("x/Gamma");
            let resolved = pool.finalise();
            resolved.class_index(gamma)
        };
        assert_eq!(build(), build());
    }
}
