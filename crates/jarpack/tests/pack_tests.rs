//! End-to-end packing scenarios through the public API.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::io::Cursor;

use jarpack::visitor::{Annotation, AnnotationValue, ClassParser, ClassVisitor, CpValue};
use jarpack::{InputFile, PackError, PackOptions, Packer};
use jarpack_codec::BhsdCodec;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("jarpack=debug").try_init();
}

const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xD0, 0x0D];

const HAVE_SPECIAL_FORMATS: i32 = 1;
const HAVE_ALL_CODE_FLAGS: i32 = 1 << 2;
const HAVE_FILE_HEADERS: i32 = 1 << 4;

/// Replays one of several scripted classes, selected by the first byte
/// of the class-file contents.
struct ScriptedParser;

impl ClassParser for ScriptedParser {
    fn parse(&self, bytes: &[u8], visitor: &mut dyn ClassVisitor) -> jarpack::Result<()> {
        match bytes.first() {
            Some(0) => simple_class(visitor),
            Some(1) => busy_class(visitor),
            Some(2) => mystery_class(visitor),
            _ => Err(PackError::MalformedClass {
                class: String::new(),
                reason: "unscripted class".to_string(),
            }),
        }
    }
}

fn simple_class(v: &mut dyn ClassVisitor) -> jarpack::Result<()> {
    v.begin_class(0, 52, 0x21, "demo/Simple", Some("java/lang/Object"), &[])?;
    v.begin_method(0x0001, "<init>", "()V", &[])?;
    v.begin_code()?;
    v.visit_var_insn(0, 25, 0)?; // aload_0 as plain aload
    v.visit_method_insn(1, 183, "java/lang/Object", "<init>", "()V")?;
    v.visit_insn(4, 177)?; // return
    v.visit_maxs(1, 1)?;
    v.end_code(5)?;
    v.end_method()?;
    v.end_class()
}

fn busy_class(v: &mut dyn ClassVisitor) -> jarpack::Result<()> {
    v.begin_class(
        0,
        52,
        0x21,
        "demo/Busy",
        Some("java/lang/Object"),
        &["java/lang/Runnable".to_string()],
    )?;
    v.visit_source_file("Busy.java")?;
    v.visit_inner_class("demo/Busy$Helper", Some("demo/Busy"), Some("Helper"), 8)?;
    v.visit_annotation(
        &Annotation {
            type_desc: "Ljava/lang/Deprecated;".to_string(),
            pairs: vec![(
                "since".to_string(),
                AnnotationValue::Const { tag: 's', value: CpValue::Str("9".to_string()) },
            )],
        },
        true,
    )?;
    v.begin_field(0x0012, "LIMIT", "I", Some(&CpValue::Int(500)))?;
    v.end_field()?;
    v.begin_method(0x0001, "run", "()V", &["java/lang/Exception".to_string()])?;
    v.begin_code()?;
    v.visit_ldc_insn(0, false, &CpValue::Int(1_000_000))?;
    v.visit_var_insn(2, 54, 1)?; // istore_1 as istore
    v.visit_iinc_insn(3, 1, 1)?;
    v.visit_jump_insn(6, 167, 3)?; // goto the iinc
    v.visit_field_insn(9, 180, "demo/Busy", "LIMIT", "I")?;
    v.visit_type_insn(12, 187, "demo/Busy$Helper")?;
    v.visit_method_insn(15, 183, "demo/Busy$Helper", "<init>", "()V")?;
    v.visit_insn(18, 177)?; // return
    v.visit_line_number(0, 10)?;
    v.visit_line_number(9, 12)?;
    v.visit_try_catch(0, 9, 9, Some("java/lang/Exception"))?;
    v.visit_maxs(3, 2)?;
    v.end_code(19)?;
    v.end_method()?;
    v.end_class()
}

fn mystery_class(v: &mut dyn ClassVisitor) -> jarpack::Result<()> {
    v.begin_class(0, 52, 0x21, "demo/Mystery", Some("java/lang/Object"), &[])?;
    v.visit_attribute("MyAttr", &[9, 9, 9])?;
    v.end_class()
}

fn manifest() -> InputFile {
    let mut file =
        InputFile::new("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec());
    file.modtime = 1_600_000_000;
    file
}

fn class_file(name: &str, script: u8) -> InputFile {
    InputFile::new(name, vec![script, 0xFE])
}

fn pack(options: PackOptions, files: Vec<InputFile>) -> Vec<u8> {
    let mut out = Vec::new();
    let written = Packer::new(options)
        .pack(files, &ScriptedParser, &mut out)
        .expect("pack should succeed");
    assert_eq!(written, out.len() as u64);
    out
}

fn header_values(out: &[u8], count: usize) -> Vec<i32> {
    assert_eq!(&out[..4], &MAGIC);
    BhsdCodec::UNSIGNED5
        .decode_ints(count, &mut Cursor::new(&out[4..]))
        .expect("header decodes")
}

fn count_magics(out: &[u8]) -> usize {
    out.windows(4).filter(|w| *w == MAGIC).count()
}

#[test]
fn test_manifest_only_jar() {
    let out = pack(PackOptions::default(), vec![manifest()]);
    // minver, majver, options, size_hi, size_lo, next, modtime, file_count
    let values = header_values(&out, 8);
    assert_eq!(values[0], 7);
    assert_eq!(values[1], 150);
    assert_eq!(values[2] & HAVE_FILE_HEADERS, HAVE_FILE_HEADERS);
    assert_eq!(values[2] & HAVE_ALL_CODE_FLAGS, HAVE_ALL_CODE_FLAGS);
    assert_eq!(values[6], 1_600_000_000);
    assert_eq!(values[7], 1, "one file");
    // the manifest bytes travel verbatim at the tail of the segment
    assert!(
        out.windows(22).any(|w| w == b"Manifest-Version: 1.0\n"),
        "manifest contents survive"
    );
    // class_count is the final header value
    let more = header_values(&out, 8 + 8 + 4);
    assert_eq!(more[19], 0, "no classes");
}

#[test]
fn test_single_class_minimal_effort() {
    let mut options = PackOptions::default();
    options.set_effort(1).expect("valid");
    let out = pack(options, vec![class_file("demo/Simple.class", 0)]);
    let values = header_values(&out, 3);
    assert_eq!(values[2] & HAVE_ALL_CODE_FLAGS, HAVE_ALL_CODE_FLAGS, "bit 2 on");
    assert_eq!(values[2] & HAVE_FILE_HEADERS, 0, "no side files");
    assert_eq!(values[2] & HAVE_SPECIAL_FORMATS, 0, "no band headers at effort 1");
    // header: 3 fixed + utf8 + 7 cp counts + ic + 2 versions + class_count
    let more = header_values(&out, 3 + 8 + 4);
    assert_eq!(more[14], 1, "one class");
}

#[test]
fn test_idempotent_packing() {
    init_tracing();
    let build = || {
        let mut options = PackOptions::default();
        options.set_effort(7).expect("valid");
        pack(
            options,
            vec![
                manifest(),
                class_file("demo/Simple.class", 0),
                class_file("demo/Busy.class", 1),
            ],
        )
    };
    assert_eq!(build(), build(), "identical inputs yield identical bytes");
}

#[test]
fn test_unknown_attribute_passes_class_verbatim() {
    let class = class_file("demo/Mystery.class", 2);
    let original = class.bytes.clone();
    let out = pack(PackOptions::default(), vec![class]);
    let values = header_values(&out, 8);
    assert_eq!(values[7], 1, "the class travels as a file");
    assert!(
        out.windows(original.len()).any(|w| w == original),
        "pass-through keeps the exact original bytes"
    );
    let more = header_values(&out, 8 + 8 + 4);
    assert_eq!(more[19], 0, "no shredded classes");
}

#[test]
fn test_unknown_attribute_error_action_fails() {
    let mut options = PackOptions::default();
    options.set_unknown_attribute_action("error").expect("valid");
    let mut out = Vec::new();
    let result = Packer::new(options).pack(
        vec![class_file("demo/Mystery.class", 2)],
        &ScriptedParser,
        &mut out,
    );
    assert!(matches!(
        result,
        Err(PackError::UnknownAttribute { ref attribute, ref class })
            if attribute == "MyAttr" && class == "demo/Mystery"
    ));
}

#[test]
fn test_no_segment_limit_is_one_segment() {
    let mut options = PackOptions::default();
    options.set_segment_limit(-1).expect("valid");
    let out = pack(
        options,
        vec![
            manifest(),
            class_file("demo/Simple.class", 0),
            class_file("demo/Busy.class", 1),
        ],
    );
    assert_eq!(count_magics(&out), 1);
}

#[test]
fn test_per_class_segments() {
    let mut options = PackOptions::default();
    options.set_segment_limit(0).expect("valid");
    let out = pack(
        options,
        vec![
            manifest(),
            class_file("demo/Simple.class", 0),
            class_file("demo/Busy.class", 1),
        ],
    );
    assert_eq!(count_magics(&out), 2, "one segment per class");
}

#[test]
fn test_gzip_framing() {
    let mut options = PackOptions::default();
    options.set_gzip(true);
    let mut out = Vec::new();
    Packer::new(options)
        .pack(vec![manifest()], &ScriptedParser, &mut out)
        .expect("pack should succeed");
    assert_eq!(&out[..2], &[0x1F, 0x8B], "gzip magic");
    assert_ne!(&out[..4], &MAGIC);
}

#[test]
fn test_strip_debug_drops_line_numbers() {
    let files = || vec![class_file("demo/Busy.class", 1)];
    let mut stripped_options = PackOptions::default();
    stripped_options.set_strip_debug(true);
    let stripped = pack(stripped_options, files());
    let kept = pack(PackOptions::default(), files());
    assert!(stripped.len() < kept.len(), "line numbers and source names cost bytes");
}

#[test]
fn test_custom_attribute_layout_is_packed() {
    let mut options = PackOptions::default();
    options.set_attribute_disposition(jarpack::AttrContext::Class, "MyAttr", "BBB");
    let out = pack(options, vec![class_file("demo/Mystery.class", 2)]);
    let values = header_values(&out, 3);
    assert_eq!(
        values[2] & HAVE_SPECIAL_FORMATS,
        HAVE_SPECIAL_FORMATS,
        "attribute definitions present"
    );
    assert_eq!(values[2] & HAVE_FILE_HEADERS, 0, "the class is shredded, not passed");
}

#[test]
fn test_pass_files_option() {
    let mut options = PackOptions::default();
    options.add_pass_file("demo/Simple.class");
    let class = class_file("demo/Simple.class", 0);
    let original = class.bytes.clone();
    let out = pack(options, vec![class]);
    let values = header_values(&out, 8);
    assert_eq!(values[7], 1, "the pass file is carried in the file bands");
    assert!(out.windows(original.len()).any(|w| w == original));
}

#[test]
fn test_deflate_hint_forced_true_sets_archive_bit() {
    let mut options = PackOptions::default();
    options.set_deflate_hint("true").expect("valid");
    let out = pack(options, vec![manifest()]);
    let values = header_values(&out, 3);
    assert_eq!(values[2] & (1 << 5), 1 << 5);
}

proptest! {
    #[test]
    fn prop_side_file_packing_is_deterministic(
        names in proptest::collection::vec("[a-z]{1,12}", 1..8)
    ) {
        let files = || {
            names
                .iter()
                .enumerate()
                .map(|(i, n)| InputFile::new(format!("{n}{i}.bin"), vec![i as u8; i + 1]))
                .collect::<Vec<_>>()
        };
        let first = pack(PackOptions::default(), files());
        let second = pack(PackOptions::default(), files());
        prop_assert_eq!(first, second);
    }
}
