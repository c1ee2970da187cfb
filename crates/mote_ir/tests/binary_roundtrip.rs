use mote_ir::{DecodeError, Expr, Limits, Stmt, Unit, compile};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn reload(src: &str) -> (Unit, Unit) {
    let unit = compile(src, &Limits::default()).unwrap();
    let bytes = unit.to_bytes();
    let back = Unit::from_bytes(&bytes, &Limits::default()).unwrap();
    (unit, back)
}

#[test]
fn simple_unit_survives_a_reload() {
    let (unit, back) = reload("var x = 1 + 2; f(x, 'done');");
    assert_eq!(unit.dump_text(), back.dump_text());
    assert_eq!(unit.node_count, back.node_count);
}

#[test]
fn every_node_kind_survives_a_reload() {
    let (unit, back) = reload(
        "var a = [1, -2.5, true, false, null, undefined];\n\
         var o = {tag: 'kept', nested: {n: 1}};\n\
         function each(xs, fn) {\n\
           var i = 0;\n\
           while (i < xs.length) { fn(xs[i], this); i = i + 1; }\n\
         }\n\
         if (o.tag == 'kept' && !a[0]) { each(a, function (v) { return v; }); }\n\
         else { o.nested.n = o.nested.n * 2 % 3 - 1 / 2; }\n\
         try { throw {code: 1}; } catch (e) { a = e; } finally { o = null; }\n\
         { var scoped = 1 <= 2 != 3 >= 4 || 5 > 6; }\n\
         return;",
    );
    assert_eq!(unit.dump_text(), back.dump_text());
}

#[test]
fn string_table_deduplicates_repeated_names() {
    let unit = compile(
        "var name = 'name'; name = name + 'name'; f(name, name);",
        &Limits::default(),
    )
    .unwrap();
    let bytes = unit.to_bytes();
    // Two distinct table entries: "name" and "f".
    let count = bytes.windows(4).filter(|w| *w == b"name".as_slice()).count();
    assert_eq!(count, 1);
    let back = Unit::from_bytes(&bytes, &Limits::default()).unwrap();
    assert_eq!(unit.dump_text(), back.dump_text());
}

#[test]
fn number_bits_are_preserved_exactly() {
    let src = "var a = 0.30000000000000004; var b = 2.5e300; var c = 5e-324;";
    let unit = compile(src, &Limits::default()).unwrap();
    let back = Unit::from_bytes(&unit.to_bytes(), &Limits::default()).unwrap();
    for (orig, again) in unit.body.iter().zip(back.body.iter()) {
        let (Stmt::Var(_, Some(Expr::Number(a))), Stmt::Var(_, Some(Expr::Number(b)))) =
            (orig, again)
        else {
            panic!("expected numeric var initializers");
        };
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn empty_input_is_malformed() {
    let err = Unit::from_bytes(&[], &Limits::default()).unwrap_err();
    assert!(matches!(err, DecodeError::Malformed(_)));
}

#[test]
fn bad_magic_is_rejected() {
    let bytes = b"NOPE\x01\x00\x00\x00\x00\x00".to_vec();
    let err = Unit::from_bytes(&bytes, &Limits::default()).unwrap_err();
    match err {
        DecodeError::Malformed(msg) => assert!(msg.contains("magic")),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn version_mismatch_is_rejected() {
    let unit = compile("1;", &Limits::default()).unwrap();
    let mut bytes = unit.to_bytes();
    bytes[4] = 9;
    bytes[5] = 0;
    let err = Unit::from_bytes(&bytes, &Limits::default()).unwrap_err();
    assert!(matches!(err, DecodeError::Version { found: 9 }));
}

#[test]
fn truncated_input_is_malformed() {
    let unit = compile("var x = f(1, 'two');", &Limits::default()).unwrap();
    let bytes = unit.to_bytes();
    for cut in 0..bytes.len() {
        let err = Unit::from_bytes(&bytes[..cut], &Limits::default());
        assert!(err.is_err(), "prefix of {cut} bytes decoded");
    }
}

#[test]
fn trailing_bytes_are_rejected() {
    let unit = compile("1;", &Limits::default()).unwrap();
    let mut bytes = unit.to_bytes();
    bytes.push(0);
    let err = Unit::from_bytes(&bytes, &Limits::default()).unwrap_err();
    match err {
        DecodeError::Malformed(msg) => assert!(msg.contains("trailing")),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn out_of_range_string_index_is_rejected() {
    // Header with an empty string table, then one `ident` statement whose
    // name index points past the table.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MOTU");
    bytes.extend(1u16.to_le_bytes());
    bytes.extend(0u32.to_le_bytes()); // no strings
    bytes.extend(1u32.to_le_bytes()); // one statement
    bytes.push(7); // expression statement
    bytes.push(6); // ident
    bytes.extend(3u32.to_le_bytes()); // bogus index
    let err = Unit::from_bytes(&bytes, &Limits::default()).unwrap_err();
    match err {
        DecodeError::Malformed(msg) => assert!(msg.contains("string index")),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn unknown_tags_are_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MOTU");
    bytes.extend(1u16.to_le_bytes());
    bytes.extend(0u32.to_le_bytes());
    bytes.extend(1u32.to_le_bytes());
    bytes.push(99); // no such statement
    let err = Unit::from_bytes(&bytes, &Limits::default()).unwrap_err();
    match err {
        DecodeError::Malformed(msg) => assert!(msg.contains("statement tag")),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn non_utf8_string_table_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MOTU");
    bytes.extend(1u16.to_le_bytes());
    bytes.extend(1u32.to_le_bytes());
    bytes.extend(2u32.to_le_bytes());
    bytes.extend_from_slice(&[0xff, 0xfe]);
    bytes.extend(0u32.to_le_bytes()); // empty body
    let err = Unit::from_bytes(&bytes, &Limits::default()).unwrap_err();
    match err {
        DecodeError::Malformed(msg) => assert!(msg.contains("UTF-8")),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn runaway_nesting_is_rejected() {
    // One expression statement wrapping thousands of unary negations; the
    // node budget admits it but the decoder refuses to recurse that far.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MOTU");
    bytes.extend(1u16.to_le_bytes());
    bytes.extend(0u32.to_le_bytes()); // no strings
    bytes.extend(1u32.to_le_bytes()); // one statement
    bytes.push(7); // expression statement
    for _ in 0..4000 {
        bytes.push(15); // unary
        bytes.push(1); // negate
    }
    bytes.push(3); // null
    let err = Unit::from_bytes(&bytes, &Limits::default()).unwrap_err();
    match err {
        DecodeError::Malformed(msg) => assert!(msg.contains("nesting")),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn decode_applies_the_node_budget() {
    let unit = compile("1 + 2 + 3 + 4 + 5;", &Limits::default()).unwrap();
    let bytes = unit.to_bytes();
    let err = Unit::from_bytes(&bytes, &Limits { max_nodes: 3 }).unwrap_err();
    match err {
        DecodeError::TooLarge { limit, .. } => assert_eq!(limit, 3),
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256, max_shrink_iters: 200, .. ProptestConfig::default()
    })]
    #[test]
    fn decode_of_random_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = Unit::from_bytes(&bytes, &Limits::default());
    }

    #[test]
    fn decode_of_corrupted_units_never_panics(
        src in "x[a-z]{0,3} = [0-9]{1,3};",
        flip in 0usize..64,
        val in any::<u8>(),
    ) {
        let unit = compile(&src, &Limits::default()).unwrap();
        let mut bytes = unit.to_bytes();
        let i = flip % bytes.len();
        bytes[i] = val;
        let _ = Unit::from_bytes(&bytes, &Limits::default());
    }
}
