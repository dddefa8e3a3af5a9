// Embedding protocol sessions.
//
// Each test feeds a full session (header + commands) through `serve` and
// checks the exact reply stream.
use recency_cache::{serve, SessionError};
use std::io::Cursor;

fn run(input: &str) -> String {
    let mut out = Vec::new();
    serve(Cursor::new(input), &mut out).expect("session succeeds");
    String::from_utf8(out).expect("utf-8 replies")
}

#[test]
fn store_then_miss_then_hit() {
    let out = run("2 4\nv1\t1e-3 1e-2 1e-1\nv2\nv1\n");
    assert_eq!(out, "!STORED!\n!NOEMBED!\n0.001 0.01 0.1\n");
}

#[test]
fn empty_value_list_is_rejected() {
    assert_eq!(run("2 2\nv1\t\n"), "!STORERR!\n");
    assert_eq!(run("2 1\nv1\t\n"), "!STORERR!\n");
}

// Verifies: the third key evicts the least recently read one.
#[test]
fn eviction_follows_reads() {
    let input = "2 2\nv1\t1e-2 1e-1\nv2\t1e-1 1e-2\nv1\nv2\nv3\t1e1 1e2\nv3\nv1\n";
    assert_eq!(
        run(input),
        "!STORED!\n!STORED!\n0.01 0.1\n0.1 0.01\n!STORED!\n10 100\n!NOEMBED!\n"
    );
}

// Verifies: vectors are truncated to the configured width.
#[test]
fn values_truncated_to_width() {
    let input = "2 1\nv1\t1e-2 1e-1\nv2\t1e-1 1e-2\nv1\nv2\nv3\t1e1 1e2\nv3\nv1\n";
    assert_eq!(
        run(input),
        "!STORED!\n!STORED!\n0.01\n0.1\n!STORED!\n10\n!NOEMBED!\n"
    );
}

// Verifies: storing to an existing key appends up to the width.
#[test]
fn existing_key_is_extended() {
    let input = "2 3\nv1\t1e3\nv1\nv1\t1e2\nv1\n";
    assert_eq!(run(input), "!STORED!\n1000\n!STORED!\n1000 100\n");
}

#[test]
fn blank_lines_and_bad_floats() {
    let input = "1 2\n\nk\t1 nope\n\nk\nk\t2.5\nk\n";
    assert_eq!(run(input), "!STORERR!\n!NOEMBED!\n!STORED!\n2.5\n");
}

#[test]
fn zero_capacity_session_rejects_stores() {
    assert_eq!(run("0 4\nk\t1\nk\n"), "!STORERR!\n!NOEMBED!\n");
}

#[test]
fn malformed_header_is_an_error() {
    let mut out = Vec::new();
    let err = serve(Cursor::new("two four\nk\n"), &mut out).unwrap_err();
    assert!(matches!(err, SessionError::Header(ref h) if h == "two four"));
    assert!(out.is_empty());

    let err = serve(Cursor::new(""), &mut out).unwrap_err();
    assert!(matches!(err, SessionError::Header(_)));
}

// Verifies: replies carry six significant digits and switch to exponent
// notation outside [1e-4, 1e6).
#[test]
fn replies_use_six_significant_digits() {
    let input = "1 8\na\t0.1234567 1000000 1e-7 123456 0.0001\na\n";
    assert_eq!(run(input), "!STORED!\n0.123457 1e+06 1e-07 123456 0.0001\n");
}

// Verifies: each value is read up to its longest float prefix; a token with
// no numeric prefix still rejects the store.
#[test]
fn values_read_up_to_float_prefix() {
    let input = "2 4\nb\t1.5abc 2e3x\nb\nc\tabc 1\nc\n";
    assert_eq!(run(input), "!STORED!\n1.5 2000\n!STORERR!\n!NOEMBED!\n");
}
