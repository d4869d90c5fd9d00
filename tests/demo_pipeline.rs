//! Process-level smoke test for the bundled word-count demo: runs the
//! compiled `wordcount-demo` binary against a small fixture file and checks
//! its reported total against a plain Rust count of the same file.

use std::process::Command;

#[test]
fn wordcount_demo_matches_plain_word_count() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.txt");
    std::fs::write(&input, "one two three\nfour five\nsix\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_wordcount-demo"))
        .arg(&input)
        .arg("2")
        .output()
        .expect("failed to run wordcount-demo");

    assert!(
        output.status.success(),
        "wordcount-demo exited non-zero: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected_words = "one two three four five six".split_whitespace().count();
    assert!(
        stdout.contains(&expected_words.to_string()),
        "expected total {expected_words} in output, got: {stdout}"
    );
}
