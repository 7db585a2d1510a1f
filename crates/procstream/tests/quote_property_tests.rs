//! Property-based tests for argument quoting
//!
//! Quoted arguments are joined into one command line and split again with the
//! rules of the Windows C runtime, which must give back the original list.

use proptest::prelude::*;
use procstream::quote::{needs_quoting, quote_arg, quote_args};

/// Split a command line the way `CommandLineToArgvW` does for arguments after the first
fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(' ') | Some('\t')) {
            chars.next();
        }
        if chars.peek().is_none() {
            return args;
        }

        let mut arg = String::new();
        let mut in_quotes = false;
        while let Some(&c) = chars.peek() {
            match c {
                '\\' => {
                    let mut backslashes = 0;
                    while chars.peek() == Some(&'\\') {
                        chars.next();
                        backslashes += 1;
                    }
                    if chars.peek() == Some(&'"') {
                        arg.extend(std::iter::repeat('\\').take(backslashes / 2));
                        if backslashes % 2 == 1 {
                            chars.next();
                            arg.push('"');
                        }
                    } else {
                        arg.extend(std::iter::repeat('\\').take(backslashes));
                    }
                }
                '"' => {
                    chars.next();
                    in_quotes = !in_quotes;
                }
                ' ' | '\t' if !in_quotes => break,
                _ => {
                    chars.next();
                    arg.push(c);
                }
            }
        }
        args.push(arg);
    }
}

/// Strings biased toward the characters that need quoting
fn arb_arg() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just('\\'),
            Just('"'),
            Just(' '),
            Just('\t'),
            Just('a'),
            Just('Z'),
            Just('-'),
            Just('é'),
        ],
        0..16,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    /// Quoting then splitting yields the original arguments
    #[test]
    fn prop_quote_round_trip(args in prop::collection::vec(arb_arg(), 1..6)) {
        let line = quote_args(&args).join(" ");
        prop_assert_eq!(split_command_line(&line), args);
    }

    /// Arguments without special characters are untouched
    #[test]
    fn prop_plain_args_unchanged(arg in "[A-Za-z0-9_./:=-]{1,32}") {
        prop_assert!(!needs_quoting(&arg));
        prop_assert_eq!(quote_arg(&arg), arg);
    }

    /// Output has the same length as input
    #[test]
    fn prop_same_length(args in prop::collection::vec(arb_arg(), 0..8)) {
        prop_assert_eq!(quote_args(&args).len(), args.len());
    }
}

#[test]
fn test_split_examples() {
    assert_eq!(split_command_line(r#""a b" c"#), vec!["a b", "c"]);
    assert_eq!(split_command_line(r#""a\"b""#), vec![r#"a"b"#]);
    assert_eq!(split_command_line(r#""a\\" b"#), vec![r"a\", "b"]);
    assert_eq!(split_command_line(r"a\\b"), vec![r"a\\b"]);
    assert_eq!(split_command_line(r#""""#), vec![""]);
}
