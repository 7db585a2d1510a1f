//! Argument quoting for platforms without POSIX-style argument splitting
//!
//! Windows passes a single command line string to the child, which is split
//! again by the C runtime. Arguments are quoted so that split reproduces them
//! exactly; backslashes are only special in front of a double quote.

/// Returns `true` if the argument must be quoted to survive command line splitting
pub fn needs_quoting(arg: &str) -> bool {
    arg.is_empty() || arg.contains(&[' ', '\t', '\\', '"'][..])
}

/// Quote a single argument
pub fn quote_arg(arg: &str) -> String {
    if !needs_quoting(arg) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');

    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // Double the run and escape the quote itself
                push_backslashes(&mut quoted, backslashes * 2 + 1);
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                push_backslashes(&mut quoted, backslashes);
                quoted.push(c);
                backslashes = 0;
            }
        }
    }

    // Trailing run sits in front of the closing quote
    push_backslashes(&mut quoted, backslashes * 2);
    quoted.push('"');
    quoted
}

/// Quote every argument that needs it, leaving the rest untouched
pub fn quote_args<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter().map(|arg| quote_arg(arg.as_ref())).collect()
}

/// Arguments as they must be handed to the OS on the current platform
pub fn platform_args<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    if cfg!(windows) {
        quote_args(args)
    } else {
        args.iter().map(|arg| arg.as_ref().to_string()).collect()
    }
}

fn push_backslashes(out: &mut String, count: usize) {
    out.extend(std::iter::repeat('\\').take(count));
}
