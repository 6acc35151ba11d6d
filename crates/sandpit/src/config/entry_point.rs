//! Entry-point detection for languages whose compiler ties file names to type names
//!
//! Java requires `public class Foo` to live in `Foo.java`. The submitted source is
//! scanned for the first public top-level type declaration; this is a textual
//! heuristic and does not understand comments or string literals.

use std::sync::LazyLock;

use regex::Regex;

static PUBLIC_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bpublic\s+(?:(?:final|abstract|sealed|non-sealed|strictfp)\s+)*(?:class|interface|enum|record)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
    )
    .expect("public type pattern is valid")
});

/// Name of the first public top-level type declared in `source`, if any
///
/// Declarations nested inside braces are skipped, so a `public static class`
/// inside a non-public `Main` does not name the file.
pub fn public_type_name(source: &str) -> Option<&str> {
    let mut depth = 0i64;
    let mut scanned = 0;

    for caps in PUBLIC_TYPE.captures_iter(source) {
        let (Some(decl), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        depth += brace_delta(&source[scanned..decl.start()]);
        scanned = decl.start();
        if depth <= 0 {
            return Some(name.as_str());
        }
    }
    None
}

fn brace_delta(text: &str) -> i64 {
    text.bytes().fold(0, |acc, b| match b {
        b'{' => acc + 1,
        b'}' => acc - 1,
        _ => acc,
    })
}
