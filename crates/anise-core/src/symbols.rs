use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

static UNIQUE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Returns `prefix_N` with a process-unique N. Used to name anonymous
/// functions and to keep distinct textual functions from colliding in
/// generated modules.
pub fn unique_string(prefix: &str) -> String {
    let n = UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}", prefix, n)
}

static MUNGE_TABLE: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('-', "_"),
        ('.', "_DOT_"),
        (':', "_COLON_"),
        ('+', "_PLUS_"),
        ('>', "_GT_"),
        ('<', "_LT_"),
        ('=', "_EQ_"),
        ('~', "_TILDE_"),
        ('!', "_BANG_"),
        ('@', "_CIRCA_"),
        ('#', "_SHARP_"),
        ('\'', "_SINGLEQUOTE_"),
        ('"', "_DOUBLEQUOTE_"),
        ('%', "_PERCENT_"),
        ('^', "_CARET_"),
        ('&', "_AMPERSAND_"),
        ('*', "_STAR_"),
        ('|', "_BAR_"),
        ('{', "_LBRACE_"),
        ('}', "_RBRACE_"),
        ('[', "_LBRACK_"),
        (']', "_RBRACK_"),
        ('/', "_SLASH_"),
        ('\\', "_BSLASH_"),
        ('?', "_QMARK_"),
    ])
});

/// Maps a dialect identifier to a host-compatible one. Characters without
/// a table entry pass through unchanged.
pub fn munge(name: &str) -> String {
    let mut munged = String::with_capacity(name.len());
    for ch in name.chars() {
        match MUNGE_TABLE.get(&ch) {
            Some(replacement) => munged.push_str(replacement),
            None => munged.push(ch),
        }
    }
    munged
}
