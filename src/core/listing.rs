//! Extraction of machine names from `vboxmanage list ...` output.
//!
//! Both `list vms` and `list runningvms` print one machine per line in the
//! shape `"name" {uuid}`, so a single parser serves both queries.

/// Return every double-quoted token in `raw`, in order of appearance.
///
/// Quotes pair up within a line. A token is kept when it is non-empty and
/// contains no backslash; an unterminated quote at the end of a line is
/// ignored. Duplicates are preserved.
pub fn parse_machine_names(raw: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in raw.lines() {
        let mut rest = line;
        while let Some(open) = rest.find('"') {
            let after_open = &rest[open + 1..];
            let Some(close) = after_open.find('"') else {
                break;
            };
            let token = &after_open[..close];
            if !token.is_empty() && !token.contains('\\') {
                names.push(token.to_string());
            }
            rest = &after_open[close + 1..];
        }
    }
    names
}
