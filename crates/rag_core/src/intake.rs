use std::collections::HashSet;

/// Produces the loadable URL set from the raw sidebar entries.
///
/// Blank entries (empty after trimming) are dropped and each distinct value is
/// kept once, at the position where it first appeared. Values are compared and
/// returned verbatim; only the blank check looks at the trimmed text.
pub fn dedupe_urls<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut urls = Vec::new();
    for entry in entries {
        let entry = entry.as_ref();
        if entry.trim().is_empty() {
            continue;
        }
        if seen.insert(entry) {
            urls.push(entry.to_string());
        }
    }
    urls
}

/// The "add" control only opens a new field once the last one has content.
pub fn can_add_entry<S: AsRef<str>>(entries: &[S]) -> bool {
    entries
        .last()
        .is_some_and(|last| !last.as_ref().trim().is_empty())
}
