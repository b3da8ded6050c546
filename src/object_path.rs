//! Database object path quoting.

/// Double-quote object path segments that need it.
///
/// Each line is treated as one dotted path. Existing double quotes are
/// removed first, since paths often arrive partially quoted, and then any
/// segment with a character outside `[a-z0-9_]` is wrapped in quotes.
pub fn quote_object_paths(object_paths: &str) -> String {
    object_paths
        .split('\n')
        .map(|path| {
            path.replace('"', "")
                .split('.')
                .map(|segment| {
                    if segment
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                    {
                        segment.to_string()
                    } else {
                        format!("\"{}\"", segment)
                    }
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
