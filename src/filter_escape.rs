//! Escaping for values embedded in an ffmpeg filter graph.
//!
//! ffmpeg unescapes a `-vf` string twice: once when splitting the graph into
//! filters, and again when splitting one filter's arguments into options.
//! A literal value therefore goes through [`option`] first and the whole
//! argument string through [`graph`] afterwards.

/// Escapes a value for the filter-option level, where `:` separates options.
pub fn option(value: &str) -> String {
    escape(value, &['\\', '\'', ':'])
}

/// Escapes a filter's argument string for the graph level.
pub fn graph(args: &str) -> String {
    escape(args, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
