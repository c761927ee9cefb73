//! Source-text helpers shared by the bundling pipeline.

/// Strip a leading UTF-8 byte order mark (U+FEFF) if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

/// Wrap JSON source so it can participate in the module graph as an ES
/// module with a default export.
pub fn transform_json_source(source: &str) -> String {
    format!(
        "export default JSON.parse(\"{}\")",
        escape_for_js_string(source)
    )
}

fn escape_for_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}
