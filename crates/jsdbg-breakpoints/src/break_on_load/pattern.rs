/// The `urlRegex` of the entry breakpoint guarding `url`.
///
/// Matches any path whose last segment is the file's base name (extension
/// dropped) followed by the end or a non-alphanumeric character. For
/// `…/index.ts` that covers `out/index.js` and `index.bin.js` but not
/// `index100.js` or `indexabc.ts`. Over-matching across extensions is
/// intentional: a missed compiled file means a silently unbound breakpoint.
pub fn entry_breakpoint_pattern(url: &str) -> String {
    let file_name = url.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(url);
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };
    format!(
        r"(^|.*[\\/]){}([^A-Za-z0-9].*)?$",
        regex::escape(stem)
    )
}
