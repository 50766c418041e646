/// Picks the override declared for `active`, or `default` when there is none.
///
/// Backend identifiers are compared exactly; the first matching override wins.
pub fn resolve_query_text<'a>(active: &str, default: &'a str, overrides: &'a [(String, String)]) -> &'a str {
    overrides
        .iter()
        .find(|(backend, _)| backend == active)
        .map(|(_, text)| text.as_str())
        .unwrap_or(default)
}
