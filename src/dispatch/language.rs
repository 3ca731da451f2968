/// Pick the response language: the candidate when it is supported, else `fallback`
pub fn negotiate_language(candidate: Option<&str>, supported: &[String], fallback: &str) -> String {
    match candidate.map(str::to_ascii_lowercase) {
        Some(lang) if supported.iter().any(|s| s.eq_ignore_ascii_case(&lang)) => lang,
        _ => fallback.to_ascii_lowercase(),
    }
}
