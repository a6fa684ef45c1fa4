//! Per-item API URL construction.

/// URL for item `id` under `base`.
///
/// A `{id}` or `{}` placeholder in `base` is substituted; otherwise trailing
/// slashes are stripped and `/{id}` appended.
pub fn item_url(base: &str, id: u64) -> String {
    let id = id.to_string();
    if base.contains("{id}") {
        return base.replace("{id}", &id);
    }
    if base.contains("{}") {
        return base.replace("{}", &id);
    }
    format!("{}/{}", base.trim_end_matches('/'), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_id_segment() {
        assert_eq!(
            item_url("https://api.example.com/walkthroughs", 7),
            "https://api.example.com/walkthroughs/7"
        );
        assert_eq!(
            item_url("https://api.example.com/walkthroughs///", 12),
            "https://api.example.com/walkthroughs/12"
        );
    }

    #[test]
    fn substitutes_placeholders() {
        assert_eq!(
            item_url("https://api.example.com/modules/3/walkthroughs/{}", 5),
            "https://api.example.com/modules/3/walkthroughs/5"
        );
        assert_eq!(
            item_url("https://api.example.com/w/{id}?full=1", 42),
            "https://api.example.com/w/42?full=1"
        );
    }
}
