use uuid::Uuid;

/// Generate a short prefixed entity id, e.g. `rpt-9f8a01bc`.
///
/// Reports, matches, claims and categories use these human-scannable ids;
/// users keep full UUIDs since they come from the identity provider.
pub fn prefixed_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &uuid[..8])
}

pub fn report_id() -> String {
    prefixed_id("rpt")
}

pub fn match_id() -> String {
    prefixed_id("mtc")
}

pub fn claim_id() -> String {
    prefixed_id("clm")
}

pub fn category_id() -> String {
    prefixed_id("cat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_id_format() {
        let id = prefixed_id("rpt");
        assert!(id.starts_with("rpt-"));
        assert_eq!(id.len(), "rpt-".len() + 8);
        assert!(id["rpt-".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = report_id();
        let b = report_id();
        assert_ne!(a, b);
    }
}
