//! Identifier generation for messages, sessions and notices.

/// Random suffix length; with a one-letter prefix ids are 20 characters.
const SUFFIX_LEN: usize = 19;

/// `prefix` followed by 19 hex characters of a v4 uuid.
pub fn prefixed(prefix: &str) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    let mut id = String::with_capacity(prefix.len() + SUFFIX_LEN);
    id.push_str(prefix);
    id.push_str(&raw[..SUFFIX_LEN]);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_ids_have_fixed_shape() {
        let id = prefixed("M");
        assert_eq!(id.len(), 20);
        assert!(id.starts_with('M'));
        assert!(id[1..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(prefixed("M"), prefixed("M"));
    }
}
