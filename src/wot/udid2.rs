/// Validates the `udid2` user-id format (spec GLOSSARY: "a user-id format
/// constraining a human-readable identity string; validity is a pure
/// function on the userid text").
///
/// Shape: `nick (city birthdate)` where `nick` excludes whitespace and the
/// delimiter characters, and the parenthesized part is free text.
/// Intentionally permissive about the parenthesized content, which is left
/// undefined beyond "free text", while enforcing the nickname/parenthesis
/// structure that every other rule in §4.3 depends on
/// (`kc.membership.userid == decoded.userid`).
pub fn is_valid_udid2(userid: &str) -> bool {
    let userid = userid.trim();
    let Some(open) = userid.find('(') else {
        return false;
    };
    if !userid.ends_with(')') {
        return false;
    }
    let nick = userid[..open].trim_end();
    if nick.is_empty() {
        return false;
    }
    if nick.contains(['(', ')', '\n', '\t']) {
        return false;
    }
    let inner = &userid[open + 1..userid.len() - 1];
    !inner.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_identity() {
        assert!(is_valid_udid2("alice (Paris 1990-01-01)"));
    }

    #[test]
    fn rejects_missing_parentheses() {
        assert!(!is_valid_udid2("alice"));
    }

    #[test]
    fn rejects_empty_nickname() {
        assert!(!is_valid_udid2(" (Paris 1990-01-01)"));
    }

    #[test]
    fn rejects_empty_parenthesized_part() {
        assert!(!is_valid_udid2("alice ()"));
    }

    #[test]
    fn rejects_unterminated_parenthesis() {
        assert!(!is_valid_udid2("alice (Paris"));
    }
}
