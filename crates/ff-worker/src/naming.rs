//! camelCase/"spaced case" -> snake_case parameter-name normalization.
//!
//! The reference implementation does this with the lookaround regex
//! `((?<=[a-z0-9])[A-Z]|(?!^)[A-Z](?=[a-z]))` -> `_\1`, then lowercases.
//! `regex` (this workspace's engine) doesn't support lookaround, so the
//! same rule — insert `_` before an uppercase letter that either follows a
//! lowercase/digit, or (not at the start) is followed by a lowercase
//! letter — is applied by scanning characters directly.

/// Normalize a declared parameter name to the worker's handler-argument
/// convention.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.replace(' ', "_").chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let follows_lower_or_digit =
                i > 0 && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());
            let precedes_lower = i + 1 < chars.len() && chars[i + 1].is_ascii_lowercase();
            if follows_lower_or_digit || (i > 0 && precedes_lower) {
                out.push('_');
            }
        }
        out.push(c);
    }

    out.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_camel_case() {
        assert_eq!(camel_to_snake("orderId"), "order_id");
    }

    #[test]
    fn leading_capital_not_prefixed() {
        assert_eq!(camel_to_snake("OrderId"), "order_id");
    }

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(camel_to_snake("order id"), "order_id");
    }

    #[test]
    fn digit_boundary_gets_underscore() {
        assert_eq!(camel_to_snake("step1Name"), "step1_name");
    }

    #[test]
    fn acronym_run_splits_before_trailing_word() {
        assert_eq!(camel_to_snake("parseHTMLBody"), "parse_html_body");
    }

    #[test]
    fn already_snake_case_is_unchanged() {
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
    }
}
