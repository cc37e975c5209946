//! Field name to column name translation
//!
//! Record fields and condition keys may be written in camelCase (`userName`,
//! `UserID`) or snake_case (`user_name`). Columns are always snake_case, so
//! every key goes through [`camel_to_snake`] before it reaches SQL.

/// Convert a camelCase identifier to its snake_case column name
///
/// An underscore is inserted before an uppercase ASCII letter only at the
/// transition into a run of capitals, so acronyms stay in one piece.
/// Existing underscores are kept and the input is never prefixed with one.
///
/// # Example
///
/// ```rust
/// use repokit::naming::camel_to_snake;
///
/// assert_eq!(camel_to_snake("UserID"), "user_id");
/// assert_eq!(camel_to_snake("createAt"), "create_at");
/// assert_eq!(camel_to_snake("user_id"), "user_id");
/// assert_eq!(camel_to_snake("ID"), "id");
/// ```
pub fn camel_to_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    let mut emitted = false;
    let mut prev: Option<char> = None;

    for (i, c) in s.chars().enumerate() {
        if i > 0 && emitted && c.is_ascii_uppercase() {
            let boundary = match prev {
                Some(p) => !p.is_ascii_uppercase() && p != '_',
                None => false,
            };
            if boundary {
                out.push('_');
            }
        }
        if c != '_' {
            emitted = true;
        }
        out.push(c.to_ascii_lowercase());
        prev = Some(c);
    }

    out
}

/// Whether `s` can be interpolated into SQL as a column or table identifier
///
/// Accepts ASCII letters, digits, `_` and a single qualifying `.`.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').count() <= 2
        && s.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_to_snake("userName"), "user_name");
        assert_eq!(camel_to_snake("UserName"), "user_name");
        assert_eq!(camel_to_snake("createAt"), "create_at");
    }

    #[test]
    fn test_acronym_is_single_boundary() {
        assert_eq!(camel_to_snake("UserID"), "user_id");
        assert_eq!(camel_to_snake("ID"), "id");
        assert_eq!(camel_to_snake("orderIDs"), "order_ids");
    }

    #[test]
    fn test_snake_case_unchanged() {
        assert_eq!(camel_to_snake("user_id"), "user_id");
        assert_eq!(camel_to_snake("deleted"), "deleted");
    }

    #[test]
    fn test_no_duplicate_underscores() {
        assert_eq!(camel_to_snake("user_Name"), "user_name");
        assert_eq!(camel_to_snake("_Private"), "_private");
        assert_eq!(camel_to_snake("__id"), "__id");
    }

    #[test]
    fn test_digits() {
        assert_eq!(camel_to_snake("address2Line"), "address2_line");
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "UserID",
            "userName",
            "user_id",
            "ID",
            "HTTPServer",
            "_Private",
            "a_B_c",
            "createAt",
        ] {
            let once = camel_to_snake(input);
            assert_eq!(camel_to_snake(&once), once, "input: {}", input);
        }
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("user_id"));
        assert!(is_identifier("u.user_id"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("id; DROP TABLE users"));
        assert!(!is_identifier("a.b.c"));
        assert!(!is_identifier("`id`"));
    }
}
