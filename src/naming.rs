//! Identifier case conversion
//!
//! Word boundaries are `_`, `-`, and a lowercase-or-digit to uppercase
//! transition. Casing is ASCII-only so results never depend on locale.

/// Split an identifier into its words.
///
/// # Examples
/// ```
/// use tablegen::naming::words;
/// assert_eq!(words("user_name"), vec!["user", "name"]);
/// assert_eq!(words("userName"), vec!["user", "Name"]);
/// assert_eq!(words("--a__b-"), vec!["a", "b"]);
/// ```
pub fn words(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for part in s.split(['_', '-']) {
        let bytes = part.as_bytes();
        let mut start = 0;
        for i in 1..bytes.len() {
            let prev = bytes[i - 1];
            let cur = bytes[i];
            if (prev.is_ascii_lowercase() || prev.is_ascii_digit()) && cur.is_ascii_uppercase() {
                out.push(&part[start..i]);
                start = i;
            }
        }
        if start < part.len() {
            out.push(&part[start..]);
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Convert to PascalCase (`user_name` -> `UserName`)
///
/// # Examples
/// ```
/// use tablegen::naming::to_pascal;
/// assert_eq!(to_pascal("user_name"), "UserName");
/// assert_eq!(to_pascal("user-role"), "UserRole");
/// assert_eq!(to_pascal(""), "");
/// ```
pub fn to_pascal(s: &str) -> String {
    words(s).into_iter().map(capitalize).collect()
}

/// Convert to camelCase (`user_name` -> `userName`)
///
/// # Examples
/// ```
/// use tablegen::naming::to_camel;
/// assert_eq!(to_camel("user_name"), "userName");
/// assert_eq!(to_camel("UserName"), "userName");
/// ```
pub fn to_camel(s: &str) -> String {
    let pascal = to_pascal(s);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(c) => c.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Convert to snake_case (`UserName` -> `user_name`)
///
/// # Examples
/// ```
/// use tablegen::naming::to_snake;
/// assert_eq!(to_snake("UserName"), "user_name");
/// assert_eq!(to_snake("user-role"), "user_role");
/// ```
pub fn to_snake(s: &str) -> String {
    join_lower(s, "_")
}

/// Convert to kebab-case (`UserName` -> `user-name`)
///
/// # Examples
/// ```
/// use tablegen::naming::to_kebab;
/// assert_eq!(to_kebab("UserRole"), "user-role");
/// assert_eq!(to_kebab("user_role"), "user-role");
/// ```
pub fn to_kebab(s: &str) -> String {
    join_lower(s, "-")
}

fn join_lower(s: &str, sep: &str) -> String {
    words(s)
        .into_iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(sep)
}
