//! Well-known role names. The namespace is open: any non-empty name up to
//! `MAX_ROLE_LEN` characters can be granted, these are just the ones the
//! built-in policies check for.

pub const ADMIN: &str = "admin";
pub const MODERATOR: &str = "moderator";
pub const USER: &str = "user";

/// Role assigned to a subject created without any roles.
pub const DEFAULT_ROLE: &str = USER;

/// Matches the width of the `user_role.role` column.
pub const MAX_ROLE_LEN: usize = 64;

/// Canonical form used for storage and comparison.
pub fn normalize_role(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalizes `raw` and returns the reason it cannot be stored, if any.
pub fn parse_role(raw: &str) -> Result<String, &'static str> {
    let role = normalize_role(raw);
    if role.is_empty() {
        return Err("is required");
    }
    if role.chars().count() > MAX_ROLE_LEN {
        return Err("must be at most 64 characters");
    }
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_role("  Admin "), "admin");
        assert_eq!(normalize_role("MODERATOR"), MODERATOR);
        assert_eq!(normalize_role("   "), "");
    }

    #[test]
    fn parse_rejects_blank_and_overlong_names() {
        assert_eq!(parse_role(" Moderator "), Ok(MODERATOR.to_string()));
        assert_eq!(parse_role("  "), Err("is required"));
        assert!(parse_role(&"r".repeat(MAX_ROLE_LEN)).is_ok());
        assert!(parse_role(&"r".repeat(MAX_ROLE_LEN + 1)).is_err());
    }
}
