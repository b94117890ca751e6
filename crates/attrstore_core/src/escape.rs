//! Identifier hygiene.
//!
//! Owners, properties and values only ever travel as bound parameters. The
//! one piece of caller text that still ends up inside statement text is the
//! logical structure name, which becomes part of table and index
//! identifiers. Index names reach the statement text unquoted, so logical
//! names are limited to ASCII letters, digits and `_`, not starting with a digit.

use crate::{AttrError, AttrResult};

/// PostgreSQL truncates identifiers beyond 63 bytes, the tightest limit of the
/// supported backends.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

pub fn table_name(logical: &str, suffix: &str) -> AttrResult<String> {
    if logical.trim().is_empty() {
        return Err(AttrError::validation("structure name can not be empty"));
    }
    if logical.starts_with(|ch: char| ch.is_ascii_digit()) {
        return Err(AttrError::validation(format!(
            "structure name {logical:?} can not start with a digit"
        )));
    }
    if let Some(bad) = logical
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
    {
        return Err(AttrError::validation(format!(
            "structure name {logical:?} contains {bad:?}; use ASCII letters, digits and _"
        )));
    }
    let table = format!("{logical}{suffix}");
    check_length(&table)?;
    Ok(table)
}

pub fn index_name(table: &str) -> AttrResult<String> {
    let name = format!("{table}_idx");
    check_length(&name)?;
    Ok(name)
}

fn check_length(identifier: &str) -> AttrResult<()> {
    if identifier.len() > MAX_IDENTIFIER_BYTES {
        return Err(AttrError::validation(format!(
            "identifier '{identifier}' exceeds {MAX_IDENTIFIER_BYTES} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_suffix() {
        assert_eq!(
            table_name("users", "_properties").expect("name"),
            "users_properties"
        );
    }

    #[test]
    fn accepts_identifier_alphabet() {
        assert_eq!(table_name("Users_2", "_kv").expect("name"), "Users_2_kv");
        assert_eq!(table_name("_tmp2024", "_set").expect("name"), "_tmp2024_set");
    }

    #[test]
    fn rejects_bad_names() {
        for bad in [
            "",
            "  ",
            "nul\0name",
            "sep¤name",
            "a\"b",
            "o'hara",
            "back`tick",
            "with space",
            "dash-name",
            "dot.name",
            "ünïcødé",
            "2024",
        ] {
            let err = table_name(bad, "_kv").expect_err(bad);
            assert!(matches!(err, AttrError::Validation { .. }));
        }
    }

    #[test]
    fn rejects_overlong_identifiers() {
        let long = "x".repeat(MAX_IDENTIFIER_BYTES);
        assert!(table_name(&long, "").is_ok());
        assert!(table_name(&long, "_kv").is_err());
        assert!(index_name(&long).is_err());
        assert_eq!(index_name("users_kv").expect("index"), "users_kv_idx");
    }
}
