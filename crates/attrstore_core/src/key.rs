use crate::{AttrError, AttrResult};

/// Separator between owner and property in a synthesized key. Chosen to be
/// unlikely in real identifiers; owners and properties must never contain it.
pub const FIELD_SEP: &str = "¤";

pub fn validate_owner(owner: &str) -> AttrResult<()> {
    if owner.contains(FIELD_SEP) {
        return Err(AttrError::validation(format!(
            "owner can not contain {FIELD_SEP}"
        )));
    }
    Ok(())
}

pub fn validate_property(property: &str) -> AttrResult<()> {
    if property.contains(FIELD_SEP) {
        return Err(AttrError::validation(format!(
            "property can not contain {FIELD_SEP}"
        )));
    }
    Ok(())
}

/// Joins owner and property without validation. Only for callers that already
/// checked both parts or that trust their input (bulk loading).
pub fn attribute_key(owner: &str, property: &str) -> String {
    let mut key = String::with_capacity(owner.len() + FIELD_SEP.len() + property.len());
    key.push_str(owner);
    key.push_str(FIELD_SEP);
    key.push_str(property);
    key
}

pub fn checked_attribute_key(owner: &str, property: &str) -> AttrResult<String> {
    validate_owner(owner)?;
    validate_property(property)?;
    Ok(attribute_key(owner, property))
}

/// Splits a synthesized key back into owner and property. Keys with zero or
/// several separators were not produced by the checked path and yield `None`.
pub fn split_attribute_key(key: &str) -> Option<(&str, &str)> {
    let (owner, property) = key.split_once(FIELD_SEP)?;
    if property.contains(FIELD_SEP) {
        return None;
    }
    Some((owner, property))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizes_and_splits() {
        let key = attribute_key("bob", "email");
        assert_eq!(key, "bob¤email");
        assert_eq!(split_attribute_key(&key), Some(("bob", "email")));
    }

    #[test]
    fn empty_parts_are_allowed() {
        let key = checked_attribute_key("", "").expect("key");
        assert_eq!(split_attribute_key(&key), Some(("", "")));
    }

    #[test]
    fn rejects_separator_in_owner_or_property() {
        let err = checked_attribute_key("bo¤b", "email").expect_err("owner");
        assert!(matches!(err, AttrError::Validation { .. }));
        let err = checked_attribute_key("bob", "e¤mail").expect_err("property");
        assert!(matches!(err, AttrError::Validation { .. }));
    }

    #[test]
    fn split_rejects_ambiguous_keys() {
        assert_eq!(split_attribute_key("plain"), None);
        assert_eq!(split_attribute_key("a¤b¤c"), None);
    }

    #[test]
    fn checked_keys_are_injective() {
        let pairs = [("ab", "c"), ("a", "bc"), ("abc", ""), ("", "abc")];
        let keys: std::collections::HashSet<String> = pairs
            .iter()
            .map(|(owner, property)| checked_attribute_key(owner, property).expect("key"))
            .collect();
        assert_eq!(keys.len(), pairs.len());
    }
}
