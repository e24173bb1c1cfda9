use anyhow::{Result, bail};

use crate::meta::ObjectKey;

/// Validate both halves of an entity key against DNS-1123 label rules.
pub fn validate_key(key: &ObjectKey) -> Result<()> {
    validate_label("namespace", &key.namespace)?;
    validate_label("name", &key.name)
}

/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
fn validate_label(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{} must not be empty", field);
    }
    if value.len() > 63 {
        bail!("{} '{}' is longer than 63 characters", field, value);
    }
    if value.starts_with('-') || value.ends_with('-') {
        bail!("{} '{}' must start and end with an alphanumeric character", field, value);
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        bail!("{} '{}' contains invalid character {:?}", field, value, bad);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys() {
        assert!(validate_key(&ObjectKey::new("workspace-os", "ubuntu-22")).is_ok());
        assert!(validate_key(&ObjectKey::new("tenant-alice", "a")).is_ok());
    }

    #[test]
    fn invalid_keys() {
        assert!(validate_key(&ObjectKey::new("", "ubuntu")).is_err());
        assert!(validate_key(&ObjectKey::new("ws", "Ubuntu")).is_err());
        assert!(validate_key(&ObjectKey::new("ws", "my_vm")).is_err());
        assert!(validate_key(&ObjectKey::new("-ws", "vm")).is_err());
        assert!(validate_key(&ObjectKey::new("ws", "vm-")).is_err());
        assert!(validate_key(&ObjectKey::new("ws", &"v".repeat(64))).is_err());
    }

    #[test]
    fn error_names_the_field() {
        let err = validate_key(&ObjectKey::new("ws", "bad!")).unwrap_err();
        assert!(err.to_string().starts_with("name 'bad!'"));
    }
}
