//! Stored records and the field merge used by upserts.

use serde_json::Value;

use crate::{Result, StoreError};

/// A stored row: a JSON object keyed by its natural key within a table.
pub type Record = Value;

/// Overwrites the fields of `target` with the fields present in `patch`.
///
/// Fields absent from `patch` are left untouched, so applying the same patch
/// twice yields the same record. Both values must be JSON objects.
pub fn merge_fields(table: &str, key: &str, target: &mut Record, patch: &Record) -> Result<()> {
    let not_a_record = || StoreError::NotARecord {
        table: table.to_string(),
        key: key.to_string(),
    };

    let patch = patch.as_object().ok_or_else(not_a_record)?;
    let target = target.as_object_mut().ok_or_else(not_a_record)?;

    for (field, value) in patch {
        target.insert(field.clone(), value.clone());
    }

    Ok(())
}

/// Ensures a value is a JSON object before it is stored.
pub(crate) fn ensure_record(table: &str, key: &str, record: &Record) -> Result<()> {
    if record.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotARecord {
            table: table.to_string(),
            key: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_only_listed_fields() {
        let mut record = json!({"build": "21A329", "name": "iOS 17", "major": 17});
        merge_fields("patches", "21A329", &mut record, &json!({"name": "iOS 17.0"})).unwrap();

        assert_eq!(
            record,
            json!({"build": "21A329", "name": "iOS 17.0", "major": 17})
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let patch = json!({"name": "iOS 17.0", "minor": 0});
        let mut once = json!({"build": "21A329", "name": "iOS 17"});
        merge_fields("patches", "21A329", &mut once, &patch).unwrap();

        let mut twice = once.clone();
        merge_fields("patches", "21A329", &mut twice, &patch).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn merge_rejects_non_objects() {
        let mut record = json!({"build": "21A329"});
        let result = merge_fields("patches", "21A329", &mut record, &json!([1, 2]));
        assert!(matches!(result, Err(StoreError::NotARecord { .. })));

        let mut scalar = json!(3);
        let result = merge_fields("patches", "21A329", &mut scalar, &json!({}));
        assert!(matches!(result, Err(StoreError::NotARecord { .. })));
    }
}
