//! Shape check for edited `plan_data`.

use serde_json::Value;

use crate::error::FieldError;

/// Check that `data` is an object with a string `title`, a string
/// `description` and an array `schedule`. Every violation is reported.
/// Other keys are left alone.
pub fn validate_plan_data(data: &Value) -> Result<(), Vec<FieldError>> {
    let Some(object) = data.as_object() else {
        return Err(vec![FieldError::new("plan_data", "must be an object")]);
    };

    let mut violations = Vec::new();
    let mut expect = |field: &str, kind: &str, ok: fn(&Value) -> bool| match object.get(field) {
        None => violations.push(FieldError::new(field, "is required")),
        Some(v) if !ok(v) => violations.push(FieldError::new(field, format!("must be {kind}"))),
        Some(_) => {}
    };
    expect("title", "a string", Value::is_string);
    expect("description", "a string", Value::is_string);
    expect("schedule", "an array", Value::is_array);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
