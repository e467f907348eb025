use std::borrow::Cow;

use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{AvatarRequest, Field, FieldErrors, SelectOption, CUSTOMER_TYPES, FACE_SHAPES, GENDERS};

/// Runs the rules declared on [`AvatarRequest`] and returns it untouched, or one message per failing field.
///
/// Accepted values are exactly what ends up in the prompt, so nothing is trimmed or re-cased here.
pub fn validate(request: &AvatarRequest) -> Result<AvatarRequest, FieldErrors> {
    request.validate().map(|_| request.clone()).map_err(|e| field_errors(&e))
}

// The length rule wins when a field breaks more than one.
fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    for (name, errs) in errors.field_errors() {
        let Some(field) = Field::from_name(&name) else { continue };
        let chosen = errs.iter().find(|e| e.code == "length").or_else(|| errs.first());
        if let Some(message) = chosen.and_then(|e| e.message.as_ref()) {
            out.insert(field, message.to_string());
        }
    }
    out
}

fn one_of(value: &str, options: &[SelectOption], code: &'static str) -> Result<(), ValidationError> {
    if options.iter().any(|o| o.value == value) {
        Ok(())
    } else {
        Err(ValidationError::new(code))
    }
}

pub fn face_shape_option(value: &str) -> Result<(), ValidationError> {
    one_of(value, FACE_SHAPES, "face_shape")
}

pub fn gender_option(value: &str) -> Result<(), ValidationError> {
    one_of(value, GENDERS, "gender")
}

pub fn customer_type_option(value: &str) -> Result<(), ValidationError> {
    one_of(value, CUSTOMER_TYPES, "customer_type")
}

// Finite, non-negative, decimals allowed. Surrounding whitespace is rejected so the prompt gets the literal value.
pub fn numeric_age(value: &str) -> Result<(), ValidationError> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok(()),
        _ => {
            let mut err = ValidationError::new("numeric");
            err.add_param(Cow::Borrowed("value"), &value);
            Err(err)
        }
    }
}
