use std::collections::HashMap;

use crate::error::{ValidationError, ValidationErrorKind};
use crate::models::{
    BinaryChoice, ClinicalRecord, FeatureVector, Field, FieldKind, Flag, Sex, FEATURE_COUNT,
};

/// Raw key to value mapping handed over by a form collector.
pub type RawRecord = HashMap<String, String>;

/// Validates form input where categorical fields hold their choice strings
/// (`"No"`/`"Yes"`, `"Female"`/`"Male"`).
///
/// Fields are checked in model order and the first violation is returned.
/// Keys that are not clinical fields are ignored.
pub fn validate(raw: &RawRecord) -> Result<ClinicalRecord, ValidationError> {
    let mut values = [0.0; FEATURE_COUNT];

    for field in Field::ALL {
        let value = lookup(raw, field)?;
        let encoded = match field.kind() {
            FieldKind::Choice(allowed) => parse_choice(field, value).ok_or_else(|| {
                ValidationError::new(
                    field,
                    ValidationErrorKind::InvalidChoice {
                        value: value.to_string(),
                        allowed,
                    },
                )
            })?,
            FieldKind::Numeric { .. } => parse_number(field, value)?,
        };
        check_encoded(field, encoded)?;
        values[field.index()] = encoded;
    }

    build(values)
}

/// Validates rows where every field, categorical ones included, is already
/// numeric. The clinical records dataset stores flags as 0/1.
pub fn validate_encoded(raw: &RawRecord) -> Result<ClinicalRecord, ValidationError> {
    let mut values = [0.0; FEATURE_COUNT];

    for field in Field::ALL {
        let value = parse_number(field, lookup(raw, field)?)?;
        check_encoded(field, value)?;
        values[field.index()] = value;
    }

    build(values)
}

/// Builds a record from model-encoded values, enforcing every field's bounds
/// in model order.
pub fn from_encoded(values: [f64; FEATURE_COUNT]) -> Result<ClinicalRecord, ValidationError> {
    for field in Field::ALL {
        check_encoded(field, values[field.index()])?;
    }

    build(values)
}

/// Assembles a record from values that already passed [`check_encoded`].
fn build(values: [f64; FEATURE_COUNT]) -> Result<ClinicalRecord, ValidationError> {
    let flag = |field: Field| encoded_choice::<Flag>(field, values[field.index()]);

    Ok(ClinicalRecord {
        age: values[Field::Age.index()],
        anaemia: flag(Field::Anaemia)?,
        creatinine_phosphokinase: values[Field::CreatininePhosphokinase.index()],
        diabetes: flag(Field::Diabetes)?,
        ejection_fraction: values[Field::EjectionFraction.index()],
        high_blood_pressure: flag(Field::HighBloodPressure)?,
        platelets: values[Field::Platelets.index()],
        serum_creatinine: values[Field::SerumCreatinine.index()],
        serum_sodium: values[Field::SerumSodium.index()],
        sex: encoded_choice::<Sex>(Field::Sex, values[Field::Sex.index()])?,
        smoking: flag(Field::Smoking)?,
        time: values[Field::Time.index()],
    })
}

/// Lays the record out in the fixed order the model was trained on.
pub fn to_vector(record: &ClinicalRecord) -> FeatureVector {
    FeatureVector::from(record)
}

fn lookup(raw: &RawRecord, field: Field) -> Result<&str, ValidationError> {
    raw.get(field.key())
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ValidationError::missing(field))
}

fn parse_number(field: Field, value: &str) -> Result<f64, ValidationError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| {
            ValidationError::new(
                field,
                ValidationErrorKind::NotANumber {
                    value: value.to_string(),
                },
            )
        })
}

fn parse_choice(field: Field, value: &str) -> Option<f64> {
    match field {
        Field::Sex => Sex::from_choice(value).map(Sex::encode),
        _ => Flag::from_choice(value).map(Flag::encode),
    }
}

/// Checks one model-encoded value: numeric bounds, or 0/1 for choices.
fn check_encoded(field: Field, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::NotANumber {
                value: value.to_string(),
            },
        ));
    }

    match field.kind() {
        FieldKind::Numeric { min, max } if !(min..=max).contains(&value) => Err(
            ValidationError::new(field, ValidationErrorKind::OutOfRange { value, min, max }),
        ),
        FieldKind::Choice(_) => encoded_choice::<Flag>(field, value).map(|_| ()),
        FieldKind::Numeric { .. } => Ok(()),
    }
}

fn encoded_choice<T: BinaryChoice>(field: Field, value: f64) -> Result<T, ValidationError> {
    T::from_encoded(value).ok_or_else(|| {
        ValidationError::new(
            field,
            ValidationErrorKind::InvalidChoice {
                value: value.to_string(),
                allowed: ["0", "1"],
            },
        )
    })
}
