use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of inputs the heart failure classifier was trained on.
pub const FEATURE_COUNT: usize = 12;

/// Clinical input fields, declared in the order the trained model expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Age,
    Anaemia,
    CreatininePhosphokinase,
    Diabetes,
    EjectionFraction,
    HighBloodPressure,
    Platelets,
    SerumCreatinine,
    SerumSodium,
    Sex,
    Smoking,
    Time,
}

/// What a field accepts on the form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Finite number in `[min, max]`.
    Numeric { min: f64, max: f64 },
    /// One of two categorical strings, encoded as 0 and 1 in that order.
    Choice([&'static str; 2]),
}

impl Field {
    pub const ALL: [Field; FEATURE_COUNT] = [
        Field::Age,
        Field::Anaemia,
        Field::CreatininePhosphokinase,
        Field::Diabetes,
        Field::EjectionFraction,
        Field::HighBloodPressure,
        Field::Platelets,
        Field::SerumCreatinine,
        Field::SerumSodium,
        Field::Sex,
        Field::Smoking,
        Field::Time,
    ];

    /// Position in the feature vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Form and CSV key; matches the clinical records dataset columns.
    pub fn key(self) -> &'static str {
        match self {
            Field::Age => "age",
            Field::Anaemia => "anaemia",
            Field::CreatininePhosphokinase => "creatinine_phosphokinase",
            Field::Diabetes => "diabetes",
            Field::EjectionFraction => "ejection_fraction",
            Field::HighBloodPressure => "high_blood_pressure",
            Field::Platelets => "platelets",
            Field::SerumCreatinine => "serum_creatinine",
            Field::SerumSodium => "serum_sodium",
            Field::Sex => "sex",
            Field::Smoking => "smoking",
            Field::Time => "time",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Field::Age => "Age",
            Field::Anaemia => "Anaemia",
            Field::CreatininePhosphokinase => "Creatinine Phosphokinase",
            Field::Diabetes => "Diabetes",
            Field::EjectionFraction => "Ejection Fraction",
            Field::HighBloodPressure => "High Blood Pressure",
            Field::Platelets => "Platelets",
            Field::SerumCreatinine => "Serum Creatinine",
            Field::SerumSodium => "Serum Sodium",
            Field::Sex => "Sex",
            Field::Smoking => "Smoking",
            Field::Time => "Time",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Age => FieldKind::Numeric {
                min: 0.0,
                max: 120.0,
            },
            Field::EjectionFraction => FieldKind::Numeric {
                min: 0.0,
                max: 100.0,
            },
            Field::Anaemia | Field::Diabetes | Field::HighBloodPressure | Field::Smoking => {
                FieldKind::Choice(Flag::CHOICES)
            }
            Field::Sex => FieldKind::Choice(Sex::CHOICES),
            Field::CreatininePhosphokinase
            | Field::Platelets
            | Field::SerumCreatinine
            | Field::SerumSodium
            | Field::Time => FieldKind::Numeric {
                min: 0.0,
                max: f64::INFINITY,
            },
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Two-valued categorical input whose model encoding is exactly 0 or 1.
pub trait BinaryChoice: Sized + Copy {
    /// Form strings for the 0 and 1 encodings, in that order.
    const CHOICES: [&'static str; 2];

    fn from_bit(bit: bool) -> Self;

    fn bit(self) -> bool;

    fn from_choice(value: &str) -> Option<Self> {
        Self::CHOICES
            .iter()
            .position(|choice| *choice == value)
            .map(|idx| Self::from_bit(idx == 1))
    }

    fn from_encoded(value: f64) -> Option<Self> {
        if value == 0.0 {
            Some(Self::from_bit(false))
        } else if value == 1.0 {
            Some(Self::from_bit(true))
        } else {
            None
        }
    }

    fn encode(self) -> f64 {
        if self.bit() {
            1.0
        } else {
            0.0
        }
    }

    fn choice(self) -> &'static str {
        Self::CHOICES[usize::from(self.bit())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    No,
    Yes,
}

impl BinaryChoice for Flag {
    const CHOICES: [&'static str; 2] = ["No", "Yes"];

    fn from_bit(bit: bool) -> Self {
        if bit {
            Flag::Yes
        } else {
            Flag::No
        }
    }

    fn bit(self) -> bool {
        self == Flag::Yes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

impl BinaryChoice for Sex {
    const CHOICES: [&'static str; 2] = ["Female", "Male"];

    fn from_bit(bit: bool) -> Self {
        if bit {
            Sex::Male
        } else {
            Sex::Female
        }
    }

    fn bit(self) -> bool {
        self == Sex::Male
    }
}

/// One patient's validated measurements.
///
/// Only constructed through [`validate`](crate::validate) or
/// [`validate_encoded`](crate::validate_encoded), so every value is within its
/// field's bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalRecord {
    pub(crate) age: f64,
    pub(crate) anaemia: Flag,
    pub(crate) creatinine_phosphokinase: f64,
    pub(crate) diabetes: Flag,
    pub(crate) ejection_fraction: f64,
    pub(crate) high_blood_pressure: Flag,
    pub(crate) platelets: f64,
    pub(crate) serum_creatinine: f64,
    pub(crate) serum_sodium: f64,
    pub(crate) sex: Sex,
    pub(crate) smoking: Flag,
    pub(crate) time: f64,
}

impl ClinicalRecord {
    /// Model encoding of a single field.
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Age => self.age,
            Field::Anaemia => self.anaemia.encode(),
            Field::CreatininePhosphokinase => self.creatinine_phosphokinase,
            Field::Diabetes => self.diabetes.encode(),
            Field::EjectionFraction => self.ejection_fraction,
            Field::HighBloodPressure => self.high_blood_pressure.encode(),
            Field::Platelets => self.platelets,
            Field::SerumCreatinine => self.serum_creatinine,
            Field::SerumSodium => self.serum_sodium,
            Field::Sex => self.sex.encode(),
            Field::Smoking => self.smoking.encode(),
            Field::Time => self.time,
        }
    }

    /// Form string for a categorical field, `None` for numeric ones.
    pub fn choice(&self, field: Field) -> Option<&'static str> {
        match field {
            Field::Anaemia => Some(self.anaemia.choice()),
            Field::Diabetes => Some(self.diabetes.choice()),
            Field::HighBloodPressure => Some(self.high_blood_pressure.choice()),
            Field::Sex => Some(self.sex.choice()),
            Field::Smoking => Some(self.smoking.choice()),
            _ => None,
        }
    }
}

/// Model input: the twelve record values in [`Field::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, field: Field) -> f64 {
        self.0[field.index()]
    }

    pub fn into_inner(self) -> [f64; FEATURE_COUNT] {
        self.0
    }
}

impl From<&ClinicalRecord> for FeatureVector {
    fn from(record: &ClinicalRecord) -> Self {
        FeatureVector(Field::ALL.map(|field| record.value(field)))
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Alive,
    Death,
}

impl Outcome {
    pub const ALL: [Outcome; 2] = [Outcome::Alive, Outcome::Death];

    pub fn from_class(class: usize) -> Option<Self> {
        match class {
            0 => Some(Outcome::Alive),
            1 => Some(Outcome::Death),
            _ => None,
        }
    }

    pub fn class(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Alive => "alive",
            Outcome::Death => "death",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Outcome::Alive => "green",
            Outcome::Death => "red",
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            Outcome::Alive => "Patient predicted to survive",
            Outcome::Death => "Patient predicted to die",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub outcome: Outcome,
    pub class: usize,
    pub label: &'static str,
    pub color: &'static str,
    /// Share of the leaf's training samples that belong to `outcome`.
    pub confidence: f64,
    pub leaf: usize,
    pub distribution: Vec<f64>,
}

impl PredictionResult {
    pub fn new(outcome: Outcome, leaf: usize, distribution: &[f64]) -> Self {
        let total: f64 = distribution.iter().sum();
        let confidence = if total > 0.0 {
            distribution.get(outcome.class()).copied().unwrap_or(0.0) / total
        } else {
            0.0
        };

        Self {
            outcome,
            class: outcome.class(),
            label: outcome.label(),
            color: outcome.color(),
            confidence,
            leaf,
            distribution: distribution.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_declared_in_model_order() {
        let keys: Vec<&str> = Field::ALL.iter().map(|field| field.key()).collect();
        assert_eq!(
            keys,
            vec![
                "age",
                "anaemia",
                "creatinine_phosphokinase",
                "diabetes",
                "ejection_fraction",
                "high_blood_pressure",
                "platelets",
                "serum_creatinine",
                "serum_sodium",
                "sex",
                "smoking",
                "time",
            ]
        );
        for (idx, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.index(), idx);
        }
    }

    #[test]
    fn binary_choices_encode_to_zero_and_one() {
        assert_eq!(Flag::from_choice("No"), Some(Flag::No));
        assert_eq!(Flag::from_choice("Yes"), Some(Flag::Yes));
        assert_eq!(Flag::from_choice("yes"), None);
        assert_eq!(Sex::from_choice("Male").map(Sex::encode), Some(1.0));
        assert_eq!(Sex::from_choice("Female").map(Sex::encode), Some(0.0));
        assert_eq!(Flag::from_encoded(1.0), Some(Flag::Yes));
        assert_eq!(Flag::from_encoded(0.5), None);
        assert_eq!(Sex::Male.choice(), "Male");
    }

    #[test]
    fn outcome_mapping_is_fixed() {
        assert_eq!(Outcome::from_class(0), Some(Outcome::Alive));
        assert_eq!(Outcome::from_class(1), Some(Outcome::Death));
        assert_eq!(Outcome::from_class(2), None);
        assert_eq!((Outcome::Alive.label(), Outcome::Alive.color()), ("alive", "green"));
        assert_eq!((Outcome::Death.label(), Outcome::Death.color()), ("death", "red"));
    }

    #[test]
    fn prediction_confidence_uses_leaf_distribution() {
        let result = PredictionResult::new(Outcome::Death, 3, &[26.0, 37.0]);
        assert_eq!(result.class, 1);
        assert_eq!(result.label, "death");
        assert_eq!(result.color, "red");
        assert!((result.confidence - 37.0 / 63.0).abs() < 1e-12);
    }
}
