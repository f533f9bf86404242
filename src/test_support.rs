use crate::tree::DecisionTreeModel;
use crate::validate::RawRecord;

pub const SAMPLE_TREE_JSON: &str = include_str!("../assets/sample_tree.json");

pub fn sample_model() -> DecisionTreeModel {
    DecisionTreeModel::from_json(SAMPLE_TREE_JSON).expect("sample tree is valid")
}

/// Form input for a 50 year old male with unremarkable labs.
pub fn scenario_form() -> RawRecord {
    [
        ("age", "50"),
        ("anaemia", "No"),
        ("creatinine_phosphokinase", "100"),
        ("diabetes", "No"),
        ("ejection_fraction", "50"),
        ("high_blood_pressure", "No"),
        ("platelets", "200000.0"),
        ("serum_creatinine", "1.0"),
        ("serum_sodium", "140"),
        ("sex", "Male"),
        ("smoking", "No"),
        ("time", "30"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}
