//! Request and response schema of the prediction service.

use serde::{Deserialize, Serialize};

/// Names of the housing features a prediction request carries, in schema order.
pub const FEATURE_NAMES: [&str; 18] = [
    "bedrooms",
    "bathrooms",
    "sqft_living",
    "sqft_lot",
    "floors",
    "waterfront",
    "view",
    "condition",
    "grade",
    "sqft_above",
    "sqft_basement",
    "yr_built",
    "yr_renovated",
    "zipcode",
    "lat",
    "long",
    "sqft_living15",
    "sqft_lot15",
];

/// One house to price. Every field is required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HouseFeatures {
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub sqft_living: f64,
    pub sqft_lot: f64,
    pub floors: f64,
    pub waterfront: f64,
    pub view: f64,
    pub condition: f64,
    pub grade: f64,
    pub sqft_above: f64,
    pub sqft_basement: f64,
    pub yr_built: f64,
    pub yr_renovated: f64,
    pub zipcode: f64,
    pub lat: f64,
    pub long: f64,
    pub sqft_living15: f64,
    pub sqft_lot15: f64,
}

/// A feature value outside its accepted range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct FeatureViolation {
    pub field: &'static str,
    pub reason: String,
}

impl HouseFeatures {
    /// `(name, value)` pairs in [`FEATURE_NAMES`] order.
    pub fn values(&self) -> [(&'static str, f64); 18] {
        [
            ("bedrooms", self.bedrooms),
            ("bathrooms", self.bathrooms),
            ("sqft_living", self.sqft_living),
            ("sqft_lot", self.sqft_lot),
            ("floors", self.floors),
            ("waterfront", self.waterfront),
            ("view", self.view),
            ("condition", self.condition),
            ("grade", self.grade),
            ("sqft_above", self.sqft_above),
            ("sqft_basement", self.sqft_basement),
            ("yr_built", self.yr_built),
            ("yr_renovated", self.yr_renovated),
            ("zipcode", self.zipcode),
            ("lat", self.lat),
            ("long", self.long),
            ("sqft_living15", self.sqft_living15),
            ("sqft_lot15", self.sqft_lot15),
        ]
    }

    /// Look up a feature by column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values()
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    /// Check every field is finite and inside its plausible range.
    ///
    /// Returns all violations rather than stopping at the first one.
    pub fn validate(&self) -> Vec<FeatureViolation> {
        let mut violations = Vec::new();
        for (field, value) in self.values() {
            if !value.is_finite() {
                violations.push(FeatureViolation {
                    field,
                    reason: "must be a finite number".to_string(),
                });
                continue;
            }
            if let Some((lo, hi)) = bounds(field) {
                if value < lo || value > hi {
                    violations.push(FeatureViolation {
                        field,
                        reason: format!("{value} outside [{lo}, {hi}]"),
                    });
                }
            }
        }
        violations
    }
}

fn bounds(field: &str) -> Option<(f64, f64)> {
    let range = match field {
        "bedrooms" | "bathrooms" | "floors" => (0.0, 50.0),
        "sqft_living" | "sqft_lot" | "sqft_above" | "sqft_basement" | "sqft_living15"
        | "sqft_lot15" => (0.0, f64::MAX),
        "waterfront" => (0.0, 1.0),
        "view" => (0.0, 4.0),
        "condition" => (1.0, 5.0),
        "grade" => (1.0, 13.0),
        "yr_built" => (1800.0, 2100.0),
        "yr_renovated" => (0.0, 2100.0),
        "zipcode" => (0.0, 99_999.0),
        "lat" => (-90.0, 90.0),
        "long" => (-180.0, 180.0),
        _ => return None,
    };
    Some(range)
}

/// Response of `/predict` and each element of `/batch-predict`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub predicted_price: f64,
    pub model_version: String,
}

#[cfg(test)]
pub(crate) fn sample_house() -> HouseFeatures {
    HouseFeatures {
        bedrooms: 3.0,
        bathrooms: 2.0,
        sqft_living: 1500.0,
        sqft_lot: 5000.0,
        floors: 1.0,
        waterfront: 0.0,
        view: 0.0,
        condition: 3.0,
        grade: 7.0,
        sqft_above: 1500.0,
        sqft_basement: 0.0,
        yr_built: 1990.0,
        yr_renovated: 0.0,
        zipcode: 98001.0,
        lat: 47.3,
        long: -122.2,
        sqft_living15: 1500.0,
        sqft_lot15: 5000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_follow_feature_name_order() {
        let house = sample_house();
        let names: Vec<&str> = house.values().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, FEATURE_NAMES);
        assert_eq!(house.get("zipcode"), Some(98001.0));
        assert_eq!(house.get("price"), None);
    }

    #[test]
    fn sample_house_is_valid() {
        assert!(sample_house().validate().is_empty());
    }

    #[test]
    fn out_of_range_fields_are_all_reported() {
        let mut house = sample_house();
        house.waterfront = 2.0;
        house.lat = 123.0;
        house.bedrooms = f64::NAN;
        let fields: Vec<&str> = house.validate().iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["bedrooms", "waterfront", "lat"]);
    }

    #[test]
    fn missing_field_fails_to_deserialize() {
        let mut json = serde_json::to_value(sample_house()).unwrap();
        json.as_object_mut().unwrap().remove("bedrooms");
        assert!(serde_json::from_value::<HouseFeatures>(json).is_err());
    }
}
