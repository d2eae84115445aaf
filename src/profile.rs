use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FillError;

/// A single primitive profile value as it arrives from the profile store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl ProfileValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, ProfileValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for ProfileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileValue::Text(s) => f.write_str(s),
            ProfileValue::Number(n) => write!(f, "{}", n),
            ProfileValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

impl Default for ProfileValue {
    fn default() -> Self {
        ProfileValue::Text(String::new())
    }
}

impl From<&str> for ProfileValue {
    fn from(value: &str) -> Self {
        ProfileValue::Text(value.to_string())
    }
}

impl From<String> for ProfileValue {
    fn from(value: String) -> Self {
        ProfileValue::Text(value)
    }
}

impl From<f64> for ProfileValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(ProfileValue::Number)
            .unwrap_or_else(|| ProfileValue::Text(value.to_string()))
    }
}

impl From<bool> for ProfileValue {
    fn from(value: bool) -> Self {
        ProfileValue::Flag(value)
    }
}

impl From<i64> for ProfileValue {
    fn from(value: i64) -> Self {
        ProfileValue::Number(value.into())
    }
}

/// Nested profile-store keys lifted onto flat semantic names.
const NESTED_ALIASES: [(&str, &[&str]); 8] = [
    ("citizenship", &["citizenshipStatus"]),
    ("address", &["address", "street"]),
    ("city", &["address", "city"]),
    ("state", &["address", "state"]),
    ("zipCode", &["address", "zipCode"]),
    ("country", &["address", "country"]),
    ("satScore", &["testScores", "sat", "total"]),
    ("actScore", &["testScores", "act", "composite"]),
];

/// Country assumed for a stored address that names none.
const DEFAULT_COUNTRY: &str = "United States";

/// Flat mapping from semantic field name to value. Immutable for the length
/// of a fill pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(BTreeMap<String, ProfileValue>);

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a profile from JSON, accepting both the flat shape and the
    /// nested shape the profile store persists.
    pub fn from_json(json: &str) -> Result<Self, FillError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| FillError::Profile(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self::from_object(&map)),
            other => Err(FillError::Profile(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_object(map: &Map<String, Value>) -> Self {
        let mut fields = BTreeMap::new();
        for (key, value) in map {
            if let Some(primitive) = primitive(value) {
                fields.insert(key.clone(), primitive);
            }
        }
        for (flat, path) in NESTED_ALIASES {
            if fields.contains_key(flat) {
                continue;
            }
            if let Some(primitive) = lookup(map, path).and_then(primitive) {
                fields.insert(flat.to_string(), primitive);
            }
        }
        if map.get("address").is_some_and(Value::is_object) && !fields.contains_key("country") {
            fields.insert("country".to_string(), ProfileValue::from(DEFAULT_COUNTRY));
        }
        if !fields.contains_key("fullName") {
            if let (Some(first), Some(last)) = (fields.get("firstName"), fields.get("lastName")) {
                let full = format!("{} {}", first, last);
                fields.insert("fullName".to_string(), ProfileValue::Text(full));
            }
        }
        Profile(fields)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<ProfileValue>) {
        let value = value.into();
        if !value.is_blank() {
            self.0.insert(field.into(), value);
        }
    }

    pub fn get(&self, field: &str) -> Option<&ProfileValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ProfileValue>> FromIterator<(K, V)> for Profile {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut profile = Profile::new();
        for (k, v) in iter {
            profile.insert(k, v);
        }
        profile
    }
}

fn primitive(value: &Value) -> Option<ProfileValue> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(ProfileValue::Text(s.clone())),
        Value::Number(n) => Some(ProfileValue::Number(n.clone())),
        Value::Bool(b) => Some(ProfileValue::Flag(*b)),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(primitive)
                .map(|v| v.to_string())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(ProfileValue::Text(parts.join(", ")))
            }
        }
        _ => None,
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_render_like_the_browser() {
        let profile = Profile::from_json(r#"{"gpa": 3.9, "satScore": 1450}"#).unwrap();
        assert_eq!(profile.get("gpa").unwrap().to_string(), "3.9");
        assert_eq!(profile.get("satScore").unwrap().to_string(), "1450");
    }

    #[test]
    fn test_nested_store_shape_is_flattened() {
        let json = r#"{
            "firstName": "Ada",
            "lastName": "Lovelace",
            "citizenshipStatus": "US Citizen",
            "schoolYear": "Junior",
            "minor": "Music",
            "gender": "Female",
            "address": {"street": "12 Analytical Way", "city": "London", "zipCode": "02139"},
            "testScores": {"sat": {"total": 1520, "math": 800}, "act": {"composite": 35}},
            "ethnicity": ["A", "B"],
            "middleName": "",
            "notes": null
        }"#;
        let profile = Profile::from_json(json).unwrap();
        assert_eq!(profile.get("address").unwrap().to_string(), "12 Analytical Way");
        assert_eq!(profile.get("city").unwrap().to_string(), "London");
        assert_eq!(profile.get("zipCode").unwrap().to_string(), "02139");
        assert_eq!(profile.get("satScore").unwrap().to_string(), "1520");
        assert_eq!(profile.get("actScore").unwrap().to_string(), "35");
        assert_eq!(profile.get("ethnicity").unwrap().to_string(), "A, B");
        assert!(profile.get("middleName").is_none());
        assert!(profile.get("notes").is_none());
        assert!(profile.get("state").is_none());
        assert_eq!(profile.get("fullName").unwrap().to_string(), "Ada Lovelace");
        assert_eq!(profile.get("citizenship").unwrap().to_string(), "US Citizen");
        assert_eq!(profile.get("schoolYear").unwrap().to_string(), "Junior");
        assert_eq!(profile.get("minor").unwrap().to_string(), "Music");
        assert_eq!(profile.get("gender").unwrap().to_string(), "Female");
        assert_eq!(profile.get("country").unwrap().to_string(), "United States");
    }

    #[test]
    fn test_stored_country_and_full_name_are_kept() {
        let json = r#"{
            "firstName": "Ada",
            "lastName": "Lovelace",
            "fullName": "Augusta Ada King",
            "address": {"country": "United Kingdom"}
        }"#;
        let profile = Profile::from_json(json).unwrap();
        assert_eq!(profile.get("fullName").unwrap().to_string(), "Augusta Ada King");
        assert_eq!(profile.get("country").unwrap().to_string(), "United Kingdom");
    }

    #[test]
    fn test_no_address_means_no_country_and_one_name_means_no_full_name() {
        let profile = Profile::from_json(r#"{"firstName": "Ada"}"#).unwrap();
        assert!(profile.get("country").is_none());
        assert!(profile.get("fullName").is_none());
    }

    #[test]
    fn test_flat_key_wins_over_nested_alias() {
        let profile =
            Profile::from_json(r#"{"city": "Paris", "address": {"city": "London"}}"#).unwrap();
        assert_eq!(profile.get("city").unwrap().to_string(), "Paris");
    }

    #[test]
    fn test_non_object_profile_is_rejected() {
        let err = Profile::from_json("[1, 2]").unwrap_err();
        assert_eq!(err, FillError::Profile("expected a JSON object, got an array".to_string()));
        assert!(matches!(Profile::from_json("{"), Err(FillError::Profile(_))));
    }

    #[test]
    fn test_from_iter_skips_blank_values() {
        let profile: Profile = [("firstName", "Ada"), ("lastName", "  ")].into_iter().collect();
        assert_eq!(profile.len(), 1);
    }
}
