use crate::instruction::{FillInstruction, FillMethod};
use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    Personal,
    Academic,
    Essays,
}

/// Patterns for one semantic profile field, most specific first.
#[derive(Debug)]
pub struct FieldSpec {
    pub field: &'static str,
    pub patterns: &'static [&'static str],
}

const PERSONAL: &[FieldSpec] = &[
    FieldSpec { field: "firstName", patterns: &["first_name", "firstname", "fname", "given_name", "first-name", "applicant_first_name"] },
    FieldSpec { field: "lastName", patterns: &["last_name", "lastname", "lname", "family_name", "last-name", "applicant_last_name"] },
    FieldSpec { field: "fullName", patterns: &["full_name", "fullname", "applicant_name", "student_name", "legal_name"] },
    FieldSpec { field: "email", patterns: &["email", "email_address", "e-mail", "e_mail", "applicant_email", "student_email"] },
    FieldSpec { field: "phone", patterns: &["phone", "telephone", "phone_number", "mobile", "cell", "contact_number"] },
    FieldSpec { field: "dateOfBirth", patterns: &["dob", "date_of_birth", "birth_date", "birthday", "birthdate"] },
    FieldSpec { field: "citizenship", patterns: &["citizenship", "citizenship_status", "citizen", "residency_status"] },
    FieldSpec { field: "gender", patterns: &["gender", "sex", "gender_identity"] },
    FieldSpec { field: "address", patterns: &["address", "street_address", "street", "address1", "address_1"] },
    FieldSpec { field: "city", patterns: &["city", "town", "municipality"] },
    FieldSpec { field: "state", patterns: &["state", "province", "region"] },
    FieldSpec { field: "zipCode", patterns: &["zip", "zipcode", "zip_code", "postal_code", "postcode"] },
    FieldSpec { field: "country", patterns: &["country", "country_of_residence", "home_country"] },
];

const ACADEMIC: &[FieldSpec] = &[
    FieldSpec { field: "schoolYear", patterns: &["school_year", "year_in_school", "current_year"] },
    FieldSpec { field: "school", patterns: &["school", "university", "college", "institution", "school_name", "current_school"] },
    FieldSpec { field: "gpa", patterns: &["gpa", "grade_point_average", "cumulative_gpa", "overall_gpa"] },
    FieldSpec { field: "major", patterns: &["major", "field_of_study", "program", "course", "intended_major"] },
    FieldSpec { field: "minor", patterns: &["minor", "intended_minor", "minor_field"] },
    FieldSpec { field: "gradeLevel", patterns: &["grade_level", "year", "class_year", "academic_year", "student_year"] },
    FieldSpec { field: "graduationYear", patterns: &["graduation_year", "grad_year", "graduation_date", "expected_graduation"] },
    FieldSpec { field: "satScore", patterns: &["sat", "sat_score", "sat_total", "sat_composite"] },
    FieldSpec { field: "actScore", patterns: &["act", "act_score", "act_composite"] },
];

const ESSAYS: &[FieldSpec] = &[
    FieldSpec { field: "careerGoals", patterns: &["career_goals", "goals", "future_plans", "career_essay", "professional_goals"] },
    FieldSpec { field: "whyDeserving", patterns: &["why_deserving", "deserve_scholarship", "why_you", "personal_statement"] },
    FieldSpec { field: "challenges", patterns: &["challenges", "obstacles", "overcome", "hardship", "adversity"] },
];

/// Static category table. Never mutated at runtime.
pub const FIELD_TABLE: [(FieldCategory, &[FieldSpec]); 3] = [
    (FieldCategory::Personal, PERSONAL),
    (FieldCategory::Academic, ACADEMIC),
    (FieldCategory::Essays, ESSAYS),
];

pub fn fields() -> impl Iterator<Item = (FieldCategory, &'static FieldSpec)> {
    FIELD_TABLE
        .iter()
        .flat_map(|(category, specs)| specs.iter().map(move |spec| (*category, spec)))
}

pub fn patterns_for(field: &str) -> Option<&'static [&'static str]> {
    fields()
        .find(|(_, spec)| spec.field == field)
        .map(|(_, spec)| spec.patterns)
}

/// One `type` instruction per table field the profile has a value for, in
/// table order. The orchestrator upgrades `type` to `select` on `<select>`s.
pub fn instructions_for(profile: &Profile) -> Vec<FillInstruction> {
    fields()
        .filter_map(|(_, spec)| {
            let value = profile.get(spec.field)?;
            Some(FillInstruction {
                field: Some(spec.field.to_string()),
                field_patterns: spec.patterns.iter().map(|p| p.to_string()).collect(),
                value: value.clone(),
                method: FillMethod::Type,
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileValue;

    #[test]
    fn test_every_field_is_unique_and_has_patterns() {
        let names: Vec<_> = fields().map(|(_, spec)| spec.field).collect();
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
        assert!(fields().all(|(_, spec)| !spec.patterns.is_empty()));
    }

    #[test]
    fn test_patterns_for() {
        assert_eq!(patterns_for("gpa").unwrap()[0], "gpa");
        assert!(patterns_for("favoriteColor").is_none());
    }

    #[test]
    fn test_instructions_follow_table_order_and_skip_unknown_fields() {
        let mut profile = Profile::new();
        profile.insert("gpa", 3.9);
        profile.insert("favoriteColor", "green");
        profile.insert("firstName", "Ada");
        profile.insert("careerGoals", "Build engines");
        profile.insert("minor", "Music");
        profile.insert("country", "United States");
        profile.insert("schoolYear", "Junior");
        profile.insert("gender", "Female");
        profile.insert("citizenship", "US Citizen");
        profile.insert("fullName", "Ada Lovelace");

        let plan = instructions_for(&profile);
        let fields: Vec<_> = plan.iter().map(|i| i.field.as_deref().unwrap()).collect();
        assert_eq!(
            fields,
            vec![
                "firstName",
                "fullName",
                "citizenship",
                "gender",
                "country",
                "schoolYear",
                "gpa",
                "minor",
                "careerGoals",
            ]
        );
        assert_eq!(plan[6].value, ProfileValue::from(3.9));
        assert!(plan.iter().all(|i| i.selector.is_none() && i.method == FillMethod::Type));
        assert_eq!(plan[0].field_patterns[0], "first_name");
        assert_eq!(plan[1].field_patterns[0], "full_name");
    }

    #[test]
    fn test_school_year_is_claimed_before_school() {
        let fields: Vec<_> = fields().map(|(_, spec)| spec.field).collect();
        let year = fields.iter().position(|f| *f == "schoolYear").unwrap();
        let school = fields.iter().position(|f| *f == "school").unwrap();
        assert!(year < school);
    }

    #[test]
    fn test_empty_profile_yields_no_instructions() {
        assert!(instructions_for(&Profile::new()).is_empty());
    }
}
