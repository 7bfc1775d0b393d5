// server/src/models/setting.rs
//
// Setting model: a named, typed, categorized application configuration record.
// Values are JSON and must agree with the setting type and its validation string.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

string_enum!(
    SettingType {
        String => "string",
        Number => "number",
        Boolean => "boolean",
        Password => "password",
        Select => "select",
        Json => "json",
    }
);

string_enum!(
    SettingCategory {
        General => "general",
        Appointment => "appointment",
        Notification => "notification",
        Security => "security",
        Email => "email",
        Payment => "payment",
        System => "system",
    }
);

string_enum!(
    SettingStatus {
        Active => "active",
        Inactive => "inactive",
        Deprecated => "deprecated",
    }
);

// Settings read by business rules
pub const SETTING_SITE_NAME: &str = "site_name";
pub const SETTING_SLOT_MINUTES: &str = "appointment_slot_minutes";
pub const SETTING_MAX_ADVANCE_DAYS: &str = "max_advance_booking_days";
pub const SETTING_ALLOW_PATIENT_CANCELLATION: &str = "allow_patient_cancellation";
pub const SETTING_CANCELLATION_WINDOW_HOURS: &str = "cancellation_window_hours";

/// Placeholder returned in place of sensitive values
pub const MASKED_VALUE: &str = "********";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub id: String,
    pub name: String,
    pub value: Value,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    pub description: Option<String>,
    pub default_value: Option<Value>,
    pub validation: Option<String>,
    pub is_required: bool,
    pub is_encrypted: bool,
    pub tags: Vec<String>,
    pub status: SettingStatus,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Setting {
    pub fn is_sensitive(&self) -> bool {
        self.is_encrypted || self.setting_type == SettingType::Password
    }

    /// Copy suitable for API responses: sensitive values replaced by a placeholder
    pub fn masked(mut self) -> Self {
        if self.is_sensitive() {
            self.value = json!(MASKED_VALUE);
            if self.default_value.is_some() {
                self.default_value = Some(json!(MASKED_VALUE));
            }
        }
        self
    }

    /// Check a candidate value against this setting's type, validation and required flag
    pub fn check_value(&self, value: &Value) -> AppResult<()> {
        check_value(
            &self.name,
            self.setting_type,
            self.validation.as_deref(),
            self.is_required,
            value,
        )
    }
}

/// Setting names are lowercase identifiers: letters, digits, '_' and '.'
pub fn validate_setting_name(name: &str) -> AppResult<()> {
    let mut chars = name.chars();
    let valid_start = chars.next().map(|c| c.is_ascii_lowercase()).unwrap_or(false);
    let valid_rest = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    if valid_start && valid_rest && (2..=64).contains(&name.len()) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "setting name '{}' must be 2-64 characters of a-z, 0-9, '_' or '.', starting with a letter",
            name
        )))
    }
}

/// Check that a validation string makes sense for the type
pub fn validate_definition(setting_type: SettingType, validation: Option<&str>) -> AppResult<()> {
    match (setting_type, validation) {
        (SettingType::Select, None) => Err(AppError::validation(
            "select settings require a comma-separated list of options in validation",
        )),
        (SettingType::Select, Some(options)) => {
            if select_options(options).is_empty() {
                Err(AppError::validation("select settings require at least one option"))
            } else {
                Ok(())
            }
        }
        (SettingType::Number, Some(range)) => parse_range(range).map(|_| ()),
        (SettingType::String | SettingType::Password, Some(pattern)) => {
            Regex::new(pattern).map(|_| ()).map_err(|e| {
                AppError::Validation(format!("validation is not a valid pattern: {}", e))
            })
        }
        _ => Ok(()),
    }
}

fn select_options(validation: &str) -> Vec<&str> {
    validation
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse "min..max"; either bound may be omitted
fn parse_range(range: &str) -> AppResult<(Option<f64>, Option<f64>)> {
    let invalid = || {
        AppError::Validation(format!(
            "number validation '{}' must look like 'min..max'",
            range
        ))
    };
    let (min, max) = range.split_once("..").ok_or_else(invalid)?;
    let parse_bound = |s: &str| -> AppResult<Option<f64>> {
        let s = s.trim();
        if s.is_empty() {
            Ok(None)
        } else {
            s.parse::<f64>().map(Some).map_err(|_| invalid())
        }
    };
    Ok((parse_bound(min)?, parse_bound(max)?))
}

pub fn check_value(
    name: &str,
    setting_type: SettingType,
    validation: Option<&str>,
    is_required: bool,
    value: &Value,
) -> AppResult<()> {
    let type_error = || {
        AppError::Validation(format!(
            "setting '{}' expects a {} value",
            name, setting_type
        ))
    };

    if value.is_null() {
        return if is_required {
            Err(AppError::Validation(format!("setting '{}' is required", name)))
        } else {
            Ok(())
        };
    }

    match setting_type {
        SettingType::String | SettingType::Password => {
            let text = value.as_str().ok_or_else(type_error)?;
            if is_required && text.is_empty() {
                return Err(AppError::Validation(format!("setting '{}' is required", name)));
            }
            if let Some(pattern) = validation {
                let regex = Regex::new(pattern).map_err(|e| {
                    AppError::Validation(format!("validation is not a valid pattern: {}", e))
                })?;
                if !regex.is_match(text) {
                    return Err(AppError::Validation(format!(
                        "setting '{}' does not match {}",
                        name, pattern
                    )));
                }
            }
        }
        SettingType::Number => {
            let number = value.as_f64().ok_or_else(type_error)?;
            if let Some(range) = validation {
                let (min, max) = parse_range(range)?;
                let below = min.map(|m| number < m).unwrap_or(false);
                let above = max.map(|m| number > m).unwrap_or(false);
                if below || above {
                    return Err(AppError::Validation(format!(
                        "setting '{}' must be within {}",
                        name, range
                    )));
                }
            }
        }
        SettingType::Boolean => {
            value.as_bool().ok_or_else(type_error)?;
        }
        SettingType::Select => {
            let choice = value.as_str().ok_or_else(type_error)?;
            let options = validation.map(select_options).unwrap_or_default();
            if !options.contains(&choice) {
                return Err(AppError::Validation(format!(
                    "setting '{}' must be one of: {}",
                    name,
                    options.join(", ")
                )));
            }
        }
        SettingType::Json => {}
    }

    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSettingRequest {
    pub name: String,
    pub value: Value,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub validation: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<SettingStatus>,
}

impl CreateSettingRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_setting_name(&self.name)?;
        validate_definition(self.setting_type, self.validation.as_deref())?;
        check_value(
            &self.name,
            self.setting_type,
            self.validation.as_deref(),
            self.is_required,
            &self.value,
        )?;
        if let Some(default) = &self.default_value {
            check_value(
                &self.name,
                self.setting_type,
                self.validation.as_deref(),
                false,
                default,
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: Option<Value>,
    pub setting_type: Option<SettingType>,
    pub category: Option<SettingCategory>,
    pub description: Option<String>,
    pub default_value: Option<Value>,
    pub validation: Option<String>,
    pub is_required: Option<bool>,
    pub is_encrypted: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub status: Option<SettingStatus>,
}

impl UpdateSettingRequest {
    /// Merge onto `current`, validating the resulting definition and value
    pub fn apply(self, mut current: Setting) -> AppResult<Setting> {
        if let Some(setting_type) = self.setting_type {
            current.setting_type = setting_type;
        }
        if let Some(category) = self.category {
            current.category = category;
        }
        if let Some(description) = self.description {
            current.description = Some(description);
        }
        if let Some(validation) = self.validation {
            current.validation = (!validation.trim().is_empty()).then_some(validation);
        }
        if let Some(is_required) = self.is_required {
            current.is_required = is_required;
        }
        if let Some(is_encrypted) = self.is_encrypted {
            current.is_encrypted = is_encrypted;
        }
        if let Some(tags) = self.tags {
            current.tags = tags;
        }
        if let Some(status) = self.status {
            current.status = status;
        }
        if let Some(default_value) = self.default_value {
            current.default_value = Some(default_value);
        }
        if let Some(value) = self.value {
            current.value = value;
        }

        validate_definition(current.setting_type, current.validation.as_deref())?;
        current.check_value(&current.value)?;
        if let Some(default) = &current.default_value {
            check_value(
                &current.name,
                current.setting_type,
                current.validation.as_deref(),
                false,
                default,
            )?;
        }
        Ok(current)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetSettingValueRequest {
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingQuery {
    pub category: Option<SettingCategory>,
    pub status: Option<SettingStatus>,
    pub search: Option<String>,
    pub tag: Option<String>,
}

/// Settings inserted at startup when absent
pub fn default_settings() -> Vec<CreateSettingRequest> {
    fn seed(
        name: &str,
        value: Value,
        setting_type: SettingType,
        category: SettingCategory,
        description: &str,
        validation: Option<&str>,
        tags: &[&str],
    ) -> CreateSettingRequest {
        CreateSettingRequest {
            name: name.to_string(),
            default_value: Some(value.clone()),
            value,
            setting_type,
            category,
            description: Some(description.to_string()),
            validation: validation.map(str::to_string),
            is_required: !matches!(setting_type, SettingType::Password | SettingType::Json),
            is_encrypted: setting_type == SettingType::Password,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            status: Some(SettingStatus::Active),
        }
    }

    vec![
        seed(
            SETTING_SITE_NAME,
            json!("MediBook"),
            SettingType::String,
            SettingCategory::General,
            "Name shown in page titles and emails",
            None,
            &["branding"],
        ),
        seed(
            "support_email",
            json!("support@medibook.example.com"),
            SettingType::String,
            SettingCategory::General,
            "Contact address shown to patients",
            Some(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"),
            &["contact"],
        ),
        seed(
            SETTING_SLOT_MINUTES,
            json!(30),
            SettingType::Number,
            SettingCategory::Appointment,
            "Default appointment slot length in minutes",
            Some("5..240"),
            &["scheduling"],
        ),
        seed(
            SETTING_MAX_ADVANCE_DAYS,
            json!(60),
            SettingType::Number,
            SettingCategory::Appointment,
            "How many days ahead patients may book",
            Some("1..365"),
            &["scheduling"],
        ),
        seed(
            SETTING_ALLOW_PATIENT_CANCELLATION,
            json!(true),
            SettingType::Boolean,
            SettingCategory::Appointment,
            "Whether patients may cancel their own appointments",
            None,
            &["scheduling"],
        ),
        seed(
            SETTING_CANCELLATION_WINDOW_HOURS,
            json!(2),
            SettingType::Number,
            SettingCategory::Appointment,
            "Patients cannot cancel within this many hours of the start time",
            Some("0..168"),
            &["scheduling"],
        ),
        seed(
            "default_currency",
            json!("USD"),
            SettingType::Select,
            SettingCategory::Payment,
            "Currency used for consultation fees",
            Some("USD,EUR,GBP,INR"),
            &["billing"],
        ),
        seed(
            "smtp_password",
            json!(""),
            SettingType::Password,
            SettingCategory::Email,
            "Password for the outgoing mail relay",
            None,
            &["smtp"],
        ),
        seed(
            "maintenance_mode",
            json!(false),
            SettingType::Boolean,
            SettingCategory::System,
            "Show the maintenance banner in the dashboards",
            None,
            &["operations"],
        ),
        seed(
            "feature_flags",
            json!({ "chat": true, "reviews": true }),
            SettingType::Json,
            SettingCategory::System,
            "Front-end feature toggles",
            None,
            &["operations"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(setting_type: SettingType, validation: Option<&str>) -> Setting {
        Setting {
            id: "s1".to_string(),
            name: "sample".to_string(),
            value: Value::Null,
            setting_type,
            category: SettingCategory::General,
            description: None,
            default_value: None,
            validation: validation.map(str::to_string),
            is_required: true,
            is_encrypted: false,
            tags: vec![],
            status: SettingStatus::Active,
            created_by: None,
            updated_by: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_number_range() {
        let s = setting(SettingType::Number, Some("5..240"));
        assert!(s.check_value(&json!(30)).is_ok());
        assert!(s.check_value(&json!(4)).is_err());
        assert!(s.check_value(&json!(241)).is_err());
        assert!(s.check_value(&json!("30")).is_err());

        let open = setting(SettingType::Number, Some("0.."));
        assert!(open.check_value(&json!(1_000_000)).is_ok());
        assert!(open.check_value(&json!(-1)).is_err());
    }

    #[test]
    fn test_select_options() {
        let s = setting(SettingType::Select, Some("USD, EUR ,GBP"));
        assert!(s.check_value(&json!("EUR")).is_ok());
        assert!(s.check_value(&json!("JPY")).is_err());
        assert!(validate_definition(SettingType::Select, None).is_err());
        assert!(validate_definition(SettingType::Select, Some(" , ")).is_err());
    }

    #[test]
    fn test_string_pattern_and_required() {
        let s = setting(SettingType::String, Some(r"^\d{4}$"));
        assert!(s.check_value(&json!("2026")).is_ok());
        assert!(s.check_value(&json!("20x6")).is_err());
        assert!(s.check_value(&json!("")).is_err());
        assert!(s.check_value(&Value::Null).is_err());
        assert!(validate_definition(SettingType::String, Some("(")).is_err());
    }

    #[test]
    fn test_boolean_and_json() {
        let b = setting(SettingType::Boolean, None);
        assert!(b.check_value(&json!(true)).is_ok());
        assert!(b.check_value(&json!("true")).is_err());

        let j = setting(SettingType::Json, None);
        assert!(j.check_value(&json!({"a": [1, 2]})).is_ok());
    }

    #[test]
    fn test_masking_sensitive_values() {
        let mut s = setting(SettingType::Password, None);
        s.value = json!("hunter22");
        s.default_value = Some(json!(""));
        let masked = s.masked();
        assert_eq!(masked.value, json!(MASKED_VALUE));
        assert_eq!(masked.default_value, Some(json!(MASKED_VALUE)));

        let mut plain = setting(SettingType::String, None);
        plain.value = json!("visible");
        assert_eq!(plain.masked().value, json!("visible"));
    }

    #[test]
    fn test_setting_name_rules() {
        assert!(validate_setting_name("appointment_slot_minutes").is_ok());
        assert!(validate_setting_name("email.smtp_host").is_ok());
        assert!(validate_setting_name("Bad-Name").is_err());
        assert!(validate_setting_name("1abc").is_err());
        assert!(validate_setting_name("a").is_err());
    }

    #[test]
    fn test_update_revalidates_value_against_new_type() {
        let mut current = setting(SettingType::String, None);
        current.value = json!("thirty");

        let update = UpdateSettingRequest {
            setting_type: Some(SettingType::Number),
            ..Default::default()
        };
        assert!(update.apply(current.clone()).is_err());

        let update = UpdateSettingRequest {
            setting_type: Some(SettingType::Number),
            value: Some(json!(30)),
            ..Default::default()
        };
        let updated = update.apply(current).unwrap();
        assert_eq!(updated.value, json!(30));
    }

    #[test]
    fn test_default_settings_are_self_consistent() {
        for seed in default_settings() {
            seed.validate()
                .unwrap_or_else(|e| panic!("seed {} invalid: {}", seed.name, e));
        }
    }
}
