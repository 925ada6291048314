//! Editable forms built from a caller's [`RenderContext`].
//!
//! A form is a list of declared fields. Its choices come from the context
//! resolved for this request, so two callers looking at the same entity may
//! see different dropdowns. Forms never talk to the gateway: live values are
//! handed in by the caller as raw strings, the same shape a browser submits.

mod validation;

pub use validation::{
    DECIMAL_PATTERN, FieldError, FieldValue, FormErrors, REASON_NO_CHOICES, REASON_NOT_ALLOWED,
    REASON_NOT_DECIMAL, REASON_REQUIRED, Values, check_checkbox, check_choice, check_decimal,
};

use std::collections::HashMap;

use serde::Serialize;

use crate::config::{ModeChoice, RenderContext};
use crate::entity::{EntityKind, EntitySnapshot};
use crate::reconcile::decompose;
use crate::{Error, Result};

pub const SYSMODE: &str = "sysmode";
pub const SUPPRESS: &str = "suppress";
pub const NAME: &str = "name";
pub const COMFORT: &str = "comfort";
pub const ECO: &str = "eco";
pub const FROST: &str = "frost";
pub const OFFSET: &str = "offset";
pub const RUNMODE: &str = "runmode";
pub const OVERRIDE: &str = "override";

/// Raw field values keyed by field name.
pub type RawValues = HashMap<String, String>;

/// How a field is edited and checked.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Shown only; never read back from a submission.
    Display,
    Decimal,
    Choice(Vec<ModeChoice>),
    Checkbox,
}

impl FieldKind {
    fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Display => "display",
            FieldKind::Decimal => "decimal",
            FieldKind::Choice(_) => "choice",
            FieldKind::Checkbox => "checkbox",
        }
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { key, label, kind }
    }

    pub fn is_editable(&self) -> bool {
        self.kind != FieldKind::Display
    }
}

/// Field as sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldModel {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub editable: bool,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ModeChoice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Form as sent to a client, pre-filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormModel {
    pub title: String,
    pub valid: bool,
    pub fields: Vec<FieldModel>,
}

impl FormModel {
    pub fn field(&self, key: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// A declared form.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    title: String,
    fields: Vec<FieldSpec>,
}

impl Form {
    /// Global mode form: mode dropdown plus suppression checkbox.
    pub fn system(modes: &[ModeChoice]) -> Self {
        Self {
            title: "System".to_string(),
            fields: vec![
                FieldSpec::new(SYSMODE, "Mode", FieldKind::Choice(modes.to_vec())),
                FieldSpec::new(SUPPRESS, "Suppress", FieldKind::Checkbox),
            ],
        }
    }

    /// Entity form shared by every kind.
    ///
    /// Run-mode and override fields exist only when the caller has run-mode
    /// choices configured for the kind.
    pub fn entity(kind: EntityKind, run_modes: Option<&[ModeChoice]>) -> Self {
        let mut fields = vec![
            FieldSpec::new(NAME, "Name", FieldKind::Display),
            FieldSpec::new(COMFORT, "Comfort", FieldKind::Display),
            FieldSpec::new(ECO, "Eco", FieldKind::Display),
            FieldSpec::new(FROST, "Frost-free", FieldKind::Display),
            FieldSpec::new(OFFSET, "Offset", FieldKind::Decimal),
        ];
        if let Some(run_modes) = run_modes {
            fields.push(FieldSpec::new(
                RUNMODE,
                "Run mode",
                FieldKind::Choice(run_modes.to_vec()),
            ));
            fields.push(FieldSpec::new(OVERRIDE, "Override", FieldKind::Checkbox));
        }
        let title = match kind {
            EntityKind::Circuit => "Heating circuit",
            EntityKind::Tank => "Hot-water tank",
        };
        Self {
            title: title.to_string(),
            fields,
        }
    }

    /// Form matching a resolved context.
    pub fn from_context(context: &RenderContext) -> Self {
        match context {
            RenderContext::SystemMode { modes } => Self::system(modes),
            RenderContext::Entity {
                kind, run_modes, ..
            } => Self::entity(*kind, run_modes.as_deref()),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Check every editable field of a submission.
    ///
    /// Returns the typed values only if all fields pass; otherwise
    /// `Error::Validation` with one entry per rejected field.
    pub fn validate(&self, submission: &RawValues) -> Result<Values> {
        let mut values = Values::default();
        let mut errors = FormErrors::new();

        for field in &self.fields {
            let raw = submission.get(field.key).map(String::as_str);
            let checked = match &field.kind {
                FieldKind::Display => continue,
                FieldKind::Decimal => check_decimal(raw).map(FieldValue::Decimal),
                FieldKind::Choice(choices) => check_choice(raw, choices).map(FieldValue::Choice),
                FieldKind::Checkbox => Ok(FieldValue::Checked(check_checkbox(raw))),
            };
            match checked {
                Ok(value) => values.insert(field.key, value),
                Err(reason) => errors.add(field.key, reason),
            }
        }

        if errors.is_empty() {
            Ok(values)
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Values to show after a rejected submission.
    ///
    /// Editable fields keep what the caller typed; display fields come from
    /// `live`. Unchecked boxes are absent from submissions and stay unchecked.
    pub fn attempted(&self, live: &RawValues, submission: &RawValues) -> RawValues {
        let mut values = RawValues::new();
        for field in &self.fields {
            let source = if field.is_editable() { submission } else { live };
            if let Some(value) = source.get(field.key) {
                values.insert(field.key.to_string(), value.clone());
            }
        }
        values
    }

    /// Pre-fill the form.
    pub fn render(&self, values: &RawValues, errors: Option<&FormErrors>) -> FormModel {
        let fields = self
            .fields
            .iter()
            .map(|field| {
                let raw = values.get(field.key).map(String::as_str);
                let (value, choices) = match &field.kind {
                    FieldKind::Display | FieldKind::Decimal => (
                        serde_json::Value::from(raw.unwrap_or_default()),
                        None,
                    ),
                    FieldKind::Choice(choices) => {
                        let value = match raw {
                            Some(raw) => raw
                                .trim()
                                .parse::<i64>()
                                .map(serde_json::Value::from)
                                .unwrap_or_else(|_| serde_json::Value::from(raw)),
                            None => serde_json::Value::Null,
                        };
                        (value, Some(choices.clone()))
                    }
                    FieldKind::Checkbox => (serde_json::Value::Bool(check_checkbox(raw)), None),
                };
                FieldModel {
                    key: field.key,
                    label: field.label,
                    kind: field.kind.as_str(),
                    editable: field.is_editable(),
                    value,
                    choices,
                    error: errors.and_then(|e| e.get(field.key)).map(str::to_string),
                }
            })
            .collect();

        FormModel {
            title: self.title.clone(),
            valid: errors.is_none_or(FormErrors::is_empty),
            fields,
        }
    }
}

/// Raw values of the system form for a composite mode.
pub fn system_values(composite: u8) -> RawValues {
    let (primary, suppress) = decompose(composite);
    let mut values = RawValues::new();
    values.insert(SYSMODE.to_string(), primary.to_string());
    if suppress {
        values.insert(SUPPRESS.to_string(), "on".to_string());
    }
    values
}

/// Raw values of an entity form for a live snapshot.
pub fn entity_values(snapshot: &EntitySnapshot) -> RawValues {
    let mut values = RawValues::new();
    values.insert(NAME.to_string(), snapshot.name.clone());
    values.insert(COMFORT.to_string(), format!("{:.1}", snapshot.setpoints.comfort));
    values.insert(ECO.to_string(), format!("{:.1}", snapshot.setpoints.eco));
    values.insert(FROST.to_string(), format!("{:.1}", snapshot.setpoints.frost));
    values.insert(OFFSET.to_string(), format!("{:.1}", snapshot.offset));
    values.insert(RUNMODE.to_string(), snapshot.current_mode.to_string());
    if snapshot.override_active {
        values.insert(OVERRIDE.to_string(), "on".to_string());
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::gateway::Setpoints;

    fn run_modes() -> Vec<ModeChoice> {
        vec![ModeChoice::new(2, "Comfort"), ModeChoice::new(3, "Eco")]
    }

    fn submission(pairs: &[(&str, &str)]) -> RawValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn snapshot() -> EntitySnapshot {
        EntitySnapshot {
            entity: EntityRef::new(EntityKind::Circuit, 0),
            name: "Ground floor".to_string(),
            standing_mode: 2,
            current_mode: 3,
            override_active: true,
            offset: 0.5,
            setpoints: Setpoints {
                comfort: 20.0,
                eco: 17.0,
                frost: 7.0,
                target: 20.0,
                current: 19.4,
            },
            has_ambient_sensor: true,
        }
    }

    #[test]
    fn test_entity_form_fields_follow_context() {
        let with = Form::entity(EntityKind::Circuit, Some(&run_modes()));
        assert!(with.has_field(RUNMODE));
        assert!(with.has_field(OVERRIDE));

        let without = Form::entity(EntityKind::Tank, None);
        assert!(!without.has_field(RUNMODE));
        assert!(!without.has_field(OVERRIDE));
        assert!(without.has_field(OFFSET));
        assert_eq!(without.title(), "Hot-water tank");
    }

    #[test]
    fn test_valid_entity_submission() {
        let form = Form::entity(EntityKind::Circuit, Some(&run_modes()));
        let values = form
            .validate(&submission(&[
                (OFFSET, "-1.5"),
                (RUNMODE, "3"),
                (OVERRIDE, "on"),
            ]))
            .unwrap();
        assert_eq!(values.decimal(OFFSET), Some(-1.5));
        assert_eq!(values.choice(RUNMODE), Some(3));
        assert!(values.checked(OVERRIDE));
    }

    #[test]
    fn test_missing_checkbox_is_unchecked_not_invalid() {
        let form = Form::entity(EntityKind::Circuit, Some(&run_modes()));
        let values = form
            .validate(&submission(&[(OFFSET, "0"), (RUNMODE, "2")]))
            .unwrap();
        assert!(!values.checked(OVERRIDE));
    }

    #[test]
    fn test_each_invalid_field_reported() {
        let form = Form::entity(EntityKind::Circuit, Some(&run_modes()));
        let err = form
            .validate(&submission(&[(OFFSET, "abc"), (RUNMODE, "9")]))
            .unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get(OFFSET), Some(REASON_NOT_DECIMAL));
        assert_eq!(errors.get(RUNMODE), Some(REASON_NOT_ALLOWED));
    }

    #[test]
    fn test_display_fields_are_ignored_in_submissions() {
        let form = Form::entity(EntityKind::Tank, None);
        let values = form
            .validate(&submission(&[(OFFSET, "1"), (NAME, ""), (COMFORT, "garbage")]))
            .unwrap();
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_empty_choice_list_rejects_submission() {
        let form = Form::system(&[]);
        let err = form.validate(&submission(&[(SYSMODE, "2")])).unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get(SYSMODE), Some(REASON_NO_CHOICES));
    }

    #[test]
    fn test_system_form_from_context() {
        let context = RenderContext::SystemMode {
            modes: vec![ModeChoice::new(2, "Auto"), ModeChoice::new(4, "Eco")],
        };
        let form = Form::from_context(&context);
        let values = form
            .validate(&submission(&[(SYSMODE, "4"), (SUPPRESS, "on")]))
            .unwrap();
        assert_eq!(values.choice(SYSMODE), Some(4));
        assert!(values.checked(SUPPRESS));
    }

    #[test]
    fn test_render_live_snapshot() {
        let form = Form::entity(EntityKind::Circuit, Some(&run_modes()));
        let model = form.render(&entity_values(&snapshot()), None);

        assert!(model.valid);
        assert_eq!(model.field(NAME).unwrap().value, "Ground floor");
        assert!(!model.field(NAME).unwrap().editable);
        assert_eq!(model.field(COMFORT).unwrap().value, "20.0");
        assert_eq!(model.field(OFFSET).unwrap().value, "0.5");
        assert_eq!(model.field(RUNMODE).unwrap().value, 3);
        assert_eq!(model.field(RUNMODE).unwrap().choices.as_ref().unwrap().len(), 2);
        assert_eq!(model.field(OVERRIDE).unwrap().value, true);
    }

    #[test]
    fn test_rerender_keeps_attempt_and_live_display_values() {
        let form = Form::entity(EntityKind::Circuit, Some(&run_modes()));
        let sent = submission(&[(OFFSET, "abc"), (RUNMODE, "2"), (NAME, "forged")]);
        let Err(Error::Validation(errors)) = form.validate(&sent) else {
            panic!("expected validation error");
        };

        let values = form.attempted(&entity_values(&snapshot()), &sent);
        let model = form.render(&values, Some(&errors));

        assert!(!model.valid);
        assert_eq!(model.field(NAME).unwrap().value, "Ground floor");
        assert_eq!(model.field(OFFSET).unwrap().value, "abc");
        assert_eq!(
            model.field(OFFSET).unwrap().error.as_deref(),
            Some(REASON_NOT_DECIMAL)
        );
        assert_eq!(model.field(RUNMODE).unwrap().value, 2);
        assert!(model.field(RUNMODE).unwrap().error.is_none());
        // live state has the override on, but the caller unticked it
        assert_eq!(model.field(OVERRIDE).unwrap().value, false);
    }

    #[test]
    fn test_system_values_split_composite() {
        let values = system_values(131);
        assert_eq!(values.get(SYSMODE).map(String::as_str), Some("3"));
        assert_eq!(values.get(SUPPRESS).map(String::as_str), Some("on"));

        let values = system_values(2);
        assert!(!values.contains_key(SUPPRESS));
    }
}
