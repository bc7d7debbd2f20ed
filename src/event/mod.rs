use crate::config::AppInfo;
use crate::params::vocab::{self, HitType, SessionControl};
use crate::params::{Parameter, ParameterError, combine_uniquely};

/// One trackable occurrence, as the ordered parameters that describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    parameters: Vec<Parameter>,
}

/// Fields of a custom `event` hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEvent {
    pub action: String,
    pub category: String,
    pub label: Option<String>,
    pub value: Option<u64>,
}

impl CustomEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            category: "universal".into(),
            label: None,
            value: None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn value(mut self, value: u64) -> Self {
        self.value = Some(value);
        self
    }
}

impl Event {
    /// Wrap an already combined parameter list.
    pub fn from_parameters(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    fn build(required: Vec<Parameter>, extra: &[Parameter]) -> Self {
        Self::from_parameters(combine_uniquely(&required, extra))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key() == key)
            .map(Parameter::value)
    }

    pub fn hit_type(&self) -> Option<&str> {
        self.get("t")
    }

    pub fn screen_view(
        app: &AppInfo,
        screen_class: &str,
        screen_title: &str,
        extra: &[Parameter],
    ) -> Result<Self, ParameterError> {
        let required = vec![
            vocab::hit_type(HitType::ScreenView),
            vocab::application_name(&app.name)?,
            vocab::application_version(&app.version)?,
            vocab::application_id(&app.identifier)?,
            vocab::document_path(&format!("/{screen_class}"))?,
            vocab::document_title(screen_title)?,
        ];
        Ok(Self::build(required, extra))
    }

    pub fn page_view(
        app_identifier: &str,
        screen_class: &str,
        screen_title: &str,
        extra: &[Parameter],
    ) -> Result<Self, ParameterError> {
        let required = vec![
            vocab::hit_type(HitType::PageView),
            vocab::document_host_name(app_identifier)?,
            vocab::document_path(&format!("/{screen_class}"))?,
            vocab::document_title(screen_title)?,
        ];
        Ok(Self::build(required, extra))
    }

    pub fn session(
        control: SessionControl,
        app_identifier: &str,
        extra: &[Parameter],
    ) -> Result<Self, ParameterError> {
        let required = vec![
            vocab::session_control(control),
            vocab::document_location(app_identifier)?,
        ];
        Ok(Self::build(required, extra))
    }

    pub fn custom(event: &CustomEvent, extra: &[Parameter]) -> Result<Self, ParameterError> {
        let mut required = vec![
            vocab::hit_type(HitType::Event),
            vocab::event_category(&event.category)?,
            vocab::event_action(&event.action)?,
        ];
        if let Some(label) = &event.label {
            required.push(vocab::event_label(label)?);
        }
        if let Some(value) = event.value {
            required.push(vocab::event_value(value));
        }
        Ok(Self::build(required, extra))
    }

    pub fn exception(
        description: &str,
        fatal: bool,
        extra: &[Parameter],
    ) -> Result<Self, ParameterError> {
        let required = vec![
            vocab::hit_type(HitType::Exception),
            vocab::exception_description(description)?,
            vocab::exception_fatal(fatal),
        ];
        Ok(Self::build(required, extra))
    }
}

#[cfg(test)]
mod tests;
