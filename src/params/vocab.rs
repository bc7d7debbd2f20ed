//! Measurement Protocol v1 parameters emitted by the tracker.
//! https://developers.google.com/analytics/devguides/collection/protocol/v1/parameters

use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use super::{Parameter, ParameterError, Rule};

/// Characters escaped in query components (everything outside RFC 3986 query chars).
pub(crate) const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Path components additionally escape `;` and `?`.
const PATH: &AsciiSet = &QUERY.add(b';').add(b'?');

pub const NOT_SET: &str = "(not set)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitType {
    PageView,
    ScreenView,
    Event,
    Transaction,
    Item,
    Social,
    Exception,
    Timing,
}

impl HitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitType::PageView => "pageview",
            HitType::ScreenView => "screenview",
            HitType::Event => "event",
            HitType::Transaction => "transaction",
            HitType::Item => "item",
            HitType::Social => "social",
            HitType::Exception => "exception",
            HitType::Timing => "timing",
        }
    }
}

impl fmt::Display for HitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- General --

pub fn protocol_version() -> Parameter {
    Parameter {
        key: "v".into(),
        value: "1".into(),
        is_required: true,
    }
}

pub fn measurement_id(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("tid", value, true, &[Rule::NotEmpty])
}

pub fn anonymize_ip(value: bool) -> Parameter {
    Parameter::flag("aip", value)
}

pub fn data_source(value: &str) -> Parameter {
    Parameter::optional("ds", value)
}

pub fn disable_ad_personalization(value: bool) -> Parameter {
    Parameter::flag("npa", value)
}

/// Milliseconds between the hit occurring and being sent.
pub fn queue_time(millis: u64) -> Parameter {
    Parameter::integer("qt", millis)
}

pub fn cache_buster(value: &str) -> Parameter {
    Parameter::optional("z", value)
}

// -- Hit --

pub fn hit_type(value: HitType) -> Parameter {
    Parameter::optional("t", value.as_str())
}

pub fn non_interaction(value: bool) -> Parameter {
    Parameter::flag("ni", value)
}

// -- Apps --

/// Percent-encoded before the length check, so the limit applies to the encoded form.
pub fn application_name(value: &str) -> Result<Parameter, ParameterError> {
    let encoded = utf8_percent_encode(value, QUERY).to_string();
    Parameter::new("an", encoded, false, &[Rule::MaxBytes(100)])
}

pub fn application_id(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("aid", value, false, &[Rule::MaxBytes(150)])
}

pub fn application_version(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("av", value, false, &[Rule::MaxBytes(100)])
}

pub fn application_installer_id(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("aiid", value, false, &[Rule::MaxBytes(150)])
}

// -- User / session --

pub fn client_id(value: &str) -> Parameter {
    Parameter::optional("cid", value)
}

pub fn user_id(value: &str) -> Parameter {
    Parameter::optional("uid", value)
}

pub fn user_agent_override(value: &str) -> Parameter {
    Parameter::optional("ua", value)
}

pub fn ip_override(value: &str) -> Parameter {
    Parameter::optional("uip", value)
}

pub fn geographical_override(value: &str) -> Parameter {
    Parameter::optional("geoid", value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Start,
    End,
}

impl SessionControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionControl::Start => "start",
            SessionControl::End => "end",
        }
    }
}

pub fn session_control(value: SessionControl) -> Parameter {
    Parameter::optional("sc", value.as_str())
}

// -- System info --

pub fn user_language(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("ul", value, false, &[Rule::MaxBytes(20)])
}

pub fn screen_resolution(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("sr", value, false, &[Rule::MaxBytes(20)])
}

pub fn viewport_size(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("vp", value, false, &[Rule::MaxBytes(20)])
}

pub fn document_encoding(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("de", value, false, &[Rule::MaxBytes(20)])
}

pub fn screen_colors(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("sd", value, false, &[Rule::MaxBytes(20)])
}

pub fn java_enabled(value: bool) -> Parameter {
    Parameter::flag("je", value)
}

pub fn flash_version(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("fl", value, false, &[Rule::MaxBytes(20)])
}

// -- Traffic sources --

pub fn document_referrer(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("dr", value, false, &[Rule::MaxBytes(2048)])
}

pub fn campaign_name(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("cn", value, false, &[Rule::MaxBytes(100)])
}

pub fn campaign_source(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("cs", value, false, &[Rule::MaxBytes(100)])
}

pub fn campaign_medium(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("cm", value, false, &[Rule::MaxBytes(50)])
}

pub fn campaign_keyword(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("ck", value, false, &[Rule::MaxBytes(500)])
}

pub fn campaign_content(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("cc", value, false, &[Rule::MaxBytes(500)])
}

pub fn campaign_id(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("ci", value, false, &[Rule::MaxBytes(100)])
}

pub fn google_ads_id(value: &str) -> Parameter {
    Parameter::optional("gclid", value)
}

pub fn display_ads_id(value: &str) -> Parameter {
    Parameter::optional("dclid", value)
}

// -- Content information --

pub fn document_location(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("dl", value, false, &[Rule::MaxBytes(2048)])
}

pub fn document_host_name(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("dh", value, false, &[Rule::MaxBytes(100)])
}

pub fn document_path(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new(
        "dp",
        value,
        false,
        &[Rule::MaxBytes(2048), Rule::Prefix("/")],
    )
}

pub fn document_title(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("dt", value, false, &[Rule::MaxBytes(1500)])
}

pub fn screen_name(value: &str) -> Result<Parameter, ParameterError> {
    let encoded = utf8_percent_encode(value, PATH).to_string();
    Parameter::new("cd", encoded, false, &[Rule::MaxBytes(2048)])
}

// -- Events --

pub fn event_category(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("ec", value, false, &[Rule::MaxBytes(150), Rule::NotEmpty])
}

pub fn event_action(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("ea", value, false, &[Rule::MaxBytes(500), Rule::NotEmpty])
}

pub fn event_label(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("el", value, false, &[Rule::MaxBytes(500)])
}

pub fn event_value(value: u64) -> Parameter {
    Parameter::integer("ev", value)
}

// -- Exceptions --

pub fn exception_description(value: &str) -> Result<Parameter, ParameterError> {
    Parameter::new("exd", value, false, &[Rule::MaxBytes(150)])
}

pub fn exception_fatal(value: bool) -> Parameter {
    Parameter::flag("exf", value)
}
