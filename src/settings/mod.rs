use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::config::{AppInfo, DeviceInfo, TrackerProfile};
use crate::params::vocab;
use crate::params::{Parameter, ParameterError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("tracker ID is not configured")]
    TrackerIdMissing,

    #[error("invalid tracker setting: {0}")]
    InvalidParameter(#[from] ParameterError),
}

struct SettingsState {
    profile: TrackerProfile,
    common: Option<Arc<[Parameter]>>,
}

/// Shared tracker profile plus the memoized common parameter set derived from it.
///
/// Every setter drops the memo; the next send rebuilds it.
#[derive(Clone)]
pub struct Settings {
    state: Arc<Mutex<SettingsState>>,
}

impl Settings {
    pub fn new(profile: TrackerProfile) -> Self {
        Self {
            state: Arc::new(Mutex::new(SettingsState {
                profile,
                common: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SettingsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut TrackerProfile)) {
        let mut state = self.lock();
        apply(&mut state.profile);
        state.common = None;
    }

    pub fn profile(&self) -> TrackerProfile {
        self.lock().profile.clone()
    }

    pub fn app_info(&self) -> AppInfo {
        self.lock().profile.app.clone()
    }

    pub fn set_tracker_id(&self, tracker_id: Option<String>) {
        self.update(|p| p.tracker_id = tracker_id.filter(|id| !id.is_empty()));
    }

    pub fn set_anonymize_ip(&self, anonymize_ip: bool) {
        self.update(|p| p.anonymize_ip = anonymize_ip);
    }

    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        let user_agent = user_agent.into();
        self.update(|p| p.user_agent = user_agent);
    }

    pub fn set_app_info(&self, app: AppInfo) {
        self.update(|p| p.app = app);
    }

    pub fn set_device_info(&self, device: DeviceInfo) {
        self.update(|p| p.device = device);
    }

    /// Parameters merged into every outgoing hit.
    ///
    /// Fails without side effects when no tracker ID is set, so no request is
    /// ever built for an unconfigured tracker.
    pub fn common_parameters(&self) -> Result<Arc<[Parameter]>, SettingsError> {
        let mut state = self.lock();
        if let Some(common) = &state.common {
            return Ok(Arc::clone(common));
        }
        let common: Arc<[Parameter]> = build_common(&state.profile)?.into();
        state.common = Some(Arc::clone(&common));
        Ok(common)
    }
}

fn build_common(profile: &TrackerProfile) -> Result<Vec<Parameter>, SettingsError> {
    let tracker_id = profile
        .tracker_id
        .as_deref()
        .ok_or(SettingsError::TrackerIdMissing)?;
    let app = &profile.app;

    Ok(vec![
        vocab::protocol_version(),
        vocab::measurement_id(tracker_id)?,
        vocab::application_id(&app.identifier)?,
        vocab::client_id(&profile.client_id),
        vocab::application_name(&app.name)?,
        vocab::application_version(&format!("{} {}", app.version, app.build))?,
        vocab::user_agent_override(&profile.user_agent),
        vocab::user_language(&profile.device.language)?,
        vocab::screen_resolution(&profile.device.screen_resolution)?,
        vocab::anonymize_ip(profile.anonymize_ip),
    ])
}
