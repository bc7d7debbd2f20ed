//! Client-side Measurement Protocol tracker.
//!
//! Events are built from validated [`Parameter`]s, collected by a
//! [`BatchBuffer`](buffers::BatchBuffer) that cuts a batch on a count
//! threshold or a timer, and handed in cut order to a [`Dispatch`]
//! implementation that merges the common parameter set and sends them.

pub mod buffers;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod event;
pub mod params;
pub mod settings;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use buffers::{BufferError, FlushTrigger};
pub use config::{AppInfo, ConfigError, DeviceInfo, TrackerConfig, TrackerProfile};
pub use delivery::{DeliveryCallback, DeliveryCounts, DeliveryReport};
pub use dispatcher::{Dispatch, DispatchError, HttpDispatcher};
pub use event::{CustomEvent, Event};
pub use params::{Parameter, ParameterError};
pub use settings::{Settings, SettingsError};
pub use tracker::{InitError, ShutdownError, TrackError, Tracker};
