//! Pure selection of snapshot references from a batch of events.

use std::collections::HashMap;

use super::types::{Event, Module, SnapshotReference};
use super::window::ResolvedWindow;

/// Device side of the event predicate.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    /// Netatmo device type, e.g. `NOC` for the outdoor camera.
    pub device_type: Option<String>,
    /// Restrict to a single module (MAC address).
    pub module_id: Option<String>,
    /// Known module types, from home status.
    module_types: HashMap<String, String>,
}

impl DeviceFilter {
    pub fn new(device_type: Option<String>) -> Self {
        Self {
            device_type,
            ..Self::default()
        }
    }

    pub fn with_module(mut self, module_id: Option<String>) -> Self {
        self.module_id = module_id;
        self
    }

    /// Teach the filter which type each module is.
    pub fn with_modules(mut self, modules: &[Module]) -> Self {
        self.module_types = modules
            .iter()
            .map(|m| (m.id.to_ascii_lowercase(), m.module_type.clone()))
            .collect();
        self
    }

    /// Modules of unknown type pass; the events endpoint already filtered
    /// by device type server-side.
    pub fn accepts(&self, module_id: &str) -> bool {
        if let Some(wanted) = &self.module_id {
            if !wanted.eq_ignore_ascii_case(module_id) {
                return false;
            }
        }
        match (
            &self.device_type,
            self.module_types.get(&module_id.to_ascii_lowercase()),
        ) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
            _ => true,
        }
    }
}

/// Every subevent snapshot from an accepted module whose own time or
/// parent event time lies inside `window`. The reference carries whichever
/// of the two is inside, the subevent time first.
///
/// The result is sorted and deduplicated, so it does not depend on the
/// order of `events`.
pub fn snapshot_references(
    events: &[Event],
    window: &ResolvedWindow,
    filter: &DeviceFilter,
) -> Vec<SnapshotReference> {
    let mut refs: Vec<SnapshotReference> = events
        .iter()
        .filter(|event| filter.accepts(&event.module_id))
        .flat_map(|event| {
            event.subevents.iter().filter_map(move |sub| {
                let url = sub.snapshot_url.as_ref()?;
                let timestamp = [sub.timestamp, event.timestamp]
                    .into_iter()
                    .find(|t| window.contains(*t))?;
                Some(SnapshotReference {
                    timestamp,
                    url: url.clone(),
                    module_id: event.module_id.clone(),
                })
            })
        })
        .collect();

    refs.sort();
    refs.dedup();
    refs
}
