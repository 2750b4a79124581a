//! Form abandonment tracking
//!
//! Tracks a dirty bit per form, set on any field change and cleared on
//! submit. At shutdown, each still-dirty form produces one abandonment
//! event. Because an unloading host cannot await, events are handed to the
//! fire-and-forget beacon when one is available; any event the beacon
//! refuses falls back to the normal async path, best-effort.
//!
//! Field values are also retained (passwords excluded) so the `save`
//! recovery strategy can snapshot them.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use faultline_core::domain::event::ErrorEvent;
use faultline_core::ports::recovery::FormSnapshot;
use faultline_core::ports::transmitter::IBeacon;

/// Per-form tracked state
#[derive(Debug, Default)]
struct FormState {
    /// Set on any field change, cleared on submit
    dirty: bool,
    /// Current field values; sensitive fields hold no value
    fields: HashMap<String, Option<Value>>,
}

/// Tracks form dirty state and current field values
///
/// Interior mutability keeps the tracker shareable between the capture
/// layer and the strategy engine's `save` executor.
pub struct FormTracker {
    forms: Mutex<HashMap<String, FormState>>,
}

impl FormTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self {
            forms: Mutex::new(HashMap::new()),
        }
    }

    /// Records a field change, marking the form dirty
    pub fn field_changed(&self, form_id: &str, field: &str, value: Value) {
        let mut forms = self.lock();
        let state = forms.entry(form_id.to_string()).or_default();
        state.dirty = true;
        state.fields.insert(field.to_string(), Some(value));
    }

    /// Records a change to a sensitive field (e.g. a password)
    ///
    /// Marks the form dirty and counts the field, but never retains the
    /// value; snapshots skip it.
    pub fn sensitive_field_changed(&self, form_id: &str, field: &str) {
        let mut forms = self.lock();
        let state = forms.entry(form_id.to_string()).or_default();
        state.dirty = true;
        state.fields.insert(field.to_string(), None);
    }

    /// Clears the dirty bit after a successful submit
    pub fn form_submitted(&self, form_id: &str) {
        if let Some(state) = self.lock().get_mut(form_id) {
            state.dirty = false;
            state.fields.clear();
        }
    }

    /// Returns whether the form has unsaved changes
    pub fn is_dirty(&self, form_id: &str) -> bool {
        self.lock().get(form_id).is_some_and(|s| s.dirty)
    }

    /// Number of tracked fields across all forms
    pub fn field_count(&self) -> u64 {
        self.lock().values().map(|s| s.fields.len() as u64).sum()
    }

    /// Snapshot of all current non-sensitive field values across the page
    pub fn snapshot(&self, url: &str) -> FormSnapshot {
        let forms = self.lock();
        let mut fields = Map::new();
        for (form_id, state) in forms.iter() {
            for (field, value) in &state.fields {
                if let Some(value) = value {
                    fields.insert(format!("{form_id}.{field}"), value.clone());
                }
            }
        }
        FormSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            url: url.to_string(),
            fields,
        }
    }

    /// Emits abandonment events for dirty forms at shutdown
    ///
    /// Events accepted by the beacon are delivered fire-and-forget and
    /// dropped here; the returned events are the ones that still need the
    /// normal async path (no beacon, or a beacon hand-off failure). The
    /// dirty bits are cleared either way so unload cannot double-report.
    pub fn flush_on_unload(&self, beacon: Option<&dyn IBeacon>) -> Vec<ErrorEvent> {
        let mut forms = self.lock();
        let mut fallback = Vec::new();

        for (form_id, state) in forms.iter_mut() {
            if !state.dirty {
                continue;
            }
            state.dirty = false;

            let event = ErrorEvent::form_abandonment(form_id, state.fields.len() as u64);
            let handed_off = match beacon {
                Some(beacon) => match serde_json::to_value(&event) {
                    Ok(payload) => match beacon.send_nowait(payload) {
                        Ok(()) => true,
                        Err(err) => {
                            warn!(form = %form_id, error = %err, "Beacon hand-off failed");
                            false
                        }
                    },
                    Err(err) => {
                        warn!(form = %form_id, error = %err, "Event serialization failed");
                        false
                    }
                },
                None => false,
            };

            if handed_off {
                debug!(form = %form_id, "Abandonment event handed to beacon");
            } else {
                fallback.push(event);
            }
        }

        fallback
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FormState>> {
        self.forms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FormTracker {
    fn default() -> Self {
        Self::new()
    }
}
