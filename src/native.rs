//! Node-API bindings
//!
//! Exposes one preview session per `NativePreview` object. The JS side serves
//! module content for `blob:preview/...` URIs through `resource()`.

use napi_derive::napi;
use std::collections::HashMap;

use crate::config::PreviewConfig;
use crate::pipeline::PreviewSession;
use crate::project::ProjectSnapshot;
use crate::sandbox::Delivery;

#[napi]
pub struct NativePreview {
    session: PreviewSession,
}

#[napi]
impl NativePreview {
    #[napi(constructor)]
    pub fn new(config_json: Option<String>) -> napi::Result<Self> {
        let config = match config_json {
            Some(json) => PreviewConfig::from_json(&json)
                .map_err(|e| napi::Error::from_reason(e.to_string()))?,
            None => PreviewConfig::default(),
        };
        Ok(Self {
            session: PreviewSession::new(config),
        })
    }

    #[napi]
    pub fn render(
        &mut self,
        files: HashMap<String, String>,
        selected: String,
    ) -> napi::Result<serde_json::Value> {
        let snapshot: ProjectSnapshot = files.into_iter().collect();
        let output = self.session.render(&snapshot, &selected);
        let mut value =
            serde_json::to_value(&output).map_err(|e| napi::Error::from_reason(e.to_string()))?;
        if let (Some(obj), Some(err)) = (value.as_object_mut(), output.diagnostic.as_ref()) {
            obj.insert(
                "diagnostic".to_string(),
                serde_json::json!({ "code": err.code(), "message": err.to_string() }),
            );
        }
        Ok(value)
    }

    /// Module content for a handle of the current pass.
    #[napi]
    pub fn resource(&self, uri: String) -> Option<String> {
        self.session
            .host()
            .get(&uri)
            .map(|stored| stored.content.clone())
    }

    /// Returns "shown", "suppressed", "stale", or null for foreign messages.
    #[napi]
    pub fn receive_event(&mut self, message: serde_json::Value) -> Option<String> {
        self.session.receive_event(&message).map(|delivery| {
            match delivery {
                Delivery::Shown => "shown",
                Delivery::Suppressed => "suppressed",
                Delivery::Stale => "stale",
            }
            .to_string()
        })
    }

    #[napi]
    pub fn live_handles(&self) -> u32 {
        count_to_js(self.session.live_handles())
    }

    #[napi]
    pub fn close(&mut self) {
        self.session.close();
    }
}

/// JS numbers cross the boundary as `u32`; larger counts saturate.
fn count_to_js(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_saturates() {
        assert_eq!(count_to_js(0), 0);
        assert_eq!(count_to_js(3), 3);
        assert_eq!(count_to_js(u32::MAX as usize), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(count_to_js(u32::MAX as usize + 1), u32::MAX);
    }
}
