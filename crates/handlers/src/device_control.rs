//! Device-control handler — issues a command to a home device.
//!
//! The reference implementation keeps an in-memory device table; a real
//! deployment registers an adapter to its home-automation bridge under the
//! same handler name.

use async_trait::async_trait;
use confab_core::error::HandlerError;
use confab_core::handler::ExpertHandler;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::arg_str;

pub struct DeviceControlHandler {
    /// device name → last commanded state
    states: Arc<Mutex<HashMap<String, String>>>,
}

impl DeviceControlHandler {
    pub fn new() -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for DeviceControlHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Recover `(device, state)` from an instruction like
/// "turn off the kitchen lights".
fn parse_instruction(instruction: &str) -> Option<(String, String)> {
    let lower = instruction.to_lowercase();
    let rest = lower.strip_prefix("turn ").or_else(|| lower.strip_prefix("switch "))?;
    let (state, device) = rest.split_once(' ')?;
    let device = device
        .trim_start_matches("the ")
        .trim_start_matches("my ")
        .trim();
    if device.is_empty() {
        return None;
    }
    Some((device.to_string(), state.to_string()))
}

#[async_trait]
impl ExpertHandler for DeviceControlHandler {
    fn name(&self) -> &str {
        "device-control"
    }

    fn description(&self) -> &str {
        "Send a command to a smart-home device (lights, locks, thermostat)"
    }

    async fn call(
        &self,
        args: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, HandlerError> {
        let (device, state) = match (arg_str(&args, "device"), arg_str(&args, "state")) {
            (Some(device), Some(state)) => (device.to_string(), state.to_string()),
            _ => arg_str(&args, "instruction")
                .and_then(parse_instruction)
                .ok_or_else(|| {
                    HandlerError::InvalidArguments(
                        "need 'device' and 'state', or a parseable 'instruction'".into(),
                    )
                })?,
        };

        self.states.lock().await.insert(device.clone(), state.clone());
        info!(device = %device, state = %state, "device command issued");

        Ok(serde_json::json!({
            "status": "ok",
            "device": device,
            "state": state,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_turn_commands() {
        assert_eq!(
            parse_instruction("turn off the kitchen lights"),
            Some(("kitchen lights".into(), "off".into()))
        );
        assert_eq!(parse_instruction("make coffee"), None);
    }

    #[tokio::test]
    async fn structured_command_applies() {
        let handler = DeviceControlHandler::new();
        let payload = handler
            .call(serde_json::json!({"device": "porch light", "state": "on"}))
            .await
            .unwrap();
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["device"], "porch light");
    }

    #[tokio::test]
    async fn instruction_command_applies() {
        let handler = DeviceControlHandler::new();
        let payload = handler
            .call(serde_json::json!({"instruction": "turn off the kitchen lights"}))
            .await
            .unwrap();
        assert_eq!(payload["state"], "off");
    }
}
