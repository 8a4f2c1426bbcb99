//! Mozart API data transfer objects.
//!
//! Only the fields beohearth reads are modelled; unknown fields are ignored
//! and every field is optional because devices omit fields freely.

use serde::Deserialize;
use serde::Serialize;

/// Sound settings as pushed by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundSettings {
    #[serde(default)]
    pub adjustments: Option<SoundAdjustments>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundAdjustments {
    #[serde(default)]
    pub bass: Option<i32>,
    #[serde(default)]
    pub treble: Option<i32>,
}

/// Battery state as pushed by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryState {
    /// Charge in percent (0-100)
    #[serde(default)]
    pub battery_level: Option<u8>,
    #[serde(default)]
    pub remaining_charging_time_minutes: Option<i64>,
    #[serde(default)]
    pub remaining_playing_time_minutes: Option<i64>,
}

/// Request body for the bass adjustment endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bass {
    pub value: i32,
}

/// Request body for the treble adjustment endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treble {
    pub value: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_settings_partial_payload() {
        let json = r#"{"adjustments": {"bass": -3, "loudness": true}}"#;
        let settings: SoundSettings = serde_json::from_str(json).unwrap();
        let adjustments = settings.adjustments.unwrap();
        assert_eq!(adjustments.bass, Some(-3));
        assert_eq!(adjustments.treble, None);
    }

    #[test]
    fn test_sound_settings_without_adjustments() {
        let settings: SoundSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.adjustments, None);
    }

    #[test]
    fn test_battery_state_camel_case() {
        let json = r#"{
            "batteryLevel": 87,
            "isCharging": true,
            "remainingChargingTimeMinutes": 30,
            "remainingPlayingTimeMinutes": 540,
            "state": "charging"
        }"#;
        let battery: BatteryState = serde_json::from_str(json).unwrap();
        assert_eq!(battery.battery_level, Some(87));
        assert_eq!(battery.remaining_charging_time_minutes, Some(30));
        assert_eq!(battery.remaining_playing_time_minutes, Some(540));
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(Treble { value: 4 }).unwrap();
        assert_eq!(body, serde_json::json!({"value": 4}));
    }
}
