use std::ops::RangeInclusive;

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;

use super::client::MozartClient;
use super::dispatcher::Notification;
use super::dispatcher::NotificationKind;
use super::dto::Bass;
use super::dto::SoundAdjustments;
use super::dto::Treble;
use super::entity::BangOlufsenEntity;
use super::entity::entity_id;
use super::error::Error;
use super::error::Result;
use super::link::DeviceLink;
use crate::engine::Entity;
use crate::engine::EntityInfo;
use crate::engine::EntityState;
use crate::engine::EntityValue;
use crate::engine::Platform;
use crate::engine::state::EntityCategory;
use crate::engine::state::NumberMode;
use crate::engine::state::NumberRange;

/// Range the device accepts for bass and treble adjustments
pub const BASS_TREBLE_RANGE: RangeInclusive<i32> = -6..=6;

/// Which sound adjustment a number controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Bass,
    Treble,
}

impl Adjustment {
    fn key(self) -> &'static str {
        match self {
            Adjustment::Bass => "bass",
            Adjustment::Treble => "treble",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Adjustment::Bass => "Bass",
            Adjustment::Treble => "Treble",
        }
    }

    fn pick(self, adjustments: &SoundAdjustments) -> Option<i32> {
        match self {
            Adjustment::Bass => adjustments.bass,
            Adjustment::Treble => adjustments.treble,
        }
    }
}

/// A typed write for the vendor client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentRequest {
    Bass(Bass),
    Treble(Treble),
}

impl AdjustmentRequest {
    /// Issue the request. Exactly one vendor call per request.
    pub async fn send(self, client: &dyn MozartClient) -> Result<()> {
        match self {
            AdjustmentRequest::Bass(bass) => client.set_sound_settings_adjustments_bass(bass).await,
            AdjustmentRequest::Treble(treble) => {
                client.set_sound_settings_adjustments_treble(treble).await
            }
        }
    }
}

/// Bass or treble slider
pub struct AdjustmentNumber {
    info: EntityInfo,
    link: DeviceLink,
    adjustment: Adjustment,
    value: f64,
}

impl AdjustmentNumber {
    pub fn new(link: DeviceLink, adjustment: Adjustment) -> Self {
        let unique_id = format!("{}-{}", link.serial(), adjustment.key());
        let info = EntityInfo {
            entity_id: entity_id(Platform::Number, &unique_id),
            unique_id,
            name: format!("{} {}", link.name(), adjustment.label()),
            platform: Platform::Number,
            device_id: link.serial().to_string(),
            icon: Some("mdi:equalizer"),
            device_class: None,
            state_class: None,
            entity_category: Some(EntityCategory::Config),
            unit_of_measurement: None,
            enabled_by_default: true,
            number: Some(NumberRange {
                min: f64::from(*BASS_TREBLE_RANGE.start()),
                max: f64::from(*BASS_TREBLE_RANGE.end()),
                step: 1.0,
                mode: NumberMode::Slider,
            }),
        };

        Self {
            info,
            link,
            adjustment,
            value: 0.0,
        }
    }

    pub fn native_value(&self) -> f64 {
        self.value
    }

    /// Validate a user write and build the vendor request for it
    ///
    /// The displayed value is left alone; it follows the device's echo.
    pub fn request(&self, value: f64) -> Result<AdjustmentRequest> {
        let range = self
            .info
            .number
            .ok_or_else(|| Error::NotWritable(self.info.entity_id.clone()))?;

        if !range.contains(value) {
            return Err(Error::OutOfRange {
                value,
                min: range.min,
                max: range.max,
            });
        }

        // Device only takes whole steps
        let value = value as i32;
        Ok(match self.adjustment {
            Adjustment::Bass => AdjustmentRequest::Bass(Bass { value }),
            Adjustment::Treble => AdjustmentRequest::Treble(Treble { value }),
        })
    }
}

impl Entity for AdjustmentNumber {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn state(&self) -> EntityState {
        EntityState {
            available: self.link.is_available(),
            value: EntityValue::Number(self.native_value()),
        }
    }
}

impl BangOlufsenEntity for AdjustmentNumber {
    fn link(&self) -> &DeviceLink {
        &self.link
    }

    fn link_mut(&mut self) -> &mut DeviceLink {
        &mut self.link
    }

    fn notification_kinds(&self) -> &'static [NotificationKind] {
        &[NotificationKind::SoundSettings]
    }

    fn on_notification(&mut self, notification: &Notification, _now: DateTime<Utc>) -> bool {
        let Notification::SoundSettings(settings) = notification else {
            return false;
        };

        match settings.adjustments.as_ref().and_then(|a| self.adjustment.pick(a)) {
            Some(value) => {
                self.value = f64::from(value);
                true
            }
            None => {
                debug!(
                    "{}: sound settings without {}, keeping {}",
                    self.info.entity_id,
                    self.adjustment.key(),
                    self.value
                );
                false
            }
        }
    }

    fn as_number(&self) -> Option<&AdjustmentNumber> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::integrations::bang_olufsen::client::MockMozartClient;
    use crate::integrations::bang_olufsen::dto::SoundSettings;
    use crate::integrations::bang_olufsen::test_device_config;

    fn number(adjustment: Adjustment) -> (AdjustmentNumber, Arc<MockMozartClient>) {
        let client = Arc::new(MockMozartClient::new());
        let link = DeviceLink::new(&test_device_config(), client.clone());
        (AdjustmentNumber::new(link, adjustment), client)
    }

    fn sound_settings(bass: Option<i32>, treble: Option<i32>) -> Notification {
        Notification::SoundSettings(SoundSettings {
            adjustments: Some(SoundAdjustments {
                bass,
                treble,
                ..Default::default()
            }),
        })
    }

    #[test]
    fn test_identity() {
        let (treble, _) = number(Adjustment::Treble);
        let info = treble.info();
        assert_eq!(info.unique_id, "1234-treble");
        assert_eq!(info.entity_id, "number.1234_treble");
        assert_eq!(info.name, "Kitchen Treble");
        assert_eq!(info.entity_category, Some(EntityCategory::Config));

        let range = info.number.unwrap();
        assert_eq!(range.min, -6.0);
        assert_eq!(range.max, 6.0);
        assert_eq!(range.mode, NumberMode::Slider);
    }

    #[test]
    fn test_initial_state() {
        let (bass, _) = number(Adjustment::Bass);
        assert_eq!(
            bass.state(),
            EntityState {
                available: true,
                value: EntityValue::Number(0.0)
            }
        );
    }

    #[test]
    fn test_sound_settings_sets_value_exactly() {
        let (mut treble, _) = number(Adjustment::Treble);
        assert!(treble.handle(&sound_settings(None, Some(4)), Utc::now()));
        assert_eq!(treble.native_value(), 4.0);
    }

    #[test]
    fn test_absent_treble_keeps_previous_value() {
        let (mut treble, _) = number(Adjustment::Treble);
        treble.handle(&sound_settings(None, Some(-2)), Utc::now());

        assert!(!treble.handle(&sound_settings(Some(5), None), Utc::now()));
        assert_eq!(treble.native_value(), -2.0);

        let no_adjustments = Notification::SoundSettings(SoundSettings { adjustments: None });
        assert!(!treble.handle(&no_adjustments, Utc::now()));
        assert_eq!(treble.native_value(), -2.0);
    }

    #[test]
    fn test_bass_ignores_treble() {
        let (mut bass, _) = number(Adjustment::Bass);
        bass.handle(&sound_settings(Some(3), Some(-6)), Utc::now());
        assert_eq!(bass.native_value(), 3.0);
    }

    #[test]
    fn test_connection_status_only_toggles_availability() {
        let (mut bass, _) = number(Adjustment::Bass);
        bass.handle(&sound_settings(Some(3), None), Utc::now());

        assert!(bass.handle(&Notification::ConnectionStatus(false), Utc::now()));
        assert_eq!(
            bass.state(),
            EntityState {
                available: false,
                value: EntityValue::Number(3.0)
            }
        );

        bass.handle(&Notification::ConnectionStatus(true), Utc::now());
        assert_eq!(
            bass.state(),
            EntityState {
                available: true,
                value: EntityValue::Number(3.0)
            }
        );
    }

    #[test]
    fn test_request_wraps_value() {
        let (bass, _) = number(Adjustment::Bass);
        let (treble, _) = number(Adjustment::Treble);

        for value in BASS_TREBLE_RANGE {
            assert_eq!(
                bass.request(f64::from(value)).unwrap(),
                AdjustmentRequest::Bass(Bass { value })
            );
            assert_eq!(
                treble.request(f64::from(value)).unwrap(),
                AdjustmentRequest::Treble(Treble { value })
            );
        }
    }

    #[test]
    fn test_request_out_of_range() {
        let (bass, _) = number(Adjustment::Bass);
        assert!(matches!(bass.request(7.0), Err(Error::OutOfRange { .. })));
        assert!(matches!(bass.request(-6.5), Err(Error::OutOfRange { .. })));
        assert!(matches!(bass.request(f64::INFINITY), Err(Error::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_send_makes_one_call_and_keeps_displayed_value() {
        let (treble, client) = number(Adjustment::Treble);
        let request = treble.request(3.0).unwrap();
        request.send(client.as_ref()).await.unwrap();

        assert_eq!(client.calls(), vec![AdjustmentRequest::Treble(Treble { value: 3 })]);
        assert_eq!(treble.native_value(), 0.0);
    }
}
