//! Interpretation of protocol frames into device state changes.

use crate::command::Query;
use crate::protocol::Frame;
use crate::subscription::DeviceEvent;
use crate::types::{ConnectionPhase, DeviceState, Dialect, Power, Volume};

/// What a frame caused besides the state mutation itself
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Events to publish, in order
    pub events: Vec<DeviceEvent>,
    /// Queries to send back to the device
    pub queries: Vec<Query>,
}

impl DeviceState {
    /// Apply one frame and report the resulting events and follow-up queries
    ///
    /// Version 2 only reports values that changed, the legacy dialect reports
    /// every frame once connected. A volume frame, or a power frame other
    /// than `on`, completes a pending handshake.
    pub fn apply(&mut self, frame: Frame) -> Reaction {
        let mut reaction = Reaction::default();
        let connecting = self.phase == ConnectionPhase::Connecting;

        match frame {
            Frame::Volume(raw) => {
                let Some(volume) = self.decode_volume(&raw) else {
                    tracing::debug!("Ignoring volume frame: {}", raw);
                    return reaction;
                };
                let changed = self.volume != volume;
                self.volume = volume;

                if connecting {
                    self.complete_handshake(&mut reaction);
                } else if self.should_notify(changed) {
                    reaction.events.push(DeviceEvent::Volume(volume));
                }
            }
            Frame::VolumeMin(raw) => match raw.trim().parse() {
                Ok(min) => {
                    self.volume_min = min;
                    self.clamp_if_on();
                }
                Err(_) => tracing::debug!("Ignoring volume_min frame: {}", raw),
            },
            Frame::VolumeMax(raw) => match raw.trim().parse() {
                Ok(max) => {
                    self.volume_max = max;
                    self.clamp_if_on();
                }
                Err(_) => tracing::debug!("Ignoring volume_max frame: {}", raw),
            },
            Frame::Source(source) => {
                let changed = self.source != source;
                self.source = source;

                if !connecting && self.should_notify(changed) {
                    reaction.events.push(DeviceEvent::Source(self.source.clone()));
                }
            }
            Frame::Mute(raw) => {
                let muted = raw == "on";
                let changed = self.muted != muted;
                self.muted = muted;

                if !connecting && self.should_notify(changed) {
                    reaction.events.push(DeviceEvent::Mute(muted));
                }
            }
            Frame::Power(raw) => {
                let was_on = self.power.is_on();
                let power = Power::from_token(&raw);
                let changed = self.power != power;
                self.power = power;
                self.clamp_if_on();

                if connecting {
                    if !self.power.is_on() {
                        self.complete_handshake(&mut reaction);
                    }
                } else if changed {
                    reaction.events.push(DeviceEvent::Power(self.power.clone()));
                    if self.power.is_on() {
                        reaction.events.push(DeviceEvent::Volume(self.volume));
                    }
                }

                if !was_on && self.power.is_on() {
                    reaction
                        .queries
                        .extend_from_slice(Query::power_on_refresh(self.dialect));
                }
            }
        }

        reaction
    }

    fn decode_volume(&self, raw: &str) -> Option<Volume> {
        let volume = if raw == "max" {
            self.volume_max
        } else {
            raw.trim().parse().ok()?
        };

        if self.power.is_on() {
            Some(self.clamp_volume(volume))
        } else {
            Some(volume)
        }
    }

    /// Keep the stored volume inside the bounds while powered on
    fn clamp_if_on(&mut self) {
        if self.power.is_on() {
            self.volume = self.clamp_volume(self.volume);
        }
    }

    fn should_notify(&self, changed: bool) -> bool {
        match self.dialect {
            Dialect::V2 => changed,
            Dialect::Legacy => true,
        }
    }

    fn complete_handshake(&mut self, reaction: &mut Reaction) {
        self.phase = ConnectionPhase::Connected;
        reaction.events.push(DeviceEvent::Connected(self.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ReceiveBuffer;

    fn connecting(dialect: Dialect) -> DeviceState {
        let mut state = DeviceState::new(dialect);
        state.phase = ConnectionPhase::Connecting;
        state
    }

    fn connected(dialect: Dialect, power: Power) -> DeviceState {
        let mut state = DeviceState::new(dialect);
        state.phase = ConnectionPhase::Connected;
        state.power = power;
        state
    }

    #[test]
    fn legacy_volume_completes_handshake() {
        let mut state = connecting(Dialect::Legacy);
        let mut buffer = ReceiveBuffer::new();
        buffer.push(b"volume=050!");

        let frames = buffer.extract(Dialect::Legacy).frames;
        assert_eq!(frames, vec![Frame::Volume("050".into())]);

        let reaction = state.apply(frames.into_iter().next().unwrap());
        assert_eq!(state.phase, ConnectionPhase::Connected);
        assert_eq!(state.volume, 50);
        assert_eq!(reaction.events.len(), 1);
        match &reaction.events[0] {
            DeviceEvent::Connected(snapshot) => {
                assert_eq!(snapshot.volume, 50);
                assert_eq!(snapshot.volume_min, 1);
                assert_eq!(snapshot.volume_max, 96);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn standby_power_completes_handshake() {
        let mut state = connecting(Dialect::V2);
        let reaction = state.apply(Frame::Power("standby".into()));
        assert_eq!(state.phase, ConnectionPhase::Connected);
        assert!(matches!(
            reaction.events.as_slice(),
            [DeviceEvent::Connected(snapshot)] if snapshot.power == Power::Standby
        ));
        assert!(reaction.queries.is_empty());
    }

    #[test]
    fn power_on_while_connecting_refreshes_without_connecting() {
        let mut state = connecting(Dialect::V2);
        let reaction = state.apply(Frame::Power("on".into()));
        assert_eq!(state.phase, ConnectionPhase::Connecting);
        assert!(reaction.events.is_empty());
        assert_eq!(reaction.queries, vec![Query::Mute, Query::Source, Query::Volume]);

        // Fields arriving before the volume reply stay silent
        assert!(state.apply(Frame::Mute("on".into())).events.is_empty());
        assert!(state.apply(Frame::Source("opt2".into())).events.is_empty());

        let reaction = state.apply(Frame::Volume("30".into()));
        assert!(matches!(
            reaction.events.as_slice(),
            [DeviceEvent::Connected(snapshot)]
                if snapshot.muted && snapshot.source == "opt2" && snapshot.volume == 30
        ));
    }

    #[test]
    fn volume_max_decodes_to_upper_bound() {
        let mut state = connected(Dialect::V2, Power::On);
        let reaction = state.apply(Frame::Volume("max".into()));
        assert_eq!(state.volume, 96);
        assert_eq!(reaction.events, vec![DeviceEvent::Volume(96)]);

        let mut legacy = connected(Dialect::Legacy, Power::On);
        legacy.apply(Frame::VolumeMax("80".into()));
        legacy.apply(Frame::Volume("max".into()));
        assert_eq!(legacy.volume, 80);
    }

    #[test]
    fn volume_is_clamped_while_on() {
        let mut state = connected(Dialect::Legacy, Power::On);
        state.apply(Frame::VolumeMin("5".into()));
        state.apply(Frame::Volume("2".into()));
        assert_eq!(state.volume, 5);
    }

    #[test]
    fn v2_reports_only_changes() {
        let mut state = connected(Dialect::V2, Power::On);
        assert_eq!(
            state.apply(Frame::Volume("20".into())).events,
            vec![DeviceEvent::Volume(20)]
        );
        assert!(state.apply(Frame::Volume("20".into())).events.is_empty());

        assert_eq!(
            state.apply(Frame::Source("aux".into())).events,
            vec![DeviceEvent::Source("aux".into())]
        );
        assert!(state.apply(Frame::Source("aux".into())).events.is_empty());

        assert!(state.apply(Frame::Mute("off".into())).events.is_empty());
        assert_eq!(
            state.apply(Frame::Mute("on".into())).events,
            vec![DeviceEvent::Mute(true)]
        );
    }

    #[test]
    fn legacy_reports_every_frame() {
        let mut state = connected(Dialect::Legacy, Power::On);
        for _ in 0..2 {
            assert_eq!(
                state.apply(Frame::Volume("20".into())).events,
                vec![DeviceEvent::Volume(20)]
            );
            assert_eq!(
                state.apply(Frame::Mute("off".into())).events,
                vec![DeviceEvent::Mute(false)]
            );
            assert_eq!(
                state.apply(Frame::Source("cd".into())).events,
                vec![DeviceEvent::Source("cd".into())]
            );
        }
    }

    #[test]
    fn bounds_update_silently() {
        let mut state = connected(Dialect::Legacy, Power::On);
        let reaction = state.apply(Frame::VolumeMax("80".into()));
        assert_eq!(reaction, Reaction::default());
        assert_eq!(state.volume_max, 80);
    }

    #[test]
    fn rising_power_edge_refreshes_once() {
        let mut state = connected(Dialect::Legacy, Power::Standby);
        state.volume = 12;

        let reaction = state.apply(Frame::Power("on".into()));
        assert_eq!(
            reaction.events,
            vec![DeviceEvent::Power(Power::On), DeviceEvent::Volume(12)]
        );
        assert_eq!(
            reaction.queries,
            vec![
                Query::VolumeMin,
                Query::VolumeMax,
                Query::Mute,
                Query::Source,
                Query::Volume,
            ]
        );

        let reaction = state.apply(Frame::Power("on".into()));
        assert_eq!(reaction, Reaction::default());
    }

    #[test]
    fn power_on_clamps_stored_volume() {
        let mut state = connected(Dialect::V2, Power::Standby);
        assert_eq!(state.volume, 0);

        let reaction = state.apply(Frame::Power("on".into()));
        assert_eq!(state.volume, 1);
        assert_eq!(
            reaction.events,
            vec![DeviceEvent::Power(Power::On), DeviceEvent::Volume(1)]
        );
    }

    #[test]
    fn narrowed_bounds_clamp_stored_volume() {
        let mut state = connected(Dialect::Legacy, Power::On);
        state.apply(Frame::Volume("90".into()));
        assert_eq!(state.volume, 90);

        let reaction = state.apply(Frame::VolumeMax("80".into()));
        assert_eq!(reaction, Reaction::default());
        assert_eq!(state.volume, 80);

        state.apply(Frame::Volume("10".into()));
        state.apply(Frame::VolumeMin("20".into()));
        assert_eq!(state.volume, 20);
    }

    #[test]
    fn bounds_do_not_clamp_in_standby() {
        let mut state = connected(Dialect::Legacy, Power::Standby);
        state.apply(Frame::Volume("90".into()));
        state.apply(Frame::VolumeMax("80".into()));
        assert_eq!(state.volume, 90);
    }

    #[test]
    fn power_off_is_reported() {
        let mut state = connected(Dialect::V2, Power::On);
        let reaction = state.apply(Frame::Power("standby".into()));
        assert_eq!(reaction.events, vec![DeviceEvent::Power(Power::Standby)]);
        assert!(reaction.queries.is_empty());
    }

    #[test]
    fn garbage_volume_is_dropped() {
        let mut state = connecting(Dialect::V2);
        let reaction = state.apply(Frame::Volume("loud".into()));
        assert_eq!(reaction, Reaction::default());
        assert_eq!(state.phase, ConnectionPhase::Connecting);
    }
}
