//! MIDI controller routing.
//!
//! Raw messages are decoded, matched against user mappings and turned into
//! commands targeted at audio modules. The latest command per target is kept
//! on a [`CommandBus`] for modules to pick up.

use crate::content::new_id;
use crate::storage::{Collection, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long learn mode waits for a message before giving up.
pub const LEARN_TIMEOUT: Duration = Duration::from_secs(10);

const STATUS_CONTROL_CHANGE: u8 = 0xB0;
const STATUS_NOTE_ON: u8 = 0x90;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MidiError {
    #[error("Unknown MIDI mapping: {0}")]
    UnknownMapping(String),
}

/// Kinds of MIDI messages that can drive a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Cc,
    Note,
}

/// A decoded control change or note-on message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiMessage {
    pub message_type: MessageType,
    /// MIDI channel, 0-15.
    pub channel: u8,
    /// Controller or note number.
    pub number: u8,
    /// Controller value or note velocity.
    pub value: u8,
}

impl MidiMessage {
    /// Decode a raw message. Returns `None` for short messages and for
    /// anything other than control change and note-on.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let [status, number, value, ..] = *bytes else {
            return None;
        };
        let message_type = match status & 0xF0 {
            STATUS_CONTROL_CHANGE => MessageType::Cc,
            STATUS_NOTE_ON => MessageType::Note,
            _ => return None,
        };
        Some(Self {
            message_type,
            channel: status & 0x0F,
            number,
            value,
        })
    }

    /// Value scaled to `[0, 1]`.
    pub fn normalized(&self) -> f64 {
        f64::from(self.value) / 127.0
    }

    /// A note-on with velocity zero, which controllers send as note-off.
    pub fn is_note_off(&self) -> bool {
        self.message_type == MessageType::Note && self.value == 0
    }
}

/// What a mapping controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MidiTarget {
    AudioChannelVolume,
    AudioChannelPlay,
    AudioSceneChannelVolume,
    AudioSceneMaster,
}

/// Binds one controller input to a module control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiMapping {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub message_type: MessageType,
    pub midi_channel: u8,
    pub cc_number: u8,
    pub target_type: MidiTarget,
    /// Module the mapping drives.
    pub node_id: String,
    /// Channel inside an audio scene, for channel volume targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl MidiMapping {
    /// A mapping on CC 0 of channel 0, usually followed by learn mode.
    pub fn new(label: impl Into<String>, target_type: MidiTarget, node_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            label: label.into(),
            message_type: MessageType::Cc,
            midi_channel: 0,
            cc_number: 0,
            target_type,
            node_id: node_id.into(),
            channel_id: None,
        }
    }

    pub fn matches(&self, message: &MidiMessage) -> bool {
        self.message_type == message.message_type
            && self.midi_channel == message.channel
            && self.cc_number == message.number
    }

    /// Command this mapping produces for `message`, if any.
    fn command_for(&self, message: &MidiMessage) -> Option<MidiCommand> {
        match self.target_type {
            MidiTarget::AudioChannelVolume | MidiTarget::AudioSceneChannelVolume => {
                Some(MidiCommand::SetVolume {
                    value: message.normalized(),
                })
            }
            MidiTarget::AudioChannelPlay | MidiTarget::AudioSceneMaster => {
                if message.is_note_off() {
                    None
                } else {
                    Some(MidiCommand::TogglePlay)
                }
            }
        }
    }
}

impl Record for MidiMapping {
    const COLLECTION: Collection = Collection::MidiMappings;

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A command for an audio module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MidiCommand {
    /// Set the volume, `[0, 1]`.
    SetVolume { value: f64 },
    TogglePlay,
    Stop,
}

/// A command addressed to a module, or to a channel inside an audio scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(flatten)]
    pub command: MidiCommand,
    /// Monotonic sequence number; a higher value is a newer command.
    pub seq: u64,
}

/// Latest command per module and per audio scene channel.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandBus {
    commands: HashMap<String, Dispatch>,
    /// Keyed by `node_id:channel_id`.
    channel_commands: HashMap<String, Dispatch>,
    seq: u64,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn dispatch(&mut self, node_id: &str, command: MidiCommand) -> Dispatch {
        let dispatch = Dispatch {
            node_id: node_id.to_string(),
            channel_id: None,
            command,
            seq: self.next_seq(),
        };
        self.commands.insert(node_id.to_string(), dispatch.clone());
        dispatch
    }

    pub fn dispatch_channel(
        &mut self,
        node_id: &str,
        channel_id: &str,
        command: MidiCommand,
    ) -> Dispatch {
        let dispatch = Dispatch {
            node_id: node_id.to_string(),
            channel_id: Some(channel_id.to_string()),
            command,
            seq: self.next_seq(),
        };
        self.channel_commands
            .insert(format!("{node_id}:{channel_id}"), dispatch.clone());
        dispatch
    }

    pub fn latest(&self, node_id: &str) -> Option<&Dispatch> {
        self.commands.get(node_id)
    }

    pub fn latest_channel(&self, node_id: &str, channel_id: &str) -> Option<&Dispatch> {
        self.channel_commands.get(&format!("{node_id}:{channel_id}"))
    }

    /// Sequence number of the most recent command.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Drop the commands addressed to a deleted module.
    pub fn forget_node(&mut self, node_id: &str) {
        self.commands.remove(node_id);
        let prefix = format!("{node_id}:");
        self.channel_commands.retain(|key, _| !key.starts_with(&prefix));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LearnState {
    mapping_id: String,
    deadline: Instant,
}

/// Result of feeding one raw message to the router.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Not a CC or note-on message, or nothing matched.
    Ignored,
    /// Learn mode assigned the message to this mapping.
    Learned(MidiMapping),
    /// Commands emitted for the matching mappings.
    Dispatched(Vec<Dispatch>),
}

/// Holds the mappings, the learn state and the command bus.
#[derive(Debug, Default)]
pub struct MidiRouter {
    mappings: Vec<MidiMapping>,
    learn: Option<LearnState>,
    bus: CommandBus,
}

impl MidiRouter {
    pub fn new(mappings: Vec<MidiMapping>) -> Self {
        Self {
            mappings,
            learn: None,
            bus: CommandBus::new(),
        }
    }

    pub fn mappings(&self) -> &[MidiMapping] {
        &self.mappings
    }

    pub fn mapping(&self, id: &str) -> Option<&MidiMapping> {
        self.mappings.iter().find(|m| m.id == id)
    }

    /// Add a mapping, or replace the one with the same id.
    pub fn upsert_mapping(&mut self, mapping: MidiMapping) {
        match self.mappings.iter_mut().find(|m| m.id == mapping.id) {
            Some(existing) => *existing = mapping,
            None => self.mappings.push(mapping),
        }
    }

    pub fn remove_mapping(&mut self, id: &str) -> Result<MidiMapping, MidiError> {
        let index = self
            .mappings
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| MidiError::UnknownMapping(id.to_string()))?;
        if self.learn.as_ref().is_some_and(|l| l.mapping_id == id) {
            self.learn = None;
        }
        Ok(self.mappings.remove(index))
    }

    /// Remove every mapping that drives `node_id`.
    pub fn remove_mappings_for_node(&mut self, node_id: &str) -> Vec<MidiMapping> {
        let (removed, kept) = std::mem::take(&mut self.mappings)
            .into_iter()
            .partition(|m| m.node_id == node_id);
        self.mappings = kept;
        self.bus.forget_node(node_id);
        removed
    }

    /// Enter learn mode: the next message received before the deadline is
    /// assigned to the mapping. Replaces any learn already in progress.
    pub fn start_learn(&mut self, mapping_id: &str, now: Instant) -> Result<(), MidiError> {
        if self.mapping(mapping_id).is_none() {
            return Err(MidiError::UnknownMapping(mapping_id.to_string()));
        }
        self.learn = Some(LearnState {
            mapping_id: mapping_id.to_string(),
            deadline: now + LEARN_TIMEOUT,
        });
        log::debug!("Learning MIDI input for mapping {}", mapping_id);
        Ok(())
    }

    pub fn cancel_learn(&mut self) {
        self.learn = None;
    }

    /// Mapping currently in learn mode, if the deadline has not passed.
    pub fn learning(&self, now: Instant) -> Option<&str> {
        self.learn
            .as_ref()
            .filter(|l| now < l.deadline)
            .map(|l| l.mapping_id.as_str())
    }

    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    /// Route a raw message received at `now`.
    pub fn handle(&mut self, bytes: &[u8], now: Instant) -> RouteOutcome {
        let Some(message) = MidiMessage::decode(bytes) else {
            return RouteOutcome::Ignored;
        };

        if let Some(learn) = self.learn.take() {
            if now < learn.deadline {
                if let Some(mapping) = self.mappings.iter_mut().find(|m| m.id == learn.mapping_id) {
                    mapping.message_type = message.message_type;
                    mapping.midi_channel = message.channel;
                    mapping.cc_number = message.number;
                    log::info!(
                        "Mapped {:?} {} on channel {} to {}",
                        message.message_type,
                        message.number,
                        message.channel,
                        mapping.label
                    );
                    return RouteOutcome::Learned(mapping.clone());
                }
            }
        }

        let mut dispatched = Vec::new();
        for mapping in self.mappings.iter().filter(|m| m.matches(&message)) {
            let Some(command) = mapping.command_for(&message) else {
                continue;
            };
            match mapping.target_type {
                MidiTarget::AudioSceneChannelVolume => {
                    if let Some(channel_id) = &mapping.channel_id {
                        dispatched.push(self.bus.dispatch_channel(&mapping.node_id, channel_id, command));
                    }
                }
                _ => dispatched.push(self.bus.dispatch(&mapping.node_id, command)),
            }
        }

        if dispatched.is_empty() {
            RouteOutcome::Ignored
        } else {
            RouteOutcome::Dispatched(dispatched)
        }
    }

    /// Route a raw message received now.
    pub fn handle_message(&mut self, bytes: &[u8]) -> RouteOutcome {
        self.handle(bytes, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(target: MidiTarget, node: &str, number: u8) -> MidiMapping {
        let mut mapping = MidiMapping::new("knob", target, node);
        mapping.cc_number = number;
        mapping
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            MidiMessage::decode(&[0xB3, 7, 100]),
            Some(MidiMessage {
                message_type: MessageType::Cc,
                channel: 3,
                number: 7,
                value: 100
            })
        );
        assert_eq!(
            MidiMessage::decode(&[0x90, 60, 0]).map(|m| m.message_type),
            Some(MessageType::Note)
        );
        // Note-off and pitch bend are not handled.
        assert_eq!(MidiMessage::decode(&[0x80, 60, 0]), None);
        assert_eq!(MidiMessage::decode(&[0xE0, 0, 64]), None);
        // Too short.
        assert_eq!(MidiMessage::decode(&[0xB0, 7]), None);
    }

    #[test]
    fn test_volume_mapping_scales_value() {
        let mut router = MidiRouter::new(vec![mapping(MidiTarget::AudioChannelVolume, "n1", 7)]);
        let outcome = router.handle(&[0xB0, 7, 127], Instant::now());

        let RouteOutcome::Dispatched(dispatched) = outcome else {
            panic!("expected a dispatch");
        };
        assert_eq!(dispatched[0].command, MidiCommand::SetVolume { value: 1.0 });
        assert_eq!(router.bus().latest("n1").map(|d| d.seq), Some(1));
    }

    #[test]
    fn test_other_channel_is_ignored() {
        let mut router = MidiRouter::new(vec![mapping(MidiTarget::AudioChannelVolume, "n1", 7)]);
        assert_eq!(router.handle(&[0xB1, 7, 64], Instant::now()), RouteOutcome::Ignored);
        assert_eq!(router.bus().seq(), 0);
    }

    #[test]
    fn test_play_ignores_zero_velocity_note() {
        let mut play = mapping(MidiTarget::AudioChannelPlay, "n1", 60);
        play.message_type = MessageType::Note;
        let mut router = MidiRouter::new(vec![play]);

        assert_eq!(router.handle(&[0x90, 60, 0], Instant::now()), RouteOutcome::Ignored);
        let outcome = router.handle(&[0x90, 60, 90], Instant::now());
        assert!(matches!(outcome, RouteOutcome::Dispatched(ref d) if d[0].command == MidiCommand::TogglePlay));
    }

    #[test]
    fn test_channel_volume_needs_channel_id() {
        let without = mapping(MidiTarget::AudioSceneChannelVolume, "scene-node", 1);
        let mut with = mapping(MidiTarget::AudioSceneChannelVolume, "scene-node", 2);
        with.channel_id = Some("ch1".to_string());
        let mut router = MidiRouter::new(vec![without, with]);

        assert_eq!(router.handle(&[0xB0, 1, 64], Instant::now()), RouteOutcome::Ignored);
        router.handle(&[0xB0, 2, 64], Instant::now());
        let latest = router.bus().latest_channel("scene-node", "ch1").unwrap();
        assert_eq!(latest.channel_id.as_deref(), Some("ch1"));
        assert!(router.bus().latest("scene-node").is_none());
    }

    #[test]
    fn test_seq_is_monotonic_across_targets() {
        let mut router = MidiRouter::new(vec![
            mapping(MidiTarget::AudioChannelVolume, "a", 1),
            mapping(MidiTarget::AudioChannelVolume, "b", 1),
        ]);
        router.handle(&[0xB0, 1, 10], Instant::now());
        router.handle(&[0xB0, 1, 20], Instant::now());

        assert_eq!(router.bus().latest("a").map(|d| d.seq), Some(3));
        assert_eq!(router.bus().latest("b").map(|d| d.seq), Some(4));
    }

    #[test]
    fn test_learn_assigns_next_message() {
        let target = mapping(MidiTarget::AudioChannelVolume, "n1", 0);
        let id = target.id.clone();
        let mut router = MidiRouter::new(vec![target]);
        let start = Instant::now();

        router.start_learn(&id, start).unwrap();
        assert_eq!(router.learning(start), Some(id.as_str()));

        let outcome = router.handle(&[0xB5, 21, 3], start + Duration::from_secs(2));
        let RouteOutcome::Learned(learned) = outcome else {
            panic!("expected learn");
        };
        assert_eq!((learned.midi_channel, learned.cc_number), (5, 21));
        assert_eq!(router.learning(start), None);

        // The learned input now drives the mapping.
        assert!(matches!(
            router.handle(&[0xB5, 21, 64], start),
            RouteOutcome::Dispatched(_)
        ));
    }

    #[test]
    fn test_learn_times_out() {
        let target = mapping(MidiTarget::AudioChannelVolume, "n1", 0);
        let id = target.id.clone();
        let mut router = MidiRouter::new(vec![target]);
        let start = Instant::now();

        router.start_learn(&id, start).unwrap();
        let late = start + LEARN_TIMEOUT + Duration::from_millis(1);
        assert_eq!(router.learning(late), None);

        // Expired learn does not capture the message.
        let outcome = router.handle(&[0xB2, 9, 1], late);
        assert_eq!(outcome, RouteOutcome::Ignored);
        assert_eq!(router.mapping(&id).map(|m| m.cc_number), Some(0));
    }

    #[test]
    fn test_learn_unknown_mapping() {
        let mut router = MidiRouter::default();
        assert_eq!(
            router.start_learn("nope", Instant::now()),
            Err(MidiError::UnknownMapping("nope".to_string()))
        );
    }

    #[test]
    fn test_remove_mappings_for_node() {
        let mut router = MidiRouter::new(vec![
            mapping(MidiTarget::AudioChannelVolume, "a", 1),
            mapping(MidiTarget::AudioChannelPlay, "a", 2),
            mapping(MidiTarget::AudioChannelVolume, "b", 3),
        ]);
        router.handle(&[0xB0, 1, 1], Instant::now());

        let removed = router.remove_mappings_for_node("a");
        assert_eq!(removed.len(), 2);
        assert_eq!(router.mappings().len(), 1);
        assert!(router.bus().latest("a").is_none());
    }

    #[test]
    fn test_dispatch_wire_format() {
        let mut bus = CommandBus::new();
        let dispatch = bus.dispatch("n1", MidiCommand::SetVolume { value: 0.5 });
        let json = serde_json::to_value(&dispatch).unwrap();
        assert_eq!(json["type"], "setVolume");
        assert_eq!(json["value"], 0.5);
        assert_eq!(json["nodeId"], "n1");
        assert_eq!(json["seq"], 1);
    }
}
