//! Content records referenced by modules: notes, statblocks, audio and initiative.

use crate::storage::{Collection, Record};
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::OffsetDateTime;
use uuid::Uuid;

/// Current UTC time, used for record timestamps.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Generate a fresh record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A free-form text note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Note {
    /// Create an empty note with the default title.
    pub fn new() -> Self {
        let timestamp = now();
        Self {
            id: new_id(),
            title: "new note".to_string(),
            content: String::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for Note {
    const COLLECTION: Collection = Collection::Notes;

    fn record_id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// Creature size categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreatureSize {
    Tiny,
    Small,
    #[default]
    Medium,
    Large,
    Huge,
    Gargantuan,
}

/// Creature alignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    #[serde(rename = "Lawful Good")]
    LawfulGood,
    #[serde(rename = "Neutral Good")]
    NeutralGood,
    #[serde(rename = "Chaotic Good")]
    ChaoticGood,
    #[serde(rename = "Lawful Neutral")]
    LawfulNeutral,
    #[serde(rename = "True Neutral")]
    TrueNeutral,
    #[serde(rename = "Chaotic Neutral")]
    ChaoticNeutral,
    #[serde(rename = "Lawful Evil")]
    LawfulEvil,
    #[serde(rename = "Neutral Evil")]
    NeutralEvil,
    #[serde(rename = "Chaotic Evil")]
    ChaoticEvil,
    #[default]
    Unaligned,
}

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(rename = "str")]
    pub strength: i32,
    #[serde(rename = "dex")]
    pub dexterity: i32,
    #[serde(rename = "con")]
    pub constitution: i32,
    #[serde(rename = "int")]
    pub intelligence: i32,
    #[serde(rename = "wis")]
    pub wisdom: i32,
    #[serde(rename = "cha")]
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// Modifier for an ability score: `floor((score - 10) / 2)`.
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Format a modifier with an explicit sign, e.g. `+2` or `-1`.
pub fn format_modifier(score: i32) -> String {
    let modifier = ability_modifier(score);
    if modifier >= 0 {
        format!("+{modifier}")
    } else {
        modifier.to_string()
    }
}

/// A creature statblock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statblock {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: CreatureSize,
    #[serde(rename = "type")]
    pub creature_type: String,
    #[serde(default)]
    pub alignment: Alignment,
    pub armor_class: i32,
    pub hit_points: i32,
    pub hit_dice: String,
    pub speed: String,
    #[serde(flatten)]
    pub abilities: AbilityScores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saving_throws: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_resistances: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_immunities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_immunities: Option<String>,
    pub senses: String,
    pub languages: String,
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legendary_actions: Option<String>,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Statblock {
    /// A blank medium humanoid.
    pub fn new() -> Self {
        let timestamp = now();
        Self {
            id: new_id(),
            name: "creature".to_string(),
            size: CreatureSize::Medium,
            creature_type: "Humanoid".to_string(),
            alignment: Alignment::Unaligned,
            armor_class: 10,
            hit_points: 10,
            hit_dice: "2d8".to_string(),
            speed: "30 ft.".to_string(),
            abilities: AbilityScores::default(),
            saving_throws: None,
            skills: None,
            damage_resistances: None,
            damage_immunities: None,
            condition_immunities: None,
            senses: "passive Perception 10".to_string(),
            languages: "Common".to_string(),
            challenge: "0".to_string(),
            traits: None,
            actions: None,
            reactions: None,
            legendary_actions: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}

impl Default for Statblock {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for Statblock {
    const COLLECTION: Collection = Collection::Statblocks;

    fn record_id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// Metadata for an uploaded audio file. The bytes live in blob storage under `filename`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFile {
    pub id: String,
    pub name: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AudioFile {
    /// Describe a new upload of `original_name`.
    ///
    /// The display name is the file stem and the stored filename is the fresh
    /// id plus the original extension.
    pub fn from_upload(original_name: &str) -> Self {
        let id = new_id();
        let path = Path::new(original_name);
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(original_name)
            .to_string();
        let filename = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{id}.{ext}"),
            None => id.clone(),
        };
        Self {
            id,
            name,
            filename,
            duration: None,
            created_at: now(),
        }
    }
}

impl Record for AudioFile {
    const COLLECTION: Collection = Collection::AudioFiles;

    fn record_id(&self) -> &str {
        &self.id
    }
}

fn default_volume() -> f64 {
    0.5
}

fn default_looping() -> bool {
    true
}

/// One track inside an audio scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChannel {
    pub id: String,
    pub audio_file_id: String,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default = "default_looping", rename = "loop")]
    pub looping: bool,
}

impl AudioChannel {
    pub fn new(audio_file_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            audio_file_id: audio_file_id.into(),
            volume: default_volume(),
            looping: default_looping(),
        }
    }
}

/// A named mix of audio channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioScene {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub channels: Vec<AudioChannel>,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl AudioScene {
    pub fn new() -> Self {
        let timestamp = now();
        Self {
            id: new_id(),
            name: "audio scene".to_string(),
            channels: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Append a channel playing `audio_file_id` and return its id.
    pub fn add_channel(&mut self, audio_file_id: impl Into<String>) -> String {
        let channel = AudioChannel::new(audio_file_id);
        let id = channel.id.clone();
        self.channels.push(channel);
        id
    }

    /// Remove a channel. Returns false when no channel has that id.
    pub fn remove_channel(&mut self, channel_id: &str) -> bool {
        let before = self.channels.len();
        self.channels.retain(|c| c.id != channel_id);
        self.channels.len() != before
    }

    pub fn channel(&self, channel_id: &str) -> Option<&AudioChannel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    /// Set a channel volume, clamped to `[0, 1]`.
    pub fn set_channel_volume(&mut self, channel_id: &str, volume: f64) -> bool {
        match self.channels.iter_mut().find(|c| c.id == channel_id) {
            Some(channel) => {
                channel.volume = volume.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }
}

impl Default for AudioScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for AudioScene {
    const COLLECTION: Collection = Collection::AudioScenes;

    fn record_id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// A participant in an initiative tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: String,
    pub name: String,
    pub initiative: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub is_player: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statblock_id: Option<String>,
}

impl Combatant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            initiative: 10,
            hp: 10,
            max_hp: 10,
            ac: 10,
            conditions: Vec::new(),
            is_player: false,
            statblock_id: None,
        }
    }
}

/// Turn order for a combat encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeTracker {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub combatants: Vec<Combatant>,
    #[serde(default)]
    pub current_turn: usize,
    #[serde(default = "first_round")]
    pub round: u32,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn first_round() -> u32 {
    1
}

impl InitiativeTracker {
    pub fn new() -> Self {
        let timestamp = now();
        Self {
            id: new_id(),
            name: "combat".to_string(),
            combatants: Vec::new(),
            current_turn: 0,
            round: first_round(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Advance to the next combatant, starting a new round on wrap-around.
    ///
    /// Does nothing when there are no combatants.
    pub fn next_turn(&mut self) {
        if self.combatants.is_empty() {
            return;
        }
        self.current_turn = (self.current_turn + 1) % self.combatants.len();
        if self.current_turn == 0 {
            self.round += 1;
        }
    }

    /// Restore every combatant to full HP and go back to round 1, turn 0.
    pub fn reset(&mut self) {
        for combatant in &mut self.combatants {
            combatant.hp = combatant.max_hp;
        }
        self.current_turn = 0;
        self.round = first_round();
    }

    /// Apply damage (negative) or healing (positive), clamped to `[0, max_hp]`.
    ///
    /// Returns the new HP, or `None` for an unknown combatant.
    pub fn adjust_hp(&mut self, combatant_id: &str, delta: i32) -> Option<i32> {
        let combatant = self.combatants.iter_mut().find(|c| c.id == combatant_id)?;
        combatant.hp = (combatant.hp + delta).min(combatant.max_hp).max(0);
        Some(combatant.hp)
    }

    /// Order combatants by initiative, highest first. Ties keep their order.
    pub fn sort(&mut self) {
        self.combatants.sort_by(|a, b| b.initiative.cmp(&a.initiative));
    }

    /// Combatants in initiative order, without reordering the tracker.
    pub fn sorted(&self) -> Vec<&Combatant> {
        let mut sorted: Vec<&Combatant> = self.combatants.iter().collect();
        sorted.sort_by(|a, b| b.initiative.cmp(&a.initiative));
        sorted
    }

    pub fn add_combatant(&mut self, combatant: Combatant) {
        self.combatants.push(combatant);
    }

    /// Remove a combatant. The turn pointer goes back to the top if it fell off the end.
    pub fn remove_combatant(&mut self, combatant_id: &str) -> bool {
        let before = self.combatants.len();
        self.combatants.retain(|c| c.id != combatant_id);
        if self.current_turn >= self.combatants.len() {
            self.current_turn = 0;
        }
        self.combatants.len() != before
    }

    /// The combatant whose turn it is.
    pub fn current(&self) -> Option<&Combatant> {
        self.combatants.get(self.current_turn)
    }
}

impl Default for InitiativeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for InitiativeTracker {
    const COLLECTION: Collection = Collection::Initiative;

    fn record_id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// Distance units understood by the calculator module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Feet,
    Meters,
    Squares,
    Miles,
    Km,
}

impl Unit {
    pub const ALL: [Unit; 5] = [Unit::Feet, Unit::Meters, Unit::Squares, Unit::Miles, Unit::Km];

    pub(crate) fn default_from() -> Self {
        Unit::Feet
    }

    pub(crate) fn default_to() -> Self {
        Unit::Meters
    }

    /// Multiplier converting a value in `self` to `to`.
    pub fn factor(self, to: Unit) -> f64 {
        use Unit::*;
        match (self, to) {
            (Feet, Feet) => 1.0,
            (Feet, Meters) => 0.3048,
            (Feet, Squares) => 0.2,
            (Feet, Miles) => 0.000189394,
            (Feet, Km) => 0.0003048,
            (Meters, Feet) => 3.28084,
            (Meters, Meters) => 1.0,
            (Meters, Squares) => 0.65617,
            (Meters, Miles) => 0.000621371,
            (Meters, Km) => 0.001,
            (Squares, Feet) => 5.0,
            (Squares, Meters) => 1.524,
            (Squares, Squares) => 1.0,
            (Squares, Miles) => 0.000946969,
            (Squares, Km) => 0.001524,
            (Miles, Feet) => 5280.0,
            (Miles, Meters) => 1609.34,
            (Miles, Squares) => 1056.0,
            (Miles, Miles) => 1.0,
            (Miles, Km) => 1.60934,
            (Km, Feet) => 3280.84,
            (Km, Meters) => 1000.0,
            (Km, Squares) => 656.168,
            (Km, Miles) => 0.621371,
            (Km, Km) => 1.0,
        }
    }

    pub fn convert(self, value: f64, to: Unit) -> f64 {
        value * self.factor(to)
    }
}

/// Placeholder shown when the calculator input is not a number.
pub const NO_RESULT: &str = "—";

/// Convert user input between units, formatted to two decimals.
///
/// Returns [`NO_RESULT`] when the input does not parse as a finite number.
pub fn format_conversion(input: &str, from: Unit, to: Unit) -> String {
    match input.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => format!("{:.2}", from.convert(value, to)),
        _ => NO_RESULT.to_string(),
    }
}
