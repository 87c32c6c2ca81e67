// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use indexmap::IndexMap;
use serde::Serialize;

use crate::mapping::{CharacterField, PlayerField};

/// The content of a single spreadsheet cell.
///
/// Survey answers are untyped: the same column may hold numbers for some
/// respondents and free text for others. Blank cells are always `Empty`.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    /// Builds a value out of the textual content of a cell.
    /// Whitespace-only content is treated as a blank cell.
    pub fn from_text(s: &str) -> Value {
        if s.trim().is_empty() {
            Value::Empty
        } else {
            Value::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text cells are parsed, since remote sheets
    /// return every answer as a formatted string.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(_) | Value::Empty => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::from_text(s)
    }
}

/// Keyed access shared by the two halves of an entry.
pub trait Record {
    /// The canonical names of the columns this record received, in survey order.
    fn keys(&self) -> Vec<&str>;

    fn value(&self, key: &str) -> Option<&Value>;
}

// ******** Records *********

/// The fictional character described in one survey response.
///
/// A field is `None` when the source table had no such column, and
/// `Some(Value::Empty)` when the respondent left the answer blank.
#[derive(PartialEq, Debug, Clone, Default, Serialize)]
pub struct Character {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(rename = "Recentness", skip_serializing_if = "Option::is_none")]
    pub recentness: Option<Value>,
    #[serde(rename = "Gender", skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,
    #[serde(rename = "Age", skip_serializing_if = "Option::is_none")]
    pub age: Option<Value>,
    #[serde(rename = "Is Dead", skip_serializing_if = "Option::is_none")]
    pub is_dead: Option<Value>,
    #[serde(rename = "Race", skip_serializing_if = "Option::is_none")]
    pub race: Option<Value>,
    #[serde(rename = "Classes", skip_serializing_if = "Option::is_none")]
    pub classes: Option<Value>,
    #[serde(rename = "Subclass", skip_serializing_if = "Option::is_none")]
    pub subclass: Option<Value>,
    #[serde(rename = "Level", skip_serializing_if = "Option::is_none")]
    pub level: Option<Value>,
    #[serde(rename = "Not Milestone", skip_serializing_if = "Option::is_none")]
    pub not_milestone: Option<Value>,
    #[serde(rename = "Alignment", skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Value>,
    #[serde(rename = "Gen Method", skip_serializing_if = "Option::is_none")]
    pub gen_method: Option<Value>,
    #[serde(rename = "Scores Assigned", skip_serializing_if = "Option::is_none")]
    pub scores_assigned: Option<Value>,
    #[serde(rename = "STR", skip_serializing_if = "Option::is_none")]
    pub strength: Option<Value>,
    #[serde(rename = "DEX", skip_serializing_if = "Option::is_none")]
    pub dexterity: Option<Value>,
    #[serde(rename = "CON", skip_serializing_if = "Option::is_none")]
    pub constitution: Option<Value>,
    #[serde(rename = "INT", skip_serializing_if = "Option::is_none")]
    pub intelligence: Option<Value>,
    #[serde(rename = "WIS", skip_serializing_if = "Option::is_none")]
    pub wisdom: Option<Value>,
    #[serde(rename = "CHA", skip_serializing_if = "Option::is_none")]
    pub charisma: Option<Value>,
    #[serde(rename = "HP", skip_serializing_if = "Option::is_none")]
    pub hit_points: Option<Value>,
    #[serde(rename = "AC", skip_serializing_if = "Option::is_none")]
    pub armor_class: Option<Value>,
    #[serde(rename = "Gold", skip_serializing_if = "Option::is_none")]
    pub gold: Option<Value>,
    #[serde(rename = "Skills", skip_serializing_if = "Option::is_none")]
    pub skills: Option<Value>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
}

impl Character {
    /// Builds a character from canonical field names.
    ///
    /// Names that are not character attributes are rejected.
    pub fn from_fields<'a, I>(fields: I) -> Result<Character, StudyErrors>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut res = Character::default();
        for (name, value) in fields {
            let field = CharacterField::from_name(name)
                .ok_or_else(|| StudyErrors::UnknownField(name.to_string()))?;
            res.set(field, value);
        }
        Ok(res)
    }

    pub fn get(&self, field: CharacterField) -> Option<&Value> {
        self.slot(field).as_ref()
    }

    pub fn set(&mut self, field: CharacterField, value: Value) {
        *self.slot_mut(field) = Some(value);
    }

    fn slot(&self, field: CharacterField) -> &Option<Value> {
        match field {
            CharacterField::Name => &self.name,
            CharacterField::Recentness => &self.recentness,
            CharacterField::Gender => &self.gender,
            CharacterField::Age => &self.age,
            CharacterField::IsDead => &self.is_dead,
            CharacterField::Race => &self.race,
            CharacterField::Classes => &self.classes,
            CharacterField::Subclass => &self.subclass,
            CharacterField::Level => &self.level,
            CharacterField::NotMilestone => &self.not_milestone,
            CharacterField::Alignment => &self.alignment,
            CharacterField::GenMethod => &self.gen_method,
            CharacterField::ScoresAssigned => &self.scores_assigned,
            CharacterField::Str => &self.strength,
            CharacterField::Dex => &self.dexterity,
            CharacterField::Con => &self.constitution,
            CharacterField::Int => &self.intelligence,
            CharacterField::Wis => &self.wisdom,
            CharacterField::Cha => &self.charisma,
            CharacterField::Hp => &self.hit_points,
            CharacterField::Ac => &self.armor_class,
            CharacterField::Gold => &self.gold,
            CharacterField::Skills => &self.skills,
            CharacterField::Description => &self.description,
        }
    }

    fn slot_mut(&mut self, field: CharacterField) -> &mut Option<Value> {
        match field {
            CharacterField::Name => &mut self.name,
            CharacterField::Recentness => &mut self.recentness,
            CharacterField::Gender => &mut self.gender,
            CharacterField::Age => &mut self.age,
            CharacterField::IsDead => &mut self.is_dead,
            CharacterField::Race => &mut self.race,
            CharacterField::Classes => &mut self.classes,
            CharacterField::Subclass => &mut self.subclass,
            CharacterField::Level => &mut self.level,
            CharacterField::NotMilestone => &mut self.not_milestone,
            CharacterField::Alignment => &mut self.alignment,
            CharacterField::GenMethod => &mut self.gen_method,
            CharacterField::ScoresAssigned => &mut self.scores_assigned,
            CharacterField::Str => &mut self.strength,
            CharacterField::Dex => &mut self.dexterity,
            CharacterField::Con => &mut self.constitution,
            CharacterField::Int => &mut self.intelligence,
            CharacterField::Wis => &mut self.wisdom,
            CharacterField::Cha => &mut self.charisma,
            CharacterField::Hp => &mut self.hit_points,
            CharacterField::Ac => &mut self.armor_class,
            CharacterField::Gold => &mut self.gold,
            CharacterField::Skills => &mut self.skills,
            CharacterField::Description => &mut self.description,
        }
    }
}

impl Record for Character {
    fn keys(&self) -> Vec<&str> {
        CharacterField::ALL
            .iter()
            .filter(|f| self.get(**f).is_some())
            .map(|f| f.name())
            .collect()
    }

    fn value(&self, key: &str) -> Option<&Value> {
        CharacterField::from_name(key).and_then(|f| self.get(f))
    }
}

/// The respondent behind one survey response.
///
/// Columns that matched no known question are kept in `unmapped`, keyed by
/// their original header in source column order, unless the study excludes them.
#[derive(PartialEq, Debug, Clone, Default, Serialize)]
pub struct Player {
    #[serde(rename = "Timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(rename = "Player Age", skip_serializing_if = "Option::is_none")]
    pub age: Option<Value>,
    #[serde(rename = "Player Gender", skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,
    #[serde(rename = "Player Education", skip_serializing_if = "Option::is_none")]
    pub education: Option<Value>,
    #[serde(rename = "Player Experience", skip_serializing_if = "Option::is_none")]
    pub experience: Option<Value>,
    #[serde(rename = "Player RP Enjoyment", skip_serializing_if = "Option::is_none")]
    pub rp_enjoyment: Option<Value>,
    #[serde(
        rename = "Player Mechanical Enjoyment",
        skip_serializing_if = "Option::is_none"
    )]
    pub mechanical_enjoyment: Option<Value>,
    #[serde(
        rename = "Player Character Optimization",
        skip_serializing_if = "Option::is_none"
    )]
    pub character_optimization: Option<Value>,
    #[serde(rename = "Meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(flatten)]
    pub unmapped: IndexMap<String, Value>,
}

impl Player {
    /// Builds a player from canonical field names.
    ///
    /// Unlike characters, players accept any other name: it is stored as an
    /// unmapped column, unless it is a character attribute.
    pub fn from_fields<'a, I>(fields: I) -> Result<Player, StudyErrors>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut res = Player::default();
        for (name, value) in fields {
            if let Some(field) = PlayerField::from_name(name) {
                res.set(field, value);
            } else if CharacterField::from_name(name).is_some() {
                return Err(StudyErrors::UnknownField(name.to_string()));
            } else {
                res.unmapped.insert(name.to_string(), value);
            }
        }
        Ok(res)
    }

    pub fn get(&self, field: PlayerField) -> Option<&Value> {
        self.slot(field).as_ref()
    }

    pub fn set(&mut self, field: PlayerField, value: Value) {
        *self.slot_mut(field) = Some(value);
    }

    fn slot(&self, field: PlayerField) -> &Option<Value> {
        match field {
            PlayerField::Timestamp => &self.timestamp,
            PlayerField::Age => &self.age,
            PlayerField::Gender => &self.gender,
            PlayerField::Education => &self.education,
            PlayerField::Experience => &self.experience,
            PlayerField::RpEnjoyment => &self.rp_enjoyment,
            PlayerField::MechanicalEnjoyment => &self.mechanical_enjoyment,
            PlayerField::CharacterOptimization => &self.character_optimization,
            PlayerField::Meta => &self.meta,
        }
    }

    fn slot_mut(&mut self, field: PlayerField) -> &mut Option<Value> {
        match field {
            PlayerField::Timestamp => &mut self.timestamp,
            PlayerField::Age => &mut self.age,
            PlayerField::Gender => &mut self.gender,
            PlayerField::Education => &mut self.education,
            PlayerField::Experience => &mut self.experience,
            PlayerField::RpEnjoyment => &mut self.rp_enjoyment,
            PlayerField::MechanicalEnjoyment => &mut self.mechanical_enjoyment,
            PlayerField::CharacterOptimization => &mut self.character_optimization,
            PlayerField::Meta => &mut self.meta,
        }
    }
}

impl Record for Player {
    fn keys(&self) -> Vec<&str> {
        let mut res: Vec<&str> = PlayerField::ALL
            .iter()
            .filter(|f| self.get(**f).is_some())
            .map(|f| f.name())
            .collect();
        res.extend(self.unmapped.keys().map(|k| k.as_str()));
        res
    }

    fn value(&self, key: &str) -> Option<&Value> {
        match PlayerField::from_name(key) {
            Some(f) => self.get(f),
            None => self.unmapped.get(key),
        }
    }
}

/// A single response of the survey: a character and the player who described it.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct Entry {
    character: Character,
    player: Player,
}

impl Entry {
    pub fn new(character: Character, player: Player) -> Entry {
        Entry { character, player }
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn into_parts(self) -> (Character, Player) {
        (self.character, self.player)
    }
}

// ********* Configuration **********

/// What to do with the columns whose header matches no known question.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UnmappedPolicy {
    /// File them under the player, keyed by their original header.
    KeepInPlayer,
    /// Leave them out of the records. They stay in the study table.
    Exclude,
}

impl Default for UnmappedPolicy {
    fn default() -> Self {
        UnmappedPolicy::KeepInPlayer
    }
}

/// Errors that prevent a study from being built.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StudyErrors {
    /// The source has no header row.
    MissingHeader,
    /// Two source columns were renamed to the same canonical name.
    DuplicateColumn(String),
    /// A record was given a field name it does not own.
    UnknownField(String),
}

impl Error for StudyErrors {}

impl Display for StudyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudyErrors::MissingHeader => write!(f, "the table has no header row"),
            StudyErrors::DuplicateColumn(name) => {
                write!(f, "more than one column is named {:?} after renaming", name)
            }
            StudyErrors::UnknownField(name) => write!(f, "unknown field {:?}", name),
        }
    }
}
