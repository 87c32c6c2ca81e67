//! The survey questions and the short names they are known by.
//!
//! The spreadsheet headers are the full text of each question, as written in
//! the form. They are renamed to canonical names before the rows are split
//! between characters and players.

use log::debug;

/// Question text -> canonical name, in the order of the form.
pub const COLUMN_MAPPINGS: [(&str, &str); 33] = [
    ("Timestamp", "Timestamp"),
    ("What is your age?", "Player Age"),
    (
        "With what gender do you identify? (Use \"other\" to self-describe)",
        "Player Gender",
    ),
    (
        "What is the highest degree or level of education you've completed?",
        "Player Education",
    ),
    ("How long have you been playing D&D?", "Player Experience"),
    ("What's your character's name?", "Name"),
    ("When did you last play this character?", "Recentness"),
    (
        "What gender does your character identify as? (Use other to self-identify)",
        "Gender",
    ),
    ("What is your character's age in years?", "Age"),
    ("Did this character die?", "Is Dead"),
    ("What race is your character?", "Race"),
    ("What classes are your character?", "Classes"),
    ("What subclass is your character?", "Subclass"),
    ("What level is your character?", "Level"),
    (
        "Can you predict when your character will level up?",
        "Not Milestone",
    ),
    ("What's your character's alignment?", "Alignment"),
    (
        "How did you generate your initial ability scores for this character?",
        "Gen Method",
    ),
    (
        "Were you able to choose to which ability you assigned each score?",
        "Scores Assigned",
    ),
    ("What is your character's strength (STR) ability score?", "STR"),
    ("What is your character's dexterity (DEX) ability score?", "DEX"),
    (
        "What is your character's constitution (CON) ability score?",
        "CON",
    ),
    (
        "What is your character's intelligence (INT) ability score?",
        "INT",
    ),
    ("What is your character's wisdom (WIS) ability score?", "WIS"),
    ("What is your character's charisma (CHA) ability score?", "CHA"),
    ("What is your character's Hit Points?", "HP"),
    ("What is your character's Armor Class?", "AC"),
    (
        "To the nearest 1gp, how much gold does your character have?",
        "Gold",
    ),
    (
        "With which skills does your character have proficiency?",
        "Skills",
    ),
    ("I enjoy the roleplaying aspects of D&D", "Player RP Enjoyment"),
    (
        "I enjoy the mechanical aspects of D&D",
        "Player Mechanical Enjoyment",
    ),
    (
        "The character I built above was designed to be as mechanically optimal as possible",
        "Player Character Optimization",
    ),
    ("(Optional) Tell me about your character!", "Description"),
    (
        "Add any additional comments here / tell me about the survey experience :)",
        "Meta",
    ),
];

/// The attributes of the fictional character.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CharacterField {
    Name,
    Recentness,
    Gender,
    Age,
    IsDead,
    Race,
    Classes,
    Subclass,
    Level,
    NotMilestone,
    Alignment,
    GenMethod,
    ScoresAssigned,
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
    Hp,
    Ac,
    Gold,
    Skills,
    Description,
}

impl CharacterField {
    pub const ALL: [CharacterField; 24] = [
        CharacterField::Name,
        CharacterField::Recentness,
        CharacterField::Gender,
        CharacterField::Age,
        CharacterField::IsDead,
        CharacterField::Race,
        CharacterField::Classes,
        CharacterField::Subclass,
        CharacterField::Level,
        CharacterField::NotMilestone,
        CharacterField::Alignment,
        CharacterField::GenMethod,
        CharacterField::ScoresAssigned,
        CharacterField::Str,
        CharacterField::Dex,
        CharacterField::Con,
        CharacterField::Int,
        CharacterField::Wis,
        CharacterField::Cha,
        CharacterField::Hp,
        CharacterField::Ac,
        CharacterField::Gold,
        CharacterField::Skills,
        CharacterField::Description,
    ];

    /// The canonical column name.
    pub fn name(&self) -> &'static str {
        match self {
            CharacterField::Name => "Name",
            CharacterField::Recentness => "Recentness",
            CharacterField::Gender => "Gender",
            CharacterField::Age => "Age",
            CharacterField::IsDead => "Is Dead",
            CharacterField::Race => "Race",
            CharacterField::Classes => "Classes",
            CharacterField::Subclass => "Subclass",
            CharacterField::Level => "Level",
            CharacterField::NotMilestone => "Not Milestone",
            CharacterField::Alignment => "Alignment",
            CharacterField::GenMethod => "Gen Method",
            CharacterField::ScoresAssigned => "Scores Assigned",
            CharacterField::Str => "STR",
            CharacterField::Dex => "DEX",
            CharacterField::Con => "CON",
            CharacterField::Int => "INT",
            CharacterField::Wis => "WIS",
            CharacterField::Cha => "CHA",
            CharacterField::Hp => "HP",
            CharacterField::Ac => "AC",
            CharacterField::Gold => "Gold",
            CharacterField::Skills => "Skills",
            CharacterField::Description => "Description",
        }
    }

    pub fn from_name(name: &str) -> Option<CharacterField> {
        CharacterField::ALL.iter().copied().find(|f| f.name() == name)
    }
}

/// The attributes of the respondent.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PlayerField {
    Timestamp,
    Age,
    Gender,
    Education,
    Experience,
    RpEnjoyment,
    MechanicalEnjoyment,
    CharacterOptimization,
    Meta,
}

impl PlayerField {
    pub const ALL: [PlayerField; 9] = [
        PlayerField::Timestamp,
        PlayerField::Age,
        PlayerField::Gender,
        PlayerField::Education,
        PlayerField::Experience,
        PlayerField::RpEnjoyment,
        PlayerField::MechanicalEnjoyment,
        PlayerField::CharacterOptimization,
        PlayerField::Meta,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PlayerField::Timestamp => "Timestamp",
            PlayerField::Age => "Player Age",
            PlayerField::Gender => "Player Gender",
            PlayerField::Education => "Player Education",
            PlayerField::Experience => "Player Experience",
            PlayerField::RpEnjoyment => "Player RP Enjoyment",
            PlayerField::MechanicalEnjoyment => "Player Mechanical Enjoyment",
            PlayerField::CharacterOptimization => "Player Character Optimization",
            PlayerField::Meta => "Meta",
        }
    }

    pub fn from_name(name: &str) -> Option<PlayerField> {
        PlayerField::ALL.iter().copied().find(|f| f.name() == name)
    }
}

/// Where the content of a renamed column ends up.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Column {
    Character(CharacterField),
    Player(PlayerField),
    /// The header matched no question. Holds the header as found in the source.
    Unmapped(String),
}

impl Column {
    pub fn classify(name: &str) -> Column {
        if let Some(f) = CharacterField::from_name(name) {
            Column::Character(f)
        } else if let Some(f) = PlayerField::from_name(name) {
            Column::Player(f)
        } else {
            Column::Unmapped(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Column::Character(f) => f.name(),
            Column::Player(f) => f.name(),
            Column::Unmapped(s) => s.as_str(),
        }
    }
}

/// True if the name is one of the canonical column names.
pub fn is_canonical(name: &str) -> bool {
    !matches!(Column::classify(name), Column::Unmapped(_))
}

/// Looks up the canonical name of a header.
///
/// The exact question text is tried first, then its normalized form, so that
/// whitespace or typographic quotes introduced by a spreadsheet editor do not
/// lose the column. Headers that are already canonical are returned as is.
pub fn canonical_name(header: &str) -> Option<&'static str> {
    if let Some((_, c)) = COLUMN_MAPPINGS.iter().find(|(q, _)| *q == header) {
        return Some(*c);
    }
    let normalized = normalize_header(header);
    if let Some((q, c)) = COLUMN_MAPPINGS
        .iter()
        .find(|(q, _)| normalize_header(q) == normalized)
    {
        debug!(
            "canonical_name: header {:?} matched question {:?} after normalization",
            header, q
        );
        return Some(*c);
    }
    CharacterField::ALL
        .iter()
        .map(|f| f.name())
        .chain(PlayerField::ALL.iter().map(|f| f.name()))
        .find(|c| *c == normalized)
}

/// The renamed header. Headers that match nothing are returned unchanged.
pub fn rename_header(header: &str) -> String {
    match canonical_name(header) {
        Some(c) => c.to_string(),
        None => header.to_string(),
    }
}

fn normalize_header(header: &str) -> String {
    let folded: String = header
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{02BC}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' => ' ',
            c => c,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn character_and_player_fields_are_disjoint() {
        let cs: HashSet<&str> = CharacterField::ALL.iter().map(|f| f.name()).collect();
        let ps: HashSet<&str> = PlayerField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(cs.len(), 24);
        assert_eq!(ps.len(), 9);
        assert!(cs.is_disjoint(&ps));
    }

    #[test]
    fn every_mapping_target_is_a_field() {
        for (q, c) in COLUMN_MAPPINGS.iter() {
            assert!(is_canonical(c), "{:?} -> {:?}", q, c);
        }
        let targets: HashSet<&str> = COLUMN_MAPPINGS.iter().map(|(_, c)| *c).collect();
        assert_eq!(targets.len(), COLUMN_MAPPINGS.len());
    }

    #[test]
    fn canonical_questions_map_to_themselves() {
        // A question text that is also a canonical name must not point elsewhere,
        // otherwise renaming would not be idempotent.
        for (q, c) in COLUMN_MAPPINGS.iter() {
            if is_canonical(q) {
                assert_eq!(q, c);
            }
        }
    }

    #[test]
    fn rename_is_idempotent_on_canonical_headers() {
        for f in CharacterField::ALL.iter() {
            assert_eq!(rename_header(f.name()), f.name());
        }
        for f in PlayerField::ALL.iter() {
            assert_eq!(rename_header(f.name()), f.name());
        }
        for (q, _) in COLUMN_MAPPINGS.iter() {
            let once = rename_header(q);
            assert_eq!(rename_header(&once), once);
        }
    }

    #[test]
    fn rename_exact_questions() {
        assert_eq!(rename_header("What is your age?"), "Player Age");
        assert_eq!(rename_header("What's your character's name?"), "Name");
        assert_eq!(
            rename_header("With what gender do you identify? (Use \"other\" to self-describe)"),
            "Player Gender"
        );
    }

    #[test]
    fn rename_tolerates_editor_drift() {
        assert_eq!(
            rename_header("What\u{2019}s your character\u{2019}s name?"),
            "Name"
        );
        assert_eq!(rename_header("  What is your   age? "), "Player Age");
    }

    #[test]
    fn unknown_headers_pass_through() {
        assert_eq!(rename_header("What is your age"), "What is your age");
        assert_eq!(canonical_name("Favorite dice color"), None);
        assert_eq!(
            Column::classify("Favorite dice color"),
            Column::Unmapped("Favorite dice color".to_string())
        );
    }
}
