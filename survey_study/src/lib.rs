/*!
Paired character and player records out of the character building survey.

Each response of the survey describes a fictional character and, through a
few extra questions, the person who plays it. The responses come in as a table
whose headers are the full text of the questions. A [`Study`] renames those
headers to short canonical names (see [`COLUMN_MAPPINGS`]) and splits every row
into a [`Character`] and a [`Player`].

```
use survey_study::{Study, Table, Value};

let table = Table::from_string_rows(&[
    vec!["Timestamp".to_string(), "What is your age?".to_string(), "What's your character's name?".to_string()],
    vec!["2021-09-01".to_string(), "29".to_string(), "Thorin".to_string()],
])?;
let study = Study::from_table(table)?;

assert_eq!(study.len(), 1);
assert_eq!(study.entries()[0].character().name, Some(Value::from("Thorin")));
# Ok::<(), survey_study::StudyErrors>(())
```
*/

mod config;
mod mapping;
mod table;

use log::{debug, info, warn};
use indexmap::IndexSet;
use std::collections::HashSet;

pub use crate::config::*;
pub use crate::mapping::*;
pub use crate::table::*;

/// The loaded survey: one entry per response, and the renamed table they
/// were built from.
#[derive(PartialEq, Debug, Clone)]
pub struct Study {
    entries: Vec<Entry>,
    table: Table,
    unmapped_columns: Vec<String>,
}

impl Study {
    /// Builds a study from a table whose headers are the survey questions.
    ///
    /// Columns that match no question are filed under the player.
    pub fn from_table(table: Table) -> Result<Study, StudyErrors> {
        Study::from_table_with(table, UnmappedPolicy::default())
    }

    pub fn from_table_with(table: Table, policy: UnmappedPolicy) -> Result<Study, StudyErrors> {
        let renamed = table.renamed();
        let columns = classify_columns(table.columns(), renamed.columns())?;
        let unmapped_columns: Vec<String> = columns
            .iter()
            .filter_map(|c| match c {
                Column::Unmapped(name) => Some(name.clone()),
                _ => None,
            })
            .collect();

        let mut entries: Vec<Entry> = Vec::with_capacity(renamed.num_rows());
        for (idx, row) in renamed.rows().iter().enumerate() {
            debug!("from_table: idx: {:?} row: {:?}", idx, row);
            entries.push(split_row(&columns, row, policy));
        }

        info!(
            "from_table: {} entries, {} columns, {} unmapped columns (policy {:?})",
            entries.len(),
            columns.len(),
            unmapped_columns.len(),
            policy
        );
        Ok(Study {
            entries,
            table: renamed,
            unmapped_columns,
        })
    }

    /// Builds a study out of existing entries. The table is rebuilt from the
    /// fields the entries carry, in the order of the survey.
    pub fn from_entries(entries: Vec<Entry>) -> Study {
        let mut names: Vec<&str> = COLUMN_MAPPINGS
            .iter()
            .map(|(_, c)| *c)
            .filter(|c| {
                entries.iter().any(|e| {
                    e.character().value(c).is_some() || e.player().value(c).is_some()
                })
            })
            .collect();
        // First-seen order, which is the source column order.
        let unmapped: IndexSet<&str> = entries
            .iter()
            .flat_map(|e| e.player().unmapped.keys().map(|k| k.as_str()))
            .collect();
        names.extend(unmapped.iter());

        let rows: Vec<Vec<Value>> = entries
            .iter()
            .map(|e| {
                names
                    .iter()
                    .map(|n| {
                        e.character()
                            .value(n)
                            .or_else(|| e.player().value(n))
                            .cloned()
                            .unwrap_or(Value::Empty)
                    })
                    .collect()
            })
            .collect();
        let columns: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let unmapped_columns: Vec<String> = unmapped.iter().map(|n| n.to_string()).collect();
        let table = Table::new(columns, rows);
        Study {
            entries,
            table,
            unmapped_columns,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The source table, with canonical column names.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The headers that matched no survey question, as found in the source.
    pub fn unmapped_columns(&self) -> &[String] {
        &self.unmapped_columns
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.entries.iter().map(|e| e.character())
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.entries.iter().map(|e| e.player())
    }

    /// All the cells of one canonical column.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        self.table.column(name)
    }
}

// Decides where each column goes, and reports the headers that were not recognized.
fn classify_columns(original: &[String], renamed: &[String]) -> Result<Vec<Column>, StudyErrors> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut res: Vec<Column> = Vec::with_capacity(renamed.len());
    for (orig, name) in original.iter().zip(renamed.iter()) {
        if !seen.insert(name.as_str()) {
            return Err(StudyErrors::DuplicateColumn(name.clone()));
        }
        let column = Column::classify(name);
        if let Column::Unmapped(_) = column {
            warn!(
                "Column {:?} does not match any survey question, it will not be renamed",
                orig
            );
        }
        res.push(column);
    }
    Ok(res)
}

fn split_row(columns: &[Column], row: &[Value], policy: UnmappedPolicy) -> Entry {
    let mut character = Character::default();
    let mut player = Player::default();
    for (column, value) in columns.iter().zip(row.iter()) {
        match column {
            Column::Character(f) => character.set(*f, value.clone()),
            Column::Player(f) => player.set(*f, value.clone()),
            Column::Unmapped(name) => {
                if policy == UnmappedPolicy::KeepInPlayer {
                    player.unmapped.insert(name.clone(), value.clone());
                }
            }
        }
    }
    Entry::new(character, player)
}
