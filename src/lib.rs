/*!
Loading the character building survey.

The responses are read from an Excel or csv export, or directly from the
Google Sheets document behind the form, and handed to [`survey_study`] to be
split into characters and players.

```no_run
let study = cbs_survey::survey::from_file("sources/sept15_partial_survey.xlsx")?;
for character in study.characters() {
    println!("{:?}", character.name);
}
# Ok::<(), cbs_survey::survey::SurveyError>(())
```
*/

pub mod survey;

pub use survey_study;
