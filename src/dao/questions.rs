use std::{fs, path::Path};

use csv::{ReaderBuilder, Trim};

use crate::{
    dao::storage::{StorageError, StorageResult},
    state::game::QuestionRow,
};

const MISSING_NUMBER: &str = "N/A";
const MISSING_TEXT: &str = "No question";
const MISSING_ANSWER: &str = "No answer";

/// Parse a `number;text;answer` question list. Blank lines are skipped and
/// missing trailing fields get placeholder values.
pub fn parse_questions(content: &str) -> StorageResult<Vec<QuestionRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(content.trim().as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| {
            StorageError::malformed("failed to parse question list".into(), err)
        })?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let field = |index: usize, fallback: &str| {
            record
                .get(index)
                .filter(|value| !value.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        rows.push(QuestionRow {
            number: field(0, MISSING_NUMBER),
            text: field(1, MISSING_TEXT),
            answer: field(2, MISSING_ANSWER),
        });
    }
    Ok(rows)
}

/// Read and parse a question list from disk.
pub fn load_questions_file(path: &Path) -> StorageResult<Vec<QuestionRow>> {
    let content = fs::read_to_string(path).map_err(|err| {
        StorageError::unavailable(format!("failed to read `{}`", path.display()), err)
    })?;
    parse_questions(&content)
}
