//! Delimited text persistence for the helpfile.
//!
//! One header line of field names followed by one line per row. Values are
//! written in Rust's shortest round-trip exponent form, so reading a table
//! back reproduces every value bit for bit.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use super::history::History;
use super::row::{Row, Schema};
use super::RecordError;

/// File name of the persisted history inside an output directory.
pub const HELPFILE_NAME: &str = "runtime_helpfile.csv";

/// Writes `rows` as a tab-delimited table with a header line.
pub fn write_table<W: Write>(rows: &[Row], writer: W) -> Result<(), RecordError> {
    let mut writer = BufWriter::new(writer);

    writeln!(writer, "{}", Schema::global().names().join("\t"))?;

    for row in rows {
        let mut first = true;
        for value in row.values() {
            if !first {
                writer.write_all(b"\t")?;
            }
            write!(writer, "{:e}", value)?;
            first = false;
        }
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

/// Reads rows from a table written by [`write_table`].
///
/// Columns are matched by name, so their order may differ from the schema;
/// tabs, spaces and commas are all accepted as delimiters. Every schema
/// column must be present and no unknown column is allowed.
pub fn read_table<R: Read>(reader: R) -> Result<Vec<Row>, RecordError> {
    let schema = Schema::global();
    let mut lines = BufReader::new(reader).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => {
            return Err(RecordError::Parse {
                line: 1,
                message: "missing header line".to_string(),
            })
        }
    };

    let columns = split_fields(&header)
        .map(|name| {
            schema.position(name).ok_or_else(|| RecordError::Parse {
                line: 1,
                message: format!("unknown column '{}'", name),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(missing) = schema
        .names()
        .iter()
        .enumerate()
        .find(|(i, _)| !columns.contains(i))
        .map(|(_, name)| name)
    {
        return Err(RecordError::Parse {
            line: 1,
            message: format!("missing column '{}'", missing),
        });
    }

    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        let line_no = n + 2;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut values = vec![0.0; schema.len()];
        let mut count = 0;
        for (field, text) in split_fields(&line).enumerate() {
            let Some(&column) = columns.get(field) else {
                return Err(RecordError::Parse {
                    line: line_no,
                    message: format!("expected {} values, found more", columns.len()),
                });
            };
            values[column] = text.parse::<f64>().map_err(|e| RecordError::Parse {
                line: line_no,
                message: format!("column '{}': {}", schema.names()[column], e),
            })?;
            count += 1;
        }

        if count != columns.len() {
            return Err(RecordError::Parse {
                line: line_no,
                message: format!("expected {} values, found {}", columns.len(), count),
            });
        }

        // Column coverage was checked against the header above.
        if let Some(row) = Row::from_values(values) {
            rows.push(row);
        }
    }

    Ok(rows)
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

impl History {
    /// Persists the whole history to `path`.
    ///
    /// The table is written to a sibling temporary file which then replaces
    /// `path`, so a crash mid-write leaves the previous table intact.
    pub fn persist(&self, path: &Path) -> Result<(), RecordError> {
        let tmp = path.with_extension("csv.tmp");
        {
            let file = File::create(&tmp)?;
            write_table(self.rows(), &file)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        debug!(rows = self.len(), path = %path.display(), "helpfile persisted");
        Ok(())
    }

    /// Loads a history from `path`, re-validating every row on append.
    pub fn load(path: &Path, mass_tolerance: f64) -> Result<History, RecordError> {
        let file = File::open(path)?;
        let rows = read_table(file)?;

        let mut history = History::new(mass_tolerance);
        for row in rows {
            history.append(row)?;
        }
        Ok(history)
    }
}
