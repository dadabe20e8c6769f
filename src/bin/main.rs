// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use gradpass::{Engine, MemoryLedger, TicketRequest, TicketType, Validator};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Gradpass - Process ticket operation CSV files
///
/// Reads registrations, generations and validations from a CSV file and
/// outputs the resulting ticket ledger to stdout.
#[derive(Parser, Debug)]
#[command(name = "gradpass")]
#[command(about = "A ticket engine that processes operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,name,password,type,guest,code,validator,notes
    /// Example: cargo run -- ceremony.csv > tickets.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match process_operations(BufReader::new(file), &mut wall_clock()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_tickets(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Monotonic issuing clock: wall time, nudged forward whenever two calls
/// land in the same millisecond so back-to-back generations for one name
/// never derive the same code twice.
fn wall_clock() -> impl FnMut() -> u64 {
    let mut last = 0u64;
    move || {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(last);
        last = now.max(last + 1);
        last
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, name, password, type, guest, code, validator, notes`
#[derive(Debug, serde::Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(rename = "type", default)]
    ticket_type: Option<String>,
    #[serde(default)]
    guest: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    validator: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug)]
enum Operation {
    Register { name: String, password: String },
    SeedValidator { code: String, name: String },
    Generate { name: String, request: TicketRequest },
    Validate { code: String, validator: String },
}

impl CsvRecord {
    /// Converts a CSV record to an operation.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        fn present(field: Option<String>) -> Option<String> {
            field.filter(|s| !s.trim().is_empty())
        }

        match self.op.to_lowercase().as_str() {
            "register" => Some(Operation::Register {
                name: present(self.name)?,
                password: present(self.password)?,
            }),
            "validator" => Some(Operation::SeedValidator {
                code: present(self.code)?,
                name: present(self.name)?,
            }),
            "generate" => {
                let kind: TicketType = present(self.ticket_type)?.parse().ok()?;
                let mut request = match kind {
                    TicketType::Graduate => TicketRequest::graduate(),
                    TicketType::Family => TicketRequest::family(present(self.guest)?),
                };
                if let Some(notes) = present(self.notes) {
                    request = request.with_notes(notes);
                }
                Some(Operation::Generate {
                    name: present(self.name)?,
                    request,
                })
            }
            "validate" => Some(Operation::Validate {
                code: present(self.code)?,
                validator: present(self.validator)?,
            }),
            _ => None,
        }
    }
}

/// Process operations from a CSV reader against a fresh in-memory engine.
///
/// Streaming parse; malformed rows and rejected operations are skipped
/// (logged in debug builds) without stopping the run, matching how a
/// front-of-house batch import should behave.
///
/// # CSV Format
///
/// Columns: `op, name, password, type, guest, code, validator, notes`
/// - `op`: register | validator | generate | validate
/// - `type`: graduate | family (generate only)
///
/// # Example
///
/// ```csv
/// op,name,password,type,guest,code,validator,notes
/// register,Maria Gonzalez,capandgown,,,,,
/// validator,Puerta Principal,,,,VAL001,,
/// generate,Maria Gonzalez,,family,Juan Gonzalez,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(
    reader: R,
    clock: &mut impl FnMut() -> u64,
) -> Result<Engine<MemoryLedger>, csv::Error> {
    let engine = Engine::in_memory();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                #[cfg(not(debug_assertions))]
                let _ = e;
                continue;
            }
        };

        let Some(operation) = record.into_operation() else {
            #[cfg(debug_assertions)]
            eprintln!("Skipping invalid operation record");
            continue;
        };

        let outcome = match operation {
            Operation::Register { name, password } => {
                engine.register(&name, &password).map(|_| ())
            }
            Operation::SeedValidator { code, name } => {
                engine.register_validator(Validator::new(&code, &name));
                Ok(())
            }
            Operation::Generate { name, request } => {
                engine.generate(&name, request, clock()).map(|_| ())
            }
            Operation::Validate { code, validator } => engine
                .validator_login(&validator)
                .and_then(|v| engine.validate(&code, v.code(), clock()))
                .map(|_| ()),
        };

        if let Err(e) = outcome {
            #[cfg(debug_assertions)]
            eprintln!("Skipping rejected operation: {}", e);
            #[cfg(not(debug_assertions))]
            let _ = e;
        }
    }

    Ok(engine)
}

/// Write the ticket ledger to a CSV writer.
///
/// # CSV Format
///
/// Columns: `code, account, guest, type, used, used_at, validated_by,
/// notes, created_at`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_tickets<W: Write>(engine: &Engine<MemoryLedger>, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut tickets = engine.tickets().unwrap_or_default();
    tickets.sort_by_key(|t| (t.created_at(), t.code().as_str().to_string()));
    for ticket in &tickets {
        wtr.serialize(ticket)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn test_clock() -> impl FnMut() -> u64 {
        let mut t = 1_700_000_000_000u64;
        move || {
            t += 1;
            t
        }
    }

    #[test]
    fn register_and_generate() {
        let csv = "op,name,password,type,guest,code,validator,notes\n\
                   register,Maria Gonzalez,capandgown,,,,,\n\
                   generate,Maria Gonzalez,,family,Juan Gonzalez,,,\n";
        let engine = process_operations(Cursor::new(csv), &mut test_clock()).unwrap();

        let account = engine.account("Maria Gonzalez").unwrap().unwrap();
        assert_eq!(account.generated, 1);
        let tickets = engine.tickets().unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].guest_name(), Some("Juan Gonzalez"));
    }

    #[test]
    fn full_lifecycle_validates_ticket() {
        let csv = "op,name,password,type,guest,code,validator,notes\n\
                   register,Maria Gonzalez,capandgown,,,,,\n\
                   validator,Puerta Principal,,,,VAL001,,\n\
                   generate,Maria Gonzalez,,graduate,,,,\n";
        let mut clock = test_clock();
        let engine = process_operations(Cursor::new(csv), &mut clock).unwrap();
        let code = engine.tickets().unwrap()[0].code().clone();

        // Second pass with the issued code appended.
        let csv = format!(
            "op,name,password,type,guest,code,validator,notes\n\
             register,Maria Gonzalez,capandgown,,,,,\n\
             validator,Puerta Principal,,,,VAL001,,\n\
             generate,Maria Gonzalez,,graduate,,,,\n\
             validate,,,,,{code},VAL001,\n"
        );
        let engine = process_operations(Cursor::new(csv.as_str()), &mut test_clock()).unwrap();
        let tickets = engine.tickets().unwrap();
        assert_eq!(tickets.len(), 1);
        assert!(tickets[0].is_used());
    }

    #[test]
    fn skip_malformed_and_unknown_rows() {
        let csv = "op,name,password,type,guest,code,validator,notes\n\
                   register,Maria Gonzalez,capandgown,,,,,\n\
                   frobnicate,x,y,z,,,,\n\
                   register,Ana Ruiz,tassel,,,,,\n";
        let engine = process_operations(Cursor::new(csv), &mut test_clock()).unwrap();
        assert_eq!(engine.accounts().unwrap().len(), 2);
    }

    #[test]
    fn rejected_operations_do_not_stop_the_run() {
        // Second registration of the same name is rejected, later rows
        // still apply.
        let csv = "op,name,password,type,guest,code,validator,notes\n\
                   register,Maria Gonzalez,capandgown,,,,,\n\
                   register,Maria Gonzalez,other,,,,,\n\
                   generate,Maria Gonzalez,,family,Juan Gonzalez,,,\n";
        let engine = process_operations(Cursor::new(csv), &mut test_clock()).unwrap();
        assert_eq!(engine.tickets().unwrap().len(), 1);
    }

    #[test]
    fn quota_limits_generation_rows() {
        let mut csv = String::from("op,name,password,type,guest,code,validator,notes\n");
        csv.push_str("register,Maria Gonzalez,capandgown,,,,,\n");
        for i in 0..7 {
            csv.push_str(&format!(
                "generate,Maria Gonzalez,,family,Guest {i},,,\n"
            ));
        }
        let engine = process_operations(Cursor::new(csv.as_str()), &mut test_clock()).unwrap();

        assert_eq!(engine.tickets().unwrap().len(), 5);
        let account = engine.account("Maria Gonzalez").unwrap().unwrap();
        assert_eq!(account.generated, 5);
    }

    #[test]
    fn write_tickets_emits_flat_columns() {
        let csv = "op,name,password,type,guest,code,validator,notes\n\
                   register,Maria Gonzalez,capandgown,,,,,\n\
                   generate,Maria Gonzalez,,family,Juan Gonzalez,,,silla de ruedas\n";
        let engine = process_operations(Cursor::new(csv), &mut test_clock()).unwrap();

        let mut output = Vec::new();
        write_tickets(&engine, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.starts_with(
            "code,account,guest,type,used,used_at,validated_by,notes,created_at"
        ));
        assert!(output.contains("Maria Gonzalez,Juan Gonzalez,family,false"));
        assert!(output.contains("silla de ruedas"));
    }

    #[test]
    fn wall_clock_is_strictly_monotonic() {
        let mut clock = wall_clock();
        let a = clock();
        let b = clock();
        let c = clock();
        assert!(a < b && b < c);
    }
}
