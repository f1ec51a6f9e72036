use crate::clock::Millis;
use crate::error::ArchiveError;
use crate::session::Session;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Sessions as a JSON array in the archive schema
pub fn export_json<W: Write>(sessions: &[Session], out: W) -> Result<(), ArchiveError> {
    serde_json::to_writer_pretty(out, sessions)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    session_id: &'a str,
    session_label: &'a str,
    timestamp: i64,
    start_time: i64,
    end_time: i64,
    total_time: Millis,
    lap_number: Option<usize>,
    lap_id: Option<&'a str>,
    lap_label: Option<&'a str>,
    lap_total_time: Option<Millis>,
    lap_time: Option<Millis>,
}

impl<'a> CsvRow<'a> {
    fn session(session: &'a Session) -> Self {
        Self {
            session_id: &session.id,
            session_label: &session.label,
            timestamp: session.timestamp.as_millis(),
            start_time: session.start_time.as_millis(),
            end_time: session.end_time.as_millis(),
            total_time: session.total_time,
            lap_number: None,
            lap_id: None,
            lap_label: None,
            lap_total_time: None,
            lap_time: None,
        }
    }
}

/// One row per lap; a session without laps still gets a row
pub fn export_csv<W: Write>(sessions: &[Session], out: W) -> Result<(), ArchiveError> {
    let mut writer = csv::Writer::from_writer(out);

    for session in sessions {
        if session.laps.is_empty() {
            writer.serialize(CsvRow::session(session))?;
            continue;
        }
        for (i, lap) in session.laps.iter().enumerate() {
            writer.serialize(CsvRow {
                lap_number: Some(i + 1),
                lap_id: Some(&lap.id),
                lap_label: Some(&lap.label),
                lap_total_time: Some(lap.total_time),
                lap_time: Some(lap.lap_time),
                ..CsvRow::session(session)
            })?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn export<W: Write>(
    format: ExportFormat,
    sessions: &[Session],
    out: W,
) -> Result<(), ArchiveError> {
    match format {
        ExportFormat::Json => export_json(sessions, out),
        ExportFormat::Csv => export_csv(sessions, out),
    }
}
