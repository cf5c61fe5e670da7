//! Base station log.
//!
//! The station writes one header at start-up, one record per correlated
//! alert and a final summary. Sinks decide how records are persisted:
//! [`FileLog`] appends human-readable blocks or JSON lines to a file,
//! [`MemoryLog`] keeps them in memory for inspection.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tsunameter_topology::GridCoord;

use crate::config::LogFormat;
use crate::error::Result;
use crate::record::{AlertClassification, AlertRecord, SatelliteReading};
use crate::signal::StopCause;
use crate::station::SensorTally;

/// How message cost is accounted for in the summary.
pub const MESSAGE_COST_FORMULA: &str = "2 × neighbours + 1 per alert";

/// Written once when the station starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogHeader {
    pub started_at: DateTime<Utc>,
    pub rows: u32,
    pub cols: u32,
    pub height_tolerance: f64,
    pub time_tolerance_secs: f64,
    pub iteration_budget: u64,
}

/// One correlated alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    /// 1-based polling cycle
    pub iteration: u64,
    pub logged_at: DateTime<Utc>,
    pub alert: AlertRecord,
    pub classification: AlertClassification,
    /// The satellite reading the alert was matched against
    pub satellite: Option<SatelliteReading>,
    /// Seconds between the alert timestamp and logging
    pub latency_secs: f64,
}

impl AlertEntry {
    /// Messages on the sensor-to-base leg.
    pub fn base_messages(&self) -> u32 {
        AlertRecord::BASE_LEG_MESSAGES
    }

    /// Messages exchanged with neighbors.
    pub fn neighbor_messages(&self) -> u32 {
        self.alert.neighbor_messages()
    }
}

/// Written once when the station stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub finished_at: DateTime<Utc>,
    pub cause: StopCause,
    /// Polling cycles completed
    pub iterations: u64,
    pub iteration_budget: u64,
    /// One row per sensor, in id order
    pub per_sensor: Vec<SensorTally>,
    pub total_true: u64,
    pub total_false: u64,
    pub alerts_received: u64,
    pub total_comm_time_secs: f64,
    pub total_messages: u64,
}

/// Any record a sink accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Header(LogHeader),
    Alert(AlertEntry),
    Summary(Summary),
}

/// Append-only destination for station records.
pub trait LogSink: Send {
    fn header(&mut self, header: &LogHeader) -> Result<()>;

    fn alert(&mut self, entry: &AlertEntry) -> Result<()>;

    fn summary(&mut self, summary: &Summary) -> Result<()>;
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn classification_label(classification: AlertClassification) -> &'static str {
    match classification {
        AlertClassification::MatchedTrue => "Match (true alert)",
        AlertClassification::MatchedFalse => "Match (false alert)",
        AlertClassification::Unmatched => "No match (false alert)",
    }
}

fn node_row(out: &mut String, id: impl std::fmt::Display, coord: GridCoord, height: f64) {
    out.push_str(&format!(
        "{:<14}{:<14}{:>12.3}\n",
        id.to_string(),
        coord.to_string(),
        height
    ));
}

/// Render the header as a text block.
pub fn render_header(header: &LogHeader) -> String {
    format!(
        "==== Tsunameter base station ====\n\
         Started:            {}\n\
         Grid:               {} x {} ({} sensors)\n\
         Height tolerance:   {:.3} m\n\
         Time tolerance:     {} s\n\
         Iteration budget:   {}\n\n",
        timestamp(&header.started_at),
        header.rows,
        header.cols,
        u64::from(header.rows) * u64::from(header.cols),
        header.height_tolerance,
        header.time_tolerance_secs,
        header.iteration_budget,
    )
}

/// Render one alert as a text block.
///
/// Absent neighbors are left out of the table.
pub fn render_alert(entry: &AlertEntry) -> String {
    let alert = &entry.alert;
    let mut out = format!(
        "---- Iteration {} ----\n\
         Logged time:                {}\n\
         Alert reported time:        {}\n\
         Alert type:                 {}\n\n",
        entry.iteration,
        timestamp(&entry.logged_at),
        timestamp(&alert.reported_at),
        classification_label(entry.classification),
    );

    out.push_str(&format!("{:<14}{:<14}{:>12}\n", "Reporting", "Coord", "Height (m)"));
    node_row(&mut out, alert.reporter, alert.coord, alert.height);
    out.push('\n');

    out.push_str(&format!("{:<14}{:<14}{:>12}\n", "Adjacent", "Coord", "Height (m)"));
    for neighbor in alert.present_neighbors() {
        node_row(&mut out, neighbor.peer, neighbor.coord, neighbor.height);
    }
    out.push('\n');

    match &entry.satellite {
        Some(reading) => out.push_str(&format!(
            "Satellite reporting time:   {}\n\
             Satellite height (m):       {:.3}\n\
             Satellite coord:            {}\n",
            timestamp(&reading.observed_at),
            reading.height,
            reading.coord,
        )),
        None => out.push_str("Satellite reading:          no record found\n"),
    }

    out.push_str(&format!(
        "Communication time (s):     {:.3}\n\
         Matching neighbours:        {}\n\
         Messages to base station:   {}\n\
         Messages with neighbours:   {}\n\n",
        entry.latency_secs,
        alert.similar_count,
        entry.base_messages(),
        entry.neighbor_messages(),
    ));
    out
}

/// Render the summary as a text block.
pub fn render_summary(summary: &Summary) -> String {
    let mut out = format!(
        "==== Summary ====\n\
         Finished:           {}\n\
         Stop cause:         {}\n\
         Iterations:         {} of {}\n\n",
        timestamp(&summary.finished_at),
        summary.cause,
        summary.iterations,
        summary.iteration_budget,
    );

    out.push_str(&format!(
        "{:<10}{:<12}{:>8}{:>8}\n",
        "Sensor", "Coord", "True", "False"
    ));
    for row in &summary.per_sensor {
        out.push_str(&format!(
            "{:<10}{:<12}{:>8}{:>8}\n",
            row.sensor.to_string(),
            row.coord.to_string(),
            row.true_alerts,
            row.false_alerts
        ));
    }

    out.push_str(&format!(
        "\nAlerts received:            {}\n\
         Total true alerts:          {}\n\
         Total false alerts:         {}\n\
         Total communication (s):    {:.3}\n\
         Total messages:             {}\n\
         Message cost:               {}\n",
        summary.alerts_received,
        summary.total_true,
        summary.total_false,
        summary.total_comm_time_secs,
        summary.total_messages,
        MESSAGE_COST_FORMULA,
    ));
    out
}

/// Append-only log file.
///
/// Records are written and flushed synchronously on the caller's task: one
/// small block per alert per polling cycle. The station runs on whatever
/// runtime flavor the caller chose, including current-thread, so the write
/// is not moved off the task.
pub struct FileLog {
    out: BufWriter<File>,
    format: LogFormat,
}

impl FileLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>, format: LogFormat) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            out: BufWriter::new(file),
            format,
        })
    }

    fn write(&mut self, entry: LogEntry) -> Result<()> {
        match self.format {
            LogFormat::Text => {
                let block = match &entry {
                    LogEntry::Header(h) => render_header(h),
                    LogEntry::Alert(a) => render_alert(a),
                    LogEntry::Summary(s) => render_summary(s),
                };
                self.out.write_all(block.as_bytes())?;
            }
            LogFormat::Json => {
                serde_json::to_writer(&mut self.out, &entry)?;
                self.out.write_all(b"\n")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

impl LogSink for FileLog {
    fn header(&mut self, header: &LogHeader) -> Result<()> {
        self.write(LogEntry::Header(header.clone()))
    }

    fn alert(&mut self, entry: &AlertEntry) -> Result<()> {
        self.write(LogEntry::Alert(entry.clone()))
    }

    fn summary(&mut self, summary: &Summary) -> Result<()> {
        self.write(LogEntry::Summary(summary.clone()))
    }
}

/// In-memory sink. Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Every record so far, in write order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Alert records only.
    pub fn alerts(&self) -> Vec<AlertEntry> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Alert(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// The summary, once written.
    pub fn written_summary(&self) -> Option<Summary> {
        self.entries().into_iter().find_map(|e| match e {
            LogEntry::Summary(s) => Some(s),
            _ => None,
        })
    }
}

impl LogSink for MemoryLog {
    fn header(&mut self, header: &LogHeader) -> Result<()> {
        self.push(LogEntry::Header(header.clone()));
        Ok(())
    }

    fn alert(&mut self, entry: &AlertEntry) -> Result<()> {
        self.push(LogEntry::Alert(entry.clone()));
        Ok(())
    }

    fn summary(&mut self, summary: &Summary) -> Result<()> {
        self.push(LogEntry::Summary(summary.clone()));
        Ok(())
    }
}
