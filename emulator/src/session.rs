use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use brakelight_core::controller::{ConfigError, ControllerConfig};
use brakelight_core::output::{LightPattern, OutputSink};
use brakelight_core::repl::commands::{
    Bench, CommandError, CommandOutcome, command_summaries, command_summary,
};
use brakelight_core::repl::grammar::COMMAND_KEYWORDS;
use brakelight_core::repl::status::{StatusFormatter, StatusSnapshot};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Braking,
    Tipover,
    Fault,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-interactive.log",
            TranscriptProfile::Braking => "transcripts/emulator-braking.log",
            TranscriptProfile::Tipover => "transcripts/emulator-tipover.log",
            TranscriptProfile::Fault => "transcripts/emulator-fault.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Brake light emulator session transcript",
            TranscriptProfile::Braking => "Brake light emulator braking transcript",
            TranscriptProfile::Tipover => "Brake light emulator tipover transcript",
            TranscriptProfile::Fault => "Brake light emulator bus fault transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        [
            ("interactive", Self::Interactive),
            ("braking", Self::Braking),
            ("tipover", Self::Tipover),
            ("fault", Self::Fault),
        ]
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, profile)| profile)
        .ok_or_else(|| format!("Unknown transcript profile `{tag}`"))
    }
}

/// Output sink that remembers every pattern change until it is drained.
#[derive(Debug, Default)]
pub struct LightLog {
    changes: Vec<LightPattern>,
}

impl LightLog {
    fn drain(&mut self) -> impl Iterator<Item = LightPattern> + '_ {
        self.changes.drain(..)
    }
}

impl OutputSink for LightLog {
    fn apply(&mut self, pattern: LightPattern) {
        self.changes.push(pattern);
    }
}

#[derive(Debug)]
pub enum SessionError {
    Io(io::Error),
    Config(ConfigError),
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Io(err) => write!(f, "transcript: {err}"),
            SessionError::Config(err) => write!(f, "controller config: {err}"),
        }
    }
}

impl std::error::Error for SessionError {}

pub struct Session {
    bench: Bench<LightLog>,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> Result<Self, SessionError> {
        let transcript = TranscriptLogger::create(profile)?;
        Self::with_transcript(transcript)
    }

    /// Session whose transcript is discarded.
    #[cfg(test)]
    pub fn detached() -> Result<Self, SessionError> {
        Self::with_transcript(TranscriptLogger::from_writer(Box::new(io::sink())))
    }

    fn with_transcript(transcript: TranscriptLogger) -> Result<Self, SessionError> {
        Ok(Self {
            bench: Bench::with_sink(ControllerConfig::DEFAULT, LightLog::default())?,
            transcript,
            started_at: HostInstant::now(),
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match self.bench.execute_line(trimmed) {
            Ok(outcome) => self.describe(outcome),
            Err(CommandError::Parse(err)) => vec![format!("ERR syntax {err}")],
            Err(err @ CommandError::Duration(_)) => vec![format!("ERR {err}")],
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn describe(&mut self, outcome: CommandOutcome<'_>) -> Vec<String> {
        match outcome {
            CommandOutcome::Advanced {
                ticks,
                pattern,
                pattern_changes,
            } => {
                let now = self.bench.controller().ticks();
                let mut lines: Vec<String> = self
                    .bench
                    .sink_mut()
                    .drain()
                    .map(|change| format!("lights -> {change}"))
                    .collect();
                lines.push(format!(
                    "ok advanced={ticks} now={now} pattern={pattern} changes={pattern_changes}"
                ));
                lines
            }
            CommandOutcome::Accel(axis, value) => {
                vec![format!("ok accel {axis}={} ({})", value.raw(), value.signed())]
            }
            CommandOutcome::Temp(raw) => vec![format!("ok temp={raw:#04x}")],
            CommandOutcome::Profile(profile) => vec![format!("ok profile={profile}")],
            CommandOutcome::Power(enable) => vec![format!("ok power={}", on_off(enable))],
            CommandOutcome::Nack(enable) => vec![format!("ok nack={}", on_off(enable))],
            CommandOutcome::Status(snapshot) => status_lines(&snapshot),
            CommandOutcome::Trace { since } => {
                let lines: Vec<String> = self
                    .bench
                    .controller()
                    .telemetry()
                    .records_since(since)
                    .map(ToString::to_string)
                    .collect();
                if lines.is_empty() {
                    vec!["trace: no new events".to_string()]
                } else {
                    lines
                }
            }
            CommandOutcome::Help(topic) => help_lines(topic),
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn status_lines(snapshot: &StatusSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    StatusFormatter::new(snapshot)
        .for_each_line(|line: String| lines.push(line))
        .ok();
    lines
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match command_summary(target) {
            Some(detail) => vec![detail.to_string()],
            None => vec![
                format!("No help available for `{target}`."),
                format!("Available topics: {}", COMMAND_KEYWORDS.join(", ")),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(command_summaries().map(|detail| format!("  {detail}")));
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

struct TranscriptLogger {
    writer: BufWriter<Box<dyn Write>>,
}

impl TranscriptLogger {
    fn create(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self::from_writer(Box::new(file));
        logger.write_header(profile)?;
        Ok(logger)
    }

    fn from_writer(writer: Box<dyn Write>) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
