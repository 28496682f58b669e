use std::process;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, SessionError, TranscriptProfile};

fn main() {
    for profile in [
        TranscriptProfile::Braking,
        TranscriptProfile::Tipover,
        TranscriptProfile::Fault,
    ] {
        if let Err(err) = record_profile(profile) {
            eprintln!("{}: {err}", profile.log_path());
            process::exit(1);
        }
    }
}

fn record_profile(profile: TranscriptProfile) -> Result<(), SessionError> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Braking => &BRAKING,
        TranscriptProfile::Tipover => &TIPOVER,
        TranscriptProfile::Fault => &FAULT,
        TranscriptProfile::Interactive => &[],
    };
    for line in script {
        session.handle_command(line)?;
    }
    Ok(())
}

const BRAKING: [&str; 12] = [
    "help",
    "profile medium",
    "accel z 300",
    "run 200ms",
    "accel z 1000",
    "run 400ms",
    "status",
    "accel z 1500",
    "run 400ms",
    "accel z 300",
    "run 1500ms",
    "trace",
];

const TIPOVER: [&str; 6] = [
    "accel x 120",
    "run 200ms",
    "accel x 5000",
    "run 1200ms",
    "status",
    "trace",
];

const FAULT: [&str; 9] = [
    "run 100ms",
    "nack on",
    "run 50ms",
    "status",
    "nack off",
    "power off",
    "tick",
    "power on",
    "run 200ms",
];
