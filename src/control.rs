//! Line-oriented control input for headless runs.
//!
//! Each line is one gesture or command:
//!
//! ```text
//! tap | double | long | down
//! fling <vx> <vy>
//! pinch <scale>
//! say <transcript>
//! quit
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use anyhow::{anyhow, Context, Result};
use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use crate::app::Event;
use crate::gesture::Gesture;

fn number(token: Option<&str>, what: &str) -> Result<f32> {
    let token = token.ok_or_else(|| anyhow!("missing {}", what))?;
    let value: f32 = token
        .parse()
        .with_context(|| format!("invalid {} '{}'", what, token))?;
    if !value.is_finite() {
        return Err(anyhow!("{} must be finite", what));
    }
    Ok(value)
}

pub fn parse_line(line: &str) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let event = match command.to_lowercase().as_str() {
        "tap" => Event::Gesture(Gesture::SingleTapConfirmed),
        "double" => Event::Gesture(Gesture::DoubleTap),
        "long" => Event::Gesture(Gesture::LongPress),
        "down" => Event::Gesture(Gesture::Down),
        "fling" => Event::Gesture(Gesture::Fling {
            velocity_x: number(args.next(), "fling velocity x")?,
            velocity_y: number(args.next(), "fling velocity y")?,
        }),
        "pinch" => Event::Gesture(Gesture::Pinch {
            scale: number(args.next(), "pinch scale")?,
        }),
        "say" => {
            if rest.is_empty() {
                return Err(anyhow!("say needs a transcript"));
            }
            Event::VoiceResults(vec![rest.to_string()])
        }
        "quit" | "exit" => Event::Quit,
        other => return Err(anyhow!("unknown command '{}'", other)),
    };
    Ok(Some(event))
}

/// Read control lines on a background thread and post them as events. Input end
/// does not quit the app.
pub fn spawn_control<R>(reader: R, events: Sender<Event>) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("control".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        log::warn!("control input failed: {}", err);
                        return;
                    }
                };
                match parse_line(&line) {
                    Ok(Some(event)) => {
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => log::warn!("ignoring control line: {:#}", err),
                }
            }
            log::debug!("control input closed");
        })
        .context("spawn control thread")
}
