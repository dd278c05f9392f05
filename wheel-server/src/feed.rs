//! Line-oriented pulse feed used when no GPIO hardware is attached.
//!
//! Each line is one command; pulse commands are stamped with the time the
//! line was read and queued for the pump.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use wheel_core::config::SensorRole;
use wheel_core::pulse::PulseEvent;
use wheel_core::query::Voltage;

use crate::clock::HostInstant;
use crate::http::AppState;
use crate::pump::PulseSender;

const HELP: &str = "\
Commands:
  speed | s         speed-sensor pulse
  forward | f       forward-marker pulse
  reverse | r       reverse-marker pulse
  pot <volts>       set the simulated potentiometer
  status            print the current readings
  help              show this help
  exit | quit       stop the service";

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FeedCommand {
    Pulse(SensorRole),
    Pot(Voltage),
    Status,
    Help,
    Exit,
}

#[derive(Debug, Error, PartialEq)]
pub enum FeedError {
    #[error("unknown command `{0}`; type `help` for a list")]
    Unknown(String),
    #[error("`pot` expects a voltage, e.g. `pot 1.65`")]
    MissingVoltage,
    #[error("invalid voltage `{0}`")]
    InvalidVoltage(String),
    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),
    #[error("the potentiometer is not simulated")]
    NotSimulated,
    #[error("pulse channel closed")]
    ChannelClosed,
}

/// Why the feed stopped reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FeedEnd {
    Exit,
    Eof,
}

pub fn parse_command(line: &str) -> Result<FeedCommand, FeedError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(FeedError::Unknown(String::new()));
    };
    let verb = verb.to_ascii_lowercase();

    let command = match verb.as_str() {
        "speed" | "s" => FeedCommand::Pulse(SensorRole::Speed),
        "forward" | "f" => FeedCommand::Pulse(SensorRole::ForwardMarker),
        "reverse" | "r" => FeedCommand::Pulse(SensorRole::ReverseMarker),
        "pot" => {
            let raw = words.next().ok_or(FeedError::MissingVoltage)?;
            let volts = raw
                .parse::<Voltage>()
                .ok()
                .filter(|volts| volts.is_finite())
                .ok_or_else(|| FeedError::InvalidVoltage(raw.to_string()))?;
            FeedCommand::Pot(volts)
        }
        "status" => FeedCommand::Status,
        "help" | "?" => FeedCommand::Help,
        "exit" | "quit" => FeedCommand::Exit,
        _ => return Err(FeedError::Unknown(verb)),
    };

    match words.next() {
        Some(extra) => Err(FeedError::UnexpectedArgument(extra.to_string())),
        None => Ok(command),
    }
}

pub struct Feed {
    pulses: PulseSender,
    app: AppState,
}

impl Feed {
    pub fn new(pulses: PulseSender, app: AppState) -> Self {
        Self { pulses, app }
    }

    /// Runs one command and returns the line to echo back.
    pub async fn execute(
        &self,
        command: FeedCommand,
        now: HostInstant,
    ) -> Result<String, FeedError> {
        match command {
            FeedCommand::Pulse(role) => {
                self.pulses
                    .send(PulseEvent::from_role(role, now))
                    .await
                    .map_err(|_| FeedError::ChannelClosed)?;
                Ok(format!("queued {role} pulse"))
            }
            FeedCommand::Pot(volts) => {
                let pot = self.app.analog.simulated().ok_or(FeedError::NotSimulated)?;
                pot.set(volts);
                Ok(format!("potentiometer set to {volts} V"))
            }
            FeedCommand::Status => Ok(self.status_line(now).await),
            FeedCommand::Help => Ok(HELP.to_string()),
            FeedCommand::Exit => Ok("Session closed.".to_string()),
        }
    }

    async fn status_line(&self, now: HostInstant) -> String {
        let speed = {
            let query = self.app.query();
            query.speed_value(query.get_speed_at(now))
        };
        match self.app.read_potentiometer().await {
            Ok(volts) => format!("speed_level={speed} potentiometer_voltage={volts}"),
            Err(err) => format!("speed_level={speed} potentiometer_voltage=<{err}>"),
        }
    }

    /// Reads commands until `exit` or end of input, writing one reply per line.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> io::Result<FeedEnd>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        writer
            .write_all(b"Wheel pulse feed ready. Type `help` for commands or `exit` to quit.\n")
            .await?;
        writer.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let now = HostInstant::now();
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let reply = match parse_command(trimmed) {
                Ok(FeedCommand::Exit) => {
                    writer.write_all(b"Session closed.\n").await?;
                    writer.flush().await?;
                    info!("exit requested from pulse feed");
                    return Ok(FeedEnd::Exit);
                }
                Ok(command) => self.execute(command, now).await,
                Err(err) => Err(err),
            };

            match reply {
                Ok(text) => writer.write_all(text.as_bytes()).await?,
                Err(err) => {
                    warn!(%err, line = trimmed, "feed command failed");
                    writer.write_all(format!("error: {err}").as_bytes()).await?;
                }
            }
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        Ok(FeedEnd::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use wheel_core::config::WheelConfig;

    use crate::analog::{HostAnalog, IioAdc, SimulatedPot};
    use crate::pump::pulse_channel;
    use crate::sync::HostTelemetry;

    fn app(analog: HostAnalog) -> AppState {
        AppState::new(
            Arc::new(HostTelemetry::new()),
            Arc::new(analog),
            WheelConfig::DEFAULT,
        )
    }

    #[test]
    fn pulse_commands_accept_short_forms() {
        assert_eq!(
            parse_command("speed"),
            Ok(FeedCommand::Pulse(SensorRole::Speed))
        );
        assert_eq!(
            parse_command("S"),
            Ok(FeedCommand::Pulse(SensorRole::Speed))
        );
        assert_eq!(
            parse_command("f"),
            Ok(FeedCommand::Pulse(SensorRole::ForwardMarker))
        );
        assert_eq!(
            parse_command("Reverse"),
            Ok(FeedCommand::Pulse(SensorRole::ReverseMarker))
        );
        assert_eq!(parse_command("QUIT"), Ok(FeedCommand::Exit));
    }

    #[test]
    fn pot_requires_a_finite_voltage() {
        assert_eq!(parse_command("pot 1.65"), Ok(FeedCommand::Pot(1.65)));
        assert_eq!(parse_command("pot"), Err(FeedError::MissingVoltage));
        assert_eq!(
            parse_command("pot high"),
            Err(FeedError::InvalidVoltage("high".to_string()))
        );
        assert_eq!(
            parse_command("pot NaN"),
            Err(FeedError::InvalidVoltage("NaN".to_string()))
        );
    }

    #[test]
    fn stray_arguments_and_unknown_verbs_are_rejected() {
        assert_eq!(
            parse_command("speed now"),
            Err(FeedError::UnexpectedArgument("now".to_string()))
        );
        assert_eq!(
            parse_command("brake"),
            Err(FeedError::Unknown("brake".to_string()))
        );
    }

    #[tokio::test]
    async fn session_queues_pulses_and_stops_on_exit() {
        let (sender, mut receiver) = pulse_channel();
        let feed = Feed::new(sender, app(HostAnalog::Simulated(SimulatedPot::new(0.0))));
        let input: &[u8] = b"speed\n\nforward\nr\npot 2.5\nbogus\nexit\nspeed\n";
        let mut output = Vec::new();

        let end = feed.run(input, &mut output).await.expect("feed io");
        assert_eq!(end, FeedEnd::Exit);

        let mut roles = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            roles.push(event.role());
        }
        assert_eq!(
            roles,
            vec![
                SensorRole::Speed,
                SensorRole::ForwardMarker,
                SensorRole::ReverseMarker
            ]
        );

        let transcript = String::from_utf8(output).expect("utf-8");
        assert!(transcript.contains("queued speed pulse"));
        assert!(transcript.contains("potentiometer set to 2.5 V"));
        assert!(transcript.contains("error: unknown command `bogus`"));
        assert!(transcript.ends_with("Session closed.\n"));
        assert_eq!(
            feed.app.analog.simulated().map(SimulatedPot::get),
            Some(2.5)
        );
    }

    #[tokio::test]
    async fn end_of_input_keeps_service_running() {
        let (sender, _receiver) = pulse_channel();
        let feed = Feed::new(sender, app(HostAnalog::Simulated(SimulatedPot::new(0.0))));
        let input: &[u8] = b"status\n";
        let mut output = Vec::new();

        let end = feed.run(input, &mut output).await.expect("feed io");
        assert_eq!(end, FeedEnd::Eof);
        let transcript = String::from_utf8(output).expect("utf-8");
        assert!(transcript.contains("speed_level=0 potentiometer_voltage=0"));
    }

    #[tokio::test]
    async fn pot_needs_simulated_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (sender, _receiver) = pulse_channel();
        let feed = Feed::new(sender, app(HostAnalog::Iio(IioAdc::new(dir.path(), 0))));

        let result = feed.execute(FeedCommand::Pot(1.0), HostInstant::now()).await;
        assert_eq!(result, Err(FeedError::NotSimulated));
    }

    #[tokio::test]
    async fn closed_channel_is_reported() {
        let (sender, receiver) = pulse_channel();
        drop(receiver);
        let feed = Feed::new(sender, app(HostAnalog::Simulated(SimulatedPot::new(0.0))));

        let result = feed
            .execute(FeedCommand::Pulse(SensorRole::Speed), HostInstant::now())
            .await;
        assert_eq!(result, Err(FeedError::ChannelClosed));
    }
}
