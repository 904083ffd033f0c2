use async_trait::async_trait;
use color_eyre::eyre::{self, eyre, WrapErr};
use serde_json::Value;
use std::{fmt, path::PathBuf};
use tokio::{fs::File, io::AsyncWriteExt};

/// GameCube buttons addressable over Dolphin's pipe protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Button {
    A,
    B,
    X,
    Y,
    Z,
    Start,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    L,
    R,
}

impl Button {
    /// Button name as the pipe protocol spells it.
    fn pipe_name(&self) -> &'static str {
        match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::Z => "Z",
            Button::Start => "START",
            Button::DpadUp => "D_UP",
            Button::DpadDown => "D_DOWN",
            Button::DpadLeft => "D_LEFT",
            Button::DpadRight => "D_RIGHT",
            Button::L => "L",
            Button::R => "R",
        }
    }
}

/// Analog sticks on the pad.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stick {
    Main,
    C,
}

impl Stick {
    fn pipe_name(&self) -> &'static str {
        match self {
            Stick::Main => "MAIN",
            Stick::C => "C",
        }
    }
}

/// Stick axis component.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StickAxis {
    X,
    Y,
}

/// Analog shoulder triggers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Trigger {
    L,
    R,
}

impl Trigger {
    fn pipe_name(&self) -> &'static str {
        match self {
            Trigger::L => "L",
            Trigger::R => "R",
        }
    }
}

/// A control named in a browser input frame.
///
/// The accepted names are the ones the browser client sends: `A`, `B`, `X`,
/// `Y`, `Z`, `START`, `DPAD_*`, `L`, `R`, `ZL`, `ZR` and the four
/// `ANALOG_{LEFT,RIGHT}_{X,Y}` axes. `ZL`/`ZR` have no GameCube button and
/// address the analog trigger axes instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Control {
    Button(Button),
    StickAxis(Stick, StickAxis),
    Trigger(Trigger),
}

impl Control {
    /// Look up a browser control name. Unknown names yield `None` and are
    /// skipped by the caller.
    pub fn parse(name: &str) -> Option<Control> {
        let control = match name {
            "A" => Control::Button(Button::A),
            "B" => Control::Button(Button::B),
            "X" => Control::Button(Button::X),
            "Y" => Control::Button(Button::Y),
            "Z" => Control::Button(Button::Z),
            "START" => Control::Button(Button::Start),
            "DPAD_UP" => Control::Button(Button::DpadUp),
            "DPAD_DOWN" => Control::Button(Button::DpadDown),
            "DPAD_LEFT" => Control::Button(Button::DpadLeft),
            "DPAD_RIGHT" => Control::Button(Button::DpadRight),
            "L" => Control::Button(Button::L),
            "R" => Control::Button(Button::R),
            "ZL" => Control::Trigger(Trigger::L),
            "ZR" => Control::Trigger(Trigger::R),
            "ANALOG_LEFT_X" => Control::StickAxis(Stick::Main, StickAxis::X),
            "ANALOG_LEFT_Y" => Control::StickAxis(Stick::Main, StickAxis::Y),
            "ANALOG_RIGHT_X" => Control::StickAxis(Stick::C, StickAxis::X),
            "ANALOG_RIGHT_Y" => Control::StickAxis(Stick::C, StickAxis::Y),
            _ => return None,
        };

        Some(control)
    }
}

/// One line of Dolphin's pipe input protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum PipeCommand {
    Press(Button),
    Release(Button),
    SetStick(Stick, f64, f64),
    SetTrigger(Trigger, f64),
}

impl fmt::Display for PipeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeCommand::Press(button) => write!(f, "PRESS {}", button.pipe_name()),
            PipeCommand::Release(button) => write!(f, "RELEASE {}", button.pipe_name()),
            PipeCommand::SetStick(stick, x, y) => {
                write!(f, "SET {} {:.3} {:.3}", stick.pipe_name(), x, y)
            }
            PipeCommand::SetTrigger(trigger, value) => {
                write!(f, "SET {} {:.3}", trigger.pipe_name(), value)
            }
        }
    }
}

/// Browser stick x in [-1, 1] to pipe space [0, 1].
fn stick_x(value: f64) -> f64 {
    ((value + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Browser stick y in [-1, 1] (up is -1) to pipe space [0, 1] (up is 1).
fn stick_y(value: f64) -> f64 {
    ((1.0 - value) / 2.0).clamp(0.0, 1.0)
}

/// Per-connection stick memory.
///
/// The browser sends one axis component at a time, while the pipe protocol
/// wants a full `SET MAIN x y` line, so the last written value of each
/// component is kept here. Sticks rest at pipe center (0.5).
#[derive(Clone, Debug, PartialEq)]
pub struct PadState {
    main: (f64, f64),
    c: (f64, f64),
}

impl Default for PadState {
    fn default() -> Self {
        PadState {
            main: (0.5, 0.5),
            c: (0.5, 0.5),
        }
    }
}

impl PadState {
    /// Turn a single control update into a pipe command, updating stick
    /// memory as needed. Values of an unexpected JSON type yield `None`.
    pub fn apply(&mut self, control: Control, value: &Value) -> Option<PipeCommand> {
        match control {
            Control::Button(button) => match value.as_bool()? {
                true => Some(PipeCommand::Press(button)),
                false => Some(PipeCommand::Release(button)),
            },
            Control::Trigger(trigger) => {
                // ZL/ZR arrive as booleans from button-style clients and as
                // numbers from analog ones.
                let raw = match value {
                    Value::Bool(true) => 1.0,
                    Value::Bool(false) => 0.0,
                    _ => value.as_f64()?,
                };
                Some(PipeCommand::SetTrigger(trigger, raw.clamp(0.0, 1.0)))
            }
            Control::StickAxis(stick, axis) => {
                let raw = value.as_f64()?;
                let slot = match stick {
                    Stick::Main => &mut self.main,
                    Stick::C => &mut self.c,
                };
                match axis {
                    StickAxis::X => slot.0 = stick_x(raw),
                    StickAxis::Y => slot.1 = stick_y(raw),
                }
                Some(PipeCommand::SetStick(stick, slot.0, slot.1))
            }
        }
    }
}

/// Where translated pipe commands go. The websocket session writes through
/// this seam so tests can capture commands without a FIFO.
#[async_trait]
pub trait InputSink: Send {
    async fn send(&mut self, command: &PipeCommand) -> eyre::Result<()>;
}

/// Writes pipe commands to a Dolphin controller FIFO, one line each.
///
/// The FIFO is opened lazily on the first command and non-blocking, so a
/// pipe with no reader yet (emulator not running) is reported to the client
/// instead of wedging the session on the open.
pub struct PipeSink {
    path: PathBuf,
    pipe: Option<File>,
}

impl PipeSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PipeSink {
            path: path.into(),
            pipe: None,
        }
    }

    async fn pipe(&mut self) -> eyre::Result<&mut File> {
        if self.pipe.is_none() {
            let mut options = File::options();
            options.write(true).append(true);
            // A plain FIFO open blocks until the emulator holds the read
            // end, which would park this session forever.
            #[cfg(unix)]
            options.custom_flags(libc::O_NONBLOCK);

            let file = match options.open(&self.path).await {
                Ok(file) => file,
                #[cfg(unix)]
                Err(err) if err.raw_os_error() == Some(libc::ENXIO) => {
                    return Err(eyre!(
                        "controller pipe {} has no reader, start the emulator first",
                        self.path.display()
                    ));
                }
                Err(err) => {
                    return Err(err).wrap_err_with(|| {
                        format!("cannot open controller pipe {}", self.path.display())
                    });
                }
            };
            self.pipe = Some(file);
        }

        // Checked just above.
        Ok(self.pipe.as_mut().unwrap())
    }
}

#[async_trait]
impl InputSink for PipeSink {
    async fn send(&mut self, command: &PipeCommand) -> eyre::Result<()> {
        let path = self.path.clone();
        let pipe = self.pipe().await?;

        let line = format!("{command}\n");
        if let Err(err) = pipe.write_all(line.as_bytes()).await {
            // Dolphin went away; reopen on the next command.
            self.pipe = None;
            return Err(err)
                .wrap_err_with(|| format!("cannot write to controller pipe {}", path.display()));
        }

        Ok(())
    }
}
