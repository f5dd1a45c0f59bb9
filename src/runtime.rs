// Top level: open the servo board, load calibration, run the chosen command or the menu
//
// The commander owns the driver for the whole run and is released on every exit path.
// Menu lines and piped calibration keys come from one buffered stdin reader, so neither
// steals bytes meant for the other.
//
// Ctrl-C stops a walk at the next phase boundary. The handler a walk installs stays in place
// for the rest of the process, so afterwards Ctrl-C no longer interrupts a blocking read of
// piped input; end the input or press q instead. On a terminal, calibration runs in raw mode
// and Ctrl-C arrives as a key that quits the session.

use std::io::{self, BufRead, IsTerminal, Write};

use tracing::{error, info, warn};

use crate::calibration::{CalibrationStore, offset_key};
use crate::cli::{Cli, Command, WalkArgs, parse_seconds};
use crate::commander::LegCommander;
use crate::config::{CHANNEL_PULSES, LEG_WIRING};
use crate::error::{Result, RobotError};
use crate::gait::GaitSequencer;
use crate::input::{ByteKeys, TerminalKeys};
use crate::legs::ActuatorMap;
use crate::procedure::{CalibrationOutcome, calibrate};
use crate::servo::{ActuatorDriver, SimulatedDriver};
use crate::stop::StopSignal;

// Channels printed by `show`
const SHOWN_CHANNELS: u8 = 16;

pub async fn run(cli: Cli) -> Result<()> {
    let map = ActuatorMap::new(LEG_WIRING)?;
    let calibration = CalibrationStore::load(&cli.calibration);
    let driver = open_driver(cli.simulate)?;
    let mut commander = LegCommander::new(driver, map, calibration);

    let stdin = io::stdin();
    let terminal = stdin.is_terminal();
    let mut input = stdin.lock();

    let result = match cli.command {
        Some(Command::Walk(args)) => walk(&mut commander, args).await,
        Some(Command::Calibrate) => calibrate_interactive(&mut commander, &mut input, terminal),
        Some(Command::Move { leg, top, bottom }) => {
            info!("Moving {} to top {}°, bottom {}°", leg, top, bottom);
            commander.move_leg(leg, top, bottom)
        }
        Some(Command::Show) => {
            show(&commander);
            Ok(())
        }
        None => menu(&mut commander, &mut input, terminal).await,
    };

    // A command error takes precedence over a shutdown error
    let released = commander.release();
    result.and(released)
}

fn open_driver(simulate: bool) -> Result<Box<dyn ActuatorDriver>> {
    if simulate {
        info!("Simulating servos, nothing will move");
        return Ok(Box::new(SimulatedDriver::new(&CHANNEL_PULSES)));
    }
    open_hardware()
}

#[cfg(feature = "pca9685")]
fn open_hardware() -> Result<Box<dyn ActuatorDriver>> {
    use crate::config::{PCA9685_ADDRESS, PWM_FREQUENCY_HZ};
    use crate::servo::Pca9685Driver;

    let driver = Pca9685Driver::open(PCA9685_ADDRESS, PWM_FREQUENCY_HZ, &CHANNEL_PULSES)?;
    Ok(Box::new(driver))
}

#[cfg(not(feature = "pca9685"))]
fn open_hardware() -> Result<Box<dyn ActuatorDriver>> {
    warn!("Built without the `pca9685` feature, simulating servos");
    Ok(Box::new(SimulatedDriver::new(&CHANNEL_PULSES)))
}

async fn walk<D: ActuatorDriver>(commander: &mut LegCommander<D>, args: WalkArgs) -> Result<()> {
    let stop = StopSignal::new();
    let watcher = tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, stopping");
                stop.trigger();
            }
        }
    });

    let sequencer = GaitSequencer::new(args.gait_params());
    info!(
        "Phase hold {:?}, settle {:?}",
        sequencer.params().step_duration,
        sequencer.params().settle
    );
    let result = sequencer.walk(commander, &stop).await;
    watcher.abort();

    match result {
        Err(RobotError::Cancelled) => {
            info!("Walk cancelled by operator");
            Ok(())
        }
        other => other,
    }
}

fn calibrate_interactive<D, R>(
    commander: &mut LegCommander<D>,
    input: &mut R,
    terminal: bool,
) -> Result<()>
where
    D: ActuatorDriver,
    R: BufRead,
{
    let outcome = if terminal {
        // Raw mode ends when `keys` drops, before the summary is printed
        let mut keys = TerminalKeys::new()?;
        calibrate(commander, &mut keys)?
    } else {
        // Reads byte by byte, anything after the last key stays buffered for the menu
        let mut keys = ByteKeys::new(&mut *input);
        calibrate(commander, &mut keys)?
    };

    match outcome {
        CalibrationOutcome::Completed(offsets) => {
            println!("Calibration saved:");
            for (leg, joint, offset) in offsets.entries() {
                println!("  {:<10} {:+}", offset_key(leg, joint), offset);
            }
        }
        CalibrationOutcome::Aborted { leg, joint } => {
            println!("Calibration aborted at {} {}, nothing saved", leg, joint);
        }
    }
    Ok(())
}

fn show<D: ActuatorDriver>(commander: &LegCommander<D>) {
    let calibration = commander.calibration();
    println!("Calibration file: {}", calibration.path().display());
    for channel in 0..SHOWN_CHANNELS {
        let Some((leg, joint)) = commander.map().locate(channel) else {
            continue;
        };
        let mirrored = if commander.map().pair(leg).mirrored {
            " (mirrored)"
        } else {
            ""
        };
        println!(
            "  channel {:>2}: {:<10} offset {:+}{}",
            channel,
            offset_key(leg, joint),
            calibration.offset(leg, joint),
            mirrored
        );
    }
}

async fn menu<D, R>(commander: &mut LegCommander<D>, input: &mut R, terminal: bool) -> Result<()>
where
    D: ActuatorDriver,
    R: BufRead,
{
    loop {
        println!();
        println!("=== Robot Control Menu ===");
        println!("1. Calibrate legs");
        println!("2. Walk forward");
        println!("3. Exit");

        let Some(choice) = prompt(input, "Select option: ")? else {
            break;
        };

        let result = match choice.trim().to_ascii_lowercase().as_str() {
            "1" | "c" | "calibrate" => calibrate_interactive(commander, input, terminal),
            "2" | "w" | "walk" => match ask_walk_args(input)? {
                Some(args) => walk(commander, args).await,
                None => break,
            },
            "3" | "q" | "exit" | "quit" => break,
            other => {
                println!("Unknown option {:?}", other);
                Ok(())
            }
        };

        // Operator decides whether to retry
        if let Err(e) = result {
            error!("{}", e);
        }
    }

    info!("Exiting");
    Ok(())
}

fn ask_walk_args<R: BufRead>(input: &mut R) -> Result<Option<WalkArgs>> {
    let mut args = WalkArgs::default();

    let Some(steps) = prompt(input, &format!("Number of steps [{}]: ", args.steps))? else {
        return Ok(None);
    };
    if !steps.trim().is_empty() {
        match steps.trim().parse() {
            Ok(steps) => args.steps = steps,
            Err(_) => println!("Not a step count, using {}", args.steps),
        }
    }

    let default_secs = args.step_duration.as_secs_f64();
    let Some(duration) = prompt(input, &format!("Step duration in seconds [{}]: ", default_secs))? else {
        return Ok(None);
    };
    if !duration.trim().is_empty() {
        match parse_seconds(&duration) {
            Ok(duration) => args.step_duration = duration,
            Err(e) => println!("{}, using {}", e, default_secs),
        }
    }

    Ok(Some(args))
}

/// Read one line; `None` on end of input
fn prompt<R: BufRead>(input: &mut R, text: &str) -> Result<Option<String>> {
    print!("{}", text);
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(line))
}
