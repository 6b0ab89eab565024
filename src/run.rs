use crate::cpu::{ C8Kernel, Quirks, Screen };
use crate::error::C8Result;
use crate::scheduler::{ Clock, MonotonicClock, Scheduler };
use crate::terminal::{ HostEvent, TerminalKeypad, TerminalScreen };
use crate::utils::*;
use argh::FromArgs;
use crossterm::{
    cursor::{ self },
    style::ResetColor,
    terminal::{ self, EnterAlternateScreen, LeaveAlternateScreen },
    QueueableCommand,
};
use log::{ info, warn };
use rand::{ rngs::StdRng, RngCore, SeedableRng };
use std::fs::File;
use std::io::{ Read, Write, stdout };
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Forced,
    Natural,
}

#[derive(FromArgs)]
#[argh(description = "chip8 interpreter. Keypad: 1234/qwer/asdf/zxcv, space pauses, n steps while paused, esc quits")]
pub struct Args {
    /// start paused and log every executed instruction
    #[argh(switch, short = 'd')]
    pub debug: bool,
    /// 8XY6/8XYE shift VY into VX
    #[argh(switch)]
    pub shift_quirk: bool,
    /// FX55/FX65 advance I past the last register
    #[argh(switch)]
    pub store_load_quirk: bool,
    /// jump with offset (BNNN) adds VX instead of V0
    #[argh(switch)]
    pub jump_offset_quirk: bool,
    /// instructions per second (default 700)
    #[argh(option, default = "CPU_TICK_RATE_HZ", from_str_fn(parse_hz))]
    pub cpu_hz: f64,
    /// seed for the random number instruction
    #[argh(option)]
    pub seed: Option<u64>,
    /// write log output to this file instead of stderr
    #[argh(option)]
    pub log_file: Option<String>,
    /// the ROM to execute
    #[argh(positional)]
    pub file: String,
}

fn parse_hz(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(hz) if (MIN_CPU_RATE_HZ..=MAX_CPU_RATE_HZ).contains(&hz) => Ok(hz),
        _ => Err(format!(
            "`{}` is not a frequency between {} and {} Hz",
            value, MIN_CPU_RATE_HZ, MAX_CPU_RATE_HZ
        )),
    }
}

impl From<&Args> for Quirks {
    fn from(args: &Args) -> Self {
        Quirks {
            shift: args.shift_quirk,
            store_load: args.store_load_quirk,
            jump_offset: args.jump_offset_quirk,
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "On" } else { "Off" }
}

pub fn init_logging(args: &Args) -> C8Result<()> {
    let default_level = if args.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level)
    );
    if let Some(path) = &args.log_file {
        let file = File::create(path).c8_err(format!("Could not create log file {}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().c8_err("Could not install logger")
}

pub fn read_rom(path: &str) -> C8Result<Vec<u8>> {
    let mut buf = vec![];
    File::open(path)
        .c8_err(format!("Can't open {}", path))?
        .read_to_end(&mut buf)
        .c8_err(format!("Error reading from file {}", path))?;
    Ok(buf)
}

/// Seeded sources repeat the same `RND` sequence on every run.
pub fn random_source(seed: Option<u64>) -> Box<dyn RngCore> {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(StdRng::from_entropy()),
    }
}

pub fn run_from_args(args: Args) -> C8Result<ExitKind> {
    init_logging(&args)?;
    let quirks = Quirks::from(&args);
    info!(
        "Settings: debug mode {}, shift quirk {}, load/store quirk {}, jump offset quirk {}, {} Hz",
        on_off(args.debug),
        on_off(quirks.shift),
        on_off(quirks.store_load),
        on_off(quirks.jump_offset),
        args.cpu_hz
    );
    if args.debug && args.log_file.is_none() {
        warn!("Debug output goes to stderr and will overlap the screen; consider --log-file");
    }

    let rom = read_rom(&args.file)?;
    info!("Loaded ROM {} [size: {}]", args.file, rom.len());

    let mut machine = C8Kernel::new(&rom, quirks, random_source(args.seed))?;

    setup_terminal()?;
    let mut screen = TerminalScreen::new(stdout());
    let mut keypad = TerminalKeypad::new();
    let result = run(&mut machine, &mut screen, &mut keypad, &MonotonicClock::default(), args.cpu_hz, args.debug);
    // the terminal must be restored even when the machine died
    let restored = teardown_terminal();
    let kind = result?;
    restored?;
    info!("Exiting ({:?})", kind);
    Ok(kind)
}

pub fn setup_terminal() -> C8Result<()> {
    let mut stdout = stdout();
    stdout
        .queue(cursor::Hide)
        .c8_err("Could not hide cursor")?
        .queue(EnterAlternateScreen)
        .c8_err("Could not enter alternate screen")?
        .flush()
        .c8_err("Could not flush stdout")?;

    terminal::enable_raw_mode().c8_err("Could not enable terminal raw mode")?;

    Ok(())
}

pub fn teardown_terminal() -> C8Result<()> {
    terminal::disable_raw_mode().c8_err("Could not disable terminal raw mode")?;
    let mut stdout = stdout();
    stdout
        .queue(LeaveAlternateScreen)
        .c8_err("Could not leave alternate screen")?
        .queue(cursor::Show)
        .c8_err("Could not show cursor")?
        .queue(ResetColor)
        .c8_err("Could not reset colors")?
        .flush()
        .c8_err("Could not flush stdout")?;

    Ok(())
}

/// Host loop: poll input, let the scheduler run whatever is due, present a
/// frame when one is due and the picture changed. Returns on a quit request
/// or the first fatal machine error.
pub fn run(
    machine: &mut C8Kernel,
    screen: &mut dyn Screen,
    keypad: &mut TerminalKeypad,
    clock: &dyn Clock,
    cpu_hz: f64,
    start_paused: bool,
) -> C8Result<ExitKind> {
    let mut scheduler = Scheduler::new(cpu_hz, TIMER_TICK_RATE_HZ, FRAME_RATE_HZ, clock.now());
    if start_paused {
        scheduler.set_paused(true, clock.now());
    }
    screen.clear()?;
    loop {
        for event in keypad.poll()? {
            match event {
                HostEvent::Quit(kind) => {
                    return Ok(kind);
                }
                HostEvent::TogglePause => {
                    scheduler.toggle_pause(clock.now());
                    info!("{}", if scheduler.is_paused() { "Paused" } else { "Resumed" });
                }
                HostEvent::Step => scheduler.request_step(),
            }
        }
        let pass = scheduler.advance(clock.now(), machine, &*keypad)?;
        if pass.frame_due && machine.buf.take_dirty() {
            screen.present(&machine.buf)?;
        }
        thread::sleep(HOST_PACING);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::tests::HeldKeys;

    fn args(extra: &[&str]) -> Option<Args> {
        let mut all = extra.to_vec();
        all.push("game.ch8");
        Args::from_args(&["ch8"], &all).ok()
    }

    #[test]
    fn defaults() {
        let a = args(&[]).unwrap();
        assert_eq!(a.file, "game.ch8");
        assert!(!a.debug);
        assert_eq!(a.cpu_hz, CPU_TICK_RATE_HZ);
        assert_eq!(a.seed, None);
        assert_eq!(Quirks::from(&a), Quirks::default());
    }

    #[test]
    fn quirk_switches() {
        let a = args(&["--shift-quirk", "--store-load-quirk", "--jump-offset-quirk", "-d"]).unwrap();
        assert!(a.debug);
        assert_eq!(
            Quirks::from(&a),
            Quirks { shift: true, store_load: true, jump_offset: true }
        );
    }

    #[test]
    fn options() {
        let a = args(&["--cpu-hz", "1000", "--seed", "42", "--log-file", "ch8.log"]).unwrap();
        assert_eq!(a.cpu_hz, 1000.0);
        assert_eq!(a.seed, Some(42));
        assert_eq!(a.log_file.as_deref(), Some("ch8.log"));
    }

    #[test]
    fn bad_frequency_is_rejected() {
        assert!(args(&["--cpu-hz", "0"]).is_none());
        assert!(args(&["--cpu-hz", "fast"]).is_none());
        assert!(args(&["--cpu-hz", "inf"]).is_none());
        assert!(args(&["--cpu-hz", "1e-300"]).is_none());
        assert!(args(&["--cpu-hz", "1e10"]).is_none());
        assert!(args(&["--cpu-hz", "NaN"]).is_none());
    }

    #[test]
    fn frequency_bounds_are_inclusive() {
        assert_eq!(args(&["--cpu-hz", "1"]).map(|a| a.cpu_hz), Some(MIN_CPU_RATE_HZ));
        assert_eq!(args(&["--cpu-hz", "1000000"]).map(|a| a.cpu_hz), Some(MAX_CPU_RATE_HZ));
    }

    #[test]
    fn same_seed_gives_same_random_bytes() {
        // RND V0..V7, 0xFF
        let rom: Vec<u8> = (0..8u8).flat_map(|x| [0xc0 | x, 0xff]).collect();
        let roll = |seed| {
            let mut k = C8Kernel::new(&rom, Quirks::default(), random_source(Some(seed))).unwrap();
            for _ in 0..8 {
                k.step(&HeldKeys(0)).unwrap();
            }
            k.reg
        };
        assert_eq!(roll(42), roll(42));
        assert_eq!(roll(7), roll(7));
    }

    #[test]
    fn missing_rom_is_reported() {
        let err = read_rom("/nonexistent/rom.ch8").unwrap_err();
        assert!(err.to_string().starts_with("Can't open /nonexistent/rom.ch8"));
    }

    #[test]
    fn rom_file_is_read_verbatim() {
        let path = std::env::temp_dir().join(format!("ch8-rom-{}.ch8", std::process::id()));
        std::fs::write(&path, [0x12, 0x28, 0xff]).unwrap();
        let rom = read_rom(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(rom, vec![0x12, 0x28, 0xff]);
    }
}
