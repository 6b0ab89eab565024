//! Fixed-rate clock domains for the CPU, the 60 Hz timers and frame
//! presentation, all driven from one monotonic clock.

use crate::cpu::{ C8Kernel, Keypad };
use crate::error::C8Result;
use log::debug;
use std::time::{ Duration, Instant };

/// Monotonic time source, measured from an arbitrary fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock { origin: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// One fixed-rate domain. Ticks are counted against the domain's origin in
/// integer micro-hertz, so no rounded period accumulates and time spent
/// elsewhere is caught up rather than dropped.
#[derive(Debug, Clone)]
pub struct ClockDomain {
    rate_uhz: u128,
    origin: Duration,
    fired: u128,
}

const UHZ_NS_PER_TICK: u128 = 1_000_000 * 1_000_000_000;

impl ClockDomain {
    pub fn from_hz(hz: f64, now: Duration) -> Self {
        ClockDomain {
            // saturating float-to-int cast; NaN and negative rates never tick
            rate_uhz: (hz * 1e6).round() as u128,
            origin: now,
            fired: 0,
        }
    }

    /// Number of whole ticks elapsed since the last call.
    pub fn due(&mut self, now: Duration) -> u32 {
        let elapsed = now.saturating_sub(self.origin).as_nanos();
        let total = elapsed.saturating_mul(self.rate_uhz) / UHZ_NS_PER_TICK;
        let ticks = total.saturating_sub(self.fired);
        self.fired = total;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    /// Forget any accumulated time.
    pub fn resync(&mut self, now: Duration) {
        self.origin = now;
        self.fired = 0;
    }
}

/// Work performed by one [`Scheduler::advance`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub cpu_steps: u32,
    pub timer_ticks: u32,
    pub frame_due: bool,
}

pub struct Scheduler {
    cpu: ClockDomain,
    timers: ClockDomain,
    frames: ClockDomain,
    paused: bool,
    step: bool,
}

impl Scheduler {
    pub fn new(cpu_hz: f64, timer_hz: f64, frame_hz: f64, now: Duration) -> Self {
        Scheduler {
            cpu: ClockDomain::from_hz(cpu_hz, now),
            timers: ClockDomain::from_hz(timer_hz, now),
            frames: ClockDomain::from_hz(frame_hz, now),
            paused: false,
            step: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool, now: Duration) {
        self.paused = paused;
        self.step = false;
        self.cpu.resync(now);
        debug!("Paused: {}", if paused { "Yes" } else { "No" });
    }

    pub fn toggle_pause(&mut self, now: Duration) {
        self.set_paused(!self.paused, now);
    }

    /// Run exactly one instruction on the next pass. Ignored unless paused.
    pub fn request_step(&mut self) {
        if self.paused {
            self.step = true;
            debug!("Step one instruction");
        }
    }

    /// Run every CPU step and timer tick that is due at `now`. A fatal
    /// machine error stops the pass immediately.
    pub fn advance(&mut self, now: Duration, kernel: &mut C8Kernel, keypad: &dyn Keypad) -> C8Result<Pass> {
        let mut pass = Pass::default();

        if !self.paused {
            for _ in 0..self.cpu.due(now) {
                kernel.step(keypad)?;
                pass.cpu_steps += 1;
            }
        } else if self.step {
            self.step = false;
            kernel.step(keypad)?;
            pass.cpu_steps = 1;
            self.cpu.resync(now);
        } else {
            self.cpu.resync(now);
        }

        pass.timer_ticks = self.timers.due(now);
        for _ in 0..pass.timer_ticks {
            kernel.timers.tick();
        }

        pass.frame_due = self.frames.due(now) > 0;
        Ok(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::tests::{ kernel, HeldKeys };
    use crate::error::C8Error;

    const NO_KEYS: HeldKeys = HeldKeys(0);

    // JP 0x200
    const SPIN: [u8; 2] = [0x12, 0x00];

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn domain_counts_whole_ticks() {
        let mut d = ClockDomain::from_hz(100.0, ms(0));
        assert_eq!(d.due(ms(9)), 0);
        assert_eq!(d.due(ms(10)), 1);
        assert_eq!(d.due(ms(19)), 0);
        assert_eq!(d.due(ms(20)), 1);
    }

    #[test]
    fn domain_catches_up_without_drift() {
        let mut d = ClockDomain::from_hz(100.0, ms(0));
        assert_eq!(d.due(ms(55)), 5);
        // the 5ms remainder is kept
        assert_eq!(d.due(ms(60)), 1);
        assert_eq!(d.due(ms(1000)), 94);
    }

    #[test]
    fn domain_counts_fractional_periods_exactly() {
        // 1/60 s is not a whole number of nanoseconds
        let mut d = ClockDomain::from_hz(60.0, ms(0));
        assert_eq!(d.due(ms(50)), 3);
        assert_eq!(d.due(ms(100)), 3);
        assert_eq!(d.due(ms(60_000)), 3594);
    }

    #[test]
    fn domain_resync_drops_backlog() {
        let mut d = ClockDomain::from_hz(100.0, ms(0));
        d.resync(ms(500));
        assert_eq!(d.due(ms(505)), 0);
        assert_eq!(d.due(ms(510)), 1);
    }

    #[test]
    fn domains_run_at_independent_rates() {
        let mut k = kernel(&SPIN);
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        let pass = s.advance(ms(1000), &mut k, &NO_KEYS).unwrap();
        // float periods may lose the last tick of a whole second
        assert!((699..=700).contains(&pass.cpu_steps), "{:?}", pass);
        assert!((59..=60).contains(&pass.timer_ticks), "{:?}", pass);
        assert!(pass.frame_due);
    }

    #[test]
    fn timers_tick_at_60hz() {
        let mut k = kernel(&SPIN);
        k.timers.dt = 100;
        k.timers.st = 2;
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        let pass = s.advance(ms(100), &mut k, &NO_KEYS).unwrap();
        assert_eq!(pass.timer_ticks, 6);
        assert_eq!(k.timers.dt, 94);
        assert_eq!(k.timers.st, 0);
    }

    #[test]
    fn nothing_is_due_immediately() {
        let mut k = kernel(&SPIN);
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        let pass = s.advance(ms(1), &mut k, &NO_KEYS).unwrap();
        assert_eq!(pass, Pass::default());
    }

    #[test]
    fn pause_gates_only_the_cpu() {
        let mut k = kernel(&SPIN);
        k.timers.dt = 100;
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        s.set_paused(true, ms(0));
        let pass = s.advance(ms(100), &mut k, &NO_KEYS).unwrap();
        assert_eq!(pass.cpu_steps, 0);
        assert_eq!(pass.timer_ticks, 6);
        assert!(pass.frame_due);
        assert_eq!(k.timers.dt, 94);
    }

    #[test]
    fn resume_does_not_burst() {
        let mut k = kernel(&SPIN);
        let mut s = Scheduler::new(100.0, 60.0, 60.0, ms(0));
        s.set_paused(true, ms(0));
        s.advance(ms(5000), &mut k, &NO_KEYS).unwrap();
        s.set_paused(false, ms(5000));
        let pass = s.advance(ms(5020), &mut k, &NO_KEYS).unwrap();
        assert_eq!(pass.cpu_steps, 2);
    }

    #[test]
    fn step_runs_one_instruction_while_paused() {
        // LD V1 1; ADD V1 1; ADD V1 1
        let mut k = kernel(&[0x61, 0x01, 0x71, 0x01, 0x71, 0x01]);
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        s.toggle_pause(ms(0));
        assert!(s.is_paused());
        s.request_step();
        let pass = s.advance(ms(1000), &mut k, &NO_KEYS).unwrap();
        assert_eq!(pass.cpu_steps, 1);
        assert_eq!(k.pc, 0x202);
        let pass = s.advance(ms(2000), &mut k, &NO_KEYS).unwrap();
        assert_eq!(pass.cpu_steps, 0);
        assert_eq!(k.pc, 0x202);
    }

    #[test]
    fn step_request_ignored_when_running() {
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        s.request_step();
        s.set_paused(true, ms(0));
        let mut k = kernel(&SPIN);
        let pass = s.advance(ms(10), &mut k, &NO_KEYS).unwrap();
        assert_eq!(pass.cpu_steps, 0);
    }

    #[test]
    fn fatal_error_stops_the_pass() {
        let mut k = kernel(&[0x00, 0xee]);
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        assert_eq!(
            s.advance(ms(100), &mut k, &NO_KEYS),
            Err(C8Error::StackUnderflow { pc: 0x200 })
        );
    }

    #[test]
    fn wait_for_key_keeps_timers_running() {
        // LD V0, K; JP 0x202
        let mut k = kernel(&[0xf0, 0x0a, 0x12, 0x02]);
        k.timers.dt = 10;
        let mut s = Scheduler::new(700.0, 60.0, 60.0, ms(0));
        let pass = s.advance(ms(50), &mut k, &NO_KEYS).unwrap();
        assert!(pass.cpu_steps > 0);
        assert_eq!(k.pc, 0x200);
        assert_eq!(k.timers.dt, 7);
        s.advance(ms(60), &mut k, &HeldKeys(1 << 4)).unwrap();
        assert_eq!(k.reg[0], 4);
        assert_eq!(k.pc, 0x202);
    }
}
