use crate::cpu::{ Framebuffer, Keypad, Screen };
use crate::error::C8Result;
use crate::run::ExitKind;
use crate::utils::*;
use crossterm::{
    cursor::MoveTo,
    event::{ self, Event, KeyCode, KeyEvent, KeyModifiers },
    style::{ Color, Colors, Print, SetBackgroundColor, SetColors },
    QueueableCommand,
};
use log::trace;
use std::io::Write;
use std::time::{ Duration, Instant };

/// Draws the framebuffer into a terminal, two pixel rows per character cell.
pub struct TerminalScreen<W: Write> {
    stream: W,
}

/// Foreground, background and glyph for one cell holding a top and a bottom pixel.
fn cell(top_px: bool, bottom_px: bool) -> (Color, Color, &'static str) {
    let color = |on: bool| if on { SCREEN_ON_COLOR } else { SCREEN_OFF_COLOR };
    if top_px ^ bottom_px {
        // the lower half block is painted in the foreground colour
        (color(bottom_px), color(top_px), PIXEL_HALF)
    } else {
        (color(top_px), color(top_px), PIXEL_EMPTY)
    }
}

impl<W: Write> TerminalScreen<W> {
    pub fn new(stream: W) -> Self {
        TerminalScreen { stream }
    }

    fn draw_slice(&mut self, buf: &Framebuffer, y: usize) -> C8Result<()> {
        self.stream
            .queue(MoveTo(SCREEN_OFFSET_X, SCREEN_OFFSET_Y + (y as u16)))
            .c8_err("Could not move cursor")?;
        for x in 0..SCREEN_WIDTH {
            let (fg, bg, glyph) = cell(buf.pixel(x, 2 * y), buf.pixel(x, 2 * y + 1));
            self.stream
                .queue(SetColors(Colors::new(fg, bg)))
                .c8_err("Could not set colors")?
                .queue(Print(glyph))
                .c8_err("Could not print pixel")?;
        }
        Ok(())
    }
}

impl<W: Write> Screen for TerminalScreen<W> {
    fn clear(&mut self) -> C8Result<()> {
        let empty_row = PIXEL_EMPTY.repeat(SCREEN_WIDTH);
        for y in 0..SCREEN_HEIGHT_TERMINAL_UNITS {
            self.stream
                .queue(MoveTo(SCREEN_OFFSET_X, SCREEN_OFFSET_Y + (y as u16)))
                .c8_err("Could not move cursor")?
                .queue(SetBackgroundColor(SCREEN_OFF_COLOR))
                .c8_err("Could not set background color")?
                .queue(Print(&empty_row))
                .c8_err("Could not print row")?;
        }
        self.stream.flush().c8_err("Could not flush stdout")
    }

    fn present(&mut self, buf: &Framebuffer) -> C8Result<()> {
        for y in 0..SCREEN_HEIGHT_TERMINAL_UNITS {
            self.draw_slice(buf, y)?;
        }
        self.stream.flush().c8_err("Could not flush stdout")
    }
}

/// Requests from the host keyboard that are not keypad presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Quit(ExitKind),
    TogglePause,
    Step,
}

/// Keypad backed by terminal key events. Terminals only report presses, so
/// a key counts as held until `INPUT_TIMEOUT` after its last press or repeat.
#[derive(Debug, Default)]
pub struct TerminalKeypad {
    held_until: [Option<Instant>; KEY_COUNT as usize],
}

impl TerminalKeypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain pending terminal events without blocking.
    pub fn poll(&mut self) -> C8Result<Vec<HostEvent>> {
        let mut events = vec![];
        while event::poll(Duration::from_millis(0)).c8_err("Could not poll terminal events")? {
            if let Event::Key(k) = event::read().c8_err("Could not read terminal event")? {
                if let Some(ev) = self.handle_key(k, Instant::now()) {
                    events.push(ev);
                }
            }
        }
        self.expire(Instant::now());
        Ok(events)
    }

    pub fn handle_key(&mut self, k: KeyEvent, now: Instant) -> Option<HostEvent> {
        match (k.code, k.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(HostEvent::Quit(ExitKind::Forced)),
            (KeyCode::Esc, _) => Some(HostEvent::Quit(ExitKind::Natural)),
            (KeyCode::Char(' '), KeyModifiers::NONE) => Some(HostEvent::TogglePause),
            (KeyCode::Char('n'), KeyModifiers::NONE) => Some(HostEvent::Step),
            (KeyCode::Char(c), KeyModifiers::NONE) | (KeyCode::Char(c), KeyModifiers::SHIFT) => {
                if let Some(i) = key_index(c) {
                    trace!("key {:X} down", i);
                    self.held_until[i as usize] = Some(now + INPUT_TIMEOUT);
                }
                None
            }
            _ => None,
        }
    }

    pub fn expire(&mut self, now: Instant) {
        for slot in self.held_until.iter_mut() {
            if matches!(*slot, Some(until) if until <= now) {
                *slot = None;
            }
        }
    }
}

impl Keypad for TerminalKeypad {
    fn is_pressed(&self, key: u8) -> bool {
        self.held_until
            .get(key as usize)
            .map_or(false, |slot| slot.is_some())
    }
}
