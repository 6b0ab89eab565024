use crate::error::{ C8Error, C8Result };
use crossterm::style::Color;
use std::{ time::Duration, fmt::Display, fmt::Debug };

// No magic numbers :)
pub const PIXEL_EMPTY: &str = " ";
pub const PIXEL_HALF: &str = "\u{2584}";
pub const SCREEN_ON_COLOR: Color = Color::White;
pub const SCREEN_OFF_COLOR: Color = Color::DarkGrey;
pub const CPU_TICK_RATE_HZ: f64 = 700.0;
pub const MIN_CPU_RATE_HZ: f64 = 1.0;
pub const MAX_CPU_RATE_HZ: f64 = 1_000_000.0;
pub const TIMER_TICK_RATE_HZ: f64 = 60.0;
pub const FRAME_RATE_HZ: f64 = 60.0;
pub const HOST_PACING: Duration = Duration::from_millis(1);
pub const INPUT_TIMEOUT: Duration = Duration::from_millis(17);
pub const MEM_SIZE: usize = 0x1000;
pub const ADDR_MASK: u16 = 0x0fff;
pub const FONT_START: usize = 0x000;
pub const FONT_SIZE: usize = 5;
pub const PROGRAM_START: usize = 0x200;
pub const STACK_DEPTH: usize = 32;
pub const KEY_COUNT: u8 = 16;
pub const TIMER_START: u8 = u8::MAX;
pub const SCREEN_HEIGHT: usize = 32;
pub const SCREEN_HEIGHT_TERMINAL_UNITS: usize = 16;
pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_OFFSET_X: u16 = 0;
pub const SCREEN_OFFSET_Y: u16 = 0;

#[rustfmt::skip]
pub const FONT: [u8; 16 * FONT_SIZE] = [
    0xf0, 0x90, 0x90, 0x90, 0xf0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xf0, 0x10, 0xf0, 0x80, 0xf0, // 2
    0xf0, 0x10, 0xf0, 0x10, 0xf0, // 3
    0x90, 0x90, 0xf0, 0x10, 0x10, // 4
    0xf0, 0x80, 0xf0, 0x10, 0xf0, // 5
    0xf0, 0x80, 0xf0, 0x90, 0xf0, // 6
    0xf0, 0x10, 0x20, 0x40, 0x40, // 7
    0xf0, 0x90, 0xf0, 0x90, 0xf0, // 8
    0xf0, 0x90, 0xf0, 0x10, 0xf0, // 9
    0xf0, 0x90, 0xf0, 0x90, 0x90, // A
    0xe0, 0x90, 0xe0, 0x90, 0xe0, // B
    0xf0, 0x80, 0x80, 0x80, 0xf0, // C
    0xe0, 0x90, 0x90, 0x90, 0xe0, // D
    0xf0, 0x80, 0xf0, 0x80, 0xf0, // E
    0xf0, 0x80, 0xf0, 0x80, 0x80, // F
];

pub trait IntoC8Result<T, M: Display> {
    // just for convenience
    fn c8_err(self, msg: M) -> C8Result<T>;
}

impl<T, E: Debug, M: Display> IntoC8Result<T, M> for Result<T, E> {
    fn c8_err(self, msg: M) -> C8Result<T> {
        self.map_err(|e| C8Error::Host {
            context: msg.to_string(),
            detail: format!("{:?}", e),
        })
    }
}

pub fn byte(b_0: u8, b_1: u8) -> u8 {
    (b_0 << 4) | b_1
}

pub fn addr(a_0: u8, a_1: u8, a_2: u8) -> u16 {
    ((a_0 as u16) << 8) | ((a_1 as u16) << 4) | (a_2 as u16)
}

/// Maps a host key character to its keypad index. The layout is the usual
/// left-hand block of a qwerty keyboard:
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// q w e r  ->  4 5 6 D
/// a s d f      7 8 9 E
/// z x c v      A 0 B F
/// ```
macro_rules! match_input {
    ($target:expr) => {
        match_input!(@inner $target; 'x'0'1'1'2'2'3'3'q'4'w'5'e'6'a'7's'8'd'9'z'10'c'11'4'12'r'13'f'14'v'15)
    };
    (@inner $target:expr; $($chr:literal $idx:literal)*) => {
        match $target {
            $(
                $chr => Some($idx),
            )*
            _ => None,
        }
    };
}

pub fn key_index(c: char) -> Option<u8> {
    match_input!(c.to_ascii_lowercase())
}
