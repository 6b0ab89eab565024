use crate::{ utils::*, memory::Memory, instructions::Instruction };
use crate::error::{ C8Error, C8Result };
use log::{ debug, trace };
use rand::RngCore;
use std::ops::{ Index, IndexMut };

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers([u8; 16]);

pub type Reg = u8;
pub const V0: Reg = 0x0;
pub const VF: Reg = 0xf;

impl Index<Reg> for Registers {
    type Output = u8;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[index as usize]
    }
}

impl IndexMut<Reg> for Registers {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[index as usize]
    }
}

impl Registers {
    pub fn new() -> Self {
        Registers([0; 16])
    }

    pub fn set_flag(&mut self, flag: bool) {
        self[VF] = flag as u8;
    }
}

/// Return addresses for `CALL`. Pushing past `STACK_DEPTH` or popping an
/// empty stack is refused rather than wrapped.
#[derive(Debug)]
pub struct Stack {
    data: [u16; STACK_DEPTH],
    ptr: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Stack { data: [0; STACK_DEPTH], ptr: 0 }
    }

    pub fn push(&mut self, addr: u16) -> bool {
        if self.ptr < STACK_DEPTH {
            self.data[self.ptr] = addr;
            self.ptr += 1;
            true
        } else {
            false
        }
    }

    pub fn pop(&mut self) -> Option<u16> {
        if self.ptr == 0 {
            None
        } else {
            self.ptr -= 1;
            Some(self.data[self.ptr])
        }
    }

    pub fn depth(&self) -> usize {
        self.ptr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    pub dt: u8,
    pub st: u8,
}

impl Default for Timers {
    fn default() -> Self {
        Timers { dt: TIMER_START, st: TIMER_START }
    }
}

impl Timers {
    /// One 60 Hz tick: both counters drop by one and stop at zero.
    pub fn tick(&mut self) {
        self.dt = self.dt.saturating_sub(1);
        self.st = self.st.saturating_sub(1);
    }
}

/// Monochrome display. Each row is a `u64` whose bit `n` is column `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pub data: [u64; SCREEN_HEIGHT],
    dirty: bool,
}

// rows are stored as u64 and sprites wrap with `rotate_left`
const _: () = assert!(SCREEN_WIDTH == u64::BITS as usize);

impl Default for Framebuffer {
    fn default() -> Self {
        Framebuffer { data: [0; SCREEN_HEIGHT], dirty: true }
    }
}

impl Framebuffer {
    pub fn clear(&mut self) {
        self.data = [0; SCREEN_HEIGHT];
        self.dirty = true;
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        (self.data[y % SCREEN_HEIGHT] >> (x % SCREEN_WIDTH)) & 1 == 1
    }

    /// XOR `sprite` onto the screen with its top-left corner at `(x, y)`.
    /// Rows and columns wrap independently. Returns true when a lit pixel
    /// was turned off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let x_pos = (x as u32) % (SCREEN_WIDTH as u32);
        let y_pos = (y as usize) % SCREEN_HEIGHT;
        let mut flag = false;
        for (row, line) in sprite.iter().enumerate() {
            let target = &mut self.data[(y_pos + row) % SCREEN_HEIGHT];
            let shifted = (line.reverse_bits() as u64).rotate_left(x_pos);
            flag |= (*target & shifted) != 0;
            *target ^= shifted;
        }
        self.dirty = true;
        flag
    }

    /// Checks and clears the redraw flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// Interpreter dialect toggles, fixed for the lifetime of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// `8XY6`/`8XYE` shift `Vy` into `Vx` instead of shifting `Vx` in place.
    pub shift: bool,
    /// `FX55`/`FX65` leave `I` advanced past the last register.
    pub store_load: bool,
    /// `BNNN` adds `Vx` (x being the high nibble of NNN) instead of `V0`.
    pub jump_offset: bool,
}

/// Live state of the 16-key hex keypad.
pub trait Keypad {
    fn is_pressed(&self, key: u8) -> bool;

    fn first_pressed(&self) -> Option<u8> {
        (0..KEY_COUNT).find(|&k| self.is_pressed(k))
    }
}

/// Presentation side of the display.
pub trait Screen {
    fn clear(&mut self) -> C8Result<()>;

    /// Render a full snapshot of the framebuffer.
    fn present(&mut self, buf: &Framebuffer) -> C8Result<()>;
}

pub struct C8Kernel {
    pub mem: Memory,
    pub reg: Registers,
    pub i: u16,
    pub pc: u16,
    pub stack: Stack,
    pub buf: Framebuffer,
    pub timers: Timers,
    pub rng: Box<dyn RngCore>,
    pub quirks: Quirks,
}

impl C8Kernel {
    pub fn new(rom: &[u8], quirks: Quirks, rng: Box<dyn RngCore>) -> C8Result<Self> {
        Ok(Self {
            mem: Memory::from_rom(rom)?,
            reg: Registers::new(),
            i: 0,
            pc: PROGRAM_START as u16,
            stack: Stack::new(),
            buf: Framebuffer::default(),
            timers: Timers::default(),
            rng,
            quirks,
        })
    }

    /// Read the opcode at `PC` and move past it.
    pub fn fetch(&mut self) -> u16 {
        let opcode = self.mem.word(self.pc);
        self.pc = self.pc.wrapping_add(2) & ADDR_MASK;
        opcode
    }

    pub fn step(&mut self, keypad: &dyn Keypad) -> C8Result<()> {
        let at = self.pc;
        let opcode = self.fetch();
        let ins = Instruction::decode(opcode);
        debug!("{:03x}: {:04x}  {}", at, opcode, ins);
        self.execute(ins, keypad)
    }

    pub(crate) fn push_return(&mut self, addr: u16) -> C8Result<()> {
        if self.stack.push(addr) {
            trace!("call depth {}", self.stack.depth());
            Ok(())
        } else {
            Err(C8Error::StackOverflow { pc: self.pc.wrapping_sub(2) & ADDR_MASK })
        }
    }

    pub(crate) fn pop_return(&mut self) -> C8Result<u16> {
        self.stack
            .pop()
            .ok_or(C8Error::StackUnderflow { pc: self.pc.wrapping_sub(2) & ADDR_MASK })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    /// Keypad double with a fixed set of held keys.
    pub struct HeldKeys(pub u16);

    impl Keypad for HeldKeys {
        fn is_pressed(&self, key: u8) -> bool {
            (self.0 & (1 << key)) != 0
        }
    }

    pub fn kernel(rom: &[u8]) -> C8Kernel {
        kernel_with(rom, Quirks::default())
    }

    pub fn kernel_with(rom: &[u8], quirks: Quirks) -> C8Kernel {
        C8Kernel::new(rom, quirks, Box::new(StepRng::new(0, 0))).unwrap()
    }

    #[test]
    fn stack_push_then_pop() {
        let mut s = Stack::new();
        assert!(s.push(0x0232));
        assert!(s.push(0x0456));
        assert_eq!(s.depth(), 2);
        assert_eq!(s.pop(), Some(0x0456));
        assert_eq!(s.pop(), Some(0x0232));
        assert_eq!(s.pop(), None);
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn stack_refuses_overflow() {
        let mut s = Stack::new();
        for n in 0..STACK_DEPTH {
            assert!(s.push(n as u16));
        }
        assert!(!s.push(0xfff));
        assert_eq!(s.depth(), STACK_DEPTH);
        assert_eq!(s.pop(), Some((STACK_DEPTH - 1) as u16));
    }

    #[test]
    fn timers_clamp_at_zero() {
        let mut t = Timers { dt: 2, st: 0 };
        t.tick();
        assert_eq!(t, Timers { dt: 1, st: 0 });
        t.tick();
        t.tick();
        assert_eq!(t, Timers { dt: 0, st: 0 });
    }

    #[test]
    fn timers_start_full() {
        let t = Timers::default();
        assert_eq!(t, Timers { dt: 0xff, st: 0xff });
    }

    #[test]
    fn draw_sets_pixels_left_to_right() {
        let mut fb = Framebuffer::default();
        let flag = fb.draw_sprite(8, 2, &[0b1010_1011]);
        assert!(!flag);
        let lit: Vec<usize> = (0..SCREEN_WIDTH).filter(|&x| fb.pixel(x, 2)).collect();
        assert_eq!(lit, vec![8, 10, 12, 14, 15]);
        assert_eq!(fb.data[1], 0);
        assert_eq!(fb.data[3], 0);
    }

    #[test]
    fn draw_twice_restores_and_flags() {
        let mut fb = Framebuffer::default();
        let sprite = [0xf0, 0x90, 0x90, 0x90, 0xf0];
        assert!(!fb.draw_sprite(20, 10, &sprite));
        let drawn = fb.data;
        assert_ne!(drawn, [0; SCREEN_HEIGHT]);
        assert!(fb.draw_sprite(20, 10, &sprite));
        assert_eq!(fb.data, [0; SCREEN_HEIGHT]);
    }

    #[test]
    fn draw_wraps_columns_without_moving_rows() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite(60, 5, &[0xff]);
        let lit: Vec<usize> = (0..SCREEN_WIDTH).filter(|&x| fb.pixel(x, 5)).collect();
        assert_eq!(lit, vec![0, 1, 2, 3, 60, 61, 62, 63]);
        for y in (0..SCREEN_HEIGHT).filter(|&y| y != 5) {
            assert_eq!(fb.data[y], 0, "row {} touched", y);
        }
    }

    #[test]
    fn draw_wraps_rows_without_moving_columns() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite(3, 30, &[0x80, 0x80, 0x80, 0x80]);
        for y in [30, 31, 0, 1] {
            assert!(fb.pixel(3, y), "row {} not lit", y);
            assert_eq!(fb.data[y], 1 << 3);
        }
        assert_eq!(fb.data[2], 0);
    }

    #[test]
    fn draw_start_position_wraps() {
        let mut fb = Framebuffer::default();
        fb.draw_sprite(64 + 2, 32 + 1, &[0x80]);
        assert!(fb.pixel(2, 1));
    }

    #[test]
    fn take_dirty_clears_flag() {
        let mut fb = Framebuffer::default();
        assert!(fb.take_dirty());
        assert!(!fb.take_dirty());
        fb.draw_sprite(0, 0, &[0x80]);
        assert!(fb.take_dirty());
        fb.clear();
        assert!(fb.take_dirty());
    }

    #[test]
    fn fetch_reads_big_endian_and_advances() {
        let mut k = kernel(&[0x12, 0x28]);
        assert_eq!(k.fetch(), 0x1228);
        assert_eq!(k.pc, 0x202);
    }

    #[test]
    fn first_pressed_picks_lowest_key() {
        assert_eq!(HeldKeys(0).first_pressed(), None);
        assert_eq!(HeldKeys(0b1010_0000).first_pressed(), Some(5));
    }
}
