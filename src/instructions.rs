use crate::cpu::{ C8Kernel, Keypad, Reg, V0 };
use crate::error::C8Result;
use crate::utils::*;
use rand::Rng;
use std::fmt;

/// A decoded opcode. `Unknown` carries any word that matches no documented
/// instruction; it executes as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Cls,
    Ret,
    Sys(u16),
    Jp(u16),
    Call(u16),
    SeByte(Reg, u8),
    SneByte(Reg, u8),
    SeReg(Reg, Reg),
    LdByte(Reg, u8),
    AddByte(Reg, u8),
    LdReg(Reg, Reg),
    Or(Reg, Reg),
    And(Reg, Reg),
    Xor(Reg, Reg),
    AddReg(Reg, Reg),
    Sub(Reg, Reg),
    Shr(Reg, Reg),
    Subn(Reg, Reg),
    Shl(Reg, Reg),
    SneReg(Reg, Reg),
    LdI(u16),
    JpOffset(u16, Reg),
    Rnd(Reg, u8),
    Drw(Reg, Reg, u8),
    Skp(Reg),
    Sknp(Reg),
    LdVxDt(Reg),
    LdVxK(Reg),
    LdDtVx(Reg),
    LdStVx(Reg),
    AddI(Reg),
    LdF(Reg),
    LdB(Reg),
    Store(Reg),
    Load(Reg),
    Unknown(u16),
}

impl Instruction {
    pub fn decode(opcode: u16) -> Self {
        use Instruction::*;
        let [high, low] = opcode.to_be_bytes();
        let h_h = high >> 4;
        let h_l = high & 0b00001111;
        let l_h = low >> 4;
        let l_l = low & 0b00001111;
        match (h_h, h_l, l_h, l_l) {
            (0, 0, 0xe, 0) => Cls,
            (0, 0, 0xe, 0xe) => Ret,
            (0, a_0, a_1, a_2) => Sys(addr(a_0, a_1, a_2)),
            (1, a_0, a_1, a_2) => Jp(addr(a_0, a_1, a_2)),
            (2, a_0, a_1, a_2) => Call(addr(a_0, a_1, a_2)),
            (3, x, b_0, b_1) => SeByte(x, byte(b_0, b_1)),
            (4, x, b_0, b_1) => SneByte(x, byte(b_0, b_1)),
            (5, x, y, 0) => SeReg(x, y),
            (6, x, b_0, b_1) => LdByte(x, byte(b_0, b_1)),
            (7, x, b_0, b_1) => AddByte(x, byte(b_0, b_1)),
            (8, x, y, 0) => LdReg(x, y),
            (8, x, y, 1) => Or(x, y),
            (8, x, y, 2) => And(x, y),
            (8, x, y, 3) => Xor(x, y),
            (8, x, y, 4) => AddReg(x, y),
            (8, x, y, 5) => Sub(x, y),
            (8, x, y, 6) => Shr(x, y),
            (8, x, y, 7) => Subn(x, y),
            (8, x, y, 0xe) => Shl(x, y),
            (9, x, y, 0) => SneReg(x, y),
            (0xa, a_0, a_1, a_2) => LdI(addr(a_0, a_1, a_2)),
            (0xb, a_0, a_1, a_2) => JpOffset(addr(a_0, a_1, a_2), a_0),
            (0xc, x, b_0, b_1) => Rnd(x, byte(b_0, b_1)),
            (0xd, x, y, n) => Drw(x, y, n),
            (0xe, x, 9, 0xe) => Skp(x),
            (0xe, x, 0xa, 1) => Sknp(x),
            (0xf, x, 0, 7) => LdVxDt(x),
            (0xf, x, 0, 0xa) => LdVxK(x),
            (0xf, x, 1, 5) => LdDtVx(x),
            (0xf, x, 1, 8) => LdStVx(x),
            (0xf, x, 1, 0xe) => AddI(x),
            (0xf, x, 2, 9) => LdF(x),
            (0xf, x, 3, 3) => LdB(x),
            (0xf, x, 5, 5) => Store(x),
            (0xf, x, 6, 5) => Load(x),
            _ => Unknown(opcode),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Sys(a) => write!(f, "SYS {:#05x}", a),
            Jp(a) => write!(f, "JP {:#05x}", a),
            Call(a) => write!(f, "CALL {:#05x}", a),
            SeByte(x, b) => write!(f, "SE V{:X}, {:#04x}", x, b),
            SneByte(x, b) => write!(f, "SNE V{:X}, {:#04x}", x, b),
            SeReg(x, y) => write!(f, "SE V{:X}, V{:X}", x, y),
            LdByte(x, b) => write!(f, "LD V{:X}, {:#04x}", x, b),
            AddByte(x, b) => write!(f, "ADD V{:X}, {:#04x}", x, b),
            LdReg(x, y) => write!(f, "LD V{:X}, V{:X}", x, y),
            Or(x, y) => write!(f, "OR V{:X}, V{:X}", x, y),
            And(x, y) => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor(x, y) => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddReg(x, y) => write!(f, "ADD V{:X}, V{:X}", x, y),
            Sub(x, y) => write!(f, "SUB V{:X}, V{:X}", x, y),
            Shr(x, y) => write!(f, "SHR V{:X}, V{:X}", x, y),
            Subn(x, y) => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Shl(x, y) => write!(f, "SHL V{:X}, V{:X}", x, y),
            SneReg(x, y) => write!(f, "SNE V{:X}, V{:X}", x, y),
            LdI(a) => write!(f, "LD I, {:#05x}", a),
            JpOffset(a, _) => write!(f, "JP V0, {:#05x}", a),
            Rnd(x, b) => write!(f, "RND V{:X}, {:#04x}", x, b),
            Drw(x, y, n) => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Skp(x) => write!(f, "SKP V{:X}", x),
            Sknp(x) => write!(f, "SKNP V{:X}", x),
            LdVxDt(x) => write!(f, "LD V{:X}, DT", x),
            LdVxK(x) => write!(f, "LD V{:X}, K", x),
            LdDtVx(x) => write!(f, "LD DT, V{:X}", x),
            LdStVx(x) => write!(f, "LD ST, V{:X}", x),
            AddI(x) => write!(f, "ADD I, V{:X}", x),
            LdF(x) => write!(f, "LD F, V{:X}", x),
            LdB(x) => write!(f, "LD B, V{:X}", x),
            Store(x) => write!(f, "LD [I], V{:X}", x),
            Load(x) => write!(f, "LD V{:X}, [I]", x),
            Unknown(op) => write!(f, "??? {:#06x}", op),
        }
    }
}

// instructions
impl C8Kernel {
    pub fn execute(&mut self, ins: Instruction, keypad: &dyn Keypad) -> C8Result<()> {
        use Instruction::*;
        match ins {
            Cls => self.cls(),
            Ret => self.ret()?,
            Sys(a) => self.sys_aaa(a),
            Jp(a) => self.jp_aaa(a),
            Call(a) => self.call_aaa(a)?,
            SeByte(x, b) => self.se_vx_bb(x, b),
            SneByte(x, b) => self.sne_vx_bb(x, b),
            SeReg(x, y) => self.se_vx_vy(x, y),
            LdByte(x, b) => self.ld_vx_bb(x, b),
            AddByte(x, b) => self.add_vx_bb(x, b),
            LdReg(x, y) => self.ld_vx_vy(x, y),
            Or(x, y) => self.or_vx_vy(x, y),
            And(x, y) => self.and_vx_vy(x, y),
            Xor(x, y) => self.xor_vx_vy(x, y),
            AddReg(x, y) => self.add_vx_vy(x, y),
            Sub(x, y) => self.sub_vx_vy(x, y),
            Shr(x, y) => self.shr_vx_vy(x, y),
            Subn(x, y) => self.subn_vx_vy(x, y),
            Shl(x, y) => self.shl_vx_vy(x, y),
            SneReg(x, y) => self.sne_vx_vy(x, y),
            LdI(a) => self.ld_i_aaa(a),
            JpOffset(a, x) => self.jp_v0_aaa(a, x),
            Rnd(x, b) => self.rnd_vx_bb(x, b),
            Drw(x, y, n) => self.drw_vx_vy_n(x, y, n),
            Skp(x) => self.skp_vx(x, keypad),
            Sknp(x) => self.sknp_vx(x, keypad),
            LdVxDt(x) => self.ld_vx_dt(x),
            LdVxK(x) => self.ld_vx_k(x, keypad),
            LdDtVx(x) => self.ld_dt_vx(x),
            LdStVx(x) => self.ld_st_vx(x),
            AddI(x) => self.add_i_vx(x),
            LdF(x) => self.ld_f_vx(x),
            LdB(x) => self.ld_b_vx(x),
            Store(x) => self.ld_i_vx(x),
            Load(x) => self.ld_vx_i(x),
            Unknown(_) => {}
        }
        Ok(())
    }

    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2) & ADDR_MASK;
    }

    /// Clear the display buffer.
    pub fn cls(&mut self) {
        self.buf.clear();
    }

    /// Return from a subroutine. Set the program counter to the address at the top of the stack.
    pub fn ret(&mut self) -> C8Result<()> {
        self.pc = self.pop_return()?;
        Ok(())
    }

    /// Machine-code call on the original hardware. Executes as a no-op.
    pub fn sys_aaa(&mut self, _a: u16) {}

    /// Jump to address `a`.
    pub fn jp_aaa(&mut self, a: u16) {
        self.pc = a;
    }

    /// Call subroutine at address `a`. The current program counter is pushed onto the stack.
    pub fn call_aaa(&mut self, a: u16) -> C8Result<()> {
        self.push_return(self.pc)?;
        self.pc = a;
        Ok(())
    }

    /// Skip the next instruction if register `Vx` equals `b`.
    pub fn se_vx_bb(&mut self, x: Reg, b: u8) {
        if self.reg[x] == b {
            self.skip();
        }
    }

    /// Skip the next instruction if register `Vx` does not equal `b`.
    pub fn sne_vx_bb(&mut self, x: Reg, b: u8) {
        if self.reg[x] != b {
            self.skip();
        }
    }

    /// Skip the next instruction if register `Vx` equals register `Vy`.
    pub fn se_vx_vy(&mut self, x: Reg, y: Reg) {
        if self.reg[x] == self.reg[y] {
            self.skip();
        }
    }

    /// Set register `Vx` to `b`.
    pub fn ld_vx_bb(&mut self, x: Reg, b: u8) {
        self.reg[x] = b;
    }

    /// Add the value `b` to register `Vx`. The flag register is untouched.
    pub fn add_vx_bb(&mut self, x: Reg, b: u8) {
        self.reg[x] = self.reg[x].wrapping_add(b);
    }

    /// Set register `Vx` to the value of register `Vy`.
    pub fn ld_vx_vy(&mut self, x: Reg, y: Reg) {
        self.reg[x] = self.reg[y];
    }

    /// Set register `Vx` to `Vx` OR `Vy`.
    pub fn or_vx_vy(&mut self, x: Reg, y: Reg) {
        self.reg[x] |= self.reg[y];
    }

    /// Set register `Vx` to `Vx` AND `Vy`.
    pub fn and_vx_vy(&mut self, x: Reg, y: Reg) {
        self.reg[x] &= self.reg[y];
    }

    /// Set register `Vx` to `Vx` XOR `Vy`.
    pub fn xor_vx_vy(&mut self, x: Reg, y: Reg) {
        self.reg[x] ^= self.reg[y];
    }

    /// Add the value of register `Vy` to register `Vx`. Set the flag register to 01 if a carry occurs.
    pub fn add_vx_vy(&mut self, x: Reg, y: Reg) {
        let (ret, carry) = self.reg[x].overflowing_add(self.reg[y]);
        self.reg[x] = ret;
        self.reg.set_flag(carry);
    }

    /// Subtract the value of register `Vy` from register `Vx`. Set the flag register to 01 if no borrow occurs.
    pub fn sub_vx_vy(&mut self, x: Reg, y: Reg) {
        let not_borrow = self.reg[x] >= self.reg[y];
        self.reg[x] = self.reg[x].wrapping_sub(self.reg[y]);
        self.reg.set_flag(not_borrow);
    }

    /// Store the least significant bit of the source in the flag register and
    /// put the source shifted right by 1 in `Vx`. The source is `Vy` under the
    /// shift quirk, `Vx` otherwise.
    pub fn shr_vx_vy(&mut self, x: Reg, y: Reg) {
        let src = if self.quirks.shift { self.reg[y] } else { self.reg[x] };
        self.reg[x] = src >> 1;
        self.reg.set_flag((src & 1) == 1);
    }

    /// Set register `Vx` to the value of `Vy` minus `Vx`. Set flag register to 01 if no borrow occurs.
    pub fn subn_vx_vy(&mut self, x: Reg, y: Reg) {
        let not_borrow = self.reg[y] >= self.reg[x];
        self.reg[x] = self.reg[y].wrapping_sub(self.reg[x]);
        self.reg.set_flag(not_borrow);
    }

    /// Store the most significant bit of the source in the flag register and
    /// put the source shifted left by 1 in `Vx`.
    pub fn shl_vx_vy(&mut self, x: Reg, y: Reg) {
        let src = if self.quirks.shift { self.reg[y] } else { self.reg[x] };
        self.reg[x] = src << 1;
        self.reg.set_flag((src & 0b10000000) == 0b10000000);
    }

    /// Skip the next instruction if register `Vx` does not equal register `Vy`.
    pub fn sne_vx_vy(&mut self, x: Reg, y: Reg) {
        if self.reg[x] != self.reg[y] {
            self.skip();
        }
    }

    /// Set the memory pointer `I` to the address `a`.
    pub fn ld_i_aaa(&mut self, a: u16) {
        self.i = a;
    }

    /// Jump to the address `a` plus `V0`, or plus `Vx` under the jump-offset quirk.
    pub fn jp_v0_aaa(&mut self, a: u16, x: Reg) {
        let offset = if self.quirks.jump_offset { self.reg[x] } else { self.reg[V0] };
        self.pc = a.wrapping_add(offset as u16) & ADDR_MASK;
    }

    /// Set register `Vx` to the result of a bitwise AND on a random number and `b`.
    pub fn rnd_vx_bb(&mut self, x: Reg, b: u8) {
        self.reg[x] = self.rng.gen::<u8>() & b;
    }

    /// Draw a sprite at coordinate `(Vx, Vy)` with `n` bytes of sprite data starting at the memory pointer `I`.
    /// Set the flag register to 01 if any set pixels are changed to unset, and to 00 otherwise.
    pub fn drw_vx_vy_n(&mut self, x: Reg, y: Reg, n: u8) {
        let mut sprite = [0u8; 15];
        let sprite = &mut sprite[..n as usize];
        for (row, line) in sprite.iter_mut().enumerate() {
            *line = self.mem.get(self.i.wrapping_add(row as u16));
        }
        let flag = self.buf.draw_sprite(self.reg[x], self.reg[y], sprite);
        self.reg.set_flag(flag); // Set collision flag
    }

    /// Skip the next instruction if the key corresponding to the value of register `Vx` is pressed.
    pub fn skp_vx(&mut self, x: Reg, keypad: &dyn Keypad) {
        let key = self.reg[x];
        if key < KEY_COUNT && keypad.is_pressed(key) {
            self.skip();
        }
    }

    /// Skip the next instruction if the key corresponding to the value of register `Vx` is not pressed.
    pub fn sknp_vx(&mut self, x: Reg, keypad: &dyn Keypad) {
        let key = self.reg[x];
        if !(key < KEY_COUNT && keypad.is_pressed(key)) {
            self.skip();
        }
    }

    /// Set register `Vx` to the value of the delay timer.
    pub fn ld_vx_dt(&mut self, x: Reg) {
        self.reg[x] = self.timers.dt;
    }

    /// Wait for a key press and then store the result in register `Vx`. If no key is pressed, repeat the instruction.
    pub fn ld_vx_k(&mut self, x: Reg, keypad: &dyn Keypad) {
        if let Some(key) = keypad.first_pressed() {
            self.reg[x] = key;
        } else {
            self.pc = self.pc.wrapping_sub(2) & ADDR_MASK; // Repeat the instruction if no key is pressed
        }
    }

    /// Set the delay timer to the value of register `Vx`.
    pub fn ld_dt_vx(&mut self, x: Reg) {
        self.timers.dt = self.reg[x];
    }

    /// Set the sound timer to the value of register `Vx`.
    pub fn ld_st_vx(&mut self, x: Reg) {
        self.timers.st = self.reg[x];
    }

    /// Add the value of register `Vx` to the memory pointer `I`. The flag
    /// register is set to 01 when the sum leaves the 12-bit address space and
    /// is left alone otherwise; `I` keeps the low 12 bits.
    pub fn add_i_vx(&mut self, x: Reg) {
        let sum = self.i + (self.reg[x] as u16);
        if sum > ADDR_MASK {
            self.reg.set_flag(true);
        }
        self.i = sum & ADDR_MASK;
    }

    /// Set `I` to the location of the sprite for the character in `Vx`. Characters 0-F are represented by a 4x5 font.
    pub fn ld_f_vx(&mut self, x: Reg) {
        let digit = self.reg[x];
        if digit < KEY_COUNT {
            self.i = (FONT_START as u16) + (digit as u16) * (FONT_SIZE as u16);
        }
    }

    /// Store the BCD representation of register `Vx` in memory locations `I`, `I+1`, and `I+2`.
    pub fn ld_b_vx(&mut self, x: Reg) {
        let val = self.reg[x];
        *self.mem.get_mut(self.i) = val / 100;
        *self.mem.get_mut(self.i.wrapping_add(1)) = (val / 10) % 10;
        *self.mem.get_mut(self.i.wrapping_add(2)) = val % 10;
    }

    /// Store registers `V0` through `Vx` in memory starting at location `I`.
    pub fn ld_i_vx(&mut self, x: Reg) {
        for r in 0..=x {
            *self.mem.get_mut(self.i.wrapping_add(r as u16)) = self.reg[r];
        }
        self.advance_i_after_block(x);
    }

    /// Read registers `V0` through `Vx` from memory starting at location `I`.
    pub fn ld_vx_i(&mut self, x: Reg) {
        for r in 0..=x {
            self.reg[r] = self.mem.get(self.i.wrapping_add(r as u16));
        }
        self.advance_i_after_block(x);
    }

    fn advance_i_after_block(&mut self, x: Reg) {
        if self.quirks.store_load {
            self.i = self.i.wrapping_add((x as u16) + 1) & ADDR_MASK;
        }
    }
}
