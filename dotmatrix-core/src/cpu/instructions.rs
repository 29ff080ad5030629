mod parse;

use crate::cpu::registers::{CpuRegisters, Reg16, Reg8};
use crate::memory::ioregisters::IoRegister;
use crate::memory::AddressSpace;
use crate::ppu::PpuState;
use std::fmt::{self, Formatter};

pub use parse::{parse_next_instruction, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
}

impl Condition {
    fn check(self, registers: &CpuRegisters) -> bool {
        match self {
            Self::NZ => !registers.z_flag(),
            Self::Z => registers.z_flag(),
            Self::NC => !registers.c_flag(),
            Self::C => registers.c_flag(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NZ => write!(f, "NZ"),
            Self::Z => write!(f, "Z"),
            Self::NC => write!(f, "NC"),
            Self::C => write!(f, "C"),
        }
    }
}

/// An 8-bit operand: a register, an immediate, or a memory byte addressed
/// through one of the indirect forms. Used as both load source and load
/// destination; immediates are only ever sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    Register(Reg8),
    Immediate(u8),
    BcIndirect,
    DeIndirect,
    HlIndirect,
    // (HL) with post-increment / post-decrement of HL
    HlIndirectInc,
    HlIndirectDec,
    // (0xFF00 | n) and (0xFF00 | C), the LDH forms
    HighImmediate(u8),
    HighCIndirect,
    Absolute(u16),
}

impl Operand8 {
    fn read(
        self,
        registers: &mut CpuRegisters,
        address_space: &AddressSpace,
        ppu_state: &PpuState,
    ) -> u8 {
        match self {
            Self::Register(register) => registers.read(register),
            Self::Immediate(n) => n,
            Self::BcIndirect => {
                address_space.read_address_u8(registers.read_pair(Reg16::BC), ppu_state)
            }
            Self::DeIndirect => {
                address_space.read_address_u8(registers.read_pair(Reg16::DE), ppu_state)
            }
            Self::HlIndirect => address_space.read_address_u8(registers.hl(), ppu_state),
            Self::HlIndirectInc => {
                let hl = registers.hl();
                registers.set_hl(hl.wrapping_add(1));
                address_space.read_address_u8(hl, ppu_state)
            }
            Self::HlIndirectDec => {
                let hl = registers.hl();
                registers.set_hl(hl.wrapping_sub(1));
                address_space.read_address_u8(hl, ppu_state)
            }
            Self::HighImmediate(n) => {
                address_space.read_address_u8(0xFF00 | u16::from(n), ppu_state)
            }
            Self::HighCIndirect => {
                address_space.read_address_u8(0xFF00 | u16::from(registers.c), ppu_state)
            }
            Self::Absolute(nn) => address_space.read_address_u8(nn, ppu_state),
        }
    }

    fn write(
        self,
        value: u8,
        registers: &mut CpuRegisters,
        address_space: &mut AddressSpace,
        ppu_state: &PpuState,
    ) {
        match self {
            Self::Register(register) => {
                registers.write(register, value);
            }
            Self::Immediate(..) => panic!("attempted write to an immediate operand"),
            Self::BcIndirect => {
                address_space.write_address_u8(registers.read_pair(Reg16::BC), value, ppu_state);
            }
            Self::DeIndirect => {
                address_space.write_address_u8(registers.read_pair(Reg16::DE), value, ppu_state);
            }
            Self::HlIndirect => {
                address_space.write_address_u8(registers.hl(), value, ppu_state);
            }
            Self::HlIndirectInc => {
                let hl = registers.hl();
                registers.set_hl(hl.wrapping_add(1));
                address_space.write_address_u8(hl, value, ppu_state);
            }
            Self::HlIndirectDec => {
                let hl = registers.hl();
                registers.set_hl(hl.wrapping_sub(1));
                address_space.write_address_u8(hl, value, ppu_state);
            }
            Self::HighImmediate(n) => {
                address_space.write_address_u8(0xFF00 | u16::from(n), value, ppu_state);
            }
            Self::HighCIndirect => {
                address_space.write_address_u8(0xFF00 | u16::from(registers.c), value, ppu_state);
            }
            Self::Absolute(nn) => {
                address_space.write_address_u8(nn, value, ppu_state);
            }
        }
    }

    /// Extra cycles consumed by fetching/addressing this operand, on top of
    /// the instruction's base cost.
    fn access_cycles(self) -> u32 {
        match self {
            Self::Register(..) => 0,
            Self::Immediate(..)
            | Self::BcIndirect
            | Self::DeIndirect
            | Self::HlIndirect
            | Self::HlIndirectInc
            | Self::HlIndirectDec
            | Self::HighCIndirect => 4,
            Self::HighImmediate(..) => 8,
            Self::Absolute(..) => 12,
        }
    }
}

impl fmt::Display for Operand8 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(register) => write!(f, "{register:?}"),
            Self::Immediate(n) => write!(f, "${n:02X}"),
            Self::BcIndirect => write!(f, "(BC)"),
            Self::DeIndirect => write!(f, "(DE)"),
            Self::HlIndirect => write!(f, "(HL)"),
            Self::HlIndirectInc => write!(f, "(HL+)"),
            Self::HlIndirectDec => write!(f, "(HL-)"),
            Self::HighImmediate(n) => write!(f, "($FF00+${n:02X})"),
            Self::HighCIndirect => write!(f, "($FF00+C)"),
            Self::Absolute(nn) => write!(f, "(${nn:04X})"),
        }
    }
}

/// A read-modify-write target: a register or the byte at (HL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place8 {
    Register(Reg8),
    HlIndirect,
}

impl Place8 {
    fn read(
        self,
        registers: &CpuRegisters,
        address_space: &AddressSpace,
        ppu_state: &PpuState,
    ) -> u8 {
        match self {
            Self::Register(register) => registers.read(register),
            Self::HlIndirect => address_space.read_address_u8(registers.hl(), ppu_state),
        }
    }

    fn write(
        self,
        value: u8,
        registers: &mut CpuRegisters,
        address_space: &mut AddressSpace,
        ppu_state: &PpuState,
    ) {
        match self {
            Self::Register(register) => {
                registers.write(register, value);
            }
            Self::HlIndirect => {
                address_space.write_address_u8(registers.hl(), value, ppu_state);
            }
        }
    }

    fn access_cycles(self) -> u32 {
        match self {
            Self::Register(..) => 0,
            Self::HlIndirect => 4,
        }
    }
}

impl fmt::Display for Place8 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(register) => write!(f, "{register:?}"),
            Self::HlIndirect => write!(f, "(HL)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    // NOP
    Nop,
    // All 8-bit LD/LDH forms: destination, source
    Ld(Operand8, Operand8),
    // LD rr, nn
    Ld16(Reg16, u16),
    // LD (nn), SP
    LdAbsSp(u16),
    // LD SP, HL
    LdSpHl,
    // LD HL, SP+e8
    LdHlSpOffset(i8),
    // PUSH rr / POP rr
    Push(Reg16),
    Pop(Reg16),
    // 8-bit arithmetic/logic on A
    Add(Operand8),
    Adc(Operand8),
    Sub(Operand8),
    Sbc(Operand8),
    Cp(Operand8),
    And(Operand8),
    Or(Operand8),
    Xor(Operand8),
    // INC/DEC r / (HL)
    Inc(Place8),
    Dec(Place8),
    // 16-bit arithmetic
    AddHl(Reg16),
    Inc16(Reg16),
    Dec16(Reg16),
    AddSp(i8),
    // Accumulator rotates (always clear Z)
    Rlca,
    Rla,
    Rrca,
    Rra,
    // CB-prefixed rotates/shifts
    Rlc(Place8),
    Rl(Place8),
    Rrc(Place8),
    Rr(Place8),
    Sla(Place8),
    Sra(Place8),
    Srl(Place8),
    Swap(Place8),
    // CB-prefixed bit operations
    Bit(u8, Place8),
    Res(u8, Place8),
    Set(u8, Place8),
    // Flag/accumulator misc
    Daa,
    Cpl,
    Scf,
    Ccf,
    // Control flow
    Jp(u16),
    JpHl,
    JpCond(Condition, u16),
    Jr(i8),
    JrCond(Condition, i8),
    Call(u16),
    CallCond(Condition, u16),
    Ret,
    RetCond(Condition),
    Reti,
    Rst(u8),
    // CPU state
    Halt,
    Stop,
    Di,
    Ei,
}

impl Instruction {
    /// Execute the instruction against CPU registers and memory.
    ///
    /// PC is expected to already point past this instruction; control-flow
    /// instructions overwrite it.
    pub fn execute(
        self,
        address_space: &mut AddressSpace,
        registers: &mut CpuRegisters,
        ppu_state: &PpuState,
    ) {
        match self {
            Self::Nop => {}
            Self::Ld(dst, src) => {
                let value = src.read(registers, address_space, ppu_state);
                dst.write(value, registers, address_space, ppu_state);
            }
            Self::Ld16(pair, nn) => {
                registers.write_pair(pair, nn);
            }
            Self::LdAbsSp(nn) => {
                address_space.write_address_u16(nn, registers.sp, ppu_state);
            }
            Self::LdSpHl => {
                registers.sp = registers.hl();
            }
            Self::LdHlSpOffset(e) => {
                let (result, carry, half_carry) = add_sp_offset(registers.sp, e);
                registers.set_hl(result);
                registers.set_flags(false, false, half_carry, carry);
            }
            Self::Push(pair) => {
                registers.sp = registers.sp.wrapping_sub(2);
                address_space.write_address_u16(
                    registers.sp,
                    registers.read_pair(pair),
                    ppu_state,
                );
            }
            Self::Pop(pair) => {
                let value = address_space.read_address_u16(registers.sp, ppu_state);
                registers.write_pair(pair, value);
                registers.sp = registers.sp.wrapping_add(2);
            }
            Self::Add(operand) => {
                let rhs = operand.read(registers, address_space, ppu_state);
                let (sum, carry, half_carry) = add(registers.a, rhs, false);
                registers.a = sum;
                registers.set_flags(sum == 0, false, half_carry, carry);
            }
            Self::Adc(operand) => {
                let rhs = operand.read(registers, address_space, ppu_state);
                let (sum, carry, half_carry) = add(registers.a, rhs, registers.c_flag());
                registers.a = sum;
                registers.set_flags(sum == 0, false, half_carry, carry);
            }
            Self::Sub(operand) => {
                let rhs = operand.read(registers, address_space, ppu_state);
                let (difference, carry, half_carry) = sub(registers.a, rhs, false);
                registers.a = difference;
                registers.set_flags(difference == 0, true, half_carry, carry);
            }
            Self::Sbc(operand) => {
                let rhs = operand.read(registers, address_space, ppu_state);
                let (difference, carry, half_carry) = sub(registers.a, rhs, registers.c_flag());
                registers.a = difference;
                registers.set_flags(difference == 0, true, half_carry, carry);
            }
            Self::Cp(operand) => {
                let rhs = operand.read(registers, address_space, ppu_state);
                let (difference, carry, half_carry) = sub(registers.a, rhs, false);
                registers.set_flags(difference == 0, true, half_carry, carry);
            }
            Self::And(operand) => {
                let value = registers.a & operand.read(registers, address_space, ppu_state);
                registers.a = value;
                registers.set_flags(value == 0, false, true, false);
            }
            Self::Or(operand) => {
                let value = registers.a | operand.read(registers, address_space, ppu_state);
                registers.a = value;
                registers.set_flags(value == 0, false, false, false);
            }
            Self::Xor(operand) => {
                let value = registers.a ^ operand.read(registers, address_space, ppu_state);
                registers.a = value;
                registers.set_flags(value == 0, false, false, false);
            }
            Self::Inc(place) => {
                let value = place.read(registers, address_space, ppu_state);
                let (sum, _, half_carry) = add(value, 1, false);
                place.write(sum, registers, address_space, ppu_state);
                registers.set_z(sum == 0);
                registers.set_n(false);
                registers.set_h(half_carry);
            }
            Self::Dec(place) => {
                let value = place.read(registers, address_space, ppu_state);
                let (difference, _, half_carry) = sub(value, 1, false);
                place.write(difference, registers, address_space, ppu_state);
                registers.set_z(difference == 0);
                registers.set_n(true);
                registers.set_h(half_carry);
            }
            Self::AddHl(pair) => {
                let lhs = registers.hl();
                let rhs = registers.read_pair(pair);
                let (sum, carry) = lhs.overflowing_add(rhs);
                registers.set_hl(sum);
                registers.set_n(false);
                registers.set_h((lhs & 0x0FFF) + (rhs & 0x0FFF) >= 0x1000);
                registers.set_c(carry);
            }
            Self::Inc16(pair) => {
                registers.write_pair(pair, registers.read_pair(pair).wrapping_add(1));
            }
            Self::Dec16(pair) => {
                registers.write_pair(pair, registers.read_pair(pair).wrapping_sub(1));
            }
            Self::AddSp(e) => {
                let (result, carry, half_carry) = add_sp_offset(registers.sp, e);
                registers.sp = result;
                registers.set_flags(false, false, half_carry, carry);
            }
            Self::Rlca => {
                let (value, carry) = rotate_left(registers.a);
                registers.a = value;
                registers.set_flags(false, false, false, carry);
            }
            Self::Rla => {
                let (value, carry) = rotate_left_thru_carry(registers.a, registers.c_flag());
                registers.a = value;
                registers.set_flags(false, false, false, carry);
            }
            Self::Rrca => {
                let (value, carry) = rotate_right(registers.a);
                registers.a = value;
                registers.set_flags(false, false, false, carry);
            }
            Self::Rra => {
                let (value, carry) = rotate_right_thru_carry(registers.a, registers.c_flag());
                registers.a = value;
                registers.set_flags(false, false, false, carry);
            }
            Self::Rlc(place) => {
                let (value, carry) = rotate_left(place.read(registers, address_space, ppu_state));
                place.write(value, registers, address_space, ppu_state);
                registers.set_flags(value == 0, false, false, carry);
            }
            Self::Rl(place) => {
                let (value, carry) = rotate_left_thru_carry(
                    place.read(registers, address_space, ppu_state),
                    registers.c_flag(),
                );
                place.write(value, registers, address_space, ppu_state);
                registers.set_flags(value == 0, false, false, carry);
            }
            Self::Rrc(place) => {
                let (value, carry) = rotate_right(place.read(registers, address_space, ppu_state));
                place.write(value, registers, address_space, ppu_state);
                registers.set_flags(value == 0, false, false, carry);
            }
            Self::Rr(place) => {
                let (value, carry) = rotate_right_thru_carry(
                    place.read(registers, address_space, ppu_state),
                    registers.c_flag(),
                );
                place.write(value, registers, address_space, ppu_state);
                registers.set_flags(value == 0, false, false, carry);
            }
            Self::Sla(place) => {
                let value = place.read(registers, address_space, ppu_state);
                let shifted = value << 1;
                place.write(shifted, registers, address_space, ppu_state);
                registers.set_flags(shifted == 0, false, false, value & 0x80 != 0);
            }
            Self::Sra(place) => {
                let value = place.read(registers, address_space, ppu_state);
                let shifted = (value >> 1) | (value & 0x80);
                place.write(shifted, registers, address_space, ppu_state);
                registers.set_flags(shifted == 0, false, false, value & 0x01 != 0);
            }
            Self::Srl(place) => {
                let value = place.read(registers, address_space, ppu_state);
                let shifted = value >> 1;
                place.write(shifted, registers, address_space, ppu_state);
                registers.set_flags(shifted == 0, false, false, value & 0x01 != 0);
            }
            Self::Swap(place) => {
                let value = place.read(registers, address_space, ppu_state);
                let swapped = value.rotate_left(4);
                place.write(swapped, registers, address_space, ppu_state);
                registers.set_flags(swapped == 0, false, false, false);
            }
            Self::Bit(bit, place) => {
                let value = place.read(registers, address_space, ppu_state);
                registers.set_z(value & (1 << bit) == 0);
                registers.set_n(false);
                registers.set_h(true);
            }
            Self::Res(bit, place) => {
                let value = place.read(registers, address_space, ppu_state) & !(1 << bit);
                place.write(value, registers, address_space, ppu_state);
            }
            Self::Set(bit, place) => {
                let value = place.read(registers, address_space, ppu_state) | (1 << bit);
                place.write(value, registers, address_space, ppu_state);
            }
            Self::Daa => {
                decimal_adjust_accumulator(registers);
            }
            Self::Cpl => {
                registers.a = !registers.a;
                registers.set_n(true);
                registers.set_h(true);
            }
            Self::Scf => {
                registers.set_n(false);
                registers.set_h(false);
                registers.set_c(true);
            }
            Self::Ccf => {
                registers.set_n(false);
                registers.set_h(false);
                registers.set_c(!registers.c_flag());
            }
            Self::Jp(nn) => {
                registers.pc = nn;
            }
            Self::JpHl => {
                registers.pc = registers.hl();
            }
            Self::JpCond(condition, nn) => {
                if condition.check(registers) {
                    registers.pc = nn;
                }
            }
            Self::Jr(e) => {
                registers.pc = registers.pc.wrapping_add(e as u16);
            }
            Self::JrCond(condition, e) => {
                if condition.check(registers) {
                    registers.pc = registers.pc.wrapping_add(e as u16);
                }
            }
            Self::Call(nn) => {
                registers.sp = registers.sp.wrapping_sub(2);
                address_space.write_address_u16(registers.sp, registers.pc, ppu_state);
                registers.pc = nn;
            }
            Self::CallCond(condition, nn) => {
                if condition.check(registers) {
                    registers.sp = registers.sp.wrapping_sub(2);
                    address_space.write_address_u16(registers.sp, registers.pc, ppu_state);
                    registers.pc = nn;
                }
            }
            Self::Ret => {
                registers.pc = address_space.read_address_u16(registers.sp, ppu_state);
                registers.sp = registers.sp.wrapping_add(2);
            }
            Self::RetCond(condition) => {
                if condition.check(registers) {
                    registers.pc = address_space.read_address_u16(registers.sp, ppu_state);
                    registers.sp = registers.sp.wrapping_add(2);
                }
            }
            Self::Reti => {
                registers.pc = address_space.read_address_u16(registers.sp, ppu_state);
                registers.sp = registers.sp.wrapping_add(2);
                registers.ime = true;
            }
            Self::Rst(vector) => {
                registers.sp = registers.sp.wrapping_sub(2);
                address_space.write_address_u16(registers.sp, registers.pc, ppu_state);
                registers.pc = vector.into();
            }
            Self::Halt => {
                let ie = address_space.get_ie_register();
                let iff = address_space.get_io_registers().read_register(IoRegister::IF);
                if registers.ime || ie & iff & 0x1F == 0 {
                    registers.halted = true;
                } else {
                    // HALT with IME clear and an interrupt already pending:
                    // the next opcode fetch does not advance PC
                    registers.halt_bug = true;
                }
            }
            Self::Stop => {
                registers.stopped = true;
            }
            Self::Di => {
                registers.ime = false;
                registers.ime_scheduled = false;
            }
            Self::Ei => {
                registers.ime_scheduled = true;
                // EI must not commit its own schedule; IME becomes true only
                // after the following instruction
                return;
            }
        }

        if registers.ime_scheduled {
            registers.ime = true;
            registers.ime_scheduled = false;
        }
    }

    /// T-cycles consumed by this instruction. Conditional control flow costs
    /// the taken count when its condition currently holds, the not-taken
    /// count otherwise.
    pub fn cycles_required(self, registers: &CpuRegisters) -> u32 {
        match self {
            Self::Nop
            | Self::Daa
            | Self::Cpl
            | Self::Scf
            | Self::Ccf
            | Self::Rlca
            | Self::Rla
            | Self::Rrca
            | Self::Rra
            | Self::JpHl
            | Self::Halt
            | Self::Stop
            | Self::Di
            | Self::Ei => 4,

            Self::LdSpHl | Self::AddHl(..) | Self::Inc16(..) | Self::Dec16(..) => 8,
            Self::Ld16(..) | Self::Pop(..) | Self::LdHlSpOffset(..) | Self::Jr(..) => 12,
            Self::Push(..) | Self::AddSp(..) | Self::Jp(..) | Self::Ret | Self::Reti
            | Self::Rst(..) => 16,
            Self::LdAbsSp(..) => 20,
            Self::Call(..) => 24,

            Self::JpCond(condition, ..) => {
                if condition.check(registers) { 16 } else { 12 }
            }
            Self::JrCond(condition, ..) => {
                if condition.check(registers) { 12 } else { 8 }
            }
            Self::CallCond(condition, ..) => {
                if condition.check(registers) { 24 } else { 12 }
            }
            Self::RetCond(condition) => {
                if condition.check(registers) { 20 } else { 8 }
            }

            Self::Ld(dst, src) => 4 + dst.access_cycles() + src.access_cycles(),
            Self::Add(operand)
            | Self::Adc(operand)
            | Self::Sub(operand)
            | Self::Sbc(operand)
            | Self::Cp(operand)
            | Self::And(operand)
            | Self::Or(operand)
            | Self::Xor(operand) => 4 + operand.access_cycles(),
            Self::Inc(place) | Self::Dec(place) => 4 + 2 * place.access_cycles(),
            Self::Bit(_, place) => 8 + place.access_cycles(),
            Self::Rlc(place)
            | Self::Rl(place)
            | Self::Rrc(place)
            | Self::Rr(place)
            | Self::Sla(place)
            | Self::Sra(place)
            | Self::Srl(place)
            | Self::Swap(place)
            | Self::Res(_, place)
            | Self::Set(_, place) => 8 + 2 * place.access_cycles(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Nop => write!(f, "NOP"),
            Self::Ld(Operand8::HighImmediate(n), src) => write!(f, "LDH (${n:02X}), {src}"),
            Self::Ld(dst, Operand8::HighImmediate(n)) => write!(f, "LDH {dst}, (${n:02X})"),
            Self::Ld(dst, src) => write!(f, "LD {dst}, {src}"),
            Self::Ld16(pair, nn) => write!(f, "LD {pair:?}, ${nn:04X}"),
            Self::LdAbsSp(nn) => write!(f, "LD (${nn:04X}), SP"),
            Self::LdSpHl => write!(f, "LD SP, HL"),
            Self::LdHlSpOffset(e) => write!(f, "LD HL, SP{e:+}"),
            Self::Push(pair) => write!(f, "PUSH {pair:?}"),
            Self::Pop(pair) => write!(f, "POP {pair:?}"),
            Self::Add(operand) => write!(f, "ADD A, {operand}"),
            Self::Adc(operand) => write!(f, "ADC A, {operand}"),
            Self::Sub(operand) => write!(f, "SUB {operand}"),
            Self::Sbc(operand) => write!(f, "SBC A, {operand}"),
            Self::Cp(operand) => write!(f, "CP {operand}"),
            Self::And(operand) => write!(f, "AND {operand}"),
            Self::Or(operand) => write!(f, "OR {operand}"),
            Self::Xor(operand) => write!(f, "XOR {operand}"),
            Self::Inc(place) => write!(f, "INC {place}"),
            Self::Dec(place) => write!(f, "DEC {place}"),
            Self::AddHl(pair) => write!(f, "ADD HL, {pair:?}"),
            Self::Inc16(pair) => write!(f, "INC {pair:?}"),
            Self::Dec16(pair) => write!(f, "DEC {pair:?}"),
            Self::AddSp(e) => write!(f, "ADD SP, {e:+}"),
            Self::Rlca => write!(f, "RLCA"),
            Self::Rla => write!(f, "RLA"),
            Self::Rrca => write!(f, "RRCA"),
            Self::Rra => write!(f, "RRA"),
            Self::Rlc(place) => write!(f, "RLC {place}"),
            Self::Rl(place) => write!(f, "RL {place}"),
            Self::Rrc(place) => write!(f, "RRC {place}"),
            Self::Rr(place) => write!(f, "RR {place}"),
            Self::Sla(place) => write!(f, "SLA {place}"),
            Self::Sra(place) => write!(f, "SRA {place}"),
            Self::Srl(place) => write!(f, "SRL {place}"),
            Self::Swap(place) => write!(f, "SWAP {place}"),
            Self::Bit(bit, place) => write!(f, "BIT {bit}, {place}"),
            Self::Res(bit, place) => write!(f, "RES {bit}, {place}"),
            Self::Set(bit, place) => write!(f, "SET {bit}, {place}"),
            Self::Daa => write!(f, "DAA"),
            Self::Cpl => write!(f, "CPL"),
            Self::Scf => write!(f, "SCF"),
            Self::Ccf => write!(f, "CCF"),
            Self::Jp(nn) => write!(f, "JP ${nn:04X}"),
            Self::JpHl => write!(f, "JP HL"),
            Self::JpCond(condition, nn) => write!(f, "JP {condition}, ${nn:04X}"),
            Self::Jr(e) => write!(f, "JR {e:+}"),
            Self::JrCond(condition, e) => write!(f, "JR {condition}, {e:+}"),
            Self::Call(nn) => write!(f, "CALL ${nn:04X}"),
            Self::CallCond(condition, nn) => write!(f, "CALL {condition}, ${nn:04X}"),
            Self::Ret => write!(f, "RET"),
            Self::RetCond(condition) => write!(f, "RET {condition}"),
            Self::Reti => write!(f, "RETI"),
            Self::Rst(vector) => write!(f, "RST ${vector:02X}"),
            Self::Halt => write!(f, "HALT"),
            Self::Stop => write!(f, "STOP"),
            Self::Di => write!(f, "DI"),
            Self::Ei => write!(f, "EI"),
        }
    }
}

fn add(lhs: u8, rhs: u8, carry_in: bool) -> (u8, bool, bool) {
    let carry_in = u8::from(carry_in);
    let sum = u16::from(lhs) + u16::from(rhs) + u16::from(carry_in);
    let half_carry = (lhs & 0x0F) + (rhs & 0x0F) + carry_in >= 0x10;

    (sum as u8, sum > 0xFF, half_carry)
}

fn sub(lhs: u8, rhs: u8, carry_in: bool) -> (u8, bool, bool) {
    let carry_in = u8::from(carry_in);
    let difference = i16::from(lhs) - i16::from(rhs) - i16::from(carry_in);
    let half_carry = (lhs & 0x0F) < (rhs & 0x0F) + carry_in;

    (difference as u8, difference < 0, half_carry)
}

fn rotate_left(value: u8) -> (u8, bool) {
    (value.rotate_left(1), value & 0x80 != 0)
}

fn rotate_left_thru_carry(value: u8, carry: bool) -> (u8, bool) {
    ((value << 1) | u8::from(carry), value & 0x80 != 0)
}

fn rotate_right(value: u8) -> (u8, bool) {
    (value.rotate_right(1), value & 0x01 != 0)
}

fn rotate_right_thru_carry(value: u8, carry: bool) -> (u8, bool) {
    ((value >> 1) | (u8::from(carry) << 7), value & 0x01 != 0)
}

// H and C come from bit 3 / bit 7 carries of the low-byte addition,
// regardless of the offset's sign.
fn add_sp_offset(sp: u16, offset: i8) -> (u16, bool, bool) {
    let offset = offset as u16;
    let half_carry = (sp & 0x000F) + (offset & 0x000F) >= 0x0010;
    let carry = (sp & 0x00FF) + (offset & 0x00FF) >= 0x0100;

    (sp.wrapping_add(offset), carry, half_carry)
}

fn decimal_adjust_accumulator(registers: &mut CpuRegisters) {
    if registers.n_flag() {
        // Previous operation was a subtraction
        let mut value = registers.a;
        if registers.h_flag() {
            value = value.wrapping_sub(0x06);
        }
        if registers.c_flag() {
            value = value.wrapping_sub(0x60);
        }

        registers.a = value;
        registers.set_z(value == 0);
        registers.set_h(false);
    } else {
        // Previous operation was an addition
        let mut value = registers.a;
        let mut carry = false;
        if value > 0x99 || registers.c_flag() {
            value = value.wrapping_add(0x60);
            carry = true;
        }
        if value & 0x0F >= 0x0A || registers.h_flag() {
            value = value.wrapping_add(0x06);
        }

        registers.a = value;
        registers.set_z(value == 0);
        registers.set_h(false);
        registers.set_c(carry);
    }
}
