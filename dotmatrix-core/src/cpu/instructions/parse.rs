use crate::cpu::instructions::{Condition, Instruction, Operand8, Place8};
use crate::cpu::registers::{Reg16, Reg8};
use crate::memory::AddressSpace;
use crate::ppu::PpuState;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("invalid opcode byte: {opcode:02X}")]
    InvalidOpcode { opcode: u8 },
}

fn reg_or_hl_place(opcode_bits: u8) -> Place8 {
    Reg8::from_low_opcode_bits(opcode_bits).map_or(Place8::HlIndirect, Place8::Register)
}

fn reg_or_hl_operand(opcode_bits: u8) -> Operand8 {
    Reg8::from_low_opcode_bits(opcode_bits).map_or(Operand8::HlIndirect, Operand8::Register)
}

fn pair_for_arithmetic(opcode: u8) -> Reg16 {
    match opcode & 0x30 {
        0x00 => Reg16::BC,
        0x10 => Reg16::DE,
        0x20 => Reg16::HL,
        _ => Reg16::SP,
    }
}

fn pair_for_push_pop(opcode: u8) -> Reg16 {
    match opcode & 0x30 {
        0x00 => Reg16::BC,
        0x10 => Reg16::DE,
        0x20 => Reg16::HL,
        _ => Reg16::AF,
    }
}

fn condition(opcode: u8) -> Condition {
    match opcode & 0x18 {
        0x00 => Condition::NZ,
        0x08 => Condition::Z,
        0x10 => Condition::NC,
        _ => Condition::C,
    }
}

/// Decode the instruction at the given PC.
///
/// Returns the instruction together with the address of the following
/// instruction. Under the halt bug the opcode fetch does not advance PC, so
/// the returned address is one lower than normal.
pub fn parse_next_instruction(
    address_space: &AddressSpace,
    mut pc: u16,
    ppu_state: &PpuState,
    halt_bug: bool,
) -> Result<(Instruction, u16), ParseError> {
    let opcode = address_space.read_address_u8(pc, ppu_state);

    if halt_bug {
        pc = pc.wrapping_sub(1);
    }

    let fetch_u8 = |offset: u16| address_space.read_address_u8(pc.wrapping_add(offset), ppu_state);
    let fetch_u16 = |offset: u16| address_space.read_address_u16(pc.wrapping_add(offset), ppu_state);

    let (instruction, length) = match opcode {
        0x00 => (Instruction::Nop, 1),
        0x01 | 0x11 | 0x21 | 0x31 => {
            (Instruction::Ld16(pair_for_arithmetic(opcode), fetch_u16(1)), 3)
        }
        0x02 => (Instruction::Ld(Operand8::BcIndirect, Operand8::Register(Reg8::A)), 1),
        0x03 | 0x13 | 0x23 | 0x33 => (Instruction::Inc16(pair_for_arithmetic(opcode)), 1),
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
            (Instruction::Inc(reg_or_hl_place(opcode >> 3)), 1)
        }
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
            (Instruction::Dec(reg_or_hl_place(opcode >> 3)), 1)
        }
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
            (Instruction::Ld(reg_or_hl_operand(opcode >> 3), Operand8::Immediate(fetch_u8(1))), 2)
        }
        0x07 => (Instruction::Rlca, 1),
        0x08 => (Instruction::LdAbsSp(fetch_u16(1)), 3),
        0x09 | 0x19 | 0x29 | 0x39 => (Instruction::AddHl(pair_for_arithmetic(opcode)), 1),
        0x0A => (Instruction::Ld(Operand8::Register(Reg8::A), Operand8::BcIndirect), 1),
        0x0B | 0x1B | 0x2B | 0x3B => (Instruction::Dec16(pair_for_arithmetic(opcode)), 1),
        0x0F => (Instruction::Rrca, 1),
        // STOP consumes a padding byte after the opcode
        0x10 => (Instruction::Stop, 2),
        0x12 => (Instruction::Ld(Operand8::DeIndirect, Operand8::Register(Reg8::A)), 1),
        0x17 => (Instruction::Rla, 1),
        0x18 => (Instruction::Jr(fetch_u8(1) as i8), 2),
        0x1A => (Instruction::Ld(Operand8::Register(Reg8::A), Operand8::DeIndirect), 1),
        0x1F => (Instruction::Rra, 1),
        0x20 | 0x28 | 0x30 | 0x38 => {
            (Instruction::JrCond(condition(opcode), fetch_u8(1) as i8), 2)
        }
        0x22 => (Instruction::Ld(Operand8::HlIndirectInc, Operand8::Register(Reg8::A)), 1),
        0x27 => (Instruction::Daa, 1),
        0x2A => (Instruction::Ld(Operand8::Register(Reg8::A), Operand8::HlIndirectInc), 1),
        0x2F => (Instruction::Cpl, 1),
        0x32 => (Instruction::Ld(Operand8::HlIndirectDec, Operand8::Register(Reg8::A)), 1),
        0x37 => (Instruction::Scf, 1),
        0x3A => (Instruction::Ld(Operand8::Register(Reg8::A), Operand8::HlIndirectDec), 1),
        0x3F => (Instruction::Ccf, 1),
        0x76 => (Instruction::Halt, 1),
        0x40..=0x7F => {
            let dst = Reg8::from_mid_opcode_bits(opcode)
                .map_or(Operand8::HlIndirect, Operand8::Register);
            (Instruction::Ld(dst, reg_or_hl_operand(opcode)), 1)
        }
        0x80..=0x87 => (Instruction::Add(reg_or_hl_operand(opcode)), 1),
        0x88..=0x8F => (Instruction::Adc(reg_or_hl_operand(opcode)), 1),
        0x90..=0x97 => (Instruction::Sub(reg_or_hl_operand(opcode)), 1),
        0x98..=0x9F => (Instruction::Sbc(reg_or_hl_operand(opcode)), 1),
        0xA0..=0xA7 => (Instruction::And(reg_or_hl_operand(opcode)), 1),
        0xA8..=0xAF => (Instruction::Xor(reg_or_hl_operand(opcode)), 1),
        0xB0..=0xB7 => (Instruction::Or(reg_or_hl_operand(opcode)), 1),
        0xB8..=0xBF => (Instruction::Cp(reg_or_hl_operand(opcode)), 1),
        0xC0 | 0xC8 | 0xD0 | 0xD8 => (Instruction::RetCond(condition(opcode)), 1),
        0xC1 | 0xD1 | 0xE1 | 0xF1 => (Instruction::Pop(pair_for_push_pop(opcode)), 1),
        0xC2 | 0xCA | 0xD2 | 0xDA => {
            (Instruction::JpCond(condition(opcode), fetch_u16(1)), 3)
        }
        0xC3 => (Instruction::Jp(fetch_u16(1)), 3),
        0xC4 | 0xCC | 0xD4 | 0xDC => {
            (Instruction::CallCond(condition(opcode), fetch_u16(1)), 3)
        }
        0xC5 | 0xD5 | 0xE5 | 0xF5 => (Instruction::Push(pair_for_push_pop(opcode)), 1),
        0xC6 => (Instruction::Add(Operand8::Immediate(fetch_u8(1))), 2),
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
            (Instruction::Rst(opcode & 0x38), 1)
        }
        0xC9 => (Instruction::Ret, 1),
        0xCB => (parse_cb_prefixed_opcode(fetch_u8(1)), 2),
        0xCD => (Instruction::Call(fetch_u16(1)), 3),
        0xCE => (Instruction::Adc(Operand8::Immediate(fetch_u8(1))), 2),
        0xD6 => (Instruction::Sub(Operand8::Immediate(fetch_u8(1))), 2),
        0xD9 => (Instruction::Reti, 1),
        0xDE => (Instruction::Sbc(Operand8::Immediate(fetch_u8(1))), 2),
        0xE0 => {
            (Instruction::Ld(Operand8::HighImmediate(fetch_u8(1)), Operand8::Register(Reg8::A)), 2)
        }
        0xE2 => (Instruction::Ld(Operand8::HighCIndirect, Operand8::Register(Reg8::A)), 1),
        0xE6 => (Instruction::And(Operand8::Immediate(fetch_u8(1))), 2),
        0xE8 => (Instruction::AddSp(fetch_u8(1) as i8), 2),
        0xE9 => (Instruction::JpHl, 1),
        0xEA => {
            (Instruction::Ld(Operand8::Absolute(fetch_u16(1)), Operand8::Register(Reg8::A)), 3)
        }
        0xEE => (Instruction::Xor(Operand8::Immediate(fetch_u8(1))), 2),
        0xF0 => {
            (Instruction::Ld(Operand8::Register(Reg8::A), Operand8::HighImmediate(fetch_u8(1))), 2)
        }
        0xF2 => (Instruction::Ld(Operand8::Register(Reg8::A), Operand8::HighCIndirect), 1),
        0xF3 => (Instruction::Di, 1),
        0xF6 => (Instruction::Or(Operand8::Immediate(fetch_u8(1))), 2),
        0xF8 => (Instruction::LdHlSpOffset(fetch_u8(1) as i8), 2),
        0xF9 => (Instruction::LdSpHl, 1),
        0xFA => {
            (Instruction::Ld(Operand8::Register(Reg8::A), Operand8::Absolute(fetch_u16(1))), 3)
        }
        0xFB => (Instruction::Ei, 1),
        0xFE => (Instruction::Cp(Operand8::Immediate(fetch_u8(1))), 2),
        _ => return Err(ParseError::InvalidOpcode { opcode }),
    };

    Ok((instruction, pc.wrapping_add(length)))
}

fn parse_cb_prefixed_opcode(opcode: u8) -> Instruction {
    let place = reg_or_hl_place(opcode);
    let bit = (opcode & 0x38) >> 3;

    match opcode {
        0x00..=0x07 => Instruction::Rlc(place),
        0x08..=0x0F => Instruction::Rrc(place),
        0x10..=0x17 => Instruction::Rl(place),
        0x18..=0x1F => Instruction::Rr(place),
        0x20..=0x27 => Instruction::Sla(place),
        0x28..=0x2F => Instruction::Sra(place),
        0x30..=0x37 => Instruction::Swap(place),
        0x38..=0x3F => Instruction::Srl(place),
        0x40..=0x7F => Instruction::Bit(bit, place),
        0x80..=0xBF => Instruction::Res(bit, place),
        0xC0..=0xFF => Instruction::Set(bit, place),
    }
}
