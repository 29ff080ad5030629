use super::{hash_map, opcode_bits, run_test, set_in_state, ExpectedState, ALL_REGISTERS};
use crate::cpu::registers::Reg8;

#[test]
fn add_immediate() {
    // LD A, 0x3A; ADD 0xFF
    run_test(
        "3E3AC6FF",
        &ExpectedState { a: Some(0x39), f: Some(0x30), ..ExpectedState::empty() },
    );

    // LD A, 0x01; ADD 0x03
    run_test(
        "3E01C603",
        &ExpectedState { a: Some(0x04), f: Some(0x00), ..ExpectedState::empty() },
    );

    // LD A, 0x55; ADD 0xAB
    run_test(
        "3E55C6AB",
        &ExpectedState { a: Some(0x00), f: Some(0xB0), ..ExpectedState::empty() },
    );
}

#[test]
fn add_register() {
    for register in ALL_REGISTERS {
        let load_opcode = 0x06 | (opcode_bits(register) << 3);
        let add_opcode = 0x80 | opcode_bits(register);
        let program = format!("{load_opcode:02X}2F{add_opcode:02X}");

        // A starts at 0x01 post-boot; adding A to itself doubles the loaded
        // value instead
        let (expected_a, expected_f) = match register {
            Reg8::A => (0x5E, 0x20),
            _ => (0x30, 0x20),
        };

        let mut expected_state =
            ExpectedState { a: Some(expected_a), f: Some(expected_f), ..ExpectedState::empty() };
        if register != Reg8::A {
            set_in_state(&mut expected_state, register, 0x2F);
        }

        run_test(&program, &expected_state);
    }
}

#[test]
fn add_indirect_hl() {
    // LD HL, 0xC0A0; LD (HL), 0x3B; LD A, 0xA1; ADD (HL)
    run_test(
        "21A0C0363B3EA186",
        &ExpectedState { a: Some(0xDC), f: Some(0x00), ..ExpectedState::empty() },
    );
}

#[test]
fn adc_uses_carry_flag() {
    // LD A, 0xFF; SCF; ADC 0x00
    run_test(
        "3EFF37CE00",
        &ExpectedState { a: Some(0x00), f: Some(0xB0), ..ExpectedState::empty() },
    );

    // LD A, 0x0F; SCF; ADC 0x10
    run_test(
        "3E0F37CE10",
        &ExpectedState { a: Some(0x20), f: Some(0x20), ..ExpectedState::empty() },
    );
}

#[test]
fn sub_immediate() {
    // LD A, 0x3A; SUB 0x3A
    run_test(
        "3E3AD63A",
        &ExpectedState { a: Some(0x00), f: Some(0xC0), ..ExpectedState::empty() },
    );

    // LD A, 0x10; SUB 0x20
    run_test(
        "3E10D620",
        &ExpectedState { a: Some(0xF0), f: Some(0x50), ..ExpectedState::empty() },
    );
}

#[test]
fn sbc_uses_carry_flag() {
    // LD A, 0x10; SCF; SBC 0x0F
    run_test(
        "3E1037DE0F",
        &ExpectedState { a: Some(0x00), f: Some(0xE0), ..ExpectedState::empty() },
    );
}

#[test]
fn compare_leaves_accumulator() {
    // LD A, 0x42; CP 0x43
    run_test(
        "3E42FE43",
        &ExpectedState { a: Some(0x42), f: Some(0x70), ..ExpectedState::empty() },
    );
}

#[test]
fn increment_preserves_carry() {
    // SCF; INC A
    run_test("373C", &ExpectedState { a: Some(0x02), f: Some(0x10), ..ExpectedState::empty() });
}

#[test]
fn increment_indirect_hl() {
    // LD HL, 0xC0A0; LD (HL), 0x34; INC (HL)
    run_test(
        "21A0C0363434",
        &ExpectedState { memory: hash_map!(0xC0A0: 0x35), ..ExpectedState::empty() },
    );
}

#[test]
fn decrement_to_zero() {
    // LD A, 0x01; DEC A (C flag survives from the post-boot F value)
    run_test("3E013D", &ExpectedState { a: Some(0x00), f: Some(0xD0), ..ExpectedState::empty() });
}

#[test]
fn daa_after_addition() {
    // LD A, 0x45; ADD 0x38; DAA -> BCD 83
    run_test(
        "3E45C63827",
        &ExpectedState { a: Some(0x83), f: Some(0x00), ..ExpectedState::empty() },
    );

    // LD A, 0x99; ADD 0x99; DAA -> BCD 98 carry 1
    run_test(
        "3E99C69927",
        &ExpectedState { a: Some(0x98), f: Some(0x10), ..ExpectedState::empty() },
    );
}

#[test]
fn daa_after_subtraction() {
    // LD A, 0x42; SUB 0x13; DAA -> BCD 29
    run_test(
        "3E42D61327",
        &ExpectedState { a: Some(0x29), f: Some(0x40), ..ExpectedState::empty() },
    );
}

#[test]
fn add_hl_sets_half_carry_from_bit_11() {
    // LD HL, 0x0FFF; LD BC, 0x0001; ADD HL, BC (Z survives from post-boot F)
    run_test(
        "21FF0F01010009",
        &ExpectedState { h: Some(0x10), l: Some(0x00), f: Some(0xA0), ..ExpectedState::empty() },
    );

    // LD HL, 0xFFFF; LD BC, 0x0001; ADD HL, BC
    run_test(
        "21FFFF01010009",
        &ExpectedState { h: Some(0x00), l: Some(0x00), f: Some(0xB0), ..ExpectedState::empty() },
    );
}

#[test]
fn add_sp_flags_come_from_low_byte() {
    // LD SP, 0x000F; ADD SP, +1
    run_test(
        "310F00E801",
        &ExpectedState { sp: Some(0x0010), f: Some(0x20), ..ExpectedState::empty() },
    );

    // LD SP, 0xD000; ADD SP, -2
    run_test(
        "3100D0E8FE",
        &ExpectedState { sp: Some(0xCFFE), f: Some(0x00), ..ExpectedState::empty() },
    );
}

#[test]
fn ld_hl_sp_offset() {
    // LD SP, 0xCFFF; LD HL, SP+1
    run_test(
        "31FFCFF801",
        &ExpectedState {
            h: Some(0xD0),
            l: Some(0x00),
            sp: Some(0xCFFF),
            f: Some(0x30),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn bitwise_operations() {
    // LD A, 0x5A; AND 0x0F
    run_test(
        "3E5AE60F",
        &ExpectedState { a: Some(0x0A), f: Some(0x20), ..ExpectedState::empty() },
    );

    // LD A, 0x50; OR 0x05
    run_test(
        "3E50F605",
        &ExpectedState { a: Some(0x55), f: Some(0x00), ..ExpectedState::empty() },
    );

    // LD A, 0xFF; XOR A
    run_test("3EFFAF", &ExpectedState { a: Some(0x00), f: Some(0x80), ..ExpectedState::empty() });
}

#[test]
fn inc16_dec16_leave_flags() {
    // LD BC, 0xFFFF; INC BC
    run_test(
        "01FFFF03",
        &ExpectedState { b: Some(0x00), c: Some(0x00), f: Some(0xB0), ..ExpectedState::empty() },
    );

    // LD DE, 0x0000; DEC DE
    run_test(
        "1100001B",
        &ExpectedState { d: Some(0xFF), e: Some(0xFF), f: Some(0xB0), ..ExpectedState::empty() },
    );
}

#[test]
fn complement_and_carry_flags() {
    // LD A, 0x35; CPL
    run_test("3E352F", &ExpectedState { a: Some(0xCA), f: Some(0xF0), ..ExpectedState::empty() });

    // SCF; CCF clears the carry again (Z survives)
    run_test("373F", &ExpectedState { f: Some(0x80), ..ExpectedState::empty() });
}
