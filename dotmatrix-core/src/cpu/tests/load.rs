use super::{hash_map, opcode_bits, run_test, set_in_state, ExpectedState, ALL_REGISTERS};
use crate::cpu::registers::Reg8;

#[test]
fn ld_register_immediate() {
    for register in ALL_REGISTERS {
        let load_opcode = 0x06 | (opcode_bits(register) << 3);
        let program = format!("{load_opcode:02X}C4");

        let mut expected_state = ExpectedState::empty();
        set_in_state(&mut expected_state, register, 0xC4);

        run_test(&program, &expected_state);
    }
}

#[test]
fn ld_register_register() {
    // LD B, 0x42; LD E, B
    run_test(
        "064258",
        &ExpectedState { b: Some(0x42), e: Some(0x42), ..ExpectedState::empty() },
    );

    // LD L, 0x99; LD A, L
    run_test(
        "2E997D",
        &ExpectedState { a: Some(0x99), l: Some(0x99), ..ExpectedState::empty() },
    );
}

#[test]
fn ld_indirect_hl_with_post_increment() {
    // LD HL, 0xC0A0; LD A, 0x11; LD (HL+), A
    run_test(
        "21A0C03E1122",
        &ExpectedState {
            h: Some(0xC0),
            l: Some(0xA1),
            memory: hash_map!(0xC0A0: 0x11),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn ld_indirect_hl_with_post_decrement() {
    // LD HL, 0xC0A0; LD A, (HL-)
    run_test(
        "21A0C03A",
        &ExpectedState { a: Some(0x00), h: Some(0xC0), l: Some(0x9F), ..ExpectedState::empty() },
    );
}

#[test]
fn ld_through_bc_and_de() {
    // LD BC, 0xC123; LD A, 0x77; LD (BC), A; LD DE, 0xC123; LD A, (DE)
    run_test(
        "0123C13E77021123C11A",
        &ExpectedState { a: Some(0x77), memory: hash_map!(0xC123: 0x77), ..ExpectedState::empty() },
    );
}

#[test]
fn ldh_immediate() {
    // LD A, 0x77; LDH ($80), A; LD A, 0x00; LDH A, ($80)
    run_test(
        "3E77E0803E00F080",
        &ExpectedState { a: Some(0x77), memory: hash_map!(0xFF80: 0x77), ..ExpectedState::empty() },
    );
}

#[test]
fn ldh_c_indirect() {
    // LD C, 0x81; LD A, 0x66; LD ($FF00+C), A
    run_test(
        "0E813E66E2",
        &ExpectedState { memory: hash_map!(0xFF81: 0x66), ..ExpectedState::empty() },
    );
}

#[test]
fn ld_absolute() {
    // LD A, 0x99; LD ($C000), A; XOR A; LD A, ($C000)
    run_test(
        "3E99EA00C0AFFA00C0",
        &ExpectedState { a: Some(0x99), memory: hash_map!(0xC000: 0x99), ..ExpectedState::empty() },
    );
}

#[test]
fn ld_absolute_sp() {
    // LD SP, 0xCFFE; LD ($C000), SP
    run_test(
        "31FECF0800C0",
        &ExpectedState {
            sp: Some(0xCFFE),
            memory: hash_map!(0xC000: 0xFE, 0xC001: 0xCF),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn push_pop_round_trips() {
    // LD BC, 0xBEEF; PUSH BC; POP DE
    run_test(
        "01EFBEC5D1",
        &ExpectedState {
            d: Some(0xBE),
            e: Some(0xEF),
            sp: Some(0xFFFE),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn pop_af_masks_flag_low_nibble() {
    // LD BC, 0x12FF; PUSH BC; POP AF
    run_test(
        "01FF12C5F1",
        &ExpectedState { a: Some(0x12), f: Some(0xF0), ..ExpectedState::empty() },
    );

    // ...and pushing AF back round-trips the masked value
    run_test(
        "01FF12C5F1F5C1",
        &ExpectedState { b: Some(0x12), c: Some(0xF0), ..ExpectedState::empty() },
    );
}

#[test]
fn ld_sp_hl() {
    // LD HL, 0xDFFE; LD SP, HL
    run_test(
        "21FEDFF9",
        &ExpectedState { sp: Some(0xDFFE), ..ExpectedState::empty() },
    );
}
