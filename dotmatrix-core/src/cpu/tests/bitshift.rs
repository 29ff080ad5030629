use super::{hash_map, run_test, ExpectedState};

#[test]
fn rl_register_through_carry() {
    // LD C, 0x55; SCF; RL C
    run_test(
        "0E5537CB11",
        &ExpectedState { c: Some(0xAB), f: Some(0x00), ..ExpectedState::empty() },
    );
}

#[test]
fn accumulator_rotates_always_clear_z() {
    // LD A, 0x80; RLCA
    run_test("3E8007", &ExpectedState { a: Some(0x01), f: Some(0x10), ..ExpectedState::empty() });

    // LD A, 0x00; RLCA: result is zero but Z stays clear
    run_test("3E0007", &ExpectedState { a: Some(0x00), f: Some(0x00), ..ExpectedState::empty() });

    // LD A, 0x01; SCF; RRA
    run_test(
        "3E01371F",
        &ExpectedState { a: Some(0x80), f: Some(0x10), ..ExpectedState::empty() },
    );
}

#[test]
fn cb_rotates_set_z_on_zero() {
    // LD B, 0x00; RLC B
    run_test(
        "0600CB00",
        &ExpectedState { b: Some(0x00), f: Some(0x80), ..ExpectedState::empty() },
    );
}

#[test]
fn rr_register() {
    // LD C, 0x02; OR A (clears carry); RR C
    run_test(
        "0E02B7CB19",
        &ExpectedState { c: Some(0x01), f: Some(0x00), ..ExpectedState::empty() },
    );
}

#[test]
fn swap_nibbles() {
    // LD A, 0x12; SWAP A
    run_test("3E12CB37", &ExpectedState { a: Some(0x21), f: Some(0x00), ..ExpectedState::empty() });

    // XOR A; SWAP A
    run_test("AFCB37", &ExpectedState { a: Some(0x00), f: Some(0x80), ..ExpectedState::empty() });
}

#[test]
fn shifts() {
    // LD A, 0xC0; SLA A
    run_test("3EC0CB27", &ExpectedState { a: Some(0x80), f: Some(0x10), ..ExpectedState::empty() });

    // LD A, 0x81; SRA A keeps the sign bit
    run_test("3E81CB2F", &ExpectedState { a: Some(0xC0), f: Some(0x10), ..ExpectedState::empty() });

    // LD A, 0x01; SRL A
    run_test("3E01CB3F", &ExpectedState { a: Some(0x00), f: Some(0x90), ..ExpectedState::empty() });
}

#[test]
fn bit_test_preserves_carry() {
    // LD B, 0x1F; BIT 0, B (post-boot C flag survives)
    run_test("061FCB40", &ExpectedState { f: Some(0x30), ..ExpectedState::empty() });

    // LD B, 0x00; BIT 7, B
    run_test("0600CB78", &ExpectedState { f: Some(0xB0), ..ExpectedState::empty() });
}

#[test]
fn set_and_reset_leave_flags() {
    // LD A, 0xFF; RES 0, A
    run_test("3EFFCB87", &ExpectedState { a: Some(0xFE), f: Some(0xB0), ..ExpectedState::empty() });

    // XOR A; SET 0, A
    run_test("AFCBC7", &ExpectedState { a: Some(0x01), f: Some(0x80), ..ExpectedState::empty() });
}

#[test]
fn rl_indirect_hl() {
    // LD HL, 0xC0A0; LD (HL), 0x80; RL (HL) (post-boot carry rotates in)
    run_test(
        "21A0C03680CB16",
        &ExpectedState { f: Some(0x10), memory: hash_map!(0xC0A0: 0x01), ..ExpectedState::empty() },
    );
}
