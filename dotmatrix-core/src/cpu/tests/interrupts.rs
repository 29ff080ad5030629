use crate::cpu::{self, CpuRegisters, InterruptType};
use crate::memory::tests::test_address_space;
use crate::ppu::PpuState;

#[test]
fn handler_addresses_and_bits() {
    let vectors: [(InterruptType, u8, u16); 5] = [
        (InterruptType::VBlank, 0x01, 0x0040),
        (InterruptType::LcdStatus, 0x02, 0x0048),
        (InterruptType::Timer, 0x04, 0x0050),
        (InterruptType::Serial, 0x08, 0x0058),
        (InterruptType::Joypad, 0x10, 0x0060),
    ];

    for (interrupt_type, bit, address) in vectors {
        assert_eq!(bit, interrupt_type.bit());
        assert_eq!(address, interrupt_type.handler_address());
    }
}

#[test]
fn dispatch_requires_ime_and_matching_enable_bit() {
    let mut address_space = test_address_space();
    let ppu_state = PpuState::new();
    let mut registers = CpuRegisters::new_post_boot();

    address_space.get_io_registers_mut().interrupt_flags().set(InterruptType::Timer);

    // IME clear: no dispatch
    registers.ime = false;
    address_space.write_address_u8(0xFFFF, 0x04, &ppu_state);
    assert!(!cpu::interrupt_triggered(&registers, &address_space));
    assert!(cpu::interrupt_triggered_no_ime_check(&address_space));

    // IME set but interrupt not enabled: no dispatch
    registers.ime = true;
    address_space.write_address_u8(0xFFFF, 0x1B, &ppu_state);
    assert!(!cpu::interrupt_triggered(&registers, &address_space));

    // IME set and enabled: dispatch
    address_space.write_address_u8(0xFFFF, 0x04, &ppu_state);
    assert!(cpu::interrupt_triggered(&registers, &address_space));
}

#[test]
fn isr_dispatches_highest_priority_and_clears_its_bit() {
    let mut address_space = test_address_space();
    let ppu_state = PpuState::new();
    let mut registers = CpuRegisters::new_post_boot();

    registers.ime = true;
    registers.pc = 0x1234;
    registers.sp = 0xD000;
    address_space.write_address_u8(0xFFFF, 0x1F, &ppu_state);
    address_space.get_io_registers_mut().interrupt_flags().set(InterruptType::Timer);
    address_space.get_io_registers_mut().interrupt_flags().set(InterruptType::Serial);

    cpu::execute_interrupt_service_routine(&mut registers, &mut address_space, &ppu_state);

    assert_eq!(0x0050, registers.pc);
    assert!(!registers.ime);
    assert_eq!(0xCFFE, registers.sp);
    assert_eq!(0x1234, address_space.read_address_u16(registers.sp, &ppu_state));

    // The timer bit is consumed, the serial bit stays pending
    let io_registers = address_space.get_io_registers_mut();
    assert!(!io_registers.interrupt_flags().get(InterruptType::Timer));
    assert!(io_registers.interrupt_flags().get(InterruptType::Serial));
}

#[test]
fn isr_clears_halt() {
    let mut address_space = test_address_space();
    let ppu_state = PpuState::new();
    let mut registers = CpuRegisters::new_post_boot();

    registers.ime = true;
    registers.halted = true;
    registers.sp = 0xD000;
    address_space.write_address_u8(0xFFFF, 0x01, &ppu_state);
    address_space.get_io_registers_mut().interrupt_flags().set(InterruptType::VBlank);

    cpu::execute_interrupt_service_routine(&mut registers, &mut address_space, &ppu_state);

    assert!(!registers.halted);
    assert_eq!(0x0040, registers.pc);
}
