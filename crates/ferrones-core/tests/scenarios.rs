//! System-level scenarios: boot, memory map, and timing behavior observed
//! through the console control surface.

use ferrones_core::Console;
use ferrones_cpu::{Bus, Status};
use ferrones_mappers::Mapper;
use proptest::prelude::*;

/// Build a 16 KiB NROM image with `program` at `origin` and the reset
/// vector pointing there.
fn cartridge_16k(program: &[u8], origin: u16) -> Vec<u8> {
    let mut prg = vec![0u8; 16384];
    let offset = (origin as usize) & 0x3FFF;
    prg[offset..offset + program.len()].copy_from_slice(program);
    prg[0x3FFC] = (origin & 0xFF) as u8;
    prg[0x3FFD] = (origin >> 8) as u8;

    let mut data = vec![b'N', b'E', b'S', 0x1A, 1, 0, 0, 0];
    data.extend_from_slice(&[0; 8]);
    data.extend_from_slice(&prg);
    data
}

fn boot(program: &[u8], origin: u16) -> Console {
    let mut console = Console::new();
    console
        .insert_cartridge_bytes(&cartridge_16k(program, origin))
        .unwrap();
    console.power_on();
    console
}

#[test]
fn nestest_style_boot() {
    let console = boot(&[], 0xC000);
    let cpu = console.cpu();
    assert_eq!(cpu.pc, 0xC000);
    assert_eq!(cpu.a, 0);
    assert_eq!(cpu.x, 0);
    assert_eq!(cpu.y, 0);
    assert_eq!(cpu.s, 0xFD);
    assert_eq!(cpu.p.bits(), 0x24);
    assert_eq!(cpu.cycles(), 6);
}

#[test]
fn store_and_reload_through_internal_ram() {
    // LDA #$42; STA $10; LDA #$00; LDA $10
    let mut console = boot(
        &[0xA9, 0x42, 0x85, 0x10, 0xA9, 0x00, 0xA5, 0x10],
        0xC000,
    );
    console.run();
    let start = console.cpu().cycles();
    for _ in 0..4 {
        console.step_instruction();
    }
    assert_eq!(console.cpu().a, 0x42);
    assert!(!console.cpu().p.contains(Status::Z));
    assert!(!console.cpu().p.contains(Status::N));
    assert_eq!(console.bus().peek(0x0010), 0x42);
    assert_eq!(console.cpu().cycles() - start, 10);
}

#[test]
fn adc_overflow_at_the_sign_boundary() {
    // LDA #$7F; ADC #$01
    let mut console = boot(&[0xA9, 0x7F, 0x69, 0x01], 0xC000);
    console.run();
    console.step_instruction();
    console.step_instruction();
    let cpu = console.cpu();
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.p.contains(Status::V));
    assert!(cpu.p.contains(Status::N));
    assert!(!cpu.p.contains(Status::Z));
    assert!(!cpu.p.contains(Status::C));
}

#[test]
fn sbc_with_borrow_out() {
    // LDA #$50; SEC; SBC #$F0 -> $60 with the borrow reflected in C
    let mut console = boot(&[0xA9, 0x50, 0x38, 0xE9, 0xF0], 0xC000);
    console.run();
    for _ in 0..3 {
        console.step_instruction();
    }
    let cpu = console.cpu();
    assert_eq!(cpu.a, 0x60);
    assert!(!cpu.p.contains(Status::C));
    assert!(!cpu.p.contains(Status::V));
    assert!(!cpu.p.contains(Status::N));
    assert!(!cpu.p.contains(Status::Z));
}

#[test]
fn branch_page_cross_costs_four_cycles() {
    // Stage `BNE $80` at $0080 in RAM, then jump to it. The last LDA left
    // Z clear, so the branch is taken; the low-byte carry charges the
    // fourth cycle and execution lands at $0002.
    let program = [
        0xA9, 0xD0, // LDA #$D0
        0x85, 0x80, // STA $80
        0xA9, 0x80, // LDA #$80
        0x85, 0x81, // STA $81
        0x4C, 0x80, 0x00, // JMP $0080
    ];
    let mut console = boot(&program, 0xC000);
    console.run();
    for _ in 0..5 {
        console.step_instruction();
    }
    assert_eq!(console.cpu().pc, 0x0080);

    let start = console.cpu().cycles();
    console.step_instruction();
    assert_eq!(console.cpu().cycles() - start, 4);
    assert_eq!(console.cpu().pc, 0x0002);
}

#[test]
fn jmp_indirect_page_wrap() {
    // Pointer at $02FF: high byte comes from $0200, not $0300.
    let program = [
        0xA9, 0x34, // LDA #$34
        0x8D, 0xFF, 0x02, // STA $02FF
        0xA9, 0x12, // LDA #$12
        0x8D, 0x00, 0x02, // STA $0200
        0xA9, 0x99, // LDA #$99
        0x8D, 0x00, 0x03, // STA $0300 (the wrong page, must not be used)
        0x6C, 0xFF, 0x02, // JMP ($02FF)
    ];
    let mut console = boot(&program, 0xC000);
    console.run();
    for _ in 0..6 {
        console.step_instruction();
    }

    let start = console.cpu().cycles();
    console.step_instruction();
    assert_eq!(console.cpu().cycles() - start, 5);
    assert_eq!(console.cpu().pc, 0x1234);
}

#[test]
fn reset_vector_reads_through_the_mapper_mirror() {
    // On a 16 KiB image the vector at $FFFC is served from PRG offset
    // $3FFC through the NROM mirror.
    let console = boot(&[], 0xABCD & 0xFFFE);
    assert_eq!(console.cpu().pc, 0xABCD & 0xFFFE);
}

#[test]
fn loading_the_same_image_twice_gives_identical_backing() {
    let mut image = cartridge_16k(&[0xEA, 0xEA, 0xEA], 0xC000);
    // Give the PRG some texture.
    for (i, byte) in image[16..].iter_mut().enumerate() {
        *byte ^= (i & 0xFF) as u8;
    }

    let mut first = Console::new();
    first.insert_cartridge_bytes(&image).unwrap();
    let mut second = Console::new();
    second.insert_cartridge_bytes(&image).unwrap();

    let a = first.bus().mapper().unwrap();
    let b = second.bus().mapper().unwrap();
    for addr in 0x8000..=0xFFFFu16 {
        assert_eq!(a.read_prg(addr), b.read_prg(addr), "addr {addr:04X}");
    }
}

#[test]
fn halt_survives_cycle_polling() {
    // An unimplemented opcode — $00 included — halts the machine; the
    // host keeps polling and observes halt with no progress.
    let mut console = boot(&[0xEA, 0x00], 0xC000);
    console.run();
    console.step_instruction(); // NOP

    let mut polls = 0;
    while !console.step_cycle() {
        polls += 1;
        assert!(polls < 10, "machine failed to halt");
    }
    let pc = console.cpu().pc;
    let cycles = console.cpu().cycles();
    for _ in 0..5 {
        assert!(console.step_cycle());
    }
    assert_eq!(console.cpu().pc, pc);
    assert_eq!(console.cpu().cycles(), cycles);
    assert_eq!(console.fault().unwrap().opcode, 0x00);
}

proptest! {
    #[test]
    fn ram_mirroring_holds_everywhere(addr in 0x0000u16..0x2000, value: u8) {
        let mut console = Console::new();
        console.bus_mut().write(addr, value);
        prop_assert_eq!(console.bus_mut().read(addr & 0x07FF), value);
        prop_assert_eq!(console.bus_mut().read(addr | 0x0800), value);
        prop_assert_eq!(console.bus().peek(addr), value);
    }

    #[test]
    fn shims_are_inert(addr in 0x2000u16..0x4020, value: u8) {
        let mut console = Console::new();
        console.bus_mut().write(addr, value);
        prop_assert_eq!(console.bus_mut().read(addr), 0);
    }
}
