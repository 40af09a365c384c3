//! Throughput benchmark for `execute_instruction` over a small mix of hot
//! opcodes (an ALU register form, a conditional jump, and an unaligned SSE
//! move), the same kind of per-opcode-family sampling the teacher's own
//! `aero-cpu` benches use rather than a single micro-op in isolation.

use aero_cpu_core::dispatch::execute_instruction;
use aero_cpu_core::mem::FlatTestBus;
use aero_cpu_core::state::{CpuMode, CpuState};
use aero_cpu_core::system::System;
use aero_x86::{DecodedInsn, OpcodeMap, Rde, REP_NONE};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn add_eax_ecx() -> DecodedInsn {
    // ADD EAX, ECX (0x01 /r, mod=11).
    DecodedInsn {
        map: OpcodeMap::Legacy,
        opcode: 0x01,
        rde: Rde::zero().with_modrm(0b11, 1, 0),
        disp: 0,
        uimm0: 0,
        rep: REP_NONE,
        length: 2,
    }
}

fn jmp_short_not_taken() -> DecodedInsn {
    // JNZ rel8, with ZF set so the branch never taken — the cheap path.
    DecodedInsn {
        map: OpcodeMap::Legacy,
        opcode: 0x75,
        rde: Rde::zero(),
        disp: 4,
        uimm0: 0,
        rep: REP_NONE,
        length: 2,
    }
}

fn movdqu_load() -> DecodedInsn {
    // MOVDQU xmm0, [mem] (F3 0F 6F /r, mod!=11).
    DecodedInsn {
        map: OpcodeMap::Ext0f,
        opcode: 0x6F,
        rde: Rde::zero().with_modrm(0b00, 0, 0),
        disp: 0x100,
        uimm0: 0,
        rep: aero_x86::REP_REP,
        length: 4,
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_throughput");

    group.bench_function("add_reg_reg", |b| {
        let mut state = CpuState::new(CpuMode::Long64);
        let mut system = System::new();
        let mut bus = FlatTestBus::new(0x1000);
        let insn = add_eax_ecx();
        b.iter(|| {
            execute_instruction(&mut state, &mut system, &mut bus, black_box(&insn)).unwrap();
        });
    });

    group.bench_function("jcc_not_taken", |b| {
        let mut state = CpuState::new(CpuMode::Long64);
        let mut system = System::new();
        let mut bus = FlatTestBus::new(0x1000);
        let insn = jmp_short_not_taken();
        state.flags.insert(aero_cpu_core::state::Flags::ZF);
        b.iter(|| {
            execute_instruction(&mut state, &mut system, &mut bus, black_box(&insn)).unwrap();
        });
    });

    group.bench_function("movdqu_load", |b| {
        let mut state = CpuState::new(CpuMode::Long64);
        let mut system = System::new();
        let mut bus = FlatTestBus::new(0x1000);
        let insn = movdqu_load();
        b.iter(|| {
            execute_instruction(&mut state, &mut system, &mut bus, black_box(&insn)).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
