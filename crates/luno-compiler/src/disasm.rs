//! Bytecode disassembler (luac -l style output).

use std::fmt::Write;

use luno_core::opcode::{index_k, is_k, Instruction, InstructionFormat, OpArg, OpCode};
use luno_core::proto::{Constant, Prototype};
use luno_core::value::float_to_lua_string;

/// Disassemble a prototype and everything nested inside it.
pub fn disassemble(proto: &Prototype) -> String {
    let mut out = String::new();
    disassemble_proto(&mut out, proto);
    out
}

fn disassemble_proto(out: &mut String, proto: &Prototype) {
    let func_type = if proto.line_defined > 0 {
        "function"
    } else {
        "main"
    };
    let vararg = if proto.is_vararg { "+" } else { "" };
    writeln!(
        out,
        "\n{} <{}:{},{}> ({} instructions)",
        func_type,
        String::from_utf8_lossy(proto.source.as_bytes()),
        proto.line_defined,
        proto.last_line_defined,
        proto.code.len(),
    )
    .unwrap();
    writeln!(
        out,
        "{}{} params, {} slots, {} upvalues, {} locals, {} constants, {} functions",
        proto.num_params,
        vararg,
        proto.max_stack_size,
        proto.upvalues.len(),
        proto.loc_vars.len(),
        proto.constants.len(),
        proto.protos.len(),
    )
    .unwrap();

    for (pc, inst) in proto.code.iter().enumerate() {
        let line = match proto.line_info.get(pc) {
            Some(l) => l.to_string(),
            None => "-".to_string(),
        };
        write!(out, "\t{}\t[{}]\t{:<9} \t", pc + 1, line, inst.opcode().name()).unwrap();
        write_operands(out, *inst, pc, proto);
        writeln!(out).unwrap();
    }

    writeln!(out, "constants ({}):", proto.constants.len()).unwrap();
    for (i, k) in proto.constants.iter().enumerate() {
        writeln!(out, "\t{}\t{}", i + 1, constant_to_string(k)).unwrap();
    }

    writeln!(out, "locals ({}):", proto.loc_vars.len()).unwrap();
    for (i, var) in proto.loc_vars.iter().enumerate() {
        writeln!(
            out,
            "\t{}\t{}\t{}\t{}",
            i,
            String::from_utf8_lossy(var.name.as_bytes()),
            var.start_pc + 1,
            var.end_pc + 1,
        )
        .unwrap();
    }

    writeln!(out, "upvalues ({}):", proto.upvalues.len()).unwrap();
    for (i, up) in proto.upvalues.iter().enumerate() {
        let name = match proto.upvalue_names.get(i) {
            Some(n) => String::from_utf8_lossy(n.as_bytes()).into_owned(),
            None => "-".to_string(),
        };
        writeln!(
            out,
            "\t{}\t{}\t{}\t{}",
            i,
            name,
            if up.in_stack { 1 } else { 0 },
            up.index,
        )
        .unwrap();
    }

    for p in &proto.protos {
        disassemble_proto(out, p);
    }
}

/// Operand listing for one instruction. RK operands and constant
/// indices print as negative numbers, the way `luac` does.
fn write_operands(out: &mut String, inst: Instruction, pc: usize, proto: &Prototype) {
    let op = inst.opcode();
    match op.format() {
        InstructionFormat::IABC => {
            write!(out, "{}", inst.a()).unwrap();
            let (b_use, c_use) = op.operand_use();
            if b_use != OpArg::Unused {
                write!(out, " {}", rk_operand(inst.b())).unwrap();
            }
            if c_use != OpArg::Unused {
                write!(out, " {}", rk_operand(inst.c())).unwrap();
            }
        }
        InstructionFormat::IABx => {
            match op {
                OpCode::LoadK | OpCode::LoadKX => {
                    write!(out, "{} {}", inst.a(), -1 - inst.bx() as i64).unwrap();
                    if let Some(k) = proto.constants.get(inst.bx() as usize) {
                        write!(out, "\t; {}", constant_to_string(k)).unwrap();
                    }
                }
                _ => {
                    write!(out, "{} {}", inst.a(), inst.bx()).unwrap();
                    if op == OpCode::Closure {
                        write!(out, "\t; function [{}]", inst.bx()).unwrap();
                    }
                }
            };
        }
        InstructionFormat::IAsBx => {
            write!(out, "{} {}", inst.a(), inst.sbx()).unwrap();
            // Absolute jump target, 1-based like the pc column
            let target = pc as i64 + 2 + inst.sbx() as i64;
            write!(out, "\t; to {target}").unwrap();
        }
        InstructionFormat::IAx => {
            write!(out, "{}", -1 - inst.ax_field() as i64).unwrap();
        }
    }
}

fn rk_operand(v: u32) -> i64 {
    if is_k(v) {
        -1 - index_k(v) as i64
    } else {
        v as i64
    }
}

fn constant_to_string(k: &Constant) -> String {
    match k {
        Constant::Nil => "nil".to_string(),
        Constant::Boolean(b) => b.to_string(),
        Constant::Integer(i) => i.to_string(),
        Constant::Float(f) => float_to_lua_string(*f),
        Constant::Str(s) => format!("\"{}\"", String::from_utf8_lossy(s.as_bytes())),
    }
}
