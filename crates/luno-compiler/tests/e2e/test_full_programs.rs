use super::helpers::*;

use luno_compiler::disasm::disassemble;
use luno_core::proto::Prototype;

fn check_line_info(proto: &Prototype) {
    assert_eq!(proto.code.len(), proto.line_info.len());
    for child in &proto.protos {
        check_line_info(child);
    }
}

#[test]
fn fib_program() {
    let proto = main_proto(
        "local function fib(n)
            if n < 2 then return n end
            return fib(n - 1) + fib(n - 2)
         end
         return fib(20)",
    );
    assert_eq!(proto.protos.len(), 1);
    check_line_info(&proto);
}

#[test]
fn insertion_sort_program() {
    let proto = main_proto(
        "local function sort(t)
            for i = 2, #t do
               local v = t[i]
               local j = i - 1
               while j >= 1 and t[j] > v do
                  t[j + 1] = t[j]
                  j = j - 1
               end
               t[j + 1] = v
            end
            return t
         end
         local data = {5, 3, 8, 1, 9, 2}
         sort(data)
         return data",
    );
    check_line_info(&proto);
}

#[test]
fn object_style_program() {
    let proto = main_proto(
        "local Point = {}
         Point.__index = Point

         function Point.new(x, y)
            return setmetatable({ x = x, y = y }, Point)
         end

         function Point:dot(other)
            return self.x * other.x + self.y * other.y
         end

         local a = Point.new(1, 2)
         local b = Point.new(3, 4)
         return a:dot(b)",
    );
    assert_eq!(proto.protos.len(), 2);
    check_line_info(&proto);
}

#[test]
fn iterator_program() {
    let proto = main_proto(
        "local function range(n)
            local i = 0
            return function()
               i = i + 1
               if i <= n then return i end
            end
         end
         local sum = 0
         for v in range(10) do sum = sum + v end
         return sum",
    );
    check_line_info(&proto);
}

#[test]
fn string_heavy_program() {
    let proto = main_proto(
        "local parts = {}
         for i = 1, 10 do
            parts[i] = 'item' .. i
         end
         local s = ''
         for i = 1, #parts do
            s = s .. parts[i] .. ','
         end
         return s",
    );
    check_line_info(&proto);
}

#[test]
fn disassembly_mentions_header_and_opcodes() {
    let proto = main_proto("local x = 'probe' return x");
    let out = disassemble(&proto);
    assert!(out.contains("params"), "got:\n{out}");
    assert!(out.contains("constants"), "got:\n{out}");
    assert!(out.contains("LOADK"), "got:\n{out}");
    assert!(out.contains("RETURN"), "got:\n{out}");
    assert!(out.contains("probe"), "got:\n{out}");
}

#[test]
fn disassembly_recurses_into_children() {
    let proto = main_proto("local function f() return 1 end return f");
    let out = disassemble(&proto);
    assert!(out.contains("CLOSURE"), "got:\n{out}");
    // Child body listed too
    assert!(out.matches("RETURN").count() >= 2, "got:\n{out}");
}

#[test]
fn deeply_nested_blocks_compile() {
    let mut src = String::new();
    for _ in 0..40 {
        src.push_str("do ");
    }
    src.push_str("local x = 1 ");
    for _ in 0..40 {
        src.push_str("end ");
    }
    let proto = main_proto(&src);
    check_line_info(&proto);
}

#[test]
fn constant_pool_is_deduplicated() {
    let proto = main_proto("local a = 'k' local b = 'k' local c = 'k' return a");
    let strings = proto
        .constants
        .iter()
        .filter(|c| matches!(c, luno_core::proto::Constant::Str(_)))
        .count();
    assert_eq!(strings, 1);
}
