use super::helpers::*;

// ---- Upvalue capture ----

#[test]
fn test_closure_mutates_upvalue() {
    check_ints(
        "local x = 1
         local function f() x = x + 1 return x end
         return f(), f()",
        &[2, 3],
    );
}

#[test]
fn test_sibling_closures_share_upvalue() {
    check_ints(
        "local n = 0
         local function bump() n = n + 1 end
         local function read() return n end
         bump()
         bump()
         return read()",
        &[2],
    );
}

#[test]
fn test_counter_factory_instances_are_independent() {
    check_ints(
        "local function counter()
            local n = 0
            return function() n = n + 1 return n end
         end
         local a = counter()
         local b = counter()
         a() a() a()
         b()
         return a(), b()",
        &[4, 2],
    );
}

#[test]
fn test_grandparent_capture() {
    check_ints(
        "local x = 100
         local function outer()
            local function inner() return x end
            return inner
         end
         return outer()()",
        &[100],
    );
}

#[test]
fn test_capture_through_two_levels_with_write() {
    check_ints(
        "local total = 0
         local function outer(n)
            local function inner() total = total + n end
            inner()
         end
         outer(3)
         outer(4)
         return total",
        &[7],
    );
}

// ---- Close points ----

#[test]
fn test_do_block_local_survives_in_closure() {
    check_ints(
        "local f
         do
            local v = 31
            f = function() return v end
         end
         return f()",
        &[31],
    );
}

#[test]
fn test_for_loop_captures_fresh_variable_each_iteration() {
    check_ints(
        "local fs = {}
         for i = 1, 3 do
            fs[i] = function() return i end
         end
         return fs[1](), fs[2](), fs[3]()",
        &[1, 2, 3],
    );
}

#[test]
fn test_while_loop_captures_fresh_variable_each_iteration() {
    check_ints(
        "local fs = {}
         local i = 1
         while i <= 3 do
            local j = i * 10
            fs[i] = function() return j end
            i = i + 1
         end
         return fs[1](), fs[2](), fs[3]()",
        &[10, 20, 30],
    );
}

#[test]
fn test_generic_for_captures_fresh_variable() {
    check_ints(
        "local fs = {}
         for i, v in ipairs({5, 6, 7}) do
            fs[i] = function() return v end
         end
         return fs[1](), fs[2](), fs[3]()",
        &[5, 6, 7],
    );
}

#[test]
fn test_closed_upvalue_keeps_final_value() {
    check_ints(
        "local function make()
            local acc = 10
            local function add(n) acc = acc + n end
            local function get() return acc end
            add(5)
            return get
         end
         local g = make()
         return g()",
        &[15],
    );
}

// ---- Shadowing ----

#[test]
fn test_shadowed_local_does_not_disturb_capture() {
    check_ints(
        "local x = 1
         local f = function() return x end
         local x = 2
         return f(), x",
        &[1, 2],
    );
}
