use super::helpers::*;

// ---- Calls and returns ----

#[test]
fn test_simple_call() {
    check_ints(
        "local function double(n) return n * 2 end
         return double(21)",
        &[42],
    );
}

#[test]
fn test_multiple_returns() {
    check_ints(
        "local function three() return 1, 2, 3 end
         return three()",
        &[1, 2, 3],
    );
}

#[test]
fn test_parens_truncate_to_one() {
    check_ints(
        "local function three() return 1, 2, 3 end
         return (three())",
        &[1],
    );
}

#[test]
fn test_multi_returns_in_middle_truncate() {
    check_ints(
        "local function three() return 1, 2, 3 end
         local function sum(a, b, c) return a + b + c end
         return sum(three(), 10, 20)",
        &[31],
    );
}

#[test]
fn test_open_call_spreads_as_last_argument() {
    check_ints(
        "local function three() return 1, 2, 3 end
         local function sum(a, b, c) return a + b + c end
         return sum(three())",
        &[6],
    );
}

#[test]
fn test_tail_position_call_forwards_results() {
    check_ints(
        "local function three() return 1, 2, 3 end
         local function pass() return three() end
         return pass()",
        &[1, 2, 3],
    );
}

#[test]
fn test_missing_arguments_are_nil() {
    let results = eval(
        "local function f(a, b) return a, b end
         return f(1)",
    );
    assert_int(&results, 0, 1);
    assert_nil(&results, 1);
}

#[test]
fn test_extra_arguments_dropped() {
    check_ints(
        "local function f(a) return a end
         return f(5, 6, 7)",
        &[5],
    );
}

#[test]
fn test_local_assignment_adjusts_counts() {
    let results = eval(
        "local function two() return 10, 20 end
         local a, b, c = two()
         return a, b, c",
    );
    assert_int(&results, 0, 10);
    assert_int(&results, 1, 20);
    assert_nil(&results, 2);
}

// ---- Varargs ----

#[test]
fn test_vararg_unpack() {
    check_ints(
        "local function f(...)
            local a, b = ...
            return a, b
         end
         return f(7, 8, 9)",
        &[7, 8],
    );
}

#[test]
fn test_vararg_forwarding() {
    check_ints(
        "local function f(...) return ... end
         return f(1, 2, 3)",
        &[1, 2, 3],
    );
}

#[test]
fn test_vararg_count_via_select() {
    check_ints(
        "local function count(...) return select('#', ...) end
         return count(), count(1), count(1, nil, 3)",
        &[0, 1, 3],
    );
}

#[test]
fn test_named_params_before_vararg() {
    check_ints(
        "local function f(first, ...)
            local rest = select('#', ...)
            return first, rest
         end
         return f(10, 20, 30)",
        &[10, 2],
    );
}

#[test]
fn test_vararg_in_table_constructor() {
    check_ints(
        "local function f(...) return {...} end
         local t = f(4, 5, 6)
         return #t, t[1], t[3]",
        &[3, 4, 6],
    );
}

// ---- Declaration sugar ----

#[test]
fn test_method_definition_and_colon_call() {
    check_ints(
        "local obj = { n = 32 }
         function obj:get() return self.n end
         function obj.add(a, b) return a + b end
         return obj:get(), obj.add(2, 8)",
        &[32, 10],
    );
}

#[test]
fn test_nested_field_function_definition() {
    check_ints(
        "local m = { inner = {} }
         function m.inner.f() return 11 end
         return m.inner.f()",
        &[11],
    );
}

#[test]
fn test_local_function_sees_itself() {
    check_ints(
        "local function fact(n)
            if n <= 1 then return 1 end
            return n * fact(n - 1)
         end
         return fact(5)",
        &[120],
    );
}

// ---- Recursion ----

#[test]
fn test_fibonacci() {
    check_ints(
        "local function fib(n)
            if n < 2 then return n end
            return fib(n - 1) + fib(n - 2)
         end
         return fib(10)",
        &[55],
    );
}

#[test]
fn test_mutual_recursion() {
    let results = eval(
        "local is_even, is_odd
         function is_even(n)
            if n == 0 then return true end
            return is_odd(n - 1)
         end
         function is_odd(n)
            if n == 0 then return false end
            return is_even(n - 1)
         end
         return is_even(10), is_odd(10)",
    );
    assert_bool(&results, 0, true);
    assert_bool(&results, 1, false);
}

#[test]
fn test_deep_recursion_overflows() {
    let results = eval(
        "local function loop() return 1 + loop() end
         local ok, err = pcall(loop)
         return ok, err",
    );
    assert_bool(&results, 0, false);
    assert_str(&results, 1, "stack overflow");
}

// ---- First-class functions ----

#[test]
fn test_functions_as_values() {
    check_ints(
        "local ops = {
            add = function(a, b) return a + b end,
            mul = function(a, b) return a * b end,
         }
         local function apply(name, a, b) return ops[name](a, b) end
         return apply('add', 3, 4), apply('mul', 3, 4)",
        &[7, 12],
    );
}

#[test]
fn test_function_returning_function() {
    check_ints(
        "local function adder(n)
            return function(x) return x + n end
         end
         local add5 = adder(5)
         return add5(10), add5(20)",
        &[15, 25],
    );
}
