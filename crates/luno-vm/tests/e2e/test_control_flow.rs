use super::helpers::*;

// ---- Conditionals ----

#[test]
fn test_if_branches() {
    check_ints(
        "local function pick(n)
            if n < 0 then return -1
            elseif n == 0 then return 0
            else return 1 end
         end
         return pick(-5), pick(0), pick(9)",
        &[-1, 0, 1],
    );
}

#[test]
fn test_if_without_else() {
    check_ints(
        "local x = 1
         if false then x = 2 end
         return x",
        &[1],
    );
}

#[test]
fn test_condition_truthiness() {
    check_ints(
        "local n = 0
         if 0 then n = n + 1 end
         if \"\" then n = n + 10 end
         if nil then n = n + 100 end
         return n",
        &[11],
    );
}

// ---- While and repeat ----

#[test]
fn test_while_accumulates_sum() {
    check_ints(
        "local i, sum = 1, 0
         while i <= 10 do
            sum = sum + i
            i = i + 1
         end
         return sum",
        &[55],
    );
}

#[test]
fn test_while_false_never_runs() {
    check_ints(
        "local n = 0
         while false do n = 1 end
         return n",
        &[0],
    );
}

#[test]
fn test_repeat_runs_at_least_once() {
    check_ints(
        "local n = 0
         repeat n = n + 1 until true
         return n",
        &[1],
    );
}

#[test]
fn test_repeat_condition_sees_block_locals() {
    check_ints(
        "local n = 0
         repeat
            n = n + 1
            local stop = n >= 3
         until stop
         return n",
        &[3],
    );
}

// ---- Numeric for ----

#[test]
fn test_for_ascending() {
    check_ints(
        "local sum = 0
         for i = 1, 10 do sum = sum + i end
         return sum",
        &[55],
    );
}

#[test]
fn test_for_descending_runs_ten_times() {
    check_ints(
        "local count = 0
         for i = 10, 1, -1 do count = count + 1 end
         return count",
        &[10],
    );
}

#[test]
fn test_for_with_step() {
    check_ints(
        "local last, count = 0, 0
         for i = 1, 9, 2 do last = i count = count + 1 end
         return last, count",
        &[9, 5],
    );
}

#[test]
fn test_for_empty_range() {
    check_ints(
        "local n = 0
         for i = 5, 1 do n = n + 1 end
         return n",
        &[0],
    );
}

#[test]
fn test_for_zero_step_loops_until_break() {
    check_ints(
        "local n = 0
         for i = 1, 10, 0 do
            n = n + 1
            if n >= 5 then break end
         end
         return n",
        &[5],
    );
}

#[test]
fn test_for_integer_index_with_float_limit() {
    check_ints(
        "local last
         for i = 1, 2.5 do last = i end
         return last",
        &[2],
    );
}

#[test]
fn test_for_float_step() {
    let results = eval(
        "local count, last = 0, 0
         for i = 1, 2, 0.5 do count = count + 1 last = i end
         return count, last",
    );
    assert_int(&results, 0, 3);
    assert_float(&results, 1, 2.0);
}

#[test]
fn test_for_var_is_per_loop_copy() {
    check_ints(
        "local sum = 0
         for i = 1, 3 do
            i = 10
            sum = sum + 1
         end
         return sum",
        &[3],
    );
}

// ---- Break ----

#[test]
fn test_break_inner_loop_only() {
    check_ints(
        "local n = 0
         for i = 1, 3 do
            for j = 1, 10 do
               if j == 2 then break end
               n = n + 1
            end
         end
         return n",
        &[3],
    );
}

#[test]
fn test_break_leaves_while() {
    check_ints(
        "local i = 0
         while true do
            i = i + 1
            if i == 7 then break end
         end
         return i",
        &[7],
    );
}

// ---- Goto ----

#[test]
fn test_goto_continue_pattern() {
    check_ints(
        "local n = 0
         for i = 1, 10 do
            if i % 2 == 0 then goto continue end
            n = n + 1
            ::continue::
         end
         return n",
        &[5],
    );
}

#[test]
fn test_goto_forward_out_of_block() {
    check_ints(
        "local x = 1
         do
            goto done
         end
         x = 2
         ::done::
         return x",
        &[1],
    );
}

#[test]
fn test_goto_backward() {
    check_ints(
        "local n = 0
         ::top::
         n = n + 1
         if n < 4 then goto top end
         return n",
        &[4],
    );
}

// ---- and / or ----

#[test]
fn test_and_or_values() {
    let results = eval("return 1 and 2, nil and 2, false or \"d\", nil or false");
    assert_int(&results, 0, 2);
    assert_nil(&results, 1);
    assert_str(&results, 2, "d");
    assert_bool(&results, 3, false);
}

#[test]
fn test_and_or_chains() {
    check_ints("return 1 and nil or 3, (nil or 4) and 5", &[3, 5]);
}

#[test]
fn test_short_circuit_skips_side_effects() {
    check_ints(
        "local calls = 0
         local function bump() calls = calls + 1 return true end
         local _ = false and bump()
         local _ = true or bump()
         local _ = true and bump()
         return calls",
        &[1],
    );
}
