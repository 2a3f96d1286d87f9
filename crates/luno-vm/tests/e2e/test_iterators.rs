use super::helpers::*;

// ---- ipairs ----

#[test]
fn test_ipairs_visits_prefix_in_order() {
    check_ints(
        "local keys, vals = 0, 0
         for i, v in ipairs({10, 20, 30}) do
            keys = keys + i
            vals = vals + v
         end
         return keys, vals",
        &[6, 60],
    );
}

#[test]
fn test_ipairs_stops_at_first_hole() {
    check_ints(
        "local count = 0
         for i in ipairs({1, 2, nil, 4}) do count = count + 1 end
         return count",
        &[2],
    );
}

#[test]
fn test_ipairs_on_empty_table() {
    check_ints(
        "local count = 0
         for i in ipairs({}) do count = count + 1 end
         return count",
        &[0],
    );
}

// ---- pairs ----

#[test]
fn test_pairs_visits_every_entry() {
    check_ints(
        "local t = { a = 1, b = 2, c = 3 }
         local sum, count = 0, 0
         for _, v in pairs(t) do
            sum = sum + v
            count = count + 1
         end
         return sum, count",
        &[6, 3],
    );
}

#[test]
fn test_pairs_order_is_array_then_insertion() {
    let results = eval(
        "local t = {10, 20}
         t.a = 30
         local ks = {}
         local n = 0
         for k in pairs(t) do
            n = n + 1
            ks[n] = k
         end
         return ks[1], ks[2], ks[3]",
    );
    assert_int(&results, 0, 1);
    assert_int(&results, 1, 2);
    assert_str(&results, 2, "a");
}

#[test]
fn test_pairs_skips_array_holes() {
    check_ints(
        "local t = {1, 2, 3}
         t[2] = nil
         local count = 0
         for _ in pairs(t) do count = count + 1 end
         return count",
        &[2],
    );
}

// ---- next ----

#[test]
fn test_next_walks_and_terminates() {
    let results = eval(
        "local t = {7}
         local k, v = next(t)
         local k2 = next(t, k)
         return k, v, k2",
    );
    assert_int(&results, 0, 1);
    assert_int(&results, 1, 7);
    assert_nil(&results, 2);
}

#[test]
fn test_next_on_empty_table() {
    let results = eval("return next({})");
    assert_nil(&results, 0);
}

// ---- Custom iterators ----

#[test]
fn test_stateless_iterator_triple() {
    check_ints(
        "local function iter(t, i)
            i = i + 1
            if t[i] then return i, t[i] end
         end
         local sum = 0
         for _, v in iter, {3, 4, 5}, 0 do sum = sum + v end
         return sum",
        &[12],
    );
}

#[test]
fn test_stateful_closure_iterator() {
    check_ints(
        "local function range(n)
            local i = 0
            return function()
               i = i + 1
               if i <= n then return i end
            end
         end
         local sum = 0
         for i in range(4) do sum = sum + i end
         return sum",
        &[10],
    );
}

#[test]
fn test_break_in_generic_for() {
    check_ints(
        "local sum = 0
         for i, v in ipairs({5, 5, 5, 5}) do
            sum = sum + v
            if i == 2 then break end
         end
         return sum",
        &[10],
    );
}
