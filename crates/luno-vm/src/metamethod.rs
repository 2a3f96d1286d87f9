//! Metamethod lookup.
//!
//! Only tables carry metatables here; every other type indexes, calls,
//! and compares by its built-in rules alone.

use luno_core::value::{LuaStr, Value};

/// Metamethod name strings, built once so lookups never rehash.
pub struct MetamethodNames {
    pub add: LuaStr,
    pub sub: LuaStr,
    pub mul: LuaStr,
    pub mod_: LuaStr,
    pub pow: LuaStr,
    pub div: LuaStr,
    pub idiv: LuaStr,
    pub band: LuaStr,
    pub bor: LuaStr,
    pub bxor: LuaStr,
    pub shl: LuaStr,
    pub shr: LuaStr,
    pub unm: LuaStr,
    pub bnot: LuaStr,
    pub concat: LuaStr,
    pub len: LuaStr,
    pub eq: LuaStr,
    pub lt: LuaStr,
    pub le: LuaStr,
    pub index: LuaStr,
    pub newindex: LuaStr,
    pub call: LuaStr,
}

impl MetamethodNames {
    pub fn new() -> MetamethodNames {
        MetamethodNames {
            add: LuaStr::from_str("__add"),
            sub: LuaStr::from_str("__sub"),
            mul: LuaStr::from_str("__mul"),
            mod_: LuaStr::from_str("__mod"),
            pow: LuaStr::from_str("__pow"),
            div: LuaStr::from_str("__div"),
            idiv: LuaStr::from_str("__idiv"),
            band: LuaStr::from_str("__band"),
            bor: LuaStr::from_str("__bor"),
            bxor: LuaStr::from_str("__bxor"),
            shl: LuaStr::from_str("__shl"),
            shr: LuaStr::from_str("__shr"),
            unm: LuaStr::from_str("__unm"),
            bnot: LuaStr::from_str("__bnot"),
            concat: LuaStr::from_str("__concat"),
            len: LuaStr::from_str("__len"),
            eq: LuaStr::from_str("__eq"),
            lt: LuaStr::from_str("__lt"),
            le: LuaStr::from_str("__le"),
            index: LuaStr::from_str("__index"),
            newindex: LuaStr::from_str("__newindex"),
            call: LuaStr::from_str("__call"),
        }
    }
}

impl Default for MetamethodNames {
    fn default() -> MetamethodNames {
        MetamethodNames::new()
    }
}

/// Look up a metamethod on a value. A nil field counts as absent.
pub fn get_metamethod(v: &Value, name: &LuaStr) -> Option<Value> {
    let t = v.as_table()?;
    let mt = t.borrow().metatable.clone()?;
    let m = mt.borrow().raw_get_str(name);
    if m.is_nil() {
        None
    } else {
        Some(m)
    }
}
