//! Binary chunk reader/writer (the `luac` 5.3 format).
//!
//! A dumped chunk is a header followed by the main function's upvalue
//! count and its recursively encoded prototype. All multi-byte fields are
//! little-endian; strings are size-prefixed with the short/long split at
//! 0xFF.

use crate::opcode::Instruction;
use crate::proto::{Constant, LocalVar, Prototype, UpvalDesc};
use crate::value::LuaStr;
use std::fmt;
use std::rc::Rc;

pub const LUA_SIGNATURE: &[u8; 4] = b"\x1bLua";
pub const LUAC_VERSION: u8 = 0x53;
pub const LUAC_FORMAT: u8 = 0;
pub const LUAC_DATA: &[u8; 6] = b"\x19\x93\r\n\x1a\n";
pub const CINT_SIZE: u8 = 4;
pub const CSIZET_SIZE: u8 = 8;
pub const INSTRUCTION_SIZE: u8 = 4;
pub const LUA_INTEGER_SIZE: u8 = 8;
pub const LUA_NUMBER_SIZE: u8 = 8;
pub const LUAC_INT: i64 = 0x5678;
pub const LUAC_NUM: f64 = 370.5;

const TAG_NIL: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_NUMBER: u8 = 0x03;
const TAG_INTEGER: u8 = 0x13;
const TAG_SHORT_STR: u8 = 0x04;
const TAG_LONG_STR: u8 = 0x14;

/// A malformed or mismatched precompiled chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatError {
    pub message: String,
}

impl FormatError {
    fn new(message: impl Into<String>) -> FormatError {
        FormatError {
            message: message.into(),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FormatError {}

/// True if `bytes` starts like a precompiled chunk.
pub fn is_binary_chunk(bytes: &[u8]) -> bool {
    bytes.starts_with(LUA_SIGNATURE)
}

/// Serialize a prototype tree to the binary chunk format.
pub fn dump(proto: &Prototype) -> Vec<u8> {
    let mut w = Writer { out: Vec::new() };
    w.out.extend_from_slice(LUA_SIGNATURE);
    w.byte(LUAC_VERSION);
    w.byte(LUAC_FORMAT);
    w.out.extend_from_slice(LUAC_DATA);
    w.byte(CINT_SIZE);
    w.byte(CSIZET_SIZE);
    w.byte(INSTRUCTION_SIZE);
    w.byte(LUA_INTEGER_SIZE);
    w.byte(LUA_NUMBER_SIZE);
    w.i64(LUAC_INT);
    w.f64(LUAC_NUM);
    w.byte(proto.upvalues.len() as u8);
    w.proto(proto);
    w.out
}

/// Parse a binary chunk back into a prototype tree, validating every
/// header field before touching the body.
pub fn undump(bytes: &[u8]) -> Result<Prototype, FormatError> {
    let mut r = Reader { bytes, pos: 0 };
    r.check_header()?;
    let _main_upvals = r.byte()?;
    r.proto(&LuaStr::default())
}

struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn byte(&mut self, b: u8) {
        self.out.push(b);
    }

    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.u64(v.to_bits());
    }

    /// Size-prefixed string: one byte `len+1`, or 0xFF plus a size_t for
    /// long strings. A zero byte means "no string".
    fn string(&mut self, s: &LuaStr) {
        let bytes = s.as_bytes();
        let size = bytes.len() + 1;
        if size < 0xFF {
            self.byte(size as u8);
        } else {
            self.byte(0xFF);
            self.u64(size as u64);
        }
        self.out.extend_from_slice(bytes);
    }

    fn proto(&mut self, p: &Prototype) {
        self.string(&p.source);
        self.u32(p.line_defined);
        self.u32(p.last_line_defined);
        self.byte(p.num_params);
        self.byte(p.is_vararg as u8);
        self.byte(p.max_stack_size);
        self.u32(p.code.len() as u32);
        for inst in &p.code {
            self.u32(inst.0);
        }
        self.u32(p.constants.len() as u32);
        for c in &p.constants {
            match c {
                Constant::Nil => self.byte(TAG_NIL),
                Constant::Boolean(b) => {
                    self.byte(TAG_BOOLEAN);
                    self.byte(*b as u8);
                }
                Constant::Float(f) => {
                    self.byte(TAG_NUMBER);
                    self.f64(*f);
                }
                Constant::Integer(i) => {
                    self.byte(TAG_INTEGER);
                    self.i64(*i);
                }
                Constant::Str(s) => {
                    if s.len() + 1 < 0xFF {
                        self.byte(TAG_SHORT_STR);
                    } else {
                        self.byte(TAG_LONG_STR);
                    }
                    self.string(s);
                }
            }
        }
        self.u32(p.upvalues.len() as u32);
        for uv in &p.upvalues {
            self.byte(uv.in_stack as u8);
            self.byte(uv.index);
        }
        self.u32(p.protos.len() as u32);
        for sub in &p.protos {
            self.proto(sub);
        }
        self.u32(p.line_info.len() as u32);
        for line in &p.line_info {
            self.u32(*line);
        }
        self.u32(p.loc_vars.len() as u32);
        for lv in &p.loc_vars {
            self.string(&lv.name);
            self.u32(lv.start_pc);
            self.u32(lv.end_pc);
        }
        self.u32(p.upvalue_names.len() as u32);
        for name in &p.upvalue_names {
            self.string(name);
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.pos + n > self.bytes.len() {
            return Err(FormatError::new("truncated precompiled chunk"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, FormatError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn i64(&mut self) -> Result<i64, FormatError> {
        Ok(self.u64()? as i64)
    }

    fn f64(&mut self) -> Result<f64, FormatError> {
        Ok(f64::from_bits(self.u64()?))
    }

    /// A size-prefixed string; `None` when the size byte is 0.
    fn string(&mut self) -> Result<Option<LuaStr>, FormatError> {
        let mut size = self.byte()? as u64;
        if size == 0 {
            return Ok(None);
        }
        if size == 0xFF {
            size = self.u64()?;
        }
        let data = self.take((size - 1) as usize)?;
        Ok(Some(LuaStr::new(data.to_vec())))
    }

    fn check_header(&mut self) -> Result<(), FormatError> {
        if self.take(4)? != LUA_SIGNATURE {
            return Err(FormatError::new("not a precompiled chunk!"));
        }
        if self.byte()? != LUAC_VERSION {
            return Err(FormatError::new("version mismatch!"));
        }
        if self.byte()? != LUAC_FORMAT {
            return Err(FormatError::new("format mismatch!"));
        }
        if self.take(6)? != LUAC_DATA {
            return Err(FormatError::new("corrupted!"));
        }
        if self.byte()? != CINT_SIZE {
            return Err(FormatError::new("int size mismatch!"));
        }
        if self.byte()? != CSIZET_SIZE {
            return Err(FormatError::new("size_t size mismatch!"));
        }
        if self.byte()? != INSTRUCTION_SIZE {
            return Err(FormatError::new("instruction size mismatch!"));
        }
        if self.byte()? != LUA_INTEGER_SIZE {
            return Err(FormatError::new("lua_Integer size mismatch!"));
        }
        if self.byte()? != LUA_NUMBER_SIZE {
            return Err(FormatError::new("lua_Number size mismatch!"));
        }
        if self.i64()? != LUAC_INT {
            return Err(FormatError::new("endianness mismatch!"));
        }
        if self.f64()? != LUAC_NUM {
            return Err(FormatError::new("float format mismatch!"));
        }
        Ok(())
    }

    fn proto(&mut self, parent_source: &LuaStr) -> Result<Prototype, FormatError> {
        let source = match self.string()? {
            Some(s) => s,
            None => parent_source.clone(),
        };
        let line_defined = self.u32()?;
        let last_line_defined = self.u32()?;
        let num_params = self.byte()?;
        let is_vararg = self.byte()? != 0;
        let max_stack_size = self.byte()?;

        let n_code = self.u32()? as usize;
        let mut code = Vec::with_capacity(n_code);
        for _ in 0..n_code {
            code.push(Instruction(self.u32()?));
        }

        let n_consts = self.u32()? as usize;
        let mut constants = Vec::with_capacity(n_consts);
        for _ in 0..n_consts {
            let tag = self.byte()?;
            constants.push(match tag {
                TAG_NIL => Constant::Nil,
                TAG_BOOLEAN => Constant::Boolean(self.byte()? != 0),
                TAG_NUMBER => Constant::Float(self.f64()?),
                TAG_INTEGER => Constant::Integer(self.i64()?),
                TAG_SHORT_STR | TAG_LONG_STR => {
                    Constant::Str(self.string()?.unwrap_or_default())
                }
                _ => return Err(FormatError::new(format!("bad constant tag: {tag:#04x}"))),
            });
        }

        let n_upvals = self.u32()? as usize;
        let mut upvalues = Vec::with_capacity(n_upvals);
        for _ in 0..n_upvals {
            let in_stack = self.byte()? != 0;
            let index = self.byte()?;
            upvalues.push(UpvalDesc { in_stack, index });
        }

        let n_protos = self.u32()? as usize;
        let mut protos = Vec::with_capacity(n_protos);
        for _ in 0..n_protos {
            protos.push(Rc::new(self.proto(&source)?));
        }

        let n_lines = self.u32()? as usize;
        let mut line_info = Vec::with_capacity(n_lines);
        for _ in 0..n_lines {
            line_info.push(self.u32()?);
        }

        let n_locs = self.u32()? as usize;
        let mut loc_vars = Vec::with_capacity(n_locs);
        for _ in 0..n_locs {
            let name = self.string()?.unwrap_or_default();
            let start_pc = self.u32()?;
            let end_pc = self.u32()?;
            loc_vars.push(LocalVar {
                name,
                start_pc,
                end_pc,
            });
        }

        let n_upnames = self.u32()? as usize;
        let mut upvalue_names = Vec::with_capacity(n_upnames);
        for _ in 0..n_upnames {
            upvalue_names.push(self.string()?.unwrap_or_default());
        }

        Ok(Prototype {
            source,
            line_defined,
            last_line_defined,
            num_params,
            is_vararg,
            max_stack_size,
            code,
            constants,
            upvalues,
            protos,
            line_info,
            loc_vars,
            upvalue_names,
        })
    }
}
