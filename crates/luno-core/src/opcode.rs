//! Lua 5.3 opcodes and instruction encoding.
//!
//! Instruction layout (32 bits):
//! - Bits 0-5: OpCode (6 bits)
//! - Bits 6-13: A (8 bits)
//! - For iABC format:
//!   - Bits 14-22: C (9 bits)
//!   - Bits 23-31: B (9 bits)
//! - For iABx: Bx = bits 14-31 (18 bits, unsigned)
//! - For iAsBx: sBx = Bx - 131071 (excess-K signed interpretation)
//! - For iAx: Ax = bits 6-31 (26 bits, unsigned)
//!
//! A 9-bit B or C operand with bit 8 set addresses the constant pool
//! (RK operand): the constant index is `arg & 0xFF`.

use std::fmt;

/// Field widths in bits.
const SIZE_OP: u32 = 6;
const SIZE_A: u32 = 8;
const SIZE_B: u32 = 9;
const SIZE_C: u32 = 9;
const SIZE_BX: u32 = SIZE_B + SIZE_C; // 18
const SIZE_AX: u32 = SIZE_A + SIZE_B + SIZE_C; // 26

/// Bit offset of each field.
const POS_OP: u32 = 0;
const POS_A: u32 = POS_OP + SIZE_OP; // 6
const POS_C: u32 = POS_A + SIZE_A; // 14
const POS_B: u32 = POS_C + SIZE_C; // 23
const POS_AX: u32 = POS_A; // 6

const fn mask(n: u32) -> u32 {
    (1 << n) - 1
}

pub const MAX_A: u32 = mask(SIZE_A); // 255
pub const MAX_B: u32 = mask(SIZE_B); // 511
pub const MAX_C: u32 = mask(SIZE_C); // 511
pub const MAX_BX: u32 = mask(SIZE_BX); // 262143
pub const MAX_SBX: i32 = (MAX_BX >> 1) as i32; // 131071
pub const MIN_SBX: i32 = -MAX_SBX; // -131071
pub const MAX_AX: u32 = mask(SIZE_AX); // 67108863

const OFFSET_SBX: i32 = MAX_SBX;

/// Bit 8 of a 9-bit operand marks a constant-pool index.
pub const BIT_RK: u32 = 1 << (SIZE_B - 1); // 0x100
/// Largest constant index addressable through an RK operand.
pub const MAX_INDEX_RK: u32 = BIT_RK - 1; // 0xFF

/// Encode a constant index as an RK operand.
pub const fn rk_as_k(idx: u32) -> u32 {
    idx | BIT_RK
}

/// True if a 9-bit operand addresses the constant pool.
pub const fn is_k(arg: u32) -> bool {
    arg & BIT_RK != 0
}

/// Extract the constant index from an RK operand.
pub const fn index_k(arg: u32) -> u32 {
    arg & !BIT_RK
}

/// Array elements written per SETLIST instruction.
pub const FIELDS_PER_FLUSH: u32 = 50;

/// The 47 opcodes of the 5.3 instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Move = 0,
    LoadK,
    LoadKX,
    LoadBool,
    LoadNil,
    GetUpval,
    GetTabUp,
    GetTable,
    SetTabUp,
    SetUpval,
    SetTable,
    NewTable,
    Self_,
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
    Not,
    Len,
    Concat,
    Jmp,
    Eq,
    Lt,
    Le,
    Test,
    TestSet,
    Call,
    TailCall,
    Return,
    ForLoop,
    ForPrep,
    TForCall,
    TForLoop,
    SetList,
    Closure,
    VarArg,
    ExtraArg,
}

impl OpCode {
    /// Number of defined opcodes.
    pub const COUNT: usize = 47;

    /// Decode a raw opcode byte, if it names a real opcode.
    pub fn from_u8(val: u8) -> Option<OpCode> {
        if val as usize >= Self::COUNT {
            return None;
        }
        // Safety: repr(u8) with contiguous discriminants starting at zero
        Some(unsafe { std::mem::transmute::<u8, OpCode>(val) })
    }

    /// Operand layout used by this opcode.
    pub fn format(&self) -> InstructionFormat {
        use InstructionFormat::*;
        use OpCode::*;
        match self {
            LoadK | LoadKX | Closure => IABx,
            Jmp | ForLoop | ForPrep | TForLoop => IAsBx,
            ExtraArg => IAx,
            _ => IABC,
        }
    }

    /// Get the name of this opcode (uppercase, as `luac -l` prints it).
    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Move => "MOVE",
            LoadK => "LOADK",
            LoadKX => "LOADKX",
            LoadBool => "LOADBOOL",
            LoadNil => "LOADNIL",
            GetUpval => "GETUPVAL",
            GetTabUp => "GETTABUP",
            GetTable => "GETTABLE",
            SetTabUp => "SETTABUP",
            SetUpval => "SETUPVAL",
            SetTable => "SETTABLE",
            NewTable => "NEWTABLE",
            Self_ => "SELF",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Mod => "MOD",
            Pow => "POW",
            Div => "DIV",
            IDiv => "IDIV",
            BAnd => "BAND",
            BOr => "BOR",
            BXor => "BXOR",
            Shl => "SHL",
            Shr => "SHR",
            Unm => "UNM",
            BNot => "BNOT",
            Not => "NOT",
            Len => "LEN",
            Concat => "CONCAT",
            Jmp => "JMP",
            Eq => "EQ",
            Lt => "LT",
            Le => "LE",
            Test => "TEST",
            TestSet => "TESTSET",
            Call => "CALL",
            TailCall => "TAILCALL",
            Return => "RETURN",
            ForLoop => "FORLOOP",
            ForPrep => "FORPREP",
            TForCall => "TFORCALL",
            TForLoop => "TFORLOOP",
            SetList => "SETLIST",
            Closure => "CLOSURE",
            VarArg => "VARARG",
            ExtraArg => "EXTRAARG",
        }
    }

    /// How the B and C operands are used, for disassembly.
    pub fn operand_use(&self) -> (OpArg, OpArg) {
        use OpArg::*;
        use OpCode::*;
        match self {
            Move => (Reg, Unused),
            LoadK | LoadKX => (Const, Unused),
            LoadBool => (Used, Used),
            LoadNil => (Used, Unused),
            GetUpval | SetUpval => (Upval, Unused),
            GetTabUp => (Upval, ConstOrReg),
            GetTable => (Reg, ConstOrReg),
            SetTabUp => (ConstOrReg, ConstOrReg),
            SetTable => (ConstOrReg, ConstOrReg),
            NewTable => (Used, Used),
            Self_ => (Reg, ConstOrReg),
            Add | Sub | Mul | Mod | Pow | Div | IDiv | BAnd | BOr | BXor | Shl | Shr => {
                (ConstOrReg, ConstOrReg)
            }
            Unm | BNot | Not | Len => (Reg, Unused),
            Concat => (Reg, Reg),
            Jmp => (Reg, Unused),
            Eq | Lt | Le => (ConstOrReg, ConstOrReg),
            Test => (Unused, Used),
            TestSet => (Reg, Used),
            Call | TailCall => (Used, Used),
            Return => (Used, Unused),
            ForLoop | ForPrep | TForLoop => (Reg, Unused),
            TForCall => (Unused, Used),
            SetList => (Used, Used),
            Closure => (Used, Unused),
            VarArg => (Used, Unused),
            ExtraArg => (Used, Used),
        }
    }

    /// Returns true if this opcode conditionally skips the next instruction.
    pub fn is_test(&self) -> bool {
        use OpCode::*;
        matches!(self, Eq | Lt | Le | Test | TestSet)
    }
}

/// The four operand layouts an instruction can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionFormat {
    IABC,
    IABx,
    IAsBx, // Bx reinterpreted with an excess-K bias
    IAx,
}

/// How a B or C operand is used (disassembly metadata).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpArg {
    /// Operand is not used.
    Unused,
    /// Operand is a plain value (count, bool, size hint).
    Used,
    /// Operand is a register or a jump offset.
    Reg,
    /// Operand is a constant index.
    Const,
    /// Operand is register-or-constant (RK).
    ConstOrReg,
    /// Operand is an upvalue index.
    Upval,
}

/// One encoded bytecode instruction, 32 bits wide.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u32);

impl Instruction {
    // ---- Encoding ----

    /// Encode an iABC instruction.
    pub fn abc(op: OpCode, a: u32, b: u32, c: u32) -> Self {
        debug_assert!(a <= MAX_A, "A out of range: {a}");
        debug_assert!(b <= MAX_B, "B out of range: {b}");
        debug_assert!(c <= MAX_C, "C out of range: {c}");
        Instruction((b << POS_B) | (c << POS_C) | (a << POS_A) | op as u32)
    }

    /// Encode an iABx instruction.
    pub fn abx(op: OpCode, a: u32, bx: u32) -> Self {
        debug_assert!(a <= MAX_A, "A out of range: {a}");
        debug_assert!(bx <= MAX_BX, "Bx out of range: {bx}");
        Instruction((bx << POS_C) | (a << POS_A) | op as u32)
    }

    /// Encode an iAsBx instruction with a signed Bx.
    pub fn asbx(op: OpCode, a: u32, sbx: i32) -> Self {
        debug_assert!((MIN_SBX..=MAX_SBX).contains(&sbx), "sBx out of range: {sbx}");
        Self::abx(op, a, (sbx + OFFSET_SBX) as u32)
    }

    /// Encode an iAx instruction.
    pub fn ax(op: OpCode, ax: u32) -> Self {
        debug_assert!(ax <= MAX_AX, "Ax out of range: {ax}");
        Instruction((ax << POS_AX) | op as u32)
    }

    // ---- Field extraction ----

    /// The opcode held in the low six bits.
    pub fn opcode(&self) -> OpCode {
        OpCode::from_u8((self.0 & mask(SIZE_OP)) as u8).unwrap_or(OpCode::Move)
    }

    /// Field A.
    pub fn a(&self) -> u32 {
        (self.0 >> POS_A) & mask(SIZE_A)
    }

    /// Field B.
    pub fn b(&self) -> u32 {
        (self.0 >> POS_B) & mask(SIZE_B)
    }

    /// Field C.
    pub fn c(&self) -> u32 {
        (self.0 >> POS_C) & mask(SIZE_C)
    }

    /// Unsigned Bx field.
    pub fn bx(&self) -> u32 {
        (self.0 >> POS_C) & mask(SIZE_BX)
    }

    /// Signed Bx field.
    pub fn sbx(&self) -> i32 {
        self.bx() as i32 - OFFSET_SBX
    }

    /// Unsigned Ax field.
    pub fn ax_field(&self) -> u32 {
        (self.0 >> POS_AX) & mask(SIZE_AX)
    }

    // ---- In-place patching ----

    /// Replace field A.
    pub fn set_a(&mut self, a: u32) {
        debug_assert!(a <= MAX_A);
        self.0 = (self.0 & !(mask(SIZE_A) << POS_A)) | (a << POS_A);
    }

    /// Replace the signed Bx field.
    pub fn set_sbx(&mut self, sbx: i32) {
        debug_assert!((MIN_SBX..=MAX_SBX).contains(&sbx));
        let bx = (sbx + OFFSET_SBX) as u32;
        self.0 = (self.0 & !(mask(SIZE_BX) << POS_C)) | (bx << POS_C);
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match op.format() {
            InstructionFormat::IABC => {
                write!(f, "{} A={} B={} C={}", op.name(), self.a(), self.b(), self.c())
            }
            InstructionFormat::IABx => write!(f, "{} A={} Bx={}", op.name(), self.a(), self.bx()),
            InstructionFormat::IAsBx => {
                write!(f, "{} A={} sBx={}", op.name(), self.a(), self.sbx())
            }
            InstructionFormat::IAx => write!(f, "{} Ax={}", op.name(), self.ax_field()),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
