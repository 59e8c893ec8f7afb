/// The dense instruction set. Discriminants are the wire opcodes; anything
/// outside the table decodes to `None` and the interpreter halts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    LoadWord = 1,
    LoadHalf = 2,
    LoadByte = 3,
    FetchWord = 4,
    FetchHalf = 5,
    FetchByte = 6,
    StoreWord = 7,
    StoreHalf = 8,
    StoreByte = 9,
    Dup = 10,
    Drop = 11,
    Swap = 12,
    PushAddr = 13,
    PopAddr = 14,
    Equal = 15,
    NotEqual = 16,
    LessThan = 17,
    GreaterThan = 18,
    Add = 19,
    Sub = 20,
    Mul = 21,
    DivMod = 22,
    MulDivMod = 23,
    And = 24,
    Or = 25,
    Xor = 26,
    Not = 27,
    ShiftLeft = 28,
    ShiftRight = 29,
    Pack = 30,
    Unpack = 31,
    Relative = 32,
    Call = 33,
    CondCall = 34,
    Jump = 35,
    CondJump = 36,
    Return = 37,
    CondReturn = 38,
    SetInterrupt = 39,
    HaltInterrupts = 40,
    StartInterrupts = 41,
    TriggerInterrupt = 42,
    InvokeIo = 43,
    HaltSystem = 44,
    InitCore = 45,
    ActivateCore = 46,
    PauseCore = 47,
    SuspendCore = 48,
    ReadRegister = 49,
    WriteRegister = 50,
    CopyBlock = 51,
    CompareBlock = 52,
    UnsignedMode = 53,
    FloatMode = 54,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        Some(match byte {
            0 => Opcode::Nop,
            1 => Opcode::LoadWord,
            2 => Opcode::LoadHalf,
            3 => Opcode::LoadByte,
            4 => Opcode::FetchWord,
            5 => Opcode::FetchHalf,
            6 => Opcode::FetchByte,
            7 => Opcode::StoreWord,
            8 => Opcode::StoreHalf,
            9 => Opcode::StoreByte,
            10 => Opcode::Dup,
            11 => Opcode::Drop,
            12 => Opcode::Swap,
            13 => Opcode::PushAddr,
            14 => Opcode::PopAddr,
            15 => Opcode::Equal,
            16 => Opcode::NotEqual,
            17 => Opcode::LessThan,
            18 => Opcode::GreaterThan,
            19 => Opcode::Add,
            20 => Opcode::Sub,
            21 => Opcode::Mul,
            22 => Opcode::DivMod,
            23 => Opcode::MulDivMod,
            24 => Opcode::And,
            25 => Opcode::Or,
            26 => Opcode::Xor,
            27 => Opcode::Not,
            28 => Opcode::ShiftLeft,
            29 => Opcode::ShiftRight,
            30 => Opcode::Pack,
            31 => Opcode::Unpack,
            32 => Opcode::Relative,
            33 => Opcode::Call,
            34 => Opcode::CondCall,
            35 => Opcode::Jump,
            36 => Opcode::CondJump,
            37 => Opcode::Return,
            38 => Opcode::CondReturn,
            39 => Opcode::SetInterrupt,
            40 => Opcode::HaltInterrupts,
            41 => Opcode::StartInterrupts,
            42 => Opcode::TriggerInterrupt,
            43 => Opcode::InvokeIo,
            44 => Opcode::HaltSystem,
            45 => Opcode::InitCore,
            46 => Opcode::ActivateCore,
            47 => Opcode::PauseCore,
            48 => Opcode::SuspendCore,
            49 => Opcode::ReadRegister,
            50 => Opcode::WriteRegister,
            51 => Opcode::CopyBlock,
            52 => Opcode::CompareBlock,
            53 => Opcode::UnsignedMode,
            54 => Opcode::FloatMode,
            _ => return None,
        })
    }

    /// Two-letter assembly mnemonic, used by the execution trace.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NO",
            Opcode::LoadWord => "LW",
            Opcode::LoadHalf => "LH",
            Opcode::LoadByte => "LB",
            Opcode::FetchWord => "FW",
            Opcode::FetchHalf => "FH",
            Opcode::FetchByte => "FB",
            Opcode::StoreWord => "SW",
            Opcode::StoreHalf => "SH",
            Opcode::StoreByte => "SB",
            Opcode::Dup => "DU",
            Opcode::Drop => "DR",
            Opcode::Swap => "SP",
            Opcode::PushAddr => "PU",
            Opcode::PopAddr => "PO",
            Opcode::Equal => "EQ",
            Opcode::NotEqual => "NE",
            Opcode::LessThan => "LT",
            Opcode::GreaterThan => "GT",
            Opcode::Add => "AD",
            Opcode::Sub => "SU",
            Opcode::Mul => "MU",
            Opcode::DivMod => "DM",
            Opcode::MulDivMod => "MD",
            Opcode::And => "AN",
            Opcode::Or => "OR",
            Opcode::Xor => "XO",
            Opcode::Not => "NT",
            Opcode::ShiftLeft => "SL",
            Opcode::ShiftRight => "SR",
            Opcode::Pack => "PA",
            Opcode::Unpack => "UN",
            Opcode::Relative => "RL",
            Opcode::Call => "CA",
            Opcode::CondCall => "CC",
            Opcode::Jump => "JU",
            Opcode::CondJump => "CJ",
            Opcode::Return => "RE",
            Opcode::CondReturn => "CR",
            Opcode::SetInterrupt => "SV",
            Opcode::HaltInterrupts => "HI",
            Opcode::StartInterrupts => "SI",
            Opcode::TriggerInterrupt => "TI",
            Opcode::InvokeIo => "II",
            Opcode::HaltSystem => "HS",
            Opcode::InitCore => "IC",
            Opcode::ActivateCore => "AC",
            Opcode::PauseCore => "PC",
            Opcode::SuspendCore => "SC",
            Opcode::ReadRegister => "RR",
            Opcode::WriteRegister => "WR",
            Opcode::CopyBlock => "CP",
            Opcode::CompareBlock => "BC",
            Opcode::UnsignedMode => "UU",
            Opcode::FloatMode => "FF",
        }
    }
}
