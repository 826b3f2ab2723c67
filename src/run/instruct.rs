use std::fmt;

// Takes 16 bits (instruction size) and decomposes it into its parts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionParameters {
    pub bits: u16,
    pub op: u8,
    pub x: u8,
    pub y: u8,
    pub n: u8,
    pub nn: u8,
    pub nnn: u16,
}

impl From<u16> for InstructionParameters {
    fn from(bits: u16) -> Self {
        InstructionParameters {
            bits,
            op: ((bits & 0xF000) >> 4 * 3) as u8,
            x: ((bits & 0x0F00) >> 4 * 2) as u8,
            y: ((bits & 0x00F0) >> 4 * 1) as u8,
            n: ((bits & 0x000F) >> 4 * 0) as u8,
            nn: ((bits & 0x00FF) >> 4 * 0) as u8,
            nnn: ((bits & 0x0FFF) >> 4 * 0) as u16,
        }
    }
}

impl InstructionParameters {
    pub fn from_bytes(byte0: u8, byte1: u8) -> Self {
        InstructionParameters::from(u16::from_be_bytes([byte0, byte1]))
    }

    // Every word decodes to something: words outside the instruction set become Unknown and run as no-ops
    pub fn decode(&self) -> Instruction {
        let InstructionParameters {
            bits,
            op,
            x,
            y,
            n,
            nn,
            nnn,
        } = *self;

        match op {
            0x0 => match nnn {
                0x0E0 => Instruction::ClearScreen,
                0x0EE => Instruction::SubroutineReturn,
                _ => Instruction::MachineCall(nnn),
            },
            0x1 => Instruction::Jump(nnn),
            0x2 => Instruction::CallSubroutine(nnn),
            0x3 => Instruction::SkipIfEqualsConstant(x, nn),
            0x4 => Instruction::SkipIfNotEqualsConstant(x, nn),
            0x5 => Instruction::SkipIfEquals(x, y),
            0x6 => Instruction::SetConstant(x, nn),
            0x7 => Instruction::AddConstant(x, nn),
            0x8 => match n {
                0x0 => Instruction::Set(x, y),
                0x1 => Instruction::Or(x, y),
                0x2 => Instruction::And(x, y),
                0x3 => Instruction::Xor(x, y),
                0x4 => Instruction::Add(x, y),
                0x5 => Instruction::Sub(x, y),
                0x6 => Instruction::ShiftRight(x),
                0x7 => Instruction::SubReverse(x, y),
                0xE => Instruction::ShiftLeft(x),
                _ => Instruction::Unknown(bits),
            },
            0x9 => Instruction::SkipIfNotEquals(x, y),
            0xA => Instruction::SetIndex(nnn),
            0xB => Instruction::JumpWithOffset(nnn),
            0xC => Instruction::GenerateRandom(x, nn),
            0xD => Instruction::Draw(x, y, n),
            0xE => match nn {
                0x9E => Instruction::SkipIfKeyDown(x),
                0xA1 => Instruction::SkipIfKeyNotDown(x),
                _ => Instruction::Unknown(bits),
            },
            0xF => match nn {
                0x07 => Instruction::GetDelayTimer(x),
                0x0A => Instruction::WaitForKey(x),
                0x15 => Instruction::SetDelayTimer(x),
                0x18 => Instruction::SetSoundTimer(x),
                0x1E => Instruction::AddToIndex(x),
                0x29 => Instruction::SetIndexToHexChar(x),
                0x33 => Instruction::StoreBinaryCodedDecimal(x),
                0x55 => Instruction::Store(x),
                0x65 => Instruction::Load(x),
                _ => Instruction::Unknown(bits),
            },
            _ => unreachable!("op is a 4 bit value"),
        }
    }
}

impl fmt::Display for InstructionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X} (op = {:#X?}, x = {:?}, y = {:?}, n = {:?}, nn = {:?}, nnn = {:?})",
            self.bits, self.op, self.x, self.y, self.n, self.nn, self.nnn
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    ClearScreen,
    SubroutineReturn,
    MachineCall(u16),
    Jump(u16),
    CallSubroutine(u16),
    SkipIfEqualsConstant(u8, u8),
    SkipIfNotEqualsConstant(u8, u8),
    SkipIfEquals(u8, u8),
    SetConstant(u8, u8),
    AddConstant(u8, u8),
    Set(u8, u8),
    Or(u8, u8),
    And(u8, u8),
    Xor(u8, u8),
    Add(u8, u8),
    Sub(u8, u8),
    ShiftRight(u8),
    SubReverse(u8, u8),
    ShiftLeft(u8),
    SkipIfNotEquals(u8, u8),
    SetIndex(u16),
    JumpWithOffset(u16),
    GenerateRandom(u8, u8),
    Draw(u8, u8, u8),
    SkipIfKeyDown(u8),
    SkipIfKeyNotDown(u8),
    GetDelayTimer(u8),
    WaitForKey(u8),
    SetDelayTimer(u8),
    SetSoundTimer(u8),
    AddToIndex(u8),
    SetIndexToHexChar(u8),
    StoreBinaryCodedDecimal(u8),
    Store(u8),
    Load(u8),
    Unknown(u16),
}

// Short assembler-like mnemonics for logs and the debug status line
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::ClearScreen => write!(f, "cls"),
            Instruction::SubroutineReturn => write!(f, "rts"),
            Instruction::MachineCall(nnn) => write!(f, "sys {:#05X}", nnn),
            Instruction::Jump(nnn) => write!(f, "jmp {:#05X}", nnn),
            Instruction::CallSubroutine(nnn) => write!(f, "jsr {:#05X}", nnn),
            Instruction::SkipIfEqualsConstant(x, nn) => write!(f, "skeq v{:X}, {:#04X}", x, nn),
            Instruction::SkipIfNotEqualsConstant(x, nn) => write!(f, "skne v{:X}, {:#04X}", x, nn),
            Instruction::SkipIfEquals(x, y) => write!(f, "skeq v{:X}, v{:X}", x, y),
            Instruction::SetConstant(x, nn) => write!(f, "mov v{:X}, {:#04X}", x, nn),
            Instruction::AddConstant(x, nn) => write!(f, "add v{:X}, {:#04X}", x, nn),
            Instruction::Set(x, y) => write!(f, "mov v{:X}, v{:X}", x, y),
            Instruction::Or(x, y) => write!(f, "or v{:X}, v{:X}", x, y),
            Instruction::And(x, y) => write!(f, "and v{:X}, v{:X}", x, y),
            Instruction::Xor(x, y) => write!(f, "xor v{:X}, v{:X}", x, y),
            Instruction::Add(x, y) => write!(f, "add v{:X}, v{:X}", x, y),
            Instruction::Sub(x, y) => write!(f, "sub v{:X}, v{:X}", x, y),
            Instruction::ShiftRight(x) => write!(f, "shr v{:X}", x),
            Instruction::SubReverse(x, y) => write!(f, "rsb v{:X}, v{:X}", x, y),
            Instruction::ShiftLeft(x) => write!(f, "shl v{:X}", x),
            Instruction::SkipIfNotEquals(x, y) => write!(f, "skne v{:X}, v{:X}", x, y),
            Instruction::SetIndex(nnn) => write!(f, "mvi {:#05X}", nnn),
            Instruction::JumpWithOffset(nnn) => write!(f, "jmi {:#05X}", nnn),
            Instruction::GenerateRandom(x, nn) => write!(f, "rand v{:X}, {:#04X}", x, nn),
            Instruction::Draw(x, y, n) => write!(f, "sprite v{:X}, v{:X}, {}", x, y, n),
            Instruction::SkipIfKeyDown(x) => write!(f, "skpr v{:X}", x),
            Instruction::SkipIfKeyNotDown(x) => write!(f, "skup v{:X}", x),
            Instruction::GetDelayTimer(x) => write!(f, "gdelay v{:X}", x),
            Instruction::WaitForKey(x) => write!(f, "key v{:X}", x),
            Instruction::SetDelayTimer(x) => write!(f, "sdelay v{:X}", x),
            Instruction::SetSoundTimer(x) => write!(f, "ssound v{:X}", x),
            Instruction::AddToIndex(x) => write!(f, "adi v{:X}", x),
            Instruction::SetIndexToHexChar(x) => write!(f, "font v{:X}", x),
            Instruction::StoreBinaryCodedDecimal(x) => write!(f, "bcd v{:X}", x),
            Instruction::Store(x) => write!(f, "str v0-v{:X}", x),
            Instruction::Load(x) => write!(f, "ldr v0-v{:X}", x),
            Instruction::Unknown(bits) => write!(f, "dw {:#06X}", bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bits: u16) -> Instruction {
        InstructionParameters::from(bits).decode()
    }

    #[test]
    fn parameters_split_instruction_word() {
        let params = InstructionParameters::from_bytes(0xD1, 0x25);
        assert_eq!(params.bits, 0xD125);
        assert_eq!(params.op, 0xD);
        assert_eq!(params.x, 0x1);
        assert_eq!(params.y, 0x2);
        assert_eq!(params.n, 0x5);
        assert_eq!(params.nn, 0x25);
        assert_eq!(params.nnn, 0x125);
    }

    #[test]
    fn decodes_system_family() {
        assert_eq!(decode(0x00E0), Instruction::ClearScreen);
        assert_eq!(decode(0x00EE), Instruction::SubroutineReturn);
        assert_eq!(decode(0x0123), Instruction::MachineCall(0x123));
    }

    #[test]
    fn decodes_arithmetic_family() {
        assert_eq!(decode(0x8AB4), Instruction::Add(0xA, 0xB));
        assert_eq!(decode(0x8AB5), Instruction::Sub(0xA, 0xB));
        assert_eq!(decode(0x8AB6), Instruction::ShiftRight(0xA));
        assert_eq!(decode(0x8AB7), Instruction::SubReverse(0xA, 0xB));
        assert_eq!(decode(0x8ABE), Instruction::ShiftLeft(0xA));
        assert_eq!(decode(0x8AB8), Instruction::Unknown(0x8AB8));
    }

    #[test]
    fn decodes_misc_family() {
        assert_eq!(decode(0xE39E), Instruction::SkipIfKeyDown(3));
        assert_eq!(decode(0xE3A1), Instruction::SkipIfKeyNotDown(3));
        assert_eq!(decode(0xE3A2), Instruction::Unknown(0xE3A2));
        assert_eq!(decode(0xF20A), Instruction::WaitForKey(2));
        assert_eq!(decode(0xF233), Instruction::StoreBinaryCodedDecimal(2));
        assert_eq!(decode(0xF275), Instruction::Unknown(0xF275));
    }

    #[test]
    fn every_word_decodes() {
        for bits in 0..=u16::MAX {
            decode(bits);
        }
    }

    #[test]
    fn mnemonics() {
        assert_eq!(decode(0x00E0).to_string(), "cls");
        assert_eq!(decode(0x12A0).to_string(), "jmp 0x2A0");
        assert_eq!(decode(0x7301).to_string(), "add v3, 0x01");
        assert_eq!(decode(0xD015).to_string(), "sprite v0, v1, 5");
        assert_eq!(decode(0xFF65).to_string(), "ldr v0-vF");
    }
}
