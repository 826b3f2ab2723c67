use super::{
    disp::Display,
    input::Keypad,
    instruct::{Instruction, InstructionParameters},
    mem::{
        self, Memory, MemoryMut, MemoryRef, FONT_CHAR_DATA_SIZE, FONT_STARTING_ADDRESS,
        MEMORY_SIZE, PROGRAM_STARTING_ADDRESS,
    },
    rom::{self, RomError},
    trace::{InstructionTrace, MachineSnapshot, Tracer},
};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use std::{error::Error, fmt};

pub const VFLAG: usize = 15;
pub const STACK_SIZE: usize = 16;

// Conditions CHIP-8 leaves undefined that we refuse to run past
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineFault {
    StackOverflow { pc: u16 },
    StackUnderflow { pc: u16 },
    ProgramCounterOutOfBounds { pc: u16 },
    MisalignedProgramCounter { pc: u16, target: u16 },
}

impl fmt::Display for MachineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MachineFault::StackOverflow { pc } => {
                write!(f, "stack overflow calling subroutine at {:#05X}", pc)
            }
            MachineFault::StackUnderflow { pc } => {
                write!(f, "stack underflow returning from subroutine at {:#05X}", pc)
            }
            MachineFault::ProgramCounterOutOfBounds { pc } => {
                write!(f, "program counter {:#06X} is outside of memory", pc)
            }
            MachineFault::MisalignedProgramCounter { pc, target } => write!(
                f,
                "instruction at {:#05X} transfers control to odd address {:#05X}",
                pc, target
            ),
        }
    }
}

impl Error for MachineFault {}

pub struct Interpreter {
    pub memory: Memory,
    pub registers: [u8; 16],
    pub index: u16,
    pub pc: u16,

    // sp is incremented before a push and decremented after a pop so stack[0] is never written
    pub stack: [u16; STACK_SIZE],
    pub sp: u8,

    pub delay_timer: u8,
    pub sound_timer: u8,

    pub display: Display,
    pub keypad: Keypad,

    // set whenever the display changes, the host clears it once it has rendered
    pub draw_flag: bool,

    // set while a wait for key instruction is blocking
    pub waiting_for_key: bool,

    // raised for the tick in which the sound timer was nonzero
    pub tone: bool,

    rng: StdRng,
    seed: Option<u64>,
    tracer: Option<Box<dyn Tracer + Send>>,
}

impl Interpreter {
    pub fn new(seed: Option<u64>) -> Self {
        let mut interpreter = Interpreter {
            memory: mem::alloc(),
            registers: [0; 16],
            index: 0,
            pc: PROGRAM_STARTING_ADDRESS,
            stack: [0; STACK_SIZE],
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            display: Display::default(),
            keypad: Keypad::default(),
            draw_flag: false,
            waiting_for_key: false,
            tone: false,
            rng: Self::rng(seed),
            seed,
            tracer: None,
        };
        interpreter.reset();
        interpreter
    }

    fn rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn set_tracer(&mut self, tracer: Option<Box<dyn Tracer + Send>>) {
        self.tracer = tracer;
    }

    pub fn is_tracing(&self) -> bool {
        self.tracer.is_some()
    }

    // zero the machine and reinstall the font, the tracer survives a reset
    pub fn reset(&mut self) {
        self.memory = mem::alloc();
        self.registers = [0; 16];
        self.index = 0;
        self.pc = PROGRAM_STARTING_ADDRESS;
        self.stack = [0; STACK_SIZE];
        self.sp = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.display.clear();
        self.keypad = Keypad::default();
        self.draw_flag = false;
        self.waiting_for_key = false;
        self.tone = false;
        self.rng = Self::rng(self.seed);

        log::debug!("interpreter reset");
    }

    // copy a ROM into program memory, memory is untouched if the ROM does not fit
    pub fn load(&mut self, rom: &[u8]) -> Result<(), RomError> {
        rom::check_size(rom)?;
        self.memory.import(rom, PROGRAM_STARTING_ADDRESS);

        log::info!("loaded {}B ROM at {:#05X}", rom.len(), PROGRAM_STARTING_ADDRESS);
        Ok(())
    }

    pub fn take_draw_flag(&mut self) -> bool {
        std::mem::take(&mut self.draw_flag)
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            pc: self.pc,
            index: self.index,
            sp: self.sp,
            registers: self.registers,
            delay_timer: self.delay_timer,
            sound_timer: self.sound_timer,
            waiting_for_key: self.waiting_for_key,
            tone: self.tone,
        }
    }

    pub fn fetch(&self) -> Result<InstructionParameters, MachineFault> {
        if self.pc as usize + 1 >= MEMORY_SIZE {
            return Err(MachineFault::ProgramCounterOutOfBounds { pc: self.pc });
        }

        let pc = self.pc as usize;
        Ok(InstructionParameters::from_bytes(
            self.memory[pc],
            self.memory[pc + 1],
        ))
    }

    // one fetch, decode and execute followed by one timer decrement
    // on a fault the program counter is left on the faulting instruction and nothing else changes
    pub fn step(&mut self) -> Result<(), MachineFault> {
        self.tone = false;

        let prior_pc = self.pc;
        let params = self.fetch()?;
        let instruction = params.decode();

        if let Some(tracer) = self.tracer.as_mut() {
            tracer.on_instruction(&InstructionTrace {
                address: prior_pc,
                bits: params.bits,
                instruction,
                index: self.index,
                sp: self.sp,
                registers: self.registers,
            });
        }

        self.pc = prior_pc + 2;

        if let Err(fault) = self.exec(instruction) {
            self.pc = prior_pc;
            log::error!("{} while executing {}", fault, params);
            return Err(fault);
        }

        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }

        if self.sound_timer > 0 {
            self.sound_timer -= 1;
            self.tone = true;
        }

        if self.tracer.is_some() {
            let snapshot = self.snapshot();
            if let Some(tracer) = self.tracer.as_mut() {
                tracer.on_tick(&snapshot);
            }
        }

        Ok(())
    }

    fn check_alignment(&self, target: u16) -> Result<u16, MachineFault> {
        if target % 2 == 0 {
            Ok(target)
        } else {
            Err(MachineFault::MisalignedProgramCounter {
                pc: self.pc - 2,
                target,
            })
        }
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc += 2;
        }
    }

    fn exec(&mut self, inst: Instruction) -> Result<(), MachineFault> {
        match inst {
            Instruction::ClearScreen => {
                self.display.clear();
                self.draw_flag = true;
            }

            Instruction::SubroutineReturn => {
                if self.sp == 0 {
                    return Err(MachineFault::StackUnderflow { pc: self.pc - 2 });
                }

                let address = self.check_alignment(self.stack[self.sp as usize])?;
                self.pc = address;
                self.sp -= 1;
            }

            // COSMAC VIP machine code routines are not emulated
            Instruction::MachineCall(_) | Instruction::Unknown(_) => (),

            Instruction::Jump(address) => self.pc = self.check_alignment(address)?,

            Instruction::CallSubroutine(address) => {
                if self.sp as usize + 1 >= STACK_SIZE {
                    return Err(MachineFault::StackOverflow { pc: self.pc - 2 });
                }

                let address = self.check_alignment(address)?;
                self.sp += 1;
                self.stack[self.sp as usize] = self.pc;
                self.pc = address;
            }

            Instruction::SkipIfEqualsConstant(vx, value) => {
                self.skip_if(self.registers[vx as usize] == value)
            }

            Instruction::SkipIfNotEqualsConstant(vx, value) => {
                self.skip_if(self.registers[vx as usize] != value)
            }

            Instruction::SkipIfEquals(vx, vy) => {
                self.skip_if(self.registers[vx as usize] == self.registers[vy as usize])
            }

            Instruction::SetConstant(vx, value) => self.registers[vx as usize] = value,

            Instruction::AddConstant(vx, value) => {
                self.registers[vx as usize] = self.registers[vx as usize].wrapping_add(value)
            }

            Instruction::Set(vx, vy) => self.registers[vx as usize] = self.registers[vy as usize],

            Instruction::Or(vx, vy) => self.registers[vx as usize] |= self.registers[vy as usize],

            Instruction::And(vx, vy) => self.registers[vx as usize] &= self.registers[vy as usize],

            Instruction::Xor(vx, vy) => self.registers[vx as usize] ^= self.registers[vy as usize],

            Instruction::Add(vx, vy) => {
                // carry comes from the untruncated sum
                let sum = self.registers[vx as usize] as u16 + self.registers[vy as usize] as u16;
                self.registers[vx as usize] = (sum % 0x100) as u8;
                self.registers[VFLAG] = (sum > 0xFF) as u8;
            }

            Instruction::Sub(vx, vy) => {
                self.registers[VFLAG] =
                    (self.registers[vx as usize] >= self.registers[vy as usize]) as u8;
                self.registers[vx as usize] =
                    self.registers[vx as usize].wrapping_sub(self.registers[vy as usize]);
            }

            Instruction::SubReverse(vx, vy) => {
                self.registers[VFLAG] =
                    (self.registers[vy as usize] >= self.registers[vx as usize]) as u8;
                self.registers[vx as usize] =
                    self.registers[vy as usize].wrapping_sub(self.registers[vx as usize]);
            }

            Instruction::ShiftRight(vx) => {
                self.registers[VFLAG] = self.registers[vx as usize] & 1;
                self.registers[vx as usize] >>= 1;
            }

            Instruction::ShiftLeft(vx) => {
                self.registers[VFLAG] = self.registers[vx as usize] >> 7 & 1;
                self.registers[vx as usize] <<= 1;
            }

            Instruction::SkipIfNotEquals(vx, vy) => {
                self.skip_if(self.registers[vx as usize] != self.registers[vy as usize])
            }

            Instruction::SetIndex(address) => self.index = address,

            Instruction::JumpWithOffset(address) => {
                self.pc = self.check_alignment(address + self.registers[0] as u16)?
            }

            Instruction::GenerateRandom(vx, mask) => {
                self.registers[vx as usize] = self.rng.next_u32() as u8 & mask;
            }

            Instruction::Draw(vx, vy, height) => {
                let mut sprite = [0; 16];
                let sprite = &mut sprite[..height as usize];
                self.memory.export(self.index, sprite);

                self.registers[VFLAG] = self.display.draw(
                    sprite,
                    self.registers[vx as usize],
                    self.registers[vy as usize],
                ) as u8;
                self.draw_flag = true;
            }

            Instruction::SkipIfKeyDown(vx) => {
                self.skip_if(self.keypad.is_pressed(self.registers[vx as usize]))
            }

            Instruction::SkipIfKeyNotDown(vx) => {
                self.skip_if(!self.keypad.is_pressed(self.registers[vx as usize]))
            }

            Instruction::GetDelayTimer(vx) => self.registers[vx as usize] = self.delay_timer,

            Instruction::WaitForKey(vx) => match self.keypad.lowest_pressed() {
                Some(code) => {
                    self.registers[vx as usize] = code;
                    self.waiting_for_key = false;
                }
                None => {
                    // run this instruction again next tick
                    self.waiting_for_key = true;
                    self.pc -= 2;
                }
            },

            Instruction::SetDelayTimer(vx) => self.delay_timer = self.registers[vx as usize],

            Instruction::SetSoundTimer(vx) => self.sound_timer = self.registers[vx as usize],

            Instruction::AddToIndex(vx) => {
                self.index = self.index.wrapping_add(self.registers[vx as usize] as u16)
            }

            Instruction::SetIndexToHexChar(vx) => {
                self.index = FONT_STARTING_ADDRESS
                    + FONT_CHAR_DATA_SIZE as u16 * self.registers[vx as usize] as u16;
            }

            Instruction::StoreBinaryCodedDecimal(vx) => {
                let value = self.registers[vx as usize];
                self.memory
                    .import(&[value / 100, value / 10 % 10, value % 10], self.index);
            }

            Instruction::Store(vx) => {
                self.memory
                    .import(&self.registers[..=vx as usize], self.index);
                self.index = self.index.wrapping_add(vx as u16 + 1);
            }

            Instruction::Load(vx) => {
                self.memory
                    .export(self.index, &mut self.registers[..=vx as usize]);
                self.index = self.index.wrapping_add(vx as u16 + 1);
            }
        }

        Ok(())
    }

    // the next instruction with its address wrapped into memory, for display only
    pub fn peek(&self) -> InstructionParameters {
        let mut bytes = [0; 2];
        self.memory.export(self.pc, &mut bytes);
        InstructionParameters::from_bytes(bytes[0], bytes[1])
    }
}
