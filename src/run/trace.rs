use super::instruct::Instruction;

// Machine state captured before an instruction executes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionTrace {
    pub address: u16,
    pub bits: u16,
    pub instruction: Instruction,
    pub index: u16,
    pub sp: u8,
    pub registers: [u8; 16],
}

// Machine state captured at the end of a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineSnapshot {
    pub pc: u16,
    pub index: u16,
    pub sp: u8,
    pub registers: [u8; 16],
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub waiting_for_key: bool,
    pub tone: bool,
}

// Observer the interpreter calls once per decoded instruction and once per tick
pub trait Tracer {
    fn on_instruction(&mut self, trace: &InstructionTrace);
    fn on_tick(&mut self, snapshot: &MachineSnapshot);
}

// Writes every instruction and tick to the log at trace level
#[derive(Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn on_instruction(&mut self, trace: &InstructionTrace) {
        log::trace!(
            "{:#05X}: {:04X} {:<16} I = {:#05X} SP = {} V = {:02X?}",
            trace.address,
            trace.bits,
            trace.instruction.to_string(),
            trace.index,
            trace.sp,
            trace.registers
        );
    }

    fn on_tick(&mut self, snapshot: &MachineSnapshot) {
        log::trace!(
            "tick: PC = {:#05X} I = {:#05X} SP = {} DT = {} ST = {} waiting = {} tone = {}",
            snapshot.pc,
            snapshot.index,
            snapshot.sp,
            snapshot.delay_timer,
            snapshot.sound_timer,
            snapshot.waiting_for_key,
            snapshot.tone
        );
    }
}
