use super::{
    disp::Display,
    input::{Key, Keyboard},
    interp::{Interpreter, MachineFault},
    rom::{Rom, RomError},
    trace::LogTracer,
};

use crate::config::VMConfig;

use std::sync::mpsc::{channel, Receiver};

#[derive(Debug)]
pub enum VMEvent {
    KeyUp(Key),
    KeyDown(Key),
    Focus,
    Unfocus,
    FocusingKeyDown(Key),
}

// The interpreter together with the host state that feeds it
pub struct VM {
    interpreter: Interpreter,

    // Event receiver and queue
    event: Receiver<VMEvent>,
    event_queue: Vec<VMEvent>,

    keyboard: Keyboard,

    ticks: u64,
    fault: Option<MachineFault>,
}

impl VM {
    pub fn new(rom: &Rom, config: &VMConfig, recv: Receiver<VMEvent>) -> Result<Self, RomError> {
        let mut interpreter = Interpreter::new(config.seed);
        if config.tracing {
            interpreter.set_tracer(Some(Box::new(LogTracer)));
        }
        interpreter.load(&rom.data)?;

        log::info!(
            "virtual machine ready for \"{}\" (tracing {})",
            rom.name,
            if interpreter.is_tracing() { "on" } else { "off" }
        );

        Ok(VM {
            interpreter,
            event: recv,
            event_queue: Vec::new(),
            keyboard: Keyboard::default(),
            ticks: 0,
            fault: None,
        })
    }

    // A VM that never receives host events
    pub fn headless(rom: &Rom, config: &VMConfig) -> Result<Self, RomError> {
        let (_, recv) = channel();
        VM::new(rom, config, recv)
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn fault(&self) -> Option<MachineFault> {
        self.fault
    }

    pub fn queue_events(&mut self) {
        self.event_queue.extend(self.event.try_iter());
    }

    pub fn drain_event_queue(&mut self) {
        self.queue_events();
        for event in self.event_queue.drain(..) {
            log::debug!("Processing Event {:?}", event);
            match event {
                VMEvent::KeyUp(key) => self.keyboard.handle_key_up(key),
                VMEvent::KeyDown(key) => self.keyboard.handle_key_down(key),
                VMEvent::Focus => self.keyboard.handle_focus(),
                VMEvent::Unfocus => self.keyboard.handle_unfocus(),
                VMEvent::FocusingKeyDown(key) => self.keyboard.handle_focusing_key_down(key),
            }
        }
    }

    // A copy of the display if it changed since the last call
    pub fn extract_new_display(&mut self) -> Option<Display> {
        if self.interpreter.take_draw_flag() {
            Some(self.interpreter.display.clone())
        } else {
            None
        }
    }

    pub fn step(&mut self) -> Result<(), MachineFault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }

        self.drain_event_queue();

        // keypad state is whatever the keyboard held last before this tick
        self.keyboard.flush(&mut self.interpreter.keypad);

        if let Err(fault) = self.interpreter.step() {
            self.fault = Some(fault);
            return Err(fault);
        }

        self.ticks += 1;

        if self.interpreter.tone {
            log::info!("beep!");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn rom(data: &[u8]) -> Rom {
        Rom {
            name: "test".into(),
            data: data.to_vec(),
        }
    }

    fn config() -> VMConfig {
        VMConfig {
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn key_events_reach_the_keypad_before_the_tick() {
        let (sender, recv) = channel();
        // wait for key into V0
        let mut vm = VM::new(&rom(&[0xF0, 0x0A]), &config(), recv).unwrap();

        vm.step().unwrap();
        assert_eq!(vm.interpreter().pc, 0x200);

        sender.send(VMEvent::FocusingKeyDown(Key::W)).unwrap();
        vm.step().unwrap();
        assert_eq!(vm.interpreter().registers[0], 0x5);
        assert_eq!(vm.interpreter().pc, 0x202);
        assert_eq!(vm.ticks(), 2);
    }

    #[test]
    fn released_keys_are_cleared() {
        let (sender, recv) = channel();
        // skip if V0 (key 0) is not pressed
        let mut vm = VM::new(&rom(&[0xE0, 0xA1, 0x00, 0x00, 0xE0, 0xA1]), &config(), recv).unwrap();

        sender.send(VMEvent::FocusingKeyDown(Key::X)).unwrap();
        vm.step().unwrap();
        assert_eq!(vm.interpreter().pc, 0x202);

        sender.send(VMEvent::KeyUp(Key::X)).unwrap();
        vm.step().unwrap();
        vm.step().unwrap();
        assert_eq!(vm.interpreter().pc, 0x208);
    }

    #[test]
    fn new_display_is_extracted_once() {
        let mut vm = VM::headless(&rom(&[0x00, 0xE0]), &config()).unwrap();
        assert!(vm.extract_new_display().is_none());

        vm.step().unwrap();
        assert!(vm.extract_new_display().is_some());
        assert!(vm.extract_new_display().is_none());
    }

    #[test]
    fn fault_is_sticky() {
        let mut vm = VM::headless(&rom(&[0x00, 0xEE]), &config()).unwrap();
        let fault = MachineFault::StackUnderflow { pc: 0x200 };

        assert_eq!(vm.step(), Err(fault));
        assert_eq!(vm.step(), Err(fault));
        assert_eq!(vm.fault(), Some(fault));
        assert_eq!(vm.ticks(), 0);
    }

    #[test]
    fn oversized_rom_is_rejected() {
        let result = VM::headless(&rom(&[0; 4000]), &config());
        assert!(matches!(result, Err(RomError::RomTooLarge { .. })));
    }

    #[test]
    fn tracing_config_attaches_log_tracer() {
        let traced = VM::headless(
            &rom(&[0x60, 0x05]),
            &VMConfig {
                tracing: true,
                ..config()
            },
        )
        .unwrap();
        assert!(traced.interpreter().is_tracing());

        let untraced = VM::headless(&rom(&[0x60, 0x05]), &config()).unwrap();
        assert!(!untraced.interpreter().is_tracing());
    }

    #[test]
    fn traced_vm_still_executes() {
        let mut vm = VM::headless(
            &rom(&[0x60, 0x05, 0x70, 0x03]),
            &VMConfig {
                tracing: true,
                ..config()
            },
        )
        .unwrap();
        vm.step().unwrap();
        vm.step().unwrap();
        assert_eq!(vm.interpreter().registers[0], 8);
    }
}
