use super::{
    input::Key,
    interp::MachineFault,
    rom::{Rom, RomError},
    vm::{VMEvent, VM},
};

use crate::{
    config::{VMConfig, GOOD_TICK_FREQUENCY_DIFF, OKAY_TICK_FREQUENCY_DIFF},
    render::spawn_render_thread,
    util::{Interval, IntervalAccuracy},
};

use anyhow::{anyhow, Context, Result};
use crossterm::{
    event::{
        poll, read, Event, KeyCode as CrosstermKey, KeyEventKind,
        KeyModifiers as CrosstermKeyModifiers,
    },
    style::Stylize,
};
use device_query::DeviceQuery;

use std::{
    collections::HashSet,
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

pub type VMLock = Arc<Mutex<VM>>;

pub type RunControlResult = Result<(), &'static str>;

pub fn spawn_run_threads(
    rom: &Rom,
    config: VMConfig,
) -> Result<(JoinHandle<Result<RunAnalytics>>, JoinHandle<()>)> {
    // runner
    let mut runner = Runner::spawn(rom, &config)?;

    // render
    let (render_sender, render_thread) =
        spawn_render_thread(runner.vm(), runner.running(), config.clone());

    // main thread
    let vm_event_sender = runner.vm_event_sender();

    let main_thread = thread::spawn(move || -> Result<RunAnalytics> {
        let device_state = device_query::DeviceState::new();
        let mut last_keys = HashSet::new();

        // debug runs start paused
        if !config.debugging {
            runner.resume().map_err(|e| anyhow!(e))?;
        }

        loop {
            // event loop
            let terminal_event_received =
                poll(Duration::from_millis(15)).context("Unable to poll for terminal events")?;

            if runner.is_finished() {
                return runner.exit();
            }

            if terminal_event_received {
                let event = read().context("Unable to read terminal event")?;

                match event {
                    Event::Resize(_, _) => {
                        render_sender.send(()).ok();
                    }
                    Event::FocusGained => {
                        vm_event_sender.send(VMEvent::Focus)?;
                    }
                    Event::FocusLost => {
                        vm_event_sender.send(VMEvent::Unfocus)?;
                    }
                    Event::Key(key_event) => {
                        // Esc or Ctrl+C exits
                        if key_event.code == CrosstermKey::Esc
                            || key_event.modifiers.contains(CrosstermKeyModifiers::CONTROL)
                                && (key_event.code == CrosstermKey::Char('c')
                                    || key_event.code == CrosstermKey::Char('C'))
                        {
                            return runner.exit();
                        }

                        if let KeyEventKind::Repeat | KeyEventKind::Press = key_event.kind {
                            match key_event.code {
                                CrosstermKey::Enter | CrosstermKey::Char(' ')
                                    if config.debugging =>
                                {
                                    runner.step_once().map_err(|e| anyhow!(e))?;
                                }
                                CrosstermKey::Char('p') | CrosstermKey::Char('P')
                                    if config.debugging =>
                                {
                                    let toggled = if runner.is_running() {
                                        runner.pause()
                                    } else {
                                        runner.resume()
                                    };
                                    toggled.map_err(|e| anyhow!(e))?;
                                }
                                code => {
                                    // a terminal key event means the terminal has focus
                                    if let Ok(key) = Key::try_from(code) {
                                        vm_event_sender.send(VMEvent::FocusingKeyDown(key))?;
                                    }
                                }
                            }
                        }
                    }
                    _ => (),
                };
            }

            // execute device query step
            let keys = HashSet::from_iter(
                device_state
                    .get_keys()
                    .into_iter()
                    .filter_map(|keycode| Key::try_from(keycode).ok()),
            );

            for &key in keys.difference(&last_keys) {
                vm_event_sender.send(VMEvent::KeyDown(key))?;
            }

            for &key in last_keys.difference(&keys) {
                vm_event_sender.send(VMEvent::KeyUp(key))?;
            }

            last_keys = keys;

            if config.logging {
                render_sender.send(()).ok();
            }
        }
    });

    Ok((main_thread, render_thread))
}

pub enum RunSignal {
    Continue(bool),
    Step,
}

// Owns the thread that ticks the VM at the target frequency
pub struct Runner {
    vm: VMLock,
    running: Arc<AtomicBool>,

    thread_handle: JoinHandle<RunAnalytics>,
    thread_signal_sender: Sender<RunSignal>,

    vm_event_sender: Sender<VMEvent>,
}

impl Runner {
    pub fn vm(&self) -> VMLock {
        Arc::clone(&self.vm)
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn vm_event_sender(&self) -> Sender<VMEvent> {
        self.vm_event_sender.clone()
    }

    pub fn pause(&mut self) -> RunControlResult {
        self.send_signal(RunSignal::Continue(false))
    }

    pub fn resume(&mut self) -> RunControlResult {
        self.send_signal(RunSignal::Continue(true))
    }

    // a single tick while paused
    pub fn step_once(&mut self) -> RunControlResult {
        self.send_signal(RunSignal::Step)
    }

    pub fn is_finished(&self) -> bool {
        self.thread_handle.is_finished()
    }

    pub fn spawn(rom: &Rom, config: &VMConfig) -> Result<Self, RomError> {
        let (vm_event_sender, vm_event_receiver) = channel::<VMEvent>();
        let (thread_signal_sender, thread_signal_receiver) = channel::<RunSignal>();

        let vm = Arc::new(Mutex::new(VM::new(rom, config, vm_event_receiver)?));
        let running = Arc::new(AtomicBool::new(false));

        let frequency = config.tick_frequency.max(1);
        let debugging = config.debugging;
        let rom_name = rom.name.clone();

        let thread_handle = {
            let vm = Arc::clone(&vm);
            let running = Arc::clone(&running);

            thread::spawn(move || -> RunAnalytics {
                let mut interval = Interval::from_frequency(
                    "runner",
                    frequency,
                    Duration::from_millis(8),
                    IntervalAccuracy::High,
                );

                let mut continuation = RunContinuation {
                    cont: false,
                    steps: 0,
                    disconnected: false,
                    recv: thread_signal_receiver,
                };

                let mut analytics = RunAnalytics {
                    rom_name,
                    frequency,
                    ticks: 0,
                    runtime: Duration::ZERO,
                    fault: None,
                };

                let mut burst_start: Option<Instant> = None;

                loop {
                    continuation.poll();

                    let stepping = continuation.cont || continuation.take_step();

                    if stepping {
                        // a burst is timed from the start of its first tick
                        if continuation.cont && burst_start.is_none() {
                            burst_start = Some(Instant::now());
                            running.store(true, Ordering::Relaxed);
                        }

                        let result = match vm.lock() {
                            Ok(mut vm) => vm.step(),
                            Err(_) => {
                                log::error!("virtual machine lock poisoned, stopping runner");
                                break;
                            }
                        };

                        match result {
                            Ok(()) => {
                                analytics.ticks += 1;
                            }
                            Err(fault) => {
                                analytics.fault = Some(fault);
                                continuation.cont = false;
                                continuation.steps = 0;

                                // a debug run stays up so the faulted state can be inspected
                                if !debugging {
                                    break;
                                }
                            }
                        }

                        if continuation.cont {
                            interval.sleep();
                            continue;
                        }
                    }

                    if let Some(start) = burst_start.take() {
                        analytics.runtime = analytics.runtime.saturating_add(start.elapsed());
                        running.store(false, Ordering::Relaxed);
                    }

                    // yield until we can continue or must exit
                    if !continuation.wait() {
                        break;
                    }

                    interval.reset();
                }

                if let Some(start) = burst_start {
                    analytics.runtime = analytics.runtime.saturating_add(start.elapsed());
                }
                running.store(false, Ordering::Relaxed);

                analytics
            })
        };

        Ok(Runner {
            vm,
            running,
            thread_handle,
            thread_signal_sender,
            vm_event_sender,
        })
    }

    pub fn exit(self) -> Result<RunAnalytics> {
        let Runner {
            thread_signal_sender,
            thread_handle,
            ..
        } = self;
        // runner thread exits once it sees the only sender was dropped
        drop(thread_signal_sender);
        thread_handle
            .join()
            .map_err(|_| anyhow!("Runner thread panicked"))
    }

    fn send_signal(&mut self, signal: RunSignal) -> RunControlResult {
        if self.is_finished() {
            return Err("VM has already exited");
        }
        self.thread_signal_sender
            .send(signal)
            .map_err(|_| "Unable to send VM run signal")
    }
}

struct RunContinuation {
    cont: bool,
    steps: u32,
    disconnected: bool,
    recv: Receiver<RunSignal>,
}

impl RunContinuation {
    fn apply(&mut self, signal: RunSignal) {
        match signal {
            RunSignal::Continue(cont) => self.cont = cont,
            RunSignal::Step => self.steps += 1,
        }
    }

    fn poll(&mut self) {
        loop {
            match self.recv.try_recv() {
                Ok(signal) => self.apply(signal),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.cont = false;
                    self.disconnected = true;
                    break;
                }
            }
        }
    }

    fn take_step(&mut self) -> bool {
        if self.steps > 0 {
            self.steps -= 1;
            true
        } else {
            false
        }
    }

    // blocks in 30ms slices until there is work, false once the runner must exit
    fn wait(&mut self) -> bool {
        loop {
            self.poll();
            if self.disconnected {
                return false;
            }
            if self.cont || self.steps > 0 {
                return true;
            }

            match self.recv.recv_timeout(Duration::from_millis(30)) {
                Ok(signal) => self.apply(signal),
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => {
                    self.cont = false;
                    self.disconnected = true;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct RunAnalytics {
    pub rom_name: String,
    pub frequency: u32,
    pub ticks: u64,
    pub runtime: Duration,
    pub fault: Option<MachineFault>,
}

impl Display for RunAnalytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} \"{}\" runtime",
            "Analyzing".green().bold(),
            self.rom_name
        )?;

        let hz = self.ticks as f64 / self.runtime.as_secs_f64();

        writeln!(
            f,
            "\n    {} Runner ({:#04}Hz): {:.3}s, {} ticks",
            "|".blue().bold(),
            self.frequency,
            self.runtime.as_secs_f64(),
            self.ticks
        )?;
        write!(
            f,
            "    {} Runner continuously executed at {:#07.2}Hz",
            "=".blue().bold(),
            if hz.is_finite() { hz } else { 0.0 }
        )?;

        if hz.is_finite() {
            let hz_diff = (hz - self.frequency as f64) / self.frequency as f64 * 100.0;
            let color_hz_diff = if hz_diff.abs() > OKAY_TICK_FREQUENCY_DIFF {
                Stylize::red
            } else if hz_diff.abs() > GOOD_TICK_FREQUENCY_DIFF {
                Stylize::yellow
            } else {
                Stylize::green
            };

            write!(
                f,
                " ( {} from {:#04}Hz target )",
                color_hz_diff(format!(
                    "{}{:.2}%",
                    if hz_diff >= 0.0 { "+" } else { "" },
                    hz_diff
                ))
                .bold(),
                self.frequency
            )?;
        }

        if let Some(fault) = self.fault {
            write!(
                f,
                "\n    {} {}",
                "Halted".red().bold(),
                fault
            )?;
        }

        Ok(())
    }
}
