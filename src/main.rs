mod cli;
mod config;
mod render;
mod run;
mod util;

use cli::{effective_log_level, Cli, CliCommand};
use config::VMConfig;
use run::{core::spawn_run_threads, interp::Interpreter, rom::Rom, vm::VM};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::style::Stylize;

use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run {
            path,
            debug,
            hz,
            seed,
            log,
            trace,
        } => {
            let level = effective_log_level(log, trace);
            if let Some(level) = level {
                tui_logger::init_logger(level.to_level_filter())
                    .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
                tui_logger::set_default_level(level.to_level_filter());
            }

            let rom = read_rom(&path)?;
            let config = VMConfig {
                title: format!("CHIP-8 Virtual Machine ({})", rom.name),
                tick_frequency: hz,
                debugging: debug,
                logging: level.is_some(),
                tracing: trace,
                seed,
            };

            // leave the terminal usable if any thread panics while the interface is up
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                if let Err(e) = render::panic_cleanup_terminal() {
                    eprintln!("Failed to cleanup terminal: {}", e);
                }
                default_panic(info);
            }));

            let (main_thread, render_thread) = spawn_run_threads(&rom, config)?;

            let analytics = main_thread
                .join()
                .map_err(|_| anyhow!("Main thread panicked"))?;

            // the render thread restores the terminal once its sender is dropped with the main thread
            render_thread
                .join()
                .map_err(|_| anyhow!("Render thread panicked"))?;

            println!("{}", analytics?);
        }

        CliCommand::Headless {
            path,
            ticks,
            seed,
            log,
            trace,
        } => {
            if let Some(level) = effective_log_level(log, trace) {
                simple_logger::init_with_level(level.to_level())
                    .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
            }

            let rom = read_rom(&path)?;
            let config = VMConfig {
                title: rom.name.clone(),
                tracing: trace,
                seed,
                ..Default::default()
            };

            run_headless(&rom, &config, ticks)?;
        }
    }

    Ok(())
}

fn read_rom(path: &Path) -> Result<Rom> {
    Rom::read(path).with_context(|| format!("Failed to load ROM \"{}\"", path.display()))
}

fn run_headless(rom: &Rom, config: &VMConfig, ticks: u64) -> Result<()> {
    let mut vm = VM::headless(rom, config)
        .with_context(|| format!("Failed to start \"{}\"", rom.name))?;

    let mut result = Ok(());
    for _ in 0..ticks {
        result = vm.step();
        if result.is_err() {
            break;
        }
    }

    println!(
        "{} \"{}\" for {} ticks",
        "Executed".green().bold(),
        rom.name,
        vm.ticks()
    );
    println!("{}", vm.interpreter().display);
    print_machine_state(vm.interpreter());

    result.map_err(|fault| anyhow!(fault).context(format!("\"{}\" halted", rom.name)))
}

fn print_machine_state(interpreter: &Interpreter) {
    let snapshot = interpreter.snapshot();
    println!(
        "PC {:#05X}  I {:#05X}  SP {:X}  DT {:02X}  ST {:02X}",
        snapshot.pc, snapshot.index, snapshot.sp, snapshot.delay_timer, snapshot.sound_timer
    );
    for (half, registers) in snapshot.registers.chunks(8).enumerate() {
        let line: Vec<String> = registers
            .iter()
            .enumerate()
            .map(|(i, value)| format!("V{:X} {:02X}", half * 8 + i, value))
            .collect();
        println!("{}", line.join("  "));
    }
    println!("next {}", interpreter.peek().decode());
}
