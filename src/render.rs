use crate::{
    config::{VMConfig, FRAME_FREQUENCY},
    run::{
        core::VMLock,
        disp::{Display, DisplayWidget, DISPLAY_HEIGHT, DISPLAY_WIDTH},
        instruct::Instruction,
        interp::MachineFault,
        trace::MachineSnapshot,
    },
    util::{Interval, IntervalAccuracy},
};

use anyhow::{anyhow, Context, Result};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use tui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use tui_logger::{TuiLoggerLevelOutput, TuiLoggerWidget};

use std::{
    io::{self, stdout},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Sender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

type Terminal = tui::Terminal<CrosstermBackend<io::Stdout>>;

// display plus its border
const DISPLAY_WINDOW_WIDTH: u16 = DISPLAY_WIDTH as u16 + 2;
const DISPLAY_WINDOW_HEIGHT: u16 = DISPLAY_HEIGHT as u16 / 2 + 2;

fn setup_terminal() -> Result<Terminal> {
    // alternate screen so the user keeps their terminal history
    // raw mode so we handle every key ourselves
    enable_raw_mode().context("Failed to enable terminal raw mode")?;

    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)
        .context("Failed to enter alternate terminal screen")?;

    tui::Terminal::new(CrosstermBackend::new(stdout))
        .context("Failed to create interface to terminal backend")
}

fn cleanup_terminal(terminal: &mut Terminal) -> Result<()> {
    // clean up the terminal so its usable after program exit
    disable_raw_mode().context("Failed to disable terminal raw mode")?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )
    .context("Failed to leave alternate terminal screen")?;
    terminal
        .show_cursor()
        .context("Failed to show terminal cursor")?;
    Ok(())
}

pub fn panic_cleanup_terminal() -> Result<()> {
    cleanup_terminal(
        &mut tui::Terminal::new(CrosstermBackend::new(stdout()))
            .context("Failed to create interface to terminal backend")?,
    )
}

pub fn spawn_render_thread(
    vm: VMLock,
    running: Arc<AtomicBool>,
    config: VMConfig,
) -> (Sender<()>, JoinHandle<()>) {
    let (render_sender, render_receiver) = channel::<()>();
    let render_thread_handle = thread::spawn(move || {
        let mut terminal = match setup_terminal() {
            Ok(terminal) => terminal,
            Err(e) => {
                log::error!("{:?}", e);
                return;
            }
        };

        let mut renderer = Renderer {
            config,
            display: Display::default(),
            drawn_ticks: 0,
            drawn_status: None,
        };

        let mut interval = Interval::from_frequency(
            "render",
            FRAME_FREQUENCY,
            Duration::from_millis(16),
            IntervalAccuracy::Default,
        );

        // the first frame is always drawn
        let mut should_redraw = true;

        loop {
            if render_receiver.try_iter().last().is_some() {
                should_redraw = true;
            }

            if let Err(TryRecvError::Disconnected) = render_receiver.try_recv() {
                break;
            }

            if let Err(e) = renderer.step(&mut terminal, should_redraw, &vm, &running) {
                log::error!("{:?}", e);
                break;
            }
            should_redraw = false;

            interval.sleep();
        }

        if let Err(e) = cleanup_terminal(&mut terminal) {
            eprintln!("Failed to cleanup terminal: {}", e);
        }
    });

    (render_sender, render_thread_handle)
}

// Everything a frame needs, copied out so the VM lock is not held while drawing
struct FrameState {
    snapshot: MachineSnapshot,
    next_instruction: Instruction,
    fault: Option<MachineFault>,
    running: bool,
}

impl FrameState {
    // everything the status line shows
    fn status(&self) -> (bool, bool, Option<MachineFault>, bool) {
        (
            self.snapshot.tone,
            self.snapshot.waiting_for_key,
            self.fault,
            self.running,
        )
    }
}

struct Renderer {
    config: VMConfig,
    display: Display,
    drawn_ticks: u64,
    drawn_status: Option<(bool, bool, Option<MachineFault>, bool)>,
}

impl Renderer {
    fn step(
        &mut self,
        terminal: &mut Terminal,
        should_redraw: bool,
        vm: &VMLock,
        running: &AtomicBool,
    ) -> Result<()> {
        let mut vm = vm
            .lock()
            .map_err(|_| anyhow!("Failed to lock VM for render step"))?;

        let new_display = vm.extract_new_display();
        let ticks = vm.ticks();

        let interpreter = vm.interpreter();
        let state = FrameState {
            snapshot: interpreter.snapshot(),
            next_instruction: interpreter.peek().decode(),
            fault: vm.fault(),
            running: running.load(Ordering::Relaxed),
        };
        drop(vm);

        // the debug panel follows every tick, the display only follows the draw flag
        let status = state.status();
        let status_changed = self.drawn_status != Some(status)
            || self.config.debugging && self.drawn_ticks != ticks;

        if !(should_redraw || new_display.is_some() || status_changed) {
            return Ok(());
        }

        if let Some(display) = new_display {
            self.display = display;
        }

        self.drawn_ticks = ticks;
        self.drawn_status = Some(status);

        terminal.draw(|f| self.render(f, &state))?;
        Ok(())
    }

    fn render<B: Backend>(&self, f: &mut Frame<B>, state: &FrameState) {
        let area = f.size();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(area.height.saturating_sub(1)),
                Constraint::Length(1),
            ])
            .split(area);
        let (area, bottom_area) = (chunks[0], chunks[1]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(DISPLAY_WINDOW_WIDTH),
                Constraint::Length(area.width.saturating_sub(DISPLAY_WINDOW_WIDTH)),
            ])
            .split(area);
        let (vm_column, side_column) = (columns[0], columns[1]);

        let debug_height = if self.config.debugging { 6 } else { 0 };
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(DISPLAY_WINDOW_HEIGHT),
                Constraint::Length(1),
                Constraint::Length(debug_height),
                Constraint::Length(
                    area.height
                        .saturating_sub(DISPLAY_WINDOW_HEIGHT + 1 + debug_height),
                ),
            ])
            .split(vm_column);

        let display_block = Block::default()
            .title(format!(" {} ({}Hz) ", self.config.title, self.config.tick_frequency))
            .borders(Borders::ALL);
        f.render_widget(
            DisplayWidget {
                display: &self.display,
                foreground: Color::White,
                background: Color::Black,
            },
            display_block.inner(rows[0]),
        );
        f.render_widget(display_block, rows[0]);

        f.render_widget(Paragraph::new(self.status_line(state)), rows[1]);

        if self.config.debugging {
            f.render_widget(debug_panel(state), rows[2]);
        }

        if self.config.logging {
            // the log goes wherever there is more room
            let logger_area = if side_column.area() >= rows[3].area() {
                side_column
            } else {
                rows[3]
            };
            f.render_widget(logger_widget(Borders::ALL), logger_area);
        }

        let bottom_area_style = Style::default().bg(Color::White).fg(Color::Black);
        f.render_widget(
            Paragraph::new(if self.config.debugging {
                " Enter/Space to step, P to pause or resume, Esc or Ctrl+C to exit"
            } else {
                " Esc or Ctrl+C to exit"
            })
            .style(bottom_area_style),
            bottom_area,
        );
    }

    fn status_line(&self, state: &FrameState) -> Spans<'static> {
        let mut spans = vec![Span::raw(" ")];

        if state.snapshot.tone {
            spans.push(Span::styled(
                "♪ BEEP ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ));
        }

        if state.snapshot.waiting_for_key {
            spans.push(Span::styled(
                "waiting for key ",
                Style::default().fg(Color::Cyan),
            ));
        }

        if let Some(fault) = state.fault {
            spans.push(Span::styled(
                format!("halted: {}", fault),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        } else if self.config.debugging {
            spans.push(if state.running {
                Span::styled("running", Style::default().fg(Color::Green))
            } else {
                Span::styled("paused", Style::default().fg(Color::Yellow))
            });
        }

        Spans::from(spans)
    }
}

fn debug_panel(state: &FrameState) -> Paragraph<'static> {
    let snapshot = &state.snapshot;
    let register_line = |range: std::ops::Range<usize>| {
        Spans::from(
            range
                .map(|i| format!("V{:X} {:02X}  ", i, snapshot.registers[i]))
                .collect::<String>(),
        )
    };

    Paragraph::new(vec![
        Spans::from(format!(
            "PC {:#05X}  I {:#05X}  SP {:X}  DT {:02X}  ST {:02X}",
            snapshot.pc, snapshot.index, snapshot.sp, snapshot.delay_timer, snapshot.sound_timer
        )),
        register_line(0..8),
        register_line(8..16),
        Spans::from(vec![
            Span::raw("next "),
            Span::styled(
                state.next_instruction.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
    ])
    .block(
        Block::default()
            .title(" Machine ")
            .borders(Borders::TOP.union(Borders::LEFT).union(Borders::RIGHT)),
    )
}

pub fn logger_widget(borders: Borders) -> TuiLoggerWidget<'static> {
    TuiLoggerWidget::default()
        .block(
            Block::default()
                .title(" Log ")
                .border_style(Style::default().fg(Color::White))
                .borders(borders),
        )
        .output_separator('|')
        .output_timestamp(Some("%H:%M:%S%.3f".to_string()))
        .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
        .output_target(false)
        .output_file(false)
        .output_line(false)
        .style_error(Style::default().fg(Color::Red))
        .style_debug(Style::default().fg(Color::Cyan))
        .style_warn(Style::default().fg(Color::Yellow))
        .style_trace(Style::default().fg(Color::White))
        .style_info(Style::default().fg(Color::Green))
}
