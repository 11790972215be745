//! CLI - reedline-based REPL interface
//!
//! Read-only inspection of the process model: modules, threads, registers,
//! memory map and cached memory.

use anyhow::Result;
use colored::Colorize;
use reedline::{Prompt, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal};
use std::borrow::Cow;

use crate::app::{parse_command, AppCommand, AppState};
use crate::core::RegisterRole;

/// Custom prompt for the navidbg CLI
pub struct NaviPrompt {
    /// Replay file or remote address being inspected
    source: Option<String>,
    /// Whether the model belongs to an attached process
    attached: bool,
}

impl NaviPrompt {
    pub fn new() -> Self {
        Self {
            source: None,
            attached: false,
        }
    }

    pub fn update(&mut self, state: &AppState) {
        self.source = state.source.clone();
        self.attached = state.process.is_attached();
    }
}

impl Default for NaviPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for NaviPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let status = if self.attached { "dbg" } else { "---" };
        let source = self.source.as_deref().unwrap_or("no target");
        Cow::Owned(format!("[{}:{}]", status, source))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("(search: {}{}) ", prefix, history_search.term))
    }
}

/// Print the help message
fn print_help() {
    println!("{}", "navidbg CLI Commands".bold().cyan());
    println!("{}", "═".repeat(50).cyan());

    println!("\n{}", "Process:".bold().yellow());
    println!("  {}          List loaded modules", "modules".green());
    println!("  {}          List threads", "threads".green());
    println!("  {}     Show registers (active thread by default)", "regs [tid]".green());
    println!("  {}             Show target information", "info".green());

    println!("\n{}", "Memory:".bold().yellow());
    println!("  {}               Show memory map", "dm".green());
    println!("  {}   Dump cached memory", "x <addr> [len]".green());

    println!("\n{}", "Sources:".bold().yellow());
    println!("  {}    Apply a recorded reply stream", "replay <file>".green());

    println!("\n{}", "Other:".bold().yellow());
    println!("  {}                Show this help", "?".green());
    println!("  {}                Quit", "q".green());
}

fn print_modules(state: &AppState) {
    let modules = state.process.modules();
    if modules.is_empty() {
        println!("    {}", "(no modules)".dimmed());
        return;
    }
    for module in modules {
        println!(
            "  {} - {}  {:<24} {}",
            module.base_address().to_string().green(),
            module.end_address(),
            module.name().bold(),
            module.path().dimmed()
        );
    }
}

fn print_threads(state: &AppState) {
    let threads = state.process.threads();
    if threads.is_empty() {
        println!("    {}", "(no threads)".dimmed());
        return;
    }
    let active = state.process.active_thread();
    for thread in threads {
        let marker = match &active {
            Some(a) if a.tid() == thread.tid() => "*".yellow(),
            _ => " ".normal(),
        };
        let address = thread
            .current_address()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".into());
        println!("{} {:>8}  {:<10} {}", marker, thread.tid(), thread.state(), address);
    }
}

fn print_registers(state: &AppState, tid: Option<u64>) {
    let thread = match tid {
        Some(tid) => state.process.thread(tid),
        None => state.process.active_thread(),
    };
    let Some(thread) = thread else {
        println!("{} No such thread", "[!]".red());
        return;
    };

    let registers = thread.registers();
    if registers.is_empty() {
        println!("    {}", "(no register values)".dimmed());
        return;
    }
    println!("[*] Registers of thread {}:", thread.tid());
    for register in registers.iter() {
        let role = match register.role() {
            RegisterRole::ProgramCounter => " (pc)".cyan(),
            RegisterRole::StackPointer => " (sp)".cyan(),
            RegisterRole::General => "".normal(),
        };
        println!(
            "    {:<8} = {:#x}{}",
            register.name().to_uppercase(),
            register.value(),
            role
        );
    }
}

fn print_memory_map(state: &AppState) {
    let map = state.process.memory_map();
    if map.is_empty() {
        println!("    {}", "(no memory map)".dimmed());
        return;
    }
    println!("[*] Memory Map:");
    for section in map.sections() {
        let owner = state
            .process
            .module_at(section.start())
            .map(|m| m.name().to_string())
            .unwrap_or_default();
        println!("    {}  {:>10} bytes  {}", section, section.size(), owner.dimmed());
    }
}

fn print_memory(state: &AppState, address: u64, length: usize) {
    let Some(data) = state.process.memory().data(address, length) else {
        println!("{} Memory at {:#x} is not cached", "[!]".red(), address);
        return;
    };
    for (i, chunk) in data.chunks(16).enumerate() {
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!(
            "  {:#010x}  {:<48} {}",
            address + (i * 16) as u64,
            chunk
                .iter()
                .map(|b| hex::encode([*b]))
                .collect::<Vec<_>>()
                .join(" "),
            ascii.dimmed()
        );
    }
}

fn print_info(state: &AppState) {
    println!(
        "[*] Source: {}  ({} replies)",
        state.source.as_deref().unwrap_or("none"),
        state.reply_count()
    );
    println!("[*] Attached: {}", state.process.is_attached());
    let Some(info) = state.process.target_information() else {
        println!("    {}", "(no target information)".dimmed());
        return;
    };
    let options = info.debugger_options();
    println!("[*] Address size: {} bits", info.address_size());
    println!("[*] Registers: {}", info.registers().len());
    let flags = [
        ("attach", options.can_attach()),
        ("detach", options.can_detach()),
        ("terminate", options.can_terminate()),
        ("halt", options.can_halt()),
        ("memmap", options.can_memmap()),
        ("validmemory", options.can_validate_memory()),
        ("multithread", options.can_multithread()),
        ("softwareBreakpoints", options.can_software_breakpoints()),
    ];
    for (name, enabled) in flags {
        let mark = if enabled { "yes".green() } else { "no".red() };
        println!("    {:<20} {}", name, mark);
    }
    for exception in options.exceptions() {
        println!(
            "    exception {:#010x} {:<24} {}",
            exception.code, exception.name, exception.action
        );
    }
}

/// Execute a parsed command; returns false when the REPL should stop.
fn execute_command(state: &mut AppState, cmd: AppCommand) -> bool {
    match cmd {
        AppCommand::Modules => print_modules(state),
        AppCommand::Threads => print_threads(state),
        AppCommand::Registers(tid) => print_registers(state, tid),
        AppCommand::MemoryMap => print_memory_map(state),
        AppCommand::Examine { address, length } => print_memory(state, address, length),
        AppCommand::Info => print_info(state),
        AppCommand::Replay(path) => match state.replay(&path) {
            Ok(session_state) => println!(
                "[*] Replayed {} replies, session {}",
                state.reply_count(),
                session_state
            ),
            Err(e) => println!("{} Replay failed: {}", "[!]".red(), e),
        },
        AppCommand::Help => print_help(),
        AppCommand::Quit => {
            println!("[*] Shutting down...");
            return false;
        }
        AppCommand::Unknown(input) => {
            println!("{} Unknown command: '{}'", "[!]".red(), input);
            println!("    Type '?' for help");
        }
    }
    true
}

/// Run the CLI REPL
pub fn run_cli(state: &mut AppState) -> Result<()> {
    let mut line_editor = Reedline::create();
    let mut prompt = NaviPrompt::new();

    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║  navidbg CLI - Type '?' for help, 'q' to quit                ║".cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝".cyan()
    );

    loop {
        prompt.update(state);
        let sig = line_editor.read_line(&prompt)?;
        match sig {
            Signal::Success(buffer) => {
                let input = buffer.trim();
                if input.is_empty() {
                    continue;
                }

                if !execute_command(state, parse_command(input)) {
                    break;
                }
            }
            Signal::CtrlD | Signal::CtrlC => {
                println!("\n[*] Interrupted");
                break;
            }
        }
    }

    Ok(())
}
