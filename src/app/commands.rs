//! Command processing
//!
//! Command language of the inspection REPL.

/// Application commands that can be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// List loaded modules
    Modules,
    /// List threads with state and instruction pointer
    Threads,
    /// Show registers of one thread, or of the active thread
    Registers(Option<u64>),
    /// Show the memory map
    MemoryMap,
    /// Hex dump of cached target memory
    Examine { address: u64, length: usize },
    /// Show target information and debugger capabilities
    Info,
    /// Apply a recorded reply stream from a file
    Replay(String),
    /// Show help
    Help,
    /// Quit application
    Quit,
    /// Unknown command
    Unknown(String),
}

/// Parse a command string into AppCommand
pub fn parse_command(input: &str) -> AppCommand {
    let input = input.trim();
    let mut parts = input.split_whitespace();
    let cmd = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match cmd {
        "modules" | "lm" => AppCommand::Modules,
        "threads" | "t" => AppCommand::Threads,
        "regs" | "dr" => match args.first() {
            None => AppCommand::Registers(None),
            Some(tid) => match tid.parse() {
                Ok(tid) => AppCommand::Registers(Some(tid)),
                Err(_) => AppCommand::Unknown(format!("Invalid thread id '{tid}'")),
            },
        },
        "dm" => AppCommand::MemoryMap,
        "x" => match (args.first().and_then(|a| parse_address(a)), args.get(1)) {
            (Some(address), Some(length)) => match length.parse() {
                Ok(length) => AppCommand::Examine { address, length },
                Err(_) => AppCommand::Unknown("x requires a decimal length".into()),
            },
            (Some(address), None) => AppCommand::Examine { address, length: 64 },
            (None, _) => AppCommand::Unknown("x requires an address".into()),
        },
        "info" | "i" => AppCommand::Info,
        "replay" => match args.first() {
            Some(path) => AppCommand::Replay(path.to_string()),
            None => AppCommand::Unknown("replay requires a path".into()),
        },
        "help" | "?" => AppCommand::Help,
        "quit" | "exit" | "q" => AppCommand::Quit,
        _ => AppCommand::Unknown(input.to_string()),
    }
}

/// Parse an address from hex or decimal string
pub fn parse_address(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_examine() {
        assert_eq!(
            parse_command("x 0x401000 16"),
            AppCommand::Examine { address: 0x401000, length: 16 }
        );
        assert_eq!(
            parse_command("x 4096"),
            AppCommand::Examine { address: 4096, length: 64 }
        );
        assert!(matches!(parse_command("x"), AppCommand::Unknown(_)));
    }

    #[test]
    fn parses_registers() {
        assert_eq!(parse_command("regs"), AppCommand::Registers(None));
        assert_eq!(parse_command("regs 1000"), AppCommand::Registers(Some(1000)));
        assert!(matches!(parse_command("regs abc"), AppCommand::Unknown(_)));
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("  modules "), AppCommand::Modules);
        assert_eq!(parse_command("dm"), AppCommand::MemoryMap);
        assert_eq!(parse_command("replay trace.bin"), AppCommand::Replay("trace.bin".into()));
        assert_eq!(parse_command("q"), AppCommand::Quit);
        assert_eq!(parse_command("frobnicate"), AppCommand::Unknown("frobnicate".into()));
    }
}
