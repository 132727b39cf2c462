//! Recovery command-line flags.
//!
//! The same flags arrive from process arguments, the control block, or the
//! command file, so parsing tolerates junk: unknown tokens are set aside and
//! reported instead of failing the whole command.

use clap::Parser;

#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(
    name = "recovery",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
pub struct RecoveryFlags {
    /// Opaque message handed back to the main system.
    #[arg(long = "send_intent")]
    pub send_intent: Option<String>,
    /// `<VOLUME>:<path>` of the package to install.
    #[arg(long = "update_package")]
    pub update_package: Option<String>,
    /// Factory reset; implies `--wipe_cache`.
    #[arg(long = "wipe_data")]
    pub wipe_data: bool,
    #[arg(long = "wipe_cache")]
    pub wipe_cache: bool,
    /// Number of earlier recovery boots for this request.
    #[arg(long = "previous_runs")]
    pub previous_runs: Option<u32>,
}

const VALUE_FLAGS: [&str; 3] = ["send_intent", "update_package", "previous_runs"];
const SWITCH_FLAGS: [&str; 2] = ["wipe_data", "wipe_cache"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedOperation {
    InstallPackage(String),
    Wipe { data: bool, cache: bool },
    Nothing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFlags {
    pub flags: RecoveryFlags,
    /// Tokens that are not recovery flags.
    pub rejected: Vec<String>,
    /// Set when the remaining tokens still failed to parse.
    pub parse_error: Option<String>,
}

impl RecoveryFlags {
    /// Install wins over wipes when both are present.
    pub fn operation(&self) -> RequestedOperation {
        if let Some(package) = &self.update_package {
            return RequestedOperation::InstallPackage(package.clone());
        }
        if self.wipe_data || self.wipe_cache {
            return RequestedOperation::Wipe {
                data: self.wipe_data,
                cache: self.wipe_data || self.wipe_cache,
            };
        }
        RequestedOperation::Nothing
    }
}

/// Parses a full command line; position 0 is the program identity.
pub fn parse_recovery_flags<S: AsRef<str>>(command: &[S]) -> ParsedFlags {
    let Some((program, args)) = command.split_first() else {
        return ParsedFlags::default();
    };

    let mut accepted = vec![program.as_ref().to_string()];
    let mut rejected = Vec::new();
    let mut expecting_value = false;
    for token in args.iter().map(AsRef::as_ref) {
        if expecting_value && !token.starts_with("--") {
            accepted.push(token.to_string());
            expecting_value = false;
            continue;
        }
        expecting_value = false;

        match flag_name(token) {
            Some((name, has_inline_value)) if VALUE_FLAGS.contains(&name) => {
                expecting_value = !has_inline_value;
                accepted.push(token.to_string());
            }
            Some((name, false)) if SWITCH_FLAGS.contains(&name) => {
                accepted.push(token.to_string());
            }
            _ => rejected.push(token.to_string()),
        }
    }

    match RecoveryFlags::try_parse_from(&accepted) {
        Ok(flags) => ParsedFlags {
            flags,
            rejected,
            parse_error: None,
        },
        Err(err) => ParsedFlags {
            flags: RecoveryFlags::default(),
            rejected,
            parse_error: Some(err.to_string().trim().to_string()),
        },
    }
}

fn flag_name(token: &str) -> Option<(&str, bool)> {
    let body = token.strip_prefix("--")?;
    match body.split_once('=') {
        Some((name, _)) => Some((name, true)),
        None => Some((body, false)),
    }
}
