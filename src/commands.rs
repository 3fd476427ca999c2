//! Command grammar for the interactive session.
//!
//! One operator line parses into one typed `Command`; the session applies it.
//! Parsing never touches state, so a rejected line leaves everything as it
//! was.

use crate::error::ValidationError;
use crate::parsers::parse_rate_input;

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `<n>`: flip selection on meeting n.
    Toggle(usize),
    /// `u<n>`: selection attempt on an unassociated meeting (always
    /// rejected by the session until the meeting is assigned).
    ToggleUnassociated(usize),
    /// `all`: select every unbilled meeting.
    SelectAll,
    /// `none`: deselect every unbilled meeting.
    DeselectAll,
    /// `edit <n>` / `time <n>`: open the time/duration dialog for meeting n.
    Edit(usize),
    /// `rate <n> <amount>`: per-meeting rate override.
    Rate { index: usize, rate: f64 },
    /// `setrate <email> <amount>`: customer default rate, propagated to the
    /// billing system.
    SetCustomerRate { email: String, rate: f64 },
    /// `assign u<n> <email>`: attach an unassociated meeting to a customer.
    Assign { index: usize, email: String },
    /// `list`: redraw the meeting listing.
    List,
    /// `help`: show the command reference.
    Help,
    /// `continue`: proceed to synopsis entry and confirmation.
    Continue,
    /// `quit`: abandon the run without emitting anything.
    Quit,
}

/// Parse one input line into a command.
pub fn parse_command(line: &str) -> Result<Command, ValidationError> {
    let trimmed = line.trim();
    let mut tokens = trimmed.split_whitespace();
    let head = tokens.next().unwrap_or("").to_lowercase();

    match head.as_str() {
        "" => Err(ValidationError::UnknownCommand(String::new())),
        "all" => Ok(Command::SelectAll),
        "none" => Ok(Command::DeselectAll),
        "list" | "show" => Ok(Command::List),
        "help" | "?" => Ok(Command::Help),
        "continue" | "done" => Ok(Command::Continue),
        "quit" | "exit" => Ok(Command::Quit),
        "edit" | "time" => {
            let index = required_index(tokens.next(), &format!("usage: {head} <meeting>"))?;
            Ok(Command::Edit(index))
        }
        "rate" => {
            let usage = "usage: rate <meeting> <amount>";
            let index = required_index(tokens.next(), usage)?;
            let rate = required_rate(tokens.next(), usage)?;
            Ok(Command::Rate { index, rate })
        }
        "setrate" => {
            let usage = "usage: setrate <customer-email> <amount>";
            let email = tokens
                .next()
                .ok_or_else(|| ValidationError::Usage(usage.into()))?
                .to_lowercase();
            let rate = required_rate(tokens.next(), usage)?;
            Ok(Command::SetCustomerRate { email, rate })
        }
        "assign" => {
            let usage = "usage: assign u<number> <customer-email>";
            let index_token = tokens
                .next()
                .ok_or_else(|| ValidationError::Usage(usage.into()))?;
            let index = parse_unassociated_index(index_token)
                .ok_or_else(|| ValidationError::Usage(usage.into()))?;
            let email = tokens
                .next()
                .ok_or_else(|| ValidationError::Usage(usage.into()))?
                .to_lowercase();
            Ok(Command::Assign { index, email })
        }
        _ => {
            if let Some(index) = parse_unassociated_index(&head) {
                return Ok(Command::ToggleUnassociated(index));
            }
            if let Ok(index) = head.parse::<usize>() {
                return Ok(Command::Toggle(index));
            }
            Err(ValidationError::UnknownCommand(trimmed.to_string()))
        }
    }
}

fn required_index(token: Option<&str>, usage: &str) -> Result<usize, ValidationError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| ValidationError::Usage(usage.to_string()))
}

fn required_rate(token: Option<&str>, usage: &str) -> Result<f64, ValidationError> {
    let token = token.ok_or_else(|| ValidationError::Usage(usage.to_string()))?;
    match parse_rate_input(token)? {
        Some(rate) => Ok(rate),
        None => Err(ValidationError::Usage(usage.to_string())),
    }
}

/// `u3` → 3. Accepts only the `u`-prefixed form so plain numbers stay
/// unambiguous.
fn parse_unassociated_index(token: &str) -> Option<usize> {
    token
        .strip_prefix('u')
        .or_else(|| token.strip_prefix('U'))
        .and_then(|rest| rest.parse().ok())
}

/// The command reference printed by `help` and at session start.
pub const COMMAND_REFERENCE: &str = "\
Commands:
  <number>              toggle selection for a meeting
  all                   select all unbilled meetings
  none                  deselect all meetings
  edit <number>         edit a meeting's start time and duration
  rate <number> <amt>   set a custom rate for one meeting
  setrate <email> <amt> set a customer's default hourly rate
  assign u<number> <email>  assign an unassociated meeting to a customer
  list                  redraw the meeting list
  continue              proceed to synopsis entry and confirmation
  quit                  exit without creating any invoices";
