//! Script parsing: the command stream and the assertion trailer.
//!
//! Whitespace-tolerant; `//` begins a line comment; `;` separates
//! commands on one logical line. A `---` line switches to the assertion
//! section, where each line is `assertCommitted(Tk)` or
//! `assertAborted(Tk)`.

use repcrec_core::{SiteId, TransactionId, VariableId};
use repcrec_engine::Command;
use thiserror::Error;

/// Parse failure, with the offending line number.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number in the input.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

/// Expected outcome from the script's assertion section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assertion {
    /// The transaction must have committed.
    Committed(TransactionId),
    /// The transaction must have aborted.
    Aborted(TransactionId),
}

/// A parsed script.
#[derive(Debug, Default)]
pub struct Script {
    /// The command stream, in input order.
    pub commands: Vec<Command>,
    /// Assertions from the trailer, if any.
    pub assertions: Vec<Assertion>,
}

/// Parse a whole script.
pub fn parse_script(input: &str) -> Result<Script, ParseError> {
    let mut script = Script::default();
    let mut in_assertions = false;
    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        if line == "---" {
            in_assertions = true;
            continue;
        }
        for piece in line.split(';') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if in_assertions {
                let assertion = parse_assertion(piece).map_err(|message| ParseError {
                    line: line_no,
                    message,
                })?;
                script.assertions.push(assertion);
            } else {
                let command = parse_command(piece).map_err(|message| ParseError {
                    line: line_no,
                    message,
                })?;
                script.commands.push(command);
            }
        }
    }
    Ok(script)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_call(text: &str) -> Result<(&str, Vec<&str>), String> {
    let open = text
        .find('(')
        .ok_or_else(|| format!("expected '(' in '{}'", text))?;
    if !text.ends_with(')') {
        return Err(format!("expected ')' at the end of '{}'", text));
    }
    let name = text[..open].trim();
    let inner = text[open + 1..text.len() - 1].trim();
    let args = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(str::trim).collect()
    };
    Ok((name, args))
}

fn arity(name: &str, args: &[&str], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "{} takes {} argument(s), got {}",
            name,
            expected,
            args.len()
        ))
    }
}

fn txn_arg(arg: &str) -> Result<TransactionId, String> {
    arg.parse::<TransactionId>().map_err(|e| e.to_string())
}

fn var_arg(arg: &str) -> Result<VariableId, String> {
    arg.parse::<VariableId>().map_err(|e| e.to_string())
}

fn site_arg(arg: &str) -> Result<SiteId, String> {
    arg.parse::<SiteId>().map_err(|e| e.to_string())
}

fn int_arg(arg: &str) -> Result<i64, String> {
    arg.parse::<i64>()
        .map_err(|_| format!("invalid integer '{}'", arg))
}

fn parse_command(text: &str) -> Result<Command, String> {
    let (name, args) = parse_call(text)?;
    match name {
        "begin" => {
            arity(name, &args, 1)?;
            Ok(Command::Begin(txn_arg(args[0])?))
        }
        "beginRO" => {
            arity(name, &args, 1)?;
            Ok(Command::BeginRo(txn_arg(args[0])?))
        }
        "R" => {
            arity(name, &args, 2)?;
            Ok(Command::Read {
                txn: txn_arg(args[0])?,
                var: var_arg(args[1])?,
            })
        }
        "W" => {
            arity(name, &args, 3)?;
            Ok(Command::Write {
                txn: txn_arg(args[0])?,
                var: var_arg(args[1])?,
                value: int_arg(args[2])?,
            })
        }
        "end" => {
            arity(name, &args, 1)?;
            Ok(Command::End(txn_arg(args[0])?))
        }
        "fail" => {
            arity(name, &args, 1)?;
            Ok(Command::Fail(site_arg(args[0])?))
        }
        "recover" => {
            arity(name, &args, 1)?;
            Ok(Command::Recover(site_arg(args[0])?))
        }
        "dump" => match args.len() {
            0 => Ok(Command::Dump),
            1 if args[0].starts_with('x') => Ok(Command::DumpVariable(var_arg(args[0])?)),
            1 => Ok(Command::DumpSite(site_arg(args[0])?)),
            n => Err(format!("dump takes at most 1 argument, got {}", n)),
        },
        other => Err(format!("unknown command '{}'", other)),
    }
}

fn parse_assertion(text: &str) -> Result<Assertion, String> {
    let (name, args) = parse_call(text)?;
    match name {
        "assertCommitted" => {
            arity(name, &args, 1)?;
            Ok(Assertion::Committed(txn_arg(args[0])?))
        }
        "assertAborted" => {
            arity(name, &args, 1)?;
            Ok(Assertion::Aborted(txn_arg(args[0])?))
        }
        other => Err(format!("unknown assertion '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> TransactionId {
        TransactionId::new(n)
    }

    fn x(n: u32) -> VariableId {
        VariableId::new(n)
    }

    #[test]
    fn test_parses_basic_commands() {
        let script = parse_script("begin(T1)\nR(T1, x2)\nW(T1, x2, 42)\nend(T1)\n").unwrap();
        assert_eq!(
            script.commands,
            vec![
                Command::Begin(t(1)),
                Command::Read { txn: t(1), var: x(2) },
                Command::Write {
                    txn: t(1),
                    var: x(2),
                    value: 42
                },
                Command::End(t(1)),
            ]
        );
        assert!(script.assertions.is_empty());
    }

    #[test]
    fn test_semicolons_and_comments() {
        let input = "begin(T1); begin(T2) // a comment\n// whole-line comment\nW(T2,x1,15) ; R(T1,x1)\n";
        let script = parse_script(input).unwrap();
        assert_eq!(script.commands.len(), 4);
    }

    #[test]
    fn test_whitespace_tolerance() {
        let script = parse_script("  W( T3 ,  x6 , 22 )  \n").unwrap();
        assert_eq!(
            script.commands,
            vec![Command::Write {
                txn: t(3),
                var: x(6),
                value: 22
            }]
        );
    }

    #[test]
    fn test_dump_variants() {
        let script = parse_script("dump()\ndump(x3)\ndump(5)\n").unwrap();
        assert_eq!(
            script.commands,
            vec![
                Command::Dump,
                Command::DumpVariable(x(3)),
                Command::DumpSite(SiteId::new(5)),
            ]
        );
    }

    #[test]
    fn test_fail_recover_and_read_only() {
        let script = parse_script("beginRO(T5); fail(2); recover(2); end(T5)").unwrap();
        assert_eq!(
            script.commands,
            vec![
                Command::BeginRo(t(5)),
                Command::Fail(SiteId::new(2)),
                Command::Recover(SiteId::new(2)),
                Command::End(t(5)),
            ]
        );
    }

    #[test]
    fn test_assertion_section() {
        let input = "begin(T1); end(T1)\n---\nassertCommitted(T1)\nassertAborted(T2)\n";
        let script = parse_script(input).unwrap();
        assert_eq!(script.commands.len(), 2);
        assert_eq!(
            script.assertions,
            vec![Assertion::Committed(t(1)), Assertion::Aborted(t(2))]
        );
    }

    #[test]
    fn test_negative_write_values() {
        let script = parse_script("W(T1, x4, -7)").unwrap();
        assert_eq!(
            script.commands,
            vec![Command::Write {
                txn: t(1),
                var: x(4),
                value: -7
            }]
        );
    }

    #[test]
    fn test_error_carries_line_number() {
        let err = parse_script("begin(T1)\nfrob(T1)\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("frob"));
    }

    #[test]
    fn test_arity_errors() {
        assert!(parse_script("R(T1)").is_err());
        assert!(parse_script("W(T1, x2)").is_err());
        assert!(parse_script("begin()").is_err());
        assert!(parse_script("dump(x1, x2)").is_err());
    }

    #[test]
    fn test_malformed_ids_are_errors() {
        assert!(parse_script("begin(1)").is_err());
        assert!(parse_script("R(T1, y2)").is_err());
        assert!(parse_script("W(T1, x2, twelve)").is_err());
        assert!(parse_script("fail(x2)").is_err());
    }

    #[test]
    fn test_commands_after_separator_are_assertions() {
        let err = parse_script("---\nbegin(T1)\n").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
