use std::io::{self, IsTerminal, Write};
use std::process;

use anyhow::Context;
use clap::{arg, value_parser, ArgMatches, Command};
use yansi::Color::{Green, Red};
use yansi::Paint;

use regex_fsm::{MatcherMemory, Regex};

const EXIT_ERROR: i32 = 1;

fn cli() -> Command {
    Command::new("refsm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles a pattern into a finite-state automaton and matches whole strings against it")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(
            Command::new("dot")
                .about("Output DOT (Graphviz) representation of the automaton")
                .arg(arg!(<PATTERN>).help("Pattern to compile")),
        )
        .subcommand(
            Command::new("match")
                .about("Match pattern against one or more inputs")
                // Keep options sorted alphabetically by their long name.
                .arg(
                    arg!(--"chunk-size" <N>)
                        .help("Feed input in chunks of N characters (default: entire input at once)")
                        .required(false)
                        .value_parser(value_parser!(u64).range(1..)),
                )
                .arg(arg!(--debug).help("Print matcher state after each chunk"))
                .arg(arg!(<PATTERN>).help("Pattern to compile"))
                .arg(arg!(<INPUT> ...).help("Strings to match against the whole pattern")),
        )
}

fn compile_pattern(args: &ArgMatches) -> anyhow::Result<Regex> {
    let pattern = args.get_one::<String>("PATTERN").unwrap();
    Regex::new(pattern).with_context(|| format!("failed to compile pattern {:?}", pattern))
}

fn exec_dot(args: &ArgMatches) -> anyhow::Result<bool> {
    let regex = compile_pattern(args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    regex.to_dot(&mut out)?;
    out.flush()?;
    Ok(true)
}

fn exec_match(args: &ArgMatches) -> anyhow::Result<bool> {
    let regex = compile_pattern(args)?;
    let inputs = args.get_many::<String>("INPUT").unwrap();
    let chunk_size = args.get_one::<u64>("chunk-size").map(|cs| *cs as usize);
    let debug = args.get_flag("debug");

    eprintln!("pattern: {}", regex.as_str());
    eprintln!("states: {}", regex.state_count());
    if let Some(cs) = chunk_size {
        eprintln!("chunk_size: {cs}");
    }
    eprintln!();

    let mut memory = MatcherMemory::default();
    let mut all_matched = true;

    for input in inputs {
        let mut matcher = memory.matcher(&regex);

        if debug {
            eprintln!("--- input: {:?} ---", input);
            eprintln!("[init] {:#?}", matcher);
        }

        match chunk_size {
            None => {
                // Feed entire input at once.
                matcher.chunk(input);
                if debug {
                    eprintln!("[after chunk({:?})] {:#?}", input, matcher);
                }
            }
            Some(cs) => {
                let chars: Vec<char> = input.chars().collect();
                for (i, chunk) in chars.chunks(cs).enumerate() {
                    for &ch in chunk {
                        matcher.step(ch);
                    }
                    if debug {
                        let chunk_str: String = chunk.iter().collect();
                        eprintln!(
                            "[after chunk #{} {:?} (chars {}..{})] {:#?}",
                            i,
                            chunk_str,
                            i * cs,
                            i * cs + chunk.len(),
                            matcher
                        );
                    }
                }
            }
        }

        if matcher.finish() {
            println!("  {}  {:?}", "MATCH".paint(Green), input);
        } else {
            println!("  {}  {:?}", "NO MATCH".paint(Red), input);
            all_matched = false;
        }
    }

    Ok(all_matched)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // If stdout is not a tty (for example, because it was redirected to a
    // file) turn off colors.
    if !io::stdout().is_terminal() {
        yansi::disable();
    }

    let args = cli().get_matches();

    let result = match args.subcommand() {
        Some(("dot", args)) => exec_dot(args),
        Some(("match", args)) => exec_match(args),
        _ => unreachable!(),
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => process::exit(EXIT_ERROR),
        Err(err) => {
            eprintln!("{} {:#}", "error:".paint(Red).bold(), err);
            process::exit(EXIT_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        cli().debug_assert();
    }

    #[test]
    fn parse_match_args() {
        let args = cli()
            .try_get_matches_from(["refsm", "match", "--chunk-size", "2", "--debug", "a*b", "ab", "b"])
            .unwrap();
        let (name, args) = args.subcommand().unwrap();
        assert_eq!(name, "match");
        assert_eq!(args.get_one::<u64>("chunk-size"), Some(&2));
        assert!(args.get_flag("debug"));
        assert_eq!(args.get_one::<String>("PATTERN").map(String::as_str), Some("a*b"));
        let inputs: Vec<&String> = args.get_many::<String>("INPUT").unwrap().collect();
        assert_eq!(inputs, ["ab", "b"]);
    }

    #[test]
    fn reject_zero_chunk_size() {
        assert!(cli()
            .try_get_matches_from(["refsm", "match", "--chunk-size", "0", "a", "a"])
            .is_err());
    }

    #[test]
    fn match_requires_an_input() {
        assert!(cli().try_get_matches_from(["refsm", "match", "a*b"]).is_err());
    }

    #[test]
    fn dot_reports_compile_errors() {
        let args = cli().try_get_matches_from(["refsm", "dot", "[a-z"]).unwrap();
        let (_, args) = args.subcommand().unwrap();
        let err = compile_pattern(args).unwrap_err();
        assert_eq!(
            format!("{:#}", err),
            "failed to compile pattern \"[a-z\": unterminated character class starting at position 0"
        );
    }
}
