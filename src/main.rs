use clap::{Parser, Subcommand};
use colored::*;
use rpassword::prompt_password;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ntcrack::{
    ntlm, AttackConfig, AttackController, AttackEvent, AttackSummary, HashRecordStore, HashRow,
    TerminalState,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the NTLM hash of a password
    Hash {
        #[arg(short, long, env = "NTCRACK_PASSWORD")]
        password: Option<String>,
    },

    /// Run a dictionary attack against a `user:rid:lm:ntlm:::` hash dump
    Crack {
        /// Hash dump to attack
        #[arg(long, value_name = "DUMP")]
        hashes: PathBuf,

        /// Wordlist, one candidate per line
        #[arg(short, long, env = "NTCRACK_WORDLIST")]
        wordlist: PathBuf,

        /// Only attack these users (repeatable); all uncracked users by default
        #[arg(short, long = "user", value_name = "USER")]
        users: Vec<String>,

        /// Candidates tested between two progress lines
        #[arg(long, default_value_t = ntcrack::config::DEFAULT_PROGRESS_INTERVAL)]
        progress_interval: u64,

        /// Skip counting the wordlist first (no percentage in progress lines)
        #[arg(long)]
        no_prescan: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn fail(message: &str, detail: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", message.red().bold(), detail);
    let _ = io::stderr().flush();
    process::exit(1);
}

fn run_hash(password: Option<String>, verbose: u8) {
    let password = match password {
        Some(p) => {
            let env_pass = env::var("NTCRACK_PASSWORD").ok();
            if env_pass.as_deref() == Some(&p) {
                if verbose > 0 {
                    println!(
                        "[{}] Using password from environment variable.",
                        "Info".cyan()
                    );
                }
            } else {
                eprintln!(
                    "{}",
                    "Warning: Providing password directly via -p is insecure.".yellow()
                );
            }
            p
        }
        None => match prompt_password(format!("{}: ", "Enter password".yellow())) {
            Ok(p) => p,
            Err(e) => fail("Error reading password:", e),
        },
    };

    if verbose > 0 {
        println!(
            "[{}] {} UTF-16 code unit(s)",
            "Info".cyan(),
            password.encode_utf16().count()
        );
    }
    println!("{}", ntlm(&password).green());
}

struct CrackArgs {
    hashes: PathBuf,
    wordlist: PathBuf,
    users: Vec<String>,
    progress_interval: u64,
    no_prescan: bool,
}

fn run_crack(args: CrackArgs) {
    let dump = match fs::read_to_string(&args.hashes) {
        Ok(text) => text,
        Err(e) => fail(
            &format!("Error reading hash dump '{}':", args.hashes.display()),
            e,
        ),
    };

    let rows = HashRow::parse_dump(&dump);
    let mut store = HashRecordStore::new();
    if let Err(e) = store.load(rows) {
        fail("Error loading hash dump:", e);
    }
    println!(
        "[{}] Loaded {} hash record(s)",
        "Info".cyan(),
        store.len()
    );

    let targets: Vec<_> = store
        .uncracked()
        .into_iter()
        .filter(|t| {
            args.users.is_empty() || args.users.iter().any(|u| u.eq_ignore_ascii_case(&t.user))
        })
        .collect();
    if targets.is_empty() {
        eprintln!("{}", "Warning: No matching records to attack.".yellow());
        return;
    }
    debug!("{} target(s) selected", targets.len());

    let config = AttackConfig::default()
        .with_progress_interval(args.progress_interval)
        .with_prescan(!args.no_prescan);
    let controller = match AttackController::new(config) {
        Ok(c) => c,
        Err(e) => fail("Error:", e),
    };

    let store = store.shared();
    let handle = match controller.start(&store, targets, &args.wordlist) {
        Ok(h) => h,
        Err(e) => fail("Error starting attack:", e),
    };

    let mut summary: Option<AttackSummary> = None;
    for event in handle.events() {
        match event {
            AttackEvent::Progress {
                tested,
                total,
                percent,
            } => match (total, percent) {
                (Some(total), Some(percent)) => println!(
                    "[{}] {:.0}% ({}/{})",
                    "Progress".purple(),
                    percent,
                    tested,
                    total
                ),
                _ => println!("[{}] {} tested", "Progress".purple(), tested),
            },
            AttackEvent::Match {
                user, plaintext, ..
            } => println!(
                "[{}] {} : {}",
                "Cracked".green().bold(),
                user.cyan(),
                plaintext.green()
            ),
            AttackEvent::Complete(s) => summary = Some(s),
        }
    }

    let summary = match summary {
        Some(s) => s,
        None => match handle.join() {
            Ok(s) => s,
            Err(e) => fail("Error:", e),
        },
    };

    println!();
    for record in store.lock().records() {
        let password = match &record.cracked {
            Some(p) => p.green(),
            None => "-".bright_black(),
        };
        println!(
            "{}{}{}{}{}{}{}",
            record.user.cyan(),
            ":".white().bold(),
            record.rid.blue(),
            ":".white().bold(),
            record.ntlm_hash.magenta(),
            ":".white().bold(),
            password
        );
    }
    println!();

    let state = match summary.state {
        TerminalState::Completed => "completed".green(),
        TerminalState::Cancelled => "cancelled".yellow(),
        TerminalState::Aborted => "aborted".red(),
    };
    println!(
        "Attack {}: {} password(s) found, {} candidate(s) tested",
        state, summary.cracked, summary.tested
    );
    if summary.lossy_lines > 0 {
        eprintln!(
            "{}",
            format!(
                "Warning: {} wordlist line(s) contained invalid UTF-8 and were decoded lossily.",
                summary.lossy_lines
            )
            .yellow()
        );
    }
    if let Some(e) = &summary.error {
        fail("Error reading wordlist:", e);
    }
}

fn main() {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Hash { password } => run_hash(password, args.verbose),
        Command::Crack {
            hashes,
            wordlist,
            users,
            progress_interval,
            no_prescan,
        } => run_crack(CrackArgs {
            hashes,
            wordlist,
            users,
            progress_interval,
            no_prescan,
        }),
    }
}
