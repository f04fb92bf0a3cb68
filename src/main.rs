mod cli;
mod config;
mod modules;
mod report;

use anyhow::Result;
use apikit::{Session, TaskOptions};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ContentViewCommand, HostCommand};
use std::io;
use std::process::ExitCode;

/// Global context for one invocation
pub struct Context<'a> {
    pub session: &'a Session,
    pub check: bool,
    pub diff: bool,
    pub task_options: TaskOptions,
}

impl<'a> Context<'a> {
    /// Engine wired to the session and the global flags
    pub fn engine(&self) -> reconcile::Engine<'a> {
        reconcile::Engine::new(self.session)
            .with_check_mode(self.check)
            .with_task_options(self.task_options)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    // Completions need no server connection
    if let Command::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "foremanctl", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report::print_failure(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let file = config::FileConfig::load()?;
    let connection = config::resolve(&cli.connection, &file)?;
    let session = Session::new(&connection.session)?;

    let ctx = Context {
        session: &session,
        check: cli.check,
        diff: cli.diff,
        task_options: TaskOptions {
            timeout: connection.task_timeout,
            ..TaskOptions::default()
        },
    };

    match cli.command {
        Command::Organization(args) => modules::organization::run(&ctx, args),
        Command::Location(args) => modules::location::run(&ctx, args),
        Command::Domain(args) => modules::domain::run(&ctx, args),
        Command::Bookmark(args) => modules::bookmark::run(&ctx, args),
        Command::Role(args) => modules::role::run(&ctx, args),
        Command::SmartProxy(args) => modules::smart_proxy::run(&ctx, args),
        Command::GlobalParameter(args) => modules::global_parameter::run(&ctx, args),
        Command::Setting(args) => modules::setting::run(&ctx, args),
        Command::LifecycleEnvironment(args) => modules::lifecycle_environment::run(&ctx, args),
        Command::ContentView(cmd) => match cmd {
            ContentViewCommand::Ensure(args) => modules::content_view::run(&ctx, args),
            ContentViewCommand::Publish(args) => modules::content_view::publish(&ctx, args),
        },
        Command::Host(cmd) => match cmd {
            HostCommand::Power(args) => modules::host_power::run(&ctx, args),
        },
        Command::Ping => modules::ping::run(&ctx),
        Command::Search(args) => modules::search::run(&ctx, args),
        // Handled in main before a session exists
        Command::Completions { .. } => Ok(()),
    }
}
