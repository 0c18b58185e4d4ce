use clap::{CommandFactory, Parser};
use mobperf::cli::{Cli, Commands};
use mobperf::cmd;
use mobperf::config::{CompareOverrides, RunOverrides};
use std::process;

fn main() {
    // Initialize logger (use RUST_LOG env var to control verbosity)
    env_logger::init();

    let cli = Cli::parse();

    if cli.no_emoji {
        mobperf::fmt::disable_emoji();
    }

    let result = match cli.command {
        Some(Commands::Run {
            project,
            repetitions,
            package,
            build_command,
            configuration,
            output,
            managed_profile,
            native_profile,
            max_consecutive_failures,
        }) => cmd::cmd_run(
            project,
            RunOverrides {
                repetitions,
                package,
                build_command,
                configuration,
                output,
                managed_profile,
                native_profile,
                max_consecutive_failures,
            },
        ),
        Some(Commands::Compare {
            baseline,
            candidate,
            output,
            json,
            min_samples,
            noise_multiplier,
            min_change_percent,
            fail_on_regression,
        }) => cmd::cmd_compare(
            baseline,
            candidate,
            CompareOverrides {
                output,
                json,
                fail_on_regression,
                min_samples,
                noise_multiplier,
                min_change_percent,
            },
        ),
        Some(Commands::Summarize { dir, output }) => cmd::cmd_summarize(&dir, output),
        Some(Commands::Init { package }) => cmd::cmd_init(package.as_deref()),
        Some(Commands::Completions { shell }) => {
            cmd::cmd_completions(shell);
            Ok(())
        }
        None => {
            // No subcommand provided, show help
            let _ = Cli::command().print_help();
            Ok(())
        }
    };

    if let Err(e) = result {
        use mobperf::error::ErrorFormatter;
        eprintln!("{}", ErrorFormatter::format(&e));
        let exit_code = ErrorFormatter::exit_code(&e);
        process::exit(exit_code);
    }
}
