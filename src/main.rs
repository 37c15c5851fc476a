use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use fastdl::logging::*;
use fastdl::progress::CliProgressCallback;
use fastdl::utils::setup_signal_handlers;
use fastdl::{games, Config, SyncBuilder};

fn cli() -> Command {
	Command::new("fastdl")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Incremental FastDL mirror for game servers")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.global(true)
				.help("Config file (.toml, .json or .json5)"),
		)
		.subcommand(
			Command::new("sync")
				.about("Mirror a game content directory into a FastDL directory")
				.arg(Arg::new("source").short('s').long("source").value_name("DIR").help("Game content directory"))
				.arg(Arg::new("dest").short('d').long("dest").value_name("DIR").help("FastDL directory"))
				.arg(
					Arg::new("compress")
						.long("compress")
						.action(ArgAction::SetTrue)
						.conflicts_with("raw")
						.help("Write bzip2-compressed .bz2 files (default)"),
				)
				.arg(Arg::new("raw").long("raw").action(ArgAction::SetTrue).help("Write plain copies"))
				.arg(
					Arg::new("level")
						.short('l')
						.long("level")
						.value_name("1-9")
						.value_parser(clap::value_parser!(u32))
						.help("bzip2 compression level"),
				)
				.arg(
					Arg::new("threads")
						.short('j')
						.long("threads")
						.value_name("N")
						.value_parser(clap::value_parser!(usize))
						.help("Files processed at the same time"),
				)
				.arg(
					Arg::new("exclude")
						.short('x')
						.long("exclude")
						.value_name("FILE")
						.help("Exclude list, one path, directory or extension per line"),
				)
				.arg(
					Arg::new("exclude-token")
						.short('e')
						.long("exclude-token")
						.value_name("TOKEN")
						.action(ArgAction::Append)
						.help("Additional exclude token (repeatable)"),
				)
				.arg(
					Arg::new("game")
						.short('g')
						.long("game")
						.value_name("GAME")
						.help("Use excludes/<GAME>.txt when no exclude list is given"),
				)
				.arg(
					Arg::new("json")
						.long("json")
						.action(ArgAction::SetTrue)
						.help("Print the session summary as JSON on stdout"),
				),
		)
		.subcommand(
			Command::new("detect")
				.about("Find a supported game in a server directory")
				.arg(Arg::new("dir").required(true)),
		)
}

/// Overlay CLI flags on the loaded configuration
fn apply_sync_args(config: &mut Config, args: &ArgMatches) {
	if let Some(v) = args.get_one::<String>("source") {
		config.source = PathBuf::from(v);
	}
	if let Some(v) = args.get_one::<String>("dest") {
		config.destination = PathBuf::from(v);
	}
	if args.get_flag("raw") {
		config.compress = false;
	} else if args.get_flag("compress") {
		config.compress = true;
	}
	if let Some(v) = args.get_one::<u32>("level") {
		config.compress_level = *v;
	}
	if let Some(v) = args.get_one::<usize>("threads") {
		config.max_workers = *v;
	}
	if let Some(v) = args.get_one::<String>("exclude") {
		config.exclude_file = Some(PathBuf::from(v));
	}
	if let Some(tokens) = args.get_many::<String>("exclude-token") {
		config.exclude_tokens.extend(tokens.cloned());
	}
	if let Some(v) = args.get_one::<String>("game") {
		config.game = Some(v.clone());
	}
}

async fn run_sync(config: Config, json: bool) -> Result<ExitCode, Box<dyn Error>> {
	if let Some(game) = &config.game {
		if !games::is_supported(game) {
			warn!("Unknown game {:?}, supported: {}", game, games::SUPPORTED_GAMES.join(", "));
		}
	}

	let progress = if json || !std::io::stderr().is_terminal() {
		CliProgressCallback::quiet()
	} else {
		CliProgressCallback::new()
	};

	let orchestrator = SyncBuilder::from_config(config).events(Arc::new(progress)).build();
	setup_signal_handlers(orchestrator.cancel_token());

	let summary = match orchestrator.run().await {
		Ok(s) => s,
		Err(e) => {
			error!("{}", e);
			return Ok(if e.is_config_error() { ExitCode::from(2) } else { ExitCode::FAILURE });
		}
	};

	if json {
		println!("{}", serde_json::to_string_pretty(&summary)?);
	}
	if summary.files_failed > 0 || summary.cancelled {
		return Ok(ExitCode::FAILURE);
	}
	Ok(ExitCode::SUCCESS)
}

fn run_detect(dir: &Path) -> ExitCode {
	match games::detect_game(dir) {
		Some(game) => {
			println!("{}\t{}", game.name, game.content_root.display());
			ExitCode::SUCCESS
		}
		None => {
			error!("No supported game found in {} ({})", dir.display(), games::SUPPORTED_GAMES.join(", "));
			ExitCode::FAILURE
		}
	}
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
	let matches = cli().get_matches();

	let config_path = matches.get_one::<String>("config").map(PathBuf::from);
	let mut config = match Config::load(config_path.as_deref()) {
		Ok(c) => c,
		Err(e) => {
			init_tracing("info");
			error!("{}", e);
			return Ok(ExitCode::from(2));
		}
	};
	init_tracing(&config.log_level);

	if let Some(args) = matches.subcommand_matches("sync") {
		apply_sync_args(&mut config, args);
		return run_sync(config, args.get_flag("json")).await;
	} else if let Some(args) = matches.subcommand_matches("detect") {
		let dir = args.get_one::<String>("dir").ok_or("detect: directory argument required")?;
		return Ok(run_detect(Path::new(dir)));
	}

	Ok(ExitCode::SUCCESS)
}


// vim: ts=4
