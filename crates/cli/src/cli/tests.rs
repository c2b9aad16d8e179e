use super::*;

#[test]
fn parse_sync_without_filter() {
	let cli = Cli::try_parse_from(["tsprep", "sync"]).unwrap();
	assert_eq!(cli.command, Command::Sync { only: None });
	assert!(cli.command.only().is_empty());
	assert!(!cli.verbose);
}

#[test]
fn parse_comma_separated_only() {
	let cli = Cli::try_parse_from(["tsprep", "fetch", "--only", "rust,python,c"]).unwrap();
	assert_eq!(cli.command.only(), ["rust", "python", "c"]);
}

#[test]
fn global_flags_after_subcommand() {
	let args = ["tsprep", "generate", "-v", "--config", "prep/tsprep.toml", "-j", "3"];
	let cli = Cli::try_parse_from(args).unwrap();
	assert!(cli.verbose);
	assert_eq!(cli.config, Some(PathBuf::from("prep/tsprep.toml")));
	assert_eq!(cli.jobs, Some(3));
}

#[test]
fn transport_is_validated() {
	let cli = Cli::try_parse_from(["tsprep", "--transport", "git", "queries"]).unwrap();
	assert_eq!(cli.transport, Some(Transport::Git));
	assert!(Cli::try_parse_from(["tsprep", "--transport", "svn", "queries"]).is_err());
}

#[test]
fn subcommand_is_required() {
	assert!(Cli::try_parse_from(["tsprep"]).is_err());
}

#[test]
fn generate_takes_no_filter() {
	let cli = Cli::try_parse_from(["tsprep", "generate"]).unwrap();
	assert_eq!(cli.command, Command::Generate);
	assert!(cli.command.only().is_empty());
	assert!(Cli::try_parse_from(["tsprep", "generate", "--only", "c"]).is_err());
}
