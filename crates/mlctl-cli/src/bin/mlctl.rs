use mlctl_cli::cli;
use mlctl_cli::config::Config;

fn main() {
    let config = Config::default();
    std::process::exit(cli::cli_main(config));
}
