mod commands;
mod terminal;

use commands::{CommandLine, Commands, init_config, ports, profiles, run, show};
use gummy_common::config::Config;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();
    let global = &commands.global;

    // a broken file must not stop init-config from replacing it
    let config = match commands.command {
        Commands::InitConfig { .. } => {
            let mut config = Config::default();
            global.apply(&mut config);
            config
        }
        _ => global.load_config()?,
    };

    logging::init(&config.logging)?;
    print::banner();

    match &commands.command {
        Commands::Run { profile } => run::run(global, &config, profile).await,
        Commands::Profiles => {
            profiles::profiles();
            Ok(())
        }
        Commands::Show { view } => show::show(&config, *view, global.workspace.as_deref()),
        Commands::Ports { start, end, protocol } => ports::ports(&config, *start, *end, protocol),
        Commands::InitConfig { force } => init_config::init_config(&global.config, *force),
    }
}
