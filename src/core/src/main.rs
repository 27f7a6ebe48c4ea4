use antlion::configuration::config::{Args, Config};
use antlion::controller::controller_handler::Controller;
use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
 █████╗ ███╗   ██╗████████╗██╗     ██╗ ██████╗ ███╗   ██╗
██╔══██╗████╗  ██║╚══██╔══╝██║     ██║██╔═══██╗████╗  ██║
███████║██╔██╗ ██║   ██║   ██║     ██║██║   ██║██╔██╗ ██║
██╔══██║██║╚██╗██║   ██║   ██║     ██║██║   ██║██║╚██╗██║
██║  ██║██║ ╚████║   ██║   ███████╗██║╚██████╔╝██║ ╚████║
╚═╝  ╚═╝╚═╝  ╚═══╝   ╚═╝   ╚══════╝╚═╝ ╚═════╝ ╚═╝  ╚═══╝
=========================================================
       Telnet and SSH shell honeypot v{}
=========================================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Importing configuration");

    let args = Args::parse();

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration imported successfully");

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = controller.run() => {
            if let Err(e) = result {
                error!("Error occured in the controller process: {}, exiting...", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }
}
