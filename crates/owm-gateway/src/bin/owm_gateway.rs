use owm_gateway::cli::{self, Args};
use owm_gateway::Gateway;

#[tokio::main]
async fn main() {
    let args: Args = argh::from_env();
    if args.version {
        println!("{}", cli::version_string());
        return;
    }

    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    log::info!("Starting OWM gateway {}...", cli::version_string());

    // Create shutdown channel
    let shutdown_tx = tokio::sync::watch::Sender::new(());
    {
        let shutdown_tx = shutdown_tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown_tx.send(());
        }) {
            log::error!("Error setting Ctrl+C handler: {}", e);
            std::process::exit(1);
        }
    }

    // Subscribed before init so a Ctrl+C during startup is not lost
    let shutdown_rx = shutdown_tx.subscribe();

    let gateway = match Gateway::init(&args.startup_options()).await {
        Ok(gateway) => gateway,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("owm_gateway: {}", e);
            std::process::exit(e.exit_code());
        }
    };
    gateway.run(shutdown_rx).await;

    log::info!("Gateway shut down, exiting");
}
