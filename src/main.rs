use std::thread;
use tracing::info;
use uwb_localization::api::PUBLISH_PERIOD;
use uwb_localization::{
    init_logging, LocalizationConfig, LocalizationSystem, UwbState,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 2 || args.get(1).is_some_and(|a| a == "--help" || a == "-h") {
        eprintln!(
            "Usage: {} [config.json]",
            args.first().map_or("uwb-localize", |s| s.as_str())
        );
        return Err("Invalid arguments".into());
    }

    let config = match args.get(1) {
        Some(path) => LocalizationConfig::from_file(path)?,
        None => LocalizationConfig::default(),
    };

    init_logging(config.log_level);
    info!(port = %config.serial.port_path, baud = config.serial.baud_rate, "starting UWB localization");

    let mut system = LocalizationSystem::new(config)?;
    system.start()?;

    while system.is_running() {
        let state = UwbState::from(system.get_position());
        println!("{}", state.to_json()?);
        thread::sleep(PUBLISH_PERIOD);
    }

    let status = system.status();
    info!(state = ?status.state, frames = status.reader.frames_decoded, "localization ended");
    system.stop();

    if status.sensor_lost() {
        return Err("UWB sensor went silent".into());
    }
    Ok(())
}
