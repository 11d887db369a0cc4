fn main() {
    env_logger::init();
    log::info!("WebPet host starting up");

    if let Err(e) = webpet::app::run() {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
