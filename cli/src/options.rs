use gumdrop::Options;

#[derive(Options, Debug, Default)]
pub struct AppOptions {
    /// Print this help message
    #[options()]
    pub help: bool,
    /// Path to the cartridge image to run
    #[options(free, required)]
    pub rom_path: String,
    /// Log at debug verbosity instead of info
    #[options(short = "v")]
    pub verbose: bool,
}
