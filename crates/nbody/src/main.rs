use std::process::ExitCode;

use nbody::config::LogLevel;

fn main() -> ExitCode {
    // change cwd so opening HLSL files and textures will not fail
    let dir = std::env::current_exe()
        .inspect_err(|e| eprintln!("Failed to get the path of this program: {e}"))
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));
    if let Some(dir) = dir {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("Failed to change the current working directory: {e}");
        }
    }

    let config = nbody::parse_args(std::env::args());
    let level = config.as_ref().map_or(LogLevel::default(), |c| c.logging.level);
    nbody::log::init(level);

    let result = config.and_then(|config| run(&config));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(windows)]
fn run(config: &nbody::Config) -> nbody::Result<()> {
    nbody::framework::run(config)?;
    if config.debug_layer_enabled() {
        nbody::gfx::report_live_objects()?;
    }
    Ok(())
}

#[cfg(not(windows))]
fn run(_config: &nbody::Config) -> nbody::Result<()> {
    Err(nbody::Error::Unsupported)
}
