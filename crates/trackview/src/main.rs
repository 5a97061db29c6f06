use std::path::PathBuf;

use trackview::{load_mesh, run, Result, ViewerOptions};

/// Environment variable naming an optional JSON options file.
const CONFIG_VAR: &str = "TRACKVIEW_CONFIG";

fn options() -> Result<ViewerOptions> {
    let mut options = match std::env::var_os(CONFIG_VAR) {
        Some(path) => {
            log::info!("reading options from {}", PathBuf::from(&path).display());
            ViewerOptions::from_json_file(path)?
        }
        None => ViewerOptions::default(),
    };
    if let Some(mesh_path) = std::env::args_os().nth(1) {
        options.mesh_path = PathBuf::from(mesh_path);
    }
    options.validate()?;
    Ok(options)
}

fn start() -> Result<()> {
    let options = options()?;
    let mesh = load_mesh(&options.mesh_path)?;
    run(options, mesh)
}

fn main() {
    let _ = env_logger::try_init();
    if let Err(error) = start() {
        log::error!("{error}");
        eprintln!("trackview: {error}");
        std::process::exit(1);
    }
}
