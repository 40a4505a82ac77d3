/// MC3D Terminal Viewer - Marching Cubes surfaces in ASCII
///
/// Usage: mc3d-terminal [metaball|terrain] [config.json]
///
/// The optional JSON file holds a terrain configuration; missing fields keep
/// their defaults.
/// Controls:
///   - WASD / Arrow Keys: Rotate, E/R: Roll, Space: Toggle spin
///   - Tab: Toggle terrain edit mode, left click: Sculpt / pick
///   - +/-: Raise or dig, G: Regenerate
///   - Q/ESC: Quit
use std::env;
use std::fs;
use std::io;
use std::path::Path;

use mc3d_core::{Metaball, Terrain, TerrainConfig};
use mc3d_terminal::{core_error, Scene, TerminalApp};

fn load_config(path: &Path) -> io::Result<TerrainConfig> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse {}: {}", path.display(), e),
        )
    })
}

fn main() -> io::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let kind = args.get(1).map(String::as_str).unwrap_or("terrain");

    let scene = match kind {
        "metaball" => Scene::Metaball(Metaball::new(1.2).map_err(core_error)?),
        "terrain" => {
            let config = match args.get(2) {
                Some(path) => load_config(Path::new(path))?,
                None => TerrainConfig::default(),
            };
            log::info!("terrain config: {:?}", config);
            Scene::Terrain(Terrain::new(config).map_err(core_error)?)
        }
        other => {
            eprintln!("Usage: mc3d-terminal [metaball|terrain] [config.json]");
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown scene: {}", other),
            ));
        }
    };

    println!(
        "Built {} with {} triangles, starting viewer (press Q to quit)...",
        scene.name(),
        scene.mesh().triangle_count()
    );
    std::thread::sleep(std::time::Duration::from_secs(1));

    let mut app = TerminalApp::new(scene)?;
    app.run()?;

    Ok(())
}
