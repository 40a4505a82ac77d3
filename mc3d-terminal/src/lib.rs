/// Terminal viewer for marching-cubes surfaces with mouse picking
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use mc3d_core::{Camera, Mesh, Metaball, Ray, RotationState, Terrain, Transform};
use nalgebra::Matrix4;
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Edge of the cube every surface is fitted into before viewing
const VIEW_EXTENT: f32 = 3.0;

/// Convert a core error into the viewer's I/O error type
pub fn core_error(err: mc3d_core::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err)
}

/// The surface being viewed
pub enum Scene {
    Metaball(Metaball),
    Terrain(Terrain),
}

impl Scene {
    pub fn name(&self) -> &str {
        match self {
            Scene::Metaball(metaball) => metaball.surface().name(),
            Scene::Terrain(terrain) => terrain.surface().name(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        match self {
            Scene::Metaball(metaball) => metaball.surface().mesh(),
            Scene::Terrain(terrain) => terrain.surface().mesh(),
        }
    }

    fn mesh_mut(&mut self) -> &mut Mesh {
        match self {
            Scene::Metaball(metaball) => metaball.surface_mut().mesh_mut(),
            Scene::Terrain(terrain) => terrain.surface_mut().mesh_mut(),
        }
    }

    /// Axis range swept by the surface, the same on every axis
    fn bounds(&self) -> (f32, f32) {
        match self {
            Scene::Metaball(metaball) => {
                let c = metaball.center();
                let size = metaball.surface().size();
                (c.x.min(c.y).min(c.z) - size, c.x.max(c.y).max(c.z) + size)
            }
            Scene::Terrain(terrain) => (0.0, terrain.field().lattice().max_coord()),
        }
    }

    /// Full rebuild: terrain is resampled and loses its edits
    fn regenerate(&mut self) -> mc3d_core::Result<usize> {
        match self {
            Scene::Metaball(metaball) => metaball.surface_mut().regenerate(),
            Scene::Terrain(terrain) => terrain.rebuild_field(),
        }
    }
}

/// Main application struct for terminal surface viewing
pub struct TerminalApp {
    scene: Scene,
    rotation: RotationState,
    camera: Camera,
    renderer: AsciiRenderer,
    running: bool,
    spin: bool,
    status: String,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(scene: Scene) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(scene, width, height))
    }

    /// Viewer for a fixed-size screen, without touching the terminal
    pub fn with_size(scene: Scene, width: u16, height: u16) -> Self {
        let mut app = Self {
            scene,
            rotation: RotationState::new(0.3, 0.3, 0.0),
            camera: Camera::new(width as u32, height as u32),
            renderer: AsciiRenderer::new(width as usize, height as usize),
            running: true,
            spin: true,
            status: String::new(),
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        };
        app.apply_model_matrix();
        app
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )?;

        let result = self.main_loop();

        // Cleanup
        execute!(
            stdout(),
            DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        )?;
        terminal::disable_raw_mode()?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                let event = event::read()?;
                self.handle_event(event)?;
            }

            self.update();
            self.render()?;

            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    pub fn handle_event(&mut self, event: Event) -> io::Result<()> {
        match event {
            Event::Key(KeyEvent { code, .. }) => self.handle_key(code),
            Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column,
                row,
                ..
            }) => self.click(column, row),
            Event::Resize(width, height) => {
                let mode = self.camera.mode;
                self.camera = Camera::new(width as u32, height as u32);
                self.camera.mode = mode;
                self.renderer = AsciiRenderer::new(width as usize, height as usize);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> io::Result<()> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('w') | KeyCode::Up => self.rotation.rotate(0.1, 0.0, 0.0),
            KeyCode::Char('s') | KeyCode::Down => self.rotation.rotate(-0.1, 0.0, 0.0),
            KeyCode::Char('a') | KeyCode::Left => self.rotation.rotate(0.0, -0.1, 0.0),
            KeyCode::Char('d') | KeyCode::Right => self.rotation.rotate(0.0, 0.1, 0.0),
            KeyCode::Char('e') => self.rotation.rotate(0.0, 0.0, 0.1),
            KeyCode::Char('r') => self.rotation.rotate(0.0, 0.0, -0.1),
            KeyCode::Char(' ') => self.spin = !self.spin,
            KeyCode::Char('p') => {
                self.camera.toggle_mode();
                self.status = format!("{:?} projection", self.camera.mode);
            }
            KeyCode::Char('g') => {
                let triangles = self.scene.regenerate().map_err(core_error)?;
                self.status = format!("regenerated: {} triangles", triangles);
            }
            KeyCode::Tab => {
                if let Scene::Terrain(terrain) = &mut self.scene {
                    let edit = !terrain.is_edit();
                    terrain.set_is_edit(edit);
                    self.spin = !edit;
                    self.status = format!("edit mode {}", if edit { "on" } else { "off" });
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.set_brush_sign(1.0),
            KeyCode::Char('-') => self.set_brush_sign(-1.0),
            _ => {}
        }
        self.apply_model_matrix();
        Ok(())
    }

    fn set_brush_sign(&mut self, sign: f32) {
        if let Scene::Terrain(terrain) = &mut self.scene {
            terrain.set_strength(sign * terrain.strength().abs());
            self.status = format!("brush strength {}", terrain.strength());
        }
    }

    /// World-space picking ray through the centre of a terminal cell
    pub fn pick_ray(&self, column: u16, row: u16) -> Option<Ray> {
        self.camera.screen_ray(
            column as f32 + 0.5,
            row as f32 + 0.5,
            self.renderer.width() as u32,
            self.renderer.height() as u32,
        )
    }

    fn click(&mut self, column: u16, row: u16) -> io::Result<()> {
        let Some(ray) = self.pick_ray(column, row) else {
            return Ok(());
        };

        match &mut self.scene {
            Scene::Metaball(metaball) => {
                // Mesh bounds are already in world space
                let picked = metaball.is_picked(&ray);
                self.status = format!("metaball {}", if picked { "picked" } else { "missed" });
            }
            Scene::Terrain(terrain) => {
                let Some(inverse) = terrain.surface().mesh().transform().try_inverse() else {
                    return Ok(());
                };
                let local = ray.transformed(&inverse);
                match terrain.edit(&local).map_err(core_error)? {
                    Some(outcome) => {
                        self.status = format!(
                            "edited {} weights at ({:.1}, {:.1}, {:.1})",
                            outcome.changed,
                            outcome.hit_point.x,
                            outcome.hit_point.y,
                            outcome.hit_point.z
                        );
                    }
                    None if terrain.is_edit() => {
                        log::debug!("click at ({}, {}) missed the terrain", column, row);
                        self.status = "no surface under cursor".into();
                    }
                    None => {}
                }
            }
        }
        // Regeneration keeps the transform, but a new mesh must still match
        self.apply_model_matrix();
        Ok(())
    }

    fn model_matrix(&self) -> Matrix4<f32> {
        let (min, max) = self.scene.bounds();
        Transform::fit_model_matrix(&self.rotation, min, max, VIEW_EXTENT)
    }

    fn apply_model_matrix(&mut self) {
        let model = self.model_matrix();
        self.scene.mesh_mut().set_transform(model);
    }

    fn update(&mut self) {
        if self.spin {
            self.rotation.rotate(0.01, 0.015, 0.0);
            self.apply_model_matrix();
        }
    }

    fn render(&mut self) -> io::Result<()> {
        self.renderer.clear();
        self.renderer.render_mesh(self.scene.mesh(), &self.camera);

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        let edit = match &self.scene {
            Scene::Terrain(terrain) if terrain.is_edit() => " [EDIT]",
            _ => "",
        };
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "MC3D {}{} | {} tris | FPS: {:.1} | WASD=Rotate Space=Spin P=Projection Tab=Edit +/-=Brush G=Regen Q=Quit | {}",
                self.scene.name(),
                edit,
                self.scene.mesh().triangle_count(),
                self.fps,
                self.status
            )),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};
    use mc3d_core::{NoiseSettings, ProjectionMode, TerrainConfig};

    const WIDTH: u16 = 80;
    const HEIGHT: u16 = 40;

    fn flat_terrain_app() -> TerminalApp {
        let terrain = Terrain::new(TerrainConfig {
            noise: NoiseSettings {
                amplitude: 0.0,
                ..NoiseSettings::default()
            },
            ..TerrainConfig::default()
        })
        .unwrap();
        TerminalApp::with_size(Scene::Terrain(terrain), WIDTH, HEIGHT)
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn click(column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn terrain(app: &TerminalApp) -> &Terrain {
        match app.scene() {
            Scene::Terrain(terrain) => terrain,
            Scene::Metaball(_) => panic!("expected terrain"),
        }
    }

    #[test]
    fn test_quit_key_stops_app() {
        let mut app = flat_terrain_app();
        app.handle_event(key(KeyCode::Char('q'))).unwrap();
        assert!(!app.is_running());
    }

    #[test]
    fn test_click_edits_only_in_edit_mode() {
        let mut app = flat_terrain_app();
        let before = terrain(&app).field().values().to_vec();

        app.handle_event(click(WIDTH / 2, HEIGHT / 2)).unwrap();
        assert_eq!(terrain(&app).field().values(), &before[..]);

        app.handle_event(key(KeyCode::Tab)).unwrap();
        assert!(terrain(&app).is_edit());
        app.handle_event(click(WIDTH / 2, HEIGHT / 2)).unwrap();
        assert_ne!(terrain(&app).field().values(), &before[..]);
        assert!(app.status().starts_with("edited"));
    }

    #[test]
    fn test_brush_sign_keys() {
        let mut app = flat_terrain_app();
        app.handle_event(key(KeyCode::Char('-'))).unwrap();
        assert_eq!(terrain(&app).strength(), -1.0);
        app.handle_event(key(KeyCode::Char('+'))).unwrap();
        assert_eq!(terrain(&app).strength(), 1.0);
    }

    #[test]
    fn test_mesh_is_fitted_to_view() {
        let app = flat_terrain_app();
        let bbox = app.scene().mesh().bounding_box().unwrap();
        let half = 0.5 * VIEW_EXTENT * 3f32.sqrt();
        for corner in [bbox.min, bbox.max] {
            assert!(corner.coords.abs().max() <= half + 1e-4);
        }
    }

    #[test]
    fn test_metaball_pick_through_centre() {
        let metaball = Metaball::new(1.2).unwrap();
        let mut app = TerminalApp::with_size(Scene::Metaball(metaball), WIDTH, HEIGHT);
        app.handle_event(click(WIDTH / 2, HEIGHT / 2)).unwrap();
        assert_eq!(app.status(), "metaball picked");
        app.handle_event(click(0, 0)).unwrap();
        assert_eq!(app.status(), "metaball missed");
    }

    #[test]
    fn test_projection_toggle_keeps_picking() {
        let metaball = Metaball::new(1.2).unwrap();
        let mut app = TerminalApp::with_size(Scene::Metaball(metaball), WIDTH, HEIGHT);
        app.handle_event(key(KeyCode::Char('p'))).unwrap();
        assert_eq!(app.camera().mode, ProjectionMode::Orthographic);

        app.handle_event(click(WIDTH / 2, HEIGHT / 2)).unwrap();
        assert_eq!(app.status(), "metaball picked");

        app.handle_event(Event::Resize(100, 50)).unwrap();
        assert_eq!(app.camera().mode, ProjectionMode::Orthographic);
    }
}
