use std::f32::consts::PI;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;

use super::render_loop::{FrameRenderer, Viewport};
use super::surface::{Point, RenderSurface};
use crate::color::Rgba;
use crate::cue::cue::Zone;

#[derive(Clone, Debug)]
pub struct ParticleConfig {
    pub cluster_count: usize,
    pub particles_per_cluster: usize,
    pub glow: f32,
    /// Alpha of the black wash painted over the previous frame.
    pub trail_alpha: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            cluster_count: 4,
            particles_per_cluster: 50,
            glow: 5.0,
            trail_alpha: 0.1,
        }
    }
}

const ATTRACTION: f32 = 0.005;
const REPULSION: f32 = 0.001;

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: Point,
    pub velocity: Point,
    pub radius: f32,
    pub alpha: f32,
    pub fade_speed: f32,
    pub fading_in: bool,
    pub center: Point,
    pub cluster_radius: f32,
}

impl Particle {
    /// A particle orbiting a jittered copy of `cluster_center`.
    pub fn spawn(cluster_center: Point, width: f32, rng: &mut impl Rng) -> Self {
        let center = Point::new(
            cluster_center.x + (rng.random::<f32>() * 25.0).floor(),
            cluster_center.y + (rng.random::<f32>() * 25.0).floor(),
        );
        let cluster_radius = width / 3.0;

        let angle = rng.random::<f32>() * PI * 2.0;
        let dist = rng.random::<f32>() * cluster_radius * 1.5;

        Self {
            position: Point::new(
                center.x + angle.cos() * dist,
                center.y + angle.sin() * dist,
            ),
            velocity: random_velocity(rng),
            radius: rng.random::<f32>() * 1.5 + 0.5,
            alpha: rng.random::<f32>(),
            fade_speed: rng.random::<f32>() * 0.02 + 0.005,
            fading_in: true,
            center,
            cluster_radius,
        }
    }

    /// Advances one frame. Returns `true` when the particle left the bounds
    /// and was placed back near its cluster center.
    pub fn update(&mut self, width: f32, height: f32, rng: &mut impl Rng) -> bool {
        let dx = self.center.x - self.position.x;
        let dy = self.center.y - self.position.y;
        let distance = (dx * dx + dy * dy).sqrt();

        let force = if distance < self.cluster_radius * 2.0 {
            ATTRACTION
        } else {
            -REPULSION
        };
        self.velocity.x += dx * force;
        self.velocity.y += dy * force;

        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;

        let out_of_bounds = self.position.x < 0.0
            || self.position.x > width
            || self.position.y < 0.0
            || self.position.y > height;
        if out_of_bounds {
            self.reset(rng);
        }

        if self.fading_in {
            self.alpha += self.fade_speed;
            if self.alpha > 1.0 {
                self.alpha = 1.0;
                self.fading_in = false;
            }
        } else {
            self.alpha -= self.fade_speed;
            if self.alpha < 0.0 {
                self.alpha = 0.0;
                self.fading_in = true;
            }
        }

        out_of_bounds
    }

    fn reset(&mut self, rng: &mut impl Rng) {
        let angle = rng.random::<f32>() * PI * 2.0;
        let dist = rng.random::<f32>() * self.cluster_radius / 2.0;
        self.position = Point::new(
            self.center.x + angle.cos() * dist,
            self.center.y + angle.sin() * dist,
        );
        self.velocity = random_velocity(rng);
    }
}

fn random_velocity(rng: &mut impl Rng) -> Point {
    Point::new(
        (rng.random::<f32>() - 0.5) * 0.5,
        (rng.random::<f32>() - 0.5) * 0.5,
    )
}

/// Sender half of a field's color. Setting a color never touches particle
/// positions; the field picks it up on its next frame.
#[derive(Clone)]
pub struct ColorChannel {
    zone: Zone,
    tx: Arc<watch::Sender<Rgba>>,
}

impl ColorChannel {
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn set_color(&self, color: Rgba) {
        self.tx.send_replace(color);
    }

    pub fn color(&self) -> Rgba {
        *self.tx.borrow()
    }
}

/// Drifting, twinkling particle clusters for one zone.
pub struct ParticleField {
    zone: Zone,
    config: ParticleConfig,
    color: watch::Receiver<Rgba>,
    particles: Vec<Particle>,
    cluster_centers: Vec<Point>,
    viewport: Option<Viewport>,
    rng: StdRng,
}

impl ParticleField {
    pub fn new(zone: Zone, config: ParticleConfig, color: Rgba) -> (Self, ColorChannel) {
        Self::with_rng(zone, config, color, StdRng::from_os_rng())
    }

    pub fn with_rng(
        zone: Zone,
        config: ParticleConfig,
        color: Rgba,
        rng: StdRng,
    ) -> (Self, ColorChannel) {
        let (tx, rx) = watch::channel(color);
        let channel = ColorChannel {
            zone: zone.clone(),
            tx: Arc::new(tx),
        };
        let field = Self {
            zone,
            config,
            color: rx,
            particles: Vec::new(),
            cluster_centers: Vec::new(),
            viewport: None,
            rng,
        };
        (field, channel)
    }

    pub fn seeded(
        zone: Zone,
        config: ParticleConfig,
        color: Rgba,
        seed: u64,
    ) -> (Self, ColorChannel) {
        Self::with_rng(zone, config, color, StdRng::seed_from_u64(seed))
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn cluster_centers(&self) -> &[Point] {
        &self.cluster_centers
    }

    /// Replaces every particle with a fresh population for `viewport`.
    pub fn regenerate(&mut self, viewport: Viewport) {
        let width = viewport.width as f32;
        let step_x = (width / 10.0).floor();
        let step_y = (viewport.height as f32 / 10.0).floor();

        self.cluster_centers.clear();
        self.particles.clear();

        for _ in 0..self.config.cluster_count {
            let center = Point::new(
                step_x + step_x * (self.rng.random::<f32>() * 8.0).round(),
                step_y + step_y * (self.rng.random::<f32>() * 8.0).round(),
            );
            self.cluster_centers.push(center);
            for _ in 0..self.config.particles_per_cluster {
                self.particles
                    .push(Particle::spawn(center, width, &mut self.rng));
            }
        }

        log::debug!(
            "{}: {} particles in {} clusters for {}x{}",
            self.zone,
            self.particles.len(),
            self.cluster_centers.len(),
            viewport.width,
            viewport.height
        );
        self.viewport = Some(viewport);
    }
}

impl FrameRenderer for ParticleField {
    fn render(&mut self, surface: &mut dyn RenderSurface, viewport: Viewport) {
        if self.viewport != Some(viewport) {
            surface.resize(viewport.width, viewport.height);
            self.regenerate(viewport);
        }

        let (width, height) = (viewport.width as f32, viewport.height as f32);
        let color = *self.color.borrow();

        surface.fill_rect(
            0.0,
            0.0,
            width,
            height,
            Rgba::BLACK.with_alpha(self.config.trail_alpha),
        );

        for particle in self.particles.iter_mut() {
            particle.update(width, height, &mut self.rng);
            surface.fill_circle(
                particle.position,
                particle.radius,
                color.with_alpha(particle.alpha),
                self.config.glow,
            );
        }
    }
}
