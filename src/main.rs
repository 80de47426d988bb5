//! A small command-line front end for the intersection core: renders a
//! fixed demo scene (a few spheres under one directional light) to a PNG,
//! stratifying samples per pixel with a [`raytracer::sequence::halton::HaltonSequence`].
//! Grounded in the teacher's `main.rs` (clap-driven CLI, `pbr` progress
//! ticker, `rayon` thread pool, `image` PNG output).

use std::fs::File;
use std::io::Stdout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::{Duration, Instant};

use clap::Parser;
use log::info;
use pbr::ProgressBar;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use raytracer::demo_scene::{Camera, Color, Scene, Sphere};
use raytracer::image_sampler::ImageSampler;
use raytracer::sequence::halton::HaltonSequence;

#[derive(Parser)]
#[command(
    version,
    author = "Gordon Tyler <gordon@doxxx.net>",
    about = "Minimal ray/shape intersection demo"
)]
struct CommandLineOptions {
    /// Image width
    #[arg(long, default_value = "640", value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Image height
    #[arg(long, default_value = "480", value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Number of render threads
    #[arg(short('t'), long, value_parser = clap::value_parser!(usize))]
    threads: Option<usize>,

    /// Number of samples per pixel (rounded up to the next perfect square)
    #[arg(short('s'), long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..))]
    samples: u32,

    /// Output PNG path
    #[arg(short('o'), long, default_value = "out.png")]
    output: String,
}

fn demo_scene(width: u32, height: u32) -> (Scene, Camera) {
    let scene = Scene {
        spheres: vec![
            Sphere {
                origin: raytracer::point::Point::new(0.0, 0.0, 0.0),
                radius: 1.0,
                albedo: Color::new(0.8, 0.2, 0.2),
            },
            Sphere {
                origin: raytracer::point::Point::new(-2.2, 0.3, -1.0),
                radius: 1.3,
                albedo: Color::new(0.2, 0.6, 0.8),
            },
            Sphere {
                origin: raytracer::point::Point::new(0.0, -101.0, 0.0),
                radius: 100.0,
                albedo: Color::new(0.4, 0.4, 0.4),
            },
        ],
        light_direction: raytracer::direction::Direction::new(0.4, 0.8, 0.3).normalize(),
        background: Color::new(0.02, 0.02, 0.06),
    };
    let camera = Camera::new(
        width,
        height,
        60.0,
        raytracer::point::Point::new(0.0, 1.0, 6.0),
        raytracer::point::Point::new(0.0, 0.0, 0.0),
    )
    .expect("demo camera basis is always well-formed");
    (scene, camera)
}

fn main() {
    env_logger::init();

    let opts = CommandLineOptions::parse();
    let num_threads = opts.threads.unwrap_or_else(num_cpus::get);

    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .expect("could not configure threadpool");

    let (scene, camera) = demo_scene(opts.width, opts.height);

    let mut base_sampler = ImageSampler::new(Box::new(HaltonSequence::new()), false);
    let samples_per_pixel = base_sampler
        .start(opts.width, opts.height, opts.samples)
        .expect("valid image dimensions and sample count");

    info!(
        "rendering {}x{}, {} samples per pixel, {} threads",
        opts.width, opts.height, samples_per_pixel, num_threads
    );

    let progress = Arc::new(Mutex::new(CliProgress::new(opts.height as u64)));
    let (stop_ticker, ticker_handle) = spawn_progress_ticker(&progress);

    let rows: Vec<Vec<Color>> = (0..opts.height)
        .into_par_iter()
        .map(|row| {
            let mut sampler = base_sampler.duplicate();
            let mut tracer = raytracer::ray_tracer::RayTracer::new();

            let pixels: Vec<Color> = (0..opts.width)
                .map(|column| {
                    let mut accumulated = Color::black();
                    for sample in 0..samples_per_pixel {
                        let placed = sampler
                            .next(column, row, sample)
                            .expect("sample index in range");
                        let ray = camera.ray(placed.pixel_u, placed.pixel_v);
                        let color = scene
                            .shade(&mut tracer, ray)
                            .expect("the demo scene never raises an intersection error");
                        accumulated = accumulated + color * (1.0 / samples_per_pixel as f64);
                    }
                    accumulated.gamma_2()
                })
                .collect();

            progress.lock().unwrap().row_finished();
            pixels
        })
        .collect();

    stop_ticker.store(true, Ordering::Relaxed);
    ticker_handle.join().unwrap();

    write_png(&opts.output, opts.width, opts.height, &rows);
    progress.lock().unwrap().finish(&opts.output);
}

fn write_png(path: &str, width: u32, height: u32, rows: &[Vec<Color>]) {
    let mut imgbuf = image::RgbImage::new(width, height);
    for (x, y, pixel) in imgbuf.enumerate_pixels_mut() {
        let c = rows[y as usize][x as usize];
        *pixel = image::Rgb([
            (c.r * 255.0).clamp(0.0, 255.0) as u8,
            (c.g * 255.0).clamp(0.0, 255.0) as u8,
            (c.b * 255.0).clamp(0.0, 255.0) as u8,
        ]);
    }
    imgbuf.save(path).expect("could not write output PNG");
}

fn spawn_progress_ticker(progress: &Arc<Mutex<CliProgress>>) -> (Arc<AtomicBool>, JoinHandle<()>) {
    let stop = Arc::new(AtomicBool::new(false));
    let handle = {
        let stop = stop.clone();
        let progress = progress.clone();
        spawn(move || loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            progress.lock().unwrap().pb.tick();
            sleep(Duration::from_millis(250));
        })
    };
    (stop, handle)
}

struct CliProgress {
    start: Instant,
    pb: ProgressBar<Stdout>,
}

impl CliProgress {
    fn new(total_rows: u64) -> CliProgress {
        let mut pb = ProgressBar::new(total_rows);
        pb.message("Rows: ");
        CliProgress {
            start: Instant::now(),
            pb,
        }
    }

    fn row_finished(&mut self) {
        self.pb.inc();
    }

    fn finish(&mut self, output: &str) {
        self.pb
            .finish_println(&format!("Wrote {} in {:.2}s", output, self.start.elapsed().as_secs_f64()));
    }
}
