// preview - Run the fluid backdrop headlessly and dump frames as PNG
//
// Pipeline:
//   1. Size a session for the requested canvas
//   2. Tick it at a fixed refresh rate, optionally steering a scripted pointer
//   3. Save every Nth rendered frame
//
// Usage: cargo run --bin preview -- [--width N] [--height N] [--frames N]
//        [--fps N] [--every N] [--out DIR] [--pointer] [--tint]

mod path;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fluid_backdrop::RenderSession;
use image::RgbaImage;

struct Args {
    width: f32,
    height: f32,
    frames: u32,
    fps: f64,
    every: u32,
    out: PathBuf,
    pointer: bool,
    tint: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let mut a = Args {
        width: 1280.0,
        height: 720.0,
        frames: 240,
        fps: 60.0,
        every: 10,
        out: PathBuf::from("preview-frames"),
        pointer: false,
        tint: false,
    };

    let mut i = 1;
    while i < args.len() {
        let next = args.get(i + 1);
        match args[i].as_str() {
            "--width" => { a.width = next.and_then(|s| s.parse().ok()).unwrap_or(a.width); i += 2; }
            "--height" => { a.height = next.and_then(|s| s.parse().ok()).unwrap_or(a.height); i += 2; }
            "--frames" => { a.frames = next.and_then(|s| s.parse().ok()).unwrap_or(a.frames); i += 2; }
            "--fps" => { a.fps = next.and_then(|s| s.parse().ok()).unwrap_or(a.fps); i += 2; }
            "--every" => { a.every = next.and_then(|s| s.parse().ok()).unwrap_or(a.every); i += 2; }
            "--out" => { if let Some(s) = next { a.out = PathBuf::from(s); } i += 2; }
            "--pointer" => { a.pointer = true; i += 1; }
            "--tint" => { a.tint = true; i += 1; }
            _ => i += 1,
        }
    }
    a
}

fn save_frame(session: &RenderSession, dir: &Path, index: u32) -> Result<()> {
    let img = RgbaImage::from_raw(session.width(), session.height(), session.pixels().to_vec())
        .context("frame buffer does not match its dimensions")?;
    let file = dir.join(format!("frame-{index:05}.png"));
    img.save(&file).with_context(|| format!("failed to write {}", file.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args();
    if args.fps <= 0.0 {
        bail!("--fps must be positive");
    }
    let every = args.every.max(1);

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;

    let mut session = RenderSession::new(args.width, args.height, 0.0)?;
    session.display_mut().set_velocity_tinting(args.tint);
    let pointer = path::CirclePath::centered(args.width, args.height, 3.0);

    println!(
        "Rendering {} frames of a {}x{} canvas ({}x{} simulation)...",
        args.frames,
        args.width,
        args.height,
        session.sim_width(),
        session.sim_height()
    );

    let frame_ms = 1000.0 / args.fps;
    let mut rendered = 0u32;
    let mut saved = 0u32;
    for i in 1..=args.frames {
        let now = i as f64 * frame_ms;
        if args.pointer {
            let (x, y) = pointer.at(now);
            session.pointer_move(x, y);
        }
        if !session.tick(now).rendered() {
            continue;
        }
        if rendered % every == 0 {
            save_frame(&session, &args.out, saved)?;
            saved += 1;
        }
        rendered += 1;
    }

    println!("  {rendered} frames rendered, {saved} written to {}", args.out.display());
    session.dispose();
    println!("Done!");
    Ok(())
}
