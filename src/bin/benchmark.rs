use std::time::{Duration, Instant};

use anyhow::Result;
use nordic_aurora::driver::{AnimationDriver, FrameControl, StepScheduler};
use nordic_aurora::intro::IntroScene;
use nordic_aurora::noise::Fractal;
use nordic_aurora::storage::parse_bool;
use nordic_aurora::visual::{AuroraConfig, LayerRenderer, Preset, Theme, Viewport};

struct Args {
    frames: usize,
    w: u32,
    h: u32,
    dpr: f32,
    theme: Theme,
    seed: u64,
    intro: bool,
    ci_smoke: bool,
    quick: bool,
    max_ms: f64,
}

fn parse_args() -> Args {
    let mut args = Args {
        frames: 120,
        w: 320,
        h: 180,
        dpr: 1.0,
        theme: Theme::Dark,
        seed: 7,
        intro: true,
        ci_smoke: false,
        quick: false,
        max_ms: 40.0,
    };

    let argv = std::env::args().skip(1).collect::<Vec<_>>();
    let mut i = 0usize;
    while i < argv.len() {
        let k = argv[i].as_str();
        let v = argv.get(i + 1).map(|s| s.as_str());
        match (k, v) {
            ("--frames", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.frames = n.max(1);
                }
                i += 2;
            }
            ("--w", Some(x)) => {
                if let Ok(n) = x.parse::<u32>() {
                    args.w = n.max(1);
                }
                i += 2;
            }
            ("--h", Some(x)) => {
                if let Ok(n) = x.parse::<u32>() {
                    args.h = n.max(1);
                }
                i += 2;
            }
            ("--dpr", Some(x)) => {
                if let Ok(v) = x.parse::<f32>() {
                    args.dpr = v;
                }
                i += 2;
            }
            ("--theme", Some("dark")) => {
                args.theme = Theme::Dark;
                i += 2;
            }
            ("--theme", Some("light")) => {
                args.theme = Theme::Light;
                i += 2;
            }
            ("--seed", Some(x)) => {
                if let Ok(n) = x.parse::<u64>() {
                    args.seed = n;
                }
                i += 2;
            }
            ("--intro", Some(x)) => {
                if let Some(v) = parse_bool(x) {
                    args.intro = v;
                }
                i += 2;
            }
            ("--ci-smoke", Some(x)) if !x.starts_with("--") => {
                args.ci_smoke = parse_bool(x).unwrap_or(true);
                i += 2;
            }
            ("--ci-smoke", _) => {
                args.ci_smoke = true;
                i += 1;
            }
            ("--quick", Some(x)) if !x.starts_with("--") => {
                args.quick = parse_bool(x).unwrap_or(true);
                i += 2;
            }
            ("--quick", _) => {
                args.quick = true;
                i += 1;
            }
            ("--max-ms", Some(x)) => {
                if let Ok(v) = x.parse::<f64>() {
                    args.max_ms = v.max(0.1);
                }
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    if args.quick {
        args.frames = args.frames.min(30);
    }

    args
}

fn bench_preset(args: &Args, preset: Preset) -> (f64, usize) {
    let mut cfg = AuroraConfig::preset(preset, args.theme);
    cfg.seed = Some(args.seed);
    let mut driver = AnimationDriver::new(LayerRenderer::with_fractal(cfg, Fractal::seeded(args.seed)));
    driver.mount(Viewport::new(args.w, args.h, args.dpr));

    let mut scheduler = StepScheduler::new(args.frames, 1.0 / 60.0);
    let mut lit = 0usize;
    let start = Instant::now();
    driver.run(&mut scheduler, |surface| {
        if let Some(s) = surface {
            if s.pixels().chunks_exact(4).any(|p| p[3] != 0 && (p[0] | p[1] | p[2]) != 0) {
                lit += 1;
            }
        }
        FrameControl::Continue
    });
    let elapsed = start.elapsed();
    (elapsed.as_secs_f64() * 1000.0 / args.frames as f64, lit)
}

fn bench_intro(args: &Args) {
    let scene = IntroScene::new(args.theme, false, args.seed);
    let w = args.w as usize;
    let h = args.h as usize;
    let mut buf = vec![0u8; w * h * 4];
    let start = Instant::now();
    for f in 0..args.frames {
        scene.render(&mut buf, w, h, args.dpr, f as f32 / 60.0);
    }
    let ms = start.elapsed().as_secs_f64() * 1000.0 / args.frames as f64;
    println!("Intro scene:  {:>8.3} ms/frame  fireflies={}", ms, scene.firefly_count());
}

fn main() -> Result<()> {
    let args = parse_args();
    let mut total_time = Duration::ZERO;
    let mut total_frames = 0usize;
    let mut black_presets = Vec::<&'static str>::new();
    let mut slow_presets = Vec::<(&'static str, f64)>::new();

    println!(
        "Aurora benchmark: presets={} frames/preset={} size={}x{} dpr={} theme={} quick={}",
        Preset::all().len(),
        args.frames,
        args.w,
        args.h,
        args.dpr,
        args.theme.label(),
        args.quick
    );

    for (idx, preset) in Preset::all().into_iter().enumerate() {
        let (ms, lit) = bench_preset(&args, preset);
        total_time += Duration::from_secs_f64(ms * args.frames as f64 / 1000.0);
        total_frames += args.frames;
        println!(
            "{:>2}. {:<10} {:>8.3} ms/frame  lit={:>3}/{}",
            idx,
            preset.label(),
            ms,
            lit,
            args.frames
        );
        if lit == 0 {
            black_presets.push(preset.label());
        }
        if args.ci_smoke && ms > args.max_ms {
            slow_presets.push((preset.label(), ms));
        }
    }

    let avg_ms = total_time.as_secs_f64() * 1000.0 / total_frames.max(1) as f64;
    let fps = if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 };
    println!("Summary: {:>8.3} ms/frame avg  {:>7.2} FPS", avg_ms, fps);
    if args.intro {
        bench_intro(&args);
    }

    if args.ci_smoke {
        if !black_presets.is_empty() || !slow_presets.is_empty() {
            eprintln!("CI smoke: FAIL");
            if !black_presets.is_empty() {
                eprintln!("  black presets: {}", black_presets.join(", "));
            }
            for (name, ms) in slow_presets {
                eprintln!("  slow preset: {} ({:.3} ms/frame > {:.3})", name, ms, args.max_ms);
            }
            anyhow::bail!("ci smoke failed");
        }
        println!("CI smoke: PASS (max_ms={:.3})", args.max_ms);
    }

    Ok(())
}
