#![warn(clippy::pedantic)]

use inkbleed::{
    config::EngineConfig,
    frame::FrameGate,
    studio::{surface, CanvasId, Studio},
};
use inkbleed_core::{fill::BleedDirection, hatch::HatchOptions, Color, Plot, PlotKind, Point};

#[cfg(feature = "dhat_heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[cfg(all(
    feature = "jemallocator",
    not(feature = "dhat_heap"),
    not(target_env = "msvc")
))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result as AnyResult;

const FRAMES: u32 = 3;

/// One frame of the demo sketch. Later frames draw over earlier ones.
fn sketch(canvas: &mut inkbleed::Canvas, frame: u32) -> AnyResult<()> {
    #[allow(clippy::cast_precision_loss)]
    let (width, height, t) = (canvas.width() as f32, canvas.height() as f32, frame as f32);
    let center = Point::new(width / 2.0, height / 2.0);

    canvas.refresh_field(t);
    canvas.field("seabed")?;

    // Bleeding washes.
    canvas.save();
    canvas.no_stroke();
    canvas.fill_style(Color::rgb(0, 33, 133), 0.6);
    canvas.fill_bleed(0.2, BleedDirection::Out);
    canvas.fill_texture(0.5, 0.6);
    canvas.circle(center.x - width * 0.1, center.y, width * 0.4, true)?;
    canvas.fill_style(Color::rgb(252, 211, 0), 0.5);
    canvas.fill_bleed(0.15, BleedDirection::In);
    canvas.rect(center.x, center.y - height * 0.2, width * 0.3, height * 0.3)?;
    canvas.restore();

    // Hatched plot.
    canvas.save();
    canvas.translate(center.x, center.y + height * 0.25);
    canvas.rotate(10.0 * t);
    canvas.no_fill();
    canvas.hatch_style(
        width * 0.01,
        30.0,
        HatchOptions {
            rand: 0.1,
            continuous: false,
            gradient: 0.2,
        },
    );
    canvas.hatch_brush("hatch_brush", Color::rgb(120, 20, 60), 1.5)?;
    canvas.set_stroke("2B", Color::rgb(40, 20, 20), 1.0)?;
    let mut plot = Plot::new(PlotKind::Curve);
    plot.add_segment(0.0, width * 0.2, 1.0, true);
    plot.add_segment(90.0, height * 0.1, 1.2, true);
    plot.add_segment(180.0, width * 0.2, 0.8, true);
    plot.end_plot(270.0, 1.0, true);
    canvas.plot(&plot, -width * 0.1, 0.0, 1.0)?;
    canvas.restore();

    // Field-bent strokes.
    canvas.set_stroke("pen", Color::rgb(20, 20, 30), 1.0)?;
    for i in 0..12 {
        #[allow(clippy::cast_precision_loss)]
        let y = height * (0.1 + 0.07 * i as f32);
        canvas.flow_line(width * 0.05, y, width * 0.3, 0.0)?;
    }
    canvas.set_stroke("marker", Color::rgb(200, 40, 40), 2.0)?;
    canvas.begin_path(0.6);
    canvas.move_to(width * 0.6, height * 0.1);
    canvas.line_to(width * 0.9, height * 0.15, 1.2);
    canvas.line_to(width * 0.85, height * 0.4, 0.6);
    canvas.end_path()?;
    canvas.arc(center.x, center.y, width * 0.45, 0.0, std::f32::consts::PI * 0.75)?;

    canvas.end_frame()?;
    Ok(())
}

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Debug);
    }
    #[cfg(feature = "dhat_heap")]
    let _profiler = {
        log::trace!("Installed dhat");
        dhat::Profiler::new_heap()
    };

    let config = EngineConfig::get().clone();
    if let Err(e) = config.save() {
        log::warn!("Failed to save engine config:\n{e:?}");
    }
    // Single optional argument, where to write the result.
    let output: std::path::PathBuf = std::env::args_os()
        .nth(1)
        .map_or_else(|| "inkbleed.png".into(), Into::into);

    let mut studio = Studio::new(config);
    let id = CanvasId(0);
    let (width, height) = (studio.config().width, studio.config().height);
    studio.load(id, surface(width, height));
    studio.canvas(id)?.background(Color::rgb(250, 245, 235))?;

    let mut gate = FrameGate::new(studio.config().frame_rate);
    let mut frame = 0;
    while frame < FRAMES {
        let now = std::time::Instant::now();
        if !gate.ready(now) {
            std::thread::sleep(gate.remaining(now));
            continue;
        }
        log::debug!("frame {frame}");
        sketch(studio.canvas(id)?, frame)?;
        frame += 1;
    }

    let image = studio.canvas(id)?.read()?;
    image.save(&output)?;
    log::info!("wrote {output:?}");
    Ok(())
}
