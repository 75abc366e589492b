use ionreg::{
    CanvasSurface, ControlKind, FigureLayout, HookAdapter, Image, LayoutConfig, MarkerStyle,
    SurfaceEvent,
};
use std::error::Error;

/// Drives a correspondence session without a window: three landmark pairs
/// clicked in alternation, then Save.
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <optical.png> <mz_table.csv> [preview.png]", args[0]);
        std::process::exit(2);
    }

    let optical = Image::open(args[1].as_ref())?;
    let ion = Image::open(args[2].as_ref())?;
    let layout = FigureLayout::side_by_side(optical.dims(), ion.dims(), &LayoutConfig::default());

    let mut surface = CanvasSurface::new(layout.clone(), MarkerStyle::default());
    if let Some(preview) = args.get(3) {
        surface = surface.with_output(preview);
    }
    let mut adapter = HookAdapter::new(layout.clone(), surface, "hooks.tis", &optical, &ion)?;

    // Corners of each image, in pixel coordinates.
    let corners = |img: &Image| {
        let (w, h) = ((img.width() - 1) as f64, (img.height() - 1) as f64);
        [[0.0, 0.0], [w, 0.0], [0.0, h]]
    };
    for (a, b) in corners(&optical).into_iter().zip(corners(&ion)) {
        for (panel, p) in [(0, a), (1, b)] {
            let [x, y] = layout.panels[panel].to_figure(p);
            let response = adapter.dispatch(&SurfaceEvent::click(x, y))?;
            println!("{response:?}");
        }
    }
    let response = adapter.dispatch(&SurfaceEvent::activate(ControlKind::Save))?;
    println!("{response:?}");
    Ok(())
}
