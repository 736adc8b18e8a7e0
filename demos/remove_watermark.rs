//! Remove the corner watermark from a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example remove_watermark -- mask_48.png mask_96.png input.jpg output.png
//! ```

use std::env;
use std::path::Path;
use std::process;

use watermark_unblend::{load_image, save_image, PixelBuffer, ProcessingConfig, WatermarkEngine};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!("Usage: {} <mask_48> <mask_96> <input> <output>", args[0]);
        process::exit(1);
    }

    let engine = WatermarkEngine::load_files(Path::new(&args[1]), Path::new(&args[2]))
        .expect("failed to load watermark masks");
    let mut image = load_image(Path::new(&args[3]))
        .and_then(PixelBuffer::into_image)
        .expect("failed to read input image");

    match engine.remove(&mut image, &ProcessingConfig::default()) {
        Ok(placement) => {
            let output = Path::new(&args[4]);
            save_image(&image, output).expect("failed to write output image");
            let size = placement.extent();
            println!(
                "Done: {size}x{size} watermark at ({}, {})",
                placement.x, placement.y
            );
        }
        Err(e) => {
            println!("Skipped: {e}");
        }
    }
}
