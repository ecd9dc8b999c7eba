use std::path::PathBuf;
use std::process;

use clap::Parser;
use fitscube::header::Header;
use fitscube::progress::format_bytes;
use fitscube::CubeMetadata;

/// Print the derived metadata of one or more FITS cubes.
#[derive(Parser, Debug)]
#[command(name = "fitscube", version)]
struct Cli {
    /// Cubes to inspect.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Also list every header card.
    #[arg(long)]
    cards: bool,
}

fn format_cube(meta: &CubeMetadata) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", meta.path.display()));
    out.push_str(&format!(
        "  BITPIX: {} ({:?})\n",
        meta.format.bitpix(),
        meta.format
    ));
    out.push_str(&format!(
        "  Dimensions: {} x {} x {}\n",
        meta.shape[0], meta.shape[1], meta.shape[2]
    ));
    out.push_str(&format!("  BSCALE: {}  BZERO: {}\n", meta.bscale, meta.bzero));
    if let Some(blank) = meta.blank {
        out.push_str(&format!("  BLANK: {}\n", blank));
    }
    if !meta.bunit.is_empty() {
        out.push_str(&format!("  BUNIT: {}\n", meta.bunit));
    }
    for (i, axis) in meta.wcs.iter().enumerate() {
        let ctype = &meta.ctype[i];
        let label = if ctype.is_empty() { "-" } else { ctype.as_str() };
        out.push_str(&format!(
            "  Axis {}: {} CRPIX={} CRVAL={} CDELT={}\n",
            i + 1,
            label,
            axis.crpix,
            axis.crval,
            axis.cdelt
        ));
    }
    let unit = if meta.cunit3.is_empty() {
        String::new()
    } else {
        format!(" {}", meta.cunit3)
    };
    out.push_str(&format!(
        "  Frames: {}..{} (next {}){}\n",
        meta.frame_start, meta.frame_end, meta.frame_next, unit
    ));
    out.push_str(&format!("  EQUINOX: {}\n", meta.equinox));
    out.push_str(&format!(
        "  Data: {} at offset {}\n",
        format_bytes(meta.data_len),
        meta.data_offset
    ));
    out
}

fn format_cards(header: &Header) -> String {
    let mut out = String::from("  Header cards:\n");
    for card in header.cards() {
        if card.is_end() {
            continue;
        }
        let text = card.as_str().trim_end();
        if !text.is_empty() {
            out.push_str(&format!("    {}\n", text));
        }
    }
    out
}

fn run(cli: &Cli) -> Result<String, String> {
    let mut out = String::new();
    for (i, path) in cli.files.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let meta = CubeMetadata::from_path(path).map_err(|e| e.to_string())?;
        out.push_str(&format_cube(&meta));
        if cli.cards {
            let header = Header::from_path(path).map_err(|e| e.to_string())?;
            out.push_str(&format_cards(&header));
        }
    }
    Ok(out)
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => print!("{}", output),
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(1);
        }
    }
}
