//! Stand-in for cjpeg and jpegtran used by the facade tests.
//!
//! Accepts the option set the facades emit and rejects anything else, so a
//! badly ordered or misspelled argument list fails the run. The JPEG on the
//! input (last positional argument, or stdin) is copied unchanged to
//! `-outfile` or stdout.

use std::io::{self, Read, Write};
use std::process::ExitCode;

const BANNER: &str = "stand-in mozjpeg version 4.1\nbuilt today\r\n";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("mozjpeg-standin: {msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    if args.iter().any(|a| a == "-version") {
        eprint!("{BANNER}");
        return Ok(());
    }

    let mut outfile = None;
    let mut input = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if input.is_some() {
            return Err(format!("option {arg} after the input file"));
        }
        let mut value = || iter.next().cloned().ok_or_else(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "-optimize" | "-progressive" => {}
            "-quality" => {
                let quality = value()?;
                match quality.parse::<u32>() {
                    Ok(q) if q <= 100 => {}
                    _ => return Err(format!("bad quality {quality}")),
                }
            }
            "-crop" => {
                let geometry = value()?;
                if !is_crop_geometry(&geometry) {
                    return Err(format!("bad crop geometry {geometry}"));
                }
            }
            "-copy" => {
                let markers = value()?;
                if !matches!(markers.as_str(), "none" | "comments" | "all") {
                    return Err(format!("bad copy option {markers}"));
                }
            }
            "-outfile" => outfile = Some(value()?),
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            path => input = Some(path.to_string()),
        }
    }

    let data = match &input {
        Some(path) => std::fs::read(path).map_err(|e| format!("can't open {path}: {e}"))?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).map_err(|e| e.to_string())?;
            buf
        }
    };
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err("Not a JPEG file".to_string());
    }

    match outfile {
        Some(path) => std::fs::write(&path, &data).map_err(|e| format!("can't write {path}: {e}")),
        None => io::stdout().write_all(&data).map_err(|e| e.to_string()),
    }
}

/// `WxH+X+Y` with decimal numbers.
fn is_crop_geometry(value: &str) -> bool {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let Some((size, offset)) = value.split_once('+') else {
        return false;
    };
    let Some((x, y)) = offset.split_once('+') else {
        return false;
    };
    matches!(size.split_once('x'), Some((w, h)) if numeric(w) && numeric(h)) && numeric(x) && numeric(y)
}
