use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const TOOLS: &[&str] = &["cjpeg", "jpegtran"];

fn main() {
    // ── embedded mozjpeg assets ──────────────────────────────────────────────
    //
    // Layout (relative to the asset dir):
    //   <os>/<tool>[.exe]           OS-specific, any architecture
    //   <os>/<arch>/<tool>[.exe]    OS- and architecture-specific
    //   <tool>[.exe]                fully generic
    //
    // MOZJPEG_ASSET_DIR overrides the default `<manifest>/bin` location. A
    // missing directory produces an empty table so the crate always builds.
    println!("cargo:rerun-if-env-changed=MOZJPEG_ASSET_DIR");

    let asset_dir = std::env::var("MOZJPEG_ASSET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new(env!("CARGO_MANIFEST_DIR")).join("bin"));

    let mut entries = Vec::new();
    if asset_dir.is_dir() {
        println!("cargo:rerun-if-changed={}", asset_dir.display());
        collect_dir(&asset_dir, None, None, &mut entries);
        for os_dir in sorted_subdirs(&asset_dir) {
            let os = file_name(&os_dir);
            collect_dir(&os_dir, Some(&os), None, &mut entries);
            for arch_dir in sorted_subdirs(&os_dir) {
                let arch = file_name(&arch_dir);
                collect_dir(&arch_dir, Some(&os), Some(&arch), &mut entries);
            }
        }
    } else {
        println!(
            "cargo:warning=no mozjpeg asset directory at '{}'; embedded table is empty",
            asset_dir.display()
        );
    }

    let mut generated = String::from("pub static EMBEDDED_ASSETS: &[EmbeddedAsset] = &[\n");
    for entry in &entries {
        println!("cargo:rerun-if-changed={}", entry.path.display());
        let _ = writeln!(
            generated,
            "    EmbeddedAsset {{ tool: {:?}, os: {:?}, arch: {:?}, bytes: include_bytes!({:?}) }},",
            entry.tool,
            entry.os,
            entry.arch,
            entry.path.display().to_string(),
        );
    }
    generated.push_str("];\n");

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR must be set by Cargo");
    let out_file = Path::new(&out_dir).join("embedded_assets.rs");
    std::fs::write(&out_file, generated).expect("failed to write embedded asset table");
}

struct Entry {
    tool: String,
    os: String,
    arch: String,
    path: PathBuf,
}

fn collect_dir(dir: &Path, os: Option<&str>, arch: Option<&str>, entries: &mut Vec<Entry>) {
    for tool in TOOLS {
        for candidate in [tool.to_string(), format!("{tool}.exe")] {
            let path = dir.join(&candidate);
            if path.is_file() {
                entries.push(Entry {
                    tool: tool.to_string(),
                    os: os.unwrap_or_default().to_string(),
                    arch: arch.unwrap_or_default().to_string(),
                    path: path.canonicalize().unwrap_or(path),
                });
            }
        }
    }
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    dirs.sort();
    dirs
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
